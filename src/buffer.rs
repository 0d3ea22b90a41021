//! Output buffer handle passed to the render callbacks.

/// Non-owning view of the driver's left/right output channels for one render
/// cycle.
///
/// The borrow ties the view to the driver callback that produced it, so it
/// can't outlive the cycle.
#[derive(Debug)]
pub struct StereoBuffer<'a> {
    left: &'a mut [f32],
    right: &'a mut [f32],
}

impl<'a> StereoBuffer<'a> {
    /// Wrap two channel slices. Returns `None` if their lengths differ.
    pub fn new(left: &'a mut [f32], right: &'a mut [f32]) -> Option<Self> {
        if left.len() != right.len() {
            return None;
        }
        Some(Self { left, right })
    }

    /// Number of frames in each channel.
    #[inline]
    pub fn frames(&self) -> usize {
        self.left.len()
    }

    #[inline]
    pub fn left(&self) -> &[f32] {
        &*self.left
    }

    #[inline]
    pub fn right(&self) -> &[f32] {
        &*self.right
    }

    /// Mutable access to both channels at once.
    #[inline]
    pub fn channels_mut(&mut self) -> (&mut [f32], &mut [f32]) {
        (&mut *self.left, &mut *self.right)
    }

    /// Write silence to both channels.
    pub fn clear(&mut self) {
        self.left.iter_mut().for_each(|s| *s = 0.0);
        self.right.iter_mut().for_each(|s| *s = 0.0);
    }
}
