//! Audio driver facade.
//!
//! A [`Driver`] owns the platform stream. The host starts it with a
//! [`Renderer`] and the driver calls [`Renderer::render`] once per hardware
//! buffer on its realtime thread, until [`Driver::stop`] returns.
//!
//! Two drivers ship with the crate:
//! - [`ManualDriver`] - cycles are triggered by the caller (tests, benches, offline runs)
//! - `CpalDriver` - a real output device (requires the `cpal_driver` feature)

use std::sync::Arc;

use thiserror::Error;

use crate::render::Renderer;

mod manual;
pub use manual::{ManualDriver, ManualDriverHandle};

#[cfg(feature = "cpal_driver")]
mod cpal_stream;
#[cfg(feature = "cpal_driver")]
pub use cpal_stream::CpalDriver;

/// Parameters the host asks for when starting a stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamRequest {
    /// Preferred number of frames per hardware buffer
    pub buffer_size: usize,
    /// Whether render threads should join the driver's work interval
    pub work_interval: bool,
}

/// Errors raised while opening or starting a driver stream
#[derive(Error, Debug)]
pub enum DriverError {
    /// No audio output devices available
    #[error("No audio output devices found")]
    NoDevice,

    /// Named device not found
    #[error("Audio device not found: {0}")]
    DeviceNotFound(String),

    /// Failed to get or apply a device configuration
    #[error("Failed to get device config: {0}")]
    Config(String),

    /// Failed to build the output stream
    #[error("Failed to build audio stream: {0}")]
    BuildStream(String),

    /// Failed to start the output stream
    #[error("Failed to start audio stream: {0}")]
    PlayStream(String),

    /// The driver refused to start for another reason
    #[error("Driver unavailable: {0}")]
    Unavailable(String),
}

/// Failures of the driver's own per-cycle buffer preparation.
///
/// These are handed to [`Renderer::render`] instead of a buffer; the cycle is
/// then reported back as failed without running any callback.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferError {
    /// The hardware asked for more frames than the preallocated scratch holds
    #[error("Cycle of {requested} frames exceeds buffer capacity of {capacity}")]
    TooManyFrames { requested: usize, capacity: usize },

    /// The hardware buffer layout doesn't provide a stereo pair
    #[error("Unsupported output channel count: {0}")]
    ChannelMismatch(usize),
}

/// Hook through which render threads join a driver's work interval.
///
/// Worker threads call [`join_current_thread`](Self::join_current_thread)
/// once, right after they are spawned, when work intervals are enabled.
pub trait WorkIntervalJoin: Send + Sync {
    fn join_current_thread(&self) -> Result<(), DriverError>;
}

/// The platform audio driver as seen by the host.
pub trait Driver {
    /// Sample rate the stream runs at, in Hz. Valid before `start`.
    fn sample_rate(&self) -> u32;

    /// Buffer size in frames of the running or last stream, 0 when the
    /// platform chose it without reporting it.
    fn buffer_size(&self) -> usize;

    /// Open the stream and begin delivering render cycles to `renderer`.
    fn start(&mut self, request: StreamRequest, renderer: Renderer) -> Result<(), DriverError>;

    /// Stop the stream. No render cycle is in flight once this returns.
    fn stop(&mut self);

    /// The driver's work interval, if the platform has one.
    fn work_interval_join(&self) -> Option<Arc<dyn WorkIntervalJoin>> {
        None
    }
}
