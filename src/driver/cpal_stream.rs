//! CPAL output driver

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, SizedSample, StreamInstant, SupportedBufferSize};
use tracing::{debug, error, info, warn};

use crate::buffer::StereoBuffer;
use crate::driver::{BufferError, Driver, DriverError, StreamRequest};
use crate::render::{RenderStatus, Renderer};

/// Largest hardware cycle the deinterleaving scratch is sized for (frames)
pub const MAX_CYCLE_FRAMES: usize = 8192;

/// [`Driver`] for a CPAL output device.
///
/// The device and its default configuration are picked at construction, so
/// the sample rate is known before the host starts. The stream itself is
/// built on [`start`](Driver::start) and dropped on [`stop`](Driver::stop).
///
/// # Example
///
/// ```no_run
/// use renderhost::CpalDriver;
///
/// for name in CpalDriver::output_device_names() {
///     println!("{}", name);
/// }
/// let driver = CpalDriver::default_output().unwrap();
/// println!("{} Hz", renderhost::Driver::sample_rate(&driver));
/// ```
pub struct CpalDriver {
    device: cpal::Device,
    config: cpal::SupportedStreamConfig,
    name: String,
    buffer_size: usize,
    stream: Option<cpal::Stream>,
}

impl CpalDriver {
    /// Use the system's default output device.
    pub fn default_output() -> Result<Self, DriverError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(DriverError::NoDevice)?;
        Self::from_device(device)
    }

    /// Use the output device with the given name.
    pub fn from_name(name: &str) -> Result<Self, DriverError> {
        let host = cpal::default_host();
        let mut devices = host
            .output_devices()
            .map_err(|e| DriverError::Config(e.to_string()))?;
        let device = devices
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| DriverError::DeviceNotFound(name.to_string()))?;
        Self::from_device(device)
    }

    /// Names of all output devices of the default host.
    ///
    /// Returns an empty list if enumeration fails.
    pub fn output_device_names() -> Vec<String> {
        let host = cpal::default_host();
        host.output_devices()
            .map(|devices| devices.filter_map(|d| d.name().ok()).collect())
            .unwrap_or_default()
    }

    fn from_device(device: cpal::Device) -> Result<Self, DriverError> {
        let config = device
            .default_output_config()
            .map_err(|e| DriverError::Config(e.to_string()))?;
        if config.channels() == 0 {
            return Err(DriverError::Config("device has no output channels".into()));
        }
        let name = device.name().unwrap_or_else(|_| "Unknown".into());
        debug!(
            "using output device {} ({} Hz, {} ch, {:?})",
            name,
            config.sample_rate().0,
            config.channels(),
            config.sample_format()
        );
        Ok(Self {
            device,
            config,
            name,
            buffer_size: 0,
            stream: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn channels(&self) -> u16 {
        self.config.channels()
    }

    fn stream_config(&self, request: &StreamRequest) -> cpal::StreamConfig {
        let mut stream_config = self.config.config();
        let frames = request.buffer_size as u32;
        stream_config.buffer_size = match fixed_buffer_size(self.config.buffer_size(), frames) {
            Some(frames) => cpal::BufferSize::Fixed(frames),
            None => {
                warn!(
                    "{}: buffer size {} not supported, using device default",
                    self.name, frames
                );
                cpal::BufferSize::Default
            }
        };
        stream_config
    }
}

/// `frames` if the device accepts it as a fixed buffer size.
fn fixed_buffer_size(supported: &SupportedBufferSize, frames: u32) -> Option<u32> {
    match supported {
        SupportedBufferSize::Range { min, max } if (*min..=*max).contains(&frames) => Some(frames),
        _ => None,
    }
}

impl Driver for CpalDriver {
    fn sample_rate(&self) -> u32 {
        self.config.sample_rate().0
    }

    fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    fn start(&mut self, request: StreamRequest, renderer: Renderer) -> Result<(), DriverError> {
        if self.stream.is_some() {
            self.stop();
        }
        if request.work_interval {
            debug!("{}: work intervals are not available through cpal", self.name);
        }

        let stream_config = self.stream_config(&request);
        let capacity = request.buffer_size.max(MAX_CYCLE_FRAMES);
        let stream = match self.config.sample_format() {
            SampleFormat::F32 => {
                build_stream::<f32>(&self.device, &stream_config, renderer, capacity)
            }
            SampleFormat::I16 => {
                build_stream::<i16>(&self.device, &stream_config, renderer, capacity)
            }
            SampleFormat::U16 => {
                build_stream::<u16>(&self.device, &stream_config, renderer, capacity)
            }
            other => {
                return Err(DriverError::Config(format!(
                    "unsupported sample format: {:?}",
                    other
                )))
            }
        }
        .map_err(|e| DriverError::BuildStream(e.to_string()))?;

        stream
            .play()
            .map_err(|e| DriverError::PlayStream(e.to_string()))?;

        // 0 while the device picks its own size.
        self.buffer_size = match stream_config.buffer_size {
            cpal::BufferSize::Fixed(frames) => frames as usize,
            cpal::BufferSize::Default => 0,
        };
        self.stream = Some(stream);
        info!(
            "{}: stream started ({} frames requested)",
            self.name, request.buffer_size
        );
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                warn!("{}: failed to pause stream: {}", self.name, e);
            }
            drop(stream);
            info!("{}: stream stopped", self.name);
        }
    }
}

impl Drop for CpalDriver {
    fn drop(&mut self) {
        self.stop();
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    stream_config: &cpal::StreamConfig,
    renderer: Renderer,
    capacity: usize,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = stream_config.channels as usize;
    // Allocated here, never on the audio thread.
    let mut left = vec![0.0f32; capacity];
    let mut right = vec![0.0f32; capacity];
    let mut origin: Option<StreamInstant> = None;

    device.build_output_stream(
        stream_config,
        move |data: &mut [T], info: &cpal::OutputCallbackInfo| {
            let now = info.timestamp().callback;
            let zero = *origin.get_or_insert(now);
            let host_time = now
                .duration_since(&zero)
                .map_or(0, |d| d.as_nanos() as u64);

            let num_frames = data.len() / channels;
            let output = if num_frames > capacity {
                Err(BufferError::TooManyFrames {
                    requested: num_frames,
                    capacity,
                })
            } else {
                StereoBuffer::new(&mut left[..num_frames], &mut right[..num_frames])
                    .ok_or(BufferError::ChannelMismatch(channels))
            };

            match renderer.render(output, host_time, num_frames) {
                RenderStatus::Ok => {
                    interleave(data, &left[..num_frames], &right[..num_frames], channels)
                }
                RenderStatus::Failed(_) => data.iter_mut().for_each(|s| *s = T::EQUILIBRIUM),
            }
        },
        |err| error!("cpal stream error: {}", err),
        None,
    )
}

/// Write the stereo pair into an interleaved device buffer. Mono devices get
/// the average of both channels, channels past the second get silence.
fn interleave<T>(data: &mut [T], left: &[f32], right: &[f32], channels: usize)
where
    T: SizedSample + FromSample<f32>,
{
    for (frame, (&l, &r)) in data
        .chunks_mut(channels)
        .zip(left.iter().zip(right.iter()))
    {
        if channels == 1 {
            frame[0] = T::from_sample(0.5 * (l + r));
            continue;
        }
        frame[0] = T::from_sample(l);
        frame[1] = T::from_sample(r);
        for s in frame[2..].iter_mut() {
            *s = T::EQUILIBRIUM;
        }
    }
}
