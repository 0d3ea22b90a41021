//! Real-time audio render host for studying thread scheduling.
//!
//! An [`AudioHost`] owns a [`Driver`], a pool of worker threads and a pool of
//! busy threads. On every hardware buffer the driver's realtime thread runs a
//! [`Renderer`], which either processes the whole buffer itself or releases
//! the workers through a semaphore handoff and waits for them. Optionally it
//! then spins until a minimum fraction of the buffer duration has passed, so
//! the OS sees the audio threads as continuously loaded.
//!
//! Busy threads spin independently of the render cadence to keep overall CPU
//! utilization up.
//!
//! ```
//! use renderhost::{AudioHost, Callbacks, HostConfig, ManualDriver, ProcessThread};
//!
//! let driver = ManualDriver::new(48_000);
//! let cycles = driver.handle();
//!
//! let callbacks = Callbacks::new(
//!     |workers| println!("setup for {} workers", workers),
//!     |_frames| {},
//!     |thread: ProcessThread, frames| {
//!         let _ = (thread.index(), frames);
//!     },
//!     |output, _host_time, _frames| output.clear(),
//! );
//!
//! let mut host = AudioHost::with_config(
//!     driver,
//!     callbacks,
//!     HostConfig::default()
//!         .with_worker_threads(2)
//!         .with_process_in_driver_thread(false),
//! )
//! .unwrap();
//!
//! host.start().unwrap();
//! assert!(cycles.render(64).unwrap().is_ok());
//! host.stop();
//! ```

mod buffer;
mod busy;
mod callbacks;
mod config;
pub mod driver;
mod error;
mod host;
mod render;
mod semaphore;
mod workers;

pub use buffer::StereoBuffer;
pub use callbacks::{Callbacks, ProcessThread, RenderCallbacks};
pub use config::{
    HostConfig, LiveControls, DEFAULT_BUFFER_SIZE, DEFAULT_NUM_BUSY_THREADS,
    DEFAULT_NUM_WORKER_THREADS,
};
pub use driver::{
    BufferError, Driver, DriverError, ManualDriver, ManualDriverHandle, StreamRequest,
    WorkIntervalJoin,
};
pub use error::{HostError, HostResult};
pub use host::AudioHost;
pub use render::{ensure_minimum_load, RenderStatus, Renderer};
pub use semaphore::Semaphore;

#[cfg(feature = "cpal_driver")]
pub use driver::CpalDriver;
