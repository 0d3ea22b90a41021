//! Error types

use std::io;

use thiserror::Error;

use crate::driver::DriverError;

/// Errors reported by [`AudioHost`](crate::AudioHost) lifecycle operations.
///
/// When one of these is returned from a start, the host is left stopped with
/// no worker or busy thread alive.
#[derive(Error, Debug)]
pub enum HostError {
    /// The OS refused to create a pool thread
    #[error("Failed to spawn {role} thread: {source}")]
    ThreadSpawn {
        role: &'static str,
        #[source]
        source: io::Error,
    },

    /// The driver could not be started
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// A buffer size of zero frames was requested
    #[error("Invalid preferred buffer size: {0} frames")]
    InvalidBufferSize(usize),
}

/// Result type for host operations
pub type HostResult<T> = Result<T, HostError>;
