// src/core/error.rs
use std::io;
use std::time::Duration;

use thiserror::Error;

pub type RecorderResult<T> = Result<T, RecorderError>;

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("configuration error: {message}")]
    Configuration { message: String },
    #[error("recording process did not stop within {timeout:?}")]
    StallTimeout { timeout: Duration },
    #[error("a previous recording process is still being stopped")]
    NotStopped,
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl RecorderError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// True for the error `stop`/`restart` return when forced termination
    /// has not converged yet.
    pub fn is_stall_timeout(&self) -> bool {
        matches!(self, Self::StallTimeout { .. })
    }
}
