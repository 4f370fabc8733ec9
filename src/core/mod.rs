// src/core/mod.rs
pub mod error;
pub mod lock;
pub mod signal;
pub mod timestamp;

pub use error::{RecorderError, RecorderResult};
pub use signal::Signal;
