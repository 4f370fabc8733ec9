// src/recorder/config.rs
use std::path::PathBuf;
use std::str::FromStr;

use crate::core::error::RecorderError;

pub const DEFAULT_PROGRAM: &str = "ffmpeg";
pub const DEFAULT_SEGMENT_FORMAT: &str = "mp4";

/// Input transport understood by the encoder command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Rtsp,
}

impl FromStr for Protocol {
    type Err = RecorderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rtsp" => Ok(Protocol::Rtsp),
            other => Err(RecorderError::configuration(format!(
                "invalid source protocol: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Raw protocol name; validated when the supervisor is built.
    pub protocol: String,
    pub src: String,
    pub audio_enabled: bool,
    /// Segment length in seconds.
    pub segment_time: u64,
    pub out_path: PathBuf,
    pub out_prefix: String,
    pub program: String,
    pub segment_format: String,
}

impl RecorderConfig {
    pub fn new(protocol: &str, src: &str, out_path: impl Into<PathBuf>) -> Self {
        Self {
            protocol: protocol.to_string(),
            src: src.to_string(),
            audio_enabled: false,
            segment_time: 1800,
            out_path: out_path.into(),
            out_prefix: String::new(),
            program: DEFAULT_PROGRAM.to_string(),
            segment_format: DEFAULT_SEGMENT_FORMAT.to_string(),
        }
    }
}
