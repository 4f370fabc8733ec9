// src/recorder/command.rs
use std::path::{Path, PathBuf};

use super::config::{Protocol, RecorderConfig};
use crate::core::error::RecorderResult;

/// strftime pattern the segment muxer expands into
/// `<out_path>/<YYYYMMDD>/<YYYYMMDD-HHMMSS>.<ext>`.
pub fn segment_pattern(out_path: &Path, segment_format: &str) -> PathBuf {
    out_path
        .join("%Y%m%d")
        .join(format!("%Y%m%d-%H%M%S.{}", segment_format))
}

/// Builds the encoder argument vector. Fails on an unsupported protocol.
pub fn encoder_args(cfg: &RecorderConfig) -> RecorderResult<Vec<String>> {
    let protocol: Protocol = cfg.protocol.parse()?;

    let mut args: Vec<String> = Vec::with_capacity(24);
    match protocol {
        Protocol::Rtsp => args.extend(["-rtsp_transport".into(), "tcp".into()]),
    }
    args.extend(["-i".into(), cfg.src.clone()]);

    args.extend(["-c:v".into(), "copy".into()]);
    if cfg.audio_enabled {
        args.extend(["-c:a".into(), "copy".into()]);
    }

    let pattern = segment_pattern(&cfg.out_path, &cfg.segment_format);
    args.extend([
        "-f".into(),
        "segment".into(),
        "-segment_time".into(),
        cfg.segment_time.to_string(),
        "-segment_format".into(),
        cfg.segment_format.clone(),
        "-reset_timestamps".into(),
        "1".into(),
        "-segment_atclocktime".into(),
        "1".into(),
        "-strftime".into(),
        "1".into(),
        pattern.to_string_lossy().into_owned(),
    ]);

    Ok(args)
}
