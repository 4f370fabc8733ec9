// src/config.rs
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};

use crate::monitor::MonitorSettings;
use crate::recorder::RecorderConfig;
use crate::recorder::config::{DEFAULT_PROGRAM, DEFAULT_SEGMENT_FORMAT};

/// Environment variable holding the Slack bot token.
pub const SLACK_TOKEN_ENV: &str = "SLACK_TOKEN";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub recorder: RecorderSection,
    #[serde(default)]
    pub monitor: MonitorSection,
    #[serde(default)]
    pub slack: Option<SlackSection>,
}

// ---------- Recorder ----------
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RecorderSection {
    #[serde(default = "default_protocol")]
    pub protocol: String,
    pub src: String,
    #[serde(default)]
    pub enable_audio: bool,
    /// Segment length in seconds.
    #[serde(default = "default_segment_time")]
    pub segment_time: u64,
    pub out_path: String,
    #[serde(default)]
    pub out_prefix: String,
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default = "default_segment_format")]
    pub segment_format: String,
}

// ---------- Monitor ----------
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MonitorSection {
    /// Seconds between health ticks.
    #[serde(default = "default_interval")]
    pub interval: u64,
    /// Days of recordings to keep.
    #[serde(default = "default_saving_period")]
    pub saving_period: u32,
    /// Seconds without segment growth before the encoder is restarted.
    #[serde(default = "default_restart_threshold")]
    pub restart_threshold: u64,
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            saving_period: default_saving_period(),
            restart_threshold: default_restart_threshold(),
        }
    }
}

// ---------- Slack ----------
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SlackSection {
    pub channel: String,
    #[serde(default)]
    pub notifee: Option<String>,
    /// Falls back to `SLACK_TOKEN` when absent.
    #[serde(default)]
    pub token: Option<String>,
}

fn default_protocol() -> String {
    "rtsp".into()
}

fn default_segment_time() -> u64 {
    1800
}

fn default_program() -> String {
    DEFAULT_PROGRAM.into()
}

fn default_segment_format() -> String {
    DEFAULT_SEGMENT_FORMAT.into()
}

fn default_interval() -> u64 {
    5
}

fn default_saving_period() -> u32 {
    15
}

fn default_restart_threshold() -> u64 {
    30
}

pub fn load(path: &str) -> anyhow::Result<Config> {
    let txt = std::fs::read_to_string(path).with_context(|| format!("reading {}", path))?;
    parse(&txt).with_context(|| format!("loading {}", path))
}

pub fn parse(txt: &str) -> anyhow::Result<Config> {
    let cfg: Config = toml::from_str(txt)?;
    cfg.validate()?;
    Ok(cfg)
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        let r = &self.recorder;
        if r.src.trim().is_empty() {
            bail!("recorder.src must not be empty");
        }
        if r.out_path.trim().is_empty() {
            bail!("recorder.out_path must not be empty");
        }
        if r.segment_time == 0 {
            bail!("recorder.segment_time must be greater than zero");
        }
        if self.monitor.interval == 0 {
            bail!("monitor.interval must be greater than zero");
        }
        if self.monitor.restart_threshold == 0 {
            bail!("monitor.restart_threshold must be greater than zero");
        }
        if let Some(slack) = &self.slack {
            if slack.channel.trim().is_empty() {
                bail!("slack.channel must not be empty");
            }
        }
        Ok(())
    }

    pub fn recorder_config(&self) -> RecorderConfig {
        let r = &self.recorder;
        RecorderConfig {
            protocol: r.protocol.clone(),
            src: r.src.clone(),
            audio_enabled: r.enable_audio,
            segment_time: r.segment_time,
            out_path: PathBuf::from(&r.out_path),
            out_prefix: r.out_prefix.clone(),
            program: r.program.clone(),
            segment_format: r.segment_format.clone(),
        }
    }

    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings {
            out_path: PathBuf::from(&self.recorder.out_path),
            interval: Duration::from_secs(self.monitor.interval),
            restart_threshold: Duration::from_secs(self.monitor.restart_threshold),
            label: self.label(),
        }
    }

    /// Title prefix for notifications.
    pub fn label(&self) -> String {
        if self.recorder.out_prefix.is_empty() {
            "IP Cam".to_string()
        } else {
            format!("IP Cam {}", self.recorder.out_prefix)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[recorder]
src = "rtsp://10.0.0.2/live"
out_path = "/data/ipcam"
"#;

    #[test]
    fn test_minimal_uses_defaults() {
        let cfg = parse(MINIMAL).unwrap();
        assert_eq!(cfg.recorder.protocol, "rtsp");
        assert_eq!(cfg.recorder.segment_time, 1800);
        assert_eq!(cfg.recorder.program, "ffmpeg");
        assert_eq!(cfg.monitor.interval, 5);
        assert_eq!(cfg.monitor.saving_period, 15);
        assert_eq!(cfg.monitor.restart_threshold, 30);
        assert!(cfg.slack.is_none());
        assert_eq!(cfg.label(), "IP Cam");
    }

    #[test]
    fn test_full_config() {
        let cfg = parse(
            r##"
[recorder]
protocol = "rtsp"
src = "rtsp://cam/stream"
enable_audio = true
segment_time = 600
out_path = "/data/front"
out_prefix = "front-door"
segment_format = "mkv"

[monitor]
interval = 10
saving_period = 7
restart_threshold = 60

[slack]
channel = "#cams"
notifee = "U123"
"##,
        )
        .unwrap();

        let rec = cfg.recorder_config();
        assert!(rec.audio_enabled);
        assert_eq!(rec.segment_time, 600);
        assert_eq!(rec.out_path, PathBuf::from("/data/front"));
        assert_eq!(rec.segment_format, "mkv");

        let mon = cfg.monitor_settings();
        assert_eq!(mon.interval, Duration::from_secs(10));
        assert_eq!(mon.restart_threshold, Duration::from_secs(60));
        assert_eq!(mon.label, "IP Cam front-door");

        let slack = cfg.slack.unwrap();
        assert_eq!(slack.notifee.as_deref(), Some("U123"));
        assert!(slack.token.is_none());
    }

    #[test]
    fn test_rejects_zero_threshold() {
        let txt = format!("{}\n[monitor]\nrestart_threshold = 0\n", MINIMAL);
        let err = parse(&txt).unwrap_err();
        assert!(err.to_string().contains("restart_threshold"));
    }

    #[test]
    fn test_rejects_missing_src() {
        assert!(parse("[recorder]\nout_path = \"/data\"\n").is_err());
    }

    #[test]
    fn test_protocol_checked_later() {
        // an unknown protocol parses; the supervisor rejects it
        let txt = MINIMAL.replace("[recorder]", "[recorder]\nprotocol = \"udp\"");
        let cfg = parse(&txt).unwrap();
        assert!(crate::recorder::ProcessSupervisor::new(&cfg.recorder_config()).is_err());
    }
}
