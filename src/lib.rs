// src/lib.rs
pub mod app;
pub mod config;
pub mod core;
pub mod monitor;
pub mod notify;
pub mod recorder;

pub use crate::core::error::{RecorderError, RecorderResult};
pub use crate::core::signal::Signal;
pub use monitor::{HealthMonitor, MonitorSettings, SegmentSource};
pub use notify::{NotificationSink, Notifier};
pub use recorder::{FsRetention, ProcessSupervisor, RecorderConfig, RetentionPolicy, SupervisorState};
