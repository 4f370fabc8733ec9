// src/recorder/mod.rs

use chrono::NaiveDate;

use crate::core::error::RecorderResult;

pub trait RetentionPolicy: Send {
    fn run(&mut self, today: NaiveDate) -> RecorderResult<()>;
}

pub mod command;
pub mod config;
pub mod parser;
pub mod retention_fs;
pub mod supervisor;

pub use config::{Protocol, RecorderConfig};
pub use retention_fs::FsRetention;
pub use supervisor::{ProcessSupervisor, SupervisorState};
