// src/monitor/mod.rs
//
// Periodic health loop: keeps the date directories in place, applies
// retention and restarts the recorder when its segment stops growing.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Context;
use chrono::{NaiveDateTime, TimeDelta};
use log::{error, info, warn};

use crate::core::error::RecorderResult;
use crate::core::lock::lock_mutex;
use crate::core::signal::Signal;
use crate::core::timestamp::{date_dir_name, days_to_provision, local_now};
use crate::notify::Notifier;
use crate::recorder::RetentionPolicy;
use crate::recorder::supervisor::ProcessSupervisor;

pub mod stall;

pub use stall::{Observation, StallTracker};

/// Seconds before local midnight at which tomorrow's directory is created.
pub const PROVISION_LEAD_SECS: i64 = 180;
/// Timeout handed to each restart attempt on a stall.
pub const RESTART_TIMEOUT: Duration = Duration::from_secs(5);

/// The part of the supervisor the monitor depends on.
pub trait SegmentSource: Send {
    fn current_filename(&self) -> Option<PathBuf>;
    fn restart(&mut self, timeout: Duration) -> RecorderResult<()>;
}

impl SegmentSource for ProcessSupervisor {
    fn current_filename(&self) -> Option<PathBuf> {
        ProcessSupervisor::current_filename(self)
    }

    fn restart(&mut self, timeout: Duration) -> RecorderResult<()> {
        ProcessSupervisor::restart(self, timeout)
    }
}

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub out_path: PathBuf,
    pub interval: Duration,
    pub restart_threshold: Duration,
    /// Prefix of every notification title, e.g. "IP Cam front-door".
    pub label: String,
}

pub struct HealthMonitor<S: SegmentSource> {
    settings: MonitorSettings,
    source: Arc<Mutex<S>>,
    notifier: Notifier,
    retention: Box<dyn RetentionPolicy>,
    tracker: StallTracker,
}

impl<S: SegmentSource> HealthMonitor<S> {
    pub fn new(
        settings: MonitorSettings,
        source: Arc<Mutex<S>>,
        notifier: Notifier,
        retention: Box<dyn RetentionPolicy>,
    ) -> Self {
        let tracker = StallTracker::new(settings.restart_threshold, Instant::now());
        Self {
            settings,
            source,
            notifier,
            retention,
            tracker,
        }
    }

    fn title(&self, what: &str) -> String {
        format!("{} - {}", self.settings.label, what)
    }

    /// Ticks every `interval` until `cancel` is set. Tick failures are
    /// reported and never end the loop.
    pub fn run(&mut self, cancel: &Signal) {
        info!("[monitor] monitoring thread starts");

        while !cancel.is_set() {
            if let Err(e) = self.tick(cancel) {
                self.report(&e);
            }
            if cancel.wait_timeout(self.settings.interval) {
                break;
            }
        }

        info!("[monitor] monitoring thread stopped");
    }

    fn report(&self, e: &anyhow::Error) {
        error!("[monitor] tick failed: {:#}", e);
        self.notifier.alert(
            &self.title("Monitoring Thread ERROR"),
            &format!("Something went wrong in the monitoring thread: {:#}", e),
        );
    }

    /// One health pass. Directory and retention failures are reported here
    /// and never keep the stall check from running.
    pub fn tick(&mut self, cancel: &Signal) -> anyhow::Result<()> {
        let now = local_now();
        if let Err(e) = self.provision_dirs(now) {
            self.report(&e);
        }
        if let Err(e) = self.retention.run(now.date()).context("applying retention") {
            self.report(&e);
        }

        let filename = lock_mutex(&self.source, "monitor.current_filename").current_filename();
        let size = self.segment_size(filename.as_deref());

        match self.tracker.observe(filename, size, Instant::now()) {
            Observation::NewFile => {
                let name = self
                    .tracker
                    .filename()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "<none>".into());
                info!("[monitor] recording into {}", name);
                self.notifier
                    .info(&self.title("Filename"), &format!("New file name: {}", name));
            }
            Observation::Growing | Observation::Idle => {}
            Observation::Stalled { elapsed, notify } => self.recover(elapsed, notify, cancel),
        }

        Ok(())
    }

    fn provision_dirs(&self, now: NaiveDateTime) -> anyhow::Result<()> {
        let (today, tomorrow) = days_to_provision(now, TimeDelta::seconds(PROVISION_LEAD_SECS));
        for day in std::iter::once(today).chain(tomorrow) {
            let dir = self.settings.out_path.join(date_dir_name(day));
            if dir.is_dir() {
                continue;
            }
            info!("[monitor] making directory {}", dir.display());
            fs::create_dir_all(&dir)
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        Ok(())
    }

    fn segment_size(&self, filename: Option<&Path>) -> u64 {
        let Some(path) = filename else {
            return 0;
        };
        match fs::metadata(path) {
            Ok(meta) => meta.len(),
            Err(e) => {
                let msg = format!("Can't get size of file {}: {}", path.display(), e);
                error!("[monitor] {}", msg);
                self.notifier.alert(&self.title("Filesize"), &msg);
                0
            }
        }
    }

    /// Restarts the recorder, retrying on every failure until it succeeds
    /// or the monitor is cancelled.
    fn recover(&mut self, elapsed: Duration, notify: bool, cancel: &Signal) {
        let name = self
            .tracker
            .filename()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<none>".into());
        let msg = format!(
            "Size of {} has not changed after {} seconds, restart the recording process now",
            name,
            elapsed.as_secs()
        );
        error!("[monitor] {}", msg);
        if notify {
            self.notifier
                .alert(&self.title("FFmpeg Recording Process Stucks"), &msg);
        }

        loop {
            let result = lock_mutex(&self.source, "monitor.restart").restart(RESTART_TIMEOUT);
            match result {
                Ok(()) => break,
                Err(e) if e.is_stall_timeout() => {
                    error!("[monitor] restart timed out: {}", e);
                    self.notifier.alert(
                        &self.title("FFmpeg Recording Restart TIMEOUT"),
                        &format!("{}\nTrying again...", e),
                    );
                }
                Err(e) => {
                    error!("[monitor] restart failed: {}", e);
                    self.notifier.alert(
                        &self.title("FFmpeg Recording Restart FAILED"),
                        &format!("{}\nTrying again...", e),
                    );
                    if cancel.wait_timeout(self.settings.interval) {
                        break;
                    }
                }
            }
            if cancel.is_set() {
                warn!("[monitor] giving up restart, monitor is shutting down");
                return;
            }
        }

        if cancel.is_set() {
            return;
        }
        self.tracker.restarted(Instant::now());
        info!("[monitor] recording process restarted successfully");
        self.notifier.info(
            &self.title("Restart"),
            "FFmpeg recording process restarted successfully",
        );
    }
}
