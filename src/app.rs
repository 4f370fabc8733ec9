// src/app.rs
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::Context;
use log::{error, info, warn};

use crate::config::{Config, SLACK_TOKEN_ENV};
use crate::core::lock::lock_mutex;
use crate::core::signal::Signal;
use crate::monitor::HealthMonitor;
use crate::notify::{Notifier, SlackNotifier};
use crate::recorder::{FsRetention, ProcessSupervisor};

/// Everything the entry point, the monitor thread and the shutdown path
/// share. Owned by `main`; nothing here is process-global.
pub struct AppContext {
    pub config: Config,
    pub supervisor: Arc<Mutex<ProcessSupervisor>>,
    /// Set once on shutdown; ends the monitor loop and the main wait.
    pub shutdown: Arc<Signal>,
    pub notifier: Notifier,
}

impl AppContext {
    pub fn new(config: Config, notifier: Notifier) -> anyhow::Result<Self> {
        let mut supervisor = ProcessSupervisor::new(&config.recorder_config())?;
        supervisor.set_line_observer(|line| log::trace!("[ffmpeg] {}", line));

        Ok(Self {
            config,
            supervisor: Arc::new(Mutex::new(supervisor)),
            shutdown: Arc::new(Signal::new()),
            notifier,
        })
    }

    pub fn spawn_monitor(&self) -> anyhow::Result<JoinHandle<()>> {
        let retention = FsRetention::new(
            PathBuf::from(&self.config.recorder.out_path),
            self.config.monitor.saving_period,
        );
        let mut monitor = HealthMonitor::new(
            self.config.monitor_settings(),
            self.supervisor.clone(),
            self.notifier.clone(),
            Box::new(retention),
        );
        let shutdown = self.shutdown.clone();

        std::thread::Builder::new()
            .name("health-monitor".into())
            .spawn(move || monitor.run(&shutdown))
            .context("spawning monitor thread")
    }

    pub fn start_recording(&self) -> anyhow::Result<()> {
        {
            let mut sup = lock_mutex(&self.supervisor, "app.start");
            info!("[app] {}", sup.command_line());
            sup.start()?;
        }

        let r = &self.config;
        self.notifier.alert(
            &format!("{} - Recording Starts", r.label()),
            &format!(
                "FFmpeg Recording starts for {}, file length {} minutes, saving period {} days",
                r.recorder.out_prefix,
                r.recorder.segment_time / 60,
                r.monitor.saving_period
            ),
        );
        Ok(())
    }

    /// Blocks the calling thread until `shutdown` is set.
    pub fn wait_for_shutdown(&self) {
        let poll = Duration::from_secs(self.config.monitor.interval.max(1));
        while !self.shutdown.wait_timeout(poll) {}
    }

    /// Orderly shutdown: monitor first, then the recorder.
    pub fn shutdown(&self, monitor: Option<JoinHandle<()>>) -> anyhow::Result<()> {
        self.shutdown.set();

        if let Some(handle) = monitor {
            if handle.join().is_err() {
                error!("[app] monitor thread panicked");
            }
        }

        lock_mutex(&self.supervisor, "app.shutdown")
            .stop(Duration::ZERO)
            .context("stopping recorder")?;

        self.notifier.alert(
            &format!("{} - Recording Stops", self.config.label()),
            &format!("FFmpeg Recording for {} stopped", self.config.recorder.out_prefix),
        );
        Ok(())
    }
}

/// Slack notifier when a `[slack]` section is configured, otherwise a
/// disabled one.
pub fn build_notifier(config: &Config) -> Notifier {
    let Some(slack) = &config.slack else {
        return Notifier::disabled();
    };

    let token = slack
        .token
        .clone()
        .or_else(|| std::env::var(SLACK_TOKEN_ENV).ok())
        .unwrap_or_default();
    if token.is_empty() {
        warn!(
            "[app] slack channel {} configured without a token ({} unset)",
            slack.channel, SLACK_TOKEN_ENV
        );
    }

    Notifier::new(Arc::new(SlackNotifier::new(
        token,
        slack.channel.clone(),
        slack.notifee.clone(),
    )))
}
