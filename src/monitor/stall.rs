// src/monitor/stall.rs
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    /// The supervisor reports a different segment file.
    NewFile,
    /// Same file, different size.
    Growing,
    /// Unchanged, but not for longer than the threshold yet.
    Idle,
    /// Unchanged for longer than the threshold. `elapsed` counts from the
    /// last real change; `notify` is set at most once per further multiple
    /// of the threshold.
    Stalled { elapsed: Duration, notify: bool },
}

/// Tracks the active segment's name and size across health ticks.
#[derive(Debug)]
pub struct StallTracker {
    threshold: Duration,
    filename: Option<PathBuf>,
    size: u64,
    /// Last time the filename or size changed.
    last_change: Instant,
    /// Start of the current wait; moved forward by `restarted`.
    timer: Instant,
    notified: u32,
}

impl StallTracker {
    pub fn new(threshold: Duration, now: Instant) -> Self {
        Self {
            threshold,
            filename: None,
            size: 0,
            last_change: now,
            timer: now,
            notified: 0,
        }
    }

    pub fn filename(&self) -> Option<&Path> {
        self.filename.as_deref()
    }

    pub fn observe(&mut self, filename: Option<PathBuf>, size: u64, now: Instant) -> Observation {
        if filename != self.filename {
            self.filename = filename;
            self.size = size;
            self.reset(now);
            return Observation::NewFile;
        }
        if size != self.size {
            self.size = size;
            self.reset(now);
            return Observation::Growing;
        }

        if now.saturating_duration_since(self.timer) <= self.threshold {
            return Observation::Idle;
        }

        let elapsed = now.saturating_duration_since(self.last_change);
        let ratio = elapsed.as_secs_f64() / self.threshold.as_secs_f64().max(f64::EPSILON);
        let notify = ratio > f64::from(self.notified + 1);
        if notify {
            self.notified += 1;
        }
        Observation::Stalled { elapsed, notify }
    }

    /// Records a successful restart: a fresh process starts with no segment,
    /// and gets a full threshold before it can be declared stalled again.
    /// The alert throttle keeps counting until real progress is seen.
    pub fn restarted(&mut self, now: Instant) {
        self.filename = None;
        self.size = 0;
        self.timer = now;
    }

    fn reset(&mut self, now: Instant) {
        self.last_change = now;
        self.timer = now;
        self.notified = 0;
    }
}
