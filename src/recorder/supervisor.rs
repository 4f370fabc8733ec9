// src/recorder/supervisor.rs
//
// Owns the encoder process: spawns it on a supervising thread, respawns it
// after unexpected exits and tears it down with SIGTERM, then SIGKILL.

use std::fmt;
use std::io::{self, PipeReader, PipeWriter};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::bounded;
use log::{debug, error, info, warn};

use super::command::encoder_args;
use super::config::RecorderConfig;
use super::parser::{LineEvent, parse_line, pump_lines};
use crate::core::error::{RecorderError, RecorderResult};
use crate::core::lock::lock_mutex;
use crate::core::signal::Signal;

/// Pause before respawning a process that exited on its own.
pub const RESPAWN_BACKOFF: Duration = Duration::from_secs(3);
/// Bounded wait for the supervising thread after each termination attempt.
pub const JOIN_GRACE: Duration = Duration::from_secs(3);

const LINE_QUEUE_CAPACITY: usize = 1024;
const JOIN_POLL: Duration = Duration::from_millis(20);
const REAP_POLL: Duration = Duration::from_millis(50);

pub type LineObserver = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Crashed,
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SupervisorState::Stopped => "stopped",
            SupervisorState::Starting => "starting",
            SupervisorState::Running => "running",
            SupervisorState::Stopping => "stopping",
            SupervisorState::Crashed => "crashed",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Copy)]
enum Termination {
    Graceful,
    Forced,
}

/// State shared between the owning `ProcessSupervisor` and its threads.
struct Shared {
    program: String,
    args: Vec<String>,
    /// Desired-running flag. Cleared by `stop` before any waiter is woken.
    running: AtomicBool,
    state: Mutex<SupervisorState>,
    child: Mutex<Option<Child>>,
    current: Mutex<Option<PathBuf>>,
    observer: Mutex<Option<LineObserver>>,
    wake: Signal,
}

impl Shared {
    fn set_state(&self, state: SupervisorState) {
        *lock_mutex(&self.state, "supervisor.state") = state;
    }

    fn is_wanted(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn signal_child(&self, how: Termination) {
        let mut slot = lock_mutex(&self.child, "supervisor.signal_child");
        let Some(child) = slot.as_mut() else {
            return;
        };
        let result = match how {
            Termination::Graceful => terminate(child),
            Termination::Forced => child.kill(),
        };
        if let Err(e) = result {
            warn!("[supervisor] signalling pid {} failed: {}", child.id(), e);
        }
    }

    fn handle_line(&self, line: &str) {
        debug!("[supervisor] encoder: {}", line);
        match parse_line(line) {
            LineEvent::SegmentOpened(path) => {
                *lock_mutex(&self.current, "supervisor.current") = Some(PathBuf::from(path));
                debug!("[supervisor] new segment file: {}", path);
            }
            LineEvent::MalformedSegment => {
                error!("[supervisor] can't find file name in line \"{}\"", line);
            }
            LineEvent::Other => {
                let observer = lock_mutex(&self.observer, "supervisor.observer").clone();
                if let Some(observer) = observer {
                    observer(line);
                }
            }
        }
    }
}

#[cfg(unix)]
fn terminate(child: &mut Child) -> io::Result<()> {
    use nix::sys::signal::{self as nix_signal, kill};
    use nix::unistd::Pid;

    let pid = i32::try_from(child.id())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
    kill(Pid::from_raw(pid), nix_signal::Signal::SIGTERM).map_err(io::Error::from)
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) -> io::Result<()> {
    child.kill()
}

pub struct ProcessSupervisor {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl ProcessSupervisor {
    /// Supervisor for the ffmpeg segment recorder described by `cfg`.
    /// Fails if the input protocol is not supported.
    pub fn new(cfg: &RecorderConfig) -> RecorderResult<Self> {
        let args = encoder_args(cfg)?;
        Ok(Self::with_command(&cfg.program, args))
    }

    /// Supervisor over an arbitrary command whose output follows the
    /// segment muxer's log format.
    pub fn with_command<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            shared: Arc::new(Shared {
                program: program.to_string(),
                args: args.into_iter().map(Into::into).collect(),
                running: AtomicBool::new(false),
                state: Mutex::new(SupervisorState::Stopped),
                child: Mutex::new(None),
                current: Mutex::new(None),
                observer: Mutex::new(None),
                wake: Signal::new(),
            }),
            worker: None,
        }
    }

    /// Receives every encoder line that is not a segment event.
    pub fn set_line_observer<F>(&mut self, observer: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        *lock_mutex(&self.shared.observer, "supervisor.observer") = Some(Arc::new(observer));
    }

    pub fn command_line(&self) -> String {
        self.shared.command_line()
    }

    pub fn start(&mut self) -> RecorderResult<()> {
        if self.shared.is_wanted() {
            return Ok(());
        }
        if self.worker.is_some() {
            return Err(RecorderError::NotStopped);
        }

        self.shared.running.store(true, Ordering::SeqCst);
        self.shared.wake.clear();
        self.shared.set_state(SupervisorState::Starting);

        let shared = self.shared.clone();
        let spawned = thread::Builder::new()
            .name("recorder-supervisor".into())
            .spawn(move || supervise(shared));

        match spawned {
            Ok(handle) => {
                self.worker = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.shared.running.store(false, Ordering::SeqCst);
                self.shared.set_state(SupervisorState::Stopped);
                Err(RecorderError::io("spawning supervisor thread", e))
            }
        }
    }

    /// Stops the process and waits for the supervising thread.
    ///
    /// A zero `timeout` waits as long as it takes. Otherwise, once more than
    /// `timeout` has elapsed, returns `StallTimeout` with a kill already
    /// issued; a later `stop` resumes waiting for the same thread.
    pub fn stop(&mut self, timeout: Duration) -> RecorderResult<()> {
        debug!("[supervisor] stop requested");
        self.shared.running.store(false, Ordering::SeqCst);
        self.shared.wake.set();

        if let Some(worker) = &self.worker {
            self.shared.set_state(SupervisorState::Stopping);
            let started = Instant::now();

            self.shared.signal_child(Termination::Graceful);
            let mut finished = wait_finished(worker, JOIN_GRACE);
            while !finished {
                if !timeout.is_zero() && started.elapsed() > timeout {
                    self.shared.signal_child(Termination::Forced);
                    return Err(RecorderError::StallTimeout { timeout });
                }
                error!("[supervisor] can't terminate the recording process, killing it");
                self.shared.signal_child(Termination::Forced);
                finished = wait_finished(worker, JOIN_GRACE);
            }

            if let Some(worker) = self.worker.take() {
                if worker.join().is_err() {
                    error!("[supervisor] supervising thread panicked");
                }
            }
        }

        *lock_mutex(&self.shared.current, "supervisor.current") = None;
        *lock_mutex(&self.shared.child, "supervisor.child") = None;
        self.shared.set_state(SupervisorState::Stopped);
        debug!("[supervisor] stop finished");
        Ok(())
    }

    pub fn restart(&mut self, timeout: Duration) -> RecorderResult<()> {
        self.stop(timeout)?;
        self.start()
    }

    pub fn current_filename(&self) -> Option<PathBuf> {
        lock_mutex(&self.shared.current, "supervisor.current").clone()
    }

    pub fn is_running(&self) -> bool {
        self.shared.is_wanted()
            && lock_mutex(&self.shared.child, "supervisor.child").is_some()
            && self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    pub fn state(&self) -> SupervisorState {
        *lock_mutex(&self.shared.state, "supervisor.state")
    }
}

impl Drop for ProcessSupervisor {
    fn drop(&mut self) {
        if self.worker.is_some() {
            if let Err(e) = self.stop(Duration::ZERO) {
                error!("[supervisor] stop on drop failed: {}", e);
            }
        }
    }
}

fn wait_finished(worker: &JoinHandle<()>, limit: Duration) -> bool {
    let deadline = Instant::now() + limit;
    while !worker.is_finished() {
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(JOIN_POLL);
    }
    true
}

/// Body of the supervising thread: run the encoder until it exits and
/// respawn it after `RESPAWN_BACKOFF` for as long as it is wanted.
fn supervise(shared: Arc<Shared>) {
    info!("[supervisor] recording process starts");

    while shared.is_wanted() {
        shared.set_state(SupervisorState::Starting);
        info!("[supervisor] running command \"{}\"", shared.command_line());

        let outcome = run_once(&shared);
        if !shared.is_wanted() {
            break;
        }

        match outcome {
            Ok(Some(status)) => error!(
                "[supervisor] recording process stopped unexpectedly ({}), restarting after {}s",
                status,
                RESPAWN_BACKOFF.as_secs()
            ),
            Ok(None) => error!(
                "[supervisor] recording process vanished, restarting after {}s",
                RESPAWN_BACKOFF.as_secs()
            ),
            Err(e) => error!(
                "[supervisor] {}, retrying after {}s",
                e,
                RESPAWN_BACKOFF.as_secs()
            ),
        }
        shared.set_state(SupervisorState::Crashed);
        shared.wake.wait_timeout(RESPAWN_BACKOFF);
    }

    info!("[supervisor] recording process stopped");
}

/// One encoder lifetime: spawn, stream its output, reap it.
fn run_once(shared: &Shared) -> RecorderResult<Option<ExitStatus>> {
    let (reader, writer) = io::pipe().map_err(|e| RecorderError::io("creating output pipe", e))?;
    let mut child = spawn_encoder(shared, writer)?;

    {
        let mut slot = lock_mutex(&shared.child, "supervisor.child");
        if !shared.is_wanted() {
            // stop() ran between spawn and registration
            drop(slot);
            if let Err(e) = child.kill() {
                warn!("[supervisor] killing pid {} failed: {}", child.id(), e);
            }
            let status = child
                .wait()
                .map_err(|e| RecorderError::io("reaping encoder", e))?;
            return Ok(Some(status));
        }
        *slot = Some(child);
    }
    shared.set_state(SupervisorState::Running);

    stream_output(shared, reader);
    reap(shared)
}

/// Spawns the encoder with stdout and stderr joined on `writer`. The
/// `Command` (and with it the parent's copies of the write end) is dropped
/// before returning so the reader sees end of stream when the child exits.
fn spawn_encoder(shared: &Shared, writer: PipeWriter) -> RecorderResult<Child> {
    let spawn_err = |source| RecorderError::Spawn {
        program: shared.program.clone(),
        source,
    };
    let stderr = writer.try_clone().map_err(spawn_err)?;

    let mut cmd = Command::new(&shared.program);
    cmd.args(&shared.args)
        .stdin(Stdio::null())
        .stdout(Stdio::from(writer))
        .stderr(Stdio::from(stderr));
    cmd.spawn().map_err(spawn_err)
}

/// Runs the reader thread and applies every line it produces until the
/// pipe closes. The reader is joined before returning.
fn stream_output(shared: &Shared, reader: PipeReader) {
    let (tx, rx) = bounded::<String>(LINE_QUEUE_CAPACITY);

    let spawned = thread::Builder::new()
        .name("recorder-reader".into())
        .spawn(move || {
            if let Err(e) = pump_lines(reader, tx) {
                warn!("[supervisor] reading encoder output failed: {}", e);
            }
        });

    let handle = match spawned {
        Ok(handle) => handle,
        Err(e) => {
            error!("[supervisor] can't start output reader: {}", e);
            shared.signal_child(Termination::Forced);
            return;
        }
    };

    debug!("[supervisor] output reader started");
    for line in rx.iter() {
        shared.handle_line(&line);
    }
    if handle.join().is_err() {
        error!("[supervisor] output reader panicked");
    }
    debug!("[supervisor] output reader stopped");
}

/// Waits for the registered child to exit without holding the slot lock,
/// so `stop` can still signal it.
fn reap(shared: &Shared) -> RecorderResult<Option<ExitStatus>> {
    loop {
        {
            let mut slot = lock_mutex(&shared.child, "supervisor.reap");
            let Some(child) = slot.as_mut() else {
                return Ok(None);
            };
            match child.try_wait() {
                Ok(Some(status)) => {
                    slot.take();
                    return Ok(Some(status));
                }
                Ok(None) => {}
                Err(e) => {
                    slot.take();
                    return Err(RecorderError::io("waiting for encoder", e));
                }
            }
        }
        thread::sleep(REAP_POLL);
    }
}
