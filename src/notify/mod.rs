// src/notify/mod.rs

use std::fmt;
use std::sync::Arc;

use log::error;

pub mod slack;

pub use slack::SlackNotifier;

/// Receiver of operator notifications.
pub trait NotificationSink: Send + Sync {
    fn info(&self, title: &str, body: &str) -> anyhow::Result<()>;
    fn warning(&self, title: &str, body: &str) -> anyhow::Result<()>;
    fn alert(&self, title: &str, body: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warning,
    Alert,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Info => f.write_str("info"),
            Level::Warning => f.write_str("warning"),
            Level::Alert => f.write_str("alert"),
        }
    }
}

/// Front for an optional sink. Delivery failures are logged here and never
/// reach the caller.
#[derive(Clone, Default)]
pub struct Notifier {
    sink: Option<Arc<dyn NotificationSink>>,
}

impl Notifier {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self { sink: Some(sink) }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    pub fn info(&self, title: &str, body: &str) {
        self.deliver(Level::Info, title, body);
    }

    pub fn warning(&self, title: &str, body: &str) {
        self.deliver(Level::Warning, title, body);
    }

    pub fn alert(&self, title: &str, body: &str) {
        self.deliver(Level::Alert, title, body);
    }

    fn deliver(&self, level: Level, title: &str, body: &str) {
        let Some(sink) = &self.sink else {
            return;
        };
        let result = match level {
            Level::Info => sink.info(title, body),
            Level::Warning => sink.warning(title, body),
            Level::Alert => sink.alert(title, body),
        };
        if let Err(e) = result {
            error!("[notify] {} \"{}\" not delivered: {:#}", level, title, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        sent: Mutex<Vec<(Level, String)>>,
        fail: bool,
    }

    impl Recording {
        fn push(&self, level: Level, title: &str) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push((level, title.to_string()));
            if self.fail {
                anyhow::bail!("channel_not_found");
            }
            Ok(())
        }
    }

    impl NotificationSink for Recording {
        fn info(&self, title: &str, _body: &str) -> anyhow::Result<()> {
            self.push(Level::Info, title)
        }
        fn warning(&self, title: &str, _body: &str) -> anyhow::Result<()> {
            self.push(Level::Warning, title)
        }
        fn alert(&self, title: &str, _body: &str) -> anyhow::Result<()> {
            self.push(Level::Alert, title)
        }
    }

    #[test]
    fn test_routes_levels() {
        let sink = Arc::new(Recording::default());
        let notifier = Notifier::new(sink.clone());

        notifier.info("a", "");
        notifier.warning("b", "");
        notifier.alert("c", "");

        assert_eq!(
            *sink.sent.lock().unwrap(),
            vec![
                (Level::Info, "a".to_string()),
                (Level::Warning, "b".to_string()),
                (Level::Alert, "c".to_string()),
            ]
        );
    }

    #[test]
    fn test_failures_are_swallowed() {
        let sink = Arc::new(Recording {
            fail: true,
            ..Default::default()
        });
        let notifier = Notifier::new(sink.clone());

        notifier.alert("Recording Starts", "body");
        notifier.alert("Recording Starts", "body");

        assert_eq!(sink.sent.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_disabled_is_noop() {
        let notifier = Notifier::disabled();
        assert!(!notifier.is_enabled());
        notifier.alert("x", "y");
    }
}
