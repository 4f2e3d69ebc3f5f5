// ─── Status & Progress ───
// Caller-supplied sink for human readable status lines and progress updates.
// Callbacks run on the install flow itself and must return quickly.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;

/// Progress of the current stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Progress {
    /// Fraction in `0.0..=1.0`.
    Fraction(f64),
    /// Total size is unknown.
    Indeterminate,
}

impl Progress {
    pub fn of(done: u64, total: u64) -> Self {
        if total == 0 {
            Progress::Indeterminate
        } else {
            Progress::Fraction((done as f64 / total as f64).clamp(0.0, 1.0))
        }
    }
}

pub trait StatusSink: Send + Sync {
    fn status(&self, message: &str);
    fn progress(&self, progress: Progress);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl StatusSink for NoopSink {
    fn status(&self, _message: &str) {}
    fn progress(&self, _progress: Progress) {}
}

/// Adapts a pair of closures into a [`StatusSink`].
pub struct StatusCallbacks<S, P> {
    on_status: S,
    on_progress: P,
}

impl<S, P> StatusCallbacks<S, P>
where
    S: Fn(&str) + Send + Sync,
    P: Fn(Progress) + Send + Sync,
{
    pub fn new(on_status: S, on_progress: P) -> Self {
        Self {
            on_status,
            on_progress,
        }
    }
}

impl<S, P> StatusSink for StatusCallbacks<S, P>
where
    S: Fn(&str) + Send + Sync,
    P: Fn(Progress) + Send + Sync,
{
    fn status(&self, message: &str) {
        (self.on_status)(message)
    }

    fn progress(&self, progress: Progress) {
        (self.on_progress)(progress)
    }
}

/// Payload forwarded to a frontend listener.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    Status {
        message: String,
        at: DateTime<Utc>,
    },
    Progress {
        progress: Progress,
        at: DateTime<Utc>,
    },
}

/// Forwards every update as a [`LifecycleEvent`] over an unbounded channel, so
/// the UI side can drain it on its own task.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<LifecycleEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<LifecycleEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl StatusSink for ChannelSink {
    fn status(&self, message: &str) {
        // A closed receiver only means nobody is listening anymore.
        let _ = self.tx.send(LifecycleEvent::Status {
            message: message.to_string(),
            at: Utc::now(),
        });
    }

    fn progress(&self, progress: Progress) {
        let _ = self.tx.send(LifecycleEvent::Progress {
            progress,
            at: Utc::now(),
        });
    }
}

/// `12.3MB` style rendering used in download status lines.
pub fn format_megabytes(bytes: u64) -> String {
    format!("{:.1}MB", bytes as f64 / (1024.0 * 1024.0))
}
