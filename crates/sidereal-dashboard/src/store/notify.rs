//! Change notification for store readers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;

use crate::model::Application;

/// Telemetry signal type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    /// Trace spans.
    Traces,
    /// Metrics (gauges, counters, histograms).
    Metrics,
    /// Log records.
    Logs,
}

impl Signal {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Traces => "traces",
            Self::Metrics => "metrics",
            Self::Logs => "logs",
        }
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Event broadcast to subscribers after the store changes.
#[derive(Debug, Clone)]
pub enum StoreChange {
    /// A previously unseen resource identity was ingested.
    ApplicationAdded {
        application: Arc<Application>,
        version: u64,
    },
    /// Entities of one signal were stored.
    Updated {
        signal: Signal,
        version: u64,
        /// Keys of the applications that received data.
        applications: Vec<String>,
    },
    /// Everything was dropped.
    Cleared { version: u64 },
}

impl StoreChange {
    pub const fn version(&self) -> u64 {
        match self {
            Self::ApplicationAdded { version, .. }
            | Self::Updated { version, .. }
            | Self::Cleared { version } => *version,
        }
    }
}

/// Version counter plus broadcast channel.
#[derive(Debug)]
pub(crate) struct Notifier {
    version: AtomicU64,
    sender: broadcast::Sender<StoreChange>,
}

impl Notifier {
    pub(crate) fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            version: AtomicU64::new(0),
            sender,
        }
    }

    pub(crate) fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Advance the version by one and return the new value.
    pub(crate) fn bump(&self) -> u64 {
        self.version.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.sender.subscribe()
    }

    pub(crate) fn send(&self, change: StoreChange) {
        // No receivers is fine.
        let _ = self.sender.send(change);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bump_is_monotonic() {
        let notifier = Notifier::new(4);
        assert_eq!(notifier.version(), 0);
        assert_eq!(notifier.bump(), 1);
        assert_eq!(notifier.bump(), 2);
        assert_eq!(notifier.version(), 2);
    }

    #[tokio::test]
    async fn subscribers_receive_changes() {
        let notifier = Notifier::new(4);
        let mut rx = notifier.subscribe();
        let version = notifier.bump();
        notifier.send(StoreChange::Cleared { version });

        let change = rx.recv().await.unwrap();
        assert_eq!(change.version(), 1);
    }

    #[test]
    fn send_without_subscribers_is_silent() {
        let notifier = Notifier::new(4);
        notifier.send(StoreChange::Cleared { version: 1 });
    }
}
