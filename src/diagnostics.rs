//! Leveled diagnostics publishing.
//!
//! Diagnostics are an injectable sink registry rather than a global logger:
//! each engine owns a [`DiagnosticsHub`] and callers subscribe sinks with a
//! minimum severity. Every published message is also mirrored to the [`log`]
//! facade under the `wsengine` target, so existing log infrastructure picks
//! the engine up without a subscription.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Informational messages, e.g. connection closure.
pub const LEVEL_INFO: usize = 1;
/// Something was tolerated but is worth surfacing, e.g. a rejected handshake.
pub const LEVEL_WARNING: usize = 5;
/// The engine could not continue.
pub const LEVEL_ERROR: usize = 10;

/// Receives `(level, message)` pairs at or above the subscribed level.
pub type DiagnosticSink = Arc<dyn Fn(usize, &str) + Send + Sync>;

/// Identifies one subscription for later removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscriber {
    id: u64,
    min_level: usize,
    sink: DiagnosticSink,
}

/// Fan-out point for an engine's diagnostic messages.
#[derive(Default)]
pub struct DiagnosticsHub {
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
}

impl DiagnosticsHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `sink` for messages at `min_level` and above.
    pub fn subscribe(&self, sink: DiagnosticSink, min_level: usize) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.locked().push(Subscriber {
            id,
            min_level,
            sink,
        });
        SubscriptionId(id)
    }

    /// Removes a subscription; unknown ids are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.locked().retain(|subscriber| subscriber.id != id.0);
    }

    /// Delivers `message` to every matching sink and mirrors it to `log`.
    ///
    /// Sinks are copied out of the registry before being invoked, so a sink
    /// may subscribe or unsubscribe reentrantly.
    pub fn publish(&self, level: usize, message: &str) {
        if level >= LEVEL_ERROR {
            log::error!(target: "wsengine", "{message}");
        } else if level >= LEVEL_WARNING {
            log::warn!(target: "wsengine", "{message}");
        } else {
            log::debug!(target: "wsengine", "{message}");
        }
        let sinks: Vec<DiagnosticSink> = self
            .locked()
            .iter()
            .filter(|subscriber| subscriber.min_level <= level)
            .map(|subscriber| subscriber.sink.clone())
            .collect();
        for sink in sinks {
            sink(level, message);
        }
    }

    fn locked(&self) -> std::sync::MutexGuard<'_, Vec<Subscriber>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
