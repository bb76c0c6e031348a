//! Captures `tracing` events for assertions.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::field::{Field, Visit};
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

/// One recorded event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedEvent {
    /// Event level
    pub level: Level,
    /// Event target (module path by default)
    pub target: String,
    /// The `message` field, or empty
    pub message: String,
    /// Every other field, rendered as text
    pub fields: BTreeMap<String, String>,
}

impl CapturedEvent {
    /// Returns a field rendered as text.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// A layer that records every event it sees.
///
/// Clones share the same buffer, so keep one handle for assertions and
/// install another.
#[derive(Debug, Clone, Default)]
pub struct EventCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl EventCapture {
    /// Creates an empty capture.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the capture as the thread's default subscriber until the
    /// guard is dropped.
    ///
    /// The default is thread-local: use it from `current_thread` runtimes.
    #[must_use = "events are only captured while the guard is alive"]
    pub fn install(&self) -> DefaultGuard {
        let subscriber = tracing_subscriber::registry().with(self.clone());
        tracing::subscriber::set_default(subscriber)
    }

    /// Returns a snapshot of every captured event.
    #[must_use]
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.lock().clone()
    }

    /// Returns the captured events whose message is `message`.
    #[must_use]
    pub fn with_message(&self, message: &str) -> Vec<CapturedEvent> {
        self.lock()
            .iter()
            .filter(|event| event.message == message)
            .cloned()
            .collect()
    }

    /// Discards everything captured so far.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<CapturedEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S: Subscriber> Layer<S> for EventCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let metadata = event.metadata();
        self.lock().push(CapturedEvent {
            level: *metadata.level(),
            target: metadata.target().to_string(),
            message: visitor.message,
            fields: visitor.fields,
        });
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    fields: BTreeMap<String, String>,
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields
                .insert(field.name().to_string(), value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields
                .insert(field.name().to_string(), format!("{value:?}"));
        }
    }
}
