//! Observability for the WAL engine
//!
//! - Structured JSON logging with typed events
//! - Lock-free counters
//! - Begin/complete scopes for long operations
//!
//! Observability never changes engine behavior: log write failures are
//! swallowed and counters have no readers on the hot path.

mod events;
mod logger;
mod metrics;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
pub use scope::ObservationScope;

/// Log a typed event at the severity it implies
pub fn log_event(event: Event, fields: &[(&str, &str)]) {
    let severity = if event.is_fatal() {
        Severity::Fatal
    } else {
        Severity::Info
    };
    Logger::log(severity, event.as_str(), fields);
}
