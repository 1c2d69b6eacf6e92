//! Logging port and the `tracing` subscriber setup.
//!
//! The engine never calls a global logger directly. It reports through an
//! injected [`EventLog`], so embedders can capture or silence events.
//! [`TracingLog`] forwards to `tracing`; the `rh` binary installs a
//! subscriber with [`init_tracing`].

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "rag_harness=info";

/// Sink for engine events.
pub trait EventLog: Send + Sync {
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
}

/// Forwards events to `tracing` under the `rag_harness` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLog;

impl EventLog for TracingLog {
    fn info(&self, message: &str) {
        tracing::info!(target: "rag_harness", "{}", message);
    }

    fn warn(&self, message: &str) {
        tracing::warn!(target: "rag_harness", "{}", message);
    }

    fn error(&self, message: &str) {
        tracing::error!(target: "rag_harness", "{}", message);
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLog;

impl EventLog for NullLog {
    fn info(&self, _message: &str) {}
    fn warn(&self, _message: &str) {}
    fn error(&self, _message: &str) {}
}

/// Shared handle used by the engine and its collaborators.
pub type SharedLog = Arc<dyn EventLog>;

/// Install a stderr `fmt` subscriber filtered by `RUST_LOG`, falling back to
/// [`DEFAULT_FILTER`]. Stdout stays free for command output.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
