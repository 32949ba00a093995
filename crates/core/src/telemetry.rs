//! Telemetry sink contract: breadcrumbs for skipped events, error capture.

use std::sync::Arc;

/// Destination for diagnostic breadcrumbs and captured errors.
///
/// The core never aborts a projection batch on a single bad event; it leaves
/// a breadcrumb here and moves on. Implementations forward to whatever
/// error-reporting backend the host application uses.
pub trait TelemetrySink: Send + Sync {
    /// Record a breadcrumb with a category, message, and structured data.
    fn breadcrumb(&self, category: &str, message: &str, data: serde_json::Value);

    /// Capture a non-fatal error with context.
    fn capture(&self, error: &crate::errors::Error, context: &str);
}

/// Sink that routes breadcrumbs to the log facade and drops captures.
#[derive(Debug, Default, Clone)]
pub struct LogTelemetry;

impl TelemetrySink for LogTelemetry {
    fn breadcrumb(&self, category: &str, message: &str, data: serde_json::Value) {
        log::debug!("[{}] {} {}", category, message, data);
    }

    fn capture(&self, error: &crate::errors::Error, context: &str) {
        log::error!("[telemetry] {}: {}", context, error);
    }
}

/// Shared telemetry handle used across the projector and sync engine.
pub type SharedTelemetry = Arc<dyn TelemetrySink>;
