//! Domain event sink for runtime bridges.

/// Notified after the projector applies remote events, so the host can
/// refresh derived views (e.g. reschedule local notifications when reminder
/// rows change). Optional; the core works fine with the no-op sink.
pub trait DomainEventSink: Send + Sync {
    /// One or more entities of `kind` ("stack", "task", "reminder", …)
    /// changed through projection.
    fn entities_changed(&self, kind: &str);
}

/// Default sink that ignores every notification.
#[derive(Debug, Default, Clone)]
pub struct NoopDomainEventSink;

impl DomainEventSink for NoopDomainEventSink {
    fn entities_changed(&self, _kind: &str) {}
}
