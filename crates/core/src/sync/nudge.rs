//! Fire-and-forget push trigger from services to the sync engine.

use tokio::sync::mpsc;

/// Sender half handed to services; each local mutation nudges the engine to
/// drain the pending queue immediately instead of waiting for the periodic
/// fallback. Nudges are lossy on purpose: a dropped nudge is covered by the
/// periodic drain.
#[derive(Debug, Clone)]
pub struct PushNudge {
    tx: mpsc::UnboundedSender<()>,
}

impl PushNudge {
    /// Create a nudge channel; the receiver goes to the sync engine.
    pub fn channel() -> (PushNudge, mpsc::UnboundedReceiver<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (PushNudge { tx }, rx)
    }

    /// A nudge with no listener, for offline/test configurations.
    pub fn disconnected() -> PushNudge {
        let (tx, _rx) = mpsc::unbounded_channel();
        PushNudge { tx }
    }

    pub fn push(&self) {
        let _ = self.tx.send(());
    }
}
