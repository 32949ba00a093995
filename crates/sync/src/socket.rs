//! Persistent socket channel to the relay.
//!
//! Outbound frames carry the same `{events: [...]}` envelope as HTTP push;
//! inbound frames are either `{type: "ping"}` (ignored) or single-event
//! envelopes routed to the projector through the engine.

use crate::error::{Result, SyncError};
use crate::types::{EventEnvelope, WireEvent};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

/// Inbound notifications from the socket reader task.
#[derive(Debug)]
pub(crate) enum SocketEvent {
    /// A frame carrying events for projection.
    Frame(Vec<WireEvent>),
    /// The connection closed or failed; the engine should reconnect.
    Closed,
}

/// Handle to a live socket connection. Dropping it tears the writer down.
pub(crate) struct Socket {
    outbound: mpsc::UnboundedSender<Message>,
}

impl Socket {
    /// Open the socket and spawn its reader/writer tasks. Returns the handle
    /// and the inbound event stream.
    pub(crate) async fn connect(url: &str) -> Result<(Socket, mpsc::Receiver<SocketEvent>)> {
        let (stream, _) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(SyncError::socket)?;
        let (mut write, mut read) = stream.split();

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();
        let (in_tx, in_rx) = mpsc::channel::<SocketEvent>(64);

        tokio::spawn(async move {
            while let Some(message) = out_rx.recv().await {
                if let Err(err) = write.send(message).await {
                    log::debug!("[sync] socket send failed: {}", err);
                    break;
                }
            }
        });

        tokio::spawn(async move {
            loop {
                match read.next().await {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(events) = parse_frame(&text) {
                            if in_tx.send(SocketEvent::Frame(events)).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        log::info!("[sync] socket closed by relay: {:?}", frame);
                        let _ = in_tx.send(SocketEvent::Closed).await;
                        break;
                    }
                    None => {
                        log::info!("[sync] socket stream ended");
                        let _ = in_tx.send(SocketEvent::Closed).await;
                        break;
                    }
                    Some(Err(err)) => {
                        log::warn!("[sync] socket read error: {}", err);
                        let _ = in_tx.send(SocketEvent::Closed).await;
                        break;
                    }
                    // Binary and protocol-level ping/pong frames are ignored.
                    _ => {}
                }
            }
        });

        Ok((Socket { outbound: out_tx }, in_rx))
    }

    /// Optimistic push of an event envelope; failures are the caller's to
    /// log, HTTP remains authoritative.
    pub(crate) fn send_envelope(&self, envelope: &EventEnvelope) -> Result<()> {
        let text = serde_json::to_string(envelope)?;
        self.outbound
            .send(Message::Text(text.into()))
            .map_err(|_| SyncError::socket("socket writer is gone"))
    }

    /// Application-level heartbeat frame.
    pub(crate) fn send_ping(&self) -> Result<()> {
        self.outbound
            .send(Message::Text(r#"{"type":"ping"}"#.into()))
            .map_err(|_| SyncError::socket("socket writer is gone"))
    }
}

/// Parse an inbound text frame. Returns `None` for ping frames and anything
/// undecodable (logged and dropped).
fn parse_frame(text: &str) -> Option<Vec<WireEvent>> {
    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(err) => {
            log::debug!("[sync] dropping undecodable socket frame: {}", err);
            return None;
        }
    };
    if value.get("type").and_then(|v| v.as_str()) == Some("ping") {
        return None;
    }
    // Single-event envelopes share the push shape; tolerate a bare event too.
    if let Ok(envelope) = serde_json::from_value::<EventEnvelope>(value.clone()) {
        return Some(envelope.events);
    }
    match serde_json::from_value::<WireEvent>(value) {
        Ok(event) => Some(vec![event]),
        Err(err) => {
            log::debug!("[sync] dropping unrecognized socket frame: {}", err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_frames_are_ignored() {
        assert!(parse_frame(r#"{"type":"ping"}"#).is_none());
    }

    #[test]
    fn envelope_frames_yield_events() {
        let frame = r#"{
            "events": [{
                "id": "e1",
                "user_id": "u1",
                "device_id": "d1",
                "app_id": "taskdeck",
                "ts": "2026-03-01T10:20:30Z",
                "type": "stack.updated",
                "payload": {"id": "s1"},
                "payload_version": 1
            }]
        }"#;
        let events = parse_frame(frame).expect("events");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "e1");
    }

    #[test]
    fn bare_event_frames_are_tolerated() {
        let frame = r#"{
            "id": "e2",
            "user_id": "u1",
            "device_id": "d1",
            "app_id": "taskdeck",
            "ts": "2026-03-01T10:20:30Z",
            "type": "tag.created",
            "payload": {"id": "t1", "name": "Work"}
        }"#;
        let events = parse_frame(frame).expect("events");
        assert_eq!(events[0].event_type, "tag.created");
    }

    #[test]
    fn garbage_frames_are_dropped() {
        assert!(parse_frame("not json").is_none());
        assert!(parse_frame(r#"{"hello": "world"}"#).is_none());
    }
}
