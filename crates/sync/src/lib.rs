//! taskdeck-sync: bidirectional relay transport for the event log.
//!
//! Pushes pending local events (socket optimistically, HTTP
//! authoritatively), pulls remote events by cursor with
//! checkpoint-after-projection semantics, and keeps a persistent socket with
//! heartbeat and jittered-backoff reconnect.

mod client;
mod engine;
mod error;
mod socket;
mod types;

pub use client::RelayClient;
pub use engine::{DeviceIdProvider, SyncEngine, SyncEngineConfig, SyncEngineDeps, TokenProvider};
pub use error::{Result, RetryClass, SyncError};
pub use types::{
    ConnectionStatus, EngineStatus, EventEnvelope, PullRequest, PullResponse, PushResponse,
    WireEvent,
};
