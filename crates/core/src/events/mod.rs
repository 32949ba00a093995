//! Append-only event log: models, payload envelopes, and the log contract.

mod log;
mod model;
mod payloads;
mod sink;

pub use log::EventLog;
pub use model::*;
pub use payloads::*;
pub use sink::{DomainEventSink, NoopDomainEventSink};
