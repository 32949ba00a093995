//! SQLite event log: outbound queue, inbound dedup, audit history.

mod model;
mod repository;

pub use model::{DeviceIdentityDB, EventDB};
pub use repository::{record_event_tx, EventRepository, IdentityRepository};
