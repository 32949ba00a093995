//! taskdeck-core: local-first event-sourced domain for the multi-device
//! stack/task app.
//!
//! Every mutation is recorded as an immutable event next to the domain row
//! it touches; the projector folds inbound events back into relational state
//! under per-entity last-writer-wins. Persistence and transport live in
//! sibling crates behind the traits defined here.

pub mod arcs;
pub mod attachments;
pub mod clock;
pub mod conflicts;
pub mod devices;
pub mod errors;
pub mod events;
pub mod projector;
pub mod reminders;
pub mod stacks;
pub mod sync;
pub mod tags;
pub mod tasks;
pub mod telemetry;

pub use errors::{DatabaseError, Error, Result};
