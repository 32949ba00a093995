//! SQLite persistence for taskdeck.
//!
//! Implements every repository trait from `taskdeck-core` over diesel, with a
//! single-writer actor so a domain mutation, its event append, and any
//! conflict rows commit atomically.

pub mod arcs;
pub mod attachments;
pub mod db;
pub mod devices;
pub mod errors;
pub mod events;
pub mod reminders;
pub mod schema;
pub mod stacks;
pub mod sync;
pub mod tags;
pub mod tasks;

pub use db::{create_pool, get_connection, init, run_migrations, spawn_writer, WriteHandle};
