//! SQLite storage for reminders.

mod model;
mod repository;

pub use model::ReminderDB;
pub use repository::ReminderRepository;
