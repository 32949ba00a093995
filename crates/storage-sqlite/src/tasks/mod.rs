//! SQLite storage for queue tasks.

mod model;
mod repository;

pub use model::TaskDB;
pub use repository::TaskRepository;
