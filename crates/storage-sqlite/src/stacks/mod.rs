//! SQLite storage for stacks and their tag links.

mod model;
mod repository;

pub use model::StackDB;
pub use repository::StackRepository;
