//! SQLite storage for arcs.

mod model;
mod repository;

pub use model::ArcDB;
pub use repository::ArcRepository;
