//! SQLite storage for the device registry.

mod model;
mod repository;

pub use model::DeviceDB;
pub use repository::DeviceRepository;
