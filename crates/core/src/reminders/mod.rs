//! Reminder domain: models, repository contract, and service.

mod model;
mod service;

pub use model::*;
pub use service::*;
