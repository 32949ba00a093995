//! Tag domain: models, normalization, repository contract, and service.

mod model;
mod service;

pub use model::*;
pub use service::*;
