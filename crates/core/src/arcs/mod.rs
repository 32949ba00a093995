//! Arc domain (long-lived stack grouping): models, repository contract, and
//! service. The Rust type is named `StoryArc` to stay clear of
//! `std::sync::Arc`.

mod model;
mod service;

pub use model::*;
pub use service::*;
