//! Observational record of LWW-rejected mutations.

mod model;

pub use model::*;
