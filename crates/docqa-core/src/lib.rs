//! Shared domain types, errors, configuration and collaborator traits for the
//! document retrieval core.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
