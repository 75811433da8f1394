//! Plant disease diagnosis service
//!
//! Accepts a reference to an uploaded plant photo, has a vision model diagnose
//! it, validates the model's answer, and records it in the caller's history.

pub mod ai;
pub mod app;
pub mod error;
pub mod models;
pub mod parse;
pub mod persist;
pub mod pipeline;
pub mod prompts;
pub mod server;
pub mod store;
pub mod validate;

pub use error::{Error, Result};
