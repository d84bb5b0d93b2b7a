//! # Leadgen Common Library
//!
//! Shared code for the lead-capture service:
//! - Database schema, models and queries
//! - Event types (LeadEvent enum) and the EventBus
//! - Configuration loading (TOML bootstrap + environment secrets)
//! - Input sanitization for untrusted form fields
//! - SSE helpers

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod sanitize;
pub mod sse;

pub use error::{Error, Result};
