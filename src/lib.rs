//! Product photo analyzer - identifies products and suggests prices with a
//! vision model, then writes marketing stories about them
//!
//! Photos are sent to an OpenAI-compatible chat completions API; replies are
//! normalized into typed results and kept as JSON product records.

pub mod ai;
pub mod app;
pub mod error;
pub mod models;
pub mod normalize;
pub mod prompts;
pub mod store;

pub use error::{Error, ErrorKind, Result};
