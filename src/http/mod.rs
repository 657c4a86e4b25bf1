//! HTTP client for the translation service's REST endpoints
//!
//! - GET /languages - Languages available as translation targets
//! - POST /speech-to-text?language_code=<code> - Transcribe a recorded WAV file

mod client;

pub use client::{Language, ServiceClient};
