//! Protocol translation, streaming transform, and thought-signature
//! continuity for an OpenAI-to-Gemini-Code-Assist proxy.
//!
//! See `DESIGN.md` in the repository root for the grounding ledger behind
//! each module's choices.

// region:    --- Modules

pub mod cache;
pub mod chat;
pub mod config;
pub mod error;
pub mod fallback;
pub mod gemini;
pub mod models;
pub mod response;
pub mod schema;
pub mod sse;
pub mod stream;
pub mod upstream;

pub use error::{Error, Result};

// endregion: --- Modules
