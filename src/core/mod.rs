// This module is the shared infrastructure of decodegen: the error type every stage returns,
// the configuration structs the CLI and build scripts fill in, and the arena-backed session
// that owns the decision tree during one generator run. Everything above it (table parsing,
// validation, formatting, code generation, splicing) depends on these pieces and nothing
// here depends on them back.

//! Core decodegen infrastructure.
//!
//! - [`error`] - `DecodegenError` and the crate `Result` alias
//! - [`config`] - anchors and code generation options
//! - [`session`] - bumpalo arena and generation statistics

pub mod config;
pub mod error;
pub mod session;

pub use config::{Anchors, CodegenConfig};
pub use error::{DecodegenError, Result};
pub use session::{GenerationSession, SessionStats};
