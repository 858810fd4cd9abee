//! decodegen - table-driven instruction decoder generator.
//!
//! An encoding table lists one instruction per line as a sequence of bytes,
//! each byte split into literal bit patterns and named fields. decodegen
//! parses and validates the table, prints it back in canonical form, builds a
//! decision tree that tells the instructions apart by their literal bits and
//! emits a Rust decoder from it.
//!
//! # Primary Usage
//!
//! ```ignore
//! use decodegen::{CodegenConfig, InstructionSet};
//!
//! let set = decodegen::load(&std::fs::read_to_string("x86.table")?)?;
//! let module = decodegen::codegen::emit_module(&set, &CodegenConfig::default())?;
//! std::fs::write(out_dir.join("decoder.rs"), module)?;
//! ```
//!
//! # Architecture
//!
//! - [`core`] - errors, configuration, arena session
//! - [`table`] - table model, parser, validator, formatter
//! - [`codegen`] - decision tree and Rust emission
//! - [`splice`] - anchor-based rewriting of a hand-written source file
//! - [`driver`] - filesystem pipeline used by the `decodegen` binary

pub mod codegen;
pub mod core;
pub mod driver;
pub mod splice;
pub mod table;

pub use crate::core::{
    Anchors, CodegenConfig, DecodegenError, GenerationSession, Result, SessionStats,
};
pub use codegen::{emit_decoder_body, emit_kind_enumerators, emit_module, generate, GeneratedDecoder};
pub use splice::{splice, splice_with_stats};
pub use table::{BitField, ByteSpec, InstructionSet, InstructionSpec};

/// Parse and validate table text.
pub fn load(text: &str) -> Result<InstructionSet> {
    let set = InstructionSet::parse(text)?;
    set.validate()?;
    Ok(set)
}
