// This module defines the error type for decodegen using the thiserror crate for idiomatic
// Rust error handling. DecodegenError covers every way a generator run can stop: malformed
// table text (ParseError), byte layouts that do not add up to eight bits, duplicate
// instruction entries, decision-tree preconditions that the table violates, single-field
// bytes with no decoding rule, unpaired `_lo`/`_hi` streaming fields and missing splice
// anchors. The driver adds I/O failures and non-zero exits of the external build command.
// Each variant carries the offending instruction, byte index, token or anchor so the
// diagnostic points straight at the table line to fix. Result<T> is the crate-wide alias.

//! Error types for the decoder generator.
//!
//! Every error is fatal to the current run; nothing is retried.

use std::io;
use thiserror::Error;

/// Main error type for a generator run.
#[derive(Error, Debug)]
pub enum DecodegenError {
    #[error("line {line}: {reason} (at `{token}`)")]
    Parse {
        line: usize,
        token: String,
        reason: String,
    },

    #[error("{instruction}: byte {byte} has {bits} bits, expected 8")]
    Structural {
        instruction: String,
        byte: usize,
        bits: u32,
    },

    #[error("{instruction}: declared more than once (lines {first} and {second})")]
    DuplicateInstruction {
        instruction: String,
        first: usize,
        second: usize,
    },

    #[error("{instruction}: {reason}")]
    PartitionInvariant {
        instruction: String,
        reason: String,
    },

    #[error("{instruction}: no decoding rule for single-field byte `{field}`")]
    UnknownField { instruction: String, field: String },

    #[error("{instruction}: `{field}` must be immediately followed by its `_hi` byte")]
    Pairing { instruction: String, field: String },

    #[error("{instruction}: {reason}")]
    OperandLayout {
        instruction: String,
        reason: String,
    },

    #[error("anchor not found: `{anchor}`")]
    AnchorNotFound { anchor: String },

    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("`{command}` exited with {status}")]
    Command { command: String, status: String },
}

impl DecodegenError {
    /// Wrap an I/O error with the path that caused it.
    pub fn io(path: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for generator operations.
pub type Result<T> = std::result::Result<T, DecodegenError>;
