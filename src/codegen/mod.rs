// This module generates the Rust decoder for a validated instruction table. Generation is a
// two-step pass over a per-run bumpalo arena: `partition.rs` builds the decision tree that
// separates the instructions by their literal bits, then `emit.rs` and `leaf.rs` walk it and
// write a `match` cascade whose arms extract the named fields, consume the variable-length
// bytes and construct the Instruction value. The public entry points return either just the
// decoder body (for splicing into a hand-written function) or a complete module with the
// InstrKind enum and a `decode_at` function (for build scripts that `include!` the output).
//
// The emitted text expects `input: &[u8]`, `start: usize` and `mut offset: usize` in scope
// and the runtime names listed in RUNTIME_ITEMS importable from the configured runtime path.

//! Decoder code generation.
//!
//! ```ignore
//! use decodegen::codegen::emit_module;
//! use decodegen::{CodegenConfig, InstructionSet};
//!
//! let set = InstructionSet::parse(&table)?;
//! set.validate()?;
//! let source = emit_module(&set, &CodegenConfig::default())?;
//! ```

mod emit;
mod leaf;
pub mod partition;

pub use partition::{build_tree, BitPosition, DecisionNode};

use crate::core::config::indent_str;
use crate::core::{CodegenConfig, GenerationSession, Result, SessionStats};
use crate::table::{InstructionSet, InstructionSpec};
use bumpalo::Bump;
use emit::{CodeWriter, TreeEmitter, UNIMPLEMENTED};

/// Items the generated code refers to.
pub const RUNTIME_ITEMS: &[&str] = &[
    "read_u16",
    "read_u8",
    "AddressFormula",
    "DecodeError",
    "EffectiveAddress",
    "Immediate",
    "Instruction",
    "Operand",
    "Register",
];

/// Output of one generator run.
#[derive(Debug, Clone)]
pub struct GeneratedDecoder {
    /// Enumerator lines for `InstrKind`, one per instruction.
    pub enumerators: String,
    /// The decoder body expression.
    pub body: String,
    pub stats: SessionStats,
}

/// Generate enumerators and decoder body for `set`.
///
/// `set` is validated first; generation assumes eight-bit bytes.
pub fn generate(set: &InstructionSet, config: &CodegenConfig) -> Result<GeneratedDecoder> {
    set.validate()?;

    let arena = Bump::new();
    let session = GenerationSession::new(&arena);
    let mut writer = CodeWriter::new(config.indent);

    if set.is_empty() {
        log::warn!("empty instruction table, the decoder rejects every opcode");
        writer.line(UNIMPLEMENTED);
    } else {
        let candidates: Vec<&InstructionSpec> = set.iter().collect();
        let tree = build_tree(&session, &candidates)?;
        TreeEmitter::new(&mut writer).emit(tree)?;
    }

    let body = writer.finish();
    let enumerators = emit_kind_enumerators(set, config.indent);
    session.record_emitted(body.len() + enumerators.len());

    let stats = session.stats();
    log::info!("{stats}");
    Ok(GeneratedDecoder {
        enumerators,
        body,
        stats,
    })
}

/// The decoder body: statements ending in a `Result<Instruction, DecodeError>`
/// expression, indented by `config.indent` levels.
pub fn emit_decoder_body(set: &InstructionSet, config: &CodegenConfig) -> Result<String> {
    Ok(generate(set, config)?.body)
}

/// One `<name>_<description>,` line per instruction, in table order.
pub fn emit_kind_enumerators(set: &InstructionSet, indent: usize) -> String {
    let prefix = indent_str(indent);
    set.iter()
        .map(|instr| format!("{prefix}{},\n", instr.enumerator()))
        .collect()
}

/// A self-contained module: runtime imports, the `InstrKind` enum and
/// `pub fn decode_at(input: &[u8], start: usize)`.
pub fn emit_module(set: &InstructionSet, config: &CodegenConfig) -> Result<String> {
    let config = CodegenConfig {
        indent: 1,
        ..config.clone()
    };
    let generated = generate(set, &config)?;

    let mut out = String::new();
    out.push_str("// GENERATED CODE - DO NOT EDIT\n");
    out.push_str("// Produced by decodegen from the instruction table.\n\n");
    out.push_str("#[allow(unused_imports)]\n");
    out.push_str(&format!(
        "use {}::{{{}}};\n\n",
        config.runtime_path,
        RUNTIME_ITEMS.join(", ")
    ));
    out.push_str("/// One variant per table entry, `<mnemonic>_<description>`.\n");
    out.push_str("#[allow(non_camel_case_types)]\n");
    out.push_str("#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]\n");
    out.push_str("pub enum InstrKind {\n");
    out.push_str(&generated.enumerators);
    out.push_str("}\n\n");
    out.push_str("/// Decode the instruction starting at `input[start]`.\n");
    out.push_str("#[allow(unused_variables, unused_mut, unreachable_patterns)]\n");
    out.push_str(
        "pub fn decode_at(input: &[u8], start: usize) -> Result<Instruction, DecodeError> {\n",
    );
    out.push_str("    let mut offset = start;\n");
    out.push_str(&generated.body);
    out.push_str("}\n");

    log::debug!(
        "generated module for {} instructions ({} branches, depth {})",
        set.len(),
        generated.stats.branches,
        generated.stats.max_depth
    );
    Ok(out)
}
