//! Structural checks on a parsed table.
//!
//! Formatting and code generation both assume a table that passed
//! [`validate`].

use super::InstructionSet;
use crate::core::{DecodegenError, Result};
use hashbrown::HashMap;

/// Check that every byte has exactly eight bits and every `name(description)`
/// pair is unique.
pub fn validate(set: &InstructionSet) -> Result<()> {
    let mut seen: HashMap<String, usize> = HashMap::with_capacity(set.len());

    for instr in set {
        if instr.bytes.is_empty() {
            return Err(DecodegenError::Structural {
                instruction: instr.label(),
                byte: 0,
                bits: 0,
            });
        }

        for (byte_index, byte) in instr.bytes.iter().enumerate() {
            let bits = byte.bit_count();
            if bits != 8 {
                return Err(DecodegenError::Structural {
                    instruction: instr.label(),
                    byte: byte_index,
                    bits,
                });
            }
        }

        if let Some(first) = seen.insert(instr.enumerator(), instr.line) {
            return Err(DecodegenError::DuplicateInstruction {
                instruction: instr.label(),
                first,
                second: instr.line,
            });
        }
    }

    log::debug!("validated {} instructions", set.len());
    Ok(())
}
