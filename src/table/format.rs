//! Canonical table printer.

use super::{BitField, InstructionSet};
use std::fmt::Write;

/// Render `set` in canonical form.
///
/// The `name(description)` column is padded to the longest entry plus one
/// space, fields are separated by one space and bytes by ` | `. Named
/// fields in multi-field bytes always carry their width. Formatting the parse
/// of this output yields the same text.
pub fn format_table(set: &InstructionSet) -> String {
    let column = set
        .iter()
        .map(|instr| instr.label().len())
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    for instr in set {
        let _ = write!(out, "{:<column$} | ", instr.label());
        for (byte_index, byte) in instr.bytes.iter().enumerate() {
            if byte_index > 0 {
                out.push_str(" | ");
            }
            let packed = byte.fields.len() > 1;
            for (field_index, field) in byte.fields.iter().enumerate() {
                if field_index > 0 {
                    out.push(' ');
                }
                match field {
                    // Bare names in packed cells read back with their conventional width.
                    BitField::Named { name, width } if packed => {
                        let _ = write!(out, "{name}({width})");
                    }
                    _ => {
                        let _ = write!(out, "{field}");
                    }
                }
            }
        }
        out.push('\n');
    }
    out
}
