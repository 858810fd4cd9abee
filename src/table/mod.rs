//! Encoding table model.
//!
//! A table is plain text, one instruction per line:
//!
//! ```text
//! # comments and blank lines are skipped
//! mov(RegisterMemory_ToFrom_Register) | 100010 d w | mod reg(3) r_m(3) | disp_lo | disp_hi
//! ```
//!
//! Each `|`-separated cell after the `name(description)` column is one
//! encoded byte. Tokens starting with `0`/`1` are literal bit patterns,
//! `name(N)` is an N-bit field and a bare `name` is an 8-bit field.

use crate::core::Result;
use std::fmt;

pub mod format;
pub mod parser;
pub mod validate;

pub use format::format_table;
pub use parser::parse_table;
pub use validate::validate;

/// A run of bits inside one encoded byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BitField {
    /// Fixed bit pattern, MSB first.
    Literal { value: u8, width: u8 },
    /// Field bound to a runtime value.
    Named { name: String, width: u8 },
}

impl BitField {
    pub fn width(&self) -> u8 {
        match self {
            BitField::Literal { width, .. } | BitField::Named { width, .. } => *width,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            BitField::Named { name, .. } => Some(name),
            BitField::Literal { .. } => None,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, BitField::Literal { .. })
    }
}

impl fmt::Display for BitField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BitField::Literal { value, width } => {
                write!(f, "{:0width$b}", value, width = usize::from(*width))
            }
            BitField::Named { name, width: 8 } => write!(f, "{name}"),
            BitField::Named { name, width } => write!(f, "{name}({width})"),
        }
    }
}

/// The fields of one encoded byte, most significant first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteSpec {
    pub fields: Vec<BitField>,
}

impl ByteSpec {
    pub fn new(fields: Vec<BitField>) -> Self {
        Self { fields }
    }

    /// Sum of the field widths. Wider than `u8` so a malformed byte can be reported.
    pub fn bit_count(&self) -> u32 {
        self.fields.iter().map(|f| u32::from(f.width())).sum()
    }

    /// Name of the single Named field when this byte is a streaming byte
    /// (displacement, immediate, address or IP increment half).
    pub fn streaming_field(&self) -> Option<&str> {
        match self.fields.as_slice() {
            [BitField::Named { name, .. }] => Some(name),
            _ => None,
        }
    }
}

/// One table line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionSpec {
    pub name: String,
    pub description: String,
    pub bytes: Vec<ByteSpec>,
    /// 1-based line in the table text.
    pub line: usize,
}

impl InstructionSpec {
    /// `InstrKind` variant name, `<name>_<description>`.
    pub fn enumerator(&self) -> String {
        format!("{}_{}", self.name, self.description)
    }

    /// `name(description)`, the first table column.
    pub fn label(&self) -> String {
        format!("{}({})", self.name, self.description)
    }

    /// The leading field of the first byte, which seeds the decision tree.
    pub fn leading_field(&self) -> Option<&BitField> {
        self.bytes.first().and_then(|b| b.fields.first())
    }
}

/// All instructions of a table, in table order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InstructionSet {
    instructions: Vec<InstructionSpec>,
}

impl InstructionSet {
    pub fn new(instructions: Vec<InstructionSpec>) -> Self {
        Self { instructions }
    }

    /// Parse table text.
    pub fn parse(text: &str) -> Result<Self> {
        parse_table(text)
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<()> {
        validate(self)
    }

    /// Canonical table text.
    pub fn format(&self) -> String {
        format_table(self)
    }

    pub fn instructions(&self) -> &[InstructionSpec] {
        &self.instructions
    }

    pub fn iter(&self) -> std::slice::Iter<'_, InstructionSpec> {
        self.instructions.iter()
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

impl<'a> IntoIterator for &'a InstructionSet {
    type Item = &'a InstructionSpec;
    type IntoIter = std::slice::Iter<'a, InstructionSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.instructions.iter()
    }
}
