// This module turns a decision tree into Rust source text. Each branch node becomes a `let`
// binding that extracts its discriminator bits from the input followed by a `match` with one
// arm per child, sorted by bit value, and a default arm that reports the unrecognised opcode.
// Leaves are delegated to `leaf.rs`, which receives the bit ranges the enclosing branches
// already matched so it only re-checks literals the tree never looked at. Branch reads are
// relative to `start`, the first byte of the instruction; leaves advance `offset` as they
// consume bytes. CodeWriter is the small indentation-aware line buffer both halves write into.

//! Branch emission and the shared line writer.

use super::leaf::emit_leaf;
use super::partition::{mask, BitPosition, DecisionNode};
use crate::core::config::indent_str;
use crate::core::Result;

/// Line buffer with an indentation level.
#[derive(Debug, Default)]
pub(crate) struct CodeWriter {
    out: String,
    level: usize,
}

impl CodeWriter {
    pub fn new(level: usize) -> Self {
        Self {
            out: String::new(),
            level,
        }
    }

    pub fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if !text.is_empty() {
            self.out.push_str(&indent_str(self.level));
            self.out.push_str(text);
        }
        self.out.push('\n');
    }

    /// Write `text` and indent the following lines.
    pub fn open(&mut self, text: impl AsRef<str>) {
        self.line(text);
        self.level += 1;
    }

    /// Dedent, then write `text`.
    pub fn close(&mut self, text: impl AsRef<str>) {
        self.dedent();
        self.line(text);
    }

    pub fn dedent(&mut self) {
        self.level = self.level.saturating_sub(1);
    }

    pub fn finish(self) -> String {
        self.out
    }
}

/// The expression every decoder falls back to for an unknown first byte.
pub(crate) const UNIMPLEMENTED: &str =
    "Err(DecodeError::UnimplementedOpcode { offset: start, byte: read_u8(input, start)? })";

/// Walks a decision tree and writes its `match` cascade.
pub(crate) struct TreeEmitter<'w> {
    writer: &'w mut CodeWriter,
    /// Bit ranges matched by the branches above the current node.
    consumed: Vec<(BitPosition, u8)>,
}

impl<'w> TreeEmitter<'w> {
    pub fn new(writer: &'w mut CodeWriter) -> Self {
        Self {
            writer,
            consumed: Vec::new(),
        }
    }

    pub fn emit(&mut self, node: &DecisionNode<'_, '_>) -> Result<()> {
        match node {
            DecisionNode::Leaf { instruction } => {
                emit_leaf(self.writer, instruction, &self.consumed)
            }
            DecisionNode::Branch {
                position,
                width,
                children,
            } => {
                let selector = selector_name(*position, *width);
                self.writer
                    .line(format!("let {selector} = {};", selector_expr(*position, *width)));
                self.writer.open(format!("match {selector} {{"));

                for (value, child) in children.iter() {
                    if let DecisionNode::Leaf { instruction } = child {
                        self.writer.line(format!("// {}", instruction.label()));
                    }
                    self.writer.open(format!(
                        "0b{:0w$b} => {{",
                        value,
                        w = usize::from(*width)
                    ));
                    self.consumed.push((*position, *width));
                    self.emit(child)?;
                    self.consumed.pop();
                    self.writer.close("}");
                }

                self.writer.line(format!("_ => {UNIMPLEMENTED},"));
                self.writer.close("}");
                Ok(())
            }
        }
    }
}

/// `first6` for a prefix of the first byte, `byte1_bits2to4` elsewhere.
fn selector_name(position: BitPosition, width: u8) -> String {
    if position == BitPosition::START {
        format!("first{width}")
    } else {
        format!(
            "byte{}_bits{}to{}",
            position.byte,
            position.bit,
            position.bit + width - 1
        )
    }
}

fn selector_expr(position: BitPosition, width: u8) -> String {
    let read = if position.byte == 0 {
        "read_u8(input, start)?".to_string()
    } else {
        format!("read_u8(input, start + {})?", position.byte)
    };
    let shift = 8 - position.bit - width;
    match (position.bit, shift) {
        (0, 0) => read,
        (0, shift) => format!("{read} >> {shift}"),
        (_, 0) => format!("{read} & 0b{:b}", mask(width)),
        (_, shift) => format!("({read} >> {shift}) & 0b{:b}", mask(width)),
    }
}
