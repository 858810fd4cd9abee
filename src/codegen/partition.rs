// This module builds the decision tree that separates the instructions of an encoding table.
// Each branch node reads the fewest bits that still tell its candidates apart: the minimum
// remaining literal width among them, taken at the current bit position. Candidates are
// grouped by the value of those bits and every group with more than one member is split again
// further along the encoding. When a group's leading literals are exhausted, the cursor moves
// over named fields that every member shares at the same position (the 8086 `100000 s w |
// mod 000 r_m` family is told apart by the literal inside the second byte). Any other shape is
// a table defect and is reported as a PartitionInvariant error naming the instruction. The
// tree lives in the session arena and is only read by the emitter in `emit.rs`.

//! Decision tree construction.

use crate::core::{DecodegenError, GenerationSession, Result};
use crate::table::{BitField, InstructionSpec};
use bumpalo::collections::Vec as BumpVec;
use std::collections::BTreeMap;
use std::fmt;

/// A bit inside the fixed-layout prefix of an encoding. `bit` 0 is the MSB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct BitPosition {
    pub byte: usize,
    pub bit: u8,
}

impl BitPosition {
    pub const START: BitPosition = BitPosition { byte: 0, bit: 0 };

    fn advance(self, bits: u8) -> BitPosition {
        let bit = usize::from(self.bit) + usize::from(bits);
        BitPosition {
            byte: self.byte + bit / 8,
            bit: (bit % 8) as u8,
        }
    }
}

impl fmt::Display for BitPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "byte {} bit {}", self.byte, self.bit)
    }
}

/// Node of the decision tree.
#[derive(Debug)]
pub enum DecisionNode<'arena, 's> {
    /// Read `width` bits at `position` and dispatch on their value.
    /// `children` is sorted by value.
    Branch {
        position: BitPosition,
        width: u8,
        children: &'arena [(u8, &'arena DecisionNode<'arena, 's>)],
    },
    Leaf { instruction: &'s InstructionSpec },
}

impl<'arena, 's> DecisionNode<'arena, 's> {
    /// Leaves in arm order.
    pub fn leaves(&self) -> Vec<&'s InstructionSpec> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves(&self, out: &mut Vec<&'s InstructionSpec>) {
        match self {
            DecisionNode::Leaf { instruction } => out.push(*instruction),
            DecisionNode::Branch { children, .. } => {
                for (_, child) in children.iter() {
                    child.collect_leaves(out);
                }
            }
        }
    }
}

/// Build the decision tree for `candidates`.
///
/// Every candidate must start with a literal field. Candidates are expected
/// to come from a validated set; other shapes are rejected with an error
/// rather than partitioned.
pub fn build_tree<'arena, 's>(
    session: &GenerationSession<'arena>,
    candidates: &[&'s InstructionSpec],
) -> Result<&'arena DecisionNode<'arena, 's>>
where
    's: 'arena,
{
    let Some(first) = candidates.first() else {
        return Err(DecodegenError::PartitionInvariant {
            instruction: "<table>".to_string(),
            reason: "no instructions to partition".to_string(),
        });
    };

    for instr in candidates {
        match instr.leading_field() {
            Some(BitField::Literal { .. }) => {}
            Some(BitField::Named { name, .. }) => {
                return Err(DecodegenError::PartitionInvariant {
                    instruction: instr.label(),
                    reason: format!("leading field `{name}` must be a literal"),
                });
            }
            None => {
                return Err(DecodegenError::PartitionInvariant {
                    instruction: instr.label(),
                    reason: "encoding is empty".to_string(),
                });
            }
        }
    }

    log::debug!(
        "partitioning {} instructions starting with {}",
        candidates.len(),
        first.label()
    );
    partition(session, candidates, BitPosition::START, 0)
}

fn partition<'arena, 's>(
    session: &GenerationSession<'arena>,
    candidates: &[&'s InstructionSpec],
    position: BitPosition,
    depth: usize,
) -> Result<&'arena DecisionNode<'arena, 's>>
where
    's: 'arena,
{
    if let [instruction] = candidates {
        session.record_leaf(depth);
        return Ok(session.alloc(DecisionNode::Leaf {
            instruction: *instruction,
        }));
    }

    let position = skip_shared_fields(candidates, position)?;

    let mut width = u8::MAX;
    for instr in candidates {
        let slot = literal_at(instr, position)?;
        width = width.min(slot.remaining);
    }

    let mut buckets: BTreeMap<u8, Vec<&'s InstructionSpec>> = BTreeMap::new();
    for instr in candidates {
        let slot = literal_at(instr, position)?;
        let value = (slot.bits >> (slot.remaining - width)) & mask(width);
        buckets.entry(value).or_default().push(*instr);
    }

    log::trace!(
        "depth {depth}: {} candidates split on {width} bits at {position} into {} arms",
        candidates.len(),
        buckets.len()
    );
    session.record_branch(width, depth);

    let next = position.advance(width);
    let mut children = BumpVec::with_capacity_in(buckets.len(), session.arena());
    for (value, group) in buckets {
        children.push((value, partition(session, &group, next, depth + 1)?));
    }

    Ok(session.alloc(DecisionNode::Branch {
        position,
        width,
        children: children.into_bump_slice(),
    }))
}

/// The unconsumed part of a literal at some position.
struct LiteralSlot {
    /// Remaining literal bits, right-aligned.
    bits: u8,
    remaining: u8,
}

/// What an encoding holds at a bit position.
enum Slot<'s> {
    Literal(LiteralSlot),
    /// A named field inside a fixed byte; `offset` is how far into the field we are.
    Named {
        name: &'s str,
        width: u8,
        offset: u8,
    },
    /// A byte carrying a single variable-length field.
    Streaming(&'s str),
    /// Past the end of the encoding.
    Exhausted,
}

fn slot_at(instr: &InstructionSpec, position: BitPosition) -> Slot<'_> {
    let Some(byte) = instr.bytes.get(position.byte) else {
        return Slot::Exhausted;
    };

    // Streaming bytes before `position` make its offset unknown at generation time.
    if let Some(name) = instr.bytes[..=position.byte]
        .iter()
        .find_map(|b| b.streaming_field())
    {
        return Slot::Streaming(name);
    }

    // Unvalidated bytes may hold more than eight bits.
    let mut start = 0u16;
    for field in &byte.fields {
        let end = start + u16::from(field.width());
        if u16::from(position.bit) < end {
            let offset = (u16::from(position.bit) - start) as u8;
            let remaining = field.width() - offset;
            return match field {
                BitField::Literal { value, .. } => Slot::Literal(LiteralSlot {
                    bits: value & mask(remaining),
                    remaining,
                }),
                BitField::Named { name, width } => Slot::Named {
                    name,
                    width: *width,
                    offset,
                },
            };
        }
        start = end;
    }
    Slot::Exhausted
}

fn literal_at(instr: &InstructionSpec, position: BitPosition) -> Result<LiteralSlot> {
    match slot_at(instr, position) {
        Slot::Literal(slot) => Ok(slot),
        Slot::Named { name, .. } => Err(invariant(
            instr,
            format!("expected a literal at {position}, found field `{name}`"),
        )),
        Slot::Streaming(name) => Err(invariant(
            instr,
            format!("expected a literal at {position}, found streaming field `{name}`"),
        )),
        Slot::Exhausted => Err(invariant(
            instr,
            format!("encoding ends before {position}"),
        )),
    }
}

/// Move past named fields that every candidate has at the same place.
fn skip_shared_fields(
    candidates: &[&InstructionSpec],
    mut position: BitPosition,
) -> Result<BitPosition> {
    loop {
        let slots: Vec<Slot<'_>> = candidates.iter().map(|i| slot_at(i, position)).collect();

        if slots.iter().all(|s| matches!(s, Slot::Literal(_))) {
            return Ok(position);
        }

        if let Some(index) = slots.iter().position(|s| matches!(s, Slot::Exhausted)) {
            return Err(ambiguous(candidates, index));
        }

        if let (Slot::Named { name, width, offset }, rest) = (&slots[0], &slots[1..]) {
            let shared = rest.iter().all(|s| {
                matches!(s, Slot::Named { name: n, width: w, offset: o }
                    if n == name && w == width && o == offset)
            });
            if shared {
                log::trace!("skipping shared field `{name}` at {position}");
                position = position.advance(width - offset);
                continue;
            }
        }

        // Report the first candidate that does not have a literal here.
        let index = slots
            .iter()
            .position(|s| !matches!(s, Slot::Literal(_)))
            .unwrap_or(0);
        return Err(match &slots[index] {
            Slot::Streaming(_) => ambiguous(candidates, index),
            _ => literal_at(candidates[index], position)
                .err()
                .unwrap_or_else(|| ambiguous(candidates, index)),
        });
    }
}

fn ambiguous(candidates: &[&InstructionSpec], index: usize) -> DecodegenError {
    let others: Vec<String> = candidates
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != index)
        .map(|(_, c)| c.label())
        .collect();
    invariant(
        candidates[index],
        format!(
            "ambiguous encoding, no literal bits left to separate it from {}",
            others.join(", ")
        ),
    )
}

fn invariant(instr: &InstructionSpec, reason: String) -> DecodegenError {
    DecodegenError::PartitionInvariant {
        instruction: instr.label(),
        reason,
    }
}

pub(crate) fn mask(width: u8) -> u8 {
    if width >= 8 {
        u8::MAX
    } else {
        (1u8 << width) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::parse_table;
    use bumpalo::Bump;

    fn branch_shape(node: &DecisionNode<'_, '_>) -> (BitPosition, u8, Vec<u8>) {
        match node {
            DecisionNode::Branch {
                position,
                width,
                children,
            } => (*position, *width, children.iter().map(|(v, _)| *v).collect()),
            DecisionNode::Leaf { instruction } => panic!("unexpected leaf {}", instruction.label()),
        }
    }

    #[test]
    fn test_single_instruction_is_a_leaf() {
        let set = parse_table("mov(A) | 100010 d w | mod reg r_m").unwrap();
        let arena = Bump::new();
        let session = GenerationSession::new(&arena);
        let refs: Vec<_> = set.iter().collect();
        let tree = build_tree(&session, &refs).unwrap();
        assert!(matches!(tree, DecisionNode::Leaf { .. }));
        assert_eq!(session.stats().leaves, 1);
    }

    #[test]
    fn test_shorter_prefix_sets_the_width() {
        let set = parse_table(
            "mov(RegisterMemory_ToFrom_Register) | 100010 d w | mod reg r_m\n\
             mov(ImmediateToRegister) | 1011 w reg | data_lo | data_hi\n\
             mov(MemoryToAccumulator) | 1010000 w | addr_lo | addr_hi\n",
        )
        .unwrap();
        let arena = Bump::new();
        let session = GenerationSession::new(&arena);
        let refs: Vec<_> = set.iter().collect();
        let tree = build_tree(&session, &refs).unwrap();

        let (position, width, values) = branch_shape(tree);
        assert_eq!(position, BitPosition::START);
        assert_eq!(width, 4);
        assert_eq!(values, vec![0b1000, 0b1010, 0b1011]);
    }

    #[test]
    fn test_nested_split_continues_inside_the_literal() {
        let set = parse_table(
            "mov(A) | 100010 d w | mod reg r_m\n\
             mov(B) | 1000111 0 | mod 0 sr r_m\n\
             mov(C) | 1011 w reg | data_lo | data_hi\n",
        )
        .unwrap();
        let arena = Bump::new();
        let session = GenerationSession::new(&arena);
        let refs: Vec<_> = set.iter().collect();
        let tree = build_tree(&session, &refs).unwrap();

        let DecisionNode::Branch { children, .. } = tree else {
            panic!("expected a branch");
        };
        let (value, inner) = children[0];
        assert_eq!(value, 0b1000);
        let (position, width, values) = branch_shape(inner);
        assert_eq!(position, BitPosition { byte: 0, bit: 4 });
        assert_eq!(width, 2);
        assert_eq!(values, vec![0b10, 0b11]);
        assert_eq!(session.stats().max_depth, 2);
    }

    #[test]
    fn test_shared_fields_are_skipped() {
        let set = parse_table(
            "add(ImmediateToRegisterMemory) | 100000 s w | mod 000 r_m | disp_lo | disp_hi | data_lo | data_hi\n\
             sub(ImmediateFromRegisterMemory) | 100000 s w | mod 101 r_m | disp_lo | disp_hi | data_lo | data_hi\n\
             cmp(ImmediateWithRegisterMemory) | 100000 s w | mod 111 r_m | disp_lo | disp_hi | data_lo | data_hi\n",
        )
        .unwrap();
        let arena = Bump::new();
        let session = GenerationSession::new(&arena);
        let refs: Vec<_> = set.iter().collect();
        let tree = build_tree(&session, &refs).unwrap();

        let DecisionNode::Branch { width, children, .. } = tree else {
            panic!("expected a branch");
        };
        assert_eq!(*width, 6);
        assert_eq!(children.len(), 1);

        let (position, width, values) = branch_shape(children[0].1);
        assert_eq!(position, BitPosition { byte: 1, bit: 2 });
        assert_eq!(width, 3);
        assert_eq!(values, vec![0b000, 0b101, 0b111]);

        let names: Vec<_> = tree.leaves().iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["add", "sub", "cmp"]);
    }

    #[test]
    fn test_named_leading_field_is_rejected() {
        let set = parse_table("mov(A) | w 1000000 | mod reg r_m").unwrap();
        let arena = Bump::new();
        let session = GenerationSession::new(&arena);
        let refs: Vec<_> = set.iter().collect();
        match build_tree(&session, &refs).unwrap_err() {
            DecodegenError::PartitionInvariant { instruction, reason } => {
                assert_eq!(instruction, "mov(A)");
                assert!(reason.contains("`w`"), "{reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_identical_encodings_are_ambiguous() {
        let set = parse_table("mov(A) | 10001000\nmov(B) | 10001000").unwrap();
        let arena = Bump::new();
        let session = GenerationSession::new(&arena);
        let refs: Vec<_> = set.iter().collect();
        let err = build_tree(&session, &refs).unwrap_err();
        assert!(err.to_string().contains("ambiguous"), "{err}");
    }

    #[test]
    fn test_mixed_literal_and_field_is_rejected() {
        let set = parse_table("mov(A) | 1000 w reg\nmov(B) | 100010 d w | mod reg r_m").unwrap();
        let arena = Bump::new();
        let session = GenerationSession::new(&arena);
        let refs: Vec<_> = set.iter().collect();
        match build_tree(&session, &refs).unwrap_err() {
            DecodegenError::PartitionInvariant { instruction, reason } => {
                assert_eq!(instruction, "mov(A)");
                assert!(reason.contains("`w`"), "{reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_oversized_field_is_rejected() {
        let set = parse_table("a(A) | 1 x(255)\nb(B) | 1 x(255)").unwrap();
        let refs: Vec<_> = set.iter().collect();
        let arena = Bump::new();
        let session = GenerationSession::new(&arena);
        match build_tree(&session, &refs) {
            Err(DecodegenError::PartitionInvariant { reason, .. }) => {
                assert!(reason.starts_with("ambiguous encoding"), "{reason}");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(BitPosition { byte: 0, bit: 1 }.advance(255), BitPosition { byte: 32, bit: 0 });
    }
}
