// This crate is the runtime half of decodegen. The decoder itself is generated at build time
// from x86.table and included below as the `generated` module; everything else here is the
// small hand-written vocabulary that code refers to. Registers follow the 8086 numbering where
// the 3-bit `reg`/`r_m` id selects one of eight byte or word registers depending on `w`, and
// byte ids 4..7 name the high halves of ax, cx, dx and bx. Memory operands pair one of the
// eight `r_m` base/index formulas with a signed displacement, or carry a direct address.
// `decode_all` walks a byte stream instruction by instruction and stops at the first error.

//! 8086 instruction decoder generated from an encoding table.
//!
//! ```
//! use decodegen_x86::{decode, Operand, Register};
//!
//! let instr = decode(&[0x89, 0xd9]).unwrap();
//! assert_eq!(instr.mnemonic, "mov");
//! assert_eq!(instr.operands[0], Operand::Register(Register::Cx));
//! assert_eq!(instr.to_string(), "mov cx, bx");
//! ```

use std::fmt;
use thiserror::Error;

mod generated {
    include!(concat!(env!("OUT_DIR"), "/decoder.rs"));
}

pub use generated::{decode_at, InstrKind};

/// Decoding failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("input ends inside an instruction (offset {offset})")]
    Truncated { offset: usize },

    #[error("unimplemented opcode {byte:#04x} at offset {offset}")]
    UnimplementedOpcode { offset: usize, byte: u8 },

    #[error("offset {offset}: expected bits {expected:#b}, found {found:#b}")]
    LiteralMismatch {
        offset: usize,
        expected: u8,
        found: u8,
    },
}

/// Byte at `offset`.
pub fn read_u8(input: &[u8], offset: usize) -> Result<u8, DecodeError> {
    input
        .get(offset)
        .copied()
        .ok_or(DecodeError::Truncated { offset })
}

/// Little-endian word at `offset`.
pub fn read_u16(input: &[u8], offset: usize) -> Result<u16, DecodeError> {
    let lo = read_u8(input, offset)?;
    let hi = read_u8(input, offset + 1)?;
    Ok(u16::from_le_bytes([lo, hi]))
}

/// General purpose registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    Al,
    Cl,
    Dl,
    Bl,
    Ah,
    Ch,
    Dh,
    Bh,
    Ax,
    Cx,
    Dx,
    Bx,
    Sp,
    Bp,
    Si,
    Di,
}

impl Register {
    const BYTE: [Register; 8] = [
        Register::Al,
        Register::Cl,
        Register::Dl,
        Register::Bl,
        Register::Ah,
        Register::Ch,
        Register::Dh,
        Register::Bh,
    ];

    const WORD: [Register; 8] = [
        Register::Ax,
        Register::Cx,
        Register::Dx,
        Register::Bx,
        Register::Sp,
        Register::Bp,
        Register::Si,
        Register::Di,
    ];

    /// Register for a 3-bit `reg`/`r_m` id. `w == 0` selects byte registers.
    pub fn resolve(id: u8, w: u8) -> Register {
        let id = usize::from(id & 0b111);
        if w == 0 {
            Self::BYTE[id]
        } else {
            Self::WORD[id]
        }
    }

    pub fn is_wide(self) -> bool {
        Self::WORD.contains(&self)
    }

    /// The word register holding this one, and whether this is its high byte.
    pub fn containing(self) -> (Register, bool) {
        match Self::BYTE.iter().position(|r| *r == self) {
            Some(id) => (Self::WORD[id % 4], id >= 4),
            None => (self, false),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Register::Al => "al",
            Register::Cl => "cl",
            Register::Dl => "dl",
            Register::Bl => "bl",
            Register::Ah => "ah",
            Register::Ch => "ch",
            Register::Dh => "dh",
            Register::Bh => "bh",
            Register::Ax => "ax",
            Register::Cx => "cx",
            Register::Dx => "dx",
            Register::Bx => "bx",
            Register::Sp => "sp",
            Register::Bp => "bp",
            Register::Si => "si",
            Register::Di => "di",
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The eight base/index combinations selected by `r_m` in memory modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFormula {
    BxSi,
    BxDi,
    BpSi,
    BpDi,
    Si,
    Di,
    Bp,
    Bx,
}

impl AddressFormula {
    pub fn from_r_m(r_m: u8) -> AddressFormula {
        match r_m & 0b111 {
            0b000 => AddressFormula::BxSi,
            0b001 => AddressFormula::BxDi,
            0b010 => AddressFormula::BpSi,
            0b011 => AddressFormula::BpDi,
            0b100 => AddressFormula::Si,
            0b101 => AddressFormula::Di,
            0b110 => AddressFormula::Bp,
            _ => AddressFormula::Bx,
        }
    }

    /// Base register and optional index register.
    pub fn registers(self) -> (Register, Option<Register>) {
        match self {
            AddressFormula::BxSi => (Register::Bx, Some(Register::Si)),
            AddressFormula::BxDi => (Register::Bx, Some(Register::Di)),
            AddressFormula::BpSi => (Register::Bp, Some(Register::Si)),
            AddressFormula::BpDi => (Register::Bp, Some(Register::Di)),
            AddressFormula::Si => (Register::Si, None),
            AddressFormula::Di => (Register::Di, None),
            AddressFormula::Bp => (Register::Bp, None),
            AddressFormula::Bx => (Register::Bx, None),
        }
    }
}

/// A memory operand. `formula` is `None` for a direct address, which is then
/// held in `displacement`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EffectiveAddress {
    pub formula: Option<AddressFormula>,
    pub displacement: i16,
}

impl EffectiveAddress {
    pub fn new(formula: AddressFormula, displacement: i16) -> Self {
        Self {
            formula: Some(formula),
            displacement,
        }
    }

    pub fn direct(address: u16) -> Self {
        Self {
            formula: None,
            displacement: address as i16,
        }
    }
}

impl fmt::Display for EffectiveAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(formula) = self.formula else {
            return write!(f, "[{}]", self.displacement as u16);
        };
        let (base, index) = formula.registers();
        write!(f, "[{base}")?;
        if let Some(index) = index {
            write!(f, " + {index}")?;
        }
        match self.displacement {
            0 => {}
            d if d < 0 => write!(f, " - {}", d.unsigned_abs())?,
            d => write!(f, " + {d}")?,
        }
        f.write_str("]")
    }
}

/// Immediate value; `wide` is false for byte immediates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Immediate {
    pub value: u16,
    pub wide: bool,
}

impl Immediate {
    pub fn new(value: u16, wide: bool) -> Self {
        Self { value, wide }
    }

    /// The value as the signed number the assembler would print.
    pub fn signed(self) -> i16 {
        if self.wide {
            self.value as i16
        } else {
            i16::from(self.value as u8 as i8)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operand {
    None,
    Register(Register),
    Memory(EffectiveAddress),
    Immediate(Immediate),
    /// Signed IP increment, relative to the end of the instruction.
    Relative(i16),
}

/// One decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub kind: InstrKind,
    pub mnemonic: &'static str,
    pub operands: [Operand; 2],
    /// Encoded length in bytes.
    pub size: usize,
}

impl Instruction {
    /// Absolute target of a relative operand for an instruction at `address`.
    pub fn branch_target(&self, address: u16) -> Option<u16> {
        self.operands.iter().find_map(|op| match op {
            Operand::Relative(inc) => Some(
                address
                    .wrapping_add(self.size as u16)
                    .wrapping_add(*inc as u16),
            ),
            _ => None,
        })
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic)?;
        let has_register = self
            .operands
            .iter()
            .any(|op| matches!(op, Operand::Register(_)));

        let mut separator = " ";
        for operand in &self.operands {
            match operand {
                Operand::None => continue,
                Operand::Register(reg) => write!(f, "{separator}{reg}")?,
                Operand::Memory(ea) => write!(f, "{separator}{ea}")?,
                Operand::Immediate(imm) if has_register => write!(f, "{separator}{}", imm.signed())?,
                Operand::Immediate(imm) => {
                    let size = if imm.wide { "word" } else { "byte" };
                    write!(f, "{separator}{size} {}", imm.signed())?
                }
                Operand::Relative(inc) => {
                    let distance = self.size as i32 + i32::from(*inc);
                    write!(f, "{separator}${distance:+}")?
                }
            }
            separator = ", ";
        }
        Ok(())
    }
}

/// Decode the instruction at the start of `input`.
pub fn decode(input: &[u8]) -> Result<Instruction, DecodeError> {
    decode_at(input, 0)
}

/// Decode every instruction in `input`.
pub fn decode_all(input: &[u8]) -> Result<Vec<Instruction>, DecodeError> {
    let mut instructions = Vec::new();
    let mut offset = 0;
    while offset < input.len() {
        let instr = decode_at(input, offset)?;
        log::trace!("{offset:#06x}: {instr}");
        offset += instr.size;
        instructions.push(instr);
    }
    Ok(instructions)
}
