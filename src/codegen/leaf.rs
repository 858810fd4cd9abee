//! Leaf emission: decoding one fully identified instruction.
//!
//! A leaf walks the instruction's bytes in order. Fixed bytes are read once
//! and split into their named fields; literals the decision tree did not
//! already examine are checked. Single-field bytes are handled by rules keyed
//! on the field name:
//!
//! | field      | bytes | reads                                                      |
//! |------------|-------|------------------------------------------------------------|
//! | `disp_lo`  | 2     | 0, 1 or 2 bytes depending on `mod` and `r_m`               |
//! | `data_lo`  | 2     | 1 byte, plus the high byte when `w` is set and `s` is not  |
//! | `addr_lo`  | 2     | 1 byte, plus the high byte when `w` is set                 |
//! | `ip_inc_lo`| 2     | 2 bytes, signed                                            |
//! | `ip_inc8`  | 1     | 1 byte, signed                                             |
//!
//! Two-byte rules require the following byte to be the matching `_hi` field.

use super::emit::CodeWriter;
use super::partition::{mask, BitPosition};
use crate::core::{DecodegenError, Result};
use crate::table::{BitField, ByteSpec, InstructionSpec};
use hashbrown::HashSet;

/// Streaming byte rules, by the name of the first byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Rule {
    Displacement,
    Data,
    Address,
    IpIncrement16,
    IpIncrement8,
}

impl Rule {
    fn for_field(name: &str) -> Option<Rule> {
        match name {
            "disp_lo" => Some(Rule::Displacement),
            "data_lo" => Some(Rule::Data),
            "addr_lo" => Some(Rule::Address),
            "ip_inc_lo" => Some(Rule::IpIncrement16),
            "ip_inc8" => Some(Rule::IpIncrement8),
            _ => None,
        }
    }

    fn is_paired(self) -> bool {
        !matches!(self, Rule::IpIncrement8)
    }
}

/// Emit the decoding statements and final `Ok(Instruction { .. })` for
/// `instr`. `consumed` lists the bit ranges the enclosing branches already
/// matched.
pub(crate) fn emit_leaf(
    writer: &mut CodeWriter,
    instr: &InstructionSpec,
    consumed: &[(BitPosition, u8)],
) -> Result<()> {
    let mut covered = vec![0u8; instr.bytes.len()];
    for (position, width) in consumed {
        if let Some(byte) = covered.get_mut(position.byte) {
            *byte |= mask(*width) << (8 - position.bit - width);
        }
    }

    log::debug!("emitting leaf {}", instr.label());
    let mut leaf = Leaf {
        instr,
        covered,
        fields: HashSet::new(),
        rules: Vec::new(),
    };
    leaf.emit(writer)
}

struct Leaf<'s> {
    instr: &'s InstructionSpec,
    /// Per fixed byte, the bits already matched by the tree.
    covered: Vec<u8>,
    fields: HashSet<&'s str>,
    /// Streaming rules in byte order.
    rules: Vec<Rule>,
}

impl<'s> Leaf<'s> {
    fn emit(&mut self, writer: &mut CodeWriter) -> Result<()> {
        let instr = self.instr;
        let bytes = &instr.bytes;
        let mut index = 0;
        while index < bytes.len() {
            let byte = &bytes[index];
            let Some(name) = byte.streaming_field() else {
                self.emit_fixed_byte(writer, index, byte);
                index += 1;
                continue;
            };

            if name.ends_with("_hi") {
                return Err(self.pairing(name));
            }
            let rule = Rule::for_field(name).ok_or_else(|| DecodegenError::UnknownField {
                instruction: self.instr.label(),
                field: name.to_string(),
            })?;
            if rule.is_paired() {
                let hi = bytes.get(index + 1).and_then(ByteSpec::streaming_field);
                if !hi.is_some_and(|hi| hi.ends_with("_hi")) {
                    return Err(self.pairing(name));
                }
            }
            if self.rules.contains(&rule) {
                return Err(self.layout(format!("`{name}` appears more than once")));
            }

            match rule {
                Rule::Displacement => self.emit_displacement(writer)?,
                Rule::Data => self.emit_data(writer),
                Rule::Address => self.emit_address(writer),
                Rule::IpIncrement16 => {
                    writer.line("let ip_inc = read_u16(input, offset)? as i16;");
                    writer.line("offset += 2;");
                }
                Rule::IpIncrement8 => {
                    writer.line("let ip_inc = read_u8(input, offset)? as i8;");
                    writer.line("offset += 1;");
                }
            }
            self.rules.push(rule);
            index += if rule.is_paired() { 2 } else { 1 };
        }

        let operands = self.operands(writer)?;
        writer.open("Ok(Instruction {");
        writer.line(format!("kind: InstrKind::{},", self.instr.enumerator()));
        writer.line(format!("mnemonic: \"{}\",", self.instr.name));
        writer.line(format!("operands: [{}],", operands.join(", ")));
        writer.line("size: offset - start,");
        writer.close("})");
        Ok(())
    }

    fn emit_fixed_byte(&mut self, writer: &mut CodeWriter, index: usize, byte: &'s ByteSpec) {
        let covered = self.covered.get(index).copied().unwrap_or(0);
        let mut shift = 8u8;
        let mut parts = Vec::with_capacity(byte.fields.len());
        for field in &byte.fields {
            shift -= field.width();
            let field_mask = mask(field.width()) << shift;
            let needed = match field {
                BitField::Named { .. } => true,
                BitField::Literal { .. } => covered & field_mask != field_mask,
            };
            if needed {
                parts.push((field, shift));
            }
        }

        if parts.is_empty() {
            writer.line("offset += 1;");
            return;
        }

        let var = format!("byte{index}");
        writer.line(format!("let {var} = read_u8(input, offset)?;"));
        for (field, shift) in parts {
            let value = extract(&var, shift, field.width());
            match field {
                BitField::Named { name, .. } => {
                    writer.line(format!("let {} = {value};", field_ident(name)));
                    self.fields.insert(name.as_str());
                }
                BitField::Literal { value: expected, width } => {
                    let expected = format!("0b{:0w$b}", expected, w = usize::from(*width));
                    writer.line(format!("let found = {value};"));
                    writer.open(format!("if found != {expected} {{"));
                    writer.line(format!(
                        "return Err(DecodeError::LiteralMismatch {{ offset, expected: {expected}, found }});"
                    ));
                    writer.close("}");
                }
            }
        }
        writer.line("offset += 1;");
    }

    fn emit_displacement(&mut self, writer: &mut CodeWriter) -> Result<()> {
        if !self.has("mod") || !self.has("r_m") {
            return Err(self.layout("`disp_lo` needs `mod` and `r_m` fields before it".to_string()));
        }
        let width = self.width();
        let mode = field_ident("mod");

        writer.open(format!("let r_m_operand = match {mode} {{"));
        writer.open("0b00 if r_m == 0b110 => {");
        writer.line("let address = read_u16(input, offset)?;");
        writer.line("offset += 2;");
        writer.line("Operand::Memory(EffectiveAddress::direct(address))");
        writer.close("}");
        writer.line("0b00 => Operand::Memory(EffectiveAddress::new(AddressFormula::from_r_m(r_m), 0)),");
        writer.open("0b01 => {");
        writer.line("let displacement = read_u8(input, offset)? as i8;");
        writer.line("offset += 1;");
        writer.line(
            "Operand::Memory(EffectiveAddress::new(AddressFormula::from_r_m(r_m), i16::from(displacement)))",
        );
        writer.close("}");
        writer.open("0b10 => {");
        writer.line("let displacement = read_u16(input, offset)? as i16;");
        writer.line("offset += 2;");
        writer.line("Operand::Memory(EffectiveAddress::new(AddressFormula::from_r_m(r_m), displacement))");
        writer.close("}");
        writer.line(format!("_ => Operand::Register(Register::resolve(r_m, {width})),"));
        writer.close("};");
        Ok(())
    }

    fn emit_data(&mut self, writer: &mut CodeWriter) {
        writer.line("let mut data = u16::from(read_u8(input, offset)?);");
        writer.line("offset += 1;");
        let high = |writer: &mut CodeWriter| {
            writer.line("data |= u16::from(read_u8(input, offset)?) << 8;");
            writer.line("offset += 1;");
        };
        let sign_extend = "data = data as u8 as i8 as i16 as u16;";

        match (self.has("w"), self.has("s")) {
            (true, true) => {
                writer.open("if w == 1 && s == 0 {");
                high(writer);
                writer.dedent();
                writer.open("} else if w == 1 {");
                writer.line(sign_extend);
                writer.close("}");
            }
            (true, false) => {
                writer.open("if w == 1 {");
                high(writer);
                writer.close("}");
            }
            (false, true) => {
                writer.open("if s == 0 {");
                high(writer);
                writer.dedent();
                writer.open("} else {");
                writer.line(sign_extend);
                writer.close("}");
            }
            (false, false) => high(writer),
        }
    }

    fn emit_address(&mut self, writer: &mut CodeWriter) {
        writer.line("let mut address = u16::from(read_u8(input, offset)?);");
        writer.line("offset += 1;");
        let wide = self.has("w");
        if wide {
            writer.open("if w == 1 {");
        }
        writer.line("address |= u16::from(read_u8(input, offset)?) << 8;");
        writer.line("offset += 1;");
        if wide {
            writer.close("}");
        }
    }

    /// Build the two operand expressions, emitting any helper bindings.
    ///
    /// Register operands come first: `reg` and `r_m` together (ordered by `d`),
    /// either alone, or the accumulator for descriptions ending in
    /// `Accumulator`. The streaming operands follow in byte order, then the
    /// accumulator for `AccumulatorTo...` descriptions.
    fn operands(&self, writer: &mut CodeWriter) -> Result<Vec<String>> {
        let width = self.width();
        let reg = format!("Operand::Register(Register::resolve(reg, {width}))");
        let r_m = if self.rules.contains(&Rule::Displacement) {
            "r_m_operand".to_string()
        } else {
            format!("Operand::Register(Register::resolve(r_m, {width}))")
        };
        let accumulator = format!("Operand::Register(Register::resolve(0, {width}))");

        let mut operands = Vec::new();
        let mut trailing_accumulator = false;
        match (self.has("reg"), self.has("r_m")) {
            (true, true) if self.has("d") => {
                writer.line(format!("let reg_operand = {reg};"));
                if !self.rules.contains(&Rule::Displacement) {
                    writer.line(format!("let r_m_operand = {r_m};"));
                }
                writer.open("let (destination, source) = if d == 1 {");
                writer.line("(reg_operand, r_m_operand)");
                writer.dedent();
                writer.open("} else {");
                writer.line("(r_m_operand, reg_operand)");
                writer.close("};");
                operands.push("destination".to_string());
                operands.push("source".to_string());
            }
            (true, true) => {
                operands.push(r_m);
                operands.push(reg);
            }
            (true, false) => operands.push(reg),
            (false, true) => operands.push(r_m),
            (false, false) => {
                let description = &self.instr.description;
                if description.ends_with("Accumulator") {
                    operands.push(accumulator.clone());
                } else if description.starts_with("AccumulatorTo") {
                    trailing_accumulator = true;
                }
            }
        }

        for rule in &self.rules {
            let operand = match rule {
                Rule::Displacement => continue,
                Rule::Data => {
                    let wide = if self.has("w") { "w == 1" } else { "true" };
                    format!("Operand::Immediate(Immediate::new(data, {wide}))")
                }
                Rule::Address => "Operand::Memory(EffectiveAddress::direct(address))".to_string(),
                Rule::IpIncrement16 => "Operand::Relative(ip_inc)".to_string(),
                Rule::IpIncrement8 => "Operand::Relative(i16::from(ip_inc))".to_string(),
            };
            operands.push(operand);
        }
        if trailing_accumulator {
            operands.push(accumulator);
        }

        if operands.len() > 2 {
            return Err(self.layout(format!(
                "{} operands do not fit the two operand slots",
                operands.len()
            )));
        }
        while operands.len() < 2 {
            operands.push("Operand::None".to_string());
        }
        Ok(operands)
    }

    fn has(&self, name: &str) -> bool {
        self.fields.contains(name)
    }

    /// The `w` argument for register resolution; word-sized without a `w` field.
    fn width(&self) -> &'static str {
        if self.has("w") {
            "w"
        } else {
            "1"
        }
    }

    fn pairing(&self, field: &str) -> DecodegenError {
        DecodegenError::Pairing {
            instruction: self.instr.label(),
            field: field.to_string(),
        }
    }

    fn layout(&self, reason: String) -> DecodegenError {
        DecodegenError::OperandLayout {
            instruction: self.instr.label(),
            reason,
        }
    }
}

/// `(var >> shift) & mask`, dropping the parts that are no-ops.
fn extract(var: &str, shift: u8, width: u8) -> String {
    let full = shift + width == 8;
    match (shift, full) {
        (0, true) => var.to_string(),
        (0, false) => format!("{var} & 0b{:b}", mask(width)),
        (_, true) => format!("{var} >> {shift}"),
        (_, false) => format!("({var} >> {shift}) & 0b{:b}", mask(width)),
    }
}

/// Rust identifier for a table field name.
pub(crate) fn field_ident(name: &str) -> String {
    const KEYWORDS: &[&str] = &[
        "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "do",
        "dyn", "else", "enum", "extern", "false", "final", "fn", "for", "gen", "if", "impl", "in",
        "let", "loop", "macro", "match", "mod", "move", "mut", "override", "priv", "pub", "ref",
        "return", "static", "struct", "trait", "true", "try", "type", "typeof", "unsafe",
        "unsized", "use", "virtual", "where", "while", "yield",
    ];
    // Cannot be raw identifiers, or would shadow the decoder's own bindings.
    const RESERVED: &[&str] = &[
        "self", "Self", "super", "crate", "_", "input", "start", "offset", "found", "data",
        "address", "ip_inc", "destination", "source",
    ];

    if RESERVED.contains(&name) || name.starts_with("byte") {
        format!("{name}_field")
    } else if KEYWORDS.contains(&name) {
        format!("r#{name}")
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::parse_table;

    fn emit(table: &str, consumed: &[(BitPosition, u8)]) -> Result<String> {
        let set = parse_table(table).unwrap();
        let mut writer = CodeWriter::new(0);
        emit_leaf(&mut writer, &set.instructions()[0], consumed)?;
        Ok(writer.finish())
    }

    #[test]
    fn test_field_extraction() {
        let code = emit(
            "mov(RegisterMemory_ToFrom_Register) | 100010 d w | mod reg r_m | disp_lo | disp_hi",
            &[(BitPosition::START, 6)],
        )
        .unwrap();

        assert!(code.contains("let byte0 = read_u8(input, offset)?;"), "{code}");
        assert!(code.contains("let d = (byte0 >> 1) & 0b1;"), "{code}");
        assert!(code.contains("let w = byte0 & 0b1;"), "{code}");
        assert!(code.contains("let r#mod = byte1 >> 6;"), "{code}");
        assert!(code.contains("let reg = (byte1 >> 3) & 0b111;"), "{code}");
        assert!(code.contains("let r_m = byte1 & 0b111;"), "{code}");
        assert!(code.contains("let r_m_operand = match r#mod {"), "{code}");
        assert!(code.contains("let (destination, source) = if d == 1 {"), "{code}");
        assert!(code.contains("operands: [destination, source],"), "{code}");
        assert!(code.contains("kind: InstrKind::mov_RegisterMemory_ToFrom_Register,"));
        assert!(!code.contains("LiteralMismatch"), "{code}");
    }

    #[test]
    fn test_unconsumed_literals_are_checked() {
        let code = emit(
            "mov(ImmediateToRegisterMemory) | 1100011 w | mod 000 r_m | disp_lo | disp_hi | data_lo | data_hi",
            &[(BitPosition::START, 7)],
        )
        .unwrap();
        assert!(code.contains("let found = (byte1 >> 3) & 0b111;"), "{code}");
        assert!(code.contains("if found != 0b000 {"), "{code}");
        assert!(code.contains("operands: [r_m_operand, Operand::Immediate(Immediate::new(data, w == 1))],"));
    }

    #[test]
    fn test_fully_matched_byte_is_skipped() {
        let code = emit("je(Jump_Equal) | 01110100 | ip_inc8", &[(BitPosition::START, 8)]).unwrap();
        assert!(code.starts_with("offset += 1;\nlet ip_inc = read_u8(input, offset)? as i8;"));
        assert!(code.contains("operands: [Operand::Relative(i16::from(ip_inc)), Operand::None],"));
    }

    #[test]
    fn test_sign_extended_data() {
        let code = emit(
            "add(ImmediateToRegisterMemory) | 100000 s w | mod 000 r_m | disp_lo | disp_hi | data_lo | data_hi",
            &[(BitPosition::START, 6), (BitPosition { byte: 1, bit: 2 }, 3)],
        )
        .unwrap();
        assert!(code.contains("if w == 1 && s == 0 {"), "{code}");
        assert!(code.contains("} else if w == 1 {"), "{code}");
        assert!(!code.contains("LiteralMismatch"), "{code}");
    }

    #[test]
    fn test_accumulator_forms() {
        let load = emit("mov(MemoryToAccumulator) | 1010000 w | addr_lo | addr_hi", &[]).unwrap();
        assert!(load.contains(
            "operands: [Operand::Register(Register::resolve(0, w)), Operand::Memory(EffectiveAddress::direct(address))],"
        ));

        let store = emit("mov(AccumulatorToMemory) | 1010001 w | addr_lo | addr_hi", &[]).unwrap();
        assert!(store.contains(
            "operands: [Operand::Memory(EffectiveAddress::direct(address)), Operand::Register(Register::resolve(0, w))],"
        ));
    }

    #[test]
    fn test_unknown_streaming_field() {
        match emit("mov(A) | 10001000 | imm8", &[]).unwrap_err() {
            DecodegenError::UnknownField { instruction, field } => {
                assert_eq!(instruction, "mov(A)");
                assert_eq!(field, "imm8");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unpaired_fields() {
        let err = emit("mov(A) | 1011 w reg | data_lo", &[]).unwrap_err();
        assert!(matches!(err, DecodegenError::Pairing { ref field, .. } if field == "data_lo"));

        let err = emit("mov(A) | 1011 w reg | data_hi", &[]).unwrap_err();
        assert!(matches!(err, DecodegenError::Pairing { ref field, .. } if field == "data_hi"));
    }

    #[test]
    fn test_displacement_needs_modrm() {
        let err = emit("mov(A) | 1011 w reg | disp_lo | disp_hi", &[]).unwrap_err();
        assert!(matches!(err, DecodegenError::OperandLayout { .. }), "{err}");
    }

    #[test]
    fn test_field_idents() {
        assert_eq!(field_ident("mod"), "r#mod");
        assert_eq!(field_ident("self"), "self_field");
        assert_eq!(field_ident("offset"), "offset_field");
        assert_eq!(field_ident("r_m"), "r_m");
    }
}
