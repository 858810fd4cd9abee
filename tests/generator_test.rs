//! End-to-end checks of parse, validate, format and generation on small tables.

use decodegen::codegen::{build_tree, DecisionNode};
use decodegen::{
    emit_decoder_body, emit_module, load, BitField, CodegenConfig, DecodegenError,
    GenerationSession, InstructionSet,
};
use bumpalo::Bump;

const X86_TABLE: &str = include_str!("../decodegen-x86/x86.table");

#[test]
fn test_register_move_parses_to_two_bytes() {
    let set = load("mov(RegisterMemory_ToFrom_Register) | 100010 d w | mod reg r_m").unwrap();
    let mov = &set.instructions()[0];
    let widths: Vec<Vec<(Option<&str>, u8)>> = mov
        .bytes
        .iter()
        .map(|b| b.fields.iter().map(|f| (f.name(), f.width())).collect())
        .collect();
    assert_eq!(
        widths,
        vec![
            vec![(None, 6), (Some("d"), 1), (Some("w"), 1)],
            vec![(Some("mod"), 2), (Some("reg"), 3), (Some("r_m"), 3)],
        ]
    );
    assert_eq!(mov.bytes[0].fields[0], BitField::Literal { value: 0b100010, width: 6 });

    let body = emit_decoder_body(&set, &CodegenConfig::default()).unwrap();
    assert!(body.contains("let d = (byte0 >> 1) & 0b1;"));
    assert!(body.contains("let w = byte0 & 0b1;"));
    assert!(body.contains("let r#mod = byte1 >> 6;"));
    assert!(body.contains("let reg = (byte1 >> 3) & 0b111;"));
    assert!(body.contains("let r_m = byte1 & 0b111;"));
    assert!(body.contains("let (destination, source) = if d == 1 {"));
}

#[test]
fn test_two_six_bit_opcodes_share_one_branch() {
    let set = load(
        "mov(RegisterMemory_ToFrom_Register) | 100010 d w | mod reg r_m\n\
         add(RegisterMemory_WithRegister_ToEither) | 000000 d w | mod reg r_m\n",
    )
    .unwrap();

    let arena = Bump::new();
    let session = GenerationSession::new(&arena);
    let candidates: Vec<_> = set.iter().collect();
    let tree = build_tree(&session, &candidates).unwrap();
    match tree {
        DecisionNode::Branch { width, children, .. } => {
            assert_eq!(*width, 6);
            let labels: Vec<u8> = children.iter().map(|(v, _)| *v).collect();
            assert_eq!(labels, vec![0b000000, 0b100010]);
        }
        DecisionNode::Leaf { .. } => panic!("expected a branch"),
    }

    let body = emit_decoder_body(&set, &CodegenConfig::default()).unwrap();
    assert_eq!(body.matches(" => {").count(), 2);
    assert!(body.contains("0b100010 => {"));
    assert!(body.contains("0b000000 => {"));
    assert!(body.contains("_ => Err(DecodeError::UnimplementedOpcode"));
}

#[test]
fn test_sign_flag_controls_high_data_byte() {
    let set = load(
        "add(ImmediateToRegisterMemory) | 100000 s w | mod 000 r_m | disp_lo | disp_hi | data_lo | data_hi",
    )
    .unwrap();
    let body = emit_decoder_body(&set, &CodegenConfig::default()).unwrap();

    let read_high = body.find("if w == 1 && s == 0 {").unwrap();
    let extend = body.find("data = data as u8 as i8 as i16 as u16;").unwrap();
    assert!(read_high < extend);
    assert!(body[read_high..extend].contains("data |= u16::from(read_u8(input, offset)?) << 8;"));
}

#[test]
fn test_bundled_table_is_canonical_and_generates() {
    let set = load(X86_TABLE).unwrap();
    assert_eq!(set.format(), X86_TABLE);

    let module = emit_module(&set, &CodegenConfig::default()).unwrap();
    for instr in &set {
        assert!(module.contains(&format!("    {},\n", instr.enumerator())));
        assert!(module.contains(&format!("// {}\n", instr.label())));
    }
}

#[test]
fn test_partition_is_exclusive_on_bundled_table() {
    let set = load(X86_TABLE).unwrap();
    let arena = Bump::new();
    let session = GenerationSession::new(&arena);
    let candidates: Vec<_> = set.iter().collect();
    let tree = build_tree(&session, &candidates).unwrap();

    // Every instruction ends up in exactly one leaf.
    let leaves = tree.leaves();
    assert_eq!(leaves.len(), set.len());
    for instr in &set {
        assert_eq!(leaves.iter().filter(|l| l.label() == instr.label()).count(), 1);
    }
    assert_eq!(session.stats().leaves, set.len());
}

#[test]
fn test_invalid_tables_are_rejected() {
    let err = load("mov(A) | 100010 d w | mod reg").unwrap_err();
    assert!(matches!(err, DecodegenError::Structural { .. }));

    let err = load("mov A | 10001000").unwrap_err();
    assert!(matches!(err, DecodegenError::Parse { line: 1, .. }));

    let set = InstructionSet::parse("mov(A) | 10001000 | imm_lo | imm_hi").unwrap();
    let err = emit_decoder_body(&set, &CodegenConfig::default()).unwrap_err();
    assert!(matches!(err, DecodegenError::UnknownField { .. }));
    assert!(err.to_string().starts_with("mov(A): "));
}
