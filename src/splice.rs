//! Anchor-based splicing of generated code into a hand-written source file.
//!
//! The target holds four markers in order: the `InstrKind` enum opening and
//! closing lines, and a begin/end comment pair inside the decode function.
//! Everything between each pair is replaced; the markers themselves and all
//! text outside them are kept verbatim, so splicing the same table twice
//! yields the same file.

use crate::codegen::{emit_kind_enumerators, generate};
use crate::core::{Anchors, CodegenConfig, DecodegenError, Result, SessionStats};
use crate::table::InstructionSet;

/// Byte ranges of the two regions to replace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Regions {
    /// Between the end of the enum opening and the start of its close.
    enumerators: (usize, usize),
    /// Between the end of the begin marker and the start of the end marker.
    body: (usize, usize),
}

fn locate(source: &str, anchors: &Anchors) -> Result<Regions> {
    let find = |anchor: &str, from: usize| -> Result<(usize, usize)> {
        source[from..]
            .find(anchor)
            .map(|at| (from + at, from + at + anchor.len()))
            .ok_or_else(|| DecodegenError::AnchorNotFound {
                anchor: anchor.to_string(),
            })
    };

    let (_, enum_open) = find(&anchors.enum_open, 0)?;
    let (enum_close, after_enum) = find(&anchors.enum_close, enum_open)?;
    let (_, begin) = find(&anchors.codegen_begin, after_enum)?;
    let (end, _) = find(&anchors.codegen_end, begin)?;

    Ok(Regions {
        enumerators: (enum_open, enum_close),
        body: (begin, end),
    })
}

/// Leading whitespace of the line containing byte `at`.
fn line_indent(source: &str, at: usize) -> &str {
    let line_start = source[..at].rfind('\n').map_or(0, |i| i + 1);
    let line = &source[line_start..];
    let width = line.len() - line.trim_start_matches([' ', '\t']).len();
    &line[..width]
}

/// Indentation levels for a whitespace prefix. Tabs count as one level.
fn indent_levels(indent: &str) -> usize {
    let tabs = indent.chars().filter(|c| *c == '\t').count();
    let spaces = indent.chars().filter(|c| *c == ' ').count();
    tabs + spaces / 4
}

/// Replace the enumerator and decoder body regions of `source`.
///
/// Enumerators are indented one level deeper than the enum opening line and
/// the body at the level of the begin marker. `config.indent` is ignored;
/// the anchors decide indentation.
pub fn splice(
    source: &str,
    anchors: &Anchors,
    set: &InstructionSet,
    config: &CodegenConfig,
) -> Result<String> {
    Ok(splice_with_stats(source, anchors, set, config)?.0)
}

/// [`splice`], also returning the statistics of the generator run.
pub fn splice_with_stats(
    source: &str,
    anchors: &Anchors,
    set: &InstructionSet,
    config: &CodegenConfig,
) -> Result<(String, SessionStats)> {
    let regions = locate(source, anchors)?;

    let enum_indent = line_indent(source, regions.enumerators.0);
    let body_indent = line_indent(source, regions.body.0);
    let config = CodegenConfig {
        indent: indent_levels(body_indent),
        ..config.clone()
    };
    let mut generated = generate(set, &config)?;
    generated.enumerators = emit_kind_enumerators(set, indent_levels(enum_indent) + 1);

    let mut out = String::with_capacity(source.len() + generated.body.len());
    out.push_str(&source[..regions.enumerators.0]);
    out.push('\n');
    out.push_str(&generated.enumerators);
    out.push_str(enum_indent);
    out.push_str(&source[regions.enumerators.1..regions.body.0]);
    out.push('\n');
    out.push_str(&generated.body);
    out.push_str(body_indent);
    out.push_str(&source[regions.body.1..]);

    log::info!(
        "spliced {} enumerators and {} bytes of decoder body",
        set.len(),
        generated.body.len()
    );
    Ok((out, generated.stats))
}
