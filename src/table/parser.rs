//! Encoding table parser.

use super::{BitField, ByteSpec, InstructionSet, InstructionSpec};
use crate::core::{DecodegenError, Result};

/// Parse table text into an [`InstructionSet`].
///
/// Blank lines and lines starting with `#` are skipped. The first malformed
/// line stops the parse.
pub fn parse_table(text: &str) -> Result<InstructionSet> {
    let mut instructions = Vec::new();

    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let parser = LineParser::new(index + 1, line);
        instructions.push(parser.parse()?);
    }

    log::debug!("parsed {} instructions", instructions.len());
    Ok(InstructionSet::new(instructions))
}

/// Width of the 8086 sub-fields that may appear bare inside a packed byte.
fn conventional_width(name: &str) -> Option<u8> {
    match name {
        "d" | "w" | "s" | "v" | "z" => Some(1),
        "mod" | "sr" => Some(2),
        "reg" | "r_m" => Some(3),
        _ => None,
    }
}

struct LineParser<'a> {
    line: usize,
    text: &'a str,
}

impl<'a> LineParser<'a> {
    fn new(line: usize, text: &'a str) -> Self {
        Self { line, text }
    }

    fn parse(self) -> Result<InstructionSpec> {
        let (head, rest) = self
            .text
            .split_once('|')
            .ok_or_else(|| self.error(self.text, "expected `|` after the instruction name"))?;

        let (name, description) = self.parse_header(head.trim())?;

        let bytes = rest
            .split('|')
            .map(|cell| self.parse_byte(cell.trim()))
            .collect::<Result<Vec<_>>>()?;

        Ok(InstructionSpec {
            name: name.to_string(),
            description: description.to_string(),
            bytes,
            line: self.line,
        })
    }

    fn parse_header(&self, head: &'a str) -> Result<(&'a str, &'a str)> {
        let (name, after) = head
            .split_once('(')
            .ok_or_else(|| self.error(head, "expected `(` after the mnemonic"))?;
        let (description, trailing) = after
            .split_once(')')
            .ok_or_else(|| self.error(head, "expected `)` after the description"))?;

        if !trailing.trim().is_empty() {
            return Err(self.error(trailing.trim(), "unexpected text after `)`"));
        }

        let name = name.trim();
        let description = description.trim();
        self.expect_identifier(name)?;
        self.expect_identifier(description)?;
        Ok((name, description))
    }

    fn parse_byte(&self, cell: &str) -> Result<ByteSpec> {
        if cell.is_empty() {
            return Err(self.error("|", "empty byte cell"));
        }
        let tokens: Vec<&str> = cell.split_whitespace().collect();
        let packed = tokens.len() > 1;
        let fields = tokens
            .into_iter()
            .map(|token| self.parse_token(token, packed))
            .collect::<Result<Vec<_>>>()?;
        Ok(ByteSpec::new(fields))
    }

    fn parse_token(&self, token: &str, packed: bool) -> Result<BitField> {
        if token.starts_with('0') || token.starts_with('1') {
            return self.parse_literal(token);
        }

        match token.split_once('(') {
            Some((name, after)) => {
                let digits = after
                    .strip_suffix(')')
                    .ok_or_else(|| self.error(token, "expected `)` after the field width"))?;
                self.expect_identifier(name)?;
                let width: u8 = digits
                    .trim()
                    .parse()
                    .map_err(|e| self.error(token, &format!("invalid field width: {e}")))?;
                if width == 0 {
                    return Err(self.error(token, "field width must be at least 1"));
                }
                Ok(BitField::Named {
                    name: name.to_string(),
                    width,
                })
            }
            None => {
                self.expect_identifier(token)?;
                let width = if packed {
                    conventional_width(token).unwrap_or(8)
                } else {
                    8
                };
                Ok(BitField::Named {
                    name: token.to_string(),
                    width,
                })
            }
        }
    }

    fn parse_literal(&self, token: &str) -> Result<BitField> {
        if let Some(bad) = token.chars().find(|c| *c != '0' && *c != '1') {
            return Err(self.error(token, &format!("`{bad}` is not a binary digit")));
        }
        if token.len() > 8 {
            return Err(self.error(token, "literal is wider than a byte"));
        }
        let value = u8::from_str_radix(token, 2)
            .map_err(|e| self.error(token, &format!("invalid literal: {e}")))?;
        Ok(BitField::Literal {
            value,
            width: token.len() as u8,
        })
    }

    fn expect_identifier(&self, ident: &str) -> Result<()> {
        let mut chars = ident.chars();
        let valid = match chars.next() {
            Some(first) => {
                (first.is_ascii_alphabetic() || first == '_')
                    && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            None => false,
        };
        if valid {
            Ok(())
        } else {
            Err(self.error(ident, "expected an identifier"))
        }
    }

    fn error(&self, token: &str, reason: &str) -> DecodegenError {
        DecodegenError::Parse {
            line: self.line,
            token: token.to_string(),
            reason: reason.to_string(),
        }
    }
}
