//! Textual pattern syntax.
//!
//! A pattern is a list of matchers separated by `;` or newlines:
//!
//! ```text
//! ldarg.0
//! ldfld StardewValley.Crop::harvestMethod   exact instruction
//! ?                                         any instruction (also `*`)
//! brfalse                                   opcode only
//! @StardewValley.Game1::get_random          operand names this symbol
//! %float32                                  operand is of this kind
//! ~NextDouble                               text contains (also "NextDouble")
//! ```

use std::str::FromStr;

use crate::error::{Error, Result};
use crate::instruction::{Instruction, MemberKind, MemberRef, OpCode, OperandKind};
use crate::matcher::Matcher;

pub fn parse_pattern(pattern: &str) -> Result<Vec<Matcher>> {
    split_items(pattern)?
        .into_iter()
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(Matcher::from_str)
        .collect()
}

/// Render a matcher list as a single-line pattern
pub fn format_pattern(matchers: &[Matcher]) -> String {
    matchers
        .iter()
        .map(Matcher::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Split on `;` and newlines outside double-quoted strings
fn split_items(pattern: &str) -> Result<Vec<&str>> {
    let mut items = Vec::new();
    let mut item_start = 0;
    let mut in_string = false;
    let mut escaped = false;

    for (pos, c) in pattern.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            ';' | '\n' => {
                items.push(&pattern[item_start..pos]);
                item_start = pos + 1;
            }
            _ => {}
        }
    }

    if in_string {
        return Err(Error::Syntax(format!(
            "Unterminated string in pattern '{}'",
            pattern.trim()
        )));
    }
    items.push(&pattern[item_start..]);
    Ok(items)
}

fn parse_text(text: &str) -> Result<String> {
    let text = text.trim();
    if text.starts_with('"') {
        serde_json::from_str(text)
            .map_err(|e| Error::Syntax(format!("Invalid string {}: {}", text, e)))
    } else if text.is_empty() {
        Err(Error::Syntax("Empty text matcher".to_string()))
    } else {
        Ok(text.to_string())
    }
}

fn parse_member(text: &str) -> Result<MemberRef> {
    let text = text.trim();
    if ["field ", "method ", "type "]
        .iter()
        .any(|prefix| text.starts_with(prefix))
    {
        return MemberRef::from_str(text);
    }
    let kind = if !text.contains("::") {
        MemberKind::Type
    } else if text.contains('(') {
        MemberKind::Method
    } else {
        MemberKind::Field
    };
    MemberRef::parse_as(kind, text)
}

/// Parse a single pattern item
impl FromStr for Matcher {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let item = s.trim();
        match item {
            "?" | "*" => return Ok(Matcher::Any),
            "" => return Err(Error::Syntax("Empty pattern item".to_string())),
            _ => {}
        }

        if let Some(member) = item.strip_prefix('@') {
            return Ok(Matcher::Member(parse_member(member)?));
        }
        if let Some(kind) = item.strip_prefix('%') {
            let kind = OperandKind::from_str(kind.trim())
                .map_err(|_| Error::Syntax(format!("Unknown operand kind '{}'", kind)))?;
            return Ok(Matcher::Operand(kind));
        }
        if let Some(text) = item.strip_prefix('~') {
            return Ok(Matcher::Contains(parse_text(text)?));
        }
        if item.starts_with('"') {
            return Ok(Matcher::Contains(parse_text(item)?));
        }

        let (mnemonic, operand) = match item.split_once(char::is_whitespace) {
            Some((mnemonic, operand)) => (mnemonic, operand.trim()),
            None => (item, ""),
        };
        let opcode = OpCode::from_str(mnemonic)
            .map_err(|_| Error::Syntax(format!("Unknown pattern item '{}'", item)))?;
        if operand.is_empty() {
            Ok(Matcher::OpCode(opcode))
        } else {
            Ok(Matcher::Exact(Instruction::from_str(item)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::ins;
    use crate::matchers;

    #[test]
    fn test_parse_pattern() {
        let pattern = parse_pattern(
            "ldarg.0; ldfld StardewValley.Crop::harvestMethod; ?; brfalse; \
             @StardewValley.Game1::get_random; ~NextDouble",
        )
        .unwrap();
        assert_eq!(
            pattern,
            matchers![
                OpCode::Ldarg0,
                ins::ldfld("StardewValley.Crop", "harvestMethod"),
                Matcher::Any,
                OpCode::Brfalse,
                MemberRef::field("StardewValley.Game1", "get_random"),
                "NextDouble",
            ]
        );
    }

    #[test]
    fn test_lines_and_quotes() {
        let pattern = parse_pattern("ldstr \"a;b\"\n\"x\\\"y\"\n\n*\n").unwrap();
        assert_eq!(
            pattern,
            vec![
                Matcher::Exact(ins::ldstr("a;b")),
                Matcher::Contains("x\"y".to_string()),
                Matcher::Any,
            ]
        );
    }

    #[test]
    fn test_member_forms() {
        let pattern = parse_pattern(
            "@Farmer::addItemToInventoryBool(Item, bool); @StardewValley.Object; @method Farmer::get_leftRing",
        )
        .unwrap();
        assert_eq!(
            pattern,
            vec![
                Matcher::Member(
                    MemberRef::method("Farmer", "addItemToInventoryBool").with_signature("Item, bool")
                ),
                Matcher::Member(MemberRef::ty("StardewValley.Object")),
                Matcher::Member(MemberRef::method("Farmer", "get_leftRing")),
            ]
        );
    }

    #[test]
    fn test_operand_kind_items() {
        let pattern = parse_pattern("%float32; %field").unwrap();
        assert_eq!(
            pattern,
            vec![
                Matcher::Operand(OperandKind::Float32),
                Matcher::Operand(OperandKind::Field),
            ]
        );
        assert_eq!(format_pattern(&pattern), "%float32; %field");
        assert!(parse_pattern("%bogus").is_err());
    }

    #[test]
    fn test_empty_pattern() {
        assert!(parse_pattern("").unwrap().is_empty());
        assert!(parse_pattern(" ; \n").unwrap().is_empty());
    }

    #[test]
    fn test_format_roundtrip() {
        let pattern = matchers![
            OpCode::Ldarg0,
            ins::ldc_r4(64.0),
            Matcher::Any,
            MemberRef::field("Crop", "forageCrop"),
            "a;b",
            ins::ldstr("x"),
        ];
        let text = format_pattern(&pattern);
        assert_eq!(
            text,
            "ldarg.0; ldc.r4 64; ?; @Crop::forageCrop; ~\"a;b\"; ldstr \"x\""
        );
        assert_eq!(parse_pattern(&text).unwrap(), pattern);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse_pattern("frobnicate"), Err(Error::Syntax(_))));
        assert!(matches!(parse_pattern("ldstr \"open"), Err(Error::Syntax(_))));
        assert!(matches!(parse_pattern("@"), Err(Error::Syntax(_))));
        assert!(matches!(parse_pattern("~"), Err(Error::Syntax(_))));
        assert!(matches!(parse_pattern("ldc.i4 abc"), Err(Error::Syntax(_))));
    }
}
