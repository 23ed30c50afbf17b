//! Instruction model.
//!
//! An [`Instruction`] is a value-like record of {operation, operand, labels}.
//! Instructions live by position in a method's instruction buffer; the labels
//! attached to an instruction mark it as a jump target for branches whose
//! operand is one of those labels.
//!
//! ## Textual syntax
//!
//! Instructions render to, and parse from, `[L_n: ...] mnemonic [operand]`:
//!
//! ```text
//! L_4: ldarg.0
//! ldfld StardewValley.Crop::harvestMethod
//! call Game1::get_player()
//! ldc.r4 64
//! ldstr "hello"
//! stloc.s V_5
//! brfalse L_4
//! switch (L_1, L_2)
//! ldtoken type StardewValley.Farmer
//! ```

pub mod ins;
mod label;
mod opcode;
mod operand;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

pub use label::{Label, LabelAllocator};
pub use opcode::{OpCode, OperandKind};
pub use operand::{MemberKind, MemberRef, Operand};

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub opcode: OpCode,
    pub operand: Operand,
    /// Labels marking this instruction as a jump target
    pub labels: Vec<Label>,
}

impl Instruction {
    pub fn new(opcode: OpCode) -> Self {
        Self::with_operand(opcode, Operand::None)
    }

    pub fn with_operand(opcode: OpCode, operand: Operand) -> Self {
        Self {
            opcode,
            operand,
            labels: Vec::new(),
        }
    }

    pub fn with_label(mut self, label: Label) -> Self {
        if !self.labels.contains(&label) {
            self.labels.push(label);
        }
        self
    }

    /// Copy of this instruction that is not a jump target
    pub fn without_labels(&self) -> Self {
        Self::with_operand(self.opcode, self.operand.clone())
    }

    pub fn is_branch(&self) -> bool {
        self.opcode.is_branch()
    }

    /// Label this instruction jumps to, if it is a branch
    pub fn branch_target(&self) -> Option<Label> {
        if self.is_branch() {
            self.operand.as_label()
        } else {
            None
        }
    }

    /// Same operation and operand, ignoring attached labels
    pub fn same_code(&self, other: &Instruction) -> bool {
        self.opcode == other.opcode && self.operand == other.operand
    }

    /// Normalized text rendering without labels, used for containment matching
    pub fn text(&self) -> String {
        let mut out = String::from(self.opcode.mnemonic());
        if !self.operand.is_none() {
            out.push(' ');
            out.push_str(&self.operand_text());
        }
        out
    }

    fn operand_text(&self) -> String {
        match (&self.operand, self.opcode.operand_kind()) {
            (
                Operand::Member(member),
                OperandKind::Field | OperandKind::Method | OperandKind::Type,
            ) if kind_matches(self.opcode.operand_kind(), member.kind) => member.qualified_name(),
            (operand, _) => operand.to_string(),
        }
    }
}

fn kind_matches(expected: OperandKind, actual: MemberKind) -> bool {
    matches!(
        (expected, actual),
        (OperandKind::Field, MemberKind::Field)
            | (OperandKind::Method, MemberKind::Method)
            | (OperandKind::Type, MemberKind::Type)
    )
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for label in &self.labels {
            write!(f, "{}: ", label)?;
        }
        f.write_str(&self.text())
    }
}

impl FromStr for Instruction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut rest = s.trim();
        let mut labels = Vec::new();

        // Leading "L_n:" tokens attach labels
        while let Some((token, tail)) = split_token(rest) {
            let Some(label) = token.strip_suffix(':') else {
                break;
            };
            let Ok(label) = label.parse::<Label>() else {
                break;
            };
            labels.push(label);
            rest = tail;
        }

        let (mnemonic, operand_text) = split_token(rest)
            .ok_or_else(|| Error::Syntax(format!("Missing opcode in '{}'", s.trim())))?;
        let opcode = OpCode::from_str(mnemonic)
            .map_err(|_| Error::Syntax(format!("Unknown opcode '{}'", mnemonic)))?;
        let operand = parse_operand(opcode, operand_text)?;

        Ok(Self {
            opcode,
            operand,
            labels,
        })
    }
}

fn split_token(text: &str) -> Option<(&str, &str)> {
    let text = text.trim_start();
    if text.is_empty() {
        return None;
    }
    match text.find(char::is_whitespace) {
        Some(pos) => Some((&text[..pos], text[pos..].trim())),
        None => Some((text, "")),
    }
}

fn parse_operand(opcode: OpCode, text: &str) -> Result<Operand> {
    let text = text.trim();
    let kind = opcode.operand_kind();

    if kind == OperandKind::None {
        if !text.is_empty() {
            return Err(Error::Syntax(format!(
                "{} takes no operand, found '{}'",
                opcode, text
            )));
        }
        return Ok(Operand::None);
    }
    if text.is_empty() {
        return Err(Error::Syntax(format!("{} expects a {} operand", opcode, kind)));
    }

    let invalid = |e: &dyn fmt::Display| {
        Error::Syntax(format!("Invalid {} operand '{}' for {}: {}", kind, text, opcode, e))
    };

    let operand = match kind {
        OperandKind::None => Operand::None,
        OperandKind::Int8 => Operand::Int8(text.parse().map_err(|e| invalid(&e))?),
        OperandKind::Int32 => Operand::Int32(text.parse().map_err(|e| invalid(&e))?),
        OperandKind::Int64 => Operand::Int64(text.parse().map_err(|e| invalid(&e))?),
        OperandKind::Float32 => Operand::Float32(text.parse().map_err(|e| invalid(&e))?),
        OperandKind::Float64 => Operand::Float64(text.parse().map_err(|e| invalid(&e))?),
        OperandKind::String => {
            Operand::String(serde_json::from_str(text).map_err(|e| invalid(&e))?)
        }
        OperandKind::Local => {
            let slot = text.strip_prefix("V_").unwrap_or(text);
            Operand::Local(slot.parse().map_err(|e| invalid(&e))?)
        }
        OperandKind::Argument => {
            let index = text.strip_prefix("A_").unwrap_or(text);
            Operand::Argument(index.parse().map_err(|e| invalid(&e))?)
        }
        OperandKind::Branch => Operand::Label(text.parse()?),
        OperandKind::Switch => {
            let inner = text
                .strip_prefix('(')
                .and_then(|t| t.strip_suffix(')'))
                .ok_or_else(|| invalid(&"expected (L_a, L_b, ...)"))?;
            let labels = inner
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(Label::from_str)
                .collect::<Result<Vec<_>>>()?;
            Operand::Switch(labels)
        }
        OperandKind::Field | OperandKind::Method | OperandKind::Type => {
            let member = if has_kind_prefix(text) {
                MemberRef::from_str(text)?
            } else {
                let member_kind = match kind {
                    OperandKind::Field => MemberKind::Field,
                    OperandKind::Method => MemberKind::Method,
                    _ => MemberKind::Type,
                };
                MemberRef::parse_as(member_kind, text)?
            };
            Operand::Member(member)
        }
        OperandKind::Token => Operand::Member(MemberRef::from_str(text)?),
    };

    Ok(operand)
}

fn has_kind_prefix(text: &str) -> bool {
    ["field ", "method ", "type "]
        .iter()
        .any(|prefix| text.starts_with(prefix))
}

impl Serialize for Instruction {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Instruction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Instruction::from_str(&text).map_err(serde::de::Error::custom)
    }
}
