//! Instruction operands and external symbol references.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::{Error, Result};

use super::{Label, OperandKind};

/// What kind of external symbol a [`MemberRef`] names
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MemberKind {
    Field,
    Method,
    Type,
}

/// Reference to a named external symbol (field, method or type).
///
/// Fields and methods are written `Declaring.Type::name`, methods optionally
/// followed by a parameter list `(int, bool)`. Types are written by their
/// full name alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemberRef {
    pub kind: MemberKind,
    pub declaring_type: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl MemberRef {
    pub fn field(declaring_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: MemberKind::Field,
            declaring_type: declaring_type.into(),
            name: name.into(),
            signature: None,
        }
    }

    pub fn method(declaring_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: MemberKind::Method,
            declaring_type: declaring_type.into(),
            name: name.into(),
            signature: None,
        }
    }

    pub fn ty(full_name: impl Into<String>) -> Self {
        Self {
            kind: MemberKind::Type,
            declaring_type: full_name.into(),
            name: String::new(),
            signature: None,
        }
    }

    /// Attach a parameter list, distinguishing overloads
    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    /// Whether `other` names the same symbol.
    ///
    /// The symbol identity is the declaring type and member name. A side
    /// without a signature accepts every overload.
    pub fn same_symbol(&self, other: &MemberRef) -> bool {
        if self.declaring_type != other.declaring_type || self.name != other.name {
            return false;
        }
        match (&self.signature, &other.signature) {
            (Some(a), Some(b)) => normalize_signature(a) == normalize_signature(b),
            _ => true,
        }
    }

    /// `Type::name(sig)` without the kind prefix
    pub fn qualified_name(&self) -> String {
        let mut out = self.declaring_type.clone();
        if self.kind != MemberKind::Type {
            out.push_str("::");
            out.push_str(&self.name);
        }
        if let Some(signature) = &self.signature {
            out.push('(');
            out.push_str(signature);
            out.push(')');
        }
        out
    }

    /// Parse `Type::name(sig)` with a known kind
    pub fn parse_as(kind: MemberKind, text: &str) -> Result<Self> {
        let text = text.trim();
        let (body, signature) = match text.find('(') {
            Some(open) => {
                let close = text.rfind(')').filter(|&close| close > open).ok_or_else(|| {
                    Error::Syntax(format!("Unbalanced parameter list in '{}'", text))
                })?;
                (&text[..open], Some(text[open + 1..close].trim().to_string()))
            }
            None => (text, None),
        };

        if body.is_empty() {
            return Err(Error::Syntax("Member reference is empty".to_string()));
        }

        let member = match kind {
            MemberKind::Type => MemberRef::ty(body),
            MemberKind::Field | MemberKind::Method => {
                let (declaring_type, name) = body.rsplit_once("::").ok_or_else(|| {
                    Error::Syntax(format!("Expected Type::member, found '{}'", body))
                })?;
                if declaring_type.is_empty() || name.is_empty() {
                    return Err(Error::Syntax(format!(
                        "Expected Type::member, found '{}'",
                        body
                    )));
                }
                MemberRef {
                    kind,
                    declaring_type: declaring_type.to_string(),
                    name: name.to_string(),
                    signature: None,
                }
            }
        };

        Ok(match signature {
            Some(signature) => member.with_signature(signature),
            None => member,
        })
    }
}

fn normalize_signature(signature: &str) -> String {
    signature.split_whitespace().collect()
}

impl fmt::Display for MemberRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.qualified_name())
    }
}

/// `field Type::name`, `method Type::name(sig)` or `type Name`
impl FromStr for MemberRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (kind, rest) = s
            .split_once(char::is_whitespace)
            .ok_or_else(|| Error::Syntax(format!("Expected '<kind> <name>', found '{}'", s)))?;
        let kind = MemberKind::from_str(kind)
            .map_err(|_| Error::Syntax(format!("Unknown member kind '{}'", kind)))?;
        MemberRef::parse_as(kind, rest)
    }
}

/// Typed operand value of an instruction.
///
/// Float constants compare by bit pattern, so `ldc.r4 NaN` equals itself and
/// `0` and `-0` are different constants.
#[derive(Debug, Clone, Default)]
pub enum Operand {
    #[default]
    None,
    Int8(i8),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    String(String),
    /// Local variable slot
    Local(u16),
    /// Argument index
    Argument(u16),
    Label(Label),
    Switch(Vec<Label>),
    Member(MemberRef),
}

impl PartialEq for Operand {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Operand::None, Operand::None) => true,
            (Operand::Int8(a), Operand::Int8(b)) => a == b,
            (Operand::Int32(a), Operand::Int32(b)) => a == b,
            (Operand::Int64(a), Operand::Int64(b)) => a == b,
            (Operand::Float32(a), Operand::Float32(b)) => a.to_bits() == b.to_bits(),
            (Operand::Float64(a), Operand::Float64(b)) => a.to_bits() == b.to_bits(),
            (Operand::String(a), Operand::String(b)) => a == b,
            (Operand::Local(a), Operand::Local(b)) => a == b,
            (Operand::Argument(a), Operand::Argument(b)) => a == b,
            (Operand::Label(a), Operand::Label(b)) => a == b,
            (Operand::Switch(a), Operand::Switch(b)) => a == b,
            (Operand::Member(a), Operand::Member(b)) => a == b,
            _ => false,
        }
    }
}

impl Operand {
    pub fn is_none(&self) -> bool {
        matches!(self, Operand::None)
    }

    /// Kind of this value; member operands report their member kind
    pub fn kind(&self) -> OperandKind {
        match self {
            Operand::None => OperandKind::None,
            Operand::Int8(_) => OperandKind::Int8,
            Operand::Int32(_) => OperandKind::Int32,
            Operand::Int64(_) => OperandKind::Int64,
            Operand::Float32(_) => OperandKind::Float32,
            Operand::Float64(_) => OperandKind::Float64,
            Operand::String(_) => OperandKind::String,
            Operand::Local(_) => OperandKind::Local,
            Operand::Argument(_) => OperandKind::Argument,
            Operand::Label(_) => OperandKind::Branch,
            Operand::Switch(_) => OperandKind::Switch,
            Operand::Member(member) => match member.kind {
                MemberKind::Field => OperandKind::Field,
                MemberKind::Method => OperandKind::Method,
                MemberKind::Type => OperandKind::Type,
            },
        }
    }

    pub fn as_label(&self) -> Option<Label> {
        match self {
            Operand::Label(label) => Some(*label),
            _ => None,
        }
    }

    pub fn as_member(&self) -> Option<&MemberRef> {
        match self {
            Operand::Member(member) => Some(member),
            _ => None,
        }
    }

    pub fn as_local(&self) -> Option<u16> {
        match self {
            Operand::Local(slot) => Some(*slot),
            _ => None,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::None => Ok(()),
            Operand::Int8(value) => write!(f, "{}", value),
            Operand::Int32(value) => write!(f, "{}", value),
            Operand::Int64(value) => write!(f, "{}", value),
            Operand::Float32(value) => write!(f, "{}", value),
            Operand::Float64(value) => write!(f, "{}", value),
            Operand::String(value) => {
                let quoted = serde_json::to_string(value).map_err(|_| fmt::Error)?;
                f.write_str(&quoted)
            }
            Operand::Local(slot) => write!(f, "V_{}", slot),
            Operand::Argument(index) => write!(f, "A_{}", index),
            Operand::Label(label) => write!(f, "{}", label),
            Operand::Switch(labels) => {
                let labels: Vec<String> = labels.iter().map(Label::to_string).collect();
                write!(f, "({})", labels.join(", "))
            }
            Operand::Member(member) => write!(f, "{}", member),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_parse_field() {
        let member: MemberRef = "field StardewValley.Crop::harvestMethod".parse().unwrap();
        assert_eq!(member.kind, MemberKind::Field);
        assert_eq!(member.declaring_type, "StardewValley.Crop");
        assert_eq!(member.name, "harvestMethod");
        assert_eq!(member.signature, None);
        assert_eq!(member.to_string(), "field StardewValley.Crop::harvestMethod");
    }

    #[test]
    fn test_member_parse_method_with_signature() {
        let member =
            MemberRef::parse_as(MemberKind::Method, "Farmer::addItemToInventoryBool(Item, bool)")
                .unwrap();
        assert_eq!(member.name, "addItemToInventoryBool");
        assert_eq!(member.signature.as_deref(), Some("Item, bool"));
        assert_eq!(
            member.qualified_name(),
            "Farmer::addItemToInventoryBool(Item, bool)"
        );
    }

    #[test]
    fn test_member_parse_type() {
        let member: MemberRef = "type StardewValley.TerrainFeatures.HoeDirt".parse().unwrap();
        assert_eq!(member, MemberRef::ty("StardewValley.TerrainFeatures.HoeDirt"));
        assert_eq!(member.qualified_name(), "StardewValley.TerrainFeatures.HoeDirt");
    }

    #[test]
    fn test_member_parse_errors() {
        assert!(MemberRef::parse_as(MemberKind::Field, "noSeparator").is_err());
        assert!(MemberRef::parse_as(MemberKind::Method, "A::b(int").is_err());
        assert!("gadget A::b".parse::<MemberRef>().is_err());
    }

    #[test]
    fn test_same_symbol_ignores_missing_signature() {
        let any = MemberRef::method("Farmer", "isWearingRing");
        let exact = MemberRef::method("Farmer", "isWearingRing").with_signature("int");
        let other = MemberRef::method("Farmer", "isWearingRing").with_signature("string");
        assert!(any.same_symbol(&exact));
        assert!(exact.same_symbol(&any));
        assert!(!exact.same_symbol(&other));
        assert!(exact.same_symbol(&MemberRef::method("Farmer", "isWearingRing").with_signature(" int ")));
        assert!(!any.same_symbol(&MemberRef::method("Farmer", "leftRing")));
    }

    #[test]
    fn test_operand_kind() {
        assert_eq!(Operand::Float32(1.0).kind(), OperandKind::Float32);
        assert_eq!(Operand::Label(Label::new(1)).kind(), OperandKind::Branch);
        assert_eq!(
            Operand::Member(MemberRef::method("Game1", "get_player")).kind(),
            OperandKind::Method
        );
        assert_eq!(Operand::None.kind(), OperandKind::None);
    }

    #[test]
    fn test_float_operands_compare_by_bits() {
        assert_eq!(Operand::Float32(f32::NAN), Operand::Float32(f32::NAN));
        assert_eq!(Operand::Float64(f64::NAN), Operand::Float64(f64::NAN));
        assert_ne!(Operand::Float64(0.0), Operand::Float64(-0.0));
        assert_ne!(Operand::Float32(1.0), Operand::Float64(1.0));
    }

    #[test]
    fn test_operand_display() {
        assert_eq!(Operand::Int32(-1).to_string(), "-1");
        assert_eq!(Operand::Float32(64.0).to_string(), "64");
        assert_eq!(Operand::String("a \"b\"".into()).to_string(), r#""a \"b\"""#);
        assert_eq!(Operand::Local(3).to_string(), "V_3");
        assert_eq!(
            Operand::Switch(vec![Label::new(1), Label::new(2)]).to_string(),
            "(L_1, L_2)"
        );
    }
}
