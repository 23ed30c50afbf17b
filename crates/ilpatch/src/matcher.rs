//! Single-instruction predicates used by sequence search.

use std::fmt;

use crate::instruction::{Instruction, MemberRef, OpCode, OperandKind};

/// Predicate over one instruction.
///
/// Conversions exist from every form a pattern is naturally written in, so
/// a mixed pattern can be built with [`matchers!`](crate::matchers):
///
/// | value             | matches                                          |
/// |-------------------|--------------------------------------------------|
/// | `Matcher::Any`    | any instruction                                  |
/// | `Instruction`     | same opcode and same operand                     |
/// | `OpCode`          | same opcode, any operand                         |
/// | `MemberRef`       | operand names the same symbol, any opcode        |
/// | `OperandKind`     | operand is of that kind, any value               |
/// | `&str` / `String` | normalized instruction text contains the string  |
#[derive(Debug, Clone, PartialEq)]
pub enum Matcher {
    Any,
    Exact(Instruction),
    OpCode(OpCode),
    Member(MemberRef),
    Operand(OperandKind),
    Contains(String),
}

impl Matcher {
    pub fn matches(&self, instr: &Instruction) -> bool {
        match self {
            Matcher::Any => true,
            Matcher::Exact(expected) => expected.same_code(instr),
            Matcher::OpCode(opcode) => instr.opcode == *opcode,
            Matcher::Member(member) => instr
                .operand
                .as_member()
                .is_some_and(|actual| member.same_symbol(actual)),
            Matcher::Operand(kind) => instr.operand.kind() == *kind,
            Matcher::Contains(needle) => instr.text().contains(needle.as_str()),
        }
    }
}

/// Render matchers the way they are written in textual patterns
impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Any => f.write_str("?"),
            Matcher::Exact(instr) => f.write_str(&instr.text()),
            Matcher::OpCode(opcode) => f.write_str(opcode.mnemonic()),
            Matcher::Member(member) => write!(f, "@{}", member.qualified_name()),
            Matcher::Operand(kind) => write!(f, "%{}", kind),
            Matcher::Contains(needle) => {
                let quoted = serde_json::to_string(needle).map_err(|_| fmt::Error)?;
                write!(f, "~{}", quoted)
            }
        }
    }
}

impl From<OpCode> for Matcher {
    fn from(opcode: OpCode) -> Self {
        Matcher::OpCode(opcode)
    }
}

impl From<Instruction> for Matcher {
    fn from(instr: Instruction) -> Self {
        Matcher::Exact(instr)
    }
}

impl From<&Instruction> for Matcher {
    fn from(instr: &Instruction) -> Self {
        Matcher::Exact(instr.without_labels())
    }
}

impl From<MemberRef> for Matcher {
    fn from(member: MemberRef) -> Self {
        Matcher::Member(member)
    }
}

impl From<OperandKind> for Matcher {
    fn from(kind: OperandKind) -> Self {
        Matcher::Operand(kind)
    }
}

impl From<&str> for Matcher {
    fn from(needle: &str) -> Self {
        Matcher::Contains(needle.to_string())
    }
}

impl From<String> for Matcher {
    fn from(needle: String) -> Self {
        Matcher::Contains(needle)
    }
}

impl<T: Into<Matcher>> From<Option<T>> for Matcher {
    fn from(value: Option<T>) -> Self {
        value.map_or(Matcher::Any, Into::into)
    }
}

/// Build a `Vec<Matcher>` from heterogeneous pattern elements.
///
/// ```ignore
/// let pattern = matchers![
///     OpCode::Ldarg0,
///     ins::ldfld("StardewValley.Crop", "harvestMethod"),
///     Matcher::Any,
///     "NextDouble",
/// ];
/// ```
#[macro_export]
macro_rules! matchers {
    () => {
        ::std::vec::Vec::<$crate::Matcher>::new()
    };
    ($($m:expr),+ $(,)?) => {
        ::std::vec![$($crate::Matcher::from($m)),+]
    };
}
