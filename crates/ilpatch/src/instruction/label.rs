//! Branch-target identities.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

use super::{Instruction, Operand};

/// Opaque jump-target identity.
///
/// A label is attached to zero or more instructions (normally one) and
/// referenced by the operand of branch instructions. Labels are rendered as
/// `L_<id>` in the textual instruction syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(u32);

impl Label {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L_{}", self.0)
    }
}

impl FromStr for Label {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let id = s
            .strip_prefix("L_")
            .ok_or_else(|| Error::Syntax(format!("Invalid label '{}': expected L_<id>", s)))?;
        let id = id
            .parse::<u32>()
            .map_err(|e| Error::Syntax(format!("Invalid label '{}': {}", s, e)))?;
        Ok(Label(id))
    }
}

/// Mints fresh labels for one method body.
///
/// The hosting runtime hands one out together with the instruction buffer.
/// Ids never repeat within an allocator, and an allocator created with
/// [`LabelAllocator::starting_after`] never collides with labels already
/// present in the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelAllocator {
    next: u32,
}

impl Default for LabelAllocator {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl LabelAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocator whose first label is one past the highest label referenced
    /// or attached anywhere in `instructions`
    pub fn starting_after(instructions: &[Instruction]) -> Self {
        let highest = instructions
            .iter()
            .flat_map(|instr| {
                let referenced: Vec<u32> = match &instr.operand {
                    Operand::Label(label) => vec![label.id()],
                    Operand::Switch(labels) => labels.iter().map(Label::id).collect(),
                    _ => Vec::new(),
                };
                instr.labels.iter().map(Label::id).chain(referenced)
            })
            .max()
            .unwrap_or(0);
        Self { next: highest + 1 }
    }

    /// Mint a new, never-before-seen label
    pub fn define_label(&mut self) -> Label {
        let label = Label(self.next);
        self.next += 1;
        label
    }

    /// Mint a new label and attach it to `target`
    pub fn attach_label(&mut self, target: &mut Instruction) -> Label {
        let label = self.define_label();
        target.labels.push(label);
        label
    }
}
