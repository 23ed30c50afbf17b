//! Method body handed out by the hosting runtime.

use crate::error::{Error, Result};
use crate::instruction::{Instruction, Label, LabelAllocator, Operand};

/// Instruction buffer plus the facilities needed to author new code in it
#[derive(Debug, Clone, Default)]
pub struct MethodBody {
    pub instructions: Vec<Instruction>,
    pub labels: LabelAllocator,
    /// Type names of declared local variables, indexed by slot
    pub locals: Vec<String>,
}

impl MethodBody {
    /// Body whose label allocator continues after every label in `instructions`
    pub fn new(instructions: Vec<Instruction>) -> Self {
        let labels = LabelAllocator::starting_after(&instructions);
        Self {
            instructions,
            labels,
            locals: Vec::new(),
        }
    }

    pub fn with_locals(mut self, locals: Vec<String>) -> Self {
        self.locals = locals;
        self
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Declare a new local variable, returning its slot.
    ///
    /// Slots are `u16`, matching the widest `ldloc`/`stloc` encoding.
    pub fn declare_local(&mut self, type_name: impl Into<String>) -> Result<u16> {
        let type_name = type_name.into();
        let slot = u16::try_from(self.locals.len()).map_err(|_| Error::TooManyLocals {
            type_name: type_name.clone(),
            limit: usize::from(u16::MAX) + 1,
        })?;
        self.locals.push(type_name);
        Ok(slot)
    }

    /// Position of the first instruction carrying `label`
    pub fn label_position(&self, label: Label) -> Option<usize> {
        self.instructions
            .iter()
            .position(|instr| instr.labels.contains(&label))
    }

    /// Branch sites whose label is attached to no instruction.
    ///
    /// Returns `(position, label)` pairs in buffer order.
    pub fn dangling_labels(&self) -> Vec<(usize, Label)> {
        let mut dangling = Vec::new();
        for (pos, instr) in self.instructions.iter().enumerate() {
            let referenced = match &instr.operand {
                Operand::Label(label) => std::slice::from_ref(label),
                Operand::Switch(labels) => labels.as_slice(),
                _ => continue,
            };
            for label in referenced {
                if self.label_position(*label).is_none() {
                    dangling.push((pos, *label));
                }
            }
        }
        dangling
    }
}
