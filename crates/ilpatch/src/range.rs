//! Editable windows over a shared instruction buffer.
//!
//! A [`Range`] is `{buffer, start, len}`. Every range obtained while a patch
//! runs aliases the same buffer, so edits made through one range are visible
//! through all others. A range only keeps its *own* bookkeeping in sync with
//! its edits: a range that was found before an edit at or before its start
//! still points at the old offsets and must be found again.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::warn;

use crate::body::MethodBody;
use crate::error::{Error, Result};
use crate::instruction::{Instruction, Label, Operand};
use crate::matcher::Matcher;
use crate::search::{self, Direction};

pub(crate) type SharedBody = Rc<RefCell<MethodBody>>;

#[derive(Clone)]
pub struct Range {
    body: SharedBody,
    start: usize,
    len: usize,
}

impl Range {
    pub(crate) fn new(body: SharedBody, start: usize, len: usize) -> Self {
        Self { body, start, len }
    }

    /// Offset of the first instruction in the buffer
    pub fn start(&self) -> usize {
        self.start
    }

    /// Offset one past the last instruction in the buffer
    pub fn end(&self) -> usize {
        self.start + self.len
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether both ranges view the same instruction buffer
    pub fn same_buffer(&self, other: &Range) -> bool {
        Rc::ptr_eq(&self.body, &other.body)
    }

    fn buffer_len(&self) -> usize {
        self.body.borrow().instructions.len()
    }

    fn validate(&self) -> Result<()> {
        let buffer_len = self.buffer_len();
        if self.end() > buffer_len {
            return Err(Error::invalid_range(format!(
                "range {}..{} exceeds buffer of {} instructions",
                self.start,
                self.end(),
                buffer_len
            )));
        }
        Ok(())
    }

    /// Buffer position of the instruction at `index` relative to the start.
    ///
    /// Negative indices and indices past the end address the neighbours of
    /// the range; only the buffer bounds are enforced.
    fn position(&self, index: isize) -> Result<usize> {
        let buffer_len = self.buffer_len();
        self.start
            .checked_add_signed(index)
            .filter(|&pos| pos < buffer_len)
            .ok_or_else(|| {
                Error::invalid_range(format!(
                    "index {} from offset {} is outside buffer of {} instructions",
                    index, self.start, buffer_len
                ))
            })
    }

    /// Copy of the instruction at `index`, labels included
    pub fn get(&self, index: isize) -> Result<Instruction> {
        let pos = self.position(index)?;
        Ok(self.body.borrow().instructions[pos].clone())
    }

    /// Overwrite the instruction at `index`
    pub fn set(&self, index: isize, instr: Instruction) -> Result<()> {
        let pos = self.position(index)?;
        self.body.borrow_mut().instructions[pos] = instr;
        Ok(())
    }

    /// Copy of every instruction in the window
    pub fn to_vec(&self) -> Result<Vec<Instruction>> {
        self.validate()?;
        Ok(self.body.borrow().instructions[self.start..self.end()].to_vec())
    }

    /// Range over `len` instructions starting `offset` into this one
    pub fn sub_range(&self, offset: usize, len: usize) -> Result<Range> {
        self.validate()?;
        if offset.checked_add(len).is_none_or(|end| end > self.len) {
            return Err(Error::invalid_range(format!(
                "sub-range {}+{} exceeds range of length {}",
                offset, len, self.len
            )));
        }
        Ok(Range::new(self.body.clone(), self.start + offset, len))
    }

    /// Empty range positioned at the start of this one
    pub fn at_start(&self) -> Range {
        Range::new(self.body.clone(), self.start, 0)
    }

    /// Empty range positioned at the end of this one
    pub fn at_end(&self) -> Range {
        Range::new(self.body.clone(), self.end(), 0)
    }

    /// Next match of `pattern` starting at the end of this range
    pub fn find_next(&self, pattern: &[Matcher]) -> Result<Range> {
        self.find(self.end(), Direction::Forward, pattern)
    }

    /// Last match of `pattern` ending at or before the start of this range
    pub fn find_previous(&self, pattern: &[Matcher]) -> Result<Range> {
        self.find(self.start, Direction::Backward, pattern)
    }

    fn find(&self, from: usize, direction: Direction, pattern: &[Matcher]) -> Result<Range> {
        self.validate()?;
        let pos = {
            let body = self.body.borrow();
            search::search(&body.instructions, from, direction, pattern)?
        };
        Ok(Range::new(self.body.clone(), pos, pattern.len()))
    }

    /// Replace the window with `new`.
    ///
    /// Labels on the first replaced instruction move to the first new one,
    /// so branches into the window stay valid.
    pub fn replace(&mut self, new: impl IntoIterator<Item = Instruction>) -> Result<()> {
        let len = self.len;
        self.splice(0, len, new)
    }

    /// Delete `count` instructions at `offset` into the window and insert
    /// `new` in their place.
    ///
    /// Labels on the first deleted instruction move to the first inserted
    /// one. When nothing is inserted they move to the instruction that now
    /// follows the edit.
    pub fn splice(
        &mut self,
        offset: usize,
        count: usize,
        new: impl IntoIterator<Item = Instruction>,
    ) -> Result<()> {
        self.validate()?;
        if offset.checked_add(count).is_none_or(|end| end > self.len) {
            return Err(Error::invalid_range(format!(
                "splice {}+{} exceeds range of length {}",
                offset, count, self.len
            )));
        }

        let mut new: Vec<Instruction> = new.into_iter().collect();
        let inserted = new.len();
        let at = self.start + offset;

        let mut body = self.body.borrow_mut();
        let removed: Vec<Instruction> = body.instructions.drain(at..at + count).collect();

        if let Some(first) = removed.first()
            && !first.labels.is_empty()
        {
            let heir = match new.first_mut() {
                Some(head) => Some(head),
                None => body.instructions.get_mut(at),
            };
            match heir {
                Some(heir) => {
                    for label in &first.labels {
                        if !heir.labels.contains(label) {
                            heir.labels.push(*label);
                        }
                    }
                }
                None => warn!(
                    "Dropping labels {:?} removed at the end of the method body",
                    first.labels
                ),
            }
        }

        body.instructions.splice(at..at, new);
        self.len = self.len - count + inserted;
        Ok(())
    }

    /// Insert `new` before the window; the range grows to include it.
    ///
    /// Labels stay where they are, so existing branches to the old first
    /// instruction skip the inserted code.
    pub fn prepend(&mut self, new: impl IntoIterator<Item = Instruction>) -> Result<()> {
        self.splice(0, 0, new)
    }

    /// Insert `new` after the window; the range grows to include it
    pub fn append(&mut self, new: impl IntoIterator<Item = Instruction>) -> Result<()> {
        let len = self.len;
        self.splice(len, 0, new)
    }

    /// Delete the window, leaving an empty range at its former start
    pub fn remove(&mut self) -> Result<()> {
        self.replace(Vec::new())
    }

    /// Search forward from the end of this range and grow it to cover the match
    pub fn extend(&mut self, pattern: &[Matcher]) -> Result<()> {
        self.validate()?;
        let found = self.find_next(pattern)?;
        self.len = found.end() - self.start;
        Ok(())
    }

    /// Search backward from the start of this range and grow it to cover the match
    pub fn extend_backwards(&mut self, pattern: &[Matcher]) -> Result<()> {
        self.validate()?;
        let found = self.find_previous(pattern)?;
        let end = self.end();
        self.start = found.start();
        self.len = end - self.start;
        Ok(())
    }

    /// Grow this range to the smallest window covering both ranges
    pub fn extend_to(&mut self, other: &Range) -> Result<()> {
        if !self.same_buffer(other) {
            return Err(Error::invalid_range(
                "cannot extend over a range of another method body",
            ));
        }
        self.validate()?;
        other.validate()?;
        let start = self.start.min(other.start);
        let end = self.end().max(other.end());
        self.start = start;
        self.len = end - start;
        Ok(())
    }

    /// Jump to the target of the branch at `index`.
    ///
    /// Returns a one-instruction range at the instruction carrying the
    /// branch's label.
    pub fn follow(&self, index: isize) -> Result<Range> {
        let pos = self.position(index)?;
        let body = self.body.borrow();
        let instr = &body.instructions[pos];
        let label = instr.branch_target().ok_or_else(|| Error::NotABranch {
            position: pos,
            instruction: instr.to_string(),
        })?;
        let target = body
            .label_position(label)
            .ok_or(Error::UnresolvedLabel {
                label,
                position: pos,
            })?;
        Ok(Range::new(self.body.clone(), target, 1))
    }

    /// Retarget the branch at `index` to the first instruction of `target`.
    ///
    /// A fresh label is attached to the target; the rest of the window is
    /// left untouched. Returns the new label.
    pub fn replace_jump(&self, index: isize, target: &Range) -> Result<Label> {
        if !self.same_buffer(target) {
            return Err(Error::invalid_range(
                "jump target belongs to another method body",
            ));
        }
        let pos = self.position(index)?;
        let target_pos = target.position(0)?;

        let mut body = self.body.borrow_mut();
        let instr = &body.instructions[pos];
        if !instr.is_branch() {
            return Err(Error::NotABranch {
                position: pos,
                instruction: instr.to_string(),
            });
        }

        let label = body.labels.define_label();
        body.instructions[target_pos].labels.push(label);
        body.instructions[pos].operand = Operand::Label(label);
        Ok(label)
    }

    /// Attach a fresh label to the instruction at `index` and return it
    pub fn attach_label(&self, index: isize) -> Result<Label> {
        let pos = self.position(index)?;
        let mut body = self.body.borrow_mut();
        let label = body.labels.define_label();
        body.instructions[pos].labels.push(label);
        Ok(label)
    }

    /// Mint a label for attaching to newly authored instructions
    pub fn define_label(&self) -> Label {
        self.body.borrow_mut().labels.define_label()
    }

    /// Declare a local variable in the method being patched
    pub fn declare_local(&self, type_name: impl Into<String>) -> Result<u16> {
        self.body.borrow_mut().declare_local(type_name)
    }
}

impl fmt::Debug for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Range")
            .field("start", &self.start)
            .field("len", &self.len)
            .finish()
    }
}

/// Listing of the window, one `offset: instruction` per line
impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = self.body.borrow();
        let Some(window) = body.instructions.get(self.start..self.end()) else {
            return write!(f, "<stale range {}..{}>", self.start, self.end());
        };
        for (i, instr) in window.iter().enumerate() {
            writeln!(f, "{:04}: {}", self.start + i, instr)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::Code;
    use crate::instruction::{OpCode, ins};
    use crate::matchers;

    // A=nop B=dup C=pop D=ldnull E=ret
    fn abcde() -> Code {
        Code::from_instructions(vec![
            ins::nop(),
            ins::dup(),
            ins::pop(),
            ins::ldnull(),
            ins::ret(),
        ])
    }

    fn opcodes(code: &Code) -> Vec<OpCode> {
        code.instructions().iter().map(|i| i.opcode).collect()
    }

    #[test]
    fn test_find_and_replace() {
        let code = abcde();
        let mut range = code.find(&matchers![OpCode::Dup, OpCode::Pop]).unwrap();
        assert_eq!((range.start(), range.len()), (1, 2));

        range.replace(vec![ins::neg()]).unwrap();
        assert_eq!(range.len(), 1);
        assert_eq!(
            opcodes(&code),
            vec![OpCode::Nop, OpCode::Neg, OpCode::Ldnull, OpCode::Ret]
        );
        assert!(
            code.find(&matchers![OpCode::Dup, OpCode::Pop])
                .unwrap_err()
                .is_pattern_not_found()
        );
    }

    #[test]
    fn test_replace_moves_labels_to_new_head() {
        let code = Code::from_instructions(vec![
            ins::nop(),
            ins::dup().with_label(Label::new(1)),
            ins::pop(),
            ins::br(Label::new(1)),
        ]);
        let mut range = code.find(&matchers![OpCode::Dup]).unwrap();
        range.replace(vec![ins::ldnull(), ins::neg()]).unwrap();

        let body = code.instructions();
        assert_eq!(body[1].opcode, OpCode::Ldnull);
        assert_eq!(body[1].labels, vec![Label::new(1)]);
        let jump = code.find(&matchers![OpCode::Br]).unwrap();
        let target = jump.follow(0).unwrap();
        assert_eq!(target.start(), 1);
    }

    #[test]
    fn test_replace_reusing_instruction_keeps_single_label() {
        let code = Code::from_instructions(vec![
            ins::dup().with_label(Label::new(1)),
            ins::pop(),
        ]);
        let mut range = code.all();
        let head = range.get(0).unwrap();
        range.replace(vec![head, ins::neg()]).unwrap();
        assert_eq!(code.instructions()[0].labels, vec![Label::new(1)]);
    }

    #[test]
    fn test_remove_moves_labels_to_follower() {
        let code = Code::from_instructions(vec![
            ins::dup().with_label(Label::new(2)),
            ins::pop(),
            ins::ret(),
        ]);
        let mut range = code.find(&matchers![OpCode::Dup, OpCode::Pop]).unwrap();
        range.remove().unwrap();
        assert!(range.is_empty());
        assert_eq!(range.start(), 0);
        let body = code.instructions();
        assert_eq!(body.len(), 1);
        assert_eq!(body[0].labels, vec![Label::new(2)]);
    }

    #[test]
    fn test_splice_inside_window() {
        let code = abcde();
        let mut range = code.all();
        range.splice(1, 2, vec![ins::neg()]).unwrap();
        assert_eq!(range.len(), 4);
        assert_eq!(
            opcodes(&code),
            vec![OpCode::Nop, OpCode::Neg, OpCode::Ldnull, OpCode::Ret]
        );
        assert!(range.splice(3, 2, vec![]).is_err());
    }

    #[test]
    fn test_prepend_and_append_grow_range() {
        let code = abcde();
        let mut range = code.find(&matchers![OpCode::Pop]).unwrap();
        range.prepend(vec![ins::neg()]).unwrap();
        range.append(vec![ins::add(), ins::sub()]).unwrap();
        assert_eq!((range.start(), range.len()), (2, 4));
        assert_eq!(
            range.to_vec().unwrap().iter().map(|i| i.opcode).collect::<Vec<_>>(),
            vec![OpCode::Neg, OpCode::Pop, OpCode::Add, OpCode::Sub]
        );
        assert_eq!(code.len(), 8);
    }

    #[test]
    fn test_extend_grows_by_continuation() {
        let code = abcde();
        let mut range = code.find(&matchers![OpCode::Dup]).unwrap();
        range.extend(&matchers![OpCode::Pop, OpCode::Ldnull]).unwrap();
        assert_eq!((range.start(), range.len()), (1, 3));

        let err = range.extend(&matchers![OpCode::Dup]).unwrap_err();
        assert!(err.is_pattern_not_found());
        assert_eq!((range.start(), range.len()), (1, 3));
    }

    #[test]
    fn test_extend_backwards() {
        let code = abcde();
        let mut range = code.find(&matchers![OpCode::Ldnull]).unwrap();
        range.extend_backwards(&matchers![OpCode::Dup, OpCode::Pop]).unwrap();
        assert_eq!((range.start(), range.len()), (1, 3));
        assert!(range.extend_backwards(&matchers![OpCode::Ret]).is_err());
    }

    #[test]
    fn test_extend_to() {
        let code = abcde();
        let mut range = code.find(&matchers![OpCode::Dup]).unwrap();
        let tail = code.find(&matchers![OpCode::Ret]).unwrap();
        range.extend_to(&tail).unwrap();
        assert_eq!((range.start(), range.len()), (1, 4));

        let other = abcde();
        assert!(range.extend_to(&other.all()).is_err());
    }

    #[test]
    fn test_find_next_and_previous() {
        let code = Code::from_instructions(vec![
            ins::dup(),
            ins::nop(),
            ins::dup(),
            ins::nop(),
        ]);
        let first = code.find(&matchers![OpCode::Dup]).unwrap();
        let second = first.find_next(&matchers![OpCode::Dup]).unwrap();
        assert_eq!(second.start(), 2);
        assert!(second.find_next(&matchers![OpCode::Dup]).is_err());
        let back = second.find_previous(&matchers![OpCode::Dup]).unwrap();
        assert_eq!(back.start(), 0);
    }

    #[test]
    fn test_sub_range_slices_parent() {
        let code = abcde();
        let range = code.find(&matchers![OpCode::Dup, OpCode::Pop, OpCode::Ldnull]).unwrap();
        let parent = range.to_vec().unwrap();
        for offset in 0..=3 {
            for len in 0..=(3 - offset) {
                let sub = range.sub_range(offset, len).unwrap();
                assert_eq!(sub.to_vec().unwrap(), parent[offset..offset + len].to_vec());
            }
        }
        assert!(range.sub_range(2, 2).is_err());
    }

    #[test]
    fn test_get_set_negative_index() {
        let code = abcde();
        let range = code.find(&matchers![OpCode::Pop]).unwrap();
        assert_eq!(range.get(-1).unwrap().opcode, OpCode::Dup);
        assert_eq!(range.get(1).unwrap().opcode, OpCode::Ldnull);
        assert!(range.get(-3).is_err());
        assert!(range.get(3).is_err());

        range.set(0, ins::ldc_r4(64.0)).unwrap();
        assert_eq!(code.instructions()[2], ins::ldc_r4(64.0));
    }

    #[test]
    fn test_follow_errors() {
        let code = Code::from_instructions(vec![ins::br(Label::new(9)), ins::ret()]);
        let range = code.all();
        assert!(matches!(
            range.follow(0).unwrap_err(),
            Error::UnresolvedLabel { position: 0, .. }
        ));
        assert!(matches!(
            range.follow(1).unwrap_err(),
            Error::NotABranch { position: 1, .. }
        ));
    }

    #[test]
    fn test_replace_jump_retargets_branch() {
        let code = Code::from_instructions(vec![
            ins::brtrue(Label::new(1)),
            ins::nop(),
            ins::ret().with_label(Label::new(1)),
        ]);
        let range = code.all();
        let target = code.find(&matchers![OpCode::Nop]).unwrap();
        let label = range.replace_jump(0, &target).unwrap();

        assert_eq!(range.follow(0).unwrap().start(), 1);
        assert_eq!(code.instructions()[1].labels, vec![label]);
        assert!(range.replace_jump(1, &target).is_err());
    }

    #[test]
    fn test_attach_label() {
        let code = abcde();
        let range = code.find(&matchers![OpCode::Ret]).unwrap();
        let label = range.attach_label(0).unwrap();
        let mut head = code.begin();
        head.append(vec![ins::br(label)]).unwrap();
        assert_eq!(head.follow(0).unwrap().start(), 5);
    }

    #[test]
    fn test_stale_range_is_invalid() {
        let code = abcde();
        let tail = code.find(&matchers![OpCode::Ldnull, OpCode::Ret]).unwrap();
        code.all().remove().unwrap();
        assert!(matches!(tail.to_vec().unwrap_err(), Error::InvalidRange(_)));
        assert_eq!(tail.to_string(), "<stale range 3..5>");
    }

    #[test]
    fn test_stale_range_search_is_invalid() {
        let code = Code::from_instructions(vec![ins::nop(), ins::dup(), ins::pop()]);
        let pop = code.find(&matchers![OpCode::Pop]).unwrap();
        code.all().remove().unwrap();

        let next = pop.find_next(&matchers![Matcher::Any]).unwrap_err();
        assert!(matches!(next, Error::InvalidRange(_)));
        let previous = pop.find_previous(&matchers![]).unwrap_err();
        assert!(matches!(previous, Error::InvalidRange(_)));
    }

    #[test]
    fn test_display_listing() {
        let code = abcde();
        let range = code.find(&matchers![OpCode::Ldnull, OpCode::Ret]).unwrap();
        assert_eq!(range.to_string(), "0003: ldnull\n0004: ret\n");
    }
}
