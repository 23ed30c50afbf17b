//! Entry point handed to a transform.
//!
//! [`Code`] owns the shared buffer for one method body while a patch runs and
//! hands out [`Range`]s over it. Searches started here scan the whole body.

use std::cell::RefCell;
use std::rc::Rc;

use crate::body::MethodBody;
use crate::error::Result;
use crate::instruction::{Instruction, Label};
use crate::matcher::Matcher;
use crate::range::{Range, SharedBody};
use crate::search::{self, Direction};

pub struct Code {
    body: SharedBody,
}

impl Code {
    pub fn new(body: MethodBody) -> Self {
        Self {
            body: Rc::new(RefCell::new(body)),
        }
    }

    pub fn from_instructions(instructions: Vec<Instruction>) -> Self {
        Self::new(MethodBody::new(instructions))
    }

    pub fn len(&self) -> usize {
        self.body.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.borrow().is_empty()
    }

    /// Range covering the entire body
    pub fn all(&self) -> Range {
        let len = self.len();
        Range::new(self.body.clone(), 0, len)
    }

    /// Empty range at the start of the body
    pub fn begin(&self) -> Range {
        Range::new(self.body.clone(), 0, 0)
    }

    /// Empty range at the end of the body
    pub fn end(&self) -> Range {
        let len = self.len();
        Range::new(self.body.clone(), len, 0)
    }

    /// First match of `pattern` in the body
    pub fn find(&self, pattern: &[Matcher]) -> Result<Range> {
        self.find_from(0, pattern)
    }

    /// First match of `pattern` at or after `start`
    pub fn find_from(&self, start: usize, pattern: &[Matcher]) -> Result<Range> {
        self.search(start, Direction::Forward, pattern)
    }

    /// Last match of `pattern` in the body
    pub fn find_last(&self, pattern: &[Matcher]) -> Result<Range> {
        let len = self.len();
        self.search(len, Direction::Backward, pattern)
    }

    fn search(&self, start: usize, direction: Direction, pattern: &[Matcher]) -> Result<Range> {
        let pos = {
            let body = self.body.borrow();
            search::search(&body.instructions, start, direction, pattern)?
        };
        Ok(Range::new(self.body.clone(), pos, pattern.len()))
    }

    pub fn define_label(&self) -> Label {
        self.body.borrow_mut().labels.define_label()
    }

    pub fn declare_local(&self, type_name: impl Into<String>) -> Result<u16> {
        self.body.borrow_mut().declare_local(type_name)
    }

    /// Copy of the current instruction buffer
    pub fn instructions(&self) -> Vec<Instruction> {
        self.body.borrow().instructions.clone()
    }

    /// Copy of the current body, locals and label allocator included
    pub fn snapshot(&self) -> MethodBody {
        self.body.borrow().clone()
    }

    /// Take the edited body back.
    ///
    /// Ranges still alive keep the buffer shared, in which case the body is
    /// copied out.
    pub fn into_body(self) -> MethodBody {
        match Rc::try_unwrap(self.body) {
            Ok(cell) => cell.into_inner(),
            Err(shared) => shared.borrow().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::{OpCode, ins};
    use crate::matchers;

    #[test]
    fn test_all_begin_end() {
        let code = Code::from_instructions(vec![ins::nop(), ins::ret()]);
        assert_eq!((code.all().start(), code.all().len()), (0, 2));
        assert!(code.begin().is_empty());
        assert_eq!(code.end().start(), 2);
    }

    #[test]
    fn test_find_last() {
        let code = Code::from_instructions(vec![ins::dup(), ins::pop(), ins::dup(), ins::pop()]);
        let pattern = matchers![OpCode::Dup, OpCode::Pop];
        assert_eq!(code.find(&pattern).unwrap().start(), 0);
        assert_eq!(code.find_last(&pattern).unwrap().start(), 2);
        assert_eq!(code.find_from(1, &pattern).unwrap().start(), 2);
    }

    #[test]
    fn test_into_body_with_live_ranges() {
        let code = Code::from_instructions(vec![ins::nop()]);
        let mut range = code.all();
        range.replace(vec![ins::ret()]).unwrap();
        let body = code.into_body();
        assert_eq!(body.instructions, vec![ins::ret()]);
        // the range still sees the shared copy
        assert_eq!(range.get(0).unwrap(), ins::ret());
    }

    #[test]
    fn test_declare_local_and_label() {
        let code = Code::new(MethodBody::new(vec![ins::br(Label::new(3))]));
        assert_eq!(code.define_label(), Label::new(4));
        assert_eq!(code.declare_local("int").unwrap(), 0);
        assert_eq!(code.snapshot().locals, vec!["int".to_string()]);
    }
}
