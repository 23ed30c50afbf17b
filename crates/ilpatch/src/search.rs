//! Sequence search over an instruction buffer.
//!
//! A window `[i, i + k)` matches a pattern of `k` matchers when matcher `j`
//! accepts the instruction at `i + j`. Forward search returns the lowest
//! matching offset at or after the start; backward search returns the highest
//! matching window that ends at or before the start.

use strum::Display;

use crate::error::{Error, Result};
use crate::instruction::Instruction;
use crate::matcher::Matcher;
use crate::pattern::format_pattern;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Direction {
    Forward,
    Backward,
}

/// Whether `window` satisfies `pattern` element-wise
pub fn window_matches(window: &[Instruction], pattern: &[Matcher]) -> bool {
    window.len() == pattern.len()
        && pattern
            .iter()
            .zip(window)
            .all(|(matcher, instr)| matcher.matches(instr))
}

/// First matching window starting at or after `start`
pub fn find_forward(code: &[Instruction], start: usize, pattern: &[Matcher]) -> Option<usize> {
    if start > code.len() || code.len() - start < pattern.len() {
        return None;
    }
    let last = code.len() - pattern.len();

    'outer: for i in start..=last {
        for (j, matcher) in pattern.iter().enumerate() {
            if !matcher.matches(&code[i + j]) {
                continue 'outer;
            }
        }
        return Some(i);
    }
    None
}

/// Last matching window ending at or before `end`
pub fn find_backward(code: &[Instruction], end: usize, pattern: &[Matcher]) -> Option<usize> {
    let end = end.min(code.len());
    if end < pattern.len() {
        return None;
    }
    let first = end - pattern.len();

    (0..=first)
        .rev()
        .find(|&i| window_matches(&code[i..i + pattern.len()], pattern))
}

/// Every matching window start, overlapping matches included
pub fn find_all(code: &[Instruction], pattern: &[Matcher]) -> Vec<usize> {
    let mut results = Vec::new();
    let mut start = 0;
    while let Some(pos) = find_forward(code, start, pattern) {
        results.push(pos);
        start = pos + 1;
    }
    results
}

/// Search in `direction`, failing with [`Error::PatternNotFound`]
pub fn search(
    code: &[Instruction],
    start: usize,
    direction: Direction,
    pattern: &[Matcher],
) -> Result<usize> {
    let found = match direction {
        Direction::Forward => find_forward(code, start, pattern),
        Direction::Backward => find_backward(code, start, pattern),
    };
    found.ok_or_else(|| Error::PatternNotFound {
        start,
        direction,
        pattern: format_pattern(pattern),
    })
}
