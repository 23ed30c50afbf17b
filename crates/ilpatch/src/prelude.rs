//! Prelude module for convenient imports
//!
//! This module re-exports what a patch author needs to write transforms.
//!
//! # Usage
//!
//! ```ignore
//! use ilpatch::prelude::*;
//! ```
//!
//! This brings the following into scope:
//!
//! - Editing: `Code`, `Range`, `Matcher`, the `matchers!` macro
//! - Instructions: `Instruction`, `OpCode`, `Operand`, `OperandKind`, `MemberRef`, `Label`, `ins`
//! - Installation: `PatchHost`, `Gate`, `Runtime`, `MethodBody`, `HostConfig`
//! - Error handling: `Error`, `Result`

// Editing
pub use crate::code::Code;
pub use crate::matcher::Matcher;
pub use crate::matchers;
pub use crate::range::Range;

// Instructions
pub use crate::instruction::{Instruction, Label, MemberRef, OpCode, Operand, OperandKind, ins};

// Installation
pub use crate::body::MethodBody;
pub use crate::config::HostConfig;
pub use crate::host::{Gate, InstallReport, MethodRef, PatchHost, PatchStatus, Runtime, Severity};

// Error handling
pub use crate::error::{Error, Result};
