//! # ilpatch
//!
//! Engine for rewriting the instruction stream of compiled methods.
//!
//! This crate provides:
//! - An instruction model over the CIL base instruction set, with a textual syntax
//! - Matchers and forward/backward sequence search
//! - Editable [`Range`]s over a shared instruction buffer (replace, splice,
//!   extend, follow jumps, retarget jumps)
//! - A [`PatchHost`] that installs declared patches through a [`Runtime`]
//! - Declarative JSON patch scripts and an in-memory runtime
//!
//! ## Example
//!
//! ```ignore
//! use ilpatch::prelude::*;
//!
//! let report = PatchHost::builder("TilledSoilDecay")
//!     .gated_patch(
//!         "decay",
//!         "StardewValley.TerrainFeatures.HoeDirt::dayUpdate",
//!         Gate::toggle("DecayEnabled"),
//!         |code| {
//!             let range = code.find(&matchers![ins::ldc_r8(0.1)])?;
//!             range.set(0, ins::ldc_r8(0.5))
//!         },
//!     )
//!     .build()
//!     .install(&mut runtime);
//! ```

pub mod body;
pub mod code;
pub mod config;
pub mod error;
pub mod host;
pub mod instruction;
pub mod matcher;
pub mod pattern;
pub mod prelude;
pub mod range;
pub mod script;
pub mod search;
pub mod sidemap;

pub use body::MethodBody;
pub use code::Code;
pub use config::{HostConfig, HostConfigBuilder};
pub use error::{Error, Result};
pub use host::{
    Gate, InstallReport, MemoryRuntime, MethodRef, PatchDeclaration, PatchHost, PatchHostBuilder,
    PatchOutcome, PatchStatus, Runtime, RuntimeEvent, Severity, StoredMethod, Transform,
    trace_event,
};
pub use instruction::{
    Instruction, Label, LabelAllocator, MemberKind, MemberRef, OpCode, Operand, OperandKind, ins,
};
pub use matcher::Matcher;
pub use pattern::{format_pattern, parse_pattern};
pub use range::Range;
pub use script::{PatchScript, ScriptPatch, Step};
pub use search::{Direction, find_all, find_backward, find_forward};
pub use sidemap::SideMap;
