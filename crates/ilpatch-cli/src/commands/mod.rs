//! CLI command implementations.
//!
//! This module contains the implementation of each CLI command.

pub mod apply;
pub mod find;
pub mod show;

use std::path::Path;

use anyhow::{Context, Result};
use ilpatch::{MemoryRuntime, StoredMethod};

/// Load the method body file shared by every command
pub(crate) fn load_bodies(path: &Path) -> Result<MemoryRuntime> {
    MemoryRuntime::load(path)
        .with_context(|| format!("Failed to load method bodies from {}", path.display()))
}

pub(crate) fn lookup<'a>(runtime: &'a MemoryRuntime, method: &str) -> Result<&'a StoredMethod> {
    runtime
        .method(method)
        .with_context(|| format!("Method {} not found", method))
}
