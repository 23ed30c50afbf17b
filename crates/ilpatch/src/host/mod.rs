//! Patch host and installer.
//!
//! A [`PatchHost`] is a registration table of patch declarations built once
//! at startup. [`PatchHost::install`] walks the table in registration order:
//! for each patch it evaluates the gate, binds the target body from the
//! [`Runtime`], runs the transform over it and commits the result. Patches
//! on the same target chain, each one seeing the body committed by the
//! previous one. A failing patch is reported and never stops the others.
//!
//! # Example
//!
//! ```ignore
//! use ilpatch::prelude::*;
//!
//! let host = PatchHost::builder("HarvestWithScythe")
//!     .patch("harvest", "StardewValley.Crop::harvest", |code| {
//!         let mut range = code.find(&matchers![
//!             OpCode::Ldarg0,
//!             ins::ldfld("StardewValley.Crop", "harvestMethod"),
//!         ])?;
//!         range.replace(vec![ins::ldc_i4(1)])
//!     })
//!     .build();
//! let report = host.install(&mut runtime);
//! ```

mod memory;

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use tracing::{debug, error, info, trace, warn};

use crate::body::MethodBody;
use crate::code::Code;
use crate::config::HostConfig;
use crate::error::{Error, Result};

pub use memory::{MemoryRuntime, RuntimeEvent, StoredMethod};

/// Reference to a patch target, `Namespace.Type::method`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MethodRef(String);

impl MethodRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn declaring_type(&self) -> Option<&str> {
        self.0.rsplit_once("::").map(|(ty, _)| ty)
    }

    pub fn method_name(&self) -> &str {
        self.0.rsplit_once("::").map_or(self.0.as_str(), |(_, name)| name)
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MethodRef {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for MethodRef {
    fn from(name: String) -> Self {
        Self(name)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// Forward a runtime event to `tracing` at the matching level
pub fn trace_event(message: &str, severity: Severity) {
    match severity {
        Severity::Trace => trace!("{}", message),
        Severity::Debug => debug!("{}", message),
        Severity::Info => info!("{}", message),
        Severity::Warn => warn!("{}", message),
        Severity::Error => error!("{}", message),
    }
}

/// Hosting runtime that owns method bodies.
///
/// `bind` hands out the current body of a method, which is the body from
/// the last successful `commit` when patches chain on one target.
pub trait Runtime {
    fn bind(&mut self, target: &MethodRef) -> Result<MethodBody>;

    /// Install `body` as the new body of `target`
    fn commit(&mut self, target: &MethodRef, body: MethodBody) -> Result<()>;

    fn log_event(&mut self, message: &str, severity: Severity) {
        trace_event(message, severity);
    }
}

pub type Transform = Box<dyn Fn(&Code) -> Result<()>>;

/// Condition evaluated once at installation time
pub enum Gate {
    /// Named toggle looked up in the host configuration
    Toggle(String),
    Predicate(Box<dyn Fn(&HostConfig) -> bool>),
}

impl Gate {
    pub fn toggle(name: impl Into<String>) -> Self {
        Gate::Toggle(name.into())
    }

    pub fn predicate(predicate: impl Fn(&HostConfig) -> bool + 'static) -> Self {
        Gate::Predicate(Box::new(predicate))
    }
}

impl fmt::Debug for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gate::Toggle(name) => f.debug_tuple("Toggle").field(name).finish(),
            Gate::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gate::Toggle(name) => write!(f, "toggle '{}'", name),
            Gate::Predicate(_) => f.write_str("gate predicate"),
        }
    }
}

/// A declared patch: {name, target, transform, optional gate}
pub struct PatchDeclaration {
    name: String,
    target: MethodRef,
    transform: Transform,
    gate: Option<Gate>,
}

impl PatchDeclaration {
    pub fn new(
        name: impl Into<String>,
        target: impl Into<MethodRef>,
        transform: impl Fn(&Code) -> Result<()> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            transform: Box::new(transform),
            gate: None,
        }
    }

    pub fn gate(mut self, gate: Gate) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> &MethodRef {
        &self.target
    }
}

impl fmt::Debug for PatchDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatchDeclaration")
            .field("name", &self.name)
            .field("target", &self.target)
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PatchStatus {
    Declared,
    Skipped,
    Installing,
    Installed,
    Failed,
}

impl PatchStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PatchStatus::Skipped | PatchStatus::Installed | PatchStatus::Failed
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatchOutcome {
    pub name: String,
    pub target: MethodRef,
    pub status: PatchStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PatchOutcome {
    fn transition(&mut self, status: PatchStatus) {
        trace!("Patch {} {} -> {}", self.name, self.status, status);
        self.status = status;
    }
}

/// Result of installing every declared patch
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InstallReport {
    pub host: String,
    pub outcomes: Vec<PatchOutcome>,
}

impl InstallReport {
    fn count(&self, status: PatchStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    pub fn installed(&self) -> usize {
        self.count(PatchStatus::Installed)
    }

    pub fn skipped(&self) -> usize {
        self.count(PatchStatus::Skipped)
    }

    pub fn failed(&self) -> usize {
        self.count(PatchStatus::Failed)
    }

    /// True if no patch failed
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    pub fn outcome(&self, name: &str) -> Option<&PatchOutcome> {
        self.outcomes.iter().find(|o| o.name == name)
    }
}

/// Registration table of patches, installed once
#[derive(Debug)]
pub struct PatchHost {
    config: HostConfig,
    patches: Vec<PatchDeclaration>,
}

impl PatchHost {
    pub fn builder(id: impl Into<String>) -> PatchHostBuilder {
        PatchHostBuilder {
            id: id.into(),
            config: None,
            patches: Vec::new(),
        }
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn patches(&self) -> &[PatchDeclaration] {
        &self.patches
    }

    /// Install every patch in registration order
    pub fn install<R: Runtime + ?Sized>(self, runtime: &mut R) -> InstallReport {
        let message = format!("Applying bytecode patches for {}.", self.config.id);
        info!("{}", message);
        runtime.log_event(&message, Severity::Info);

        let mut report = InstallReport {
            host: self.config.id.clone(),
            outcomes: Vec::with_capacity(self.patches.len()),
        };

        for patch in &self.patches {
            let mut outcome = PatchOutcome {
                name: patch.name.clone(),
                target: patch.target.clone(),
                status: PatchStatus::Declared,
                error: None,
            };

            if let Some(gate) = &patch.gate
                && !self.gate_open(gate, patch, runtime)
            {
                let message = format!(
                    "Skipping patch {} to {}: {} is off.",
                    patch.name, patch.target, gate
                );
                runtime.log_event(&message, Severity::Info);
                outcome.transition(PatchStatus::Skipped);
                report.outcomes.push(outcome);
                continue;
            }

            outcome.transition(PatchStatus::Installing);
            let message = format!("Applying patch {} to {}.", patch.name, patch.target);
            runtime.log_event(&message, Severity::Debug);

            match self.apply(patch, runtime) {
                Ok(()) => {
                    let message = format!("Installed patch {} to {}.", patch.name, patch.target);
                    runtime.log_event(&message, Severity::Info);
                    outcome.transition(PatchStatus::Installed);
                }
                Err(e) => {
                    let message = format!(
                        "Failed to apply patch {} to {}: {}",
                        patch.name, patch.target, e
                    );
                    runtime.log_event(&message, Severity::Error);
                    outcome.error = Some(e.to_string());
                    outcome.transition(PatchStatus::Failed);
                }
            }
            report.outcomes.push(outcome);
        }

        info!(
            "{}: {} installed, {} skipped, {} failed",
            report.host,
            report.installed(),
            report.skipped(),
            report.failed()
        );
        report
    }

    fn gate_open<R: Runtime + ?Sized>(
        &self,
        gate: &Gate,
        patch: &PatchDeclaration,
        runtime: &mut R,
    ) -> bool {
        match gate {
            Gate::Toggle(name) => match self.config.toggle(name) {
                Some(enabled) => enabled,
                None => {
                    let message = format!(
                        "Toggle '{}' used by patch {} is not configured; treating it as off.",
                        name, patch.name
                    );
                    runtime.log_event(&message, Severity::Warn);
                    false
                }
            },
            Gate::Predicate(predicate) => predicate(&self.config),
        }
    }

    fn apply<R: Runtime + ?Sized>(&self, patch: &PatchDeclaration, runtime: &mut R) -> Result<()> {
        let body = runtime.bind(&patch.target)?;
        let code = Code::new(body);
        (patch.transform)(&code)?;
        let body = code.into_body();

        if self.config.verify_labels
            && let Some(&(position, label)) = body.dangling_labels().first()
        {
            return Err(Error::UnresolvedLabel { label, position });
        }

        runtime.commit(&patch.target, body)
    }
}

/// Builder for PatchHost
pub struct PatchHostBuilder {
    id: String,
    config: Option<HostConfig>,
    patches: Vec<PatchDeclaration>,
}

impl PatchHostBuilder {
    /// Use `config` for gates and verification; the builder's id wins
    pub fn config(mut self, config: HostConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Register an ungated patch
    pub fn patch(
        self,
        name: impl Into<String>,
        target: impl Into<MethodRef>,
        transform: impl Fn(&Code) -> Result<()> + 'static,
    ) -> Self {
        self.declare(PatchDeclaration::new(name, target, transform))
    }

    /// Register a patch that only installs when `gate` is open
    pub fn gated_patch(
        self,
        name: impl Into<String>,
        target: impl Into<MethodRef>,
        gate: Gate,
        transform: impl Fn(&Code) -> Result<()> + 'static,
    ) -> Self {
        self.declare(PatchDeclaration::new(name, target, transform).gate(gate))
    }

    pub fn declare(mut self, patch: PatchDeclaration) -> Self {
        self.patches.push(patch);
        self
    }

    pub fn build(self) -> PatchHost {
        let mut config = self.config.unwrap_or_default();
        config.id = self.id;
        PatchHost {
            config,
            patches: self.patches,
        }
    }
}
