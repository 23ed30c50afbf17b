//! Runtime over method bodies held in memory.
//!
//! Bodies are stored as JSON keyed by method name:
//!
//! ```json
//! {
//!   "StardewValley.Crop::harvest": {
//!     "locals": ["int"],
//!     "instructions": ["ldarg.0", "ldfld StardewValley.Crop::harvestMethod", "ret"]
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{MethodRef, Runtime, Severity, trace_event};
use crate::body::MethodBody;
use crate::error::{Error, Result};
use crate::instruction::Instruction;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredMethod {
    /// Finalized methods can be bound but not replaced
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub finalized: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locals: Vec<String>,
    pub instructions: Vec<Instruction>,
}

impl StoredMethod {
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self {
            instructions,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuntimeEvent {
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryRuntime {
    methods: BTreeMap<String, StoredMethod>,
    events: Vec<RuntimeEvent>,
    commits: usize,
}

impl MemoryRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_method(mut self, name: impl Into<String>, instructions: Vec<Instruction>) -> Self {
        self.insert(name, StoredMethod::new(instructions));
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, method: StoredMethod) {
        self.methods.insert(name.into(), method);
    }

    pub fn method(&self, name: &str) -> Option<&StoredMethod> {
        self.methods.get(name)
    }

    pub fn methods(&self) -> impl Iterator<Item = (&String, &StoredMethod)> {
        self.methods.iter()
    }

    /// Mark a method as no longer replaceable
    pub fn finalize(&mut self, name: &str) -> Result<()> {
        let method = self
            .methods
            .get_mut(name)
            .ok_or_else(|| Error::incompatible(name, "no such method"))?;
        method.finalized = true;
        Ok(())
    }

    /// Events passed to [`Runtime::log_event`], oldest first
    pub fn events(&self) -> &[RuntimeEvent] {
        &self.events
    }

    pub fn commit_count(&self) -> usize {
        self.commits
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let methods = serde_json::from_str(json)?;
        Ok(Self {
            methods,
            ..Default::default()
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.methods)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)?;
        Self::from_json(&content)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

impl Runtime for MemoryRuntime {
    fn bind(&mut self, target: &MethodRef) -> Result<MethodBody> {
        let method = self
            .methods
            .get(target.name())
            .ok_or_else(|| Error::incompatible(target.name(), "no such method"))?;
        Ok(MethodBody::new(method.instructions.clone()).with_locals(method.locals.clone()))
    }

    fn commit(&mut self, target: &MethodRef, body: MethodBody) -> Result<()> {
        let method = self
            .methods
            .get_mut(target.name())
            .ok_or_else(|| Error::incompatible(target.name(), "no such method"))?;
        if method.finalized {
            return Err(Error::incompatible(
                target.name(),
                "method is finalized and cannot be replaced",
            ));
        }

        debug!(
            "Committing {} instructions to {}",
            body.instructions.len(),
            target
        );
        method.instructions = body.instructions;
        method.locals = body.locals;
        self.commits += 1;
        Ok(())
    }

    fn log_event(&mut self, message: &str, severity: Severity) {
        trace_event(message, severity);
        self.events.push(RuntimeEvent {
            severity,
            message: message.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::ins;
    use tempfile::tempdir;

    #[test]
    fn test_bind_and_commit() {
        let mut runtime = MemoryRuntime::new().with_method("A::b", vec![ins::nop(), ins::ret()]);
        let target = MethodRef::new("A::b");

        let mut body = runtime.bind(&target).unwrap();
        body.instructions.remove(0);
        body.declare_local("bool").unwrap();
        runtime.commit(&target, body).unwrap();

        let stored = runtime.method("A::b").unwrap();
        assert_eq!(stored.instructions, vec![ins::ret()]);
        assert_eq!(stored.locals, vec!["bool".to_string()]);
        assert_eq!(runtime.commit_count(), 1);
    }

    #[test]
    fn test_unknown_and_finalized_methods() {
        let mut runtime = MemoryRuntime::new().with_method("A::b", vec![ins::ret()]);
        let unknown = runtime.bind(&MethodRef::new("A::c")).unwrap_err();
        assert!(matches!(unknown, Error::IncompatibleTarget { .. }));

        runtime.finalize("A::b").unwrap();
        let target = MethodRef::new("A::b");
        let body = runtime.bind(&target).unwrap();
        let err = runtime.commit(&target, body).unwrap_err();
        assert!(err.to_string().contains("finalized"));
        assert_eq!(runtime.commit_count(), 0);
    }

    #[test]
    fn test_json_format() {
        let json = r#"{
            "Crop::harvest": {
                "locals": ["int"],
                "instructions": ["L_1: ldarg.0", "brtrue L_1", "ret"]
            },
            "Farmer::isWearingRing": {
                "finalized": true,
                "instructions": ["ldc.i4.0", "ret"]
            }
        }"#;
        let runtime = MemoryRuntime::from_json(json).unwrap();
        let harvest = runtime.method("Crop::harvest").unwrap();
        assert_eq!(harvest.instructions.len(), 3);
        assert_eq!(harvest.locals, vec!["int".to_string()]);
        assert!(runtime.method("Farmer::isWearingRing").unwrap().finalized);

        let again = MemoryRuntime::from_json(&runtime.to_json().unwrap()).unwrap();
        assert_eq!(
            again.methods().collect::<Vec<_>>(),
            runtime.methods().collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bodies.json");
        let runtime = MemoryRuntime::new().with_method("A::b", vec![ins::ldstr("hi"), ins::ret()]);
        runtime.save(&path).unwrap();

        let loaded = MemoryRuntime::load(&path).unwrap();
        assert_eq!(loaded.method("A::b"), runtime.method("A::b"));
        assert!(MemoryRuntime::load(dir.path().join("nope.json")).unwrap_err().is_not_found());
    }

    #[test]
    fn test_log_event_recorded() {
        let mut runtime = MemoryRuntime::new();
        runtime.log_event("hello", Severity::Info);
        assert_eq!(
            runtime.events(),
            &[RuntimeEvent {
                severity: Severity::Info,
                message: "hello".to_string()
            }]
        );
    }
}
