//! Declarative patch scripts.
//!
//! A script describes patches as JSON instead of Rust closures. Each patch
//! runs its steps against a *current range*, which starts out covering the
//! whole body:
//!
//! ```json
//! {
//!   "id": "HarvestWithScythe",
//!   "patches": [{
//!     "name": "harvest-forage",
//!     "target": "StardewValley.Crop::harvest",
//!     "gate": "HarvestForage",
//!     "steps": [
//!       { "find": "ldarg.0; ldfld StardewValley.Crop::harvestMethod; ldc.i4.1; bne.un" },
//!       { "replace": ["$0", "$1", "ldc.i4.0", "$3"] }
//!     ]
//!   }]
//! }
//! ```
//!
//! Instruction templates are instruction text with two additions: `$n`
//! copies the instruction at index `n` of the current range, and `{name}`
//! is replaced by the label or local bound to `name` by an earlier
//! `define_label`, `attach_label` or `declare_local` step.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::code::Code;
use crate::error::{Error, Result};
use crate::host::{Gate, PatchDeclaration};
use crate::instruction::Instruction;
use crate::matcher::Matcher;
use crate::pattern::parse_pattern;
use crate::range::Range;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchScript {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub patches: Vec<ScriptPatch>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptPatch {
    pub name: String,
    pub target: String,
    /// Name of the config toggle that enables this patch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate: Option<String>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Find(String),
    FindLast(String),
    FindNext(String),
    FindPrevious(String),
    Extend(String),
    ExtendBackwards(String),
    /// Grow the current range over a marked range
    ExtendTo(String),
    Replace(Vec<String>),
    Prepend(Vec<String>),
    Append(Vec<String>),
    Remove,
    Follow(isize),
    SubRange { offset: usize, len: usize },
    Begin,
    All,
    End,
    AtStart,
    AtEnd,
    /// Remember the current range under a name
    Mark(String),
    /// Make a marked range current again
    Restore(String),
    /// Retarget the branch at `index` to the first instruction of a marked range
    ReplaceJump { index: isize, target: String },
    AttachLabel { index: isize, name: String },
    DefineLabel(String),
    DeclareLocal { name: String, ty: String },
}

impl PatchScript {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)?;
        Self::from_json(&content)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Compile every patch into a host declaration.
    ///
    /// Patterns and literal instructions are parsed here, so syntax errors
    /// surface before anything is installed.
    pub fn compile(&self) -> Result<Vec<PatchDeclaration>> {
        self.patches.iter().map(ScriptPatch::compile).collect()
    }
}

impl ScriptPatch {
    pub fn compile(&self) -> Result<PatchDeclaration> {
        let steps = compile_steps(&self.steps)
            .map_err(|e| Error::Syntax(format!("patch '{}': {}", self.name, e)))?;
        debug!("Compiled patch {} with {} steps", self.name, steps.len());

        let declaration = PatchDeclaration::new(self.name.clone(), self.target.as_str(), move |code| {
            run_steps(code, &steps)
        });
        Ok(match &self.gate {
            Some(toggle) => declaration.gate(Gate::toggle(toggle.clone())),
            None => declaration,
        })
    }
}

enum Template {
    Literal(Instruction),
    Copy(isize),
    /// Contains `{name}` placeholders, parsed once they are bound
    Deferred(String),
}

enum Compiled {
    Find(Vec<Matcher>),
    FindLast(Vec<Matcher>),
    FindNext(Vec<Matcher>),
    FindPrevious(Vec<Matcher>),
    Extend(Vec<Matcher>),
    ExtendBackwards(Vec<Matcher>),
    ExtendTo(String),
    Replace(Vec<Template>),
    Prepend(Vec<Template>),
    Append(Vec<Template>),
    Remove,
    Follow(isize),
    SubRange(usize, usize),
    Begin,
    All,
    End,
    AtStart,
    AtEnd,
    Mark(String),
    Restore(String),
    ReplaceJump(isize, String),
    AttachLabel(isize, String),
    DefineLabel(String),
    DeclareLocal(String, String),
}

fn compile_steps(steps: &[Step]) -> Result<Vec<Compiled>> {
    let mut marks = HashSet::new();
    let mut compiled = Vec::with_capacity(steps.len());

    for (i, step) in steps.iter().enumerate() {
        let next = match step {
            Step::Find(p) => Compiled::Find(parse_pattern(p)?),
            Step::FindLast(p) => Compiled::FindLast(parse_pattern(p)?),
            Step::FindNext(p) => Compiled::FindNext(parse_pattern(p)?),
            Step::FindPrevious(p) => Compiled::FindPrevious(parse_pattern(p)?),
            Step::Extend(p) => Compiled::Extend(parse_pattern(p)?),
            Step::ExtendBackwards(p) => Compiled::ExtendBackwards(parse_pattern(p)?),
            Step::ExtendTo(name) => Compiled::ExtendTo(known_mark(&marks, i, name)?),
            Step::Replace(t) => Compiled::Replace(compile_templates(t)?),
            Step::Prepend(t) => Compiled::Prepend(compile_templates(t)?),
            Step::Append(t) => Compiled::Append(compile_templates(t)?),
            Step::Remove => Compiled::Remove,
            Step::Follow(n) => Compiled::Follow(*n),
            Step::SubRange { offset, len } => Compiled::SubRange(*offset, *len),
            Step::Begin => Compiled::Begin,
            Step::All => Compiled::All,
            Step::End => Compiled::End,
            Step::AtStart => Compiled::AtStart,
            Step::AtEnd => Compiled::AtEnd,
            Step::Mark(name) => {
                marks.insert(name.clone());
                Compiled::Mark(name.clone())
            }
            Step::Restore(name) => Compiled::Restore(known_mark(&marks, i, name)?),
            Step::ReplaceJump { index, target } => {
                Compiled::ReplaceJump(*index, known_mark(&marks, i, target)?)
            }
            Step::AttachLabel { index, name } => Compiled::AttachLabel(*index, name.clone()),
            Step::DefineLabel(name) => Compiled::DefineLabel(name.clone()),
            Step::DeclareLocal { name, ty } => Compiled::DeclareLocal(name.clone(), ty.clone()),
        };
        compiled.push(next);
    }
    Ok(compiled)
}

fn known_mark(marks: &HashSet<String>, step: usize, name: &str) -> Result<String> {
    if marks.contains(name) {
        Ok(name.to_string())
    } else {
        Err(Error::Syntax(format!("step {}: unknown mark '{}'", step, name)))
    }
}

fn compile_templates(templates: &[String]) -> Result<Vec<Template>> {
    templates
        .iter()
        .map(|text| {
            let text = text.trim();
            if let Some(index) = text.strip_prefix('$') {
                let index = index
                    .parse()
                    .map_err(|_| Error::Syntax(format!("Invalid copy reference '{}'", text)))?;
                Ok(Template::Copy(index))
            } else if text.contains('{') {
                Ok(Template::Deferred(text.to_string()))
            } else {
                Ok(Template::Literal(Instruction::from_str(text)?))
            }
        })
        .collect()
}

/// Per-run state of a script patch
struct Cursor {
    current: Range,
    marks: HashMap<String, Range>,
    bindings: HashMap<String, String>,
}

impl Cursor {
    fn mark(&self, name: &str) -> Result<&Range> {
        self.marks
            .get(name)
            .ok_or_else(|| Error::Syntax(format!("unknown mark '{}'", name)))
    }

    /// Build instructions from templates against the current range.
    ///
    /// Copies keep their labels only when the originals are being replaced.
    fn instantiate(&self, templates: &[Template], keep_labels: bool) -> Result<Vec<Instruction>> {
        templates
            .iter()
            .map(|template| match template {
                Template::Literal(instr) => Ok(instr.clone()),
                Template::Copy(index) => {
                    let instr = self.current.get(*index)?;
                    Ok(if keep_labels {
                        instr
                    } else {
                        instr.without_labels()
                    })
                }
                Template::Deferred(text) => {
                    let mut text = text.clone();
                    for (name, value) in &self.bindings {
                        text = text.replace(&format!("{{{}}}", name), value);
                    }
                    Instruction::from_str(&text)
                }
            })
            .collect()
    }
}

fn run_steps(code: &Code, steps: &[Compiled]) -> Result<()> {
    let mut cursor = Cursor {
        current: code.all(),
        marks: HashMap::new(),
        bindings: HashMap::new(),
    };

    for step in steps {
        match step {
            Compiled::Find(p) => cursor.current = code.find(p)?,
            Compiled::FindLast(p) => cursor.current = code.find_last(p)?,
            Compiled::FindNext(p) => cursor.current = cursor.current.find_next(p)?,
            Compiled::FindPrevious(p) => cursor.current = cursor.current.find_previous(p)?,
            Compiled::Extend(p) => cursor.current.extend(p)?,
            Compiled::ExtendBackwards(p) => cursor.current.extend_backwards(p)?,
            Compiled::ExtendTo(name) => {
                let other = cursor.mark(name)?.clone();
                cursor.current.extend_to(&other)?;
            }
            Compiled::Replace(t) => {
                let new = cursor.instantiate(t, true)?;
                cursor.current.replace(new)?;
            }
            Compiled::Prepend(t) => {
                let new = cursor.instantiate(t, false)?;
                cursor.current.prepend(new)?;
            }
            Compiled::Append(t) => {
                let new = cursor.instantiate(t, false)?;
                cursor.current.append(new)?;
            }
            Compiled::Remove => cursor.current.remove()?,
            Compiled::Follow(n) => cursor.current = cursor.current.follow(*n)?,
            Compiled::SubRange(offset, len) => {
                cursor.current = cursor.current.sub_range(*offset, *len)?
            }
            Compiled::Begin => cursor.current = code.begin(),
            Compiled::All => cursor.current = code.all(),
            Compiled::End => cursor.current = code.end(),
            Compiled::AtStart => cursor.current = cursor.current.at_start(),
            Compiled::AtEnd => cursor.current = cursor.current.at_end(),
            Compiled::Mark(name) => {
                cursor.marks.insert(name.clone(), cursor.current.clone());
            }
            Compiled::Restore(name) => cursor.current = cursor.mark(name)?.clone(),
            Compiled::ReplaceJump(index, target) => {
                let label = cursor.current.replace_jump(*index, cursor.mark(target)?)?;
                debug!("Retargeted jump at {} to {}", index, label);
            }
            Compiled::AttachLabel(index, name) => {
                let label = cursor.current.attach_label(*index)?;
                cursor.bindings.insert(name.clone(), label.to_string());
            }
            Compiled::DefineLabel(name) => {
                let label = code.define_label();
                cursor.bindings.insert(name.clone(), label.to_string());
            }
            Compiled::DeclareLocal(name, ty) => {
                let slot = code.declare_local(ty.as_str())?;
                cursor.bindings.insert(name.clone(), slot.to_string());
            }
        }
    }
    Ok(())
}
