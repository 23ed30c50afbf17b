//! Show command implementation.

use std::path::Path;

use anyhow::Result;
use ilpatch::{MemoryRuntime, StoredMethod};

use super::{load_bodies, lookup};

/// Run the show command
pub fn run(bodies: &Path, method: Option<&str>) -> Result<()> {
    let runtime = load_bodies(bodies)?;
    match method {
        Some(name) => print!("{}", format_method(name, lookup(&runtime, name)?)),
        None => print!("{}", format_listing(&runtime)),
    }
    Ok(())
}

fn format_method(name: &str, method: &StoredMethod) -> String {
    let mut out = name.to_string();
    if method.finalized {
        out.push_str(" (finalized)");
    }
    out.push('\n');
    for (slot, ty) in method.locals.iter().enumerate() {
        out.push_str(&format!("  .local V_{} {}\n", slot, ty));
    }
    for (pos, instr) in method.instructions.iter().enumerate() {
        out.push_str(&format!("  {:04}: {}\n", pos, instr));
    }
    out
}

fn format_listing(runtime: &MemoryRuntime) -> String {
    runtime
        .methods()
        .map(|(name, method)| {
            format!(
                "{} ({} instructions{})\n",
                name,
                method.instructions.len(),
                if method.finalized { ", finalized" } else { "" }
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ilpatch::{Label, ins};

    #[test]
    fn test_format_method() {
        let method = StoredMethod {
            finalized: true,
            locals: vec!["int".to_string()],
            instructions: vec![ins::brtrue(Label::new(1)), ins::ret().with_label(Label::new(1))],
        };
        assert_eq!(
            format_method("A::b", &method),
            "A::b (finalized)\n  .local V_0 int\n  0000: brtrue L_1\n  0001: L_1: ret\n"
        );
    }

    #[test]
    fn test_format_listing_sorted() {
        let runtime = MemoryRuntime::new()
            .with_method("Z::z", vec![ins::ret()])
            .with_method("A::a", vec![ins::nop(), ins::ret()]);
        assert_eq!(
            format_listing(&runtime),
            "A::a (2 instructions)\nZ::z (1 instructions)\n"
        );
    }
}
