//! Apply command implementation.

use std::path::Path;

use anyhow::{Context, Result, bail};
use ilpatch::{HostConfig, InstallReport, PatchHost, PatchScript, PatchStatus};
use owo_colors::OwoColorize;
use tracing::{info, warn};

use super::load_bodies;

/// Run the apply command
pub fn run(
    bodies: &Path,
    script: &Path,
    config: Option<&Path>,
    output: Option<&Path>,
    json: bool,
) -> Result<()> {
    let mut runtime = load_bodies(bodies)?;
    let script = PatchScript::load(script)
        .with_context(|| format!("Failed to load patch script {}", script.display()))?;
    let config = load_config(config)?;

    let patches = script.compile().context("Failed to compile patch script")?;
    if patches.is_empty() {
        bail!("Patch script declares no patches");
    }

    let id = script.id.clone().unwrap_or_else(|| config.id.clone());
    let mut builder = PatchHost::builder(id).config(config);
    for patch in patches {
        builder = builder.declare(patch);
    }
    let report = builder.build().install(&mut runtime);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", format_report(&report));
    }

    let output = output.unwrap_or(bodies);
    runtime
        .save(output)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    info!("Wrote patched method bodies to {}", output.display());

    if !report.is_success() {
        bail!(
            "{} of {} patches failed",
            report.failed(),
            report.outcomes.len()
        );
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<HostConfig> {
    let Some(path) = path else {
        return Ok(HostConfig::default());
    };
    match HostConfig::load(path) {
        Ok(config) => {
            info!("Loaded config from {:?}", path);
            Ok(config)
        }
        Err(e) if e.is_not_found() => {
            warn!("Config {:?} not found, using defaults", path);
            Ok(HostConfig::default())
        }
        Err(e) => Err(e).with_context(|| format!("Failed to load config {}", path.display())),
    }
}

fn format_report(report: &InstallReport) -> String {
    let mut out = String::new();
    for outcome in &report.outcomes {
        let label = format!("{:<9}", outcome.status.to_string());
        let label = match outcome.status {
            PatchStatus::Installed => label.green().to_string(),
            PatchStatus::Skipped => label.yellow().to_string(),
            PatchStatus::Failed => label.red().to_string(),
            _ => label,
        };
        out.push_str(&format!("{} {} -> {}\n", label, outcome.name, outcome.target));
        if let Some(error) = &outcome.error {
            out.push_str(&format!("          {}\n", error.dimmed()));
        }
    }
    out.push_str(&format!(
        "\n{}: {} installed, {} skipped, {} failed\n",
        report.host.bold(),
        report.installed(),
        report.skipped(),
        report.failed()
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ilpatch::{MemoryRuntime, ins};
    use std::fs;
    use tempfile::tempdir;

    const SCRIPT: &str = r#"{
        "id": "TilledSoilDecay",
        "patches": [
            {"name": "ret-zero", "target": "A::b", "steps": [{"find": "ldc.i4.1"}, {"replace": ["ldc.i4.0"]}]},
            {"name": "gated", "target": "A::b", "gate": "Off", "steps": ["remove"]}
        ]
    }"#;

    #[test]
    fn test_apply_writes_output() {
        let dir = tempdir().unwrap();
        let bodies = dir.path().join("bodies.json");
        let script = dir.path().join("script.json");
        let output = dir.path().join("out.json");
        MemoryRuntime::new()
            .with_method("A::b", vec![ins::ldc_i4(1), ins::ret()])
            .save(&bodies)
            .unwrap();
        fs::write(&script, SCRIPT).unwrap();

        run(&bodies, &script, None, Some(output.as_path()), false).unwrap();

        let patched = MemoryRuntime::load(&output).unwrap();
        assert_eq!(
            patched.method("A::b").unwrap().instructions,
            vec![ins::ldc_i4(0), ins::ret()]
        );
        // input is left alone when --output is given
        let original = MemoryRuntime::load(&bodies).unwrap();
        assert_eq!(original.method("A::b").unwrap().instructions[0], ins::ldc_i4(1));
    }

    #[test]
    fn test_apply_fails_on_failed_patch() {
        let dir = tempdir().unwrap();
        let bodies = dir.path().join("bodies.json");
        let script = dir.path().join("script.json");
        MemoryRuntime::new()
            .with_method("A::b", vec![ins::ret()])
            .save(&bodies)
            .unwrap();
        fs::write(&script, SCRIPT).unwrap();

        let err = run(&bodies, &script, None, None, true).unwrap_err();
        assert!(err.to_string().contains("1 of 2 patches failed"));
    }

    #[test]
    fn test_missing_config_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = load_config(Some(dir.path().join("missing.json").as_path())).unwrap();
        assert_eq!(config, HostConfig::default());
        assert_eq!(load_config(None).unwrap(), HostConfig::default());
    }

    #[test]
    fn test_format_report_lists_outcomes() {
        let mut runtime = MemoryRuntime::new().with_method("A::b", vec![ins::ret()]);
        let report = PatchHost::builder("host")
            .patch("ok", "A::b", |_| Ok(()))
            .patch("bad", "A::c", |_| Ok(()))
            .build()
            .install(&mut runtime);

        let text = format_report(&report);
        assert!(text.contains("ok -> A::b"));
        assert!(text.contains("bad -> A::c"));
        assert!(text.contains("1 installed, 0 skipped, 1 failed"));
    }
}
