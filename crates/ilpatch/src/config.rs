//! Host configuration
//!
//! # Example
//!
//! ```ignore
//! use ilpatch::config::HostConfig;
//!
//! let config = HostConfig::builder()
//!     .id("HarvestWithScythe")
//!     .toggle("HarvestForage", true)
//!     .build();
//! assert!(config.is_enabled("HarvestForage"));
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Configuration consulted while installing patches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Identifier of the patch host, used in log output
    pub id: String,
    /// Named on/off switches referenced by patch gates
    pub toggles: BTreeMap<String, bool>,
    /// Fail patches that leave branches to labels attached nowhere
    pub verify_labels: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            id: "ilpatch".to_string(),
            toggles: BTreeMap::new(),
            verify_labels: true,
        }
    }
}

impl HostConfig {
    /// Create a new configuration builder
    pub fn builder() -> HostConfigBuilder {
        HostConfigBuilder::default()
    }

    /// State of a toggle, `None` if the config does not mention it
    pub fn toggle(&self, name: &str) -> Option<bool> {
        self.toggles.get(name).copied()
    }

    /// Whether a toggle is on; unknown toggles are off
    pub fn is_enabled(&self, name: &str) -> bool {
        self.toggle(name).unwrap_or(false)
    }

    pub fn set_toggle(&mut self, name: impl Into<String>, enabled: bool) {
        self.toggles.insert(name.into(), enabled);
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::Config("Host id must not be empty".to_string()));
        }
        if let Some(name) = self.toggles.keys().find(|name| name.trim().is_empty()) {
            return Err(Error::Config(format!("Invalid toggle name '{}'", name)));
        }
        Ok(())
    }
}

/// Builder for HostConfig
#[derive(Debug, Clone, Default)]
pub struct HostConfigBuilder {
    id: Option<String>,
    toggles: BTreeMap<String, bool>,
    verify_labels: Option<bool>,
}

impl HostConfigBuilder {
    /// Set the host identifier
    pub fn id<S: Into<String>>(mut self, id: S) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set a named toggle
    pub fn toggle<S: Into<String>>(mut self, name: S, enabled: bool) -> Self {
        self.toggles.insert(name.into(), enabled);
        self
    }

    /// Set whether dangling labels fail a patch
    pub fn verify_labels(mut self, enabled: bool) -> Self {
        self.verify_labels = Some(enabled);
        self
    }

    /// Build the configuration
    pub fn build(self) -> HostConfig {
        let default = HostConfig::default();
        HostConfig {
            id: self.id.unwrap_or(default.id),
            toggles: self.toggles,
            verify_labels: self.verify_labels.unwrap_or(default.verify_labels),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_builder_defaults() {
        let config = HostConfig::builder().build();
        assert_eq!(config, HostConfig::default());
        assert!(config.verify_labels);
    }

    #[test]
    fn test_toggles() {
        let config = HostConfig::builder()
            .id("TilledSoilDecay")
            .toggle("DecayEnabled", true)
            .toggle("WinterDecay", false)
            .build();
        assert_eq!(config.toggle("DecayEnabled"), Some(true));
        assert_eq!(config.toggle("WinterDecay"), Some(false));
        assert_eq!(config.toggle("Missing"), None);
        assert!(config.is_enabled("DecayEnabled"));
        assert!(!config.is_enabled("Missing"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = HostConfig::builder()
            .id("WearMoreRings")
            .toggle("ExtraSlots", true)
            .verify_labels(false)
            .build();
        config.save(&path).unwrap();
        assert_eq!(HostConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_load_partial_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"toggles": {"HarvestForage": true}}"#).unwrap();
        let config = HostConfig::load(&path).unwrap();
        assert_eq!(config.id, "ilpatch");
        assert!(config.verify_labels);
        assert!(config.is_enabled("HarvestForage"));
    }

    #[test]
    fn test_load_invalid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"id": "  "}"#).unwrap();
        assert!(matches!(HostConfig::load(&path), Err(Error::Config(_))));

        let missing = HostConfig::load(dir.path().join("missing.json")).unwrap_err();
        assert!(missing.is_not_found());
    }
}
