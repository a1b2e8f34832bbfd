//! Local environment facts about the audited deployment.
//!
//! Facts come from a YAML inventory (an embedded default, overridable via
//! `COMPLYMAP_SITE_INVENTORY`) merged with process-environment probes.
//! Collection is best-effort and never fails a report run; an unreadable
//! inventory degrades to the embedded defaults with a warning.

use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::BoxError;

const EMBEDDED_INVENTORY: &str = include_str!("../configs/site-inventory.yaml");

/// Environment variables that indicate a host-level backup tool is wired up.
/// Checked only after snapshot descriptors and extension names both miss.
pub const BACKUP_ENV_MARKERS: &[&str] = &[
    "RESTIC_REPOSITORY",
    "RESTIC_PASSWORD",
    "BORG_REPO",
    "WALG_S3_PREFIX",
    "WAL_G_S3_PREFIX",
    "PGBACKREST_STANZA",
    "AWS_BACKUP_VAULT",
    "DUPLICITY_TARGET",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extension {
    pub name: String,
    #[serde(default)]
    pub version: String,
}

/// Snapshot-independent facts the analyzers consume. `backup_env_markers`
/// is resolved at collection time so synthesis itself stays a pure function
/// of its inputs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteFacts {
    pub platform_version: String,
    pub active_extensions: Vec<Extension>,
    pub active_theme: Extension,
    pub tls_enabled: bool,
    pub debug_mode: bool,
    #[serde(default)]
    pub backup_env_markers: Vec<String>,
}

/// Declarative description of the audited site, loaded from YAML.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SiteInventory {
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub platform_version: String,
    #[serde(default)]
    pub tls_enabled: Option<bool>,
    #[serde(default)]
    pub debug_mode: Option<bool>,
    #[serde(default)]
    pub theme: Option<Extension>,
    #[serde(default)]
    pub extensions: Vec<Extension>,
}

impl SiteInventory {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, BoxError> {
        let yaml = fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, BoxError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_embedded() -> Result<Self, BoxError> {
        Self::from_yaml_str(EMBEDDED_INVENTORY)
    }
}

/// Gathers `SiteFacts` for the configured site URL.
pub struct SiteCollector {
    site_url: String,
    inventory: SiteInventory,
}

impl SiteCollector {
    pub fn new(site_url: impl Into<String>) -> Self {
        Self {
            site_url: site_url.into(),
            inventory: load_inventory(),
        }
    }

    /// Bypass inventory discovery with an explicit inventory.
    pub fn with_inventory(site_url: impl Into<String>, inventory: SiteInventory) -> Self {
        Self {
            site_url: site_url.into(),
            inventory,
        }
    }

    pub fn collect(&self) -> SiteFacts {
        let tls_enabled = self
            .inventory
            .tls_enabled
            .unwrap_or_else(|| self.site_url.starts_with("https://"));
        let debug_mode = self
            .inventory
            .debug_mode
            .unwrap_or_else(|| env_flag("COMPLYMAP_DEBUG_MODE"));
        SiteFacts {
            platform_version: self.inventory.platform_version.clone(),
            active_extensions: self.inventory.extensions.clone(),
            active_theme: self.inventory.theme.clone().unwrap_or_default(),
            tls_enabled,
            debug_mode,
            backup_env_markers: BACKUP_ENV_MARKERS
                .iter()
                .filter(|marker| env::var_os(marker).is_some())
                .map(|marker| marker.to_string())
                .collect(),
        }
    }
}

fn load_inventory() -> SiteInventory {
    if let Ok(path) = env::var("COMPLYMAP_SITE_INVENTORY") {
        let path = path.trim();
        if !path.is_empty() {
            match SiteInventory::from_path(path) {
                Ok(inventory) => return inventory,
                Err(err) => warn!(
                    error = %err,
                    path = %path,
                    "site inventory override unreadable; using embedded defaults"
                ),
            }
        }
    }
    SiteInventory::from_embedded().unwrap_or_else(|err| {
        warn!(error = %err, "embedded site inventory failed to parse");
        SiteInventory::default()
    })
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|value| {
            let value = value.trim().to_lowercase();
            value == "1" || value == "true" || value == "on" || value == "yes"
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_inventory_parses() {
        let inventory = SiteInventory::from_embedded().expect("embedded inventory");
        assert_eq!(inventory.platform, "wordpress");
        assert!(!inventory.platform_version.is_empty());
        assert!(inventory
            .extensions
            .iter()
            .any(|extension| extension.name == "UpdraftPlus"));
    }

    #[test]
    fn collect_uses_explicit_inventory_values() {
        let inventory = SiteInventory::from_yaml_str(
            "platform_version: \"6.4\"\ntls_enabled: false\ndebug_mode: true\nextensions:\n  - name: Duplicator\n",
        )
        .expect("inventory");
        let facts = SiteCollector::with_inventory("https://shop.example", inventory).collect();
        assert_eq!(facts.platform_version, "6.4");
        assert!(!facts.tls_enabled);
        assert!(facts.debug_mode);
        assert_eq!(facts.active_extensions[0].name, "Duplicator");
    }

    #[test]
    fn tls_falls_back_to_site_url_scheme() {
        let inventory = SiteInventory {
            debug_mode: Some(false),
            ..SiteInventory::default()
        };
        let https = SiteCollector::with_inventory("https://shop.example", inventory.clone());
        assert!(https.collect().tls_enabled);
        let http = SiteCollector::with_inventory("http://shop.example", inventory);
        assert!(!http.collect().tls_enabled);
    }
}
