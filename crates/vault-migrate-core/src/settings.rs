use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_SETTINGS_FILE: &str = "vault-migrate.json";

/// The two values a migration run needs.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MigrateSettings {
    #[serde(default)]
    pub root_location: Option<PathBuf>,
    #[serde(default = "default_attachments_folder_name")]
    pub attachments_folder_name: String,
}

impl Default for MigrateSettings {
    fn default() -> Self {
        Self {
            root_location: None,
            attachments_folder_name: default_attachments_folder_name(),
        }
    }
}

impl MigrateSettings {
    /// Values set in `overlay` win; blank ones fall back to `self`.
    pub fn merge_overlay(&self, overlay: &MigrateSettings) -> MigrateSettings {
        let mut merged = self.clone();
        if overlay.root_location.is_some() {
            merged.root_location = overlay.root_location.clone();
        }
        if !overlay.attachments_folder_name.trim().is_empty() {
            merged.attachments_folder_name = overlay.attachments_folder_name.clone();
        }
        merged
    }

    pub fn require_root(&self) -> Result<&Path> {
        self.root_location
            .as_deref()
            .context("no vault root configured (set root_location or pass --root)")
    }
}

pub fn load_settings_from_path(path: &Path) -> Result<MigrateSettings> {
    if !path.exists() {
        return Ok(MigrateSettings::default());
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("read settings file: {}", path.display()))?;
    let settings: MigrateSettings = serde_json::from_str(&raw)
        .with_context(|| format!("parse settings file: {}", path.display()))?;
    Ok(settings)
}

pub fn save_settings_to_path(path: &Path, settings: &MigrateSettings) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create config dir: {}", parent.display()))?;
    }

    let json = serde_json::to_string_pretty(settings)?;
    fs::write(path, json).with_context(|| format!("write settings file: {}", path.display()))?;
    Ok(())
}

fn default_attachments_folder_name() -> String {
    "attachments".to_string()
}
