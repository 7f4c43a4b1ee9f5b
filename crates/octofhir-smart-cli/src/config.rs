use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use octofhir_smart_client::{KeySet, SmartClientConfig};

const CONFIG_FILE: &str = "smart.toml";
const KEYS_FILE: &str = "smart-keys.json";
const STORE_FILE: &str = "smart-store.json";

fn octofhir_dir() -> Result<PathBuf> {
    Ok(dirs::home_dir()
        .context("Cannot determine home directory")?
        .join(".octofhir"))
}

/// Loads the configuration. An explicit path must exist; the default file
/// is optional.
pub fn load_config(path: Option<&Path>) -> Result<SmartClientConfig> {
    if let Some(path) = path {
        return SmartClientConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()));
    }

    let path = octofhir_dir()?.join(CONFIG_FILE);
    if !path.exists() {
        return Ok(SmartClientConfig::default());
    }
    SmartClientConfig::load(&path)
        .with_context(|| format!("Failed to load config {}", path.display()))
}

/// Loads this client's private key set.
pub fn load_keys(path: Option<&Path>) -> Result<KeySet> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => octofhir_dir()?.join(KEYS_FILE),
    };

    let content = fs::read_to_string(&path).with_context(|| {
        format!(
            "Cannot read keys from {}. Pass --keys or create one with: octofhir-smart keys import-pem <file> --kid <kid>",
            path.display()
        )
    })?;

    let keys = KeySet::from_json(&content)
        .with_context(|| format!("Invalid key set in {}", path.display()))?;
    if keys.is_empty() {
        anyhow::bail!("Key set {} is empty", path.display());
    }
    Ok(keys)
}

/// Resolves the credential store location.
pub fn store_path(path: Option<&Path>) -> Result<PathBuf> {
    match path {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(octofhir_dir()?.join(STORE_FILE)),
    }
}
