use std::fs;
use std::path::{Path, PathBuf};

use super::bundle::ModelBundle;
use crate::error::{BioAuthError, Result};

/// Default directory for persisted bundles
pub fn get_default_model_dir() -> PathBuf {
    crate::constants::get_data_dir().join("models")
}

/// Save bundle to disk
pub fn save_bundle(bundle: &ModelBundle, path: &Path) -> Result<()> {
    // Ensure directory exists
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_vec_pretty(bundle)?;
    fs::write(path, json)?;
    Ok(())
}

/// Load bundle from disk with layout and checksum validation
pub fn load_bundle(path: &Path) -> Result<ModelBundle> {
    if !path.exists() {
        return Err(BioAuthError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Bundle file not found: {}", path.display()),
        )));
    }

    let data = fs::read(path)?;
    let bundle: ModelBundle = serde_json::from_slice(&data)?;

    bundle.verify()?;

    Ok(bundle)
}
