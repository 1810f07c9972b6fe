//! File-backed model store
//!
//! Layout: `<root>/u<hex(user_id)>/<bundle_id>.json` plus an `ACTIVE` pointer file
//! holding the active bundle id. The pointer is replaced with write-to-temp
//! + rename, so a reader sees either the old or the new active bundle.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::ModelStore;
use crate::error::{BioAuthError, Result};
use crate::logic::model::storage::{load_bundle, save_bundle};
use crate::logic::model::{BundleSummary, ModelBundle};

const ACTIVE_POINTER: &str = "ACTIVE";
const ACTIVE_POINTER_TMP: &str = "ACTIVE.tmp";

pub struct FileModelStore {
    root: PathBuf,
    /// Serializes activations within this process
    write_lock: Mutex<()>,
    /// Active bundle per user, keyed by bundle id
    cache: RwLock<HashMap<String, Arc<ModelBundle>>>,
}

impl FileModelStore {
    pub fn new(root: PathBuf) -> Result<Self> {
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
            cache: RwLock::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Hex keeps any id to one `[0-9a-f]` path component under `root`.
    fn user_dir(&self, user_id: &str) -> PathBuf {
        self.root.join(format!("u{}", hex::encode(user_id.as_bytes())))
    }

    fn read_pointer(dir: &Path) -> Result<Option<String>> {
        match fs::read_to_string(dir.join(ACTIVE_POINTER)) {
            Ok(id) => {
                let id = id.trim().to_string();
                Ok((!id.is_empty()).then_some(id))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn bundle_path(dir: &Path, bundle_id: &str) -> PathBuf {
        dir.join(format!("{}.json", bundle_id))
    }
}

impl ModelStore for FileModelStore {
    fn activate(&self, bundle: ModelBundle) -> Result<()> {
        let _guard = self.write_lock.lock();
        let dir = self.user_dir(&bundle.user_id);

        save_bundle(&bundle, &Self::bundle_path(&dir, &bundle.id))?;

        let tmp = dir.join(ACTIVE_POINTER_TMP);
        fs::write(&tmp, &bundle.id)?;
        fs::rename(&tmp, dir.join(ACTIVE_POINTER))?;

        log::info!(
            "Activated bundle {} ({}) for {}",
            bundle.version,
            bundle.id,
            bundle.user_id
        );

        self.cache
            .write()
            .insert(bundle.user_id.clone(), Arc::new(bundle));
        Ok(())
    }

    fn active_bundle(&self, user_id: &str) -> Result<Option<Arc<ModelBundle>>> {
        let dir = self.user_dir(user_id);
        let Some(active_id) = Self::read_pointer(&dir)? else {
            return Ok(None);
        };

        if let Some(cached) = self.cache.read().get(user_id) {
            if cached.id == active_id {
                return Ok(Some(Arc::clone(cached)));
            }
        }

        let bundle = Arc::new(load_bundle(&Self::bundle_path(&dir, &active_id))?);
        if bundle.user_id != user_id {
            return Err(BioAuthError::Store(format!(
                "bundle {} belongs to {}, not {}",
                bundle.id, bundle.user_id, user_id
            )));
        }
        self.cache
            .write()
            .insert(user_id.to_string(), Arc::clone(&bundle));
        Ok(Some(bundle))
    }

    fn list_bundles(&self, user_id: &str) -> Result<Vec<BundleSummary>> {
        let dir = self.user_dir(user_id);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let active_id = Self::read_pointer(&dir)?;

        let mut summaries = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().map_or(true, |ext| ext != "json") {
                continue;
            }
            match load_bundle(&path) {
                Ok(bundle) => {
                    let is_active = active_id.as_deref() == Some(bundle.id.as_str());
                    summaries.push(bundle.summary(is_active));
                }
                Err(e) => log::warn!("Skipping unreadable bundle {}: {}", path.display(), e),
            }
        }

        summaries.sort_by_key(|s| s.created_at);
        Ok(summaries)
    }
}
