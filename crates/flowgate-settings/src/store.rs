//! Persisted preferences store (`<state_root>/web-preferences.json`).

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs4::fs_std::FileExt;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::preferences::{Preferences, RegistryEntry};
use crate::validate;

/// Single-file, single-process-exclusive store for user preferences and the
/// custom bundle/behavior registries.
pub struct PreferencesStore {
    path: PathBuf,
}

impl PreferencesStore {
    /// Root the store at `<state_root>/web-preferences.json`.
    #[must_use]
    pub fn open(state_root: impl AsRef<Path>) -> Self {
        Self { path: state_root.as_ref().join("web-preferences.json") }
    }

    /// Load current preferences, or defaults if the file does not exist yet.
    pub fn get(&self) -> Result<Preferences> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no preferences file yet, using defaults");
            return Ok(Preferences::default());
        }
        let file = File::open(&self.path)?;
        FileExt::lock_shared(&file)?;
        let content = fs::read_to_string(&self.path)?;
        FileExt::unlock(&file)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Replace the entire preferences document.
    pub fn put_whole(&self, prefs: &Preferences) -> Result<()> {
        self.write(prefs)
    }

    /// Register a custom bundle. Does not itself validate the URI — see
    /// [`validate::validate_uri`] for that, invoked separately.
    pub fn add_custom_bundle(&self, entry: RegistryEntry) -> Result<()> {
        self.mutate(|prefs| prefs.custom_bundles.push(entry))
    }

    /// Remove a custom bundle by name.
    pub fn remove_custom_bundle(&self, name: &str) -> Result<()> {
        self.mutate_checked(name, |prefs| remove_named(&mut prefs.custom_bundles, name))
    }

    /// Register a custom behavior.
    pub fn add_custom_behavior(&self, entry: RegistryEntry) -> Result<()> {
        self.mutate(|prefs| prefs.custom_behaviors.push(entry))
    }

    /// Remove a custom behavior by name.
    pub fn remove_custom_behavior(&self, name: &str) -> Result<()> {
        self.mutate_checked(name, |prefs| remove_named(&mut prefs.custom_behaviors, name))
    }

    /// Validate a registry URI without registering it.
    pub fn validate_uri(&self, uri: &str) -> Result<()> {
        validate::validate_uri(uri)
    }

    fn mutate(&self, f: impl FnOnce(&mut Preferences)) -> Result<()> {
        let mut prefs = self.get()?;
        f(&mut prefs);
        self.write(&prefs)
    }

    fn mutate_checked(&self, name: &str, f: impl FnOnce(&mut Preferences) -> bool) -> Result<()> {
        let mut prefs = self.get()?;
        if !f(&mut prefs) {
            return Err(SettingsError::NotFound(name.to_string()));
        }
        self.write(&prefs)
    }

    fn write(&self, prefs: &Preferences) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).write(true).truncate(true).open(&self.path)?;
        FileExt::lock_exclusive(&file)?;
        serde_json::to_writer_pretty(&file, prefs)?;
        file.sync_all()?;
        FileExt::unlock(&file)?;
        Ok(())
    }
}

fn remove_named(entries: &mut Vec<RegistryEntry>, name: &str) -> bool {
    let before = entries.len();
    entries.retain(|e| e.name != name);
    entries.len() != before
}
