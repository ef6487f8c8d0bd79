//! # hearth-settings-file
//!
//! File-backed [`SettingsStore`] adapter.
//!
//! The whole settings tree lives in one pretty-printed JSON document of
//! nested groups. Every write flushes the document; the tree is small
//! (device records and plugin configs), so rewriting it wholesale is
//! cheap and keeps the file readable for debugging.
//!
//! ## Dependency rule
//!
//! Depends on `hearth-core` (the port) only.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use hearth_core::ports::settings::{SettingsError, SettingsStore};

/// One node of the settings tree.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct Group {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    keys: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    children: BTreeMap<String, Group>,
}

/// Settings store persisting the group tree to a JSON file.
#[derive(Debug)]
pub struct FileSettings {
    path: PathBuf,
    root: Group,
}

impl FileSettings {
    /// Open the store at `path`. A missing file yields an empty tree; the
    /// file is created on first write.
    ///
    /// # Errors
    ///
    /// Returns a [`SettingsError`] when the file exists but cannot be read
    /// or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let path = path.into();
        let root = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content)
                .map_err(|err| SettingsError::Corrupt(err.to_string()))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Group::default(),
            Err(err) => return Err(err.into()),
        };
        Ok(Self { path, root })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the document out, creating parent directories as needed.
    /// The write goes through a sibling temp file and a rename, so a
    /// crash mid-write never corrupts the previous state.
    fn flush(&self) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(&self.root)
            .map_err(|err| SettingsError::Corrupt(err.to_string()))?;
        let tmp_path = self.path.with_extension("tmp");
        {
            let mut file = std::fs::File::create(&tmp_path)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn group(&self, path: &[&str]) -> Option<&Group> {
        let mut group = &self.root;
        for segment in path {
            group = group.children.get(*segment)?;
        }
        Some(group)
    }

    fn group_mut(&mut self, path: &[&str]) -> &mut Group {
        let mut group = &mut self.root;
        for segment in path {
            group = group.children.entry((*segment).to_string()).or_default();
        }
        group
    }
}

impl SettingsStore for FileSettings {
    fn child_groups(&self, path: &[&str]) -> Result<Vec<String>, SettingsError> {
        Ok(self
            .group(path)
            .map(|g| g.children.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn keys(&self, path: &[&str]) -> Result<Vec<String>, SettingsError> {
        Ok(self
            .group(path)
            .map(|g| g.keys.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn get(&self, path: &[&str], key: &str) -> Result<Option<serde_json::Value>, SettingsError> {
        Ok(self.group(path).and_then(|g| g.keys.get(key).cloned()))
    }

    fn set(
        &mut self,
        path: &[&str],
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), SettingsError> {
        self.group_mut(path).keys.insert(key.to_string(), value);
        self.flush()
    }

    fn remove_group(&mut self, path: &[&str]) -> Result<(), SettingsError> {
        match path.split_last() {
            Some((last, parent)) => {
                if let Some(group) = parent
                    .iter()
                    .try_fold(&mut self.root, |g, s| g.children.get_mut(*s))
                {
                    group.children.remove(*last);
                }
            }
            None => self.root = Group::default(),
        }
        self.flush()
    }
}
