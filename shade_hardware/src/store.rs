//! File-backed key-value store.
//!
//! One TOML document holds every namespace (`[calibration] travel_steps = 5000`).
//! A commit rewrites the whole document through a temp file + fsync + rename, so a
//! power cut leaves either the previous or the new contents on disk, never a mix.
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use shade_traits::KeyValueStore;

use crate::error::{HwError, Result};

type Namespaces = BTreeMap<String, BTreeMap<String, i64>>;

pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("new");
    {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    fs::rename(tmp, path)
}

#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Namespaces,
    dirty: bool,
}

impl FileStore {
    /// Open (or lazily create) the store at `path`.
    ///
    /// An unreadable document is treated as empty; the caller's validation then
    /// erases and rewrites it.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(text) => match toml::from_str::<Namespaces>(&text) {
                Ok(map) => map,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "store unreadable, starting empty");
                    Namespaces::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Namespaces::new(),
            Err(e) => return Err(HwError::Io(e)),
        };
        Ok(Self {
            path,
            entries,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn get(&self, namespace: &str, key: &str) -> Result<Option<u16>> {
        let Some(raw) = self.entries.get(namespace).and_then(|ns| ns.get(key)) else {
            return Ok(None);
        };
        u16::try_from(*raw)
            .map(Some)
            .map_err(|_| HwError::Corrupt(format!("{namespace}.{key} = {raw} is not a u16")))
    }

    fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        self.entries.retain(|_, ns| !ns.is_empty());
        let text =
            toml::to_string(&self.entries).map_err(|e| HwError::Corrupt(e.to_string()))?;
        write_atomic(&self.path, text.as_bytes())?;
        self.dirty = false;
        tracing::debug!(path = %self.path.display(), "store committed");
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get_u16(
        &self,
        namespace: &str,
        key: &str,
    ) -> std::result::Result<Option<u16>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.get(namespace, key)?)
    }

    fn set_u16(
        &mut self,
        namespace: &str,
        key: &str,
        value: u16,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.entries
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), i64::from(value));
        self.dirty = true;
        Ok(())
    }

    fn remove(
        &mut self,
        namespace: &str,
        key: &str,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if let Some(ns) = self.entries.get_mut(namespace)
            && ns.remove(key).is_some()
        {
            self.dirty = true;
        }
        Ok(())
    }

    fn commit(&mut self) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.flush()?)
    }
}
