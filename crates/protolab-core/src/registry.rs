use crate::error::{ProtolabError, Result};
use crate::io::atomic_write;
use crate::paths;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// PrototypeRecord
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrototypeRecord {
    pub id: String,
    pub port: u16,
    #[serde(rename = "directory")]
    pub directory_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// PrototypeRegistry
// ---------------------------------------------------------------------------

/// Read accessor over whatever store owns the prototype records.
///
/// The lifecycle layer only ever asks "which directory serves this port";
/// it never writes through this trait.
pub trait PrototypeRegistry: Send + Sync {
    fn lookup_by_port(&self, port: u16) -> Result<Option<PrototypeRecord>>;

    fn list(&self) -> Result<Vec<PrototypeRecord>>;
}

/// Registry backed by `.protolab/prototypes.yaml`.
///
/// The file is re-read on every call so edits made by the CLI (or by hand)
/// are visible to a running server without a restart.
#[derive(Debug, Clone)]
pub struct FileRegistry {
    root: PathBuf,
}

impl FileRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl PrototypeRegistry for FileRegistry {
    fn lookup_by_port(&self, port: u16) -> Result<Option<PrototypeRecord>> {
        Ok(self.list()?.into_iter().find(|r| r.port == port))
    }

    fn list(&self) -> Result<Vec<PrototypeRecord>> {
        let file = PrototypeFile::load(&self.root)?;
        Ok(file
            .prototypes
            .into_iter()
            .map(|mut r| {
                r.directory_path = paths::resolve_directory(&self.root, &r.directory_path);
                r
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// PrototypeFile: on-disk shape of the registry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrototypeFile {
    #[serde(default)]
    pub prototypes: Vec<PrototypeRecord>,
}

impl PrototypeFile {
    /// Load the registry file. A missing file is an empty registry.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::prototypes_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(&data)?)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::prototypes_path(root);
        let data = serde_yaml::to_string(self)?;
        atomic_write(&path, data.as_bytes())
    }

    pub fn add(&mut self, id: &str, port: u16, directory: impl Into<PathBuf>) -> Result<()> {
        paths::validate_id(id)?;
        if self.prototypes.iter().any(|r| r.id == id) {
            return Err(ProtolabError::PrototypeExists(id.to_string()));
        }
        self.prototypes.push(PrototypeRecord {
            id: id.to_string(),
            port,
            directory_path: directory.into(),
            added_at: Some(Utc::now()),
        });
        Ok(())
    }

    /// Remove a record by id. Returns true if one was removed.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.prototypes.len();
        self.prototypes.retain(|r| r.id != id);
        self.prototypes.len() != before
    }
}

/// Ports claimed by more than one record, with the ids that claim them.
pub fn duplicate_ports(records: &[PrototypeRecord]) -> BTreeMap<u16, Vec<String>> {
    let mut by_port: BTreeMap<u16, Vec<String>> = BTreeMap::new();
    for r in records {
        by_port.entry(r.port).or_default().push(r.id.clone());
    }
    by_port.retain(|_, ids| ids.len() > 1);
    by_port
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
