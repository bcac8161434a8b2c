//! Persisted Layout state: domain definitions plus every file record.

mod sqlite;

pub use sqlite::SnapshotDb;

use crate::compat::{diff_configs, ConfigChange};
use crate::domain::Domain;
use crate::entity::MapperRegistry;
use crate::error::{PathGrabError, Result};
use crate::file::File;
use crate::layout::{Layout, LayoutBuilder};
use crate::scanner::Scanner;
use crate::schema::{hash_config, DomainConfig, LayoutConfig};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub config_hash: String,
    #[serde(default)]
    pub regex_search: bool,
    pub domains: Vec<DomainConfig>,
    #[serde(default)]
    pub files: Vec<File>,
}

/// On-disk encoding, chosen from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotFormat {
    Json,
    Yaml,
    Sqlite,
}

impl SnapshotFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => SnapshotFormat::Yaml,
            Some("db") | Some("sqlite") | Some("sqlite3") => SnapshotFormat::Sqlite,
            _ => SnapshotFormat::Json,
        }
    }
}

impl Snapshot {
    pub fn from_layout(layout: &Layout) -> Self {
        Snapshot {
            version: SNAPSHOT_VERSION,
            created_at: Utc::now(),
            config_hash: layout.config_hash(),
            regex_search: layout.regex_search(),
            domains: layout.config().domains,
            files: layout.files().to_vec(),
        }
    }

    pub fn config(&self) -> LayoutConfig {
        LayoutConfig {
            domains: self.domains.clone(),
            regex_search: self.regex_search,
        }
    }

    /// Rebuild the Layout exactly as recorded. Every value is re-coerced to
    /// its entity's dtype and mapper names are resolved against `registry`.
    pub fn into_layout(self, registry: &MapperRegistry) -> Result<Layout> {
        if self.version > SNAPSHOT_VERSION {
            return Err(PathGrabError::Configuration(format!(
                "Snapshot version {} is newer than supported version {SNAPSHOT_VERSION}",
                self.version
            )));
        }

        let domains = self
            .domains
            .iter()
            .map(|d| Domain::new(d, registry))
            .collect::<Result<Vec<_>>>()?;

        let mut files = Vec::with_capacity(self.files.len());
        for mut file in self.files {
            let domain = domains
                .iter()
                .find(|d| d.name() == file.domain)
                .ok_or_else(|| {
                    PathGrabError::Configuration(format!(
                        "Snapshot file {} belongs to unknown domain '{}'",
                        file.path, file.domain
                    ))
                })?;
            for (name, value) in file.entities.iter_mut() {
                let entity = domain
                    .entity(name)
                    .ok_or_else(|| PathGrabError::UnknownEntity { name: name.clone() })?;
                *value = entity.coerce_value(value)?;
            }
            files.push(file);
        }

        let layout = Layout::assemble(domains, files, Vec::new(), self.regex_search)?;
        if layout.config_hash() != self.config_hash {
            log::warn!(
                "Snapshot configuration hash {} does not match its domains ({})",
                self.config_hash,
                layout.config_hash()
            );
        }
        Ok(layout)
    }

    /// Re-index the recorded paths against a (possibly newer) configuration
    /// without touching the filesystem.
    pub fn reindex(&self, config: &LayoutConfig, registry: &MapperRegistry) -> Result<Layout> {
        let mut builder = LayoutBuilder::new().regex_search(config.regex_search);
        for domain in &config.domains {
            builder = builder.domain(Domain::new(domain, registry)?, SnapshotScanner::new(self));
        }
        builder.build()
    }

    /// Differences between the recorded domains and `config`, after roots
    /// are resolved the same way a Layout would resolve them.
    pub fn changes_from(
        &self,
        config: &LayoutConfig,
        registry: &MapperRegistry,
    ) -> Result<Vec<ConfigChange>> {
        let resolved = LayoutConfig {
            domains: config
                .domains
                .iter()
                .map(|d| Domain::new(d, registry).map(|d| d.to_config()))
                .collect::<Result<Vec<_>>>()?,
            regex_search: config.regex_search,
        };
        if hash_config(&resolved) == self.config_hash {
            return Ok(Vec::new());
        }
        Ok(diff_configs(&self.config(), &resolved))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        match SnapshotFormat::from_path(path) {
            SnapshotFormat::Json => std::fs::write(path, self.to_json()?)?,
            SnapshotFormat::Yaml => std::fs::write(path, self.to_yaml()?)?,
            SnapshotFormat::Sqlite => SnapshotDb::open(path)?.write(self)?,
        }
        log::info!("Saved snapshot of {} files to {}", self.files.len(), path.display());
        Ok(())
    }

    pub fn open(path: &Path) -> Result<Self> {
        match SnapshotFormat::from_path(path) {
            SnapshotFormat::Json => Snapshot::from_json(&std::fs::read_to_string(path)?),
            SnapshotFormat::Yaml => Snapshot::from_yaml(&std::fs::read_to_string(path)?),
            SnapshotFormat::Sqlite => {
                if !path.exists() {
                    return Err(PathGrabError::Configuration(format!(
                        "Snapshot not found: {}",
                        path.display()
                    )));
                }
                SnapshotDb::open(path)?.read()?.ok_or_else(|| {
                    PathGrabError::Configuration(format!(
                        "Snapshot database {} is empty",
                        path.display()
                    ))
                })
            }
        }
    }
}

impl Layout {
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::from_layout(self)
    }

    pub fn save_snapshot(&self, path: &Path) -> Result<()> {
        self.snapshot().save(path)
    }

    pub fn load_snapshot(path: &Path, registry: &MapperRegistry) -> Result<Layout> {
        Snapshot::open(path)?.into_layout(registry)
    }
}

/// Replays the paths recorded in a snapshot, per domain name.
#[derive(Debug, Clone, Default)]
pub struct SnapshotScanner {
    paths: HashMap<String, Vec<String>>,
}

impl SnapshotScanner {
    pub fn new(snapshot: &Snapshot) -> Self {
        let mut paths: HashMap<String, Vec<String>> = HashMap::new();
        for file in &snapshot.files {
            paths
                .entry(file.domain.clone())
                .or_default()
                .push(file.path.clone());
        }
        SnapshotScanner { paths }
    }
}

impl Scanner for SnapshotScanner {
    fn scan(&self, domain: &Domain) -> Result<Vec<String>> {
        Ok(self.paths.get(domain.name()).cloned().unwrap_or_default())
    }
}
