use crate::domain::Domain;
use crate::error::{PathGrabError, Result};
use crate::file::File;
use crate::scanner::Scanner;
use crate::util::{is_within, normalize_path, parent_dir};
use serde::Serialize;
use std::collections::HashSet;

/// Non-fatal problem found while indexing one file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexWarning {
    pub domain: String,
    pub path: String,
    pub entity: String,
    pub kind: WarningKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WarningKind {
    /// Extracted text could not be coerced; the value was omitted.
    TypeMismatch { value: String, dtype: String },
    /// A mandatory entity failed coercion; the whole file was dropped.
    MandatoryRejected { value: String, dtype: String },
    /// The file does not live under the entity's canonical directory.
    DirectoryMismatch { expected: String },
}

impl std::fmt::Display for IndexWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            WarningKind::TypeMismatch { value, dtype } => write!(
                f,
                "{}: '{value}' is not a valid {dtype} for entity '{}', value omitted",
                self.path, self.entity
            ),
            WarningKind::MandatoryRejected { value, dtype } => write!(
                f,
                "{}: mandatory entity '{}' cannot hold '{value}' as {dtype}, file excluded",
                self.path, self.entity
            ),
            WarningKind::DirectoryMismatch { expected } => write!(
                f,
                "{}: expected under '{expected}' for entity '{}'",
                self.path, self.entity
            ),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct IndexOutput {
    pub files: Vec<File>,
    pub warnings: Vec<IndexWarning>,
}

/// Scan a domain and extract entity values for every accepted path.
///
/// Scanner failures are returned unchanged; everything else that goes wrong
/// with an individual file is a warning.
pub fn build_index(domain: &Domain, scanner: &dyn Scanner) -> Result<IndexOutput> {
    let paths = scanner.scan(domain)?;
    let output = index_paths(domain, paths);
    log::info!(
        "Indexed {} files in domain '{}' ({} warnings)",
        output.files.len(),
        domain.name(),
        output.warnings.len()
    );
    Ok(output)
}

/// Index an explicit list of candidate paths.
pub fn index_paths<I, S>(domain: &Domain, paths: I) -> IndexOutput
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut output = IndexOutput::default();
    let mut seen = HashSet::new();

    for path in paths {
        let path = normalize_path(path.as_ref());
        if !domain.accepts(&path) {
            log::trace!("Filtered out {path}");
            continue;
        }
        if !seen.insert(path.clone()) {
            continue;
        }
        if let Some(file) = index_file(domain, &path, &mut output.warnings) {
            output.files.push(file);
        }
    }

    output
}

fn index_file(domain: &Domain, path: &str, warnings: &mut Vec<IndexWarning>) -> Option<File> {
    let mut file = File::new(path, domain.name());
    let warn = |entity: &str, kind: WarningKind| IndexWarning {
        domain: domain.name().to_string(),
        path: path.to_string(),
        entity: entity.to_string(),
        kind,
    };

    // Every entity is tried; a failure on one never stops the others.
    let mut rejected = false;
    for entity in domain.entities() {
        match entity.extract(path) {
            Ok(Some(value)) => {
                file.entities.insert(entity.name().to_string(), value);
            }
            Ok(None) => {
                if entity.mandatory() {
                    rejected = true;
                }
            }
            Err(PathGrabError::TypeMismatch { value, dtype, .. }) => {
                let kind = if entity.mandatory() {
                    rejected = true;
                    WarningKind::MandatoryRejected { value, dtype }
                } else {
                    WarningKind::TypeMismatch { value, dtype }
                };
                let warning = warn(entity.name(), kind);
                log::warn!("{warning}");
                warnings.push(warning);
            }
            Err(e) => {
                log::warn!("{path}: failed to extract '{}': {e}", entity.name());
            }
        }
    }

    if rejected {
        log::debug!("Dropping {path}: mandatory entity missing");
        return None;
    }
    if file.entities.is_empty() {
        log::trace!("Dropping {path}: no entity matched");
        return None;
    }

    let dir = parent_dir(path);
    for name in file.entities.keys() {
        if let Some(expected) = domain.render_directory(name, &file.entities) {
            if !is_within(dir, &expected) {
                let warning = warn(name, WarningKind::DirectoryMismatch { expected });
                log::debug!("{warning}");
                warnings.push(warning);
            }
        }
    }

    Some(file)
}
