use crate::entity::Value;
use crate::util::{file_name, parent_dir};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One indexed file: its path, owning domain and extracted entity values.
///
/// `entities` is sparse; a missing key means the file has no value for that
/// entity. Records are immutable once indexed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct File {
    pub path: String,
    pub domain: String,
    #[serde(default)]
    pub entities: BTreeMap<String, Value>,
}

impl File {
    pub fn new(path: &str, domain: &str) -> Self {
        File {
            path: path.to_string(),
            domain: domain.to_string(),
            entities: BTreeMap::new(),
        }
    }

    pub fn filename(&self) -> &str {
        file_name(&self.path)
    }

    pub fn dirname(&self) -> &str {
        parent_dir(&self.path)
    }

    pub fn get(&self, entity: &str) -> Option<&Value> {
        self.entities.get(entity)
    }

    pub fn has(&self, entity: &str) -> bool {
        self.entities.contains_key(entity)
    }

    /// Whether the file name ends with any of the given extensions
    /// (with or without the leading dot).
    pub fn has_extension(&self, extensions: &[String]) -> bool {
        extensions.is_empty()
            || extensions.iter().any(|ext| {
                let ext = ext.trim_start_matches('.');
                self.filename()
                    .strip_suffix(ext)
                    .map_or(false, |rest| rest.ends_with('.'))
            })
    }

    pub fn to_record(&self) -> Record {
        Record {
            path: self.path.clone(),
            entities: self.entities.clone(),
        }
    }
}

/// Full entity-value record for one file, as returned by tuple queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub path: String,
    #[serde(flatten)]
    pub entities: BTreeMap<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_parts() {
        let f = File::new("sub-03/ses-2/func/sub-03_ses-2_bold.nii.gz", "bids");
        assert_eq!(f.filename(), "sub-03_ses-2_bold.nii.gz");
        assert_eq!(f.dirname(), "sub-03/ses-2/func");
    }

    #[test]
    fn test_extensions() {
        let f = File::new("sub-03/func/sub-03_bold.nii.gz", "bids");
        assert!(f.has_extension(&[]));
        assert!(f.has_extension(&["nii.gz".into()]));
        assert!(f.has_extension(&[".gz".into()]));
        assert!(!f.has_extension(&[".txt".into(), "rtf".into()]));
        assert!(!f.has_extension(&["z".into()]));
    }

    #[test]
    fn test_record_flattens_entities() {
        let mut f = File::new("a/sub-01.nii", "d");
        f.entities.insert("subject".into(), Value::from("01"));
        let json = serde_json::to_value(f.to_record()).unwrap();
        assert_eq!(json["path"], "a/sub-01.nii");
        assert_eq!(json["subject"], "01");
    }
}
