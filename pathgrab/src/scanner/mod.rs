//! Candidate path producers. The indexer only depends on the [`Scanner`]
//! contract; local disk, static lists and snapshots are provided here and in
//! `snapshot`, remote backends implement the trait themselves.

use crate::domain::Domain;
use crate::error::{PathGrabError, Result};
use crate::util::{join_path, normalize_path, relative_to};

/// Produces the finite sequence of candidate file paths under a domain root.
pub trait Scanner: Send + Sync {
    fn scan(&self, domain: &Domain) -> Result<Vec<String>>;
}

impl<S: Scanner + ?Sized> Scanner for Box<S> {
    fn scan(&self, domain: &Domain) -> Result<Vec<String>> {
        (**self).scan(domain)
    }
}

/// Recursive walk of the domain root on the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalScanner;

impl Scanner for LocalScanner {
    fn scan(&self, domain: &Domain) -> Result<Vec<String>> {
        let root = domain.root();
        if !std::path::Path::new(root).is_dir() {
            return Err(PathGrabError::ScanFailure {
                domain: domain.name().to_string(),
                message: format!("Root directory does not exist: {root}"),
            });
        }

        let pattern = format!("{}/**/*", glob::Pattern::escape(root));
        let mut paths = Vec::new();
        for entry in glob::glob(&pattern)? {
            let path = entry.map_err(|e| PathGrabError::ScanFailure {
                domain: domain.name().to_string(),
                message: e.to_string(),
            })?;
            if !path.is_file() {
                continue;
            }
            let text = normalize_path(&path.to_string_lossy());
            let path = join_path(root, relative_to(&text, root));
            if domain.accepts(&path) {
                paths.push(path);
            }
        }

        log::debug!("Scanned {} candidate files under {root}", paths.len());
        Ok(paths)
    }
}

/// A fixed list of paths, e.g. from a remote listing or a test fixture.
#[derive(Debug, Clone, Default)]
pub struct StaticScanner {
    paths: Vec<String>,
}

impl StaticScanner {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        StaticScanner {
            paths: paths.into_iter().map(|p| normalize_path(p.as_ref())).collect(),
        }
    }
}

impl Scanner for StaticScanner {
    fn scan(&self, _domain: &Domain) -> Result<Vec<String>> {
        Ok(self.paths.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::MapperRegistry;
    use crate::schema::parse_domain_str;
    use tempfile::TempDir;

    fn touch(root: &std::path::Path, rel: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "").unwrap();
    }

    #[test]
    fn test_local_scan_honours_filters() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "sub-01/anat/sub-01_T1w.nii.gz");
        touch(tmp.path(), "sub-01/func/sub-01_task-rest_bold.nii.gz");
        touch(tmp.path(), "derivatives/sub-01/x.nii.gz");

        let yaml = format!(
            "name: d\nroot: '{}'\nentities: []\nindex:\n  exclude: ['^derivatives/']",
            tmp.path().display()
        );
        let domain =
            Domain::new(&parse_domain_str(&yaml).unwrap(), &MapperRegistry::new()).unwrap();

        let mut paths = LocalScanner.scan(&domain).unwrap();
        paths.sort();
        let root = normalize_path(&tmp.path().to_string_lossy());
        assert_eq!(
            paths,
            vec![
                format!("{root}/sub-01/anat/sub-01_T1w.nii.gz"),
                format!("{root}/sub-01/func/sub-01_task-rest_bold.nii.gz"),
            ]
        );
    }

    #[test]
    fn test_missing_root_is_scan_failure() {
        let domain = Domain::new(
            &parse_domain_str("name: d\nroot: /definitely/not/here\nentities: []").unwrap(),
            &MapperRegistry::new(),
        )
        .unwrap();
        let err = LocalScanner.scan(&domain).unwrap_err();
        assert!(matches!(err, PathGrabError::ScanFailure { .. }));
    }

    #[test]
    fn test_static_scanner_normalises() {
        let domain = Domain::new(
            &parse_domain_str("name: d\nroot: .\nentities: []").unwrap(),
            &MapperRegistry::new(),
        )
        .unwrap();
        let scanner = StaticScanner::new(["a\\b.txt", "c/d.txt"]);
        assert_eq!(scanner.scan(&domain).unwrap(), vec!["a/b.txt", "c/d.txt"]);
    }
}
