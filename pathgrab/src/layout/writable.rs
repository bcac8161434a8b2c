use super::{Layout, Query};
use crate::error::{PathGrabError, Result};
use crate::file::File;
use crate::path_builder::{
    write_contents_to_file, Binding, Bindings, Cardinality, ConflictPolicy, Contents,
    PathBuilder,
};
use std::path::{Path, PathBuf};

/// How [`Layout::copy_files`] materialises each file.
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyOptions {
    pub symlink: bool,
    pub conflicts: ConflictPolicy,
}

impl Layout {
    /// Path builder that coerces bound values with this layout's entity
    /// dtypes.
    pub fn path_builder(&self) -> PathBuilder {
        PathBuilder::new().with_entities(self.entities.values())
    }

    /// Patterns to use when the caller gives none: every domain's
    /// `default_path_patterns`, in domain order.
    fn resolve_patterns<S: AsRef<str>>(&self, patterns: &[S]) -> Result<Vec<String>> {
        let resolved: Vec<String> = if patterns.is_empty() {
            self.domains
                .iter()
                .flat_map(|d| d.default_path_patterns().iter().cloned())
                .collect()
        } else {
            patterns.iter().map(|p| p.as_ref().to_string()).collect()
        };
        if resolved.is_empty() {
            return Err(PathGrabError::Configuration(
                "No path patterns given and no domain defines default_path_patterns".into(),
            ));
        }
        Ok(resolved)
    }

    pub fn build_path<S: AsRef<str>>(
        &self,
        values: &Bindings,
        patterns: &[S],
        cardinality: &str,
    ) -> Result<Vec<String>> {
        let patterns = self.resolve_patterns(patterns)?;
        self.path_builder().build_any(values, &patterns, cardinality)
    }

    /// Build paths from the entity values of an indexed file.
    pub fn build_path_for_file<S: AsRef<str>>(
        &self,
        file: &File,
        patterns: &[S],
        cardinality: &str,
    ) -> Result<Vec<String>> {
        let values: Bindings = file
            .entities
            .iter()
            .map(|(k, v)| (k.clone(), Binding::One(v.clone())))
            .collect();
        self.build_path(&values, patterns, cardinality)
    }

    /// Build exactly one path from `values` and write `contents` there.
    pub fn write_contents<S: AsRef<str>>(
        &self,
        values: &Bindings,
        patterns: &[S],
        contents: Contents<'_>,
        root: Option<&Path>,
        conflicts: ConflictPolicy,
    ) -> Result<Option<PathBuf>> {
        let paths = self.build_path(values, patterns, "==1")?;
        match paths.first() {
            Some(path) => write_contents_to_file(path, contents, root, conflicts),
            None => Ok(None),
        }
    }

    /// Copy (or link) every file matching `query` to the path built from its
    /// own entity values, under `root`.
    ///
    /// Files the patterns cannot build a path for are skipped with a warning.
    /// A file that builds to more than one path is a cardinality error,
    /// raised before anything is written.
    pub fn copy_files<S: AsRef<str>>(
        &self,
        query: &Query,
        patterns: &[S],
        root: &Path,
        options: CopyOptions,
    ) -> Result<Vec<PathBuf>> {
        let single = Cardinality::exactly(1);
        let mut plan = Vec::new();
        for file in self.select(query)? {
            let mut paths = self.build_path_for_file(file, patterns, ">=0")?;
            if paths.is_empty() {
                log::warn!("No path could be built for {}, not copying it", file.path);
                continue;
            }
            single.check(paths.len())?;
            plan.push((file, paths.remove(0)));
        }

        let mut written = Vec::new();
        for (file, target) in plan {
            let source = PathBuf::from(&file.path);
            let result = if options.symlink {
                let source = std::fs::canonicalize(&source)?;
                write_contents_to_file(&target, Contents::Link(&source), Some(root), options.conflicts)?
            } else {
                write_contents_to_file(&target, Contents::CopyOf(&source), Some(root), options.conflicts)?
            };
            written.extend(result);
        }
        log::info!("Copied {} files to {}", written.len(), root.display());
        Ok(written)
    }
}
