//! The merged, immutable index of one or more domains.

mod accessors;
mod handle;
mod nearest;
mod query;
mod writable;

pub use accessors::EntityGetter;
pub use handle::LayoutHandle;
pub use nearest::NearestOptions;
pub use query::{Constraint, Query, QueryResult, ReturnType, Table};
pub use writable::CopyOptions;

use crate::compat::{diff_entity, is_compatible};
use crate::domain::Domain;
use crate::entity::{Entity, MapperRegistry};
use crate::error::{PathGrabError, Result};
use crate::file::File;
use crate::indexer::{build_index, IndexOutput, IndexWarning};
use crate::scanner::{LocalScanner, Scanner};
use crate::schema::{hash_config, LayoutConfig};
use crate::util::{natural_cmp, normalize_path};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Queryable index over every file of its domains.
///
/// Files are kept in natural path order. A Layout never changes after it is
/// built; rebuilding produces a new one.
#[derive(Debug, Clone)]
pub struct Layout {
    domains: Vec<Domain>,
    entities: BTreeMap<String, Entity>,
    files: Vec<File>,
    by_path: HashMap<String, usize>,
    warnings: Vec<IndexWarning>,
    regex_search: bool,
    getters: BTreeMap<String, EntityGetter>,
}

/// Collects domains with their scanners, then indexes them in parallel.
#[derive(Default)]
pub struct LayoutBuilder {
    sources: Vec<(Domain, Box<dyn Scanner>)>,
    regex_search: bool,
}

impl LayoutBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn regex_search(mut self, regex_search: bool) -> Self {
        self.regex_search = regex_search;
        self
    }

    pub fn domain<S: Scanner + 'static>(mut self, domain: Domain, scanner: S) -> Self {
        self.sources.push((domain, Box::new(scanner)));
        self
    }

    pub fn build(self) -> Result<Layout> {
        let domains: Vec<&Domain> = self.sources.iter().map(|(d, _)| d).collect();
        check_domain_names(&domains)?;
        union_entities(&domains)?;

        let outputs = self
            .sources
            .par_iter()
            .map(|(domain, scanner)| build_index(domain, &**scanner))
            .collect::<Result<Vec<IndexOutput>>>()?;

        let mut files = Vec::new();
        let mut warnings = Vec::new();
        for output in outputs {
            files.extend(output.files);
            warnings.extend(output.warnings);
        }

        let domains = self.sources.into_iter().map(|(d, _)| d).collect();
        Layout::assemble(domains, files, warnings, self.regex_search)
    }
}

impl Layout {
    pub fn builder() -> LayoutBuilder {
        LayoutBuilder::new()
    }

    /// Build every configured domain and scan it on the local filesystem.
    pub fn from_config(config: &LayoutConfig, registry: &MapperRegistry) -> Result<Layout> {
        let mut builder = LayoutBuilder::new().regex_search(config.regex_search);
        for domain in &config.domains {
            builder = builder.domain(Domain::new(domain, registry)?, LocalScanner);
        }
        builder.build()
    }

    /// Combine already indexed files into a Layout, enforcing unique domain
    /// names, compatible entity definitions and collision-free paths.
    pub(crate) fn assemble(
        domains: Vec<Domain>,
        files: Vec<File>,
        warnings: Vec<IndexWarning>,
        regex_search: bool,
    ) -> Result<Layout> {
        let refs: Vec<&Domain> = domains.iter().collect();
        check_domain_names(&refs)?;
        let entities = union_entities(&refs)?;

        let mut owners: HashMap<String, String> = HashMap::new();
        let mut unique = Vec::with_capacity(files.len());
        for file in files {
            if let Some(name) = file.entities.keys().find(|k| !entities.contains_key(*k)) {
                return Err(PathGrabError::UnknownEntity { name: name.clone() });
            }
            match owners.get(&file.path) {
                Some(first) if *first == file.domain => continue,
                Some(first) => {
                    return Err(PathGrabError::PathCollision {
                        path: file.path,
                        first: first.clone(),
                        second: file.domain,
                    });
                }
                None => {
                    owners.insert(file.path.clone(), file.domain.clone());
                    unique.push(file);
                }
            }
        }

        let mut files = unique;
        files.sort_by(|a, b| natural_cmp(&a.path, &b.path));
        let by_path = files
            .iter()
            .enumerate()
            .map(|(i, f)| (f.path.clone(), i))
            .collect();
        let getters = entities
            .keys()
            .map(|name| {
                let getter = EntityGetter::new(name);
                (getter.name(), getter)
            })
            .collect();

        log::info!(
            "Layout ready: {} domains, {} entities, {} files",
            domains.len(),
            entities.len(),
            files.len()
        );

        Ok(Layout {
            domains,
            entities,
            files,
            by_path,
            warnings,
            regex_search,
            getters,
        })
    }

    /// Merge two layouts. Domain names must stay unique and shared entity
    /// names must be defined compatibly.
    pub fn merge(self, other: Layout) -> Result<Layout> {
        let mut domains = self.domains;
        domains.extend(other.domains);
        let mut files = self.files;
        files.extend(other.files);
        let mut warnings = self.warnings;
        warnings.extend(other.warnings);
        Layout::assemble(domains, files, warnings, self.regex_search)
    }

    pub fn domains(&self) -> &[Domain] {
        &self.domains
    }

    pub fn domain(&self, name: &str) -> Option<&Domain> {
        self.domains.iter().find(|d| d.name() == name)
    }

    /// Union of every domain's entities, keyed by name.
    pub fn entities(&self) -> &BTreeMap<String, Entity> {
        &self.entities
    }

    pub fn entity(&self, name: &str) -> Result<&Entity> {
        self.entities
            .get(name)
            .ok_or_else(|| PathGrabError::UnknownEntity {
                name: name.to_string(),
            })
    }

    pub fn entity_names(&self) -> Vec<&str> {
        self.entities.keys().map(String::as_str).collect()
    }

    pub fn files(&self) -> &[File] {
        &self.files
    }

    pub fn file(&self, path: &str) -> Option<&File> {
        self.by_path
            .get(&normalize_path(path))
            .map(|&i| &self.files[i])
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Warnings recorded while indexing (type mismatches, rejected files,
    /// directory mismatches).
    pub fn warnings(&self) -> &[IndexWarning] {
        &self.warnings
    }

    pub fn regex_search(&self) -> bool {
        self.regex_search
    }

    /// The configuration of this layout with resolved roots.
    pub fn config(&self) -> LayoutConfig {
        LayoutConfig {
            domains: self.domains.iter().map(Domain::to_config).collect(),
            regex_search: self.regex_search,
        }
    }

    pub fn config_hash(&self) -> String {
        hash_config(&self.config())
    }
}

fn check_domain_names(domains: &[&Domain]) -> Result<()> {
    let mut names = HashSet::new();
    for domain in domains {
        if !names.insert(domain.name()) {
            return Err(PathGrabError::Configuration(format!(
                "Domain '{}' is defined more than once",
                domain.name()
            )));
        }
    }
    Ok(())
}

/// First definition of each entity name wins; any later one must extract
/// identical values.
fn union_entities(domains: &[&Domain]) -> Result<BTreeMap<String, Entity>> {
    let mut entities: BTreeMap<String, Entity> = BTreeMap::new();
    for domain in domains {
        for entity in domain.entities() {
            match entities.get(entity.name()) {
                Some(first) => {
                    let changes = diff_entity(domain.name(), &first.to_config(), &entity.to_config());
                    if !is_compatible(&changes) {
                        let details: Vec<String> = changes
                            .iter()
                            .filter(|c| !c.is_compatible())
                            .map(|c| c.describe())
                            .collect();
                        return Err(PathGrabError::Configuration(format!(
                            "Entity '{}' is redefined incompatibly: {}",
                            entity.name(),
                            details.join("; ")
                        )));
                    }
                }
                None => {
                    entities.insert(entity.name().to_string(), entity.clone());
                }
            }
        }
    }
    Ok(entities)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::entity::Value;
    use crate::scanner::StaticScanner;
    use crate::schema::parse_domain_str;
    use pretty_assertions::assert_eq;

    pub(crate) fn domain(yaml: &str) -> Domain {
        Domain::new(&parse_domain_str(yaml).unwrap(), &MapperRegistry::with_builtins()).unwrap()
    }

    pub(crate) fn bids_domain() -> Domain {
        domain(
            r#"
name: bids
root: ds
entities:
  - { name: subject, pattern: "sub-(\\d+)", directory: "{{root}}/sub-{subject}" }
  - { name: session, pattern: "ses-(\\d+)", directory: "{{root}}/sub-{subject}/ses-{session}" }
  - { name: run, pattern: "run-0*(\\d+)", dtype: int }
  - { name: acquisition, pattern: "acq-([a-zA-Z0-9]+)" }
  - { name: type, pattern: "_([a-zA-Z0-9]+)\\.[^/]+$" }
default_path_patterns:
  - "sub-{subject}[/ses-{session}]/{type<bold|T1w>|bold}/sub-{subject}[_ses-{session}][_run-{run}]_{type}.nii.gz"
"#,
        )
    }

    pub(crate) fn bids_paths() -> Vec<&'static str> {
        vec![
            "ds/sub-10/ses-1/func/sub-10_ses-1_run-1_bold.nii.gz",
            "ds/sub-01/ses-1/anat/sub-01_ses-1_T1w.nii.gz",
            "ds/sub-01/ses-1/func/sub-01_ses-1_run-1_bold.nii.gz",
            "ds/sub-01/ses-1/func/sub-01_ses-1_run-2_bold.nii.gz",
            "ds/sub-01/ses-2/func/sub-01_ses-2_run-1_bold.nii.gz",
            "ds/sub-01/ses-2/fmap/sub-01_ses-2_acq-fast_magnitude1.nii.gz",
            "ds/sub-02/ses-1/func/sub-02_ses-1_run-1_bold.nii.gz",
            "ds/sub-02/ses-1/fmap/sub-02_ses-1_run-1_magnitude1.nii.gz",
            "ds/sub-02/ses-1/fmap/sub-02_ses-1_run-1_phasediff.json",
            "ds/sub-02/ses-1/sub-02_ses-1_scans.tsv",
            "ds/task-rest_bold.json",
            "ds/README",
        ]
    }

    pub(crate) fn bids_layout() -> Layout {
        Layout::builder()
            .domain(bids_domain(), StaticScanner::new(bids_paths()))
            .build()
            .unwrap()
    }

    #[test]
    fn test_files_sorted_naturally() {
        let layout = bids_layout();
        let paths: Vec<&str> = layout.files().iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths.len(), 11);
        assert_eq!(paths[0], "ds/sub-01/ses-1/anat/sub-01_ses-1_T1w.nii.gz");
        assert_eq!(paths[paths.len() - 2], "ds/sub-10/ses-1/func/sub-10_ses-1_run-1_bold.nii.gz");
        assert_eq!(paths[paths.len() - 1], "ds/task-rest_bold.json");
    }

    #[test]
    fn test_lookup_by_path() {
        let layout = bids_layout();
        let file = layout
            .file("ds/sub-02/ses-1/fmap/sub-02_ses-1_run-1_magnitude1.nii.gz")
            .unwrap();
        assert_eq!(file.get("run"), Some(&Value::Int(1)));
        assert!(layout.file("ds/README").is_none());
    }

    #[test]
    fn test_path_collision_across_domains() {
        let other = domain(
            r#"
name: other
root: ds
entities:
  - { name: subject, pattern: "sub-(\\d+)" }
"#,
        );
        let err = Layout::builder()
            .domain(bids_domain(), StaticScanner::new(["ds/sub-01/a_bold.nii"]))
            .domain(other, StaticScanner::new(["ds/sub-01/a_bold.nii"]))
            .build()
            .unwrap_err();
        assert!(matches!(err, PathGrabError::PathCollision { .. }));
    }

    #[test]
    fn test_incompatible_entity_redefinition() {
        let other = domain(
            r#"
name: derivatives
root: ds/derivatives
entities:
  - { name: subject, pattern: "sub-(\\d+)", dtype: int }
"#,
        );
        let err = Layout::builder()
            .domain(bids_domain(), StaticScanner::default())
            .domain(other, StaticScanner::default())
            .build()
            .unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("subject"));
    }

    #[test]
    fn test_merge_unions_entities() {
        let derivatives = domain(
            r#"
name: derivatives
root: ds/derivatives
entities:
  - { name: subject, pattern: "sub-(\\d+)", directory: "{{root}}/sub-{subject}" }
  - { name: space, pattern: "space-([a-zA-Z0-9]+)" }
"#,
        );
        let right = Layout::builder()
            .domain(
                derivatives,
                StaticScanner::new(["ds/derivatives/sub-01/sub-01_space-MNI_bold.nii.gz"]),
            )
            .build()
            .unwrap();
        let merged = bids_layout().merge(right).unwrap();
        assert_eq!(merged.domains().len(), 2);
        assert!(merged.entity("space").is_ok());
        assert_eq!(merged.len(), 12);

        let err = bids_layout().merge(bids_layout()).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_scan_failure_propagates() {
        struct Broken;
        impl Scanner for Broken {
            fn scan(&self, domain: &Domain) -> Result<Vec<String>> {
                Err(PathGrabError::ScanFailure {
                    domain: domain.name().to_string(),
                    message: "listing denied".into(),
                })
            }
        }
        let err = Layout::builder()
            .domain(bids_domain(), Broken)
            .build()
            .unwrap_err();
        match err {
            PathGrabError::ScanFailure { domain, message } => {
                assert_eq!(domain, "bids");
                assert_eq!(message, "listing denied");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
