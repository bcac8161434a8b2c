use crate::entity::{Entity, MapperRegistry, Value};
use crate::error::{PathGrabError, Result};
use crate::path_builder::PathTemplate;
use crate::schema::{DomainConfig, IndexRules};
use crate::util::{normalize_path, relative_to};
use crate::validation::validate_domain_config;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};

/// A named, rooted collection of entities plus include/exclude rules.
///
/// The root is resolved once at creation and never changes afterwards.
#[derive(Debug, Clone)]
pub struct Domain {
    name: String,
    root: String,
    entities: Vec<Entity>,
    rules: IndexRules,
    include: Vec<Regex>,
    exclude: Vec<Regex>,
    directories: HashMap<String, PathTemplate>,
    default_path_patterns: Vec<String>,
}

impl Domain {
    pub fn new(config: &DomainConfig, registry: &MapperRegistry) -> Result<Self> {
        let warnings = validate_domain_config(config, registry).into_result()?;
        for warning in &warnings {
            log::warn!("{warning}");
        }

        let root = resolve_root(&config.root, config.absolute_paths)?;

        let entities = config
            .entities
            .iter()
            .map(|e| Entity::from_config(e, registry))
            .collect::<Result<Vec<_>>>()?;

        let include = compile_rules(&config.index.include)?;
        let exclude = compile_rules(&config.index.exclude)?;

        // Roots may contain braces; escape them before templating
        let escaped_root = root.replace('{', "{{").replace('}', "}}");
        let mut directories = HashMap::new();
        for entity in &entities {
            if let Some(template) = entity.directory() {
                let resolved = template.replace("{{root}}", &escaped_root);
                directories.insert(entity.name().to_string(), PathTemplate::parse(&resolved)?);
            }
        }

        Ok(Domain {
            name: config.name.clone(),
            root,
            entities,
            rules: config.index.clone(),
            include,
            exclude,
            directories,
            default_path_patterns: config.default_path_patterns.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.name() == name)
    }

    pub fn rules(&self) -> &IndexRules {
        &self.rules
    }

    pub fn default_path_patterns(&self) -> &[String] {
        &self.default_path_patterns
    }

    /// Include/exclude filter. Rules are searched against the path relative
    /// to the root. A path is dropped if any exclude rule matches, or if
    /// include rules exist and none matches.
    pub fn accepts(&self, path: &str) -> bool {
        let rel = relative_to(path, &self.root);
        if self.exclude.iter().any(|r| r.is_match(rel)) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|r| r.is_match(rel))
    }

    /// The entity's directory template with `{{root}}` substituted.
    pub fn directory_template(&self, entity: &str) -> Option<&PathTemplate> {
        self.directories.get(entity)
    }

    /// Render an entity's canonical directory from a file's values.
    pub fn render_directory(&self, entity: &str, values: &BTreeMap<String, Value>) -> Option<String> {
        self.directory_template(entity)?
            .render_first(values)
            .map(|d| normalize_path(&d))
    }

    /// The configuration this domain was built from, with the resolved root.
    pub fn to_config(&self) -> DomainConfig {
        DomainConfig {
            name: self.name.clone(),
            root: self.root.clone(),
            absolute_paths: false,
            entities: self.entities.iter().map(Entity::to_config).collect(),
            index: self.rules.clone(),
            default_path_patterns: self.default_path_patterns.clone(),
        }
    }
}

fn compile_rules(rules: &[String]) -> Result<Vec<Regex>> {
    rules
        .iter()
        .map(|r| {
            Regex::new(r).map_err(|e| {
                PathGrabError::Configuration(format!("Invalid index rule '{r}': {e}"))
            })
        })
        .collect()
}

fn resolve_root(root: &str, absolute: bool) -> Result<String> {
    let root = if root.is_empty() { "." } else { root };
    let path = std::path::Path::new(root);
    if absolute && path.is_relative() {
        let cwd = std::env::current_dir()?;
        let joined = cwd.join(path);
        let text = joined.to_string_lossy();
        let text = text.strip_suffix("/.").unwrap_or(&*text);
        return Ok(normalize_path(text));
    }
    Ok(normalize_path(root))
}
