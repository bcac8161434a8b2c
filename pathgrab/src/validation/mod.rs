use crate::entity::MapperRegistry;
use crate::error::{PathGrabError, Result};
use crate::path_builder::PathTemplate;
use crate::schema::{DomainConfig, EntityConfig, LayoutConfig};
use regex::Regex;
use std::collections::{HashMap, HashSet};

/// Names taken by the fixed columns of exported records.
const RESERVED_NAMES: &[&str] = &["path"];

/// Result of validating a configuration
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// Turn collected errors into a single configuration error.
    pub fn into_result(self) -> Result<Vec<String>> {
        if self.errors.is_empty() {
            Ok(self.warnings)
        } else {
            Err(PathGrabError::Configuration(self.errors.join("; ")))
        }
    }
}

/// Validate a single domain's entity definitions and filters.
pub fn validate_domain_config(config: &DomainConfig, registry: &MapperRegistry) -> ValidationResult {
    let mut result = ValidationResult::default();
    let domain = &config.name;

    if domain.trim().is_empty() {
        result.errors.push("Domain name must not be empty".into());
    }

    let mut seen = HashSet::new();
    for entity in &config.entities {
        if !seen.insert(entity.name.as_str()) {
            result.errors.push(format!(
                "Domain '{domain}' defines entity '{}' more than once",
                entity.name
            ));
        }
        validate_entity(domain, entity, registry, &mut result);
    }

    for entity in &config.entities {
        if let Some(directory) = &entity.directory {
            let stripped = directory.replace("{{root}}", "");
            match PathTemplate::parse(&stripped) {
                Ok(template) => {
                    for name in template.placeholders() {
                        if !seen.contains(name) {
                            result.errors.push(format!(
                                "Directory template of '{}' in domain '{domain}' references unknown entity '{name}'",
                                entity.name
                            ));
                        }
                    }
                }
                Err(e) => result.errors.push(e.to_string()),
            }
        }
    }

    for (kind, rules) in [("include", &config.index.include), ("exclude", &config.index.exclude)] {
        for rule in rules {
            if let Err(e) = Regex::new(rule) {
                result.errors.push(format!(
                    "Invalid {kind} rule '{rule}' in domain '{domain}': {e}"
                ));
            }
        }
    }

    for pattern in &config.default_path_patterns {
        if let Err(e) = PathTemplate::parse(pattern) {
            result.errors.push(e.to_string());
        }
    }

    result
}

fn validate_entity(
    domain: &str,
    entity: &EntityConfig,
    registry: &MapperRegistry,
    result: &mut ValidationResult,
) {
    let name = &entity.name;
    if name.trim().is_empty() {
        result
            .errors
            .push(format!("Domain '{domain}' has an entity with an empty name"));
    }
    if RESERVED_NAMES.contains(&name.as_str()) {
        result.errors.push(format!(
            "Entity name '{name}' in domain '{domain}' is reserved for the file path"
        ));
    }

    match (&entity.pattern, &entity.mapper) {
        (None, None) => result.errors.push(format!(
            "Entity '{name}' in domain '{domain}' defines neither a pattern nor a mapper"
        )),
        (Some(pattern), _) => match Regex::new(pattern) {
            Ok(regex) => {
                if regex.captures_len() > 2 {
                    result.warnings.push(format!(
                        "Entity '{name}' pattern has {} capture groups; only the first is kept",
                        regex.captures_len() - 1
                    ));
                }
            }
            Err(e) => result
                .errors
                .push(format!("Entity '{name}' has an invalid pattern: {e}")),
        },
        (None, Some(_)) => {}
    }

    if let Some(mapper) = &entity.mapper {
        if !registry.contains(mapper) {
            result.errors.push(format!(
                "Entity '{name}' uses value mapper '{mapper}', which is not registered"
            ));
        }
    }
}

/// Validate a whole layout configuration: every domain, unique domain names,
/// and compatible redefinitions of shared entity names.
pub fn validate_layout_config(config: &LayoutConfig, registry: &MapperRegistry) -> ValidationResult {
    let mut result = ValidationResult::default();
    let mut names = HashSet::new();
    let mut definitions: HashMap<&str, (&str, &EntityConfig)> = HashMap::new();

    for domain in &config.domains {
        if !names.insert(domain.name.as_str()) {
            result
                .errors
                .push(format!("Domain '{}' is defined more than once", domain.name));
        }
        result.merge(validate_domain_config(domain, registry));

        for entity in &domain.entities {
            match definitions.get(entity.name.as_str()) {
                Some((first_domain, first)) => {
                    if first.pattern != entity.pattern
                        || first.dtype != entity.dtype
                        || first.mapper != entity.mapper
                    {
                        result.errors.push(format!(
                            "Entity '{}' is redefined incompatibly by domain '{}' (first defined by '{}')",
                            entity.name, domain.name, first_domain
                        ));
                    }
                }
                None => {
                    definitions.insert(&entity.name, (&domain.name, entity));
                }
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{parse_config_str, DType};

    fn test_config() -> LayoutConfig {
        parse_config_str(
            r#"
domains:
  - name: raw
    root: data
    entities:
      - { name: subject, pattern: "sub-(\\d+)", directory: "{{root}}/sub-{subject}" }
      - { name: session, pattern: "ses-(\\d+)", directory: "{{root}}/sub-{subject}/ses-{session}" }
      - { name: type, pattern: ".*_(.*?)\\.", mapper: lowercase }
    index:
      exclude: ["derivatives/"]
  - name: derivatives
    root: data/derivatives
    entities:
      - { name: subject, pattern: "sub-(\\d+)" }
      - { name: space, pattern: "space-([a-zA-Z0-9]+)" }
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_valid_config() {
        let result = validate_layout_config(&test_config(), &MapperRegistry::with_builtins());
        assert!(result.is_ok(), "Errors: {:?}", result.errors);
        assert!(!result.has_warnings());
    }

    #[test]
    fn test_duplicate_entity() {
        let mut config = test_config();
        let dup = config.domains[0].entities[0].clone();
        config.domains[0].entities.push(dup);
        let result = validate_domain_config(&config.domains[0], &MapperRegistry::with_builtins());
        assert!(!result.is_ok());
        assert!(result.errors.iter().any(|e| e.contains("more than once")));
    }

    #[test]
    fn test_path_is_a_reserved_entity_name() {
        let mut config = test_config();
        config.domains[0]
            .entities
            .push(EntityConfig::new("path", "(.*)"));
        let result = validate_domain_config(&config.domains[0], &MapperRegistry::with_builtins());
        assert!(result.errors.iter().any(|e| e.contains("reserved")));

        let err = crate::domain::Domain::new(&config.domains[0], &MapperRegistry::with_builtins())
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_unregistered_mapper() {
        let result = validate_layout_config(&test_config(), &MapperRegistry::new());
        assert!(result.errors.iter().any(|e| e.contains("lowercase")));
    }

    #[test]
    fn test_directory_template_unknown_entity() {
        let mut config = test_config();
        config.domains[0].entities[0].directory = Some("{{root}}/sub-{participant}".into());
        let result = validate_domain_config(&config.domains[0], &MapperRegistry::with_builtins());
        assert!(result.errors.iter().any(|e| e.contains("participant")));
    }

    #[test]
    fn test_incompatible_redefinition_across_domains() {
        let mut config = test_config();
        config.domains[1].entities[0].dtype = DType::Int;
        let result = validate_layout_config(&config, &MapperRegistry::with_builtins());
        assert!(result.errors.iter().any(|e| e.contains("incompatibly")));
    }

    #[test]
    fn test_extra_capture_groups_warn() {
        let mut config = test_config();
        config.domains[1].entities[1].pattern = Some("(space)-(\\w+)".into());
        let result = validate_layout_config(&config, &MapperRegistry::with_builtins());
        assert!(result.is_ok());
        assert!(result.has_warnings());
    }

    #[test]
    fn test_invalid_filter_and_into_result() {
        let mut config = test_config();
        config.domains[0].index.include.push("(".into());
        let err = validate_layout_config(&config, &MapperRegistry::with_builtins())
            .into_result()
            .unwrap_err();
        assert!(err.is_configuration());
    }
}
