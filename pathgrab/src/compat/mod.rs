use crate::schema::{DomainConfig, EntityConfig, LayoutConfig};
use std::collections::BTreeMap;

/// A single difference between two configurations of the same layout.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigChange {
    DomainAdded { name: String },
    DomainRemoved { name: String },
    RootChanged {
        domain: String,
        old_root: String,
        new_root: String,
    },
    EntityAdded { domain: String, entity: String },
    EntityRemoved { domain: String, entity: String },
    PatternChanged {
        domain: String,
        entity: String,
        old_pattern: Option<String>,
        new_pattern: Option<String>,
    },
    DtypeChanged {
        domain: String,
        entity: String,
        old_dtype: String,
        new_dtype: String,
    },
    MapperChanged {
        domain: String,
        entity: String,
        old_mapper: Option<String>,
        new_mapper: Option<String>,
    },
    MandatoryChanged { domain: String, entity: String },
    DirectoryChanged { domain: String, entity: String },
    RulesChanged { domain: String },
    DefaultPatternsChanged { domain: String },
    RegexSearchChanged { old: bool, new: bool },
}

impl ConfigChange {
    /// Whether values indexed under the old configuration are still what the
    /// new one would extract. Changes to pattern, dtype or mapper are not.
    pub fn is_compatible(&self) -> bool {
        !matches!(
            self,
            ConfigChange::PatternChanged { .. }
                | ConfigChange::DtypeChanged { .. }
                | ConfigChange::MapperChanged { .. }
        )
    }

    pub fn describe(&self) -> String {
        fn opt(v: &Option<String>) -> &str {
            v.as_deref().unwrap_or("none")
        }
        match self {
            ConfigChange::DomainAdded { name } => format!("Domain '{name}' added"),
            ConfigChange::DomainRemoved { name } => format!("Domain '{name}' removed"),
            ConfigChange::RootChanged {
                domain,
                old_root,
                new_root,
            } => format!("Root of '{domain}' changed: '{old_root}' -> '{new_root}'"),
            ConfigChange::EntityAdded { domain, entity } => {
                format!("Entity '{domain}.{entity}' added")
            }
            ConfigChange::EntityRemoved { domain, entity } => {
                format!("Entity '{domain}.{entity}' removed")
            }
            ConfigChange::PatternChanged {
                domain,
                entity,
                old_pattern,
                new_pattern,
            } => format!(
                "Pattern of '{domain}.{entity}' changed: '{}' -> '{}' (ERROR)",
                opt(old_pattern),
                opt(new_pattern)
            ),
            ConfigChange::DtypeChanged {
                domain,
                entity,
                old_dtype,
                new_dtype,
            } => format!("Dtype of '{domain}.{entity}' changed: {old_dtype} -> {new_dtype} (ERROR)"),
            ConfigChange::MapperChanged {
                domain,
                entity,
                old_mapper,
                new_mapper,
            } => format!(
                "Mapper of '{domain}.{entity}' changed: {} -> {} (ERROR)",
                opt(old_mapper),
                opt(new_mapper)
            ),
            ConfigChange::MandatoryChanged { domain, entity } => {
                format!("Mandatory flag of '{domain}.{entity}' changed")
            }
            ConfigChange::DirectoryChanged { domain, entity } => {
                format!("Directory template of '{domain}.{entity}' changed")
            }
            ConfigChange::RulesChanged { domain } => {
                format!("Include/exclude rules of '{domain}' changed")
            }
            ConfigChange::DefaultPatternsChanged { domain } => {
                format!("Default path patterns of '{domain}' changed")
            }
            ConfigChange::RegexSearchChanged { old, new } => {
                format!("regex_search changed: {old} -> {new}")
            }
        }
    }
}

impl std::fmt::Display for ConfigChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Compare two entity definitions of the same name.
pub fn diff_entity(domain: &str, old: &EntityConfig, new: &EntityConfig) -> Vec<ConfigChange> {
    let mut changes = Vec::new();
    let domain = domain.to_string();
    let entity = new.name.clone();

    if old.pattern != new.pattern {
        changes.push(ConfigChange::PatternChanged {
            domain: domain.clone(),
            entity: entity.clone(),
            old_pattern: old.pattern.clone(),
            new_pattern: new.pattern.clone(),
        });
    }
    if old.dtype != new.dtype {
        changes.push(ConfigChange::DtypeChanged {
            domain: domain.clone(),
            entity: entity.clone(),
            old_dtype: old.dtype.to_string(),
            new_dtype: new.dtype.to_string(),
        });
    }
    if old.mapper != new.mapper {
        changes.push(ConfigChange::MapperChanged {
            domain: domain.clone(),
            entity: entity.clone(),
            old_mapper: old.mapper.clone(),
            new_mapper: new.mapper.clone(),
        });
    }
    if old.mandatory != new.mandatory {
        changes.push(ConfigChange::MandatoryChanged {
            domain: domain.clone(),
            entity: entity.clone(),
        });
    }
    if old.directory != new.directory {
        changes.push(ConfigChange::DirectoryChanged { domain, entity });
    }
    changes
}

pub fn diff_domains(old: &DomainConfig, new: &DomainConfig) -> Vec<ConfigChange> {
    let mut changes = Vec::new();
    let domain = &new.name;

    if old.root != new.root {
        changes.push(ConfigChange::RootChanged {
            domain: domain.clone(),
            old_root: old.root.clone(),
            new_root: new.root.clone(),
        });
    }
    if old.index != new.index {
        changes.push(ConfigChange::RulesChanged {
            domain: domain.clone(),
        });
    }
    if old.default_path_patterns != new.default_path_patterns {
        changes.push(ConfigChange::DefaultPatternsChanged {
            domain: domain.clone(),
        });
    }

    let old_entities: BTreeMap<&str, &EntityConfig> =
        old.entities.iter().map(|e| (e.name.as_str(), e)).collect();
    let new_entities: BTreeMap<&str, &EntityConfig> =
        new.entities.iter().map(|e| (e.name.as_str(), e)).collect();

    for (name, entity) in &new_entities {
        match old_entities.get(name) {
            Some(previous) => changes.extend(diff_entity(domain, previous, entity)),
            None => changes.push(ConfigChange::EntityAdded {
                domain: domain.clone(),
                entity: name.to_string(),
            }),
        }
    }
    for name in old_entities.keys() {
        if !new_entities.contains_key(name) {
            changes.push(ConfigChange::EntityRemoved {
                domain: domain.clone(),
                entity: name.to_string(),
            });
        }
    }
    changes
}

/// Compare two layout configurations domain by domain.
pub fn diff_configs(old: &LayoutConfig, new: &LayoutConfig) -> Vec<ConfigChange> {
    let old_domains: BTreeMap<&str, &DomainConfig> =
        old.domains.iter().map(|d| (d.name.as_str(), d)).collect();
    let new_domains: BTreeMap<&str, &DomainConfig> =
        new.domains.iter().map(|d| (d.name.as_str(), d)).collect();

    let mut changes = Vec::new();
    if old.regex_search != new.regex_search {
        changes.push(ConfigChange::RegexSearchChanged {
            old: old.regex_search,
            new: new.regex_search,
        });
    }
    for (name, domain) in &new_domains {
        match old_domains.get(name) {
            Some(previous) => changes.extend(diff_domains(previous, domain)),
            None => changes.push(ConfigChange::DomainAdded {
                name: name.to_string(),
            }),
        }
    }
    for name in old_domains.keys() {
        if !new_domains.contains_key(name) {
            changes.push(ConfigChange::DomainRemoved {
                name: name.to_string(),
            });
        }
    }
    changes
}

pub fn is_compatible(changes: &[ConfigChange]) -> bool {
    changes.iter().all(ConfigChange::is_compatible)
}
