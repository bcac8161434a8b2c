mod parser;
mod types;

pub use parser::{parse_config, parse_config_str, parse_domain_str};
pub use types::{DType, DomainConfig, EntityConfig, IndexRules, LayoutConfig};

/// Stable fingerprint of a configuration document, recorded in snapshots.
pub fn hash_config(config: &LayoutConfig) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    config.regex_search.hash(&mut hasher);
    for domain in &config.domains {
        domain.name.hash(&mut hasher);
        domain.root.hash(&mut hasher);
        for entity in &domain.entities {
            entity.name.hash(&mut hasher);
            entity.pattern.hash(&mut hasher);
            entity.mandatory.hash(&mut hasher);
            entity.directory.hash(&mut hasher);
            entity.dtype.hash(&mut hasher);
            entity.mapper.hash(&mut hasher);
        }
        domain.index.include.hash(&mut hasher);
        domain.index.exclude.hash(&mut hasher);
        domain.default_path_patterns.hash(&mut hasher);
    }
    format!("{:016x}", hasher.finish())
}
