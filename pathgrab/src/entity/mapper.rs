use crate::error::{PathGrabError, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// A pure function normalising a raw captured string. Returning `None`
/// leaves the file without a value for the entity.
pub type Mapper = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Registry of value mappers referenced by name from configuration.
/// Populated by the host application before any Layout is built.
#[derive(Clone, Default)]
pub struct MapperRegistry {
    mappers: HashMap<String, Mapper>,
}

impl MapperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-populated with the built-in mappers:
    /// `lowercase`, `uppercase`, `strip_label` and `trim_zeros`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("lowercase", |s| Some(s.to_lowercase()));
        registry.register("uppercase", |s| Some(s.to_uppercase()));
        registry.register("strip_label", |s| {
            Some(s.split_once('-').map(|(_, rest)| rest).unwrap_or(s).to_string())
        });
        registry.register("trim_zeros", |s| {
            if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
                return Some(s.to_string());
            }
            let trimmed = s.trim_start_matches('0');
            Some(if trimmed.is_empty() { "0" } else { trimmed }.to_string())
        });
        registry
    }

    pub fn register<F>(&mut self, name: &str, mapper: F) -> &mut Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.mappers.insert(name.to_string(), Arc::new(mapper));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.mappers.contains_key(name)
    }

    /// Resolve a mapper by name; unregistered names are configuration errors.
    pub fn resolve(&self, name: &str) -> Result<Mapper> {
        self.mappers.get(name).cloned().ok_or_else(|| {
            PathGrabError::Configuration(format!("Value mapper '{name}' is not registered"))
        })
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.mappers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for MapperRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapperRegistry")
            .field("mappers", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins() {
        let registry = MapperRegistry::with_builtins();
        let strip = registry.resolve("strip_label").unwrap();
        assert_eq!(strip("sub-02").as_deref(), Some("02"));
        assert_eq!(strip("02").as_deref(), Some("02"));

        let trim = registry.resolve("trim_zeros").unwrap();
        assert_eq!(trim("007").as_deref(), Some("7"));
        assert_eq!(trim("000").as_deref(), Some("0"));
        assert_eq!(trim("a07").as_deref(), Some("a07"));
    }

    #[test]
    fn test_unregistered_is_configuration_error() {
        let registry = MapperRegistry::new();
        let err = registry.resolve("missing").err().unwrap();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_custom_mapper() {
        let mut registry = MapperRegistry::new();
        registry.register("bold_only", |s| s.contains("bold").then(|| "bold".to_string()));
        let mapper = registry.resolve("bold_only").unwrap();
        assert_eq!(mapper("x_bold.nii").as_deref(), Some("bold"));
        assert_eq!(mapper("x_T1w.nii"), None);
        assert_eq!(registry.names(), vec!["bold_only"]);
    }
}
