// Entity model: a named path pattern with an optional value mapper and dtype

mod mapper;
mod value;

pub use mapper::{Mapper, MapperRegistry};
pub use value::Value;

use crate::error::{PathGrabError, Result};
use crate::schema::{DType, EntityConfig};
use regex::Regex;

/// A compiled entity definition.
#[derive(Clone)]
pub struct Entity {
    name: String,
    pattern: Option<Regex>,
    mandatory: bool,
    directory: Option<String>,
    dtype: DType,
    mapper_name: Option<String>,
    mapper: Option<Mapper>,
}

impl Entity {
    /// Compile an entity from its configuration, resolving the mapper by name.
    pub fn from_config(config: &EntityConfig, registry: &MapperRegistry) -> Result<Self> {
        if config.name.trim().is_empty() {
            return Err(PathGrabError::Configuration(
                "Entity name must not be empty".into(),
            ));
        }
        if config.pattern.is_none() && config.mapper.is_none() {
            return Err(PathGrabError::Configuration(format!(
                "Entity '{}' defines neither a pattern nor a mapper",
                config.name
            )));
        }

        let pattern = match &config.pattern {
            Some(p) => Some(Regex::new(p).map_err(|e| {
                PathGrabError::Configuration(format!(
                    "Entity '{}' has an invalid pattern: {e}",
                    config.name
                ))
            })?),
            None => None,
        };
        let mapper = match &config.mapper {
            Some(name) => Some(registry.resolve(name)?),
            None => None,
        };

        Ok(Entity {
            name: config.name.clone(),
            pattern,
            mandatory: config.mandatory,
            directory: config.directory.clone(),
            dtype: config.dtype,
            mapper_name: config.mapper.clone(),
            mapper,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_ref().map(Regex::as_str)
    }

    pub fn mandatory(&self) -> bool {
        self.mandatory
    }

    /// The raw directory template, still containing `{{root}}`.
    pub fn directory(&self) -> Option<&str> {
        self.directory.as_deref()
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn mapper_name(&self) -> Option<&str> {
        self.mapper_name.as_deref()
    }

    pub fn to_config(&self) -> EntityConfig {
        EntityConfig {
            name: self.name.clone(),
            pattern: self.pattern().map(str::to_string),
            mandatory: self.mandatory,
            directory: self.directory.clone(),
            dtype: self.dtype,
            mapper: self.mapper_name.clone(),
        }
    }

    /// Extract the raw string value from a path: the first capture group if
    /// the pattern has one, else the whole match, then the mapper if any.
    /// Without a pattern the mapper receives the whole path.
    pub fn extract_raw(&self, path: &str) -> Option<String> {
        let raw = match &self.pattern {
            Some(regex) => {
                let caps = regex.captures(path)?;
                let m = if regex.captures_len() > 1 {
                    caps.get(1)?
                } else {
                    caps.get(0)?
                };
                m.as_str().to_string()
            }
            None => path.to_string(),
        };

        match &self.mapper {
            Some(mapper) => mapper(&raw),
            None => Some(raw),
        }
    }

    /// Extract and coerce the entity's value for `path`.
    ///
    /// `Ok(None)` means the path does not carry this entity; a captured value
    /// that cannot be coerced to the dtype is a `TypeMismatch`.
    pub fn extract(&self, path: &str) -> Result<Option<Value>> {
        let Some(raw) = self.extract_raw(path) else {
            return Ok(None);
        };
        self.coerce(&raw).map(Some)
    }

    /// Coerce a raw string to this entity's dtype.
    pub fn coerce(&self, raw: &str) -> Result<Value> {
        Value::parse(raw, self.dtype).ok_or_else(|| PathGrabError::TypeMismatch {
            entity: self.name.clone(),
            value: raw.to_string(),
            dtype: self.dtype.to_string(),
        })
    }

    /// Re-express an already typed value under this entity's dtype.
    pub fn coerce_value(&self, value: &Value) -> Result<Value> {
        value
            .coerce(self.dtype)
            .ok_or_else(|| PathGrabError::TypeMismatch {
                entity: self.name.clone(),
                value: value.to_string(),
                dtype: self.dtype.to_string(),
            })
    }

    /// Whether two definitions of the same name extract identical values.
    pub fn is_compatible(&self, other: &Entity) -> bool {
        self.name == other.name
            && self.pattern() == other.pattern()
            && self.dtype == other.dtype
            && self.mapper_name == other.mapper_name
    }
}

impl std::fmt::Debug for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entity")
            .field("name", &self.name)
            .field("pattern", &self.pattern())
            .field("mandatory", &self.mandatory)
            .field("directory", &self.directory)
            .field("dtype", &self.dtype)
            .field("mapper", &self.mapper_name)
            .finish()
    }
}
