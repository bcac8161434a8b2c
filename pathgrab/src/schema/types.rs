use serde::{Deserialize, Serialize};

/// Top-level configuration document: one or more domains merged into a
/// single Layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LayoutConfig {
    #[serde(default)]
    pub domains: Vec<DomainConfig>,
    /// Default for `get()` string constraints: `false` compares them as
    /// full-match patterns, `true` as regex searches.
    #[serde(default)]
    pub regex_search: bool,
}

/// Definition of a single rooted domain
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DomainConfig {
    pub name: String,
    pub root: String,
    #[serde(default)]
    pub absolute_paths: bool,
    #[serde(default)]
    pub entities: Vec<EntityConfig>,
    #[serde(default)]
    pub index: IndexRules,
    #[serde(default)]
    pub default_path_patterns: Vec<String>,
}

/// Include/exclude path filters applied before entity matching
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IndexRules {
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl IndexRules {
    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }
}

/// Definition of a single entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntityConfig {
    pub name: String,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub mandatory: bool,
    #[serde(default, alias = "directory_template")]
    pub directory: Option<String>,
    #[serde(default)]
    pub dtype: DType,
    #[serde(default, alias = "value_mapper", alias = "map_func")]
    pub mapper: Option<String>,
}

impl EntityConfig {
    pub fn new(name: &str, pattern: &str) -> Self {
        EntityConfig {
            name: name.to_string(),
            pattern: Some(pattern.to_string()),
            mandatory: false,
            directory: None,
            dtype: DType::Str,
            mapper: None,
        }
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    pub fn with_directory(mut self, directory: &str) -> Self {
        self.directory = Some(directory.to_string());
        self
    }

    pub fn with_dtype(mut self, dtype: DType) -> Self {
        self.dtype = dtype;
        self
    }

    pub fn with_mapper(mut self, mapper: &str) -> Self {
        self.mapper = Some(mapper.to_string());
        self
    }
}

/// Semantic type of an entity's values
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DType {
    #[default]
    #[serde(alias = "string")]
    Str,
    #[serde(alias = "integer")]
    Int,
    Float,
}

impl DType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DType::Str => "str",
            DType::Int => "int",
            DType::Float => "float",
        }
    }
}

impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
