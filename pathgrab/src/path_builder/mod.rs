//! Inverse path construction: entity values + template -> candidate paths.
//!
//! Every list-valued binding multiplies the candidate set (Cartesian
//! product); bracketed choices multiply it further. The final count is
//! validated against a [`Cardinality`] and a violation is always an error.

mod cardinality;
mod template;
mod writer;

pub use cardinality::Cardinality;
pub use template::{
    format_value, AlternationMode, FieldFormat, PathSegment, PathTemplate, Placeholder,
};
pub use writer::{write_contents_to_file, ConflictPolicy, Contents};

use crate::entity::{Entity, Value};
use crate::error::{PathGrabError, Result};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Value(s) bound to one entity placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    One(Value),
    Many(Vec<Value>),
}

impl Binding {
    pub fn values(&self) -> &[Value] {
        match self {
            Binding::One(v) => std::slice::from_ref(v),
            Binding::Many(vs) => vs,
        }
    }
}

macro_rules! impl_binding_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Binding {
                fn from(value: $ty) -> Self {
                    Binding::One(value.into())
                }
            }

            impl From<Vec<$ty>> for Binding {
                fn from(values: Vec<$ty>) -> Self {
                    Binding::Many(values.into_iter().map(Into::into).collect())
                }
            }
        )*
    };
}

impl_binding_from!(Value, &str, String, i64, i32, f64);

pub type Bindings = BTreeMap<String, Binding>;

/// Build a `Bindings` map from `(name, binding)` pairs.
pub fn bindings<I, K, B>(pairs: I) -> Bindings
where
    I: IntoIterator<Item = (K, B)>,
    K: Into<String>,
    B: Into<Binding>,
{
    pairs
        .into_iter()
        .map(|(k, b)| (k.into(), b.into()))
        .collect()
}

/// Builds output paths from entity values.
#[derive(Debug, Clone, Default)]
pub struct PathBuilder {
    entities: HashMap<String, Entity>,
    alternation: AlternationMode,
    strict: bool,
}

impl PathBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entity definitions used to coerce bound values to their dtype.
    pub fn with_entities<'a, I>(mut self, entities: I) -> Self
    where
        I: IntoIterator<Item = &'a Entity>,
    {
        for entity in entities {
            self.entities.insert(entity.name().to_string(), entity.clone());
        }
        self
    }

    pub fn alternation(mut self, mode: AlternationMode) -> Self {
        self.alternation = mode;
        self
    }

    /// In strict mode a pattern is only usable if it references every bound
    /// entity.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Build paths from a single pattern.
    pub fn build(&self, values: &Bindings, pattern: &str, cardinality: &str) -> Result<Vec<String>> {
        self.build_any(values, &[pattern], cardinality)
    }

    /// Build paths from the first pattern that yields at least one path.
    pub fn build_any<S: AsRef<str>>(
        &self,
        values: &Bindings,
        patterns: &[S],
        cardinality: &str,
    ) -> Result<Vec<String>> {
        let cardinality: Cardinality = cardinality.parse()?;
        let templates = patterns
            .iter()
            .map(|p| PathTemplate::parse(p.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        self.build_templates(values, &templates, &cardinality)
    }

    pub fn build_templates(
        &self,
        values: &Bindings,
        templates: &[PathTemplate],
        cardinality: &Cardinality,
    ) -> Result<Vec<String>> {
        if templates.is_empty() {
            return Err(PathGrabError::Configuration(
                "No path patterns given to build a path from".into(),
            ));
        }
        let values = self.coerce(values)?;

        let mut paths = Vec::new();
        for template in templates {
            paths = self.expand(&values, template);
            if !paths.is_empty() {
                log::debug!("Built {} path(s) from '{}'", paths.len(), template.raw);
                break;
            }
        }

        cardinality.check(paths.len())?;
        Ok(paths)
    }

    fn coerce(&self, values: &Bindings) -> Result<BTreeMap<String, Vec<Value>>> {
        let mut coerced = BTreeMap::new();
        for (name, binding) in values {
            let list = match self.entities.get(name) {
                Some(entity) => binding
                    .values()
                    .iter()
                    .map(|v| entity.coerce_value(v))
                    .collect::<Result<Vec<_>>>()?,
                None => binding.values().to_vec(),
            };
            coerced.insert(name.clone(), list);
        }
        Ok(coerced)
    }

    fn expand(&self, values: &BTreeMap<String, Vec<Value>>, template: &PathTemplate) -> Vec<String> {
        let referenced = template.placeholders();
        if self.strict && values.keys().any(|k| !referenced.contains(&k.as_str())) {
            return Vec::new();
        }

        let axes: Vec<(&str, &[Value])> = referenced
            .iter()
            .filter_map(|name| values.get(*name).map(|vs| (*name, vs.as_slice())))
            .collect();

        let mut seen = HashSet::new();
        let mut paths = Vec::new();
        for assignment in cartesian(&axes) {
            for path in template.render(&assignment, self.alternation) {
                if seen.insert(path.clone()) {
                    paths.push(path);
                }
            }
        }
        paths
    }
}

/// Every combination of one value per axis. An empty axis yields nothing.
fn cartesian(axes: &[(&str, &[Value])]) -> Vec<BTreeMap<String, Value>> {
    let mut combos = vec![BTreeMap::new()];
    for (name, values) in axes {
        let mut next = Vec::with_capacity(combos.len() * values.len());
        for combo in &combos {
            for value in values.iter() {
                let mut extended = combo.clone();
                extended.insert(name.to_string(), value.clone());
                next.push(extended);
            }
        }
        combos = next;
    }
    combos
}

/// Convenience wrapper: build paths without entity coercion.
pub fn build_path(values: &Bindings, pattern: &str, cardinality: &str) -> Result<Vec<String>> {
    PathBuilder::new().build(values, pattern, cardinality)
}
