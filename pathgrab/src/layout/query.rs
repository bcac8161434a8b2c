use super::Layout;
use crate::entity::Value;
use crate::error::{PathGrabError, Result};
use crate::file::{File, Record};
use crate::util::{is_within, natural_sort};
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

/// A constraint on one entity's value.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// Literal value. String literals follow the layout's `regex_search`
    /// mode; numeric literals tolerate leading zeros in stored strings.
    Value(Value),
    /// Any of the nested constraints.
    AnyOf(Vec<Constraint>),
    /// Regular expression, searched unless `strict` anchors it.
    Pattern { pattern: String, strict: bool },
    /// The entity must not be present.
    Absent,
    /// The entity must be present, with any value.
    Present,
}

impl Constraint {
    pub fn pattern(pattern: &str) -> Self {
        Constraint::Pattern {
            pattern: pattern.to_string(),
            strict: false,
        }
    }

    pub fn strict_pattern(pattern: &str) -> Self {
        Constraint::Pattern {
            pattern: pattern.to_string(),
            strict: true,
        }
    }

    pub fn any_of<I, C>(items: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Constraint>,
    {
        Constraint::AnyOf(items.into_iter().map(Into::into).collect())
    }
}

macro_rules! impl_constraint_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Constraint {
                fn from(value: $ty) -> Self {
                    Constraint::Value(value.into())
                }
            }

            impl From<Vec<$ty>> for Constraint {
                fn from(values: Vec<$ty>) -> Self {
                    Constraint::any_of(values)
                }
            }
        )*
    };
}

impl_constraint_from!(Value, &str, String, i64, i32, f64);

/// Shape of a `get()` result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnType {
    /// Full entity-value record per file
    #[default]
    Tuple,
    /// File paths
    Path,
    /// Canonical directories of the target entity
    Dir,
    /// Distinct values of the target entity
    Id,
    /// References to the indexed file records
    Obj,
}

impl FromStr for ReturnType {
    type Err = PathGrabError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "tuple" => Ok(ReturnType::Tuple),
            "path" | "file" => Ok(ReturnType::Path),
            "dir" => Ok(ReturnType::Dir),
            "id" => Ok(ReturnType::Id),
            "obj" | "object" => Ok(ReturnType::Obj),
            other => Err(PathGrabError::Configuration(format!(
                "Unknown return type '{other}'"
            ))),
        }
    }
}

/// Query against a Layout. Omitted entities are unconstrained.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: BTreeMap<String, Constraint>,
    pub target: Option<String>,
    pub return_type: ReturnType,
    pub extensions: Vec<String>,
    pub regex_search: Option<bool>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, entity: &str, constraint: impl Into<Constraint>) -> Self {
        self.filters.insert(entity.to_string(), constraint.into());
        self
    }

    pub fn target(mut self, entity: &str) -> Self {
        self.target = Some(entity.to_string());
        self
    }

    pub fn return_type(mut self, return_type: ReturnType) -> Self {
        self.return_type = return_type;
        self
    }

    pub fn extension(mut self, extension: &str) -> Self {
        self.extensions.push(extension.to_string());
        self
    }

    pub fn regex_search(mut self, regex_search: bool) -> Self {
        self.regex_search = Some(regex_search);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryResult<'a> {
    Records(Vec<Record>),
    Paths(Vec<String>),
    Values(Vec<Value>),
    Files(Vec<&'a File>),
}

impl<'a> QueryResult<'a> {
    pub fn len(&self) -> usize {
        match self {
            QueryResult::Records(v) => v.len(),
            QueryResult::Paths(v) => v.len(),
            QueryResult::Values(v) => v.len(),
            QueryResult::Files(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flatten to strings: file paths, directories or stringified values.
    pub fn into_paths(self) -> Vec<String> {
        match self {
            QueryResult::Records(v) => v.into_iter().map(|r| r.path).collect(),
            QueryResult::Paths(v) => v,
            QueryResult::Values(v) => v.iter().map(Value::to_string).collect(),
            QueryResult::Files(v) => v.into_iter().map(|f| f.path.clone()).collect(),
        }
    }

    /// The values of an `Id` query; empty for other shapes.
    pub fn into_values(self) -> Vec<Value> {
        match self {
            QueryResult::Values(v) => v,
            _ => Vec::new(),
        }
    }
}

/// Tabular view of query results: `path` first, then one column per entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<Value>>>,
}

enum Matcher {
    Literal { value: Value, regex: Option<Regex> },
    AnyOf(Vec<Matcher>),
    Regex(Regex),
    Absent,
    Present,
}

impl Matcher {
    fn compile(constraint: &Constraint, regex_search: bool) -> Result<Matcher> {
        Ok(match constraint {
            Constraint::Value(value) => {
                let regex = match value {
                    Value::Str(s) if regex_search => Regex::new(s).ok(),
                    Value::Str(s) => Regex::new(&format!("^(?:{s})$")).ok(),
                    _ => None,
                };
                Matcher::Literal {
                    value: value.clone(),
                    regex,
                }
            }
            Constraint::AnyOf(items) => Matcher::AnyOf(
                items
                    .iter()
                    .map(|c| Matcher::compile(c, regex_search))
                    .collect::<Result<Vec<_>>>()?,
            ),
            Constraint::Pattern { pattern, strict } => {
                let pattern = if *strict {
                    format!("^(?:{pattern})$")
                } else {
                    pattern.clone()
                };
                Matcher::Regex(Regex::new(&pattern)?)
            }
            Constraint::Absent => Matcher::Absent,
            Constraint::Present => Matcher::Present,
        })
    }

    fn matches(&self, value: Option<&Value>) -> bool {
        match (self, value) {
            (Matcher::Absent, v) => v.is_none(),
            (Matcher::Present, v) => v.is_some(),
            (Matcher::AnyOf(items), v) => items.iter().any(|m| m.matches(v)),
            (_, None) => false,
            (Matcher::Literal { value, regex }, Some(stored)) => {
                stored.matches_literal(value)
                    || regex
                        .as_ref()
                        .map_or(false, |r| r.is_match(&stored.to_string()))
            }
            (Matcher::Regex(regex), Some(stored)) => regex.is_match(&stored.to_string()),
        }
    }
}

impl Layout {
    fn compile(&self, query: &Query) -> Result<Vec<(String, Matcher)>> {
        if let Some(target) = &query.target {
            self.entity(target)?;
        }
        let regex_search = query.regex_search.unwrap_or(self.regex_search);
        query
            .filters
            .iter()
            .map(|(name, constraint)| {
                self.entity(name)?;
                Ok((name.clone(), Matcher::compile(constraint, regex_search)?))
            })
            .collect()
    }

    /// Files satisfying every filter and the extension list, and carrying
    /// the target entity when one is set. Natural path order.
    pub fn select(&self, query: &Query) -> Result<Vec<&File>> {
        let matchers = self.compile(query)?;
        Ok(self
            .files
            .iter()
            .filter(|f| f.has_extension(&query.extensions))
            .filter(|f| query.target.as_deref().map_or(true, |t| f.has(t)))
            .filter(|f| matchers.iter().all(|(name, m)| m.matches(f.get(name))))
            .collect())
    }

    /// Run a query. Adding a filter never grows the result.
    pub fn get(&self, query: &Query) -> Result<QueryResult<'_>> {
        let files = self.select(query)?;
        match query.return_type {
            ReturnType::Tuple => Ok(QueryResult::Records(
                files.iter().map(|f| f.to_record()).collect(),
            )),
            ReturnType::Path => Ok(QueryResult::Paths(
                files.iter().map(|f| f.path.clone()).collect(),
            )),
            ReturnType::Obj => Ok(QueryResult::Files(files)),
            ReturnType::Id => {
                let target = self.require_target(query)?;
                let values: BTreeSet<Value> = files
                    .iter()
                    .filter_map(|f| f.get(target).cloned())
                    .collect();
                Ok(QueryResult::Values(values.into_iter().collect()))
            }
            ReturnType::Dir => {
                let target = self.require_target(query)?;
                if !self
                    .domains
                    .iter()
                    .any(|d| d.directory_template(target).is_some())
                {
                    return Err(PathGrabError::Configuration(format!(
                        "Entity '{target}' has no directory template"
                    )));
                }
                let mut dirs: Vec<String> = files
                    .iter()
                    .filter_map(|f| {
                        let dir = self.domain(&f.domain)?.render_directory(target, &f.entities)?;
                        is_within(f.dirname(), &dir).then_some(dir)
                    })
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect();
                natural_sort(&mut dirs);
                Ok(QueryResult::Paths(dirs))
            }
        }
    }

    fn require_target<'q>(&self, query: &'q Query) -> Result<&'q str> {
        query.target.as_deref().ok_or_else(|| {
            PathGrabError::Configuration(format!(
                "Return type '{:?}' requires a target entity",
                query.return_type
            ))
        })
    }

    /// Distinct values of an entity across the whole layout.
    pub fn unique(&self, entity: &str) -> Result<Vec<Value>> {
        let query = Query::new().target(entity).return_type(ReturnType::Id);
        Ok(self.get(&query)?.into_values())
    }

    /// Number of distinct values of an entity.
    pub fn count(&self, entity: &str) -> Result<usize> {
        Ok(self.unique(entity)?.len())
    }

    /// Number of files carrying an entity.
    pub fn count_files(&self, entity: &str) -> Result<usize> {
        Ok(self.select(&Query::new().target(entity))?.len())
    }

    pub fn to_table(&self, query: &Query) -> Result<Table> {
        let files = self.select(query)?;
        let mut columns = vec!["path".to_string()];
        columns.extend(self.entities.keys().cloned());

        let rows = files
            .iter()
            .map(|f| {
                let mut row = Vec::with_capacity(columns.len());
                row.push(Some(Value::Str(f.path.clone())));
                row.extend(self.entities.keys().map(|name| f.get(name).cloned()));
                row
            })
            .collect();
        Ok(Table { columns, rows })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::tests::bids_layout;
    use pretty_assertions::assert_eq;

    fn paths(layout: &Layout, query: Query) -> Vec<String> {
        layout
            .get(&query.return_type(ReturnType::Path))
            .unwrap()
            .into_paths()
    }

    #[test]
    fn test_literal_filters() {
        let layout = bids_layout();
        let found = paths(&layout, Query::new().filter("subject", "02").filter("type", "bold"));
        assert_eq!(found, vec!["ds/sub-02/ses-1/func/sub-02_ses-1_run-1_bold.nii.gz"]);

        // numeric literal against a string value with leading zeros
        let found = paths(&layout, Query::new().filter("subject", 2).filter("run", 1));
        assert_eq!(found.len(), 3);
    }

    #[test]
    fn test_list_and_pattern_constraints() {
        let layout = bids_layout();
        let found = paths(
            &layout,
            Query::new()
                .filter("subject", vec!["01", "10"])
                .filter("type", "bold"),
        );
        assert_eq!(found.len(), 4);

        let found = paths(&layout, Query::new().filter("type", Constraint::pattern("^mag")));
        assert_eq!(found.len(), 2);

        let found = paths(
            &layout,
            Query::new().filter("type", Constraint::strict_pattern("mag")),
        );
        assert!(found.is_empty());
    }

    #[test]
    fn test_absent_and_present() {
        let layout = bids_layout();
        let with_acq = paths(&layout, Query::new().filter("acquisition", Constraint::Present));
        assert_eq!(with_acq, vec!["ds/sub-01/ses-2/fmap/sub-01_ses-2_acq-fast_magnitude1.nii.gz"]);

        let without = paths(
            &layout,
            Query::new()
                .filter("type", "magnitude1")
                .filter("acquisition", Constraint::Absent),
        );
        assert_eq!(without, vec!["ds/sub-02/ses-1/fmap/sub-02_ses-1_run-1_magnitude1.nii.gz"]);
    }

    #[test]
    fn test_string_literals_follow_regex_mode() {
        let layout = bids_layout();
        let full = paths(&layout, Query::new().filter("type", "mag.*"));
        assert_eq!(full.len(), 2);
        let searched = paths(&layout, Query::new().filter("type", "mag").regex_search(true));
        assert_eq!(searched.len(), 2);
        let exact = paths(&layout, Query::new().filter("type", "mag"));
        assert!(exact.is_empty());
    }

    #[test]
    fn test_target_ids_and_unique() {
        let layout = bids_layout();
        let ids = layout
            .get(&Query::new().target("subject").return_type(ReturnType::Id))
            .unwrap()
            .into_values();
        assert_eq!(ids, vec![Value::from("01"), Value::from("02"), Value::from("10")]);

        assert_eq!(layout.unique("run").unwrap(), vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(layout.count("session").unwrap(), 2);
        assert_eq!(layout.count_files("acquisition").unwrap(), 1);
    }

    #[test]
    fn test_target_restricts_records() {
        let layout = bids_layout();
        let result = layout
            .get(&Query::new().filter("subject", "02").target("run"))
            .unwrap();
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn test_dir_return_type() {
        let layout = bids_layout();
        let dirs = layout
            .get(&Query::new().target("session").return_type(ReturnType::Dir))
            .unwrap()
            .into_paths();
        assert_eq!(
            dirs,
            vec![
                "ds/sub-01/ses-1",
                "ds/sub-01/ses-2",
                "ds/sub-02/ses-1",
                "ds/sub-10/ses-1"
            ]
        );

        let err = layout
            .get(&Query::new().target("run").return_type(ReturnType::Dir))
            .unwrap_err();
        assert!(err.is_configuration());
        let err = layout
            .get(&Query::new().return_type(ReturnType::Id))
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_unknown_entity() {
        let layout = bids_layout();
        let err = layout.get(&Query::new().filter("participant", "01")).unwrap_err();
        assert!(matches!(err, PathGrabError::UnknownEntity { name } if name == "participant"));
        let err = layout.unique("participant").unwrap_err();
        assert!(matches!(err, PathGrabError::UnknownEntity { .. }));
    }

    #[test]
    fn test_extensions() {
        let layout = bids_layout();
        let found = paths(&layout, Query::new().extension(".json"));
        assert_eq!(
            found,
            vec![
                "ds/sub-02/ses-1/fmap/sub-02_ses-1_run-1_phasediff.json",
                "ds/task-rest_bold.json"
            ]
        );
    }

    #[test]
    fn test_filters_are_monotonic() {
        let layout = bids_layout();
        let mut query = Query::new();
        let mut previous = paths(&layout, query.clone()).len();
        for (entity, value) in [("session", "1"), ("type", "bold"), ("run", "1"), ("subject", "10")] {
            query = query.filter(entity, value);
            let count = paths(&layout, query.clone()).len();
            assert!(count <= previous);
            previous = count;
        }
        assert_eq!(previous, 1);
    }

    #[test]
    fn test_table_export() {
        let layout = bids_layout();
        let table = layout.to_table(&Query::new().filter("subject", "10")).unwrap();
        assert_eq!(
            table.columns,
            vec!["path", "acquisition", "run", "session", "subject", "type"]
        );
        assert_eq!(
            table.rows,
            vec![vec![
                Some(Value::from("ds/sub-10/ses-1/func/sub-10_ses-1_run-1_bold.nii.gz")),
                None,
                Some(Value::Int(1)),
                Some(Value::from("1")),
                Some(Value::from("10")),
                Some(Value::from("bold")),
            ]]
        );
    }
}
