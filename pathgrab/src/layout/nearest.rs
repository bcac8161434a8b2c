use super::{Layout, Query};
use crate::entity::Value;
use crate::error::Result;
use crate::file::File;
use crate::util::{is_within, natural_cmp, normalize_path, parent_dir, tree_distance};
use std::collections::BTreeMap;

/// Options for [`Layout::get_nearest`].
#[derive(Debug, Clone, Default)]
pub struct NearestOptions {
    /// Entities to compare. Empty means every entity the source path has.
    pub entities: Vec<String>,
    /// Require every compared entity to match exactly.
    pub strict: bool,
    /// Consider files anywhere in the layout, not only in ancestor or
    /// descendant directories of the source.
    pub full_search: bool,
    /// Entities left out of the comparison in strict mode.
    pub ignore_strict: Vec<String>,
    /// Restricts the candidate files.
    pub filters: Query,
}

impl NearestOptions {
    pub fn entities<I, S>(entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        NearestOptions {
            entities: entities.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn full_search(mut self, full_search: bool) -> Self {
        self.full_search = full_search;
        self
    }

    pub fn ignore_strict(mut self, entity: &str) -> Self {
        self.ignore_strict.push(entity.to_string());
        self
    }

    pub fn filters(mut self, filters: Query) -> Self {
        self.filters = filters;
        self
    }
}

struct Candidate<'a> {
    file: &'a File,
    distance: usize,
    matched: usize,
}

impl Layout {
    /// The file closest in the tree to `path` whose entity values match the
    /// path's own. `None` when nothing meets the match requirement.
    pub fn get_nearest(&self, path: &str, options: &NearestOptions) -> Result<Option<String>> {
        Ok(self
            .rank_nearest(path, options)?
            .into_iter()
            .next()
            .map(|c| c.file.path.clone()))
    }

    /// Every candidate, best first.
    pub fn get_nearest_all(&self, path: &str, options: &NearestOptions) -> Result<Vec<String>> {
        Ok(self
            .rank_nearest(path, options)?
            .into_iter()
            .map(|c| c.file.path.clone())
            .collect())
    }

    fn rank_nearest(&self, path: &str, options: &NearestOptions) -> Result<Vec<Candidate<'_>>> {
        for name in options.entities.iter().chain(&options.ignore_strict) {
            self.entity(name)?;
        }

        let path = normalize_path(path);
        let source = self.source_values(&path);

        // Entities the source lacks cannot be compared.
        let compared: Vec<(&str, &Value)> = source
            .iter()
            .filter(|(name, _)| options.entities.is_empty() || options.entities.contains(*name))
            .filter(|(name, _)| !(options.strict && options.ignore_strict.contains(*name)))
            .map(|(name, value)| (name.as_str(), value))
            .collect();

        let source_dir = parent_dir(&path);
        let mut candidates: Vec<Candidate<'_>> = self
            .select(&options.filters)?
            .into_iter()
            .filter(|f| f.path != path)
            .filter(|f| {
                options.full_search
                    || is_within(source_dir, f.dirname())
                    || is_within(f.dirname(), source_dir)
            })
            .filter_map(|file| {
                let matched = compared
                    .iter()
                    .filter(|(name, value)| {
                        file.get(name).map_or(false, |v| v == *value)
                    })
                    .count();
                let accepted = if options.strict {
                    matched == compared.len()
                } else {
                    compared.is_empty() || matched > 0
                };
                accepted.then(|| Candidate {
                    file,
                    distance: tree_distance(source_dir, file.dirname()),
                    matched,
                })
            })
            .collect();

        candidates.sort_by(|a, b| {
            a.distance
                .cmp(&b.distance)
                .then(b.matched.cmp(&a.matched))
                .then_with(|| natural_cmp(&a.file.path, &b.file.path))
        });
        log::debug!("{} nearest candidates for {path}", candidates.len());
        Ok(candidates)
    }

    /// Entity values of an indexed path, or extracted on the fly for a path
    /// that is not in the index.
    fn source_values(&self, path: &str) -> BTreeMap<String, Value> {
        if let Some(file) = self.file(path) {
            return file.entities.clone();
        }
        self.entities
            .values()
            .filter_map(|entity| {
                let value = entity.extract(path).ok()??;
                Some((entity.name().to_string(), value))
            })
            .collect()
    }
}
