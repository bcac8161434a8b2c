use super::{Layout, Query, ReturnType};
use crate::entity::Value;
use crate::error::{PathGrabError, Result};

/// Named accessor for one entity's distinct values, e.g. `get_subject`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityGetter {
    entity: String,
}

impl EntityGetter {
    pub(super) fn new(entity: &str) -> Self {
        EntityGetter {
            entity: entity.to_string(),
        }
    }

    pub fn name(&self) -> String {
        format!("get_{}", self.entity)
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Distinct values of the entity among files matching `query`.
    pub fn call(&self, layout: &Layout, query: &Query) -> Result<Vec<Value>> {
        let query = query
            .clone()
            .target(&self.entity)
            .return_type(ReturnType::Id);
        Ok(layout.get(&query)?.into_values())
    }
}

impl Layout {
    pub fn getters(&self) -> impl Iterator<Item = &EntityGetter> {
        self.getters.values()
    }

    pub fn getter(&self, entity: &str) -> Result<&EntityGetter> {
        self.getters
            .get(&format!("get_{entity}"))
            .ok_or_else(|| PathGrabError::UnknownEntity {
                name: entity.to_string(),
            })
    }

    /// Dispatch `get_<entity>` (or the plural `get_<entity>s`) by name.
    pub fn call(&self, name: &str, query: &Query) -> Result<Vec<Value>> {
        let getter = self.getters.get(name).or_else(|| {
            name.strip_suffix('s')
                .and_then(|singular| self.getters.get(singular))
        });
        match getter {
            Some(getter) => getter.call(self, query),
            None => Err(PathGrabError::UnknownEntity {
                name: name.trim_start_matches("get_").to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::tests::bids_layout;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_one_getter_per_entity() {
        let layout = bids_layout();
        let names: Vec<String> = layout.getters().map(EntityGetter::name).collect();
        assert_eq!(
            names,
            vec![
                "get_acquisition",
                "get_run",
                "get_session",
                "get_subject",
                "get_type"
            ]
        );
        assert_eq!(layout.getter("run").unwrap().entity(), "run");
    }

    #[test]
    fn test_call_by_name() {
        let layout = bids_layout();
        let query = Query::new().filter("session", "2");
        let subjects = layout.call("get_subject", &query).unwrap();
        assert_eq!(subjects, vec![Value::from("01")]);

        let runs = layout.call("get_runs", &Query::new()).unwrap();
        assert_eq!(runs, vec![Value::Int(1), Value::Int(2)]);

        let err = layout.call("get_participant", &Query::new()).unwrap_err();
        assert!(matches!(err, PathGrabError::UnknownEntity { name } if name == "participant"));
    }
}
