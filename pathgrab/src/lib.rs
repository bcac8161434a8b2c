//! Index directory trees by the entities encoded in their file paths.
//!
//! A [`Layout`] merges one or more [`Domain`]s, each a root directory plus a
//! set of regex-defined [`Entity`] extractors. Once built, a Layout answers
//! declarative queries, finds the nearest related file and builds new paths
//! from entity values.

pub mod compat;
pub mod domain;
pub mod entity;
pub mod error;
pub mod file;
pub mod indexer;
pub mod layout;
pub mod path_builder;
pub mod scanner;
pub mod schema;
pub mod snapshot;
pub mod util;
pub mod validation;
pub mod watcher;

pub use domain::Domain;
pub use entity::{Entity, MapperRegistry, Value};
pub use error::{PathGrabError, Result};
pub use file::{File, Record};
pub use layout::{
    Constraint, CopyOptions, Layout, LayoutBuilder, LayoutHandle, NearestOptions, Query,
    QueryResult, ReturnType, Table,
};
pub use path_builder::{
    bindings, build_path, write_contents_to_file, Binding, Bindings, Cardinality,
    ConflictPolicy, Contents, PathBuilder,
};
pub use scanner::{LocalScanner, Scanner, StaticScanner};
pub use schema::{DType, DomainConfig, EntityConfig, LayoutConfig};
pub use snapshot::{Snapshot, SnapshotDb, SnapshotScanner};
