use clap::{Parser, Subcommand, ValueEnum};
use pathgrab::compat::is_compatible;
use pathgrab::schema::parse_config;
use pathgrab::snapshot::Snapshot;
use pathgrab::validation::validate_layout_config;
use pathgrab::watcher::FileWatcher;
use pathgrab::{
    Binding, Bindings, Constraint, Layout, LayoutConfig, LayoutHandle, MapperRegistry,
    NearestOptions, Query, Value,
};
use std::path::{Path, PathBuf};
use std::process;

/// pathgrab CLI: index a directory tree and query it by entities
#[derive(Parser)]
#[command(name = "pathgrab", version, about)]
struct Cli {
    /// Layout configuration file
    #[arg(long, default_value = "pathgrab.yaml")]
    config: PathBuf,

    /// Load this snapshot instead of scanning (.json, .yaml or .db)
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "yaml")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Scan every domain and write a snapshot
    Index {
        /// Snapshot file (.json, .yaml or .db)
        #[arg(long)]
        out: PathBuf,
    },

    /// Query files by entity values
    Get {
        /// Entity filters (e.g. --filter subject=01, run=1,2, type=~^mag, acq= for absent)
        #[arg(long = "filter", value_parser = parse_key_value)]
        filters: Vec<(String, String)>,
        /// Restrict output to this entity
        #[arg(long)]
        target: Option<String>,
        /// tuple, path, dir, id or obj
        #[arg(long, default_value = "path")]
        return_type: String,
        /// File extension filter (repeatable)
        #[arg(long = "ext")]
        extensions: Vec<String>,
        /// Search string constraints instead of matching them in full
        #[arg(long)]
        regex_search: bool,
    },

    /// Distinct values of an entity
    Unique {
        entity: String,
    },

    /// Number of distinct values of an entity
    Count {
        entity: String,
        /// Count files carrying the entity instead
        #[arg(long)]
        files: bool,
    },

    /// Find the file nearest to a path with matching entity values
    Nearest {
        path: String,
        /// Entities to compare (repeatable; default: all)
        #[arg(long = "entity")]
        entities: Vec<String>,
        #[arg(long)]
        strict: bool,
        /// Search the whole layout, not only ancestor/descendant directories
        #[arg(long)]
        full_search: bool,
        /// Entities ignored by --strict
        #[arg(long)]
        ignore_strict: Vec<String>,
        /// Candidate filters, same syntax as `get`
        #[arg(long = "filter", value_parser = parse_key_value)]
        filters: Vec<(String, String)>,
        /// Print every candidate, best first
        #[arg(long)]
        all: bool,
    },

    /// Build paths from entity values
    Build {
        /// Path pattern (repeatable; default: the domains' default patterns)
        #[arg(long = "pattern")]
        patterns: Vec<String>,
        /// Entity values (e.g. --value subject=01 --value run=1,2)
        #[arg(long = "value", value_parser = parse_key_value)]
        values: Vec<(String, String)>,
        #[arg(long, default_value = ">=0")]
        cardinality: String,
        /// Only use patterns that reference every given entity
        #[arg(long)]
        strict: bool,
    },

    /// Export matching files as a table
    Export {
        #[arg(long = "filter", value_parser = parse_key_value)]
        filters: Vec<(String, String)>,
    },

    /// Show warnings recorded while indexing
    Warnings,

    /// Check the configuration (and the snapshot against it)
    Validate,

    /// Rebuild the layout whenever files under a domain root change
    Watch {
        /// Rewrite this snapshot after every rebuild
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("Invalid key=value pair: no '=' found in '{s}'"))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("ERROR:{e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let registry = MapperRegistry::with_builtins();

    match &cli.command {
        Command::Validate => return validate(&cli, &registry),
        Command::Watch { out } => return watch(&cli, &registry, out.as_deref()),
        _ => {}
    }

    let layout = load_layout(&cli, &registry)?;

    match cli.command {
        Command::Index { out } => {
            layout.save_snapshot(&out)?;
            print_output(
                &serde_json::json!({
                    "ok": true,
                    "files": layout.len(),
                    "warnings": layout.warnings().len(),
                    "snapshot": out.display().to_string(),
                }),
                &cli.format,
            )?;
        }

        Command::Get {
            filters,
            target,
            return_type,
            extensions,
            regex_search,
        } => {
            let mut query = to_query(&filters).return_type(return_type.parse()?);
            if let Some(target) = &target {
                query = query.target(target);
            }
            for ext in &extensions {
                query = query.extension(ext);
            }
            if regex_search {
                query = query.regex_search(true);
            }
            let result = layout.get(&query)?;
            print_output(&serde_json::to_value(&result)?, &cli.format)?;
        }

        Command::Unique { entity } => {
            let values = layout.unique(&entity)?;
            print_output(&serde_json::to_value(values)?, &cli.format)?;
        }

        Command::Count { entity, files } => {
            let count = if files {
                layout.count_files(&entity)?
            } else {
                layout.count(&entity)?
            };
            print_output(&serde_json::json!({ "entity": entity, "count": count }), &cli.format)?;
        }

        Command::Nearest {
            path,
            entities,
            strict,
            full_search,
            ignore_strict,
            filters,
            all,
        } => {
            let options = NearestOptions {
                entities,
                strict,
                full_search,
                ignore_strict,
                filters: to_query(&filters),
            };
            if all {
                let paths = layout.get_nearest_all(&path, &options)?;
                print_output(&serde_json::to_value(paths)?, &cli.format)?;
            } else {
                let nearest = layout.get_nearest(&path, &options)?;
                print_output(&serde_json::to_value(nearest)?, &cli.format)?;
            }
        }

        Command::Build {
            patterns,
            values,
            cardinality,
            strict,
        } => {
            let bindings = to_bindings(&values);
            let paths = if strict {
                let patterns = if patterns.is_empty() {
                    layout
                        .domains()
                        .iter()
                        .flat_map(|d| d.default_path_patterns().iter().cloned())
                        .collect()
                } else {
                    patterns
                };
                layout
                    .path_builder()
                    .strict(true)
                    .build_any(&bindings, &patterns, &cardinality)?
            } else {
                layout.build_path(&bindings, &patterns, &cardinality)?
            };
            print_output(&serde_json::to_value(paths)?, &cli.format)?;
        }

        Command::Export { filters } => {
            let table = layout.to_table(&to_query(&filters))?;
            print_output(&serde_json::to_value(table)?, &cli.format)?;
        }

        Command::Warnings => {
            print_output(&serde_json::to_value(layout.warnings())?, &cli.format)?;
        }

        Command::Validate | Command::Watch { .. } => {}
    }

    Ok(())
}

/// Load from `--snapshot` when given, otherwise scan per `--config`.
fn load_layout(
    cli: &Cli,
    registry: &MapperRegistry,
) -> Result<Layout, Box<dyn std::error::Error>> {
    let Some(snapshot_path) = &cli.snapshot else {
        let config = parse_config(&cli.config)?;
        return Ok(Layout::from_config(&config, registry)?);
    };

    let snapshot = Snapshot::open(snapshot_path)?;
    if cli.config.exists() {
        let config = parse_config(&cli.config)?;
        let changes = snapshot.changes_from(&config, registry)?;
        for change in &changes {
            log::warn!("Snapshot differs from {}: {change}", cli.config.display());
        }
        if !is_compatible(&changes) {
            log::warn!("Snapshot is stale; re-run `pathgrab index`");
        }
    }
    Ok(snapshot.into_layout(registry)?)
}

fn validate(cli: &Cli, registry: &MapperRegistry) -> Result<(), Box<dyn std::error::Error>> {
    let config = parse_config(&cli.config)?;
    let result = validate_layout_config(&config, registry);

    let mut changes = Vec::new();
    if result.is_ok() {
        if let Some(path) = &cli.snapshot {
            changes = Snapshot::open(path)?
                .changes_from(&config, registry)?
                .iter()
                .map(|c| c.describe())
                .collect();
        }
    }

    print_output(
        &serde_json::json!({
            "ok": result.is_ok(),
            "errors": result.errors,
            "warnings": result.warnings,
            "snapshot_changes": changes,
        }),
        &cli.format,
    )?;

    if !result.is_ok() {
        return Err(format!("{} configuration error(s)", result.errors.len()).into());
    }
    Ok(())
}

fn watch(
    cli: &Cli,
    registry: &MapperRegistry,
    out: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config: LayoutConfig = parse_config(&cli.config)?;
    let handle = LayoutHandle::new(Layout::from_config(&config, registry)?);
    let watcher = FileWatcher::start(handle.current().domains())?;

    if let Some(out) = out {
        handle.current().save_snapshot(out)?;
    }
    log::info!("Watching {} files; press Ctrl-C to stop", handle.current().len());

    while let Some(batch) = watcher.next_batch() {
        for event in &batch {
            log::debug!("{:?} {} ({})", event.kind, event.path.display(), event.domain);
        }
        match handle.rebuild(|| Layout::from_config(&config, registry)) {
            Ok(layout) => {
                log::info!("Rebuilt after {} change(s): {} files", batch.len(), layout.len());
                if let Some(out) = out {
                    layout.save_snapshot(out)?;
                }
            }
            Err(e) => log::error!("Rebuild failed, keeping previous index: {e}"),
        }
    }
    Ok(())
}

fn to_query(filters: &[(String, String)]) -> Query {
    filters.iter().fold(Query::new(), |query, (entity, raw)| {
        query.filter(entity, parse_constraint(raw))
    })
}

/// Empty means absent, `*` present, `~re` a pattern and `a,b` any of the
/// listed literals. Integers are parsed as numbers.
fn parse_constraint(raw: &str) -> Constraint {
    if raw.is_empty() {
        Constraint::Absent
    } else if raw == "*" {
        Constraint::Present
    } else if let Some(pattern) = raw.strip_prefix('~') {
        Constraint::pattern(pattern)
    } else if raw.contains(',') {
        Constraint::any_of(raw.split(',').map(parse_literal))
    } else {
        Constraint::Value(parse_literal(raw))
    }
}

fn parse_literal(raw: &str) -> Value {
    raw.parse::<i64>()
        .map(Value::Int)
        .unwrap_or_else(|_| Value::from(raw))
}

fn to_bindings(values: &[(String, String)]) -> Bindings {
    values
        .iter()
        .map(|(entity, raw)| {
            let binding = if raw.contains(',') {
                Binding::Many(raw.split(',').map(Value::from).collect())
            } else {
                Binding::One(Value::from(raw.as_str()))
            };
            (entity.clone(), binding)
        })
        .collect()
}

fn print_output(
    value: &serde_json::Value,
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_constraint_forms() {
        assert_eq!(parse_constraint(""), Constraint::Absent);
        assert_eq!(parse_constraint("*"), Constraint::Present);
        assert_eq!(parse_constraint("~^mag"), Constraint::pattern("^mag"));
        assert_eq!(parse_constraint("01"), Constraint::Value(Value::Int(1)));
        assert_eq!(parse_constraint("bold"), Constraint::Value(Value::from("bold")));
        assert_eq!(
            parse_constraint("1,rest"),
            Constraint::AnyOf(vec![
                Constraint::Value(Value::Int(1)),
                Constraint::Value(Value::from("rest"))
            ])
        );
    }

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("run=1,2").unwrap(),
            ("run".to_string(), "1,2".to_string())
        );
        assert!(parse_key_value("run").is_err());
    }

    #[test]
    fn test_bindings_split_lists() {
        let bindings = to_bindings(&[("run".into(), "1,2".into()), ("subject".into(), "01".into())]);
        assert_eq!(bindings["run"].values().len(), 2);
        assert_eq!(bindings["subject"], Binding::One(Value::from("01")));
    }
}
