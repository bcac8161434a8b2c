use pathgrab::schema::parse_config_str;
use pathgrab::util::normalize_path;
use pathgrab::{
    bindings, build_path, Binding, Constraint, Layout, MapperRegistry, NearestOptions,
    PathGrabError, Query, ReturnType, Value,
};
use pretty_assertions::assert_eq;
use std::path::Path;
use tempfile::TempDir;

const TREE: &[&str] = &[
    "dataset_description.json",
    "sub-01/ses-1/func/sub-01_ses-1_run-1_bold.nii.gz",
    "sub-01/ses-1/func/sub-01_ses-1_run-2_bold.nii.gz",
    "sub-02/ses-1/func/sub-02_ses-1_run-1_bold.nii.gz",
    "sub-02/ses-1/fmap/sub-02_ses-1_run-1_magnitude1.nii.gz",
    "sub-02/ses-2/anat/sub-02_ses-2_T1w.nii.gz",
    "sub-03/ses-1/func/sub-03_ses-1_run-1_bold.nii.gz",
    "derivatives/sub-01/sub-01_ses-1_run-1_desc-preproc_bold.nii.gz",
];

struct Fixture {
    _tmp: TempDir,
    root: String,
    layout: Layout,
}

impl Fixture {
    fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        for rel in TREE {
            let path = tmp.path().join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, rel.as_bytes()).unwrap();
        }
        let root = normalize_path(&tmp.path().to_string_lossy());

        let config = parse_config_str(&format!(
            r#"
domains:
  - name: bids
    root: '{root}'
    entities:
      - {{ name: subject, pattern: "(sub-\\d+)", directory: "{{{{root}}}}/{{subject}}" }}
      - {{ name: session, pattern: "(ses-\\d)", directory: "{{{{root}}}}/{{subject}}/{{session}}" }}
      - {{ name: run, pattern: "(run-\\d+)" }}
      - {{ name: type, pattern: ".*_(.*?)\\." }}
    index:
      exclude: ["^derivatives/"]
"#
        ))
        .unwrap();
        let layout = Layout::from_config(&config, &MapperRegistry::with_builtins()).unwrap();

        Fixture {
            _tmp: tmp,
            root,
            layout,
        }
    }

    fn rel(&self, path: &str) -> String {
        path.strip_prefix(&format!("{}/", self.root))
            .unwrap_or(path)
            .to_string()
    }

    fn abs(&self, rel: &str) -> String {
        format!("{}/{rel}", self.root)
    }

    fn paths(&self, query: Query) -> Vec<String> {
        self.layout
            .get(&query.return_type(ReturnType::Path))
            .unwrap()
            .into_paths()
            .iter()
            .map(|p| self.rel(p))
            .collect()
    }
}

#[test]
fn indexing_extracts_every_entity() {
    let fx = Fixture::new();
    assert_eq!(fx.layout.len(), 7);

    let file = fx
        .layout
        .file(&fx.abs("sub-02/ses-1/fmap/sub-02_ses-1_run-1_magnitude1.nii.gz"))
        .unwrap();
    let expected: Vec<(&str, Value)> = vec![
        ("run", "run-1".into()),
        ("session", "ses-1".into()),
        ("subject", "sub-02".into()),
        ("type", "magnitude1".into()),
    ];
    let actual: Vec<(&str, Value)> = file
        .entities
        .iter()
        .map(|(k, v)| (k.as_str(), v.clone()))
        .collect();
    assert_eq!(actual, expected);
    assert!(fx.layout.warnings().is_empty());
}

#[test]
fn get_restricts_to_listed_subjects() {
    let fx = Fixture::new();
    let found = fx.paths(
        Query::new()
            .filter("subject", vec!["sub-01", "sub-02"])
            .filter("run", "run-1"),
    );
    assert_eq!(
        found,
        vec![
            "sub-01/ses-1/func/sub-01_ses-1_run-1_bold.nii.gz",
            "sub-02/ses-1/fmap/sub-02_ses-1_run-1_magnitude1.nii.gz",
            "sub-02/ses-1/func/sub-02_ses-1_run-1_bold.nii.gz",
        ]
    );
}

#[test]
fn adding_filters_never_grows_results() {
    let fx = Fixture::new();
    let steps: Vec<(&str, Constraint)> = vec![
        ("type", "bold".into()),
        ("session", Constraint::Present),
        ("run", Constraint::pattern("run-1")),
        ("subject", "sub-03".into()),
    ];
    let mut query = Query::new();
    let mut previous = fx.paths(query.clone()).len();
    for (entity, constraint) in steps {
        query = query.filter(entity, constraint);
        let count = fx.paths(query.clone()).len();
        assert!(count <= previous, "{entity} grew the result");
        previous = count;
    }
    assert_eq!(previous, 1);
}

#[test]
fn unique_values_and_directories() {
    let fx = Fixture::new();
    assert_eq!(
        fx.layout.unique("subject").unwrap(),
        vec![
            Value::from("sub-01"),
            Value::from("sub-02"),
            Value::from("sub-03")
        ]
    );
    let dirs: Vec<String> = fx
        .layout
        .get(
            &Query::new()
                .filter("subject", "sub-02")
                .target("session")
                .return_type(ReturnType::Dir),
        )
        .unwrap()
        .into_paths()
        .iter()
        .map(|d| fx.rel(d))
        .collect();
    assert_eq!(dirs, vec!["sub-02/ses-1", "sub-02/ses-2"]);
}

#[test]
fn nearest_strict_match() {
    let fx = Fixture::new();
    let options = NearestOptions::entities(["subject", "session"]).strict(true);

    let nearest = fx
        .layout
        .get_nearest(&fx.abs("sub-02/ses-1/fmap/x.json"), &options)
        .unwrap()
        .map(|p| fx.rel(&p));
    assert_eq!(
        nearest.as_deref(),
        Some("sub-02/ses-1/fmap/sub-02_ses-1_run-1_magnitude1.nii.gz")
    );

    let none = fx
        .layout
        .get_nearest(&fx.abs("sub-02/ses-3/fmap/x.json"), &options)
        .unwrap();
    assert_eq!(none, None);
}

#[test]
fn build_path_cardinality() {
    let values = bindings([
        ("subject", Binding::from("02")),
        ("run", Binding::from(vec![1, 2])),
    ]);
    let paths = build_path(&values, "sub-{subject}_run-{run}.nii", "==2").unwrap();
    assert_eq!(paths, vec!["sub-02_run-1.nii", "sub-02_run-2.nii"]);

    let err = build_path(&values, "sub-{subject}_run-{run}.nii", "==1").unwrap_err();
    assert!(matches!(
        err,
        PathGrabError::Cardinality { actual: 2, .. }
    ));
}

#[test]
fn snapshot_round_trip_preserves_queries() {
    let fx = Fixture::new();
    let out = TempDir::new().unwrap();
    let registry = MapperRegistry::with_builtins();

    for name in ["layout.json", "layout.yml", "layout.sqlite"] {
        let path = out.path().join(name);
        fx.layout.save_snapshot(&path).unwrap();
        let loaded = Layout::load_snapshot(&path, &registry).unwrap();

        assert_eq!(loaded.files(), fx.layout.files());
        for entity in ["subject", "session", "run", "type"] {
            assert_eq!(
                loaded.unique(entity).unwrap(),
                fx.layout.unique(entity).unwrap()
            );
        }
        let query = Query::new().filter("subject", "sub-02");
        assert_eq!(
            loaded.get(&query).unwrap().into_paths(),
            fx.layout.get(&query).unwrap().into_paths()
        );
    }
}

#[test]
fn copy_files_into_new_tree() {
    let fx = Fixture::new();
    let out = TempDir::new().unwrap();
    let written = fx
        .layout
        .copy_files(
            &Query::new().filter("type", "bold").filter("subject", "sub-03"),
            &["{type}/{subject}_{run}.nii.gz"],
            out.path(),
            Default::default(),
        )
        .unwrap();
    assert_eq!(written, vec![out.path().join("bold/sub-03_run-1.nii.gz")]);
    assert_eq!(
        std::fs::read_to_string(&written[0]).unwrap(),
        "sub-03/ses-1/func/sub-03_ses-1_run-1_bold.nii.gz"
    );
    assert!(Path::new(&written[0]).is_file());
}
