//! End-to-end command flows against real SQLite databases sharing one state directory

use std::path::{Path, PathBuf};

use schemahash::cli::migrate::Applied;
use schemahash::cli::{add, check, history, init, migrate, show, Context};
use schemahash::probe::SqliteDatabase;
use schemahash::{Resolution, SchemaProbe, Slug, StateError, StateStore};
use tempfile::TempDir;

const V1: &str = "CREATE TABLE accounts (id INTEGER PRIMARY KEY, name TEXT);
CREATE TABLE orders (id INTEGER PRIMARY KEY, account_id INTEGER);";

const ADD_EMAIL: &str = "ALTER TABLE accounts ADD COLUMN email TEXT;";

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn state_dir(&self) -> PathBuf {
        self.dir.path().join("state")
    }

    /// A database file created with `sql`.
    fn database(&self, name: &str, sql: &str) -> PathBuf {
        let path = self.dir.path().join(format!("{}.db", name));
        let db = SqliteDatabase::open(&path).unwrap();
        db.connection().execute_batch(sql).unwrap();
        path
    }

    fn context(&self, db: &Path) -> Context {
        Context::new(
            StateStore::open(self.state_dir()),
            Box::new(SqliteDatabase::open(db).unwrap()),
        )
    }

    fn script(&self, name: &str, sql: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, sql).unwrap();
        path
    }

    fn sql_file(&self, slug: &str) -> PathBuf {
        self.state_dir().join("sql").join(format!("{}.sql", slug))
    }

    /// Every persisted state file and its bytes, lock file excluded.
    fn state_files(&self) -> Vec<(PathBuf, Vec<u8>)> {
        let mut files = vec![];
        let mut dirs = vec![self.state_dir()];
        while let Some(dir) = dirs.pop() {
            for entry in std::fs::read_dir(&dir).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    dirs.push(path);
                } else if path.file_name().unwrap() != ".lock" {
                    let bytes = std::fs::read(&path).unwrap();
                    files.push((path, bytes));
                }
            }
        }
        files.sort();
        files
    }
}

/// init on `origin`, then add the email column there.
fn linear_history(fx: &Fixture) -> (PathBuf, String, String) {
    let origin = fx.database("origin", V1);
    let ctx = fx.context(&origin);
    let initial = init::run(&ctx, false).unwrap();
    let script = fx.script("email.sql", ADD_EMAIL);
    let email = add::run(&ctx, &script, "add account email").unwrap();
    (origin, initial.to_string(), email.to_string())
}

struct Branches {
    origin: PathBuf,
    replica: PathBuf,
    left: Slug,
    right: Slug,
}

/// Linear history, then `origin` and `replica` each add a different
/// orders column from the same state. `right` is recorded last.
fn branched_history(fx: &Fixture) -> Branches {
    let (origin, _, _) = linear_history(fx);

    let replica = fx.database("replica", V1);
    migrate::run(&fx.context(&replica), None, false).unwrap();

    let status = fx.script("status.sql", "ALTER TABLE orders ADD COLUMN status TEXT;");
    let total = fx.script("total.sql", "ALTER TABLE orders ADD COLUMN total INTEGER;");
    let left = add::run(&fx.context(&origin), &status, "order status").unwrap();
    let right = add::run(&fx.context(&replica), &total, "order total").unwrap();
    assert!(left < right);

    Branches {
        origin,
        replica,
        left,
        right,
    }
}

#[test]
fn test_init_then_check_is_up_to_date() {
    let fx = Fixture::new();
    let db = fx.database("origin", V1);
    let ctx = fx.context(&db);

    let slug = init::run(&ctx, false).unwrap();
    assert!(slug.as_str().ends_with("-initial-schema"));
    assert_eq!(check::run(&ctx, false).unwrap(), Resolution::UpToDate);

    let sql = ctx.store.read_sql(slug.as_str()).unwrap();
    assert!(sql.contains("CREATE TABLE accounts"));
    assert!(fx.state_dir().join("table_data/accounts.yml").exists());
}

#[test]
fn test_init_refuses_to_overwrite_without_force() {
    let fx = Fixture::new();
    let db = fx.database("origin", V1);
    let ctx = fx.context(&db);

    init::run(&ctx, false).unwrap();
    let err = init::run(&ctx, false).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StateError>(),
        Some(StateError::AlreadyInitialized(_))
    ));
    init::run(&ctx, true).unwrap();
}

#[test]
fn test_fresh_database_follows_linear_history() {
    let fx = Fixture::new();
    let (origin, _, email) = linear_history(&fx);
    assert_eq!(check::run(&fx.context(&origin), false).unwrap(), Resolution::UpToDate);

    // a second environment still on the initial schema
    let replica = fx.database("replica", V1);
    let ctx = fx.context(&replica);
    match check::run(&ctx, false).unwrap() {
        Resolution::Next { slug } => assert_eq!(slug.as_str(), email),
        other => panic!("expected a simple next migration, got {:?}", other),
    }

    let applied = migrate::run(&ctx, None, false).unwrap();
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].as_str(), email);
    assert_eq!(check::run(&ctx, false).unwrap(), Resolution::UpToDate);
    assert_eq!(
        ctx.db.capture_snapshot().unwrap(),
        fx.context(&origin).db.capture_snapshot().unwrap()
    );
}

#[test]
fn test_migrate_all_from_empty_database() {
    let fx = Fixture::new();
    let (origin, _, _) = linear_history(&fx);

    let empty = fx.database("empty", "");
    let ctx = fx.context(&empty);
    let applied = migrate::run(&ctx, None, true).unwrap();
    assert_eq!(applied.len(), 2);
    assert_eq!(check::run(&ctx, false).unwrap(), Resolution::UpToDate);
    assert_eq!(
        ctx.db.capture_snapshot().unwrap(),
        fx.context(&origin).db.capture_snapshot().unwrap()
    );

    // nothing left to do
    assert!(migrate::run(&ctx, None, true).unwrap().is_empty());
}

#[test]
fn test_failed_add_leaves_state_untouched() {
    let fx = Fixture::new();
    let (origin, _, _) = linear_history(&fx);
    let ctx = fx.context(&origin);
    let sequence_before = std::fs::read_to_string(fx.state_dir().join("sequence.yml")).unwrap();
    let sql_files_before = std::fs::read_dir(fx.state_dir().join("sql")).unwrap().count();

    let broken = fx.script("broken.sql", "CREATE TABLE broken (");
    let err = add::run(&ctx, &broken, "this will fail").unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StateError>(),
        Some(StateError::ExecutionFailed { .. })
    ));

    let sequence_after = std::fs::read_to_string(fx.state_dir().join("sequence.yml")).unwrap();
    assert_eq!(sequence_before, sequence_after);
    assert_eq!(
        std::fs::read_dir(fx.state_dir().join("sql")).unwrap().count(),
        sql_files_before
    );
}

#[test]
fn test_precondition_violation_blocks_migrate() {
    let fx = Fixture::new();
    let (_, _, email) = linear_history(&fx);

    let drifted = fx.database(
        "drifted",
        "CREATE TABLE accounts (id INTEGER PRIMARY KEY, name TEXT, nickname TEXT);
         CREATE TABLE orders (id INTEGER PRIMARY KEY, account_id INTEGER);",
    );
    let ctx = fx.context(&drifted);

    let err = migrate::run(&ctx, Some(email), false).unwrap_err();
    match err.downcast_ref::<StateError>() {
        Some(StateError::PreconditionViolated { tables, .. }) => {
            assert_eq!(tables, &vec!["accounts".to_string()]);
        }
        other => panic!("expected a precondition violation, got {:?}", other),
    }

    let resolution = check::run(&ctx, false).unwrap();
    match &resolution {
        Resolution::Divergent(advanced) => {
            assert!(advanced.candidates.is_empty());
            assert_eq!(advanced.issues.len(), 1);
            assert_eq!(advanced.issues[0].table(), "accounts");
            assert_eq!(advanced.up_to_date, vec!["orders".to_string()]);
        }
        other => panic!("expected divergent resolution, got {:?}", other),
    }
    assert_eq!(check::exit_code(&resolution), 1);
}

#[test]
fn test_branching_history_surfaces_both_migrations() {
    let fx = Fixture::new();
    let Branches { origin, left, right, .. } = branched_history(&fx);

    // a third environment at the branch point
    let third = fx.database("third", &format!("{}\n{}", V1, ADD_EMAIL));
    let ctx = fx.context(&third);
    let resolution = check::run(&ctx, false).unwrap();
    match &resolution {
        Resolution::Divergent(advanced) => {
            let slugs: Vec<_> = advanced.candidates.keys().cloned().collect();
            assert_eq!(slugs, vec![left.clone(), right.clone()]);
            assert!(advanced.candidates.values().all(|c| c.is_runnable()));
            assert!(advanced.issues.is_empty());
        }
        other => panic!("expected divergent resolution, got {:?}", other),
    }
    assert_eq!(check::exit_code(&resolution), 2);

    // no automatic pick, but either can be run by name
    assert!(migrate::run(&ctx, None, false).is_err());
    migrate::run(&ctx, Some(left.to_string()), false).unwrap();
    let origin_snapshot = fx.context(&origin).db.capture_snapshot().unwrap();
    assert_eq!(ctx.db.capture_snapshot().unwrap(), origin_snapshot);
}

#[test]
fn test_unknown_table_is_reported_without_hiding_pending_work() {
    let fx = Fixture::new();
    let (_, _, email) = linear_history(&fx);

    let db = fx.database("extra", &format!("{}\nCREATE TABLE scratch (x INTEGER);", V1));
    let ctx = fx.context(&db);
    match check::run(&ctx, false).unwrap() {
        Resolution::Divergent(advanced) => {
            assert!(advanced.candidates.contains_key(email.as_str()));
            assert_eq!(advanced.issues.len(), 1);
            assert_eq!(advanced.issues[0].table(), "scratch");
        }
        other => panic!("expected divergent resolution, got {:?}", other),
    }
}

#[test]
fn test_history_and_show() {
    let fx = Fixture::new();
    let (origin, initial, email) = linear_history(&fx);
    let ctx = fx.context(&origin);

    history::run(&ctx).unwrap();
    show::run(&ctx, None).unwrap();
    show::run(&ctx, Some(initial)).unwrap();
    assert!(show::run(&ctx, Some("nope".to_string())).is_err());
    assert_eq!(ctx.store.read_sql(&email).unwrap(), ADD_EMAIL);
}

#[test]
fn test_end_of_older_branch_is_up_to_date() {
    let fx = Fixture::new();
    let branches = branched_history(&fx);

    // origin finished the `left` branch, which no longer sorts last
    let ctx = fx.context(&branches.origin);
    let resolution = check::run(&ctx, false).unwrap();
    assert_eq!(resolution, Resolution::UpToDate);
    assert_eq!(check::exit_code(&resolution), 0);
    assert!(migrate::run(&ctx, None, false).unwrap().is_empty());
    assert!(migrate::run(&ctx, None, true).unwrap().is_empty());

    let latest = fx.context(&branches.replica);
    assert_eq!(check::run(&latest, false).unwrap(), Resolution::UpToDate);
    assert_ne!(branches.left, branches.right);
}

#[test]
fn test_edited_sql_diverges_without_touching_state() {
    let fx = Fixture::new();
    let (_, _, email) = linear_history(&fx);
    let slug = Slug::parse(&email).unwrap();

    let replica = fx.database("replica", V1);
    let ctx = fx.context(&replica);
    let state = ctx.store.load().unwrap();
    assert!(!migrate::sql_has_drifted(&ctx, &state, &slug).unwrap());

    std::fs::write(fx.sql_file(&email), "ALTER TABLE accounts ADD COLUMN phone TEXT;").unwrap();
    assert!(migrate::sql_has_drifted(&ctx, &state, &slug).unwrap());
    let files_before = fx.state_files();

    let start = ctx.db.capture_snapshot().unwrap();
    let outcome = migrate::apply(&ctx, &state, &slug, &start).unwrap();
    assert_eq!(outcome, Applied::Diverged);
    assert_eq!(fx.state_files(), files_before);

    // accounts ended up somewhere no migration knows
    let resolution = check::run(&ctx, false).unwrap();
    match &resolution {
        Resolution::Divergent(advanced) => {
            assert_eq!(advanced.issues.len(), 1);
            assert_eq!(advanced.issues[0].table(), "accounts");
        }
        other => panic!("expected divergent resolution, got {:?}", other),
    }
    assert_eq!(check::exit_code(&resolution), 1);
}

#[test]
fn test_migrate_all_stops_after_diverged_run() {
    let fx = Fixture::new();
    let (_, _, email) = linear_history(&fx);

    // the body no longer changes anything, so the database stays at the
    // start state and simple resolution would pick the same migration again
    std::fs::write(fx.sql_file(&email), "SELECT 1;").unwrap();
    let files_before = fx.state_files();

    let replica = fx.database("replica", V1);
    let ctx = fx.context(&replica);
    let applied = migrate::run(&ctx, None, true).unwrap();
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].as_str(), email);
    assert_eq!(fx.state_files(), files_before);

    match check::run(&ctx, false).unwrap() {
        Resolution::Next { slug } => assert_eq!(slug.as_str(), email),
        other => panic!("expected the same migration to still be pending, got {:?}", other),
    }
}

#[test]
fn test_unrecordable_table_name_stops_add_before_running() {
    let fx = Fixture::new();
    let (_, _, _) = linear_history(&fx);
    let sequence_before = std::fs::read(fx.state_dir().join("sequence.yml")).unwrap();
    let files_before = fx.state_files();

    let db = fx.database(
        "odd",
        &format!("{}\n{}\nCREATE TABLE \"odd/name\" (id INTEGER);", V1, ADD_EMAIL),
    );
    let ctx = fx.context(&db);
    let schema_before = ctx.db.capture_snapshot().unwrap();

    let status = fx.script("status.sql", "ALTER TABLE orders ADD COLUMN status TEXT;");
    let err = add::run(&ctx, &status, "order status").unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StateError>(),
        Some(StateError::InvalidTableName(name)) if name == "odd/name"
    ));

    assert_eq!(ctx.db.capture_snapshot().unwrap(), schema_before);
    assert_eq!(fx.state_files(), files_before);
    assert_eq!(
        std::fs::read(fx.state_dir().join("sequence.yml")).unwrap(),
        sequence_before
    );
}

#[test]
fn test_unrecordable_table_created_by_add_is_cleaned_up() {
    let fx = Fixture::new();
    let (origin, _, _) = linear_history(&fx);
    let files_before = fx.state_files();

    let script = fx.script("odd.sql", "CREATE TABLE \"odd/name\" (id INTEGER);");
    let err = add::run(&fx.context(&origin), &script, "odd table").unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StateError>(),
        Some(StateError::InvalidTableName(_))
    ));
    assert_eq!(fx.state_files(), files_before);
}

#[test]
fn test_init_rejects_unrecordable_table_name() {
    let fx = Fixture::new();
    let db = fx.database("odd", &format!("{}\nCREATE TABLE \"a\\b\" (id INTEGER);", V1));
    let ctx = fx.context(&db);

    let err = init::run(&ctx, false).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StateError>(),
        Some(StateError::InvalidTableName(_))
    ));
    assert!(!fx.state_dir().join("sequence.yml").exists());
}
