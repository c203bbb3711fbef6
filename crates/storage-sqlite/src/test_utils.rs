//! Temp-dir databases for repository tests.

use std::sync::Arc;
use tempfile::TempDir;

use crate::db::{create_pool, run_migrations, spawn_writer, DbPool, WriteHandle};

/// A migrated database in a temp directory. Keep it alive for the test.
pub struct TestDb {
    pub pool: Arc<DbPool>,
    pub writer: WriteHandle,
    _dir: TempDir,
}

/// Must be called from inside a tokio runtime (spawns the writer).
pub fn test_db() -> TestDb {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    let db_path = dir.path().join("test.db");
    let pool = create_pool(&db_path.to_string_lossy()).expect("Failed to create pool");
    run_migrations(&pool).expect("Failed to run migrations");
    let writer = spawn_writer((*pool).clone());
    TestDb {
        pool,
        writer,
        _dir: dir,
    }
}
