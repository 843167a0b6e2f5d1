use sqlx::{sqlite::SqlitePoolOptions, Pool, Sqlite};
use std::path::PathBuf;

/// Connect to the engine's SQLite store. `db_path` may be `:memory:` for an
/// ephemeral, process-local database (used by tests), or a real path, whose
/// parent directory is created if missing.
pub async fn establish_pool(db_path: PathBuf) -> Result<Pool<Sqlite>, sqlx::Error> {
    if db_path == PathBuf::from(":memory:") {
        return SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await;
    }

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }

    SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&format!("sqlite:{}?mode=rwc", db_path.display()))
        .await
}
