//! SQLite-backed project store implementation.
//!
//! Handles connection, migrations, and timestamp helpers. Project and job
//! CRUD lives in `projects`.

use anyhow::{Context, Result};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Percent-encode a path for use in a sqlite:// URI so spaces and special chars don't break parsing.
fn path_to_sqlite_uri(path: &Path) -> String {
    let s = path.to_string_lossy();
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '%' => out.push_str("%25"),
            ' ' => out.push_str("%20"),
            '#' => out.push_str("%23"),
            '?' => out.push_str("%3F"),
            '&' => out.push_str("%26"),
            c => out.push(c),
        }
    }
    format!("sqlite://{}", out)
}

/// Handle to the SQLite project state store.
///
/// The database file lives under the XDG state directory:
/// `~/.local/state/mgen/projects.db` on Debian.
#[derive(Clone)]
pub struct ProjectStateStore {
    pub(crate) pool: Pool<Sqlite>,
}

impl ProjectStateStore {
    /// Open (or create) the default store and run migrations.
    pub async fn open_default() -> Result<Self> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("mgen")?;
        let state_dir = xdg_dirs.get_state_home().join("mgen");
        Self::open_at(state_dir.join("projects.db")).await
    }

    /// Open (or create) the store at a specific path. Creates parent dirs if needed.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create {}", parent.display()))?;
        }
        let uri = path_to_sqlite_uri(path) + "?mode=rwc";
        // Connections stay open for the life of a run; a long poll loop must not
        // find the pool empty and reconnecting.
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect(&uri)
            .await
            .with_context(|| format!("open project store {}", path.display()))?;
        let store = ProjectStateStore { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub(crate) async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS projects (
                name TEXT PRIMARY KEY,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS scenes (
                project TEXT NOT NULL,
                scene_index INTEGER NOT NULL,
                prompt_text TEXT NOT NULL,
                reference_image TEXT,
                PRIMARY KEY (project, scene_index)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        // One row per slot; a re-run overwrites the row with a fresh attempt.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                project TEXT NOT NULL,
                scene_index INTEGER NOT NULL,
                kind TEXT NOT NULL,
                copy_index INTEGER NOT NULL,
                status TEXT NOT NULL,
                remote_operation_id TEXT,
                remote_url TEXT,
                local_path TEXT,
                error_reason TEXT,
                completed_at INTEGER,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (project, scene_index, kind, copy_index)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Current time as Unix seconds (for DB timestamps and `Job::completed_at`).
pub fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
/// Open an in-memory store for tests (no disk I/O).
pub(crate) async fn open_memory() -> Result<ProjectStateStore> {
    // Single connection to avoid an in-memory pool handing back a different empty DB.
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;
    let store = ProjectStateStore { pool };
    store.migrate().await?;
    Ok(store)
}
