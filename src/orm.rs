//! Async persistence layer for the camp models (sqlite + sqlx)
//!
//! Usage:
//! let db = Arc::new(Db::connect_with(&DatabaseSettings::in_memory()).await?);
//! auto_migrate(db.clone()).await?;
//! let campers: Vec<Camper> = Camper::all(&db).await?;
pub use futures::future::BoxFuture;
use log::{debug, error, info};
use sha2::{Digest, Sha256};
pub use sqlx::FromRow;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use std::fs;
use std::str::FromStr;
use std::sync::Arc;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::models::{Activity, Camper, Signup};
use crate::settings::DatabaseSettings;

const MIGRATIONS_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS __camp_migrations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    filename TEXT UNIQUE,
    table_name TEXT,
    schema_sql TEXT,
    hash TEXT,
    applied_at DATETIME DEFAULT CURRENT_TIMESTAMP
)";

/// An async database pool wrapper.
#[derive(Clone)]
pub struct Db {
    pool: SqlitePool,
    log_statements: bool,
}

/// Migration function pointer for a model.
pub type MigrationFn = fn(Arc<Db>) -> BoxFuture<'static, Result<(), sqlx::Error>>;

pub struct Migration(pub MigrationFn);

impl std::ops::Deref for Migration {
    type Target = MigrationFn;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// A persisted record type that owns one table.
#[async_trait::async_trait]
pub trait Model: Send + Sync {
    fn table_name() -> &'static str;
    fn create_table_sql() -> String;
    fn columns() -> Vec<(String, String)>;

    async fn migrate(db: Arc<Db>) -> Result<(), sqlx::Error> {
        let table_name = Self::table_name();
        let create_sql = Self::create_table_sql();
        let schema_hash = hash(&create_sql);

        db.execute(MIGRATIONS_TABLE_SQL).await?;

        let recorded: Option<(String,)> =
            sqlx::query_as("SELECT hash FROM __camp_migrations WHERE table_name = ?")
                .bind(table_name)
                .fetch_optional(&db.pool)
                .await?;

        if recorded.is_none() {
            db.execute(&create_sql).await?;
            sqlx::query(
                "INSERT INTO __camp_migrations (table_name, schema_sql, hash) VALUES (?, ?, ?)",
            )
            .bind(table_name)
            .bind(&create_sql)
            .bind(&schema_hash)
            .execute(&db.pool)
            .await?;
            info!(
                "Migrated `{}` (table created, initial schema applied).",
                table_name
            );
        }

        // The table may predate its bookkeeping row, so columns are checked either way.
        let pragma_sql = format!("PRAGMA table_info({})", table_name);
        let cols: Vec<String> = sqlx::query(&pragma_sql)
            .fetch_all(&db.pool)
            .await?
            .into_iter()
            .map(|row: SqliteRow| row.get::<String, _>("name"))
            .collect();

        let mut added = Vec::new();
        for (name, sqltype) in Self::columns() {
            if !cols.contains(&name) {
                let statement = format!(
                    "ALTER TABLE {} ADD COLUMN {} {};",
                    table_name, name, sqltype
                );
                db.execute(&statement).await?;
                added.push((name, sqltype));
            }
        }

        if added.is_empty() {
            if recorded.is_some() {
                info!("No schema changes detected for `{}`.", table_name);
            }
        } else {
            info!(
                "Schema changes detected for `{}`, the following columns were added:",
                table_name
            );
            for (name, sqltype) in &added {
                info!("  - {} {}", name, sqltype);
            }
            sqlx::query(
                "UPDATE __camp_migrations \
                 SET schema_sql = ?, hash = ?, applied_at = CURRENT_TIMESTAMP \
                 WHERE table_name = ?",
            )
            .bind(&create_sql)
            .bind(&schema_hash)
            .bind(table_name)
            .execute(&db.pool)
            .await?;
        }
        Ok(())
    }
}

fn hash(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    format!("{:x}", hasher.finalize())
}

impl Db {
    /// Connect (or create) a SQLite database at the given URI with default settings.
    pub async fn connect(uri: &str) -> Result<Self, sqlx::Error> {
        let settings = DatabaseSettings {
            url: uri.to_string(),
            ..Default::default()
        };
        Self::connect_with(&settings).await
    }

    pub async fn connect_with(settings: &DatabaseSettings) -> Result<Self, sqlx::Error> {
        info!("Connecting to SQLite database at URI: {}", settings.url);
        let options = SqliteConnectOptions::from_str(&settings.url)?
            .create_if_missing(true)
            .foreign_keys(settings.foreign_keys);

        let mut pool_options = SqlitePoolOptions::new().max_connections(settings.max_connections);
        if settings.is_in_memory() {
            // The database lives only as long as its single connection.
            pool_options = pool_options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        let pool = pool_options.connect_with(options).await?;
        info!("Connected to SQLite database: {}", settings.url);
        Ok(Db {
            pool,
            log_statements: settings.log_statements,
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Begin a transaction; dropping it without `commit` rolls back.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, sqlx::Error> {
        self.trace("BEGIN");
        self.pool.begin().await
    }

    pub(crate) fn trace(&self, sql: &str) {
        if self.log_statements {
            debug!("Executing SQL: {}", sql);
        }
    }

    /// Execute an arbitrary SQL script, e.g. DDL, INSERT, UPDATE. May hold several statements.
    pub async fn execute(&self, sql: &str) -> Result<(), sqlx::Error> {
        self.trace(sql);
        let result = sqlx::raw_sql(sql).execute(&self.pool).await;
        if let Err(e) = &result {
            error!("SQL execution failed: {}", e);
        }
        result.map(|_| ())
    }

    /// Fetch all rows and map to a type implementing `FromRow`.
    pub async fn fetch_all<T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin>(
        &self,
        sql: &str,
    ) -> Result<Vec<T>, sqlx::Error> {
        self.trace(sql);
        let result = sqlx::query_as(sql).fetch_all(&self.pool).await;
        match &result {
            Ok(rows) => debug!("Fetched {} rows", rows.len()),
            Err(e) => error!("Row fetch failed: {}", e),
        }
        result
    }
}

fn migrate_activities(db: Arc<Db>) -> BoxFuture<'static, Result<(), sqlx::Error>> {
    Box::pin(async move { Activity::migrate(db).await })
}

fn migrate_campers(db: Arc<Db>) -> BoxFuture<'static, Result<(), sqlx::Error>> {
    Box::pin(async move { Camper::migrate(db).await })
}

fn migrate_signups(db: Arc<Db>) -> BoxFuture<'static, Result<(), sqlx::Error>> {
    Box::pin(async move { Signup::migrate(db).await })
}

/// Parents before the join table.
pub static MIGRATIONS: [Migration; 3] = [
    Migration(migrate_activities),
    Migration(migrate_campers),
    Migration(migrate_signups),
];

/// Migrate every model table.
pub async fn auto_migrate(db: Arc<Db>) -> Result<()> {
    info!("Starting auto migration of all models...");
    for m in MIGRATIONS.iter() {
        if let Err(e) = m(db.clone()).await {
            error!("Auto-migration failed for a model: {}", e);
            return Err(Error::Migration(e.to_string()));
        }
    }
    info!("Auto migration completed for {} models.", MIGRATIONS.len());
    Ok(())
}

/// Applies file-based migrations located in the `migrations_dir` directory.
/// Each migration file should be a *.sql file.
/// Already-applied migrations are skipped based on filename tracking in __camp_migrations.
pub async fn apply_migration_files(db: Arc<Db>, migrations_dir: &str) -> Result<usize> {
    db.execute(MIGRATIONS_TABLE_SQL).await?;

    let mut files: Vec<_> = WalkDir::new(migrations_dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|f| f.file_type().is_file())
        .filter(|f| f.path().extension().is_some_and(|e| e == "sql"))
        .collect();
    files.sort_by_key(|f| f.file_name().to_os_string());

    let mut applied_count = 0;
    for entry in files {
        let filename = entry.file_name().to_string_lossy().to_string();
        let applied: Option<(String,)> =
            sqlx::query_as("SELECT filename FROM __camp_migrations WHERE filename = ?")
                .bind(&filename)
                .fetch_optional(db.pool())
                .await?;
        if applied.is_some() {
            info!("Migration `{}` already applied.", filename);
            continue;
        }

        let sql = fs::read_to_string(entry.path())
            .map_err(|e| Error::Migration(format!("reading `{}`: {}", filename, e)))?;
        info!("Applying migration file: {}", filename);
        let mut tx = db.begin().await?;
        sqlx::raw_sql(&sql).execute(&mut *tx).await?;
        sqlx::query("INSERT INTO __camp_migrations (filename) VALUES (?)")
            .bind(&filename)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        applied_count += 1;
        info!("Migration `{}` applied.", filename);
    }

    Ok(applied_count)
}

/// Model tables first, then the configured migration files, if any.
pub async fn migrate_all(db: Arc<Db>, settings: &DatabaseSettings) -> Result<()> {
    auto_migrate(db.clone()).await?;
    if let Some(dir) = &settings.migrations_dir {
        let applied = apply_migration_files(db, dir).await?;
        info!("Applied {} migration file(s) from `{}`.", applied, dir);
    }
    Ok(())
}
