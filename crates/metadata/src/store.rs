//! Metadata store trait and the SQLite implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::repos::{ArkRepo, KeyRepo, NaanRepo, ShoulderRepo};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore: NaanRepo + ShoulderRepo + KeyRepo + ArkRepo + Send + Sync {
    /// Run database migrations.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;
}

/// SQLite-based metadata store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path` and apply the schema.
    pub async fn new(path: impl AsRef<Path>, busy_timeout_secs: Option<u64>) -> MetadataResult<Self> {
        let path = path.as_ref();
        let busy_timeout = Duration::from_secs(busy_timeout_secs.unwrap_or(5));

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(busy_timeout);

        let pool = SqlitePoolOptions::new()
            // A single connection serializes writers; the unique key on arks
            // still decides collisions.
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;

        tracing::debug!(path = %path.display(), "opened SQLite metadata store");
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

// Implement all the repository traits for SqliteStore
mod sqlite_impl {
    use super::*;
    use crate::models::*;
    use crate::repos::arks::{touched_fields, update_set_clause};
    use arklet_core::ArkUpdate;
    use sqlx::query::Query;
    use time::OffsetDateTime;
    use uuid::Uuid;

    type SqliteQuery<'q> = Query<'q, Sqlite, <Sqlite as sqlx::Database>::Arguments<'q>>;

    const INSERT_ARK_SQL: &str = r#"
        INSERT INTO arks (
            ark, naan, shoulder, assigned_name, url, metadata, commitment, title,
            "type", identifier, format, relation, source, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
    "#;

    fn bind_insert(ark: &ArkRow) -> SqliteQuery<'_> {
        sqlx::query(INSERT_ARK_SQL)
            .bind(&ark.ark)
            .bind(ark.naan)
            .bind(&ark.shoulder)
            .bind(&ark.assigned_name)
            .bind(&ark.url)
            .bind(&ark.metadata)
            .bind(&ark.commitment)
            .bind(&ark.title)
            .bind(&ark.kind)
            .bind(&ark.identifier)
            .bind(&ark.format)
            .bind(&ark.relation)
            .bind(&ark.source)
            .bind(ark.created_at)
            .bind(ark.updated_at)
    }

    #[async_trait]
    impl NaanRepo for SqliteStore {
        async fn create_naan(&self, naan: &NaanRow) -> MetadataResult<()> {
            sqlx::query("INSERT INTO naans (naan, name, description, url) VALUES (?, ?, ?, ?)")
                .bind(naan.naan)
                .bind(&naan.name)
                .bind(&naan.description)
                .bind(&naan.url)
                .execute(&self.pool)
                .await
                .map_err(|e| MetadataError::from_insert(e, format!("naan {}", naan.naan)))?;
            Ok(())
        }

        async fn get_naan(&self, naan: i64) -> MetadataResult<Option<NaanRow>> {
            let row = sqlx::query_as::<_, NaanRow>("SELECT * FROM naans WHERE naan = ?")
                .bind(naan)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn list_naans(&self) -> MetadataResult<Vec<NaanRow>> {
            let rows = sqlx::query_as::<_, NaanRow>("SELECT * FROM naans ORDER BY naan")
                .fetch_all(&self.pool)
                .await?;
            Ok(rows)
        }
    }

    #[async_trait]
    impl ShoulderRepo for SqliteStore {
        async fn create_shoulder(&self, shoulder: &ShoulderRow) -> MetadataResult<()> {
            sqlx::query(
                "INSERT INTO shoulders (naan, shoulder, name, description, created_at) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(shoulder.naan)
            .bind(&shoulder.shoulder)
            .bind(&shoulder.name)
            .bind(&shoulder.description)
            .bind(shoulder.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                MetadataError::from_insert(
                    e,
                    format!("shoulder {}{}", shoulder.naan, shoulder.shoulder),
                )
            })?;
            Ok(())
        }

        async fn get_shoulder(
            &self,
            naan: i64,
            shoulder: &str,
        ) -> MetadataResult<Option<ShoulderRow>> {
            let row = sqlx::query_as::<_, ShoulderRow>(
                "SELECT * FROM shoulders WHERE naan = ? AND shoulder = ?",
            )
            .bind(naan)
            .bind(shoulder)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn list_shoulders(&self, naan: i64) -> MetadataResult<Vec<ShoulderRow>> {
            let rows = sqlx::query_as::<_, ShoulderRow>(
                "SELECT * FROM shoulders WHERE naan = ? ORDER BY shoulder",
            )
            .bind(naan)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }
    }

    #[async_trait]
    impl KeyRepo for SqliteStore {
        async fn create_key(&self, key: &KeyRow) -> MetadataResult<()> {
            sqlx::query(
                r#"
                INSERT INTO api_keys (
                    key_id, naan, key_hash, active, created_at, deactivated_at, description
                ) VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(key.key_id)
            .bind(key.naan)
            .bind(&key.key_hash)
            .bind(key.active)
            .bind(key.created_at)
            .bind(key.deactivated_at)
            .bind(&key.description)
            .execute(&self.pool)
            .await
            .map_err(|e| MetadataError::from_insert(e, format!("key {}", key.key_id)))?;
            Ok(())
        }

        async fn list_active_keys(&self, naan: i64) -> MetadataResult<Vec<KeyRow>> {
            let rows = sqlx::query_as::<_, KeyRow>(
                "SELECT * FROM api_keys WHERE naan = ? AND active = 1",
            )
            .bind(naan)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn list_keys(&self, naan: i64) -> MetadataResult<Vec<KeyRow>> {
            let rows = sqlx::query_as::<_, KeyRow>(
                "SELECT * FROM api_keys WHERE naan = ? ORDER BY created_at",
            )
            .bind(naan)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn deactivate_key(&self, key_id: Uuid, at: OffsetDateTime) -> MetadataResult<()> {
            let result = sqlx::query(
                "UPDATE api_keys SET active = 0, deactivated_at = ? WHERE key_id = ? AND active = 1",
            )
            .bind(at)
            .bind(key_id)
            .execute(&self.pool)
            .await?;
            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!("active key {key_id}")));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl ArkRepo for SqliteStore {
        async fn create_ark(&self, ark: &ArkRow) -> MetadataResult<()> {
            bind_insert(ark)
                .execute(&self.pool)
                .await
                .map_err(|e| MetadataError::from_insert(e, format!("ark {}", ark.ark)))?;
            Ok(())
        }

        async fn create_arks(&self, arks: &[ArkRow]) -> MetadataResult<()> {
            let mut tx = self.pool.begin().await?;
            for ark in arks {
                bind_insert(ark)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| MetadataError::from_insert(e, format!("ark {}", ark.ark)))?;
            }
            tx.commit().await?;
            Ok(())
        }

        async fn get_ark(&self, ark: &str) -> MetadataResult<Option<ArkRow>> {
            let row = sqlx::query_as::<_, ArkRow>("SELECT * FROM arks WHERE ark = ?")
                .bind(ark)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn get_arks(&self, keys: &[String]) -> MetadataResult<Vec<ArkRow>> {
            if keys.is_empty() {
                return Ok(Vec::new());
            }

            // SQLite has a limit of ~999 parameters, so we batch if needed
            const BATCH_SIZE: usize = 900;
            let mut result = Vec::with_capacity(keys.len());

            for batch in keys.chunks(BATCH_SIZE) {
                let placeholders: Vec<&str> = batch.iter().map(|_| "?").collect();
                let query = format!(
                    "SELECT * FROM arks WHERE ark IN ({})",
                    placeholders.join(", ")
                );

                let mut query_builder = sqlx::query_as::<_, ArkRow>(&query);
                for key in batch {
                    query_builder = query_builder.bind(key);
                }
                result.extend(query_builder.fetch_all(&self.pool).await?);
            }
            Ok(result)
        }

        async fn update_ark(&self, ark: &ArkRow) -> MetadataResult<()> {
            let result = sqlx::query(
                r#"
                UPDATE arks SET
                    url = ?, metadata = ?, commitment = ?, title = ?, "type" = ?,
                    identifier = ?, format = ?, relation = ?, source = ?, updated_at = ?
                WHERE ark = ?
                "#,
            )
            .bind(&ark.url)
            .bind(&ark.metadata)
            .bind(&ark.commitment)
            .bind(&ark.title)
            .bind(&ark.kind)
            .bind(&ark.identifier)
            .bind(&ark.format)
            .bind(&ark.relation)
            .bind(&ark.source)
            .bind(ark.updated_at)
            .bind(&ark.ark)
            .execute(&self.pool)
            .await?;
            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!("ark {}", ark.ark)));
            }
            Ok(())
        }

        async fn update_arks(
            &self,
            updates: &[(String, ArkUpdate)],
            at: OffsetDateTime,
        ) -> MetadataResult<u64> {
            let fields = touched_fields(updates);
            let sql = format!(
                "UPDATE arks SET {} WHERE ark = ?",
                update_set_clause(&fields, |_| "?".to_string())
            );

            let mut updated = 0;
            let mut tx = self.pool.begin().await?;
            for (ark, update) in updates {
                let mut query = sqlx::query(&sql);
                for field in &fields {
                    query = query.bind(update.get(*field));
                }
                let result = query.bind(at).bind(ark).execute(&mut *tx).await?;
                updated += result.rows_affected();
            }
            tx.commit().await?;
            Ok(updated)
        }

        async fn count_arks_by_shoulder(&self, naan: i64) -> MetadataResult<Vec<ShoulderCount>> {
            let rows = sqlx::query_as::<_, ShoulderCount>(
                "SELECT shoulder, COUNT(*) AS count FROM arks WHERE naan = ? GROUP BY shoulder ORDER BY shoulder",
            )
            .bind(naan)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn sample_arks(
            &self,
            naan: i64,
            shoulder: &str,
            limit: u32,
        ) -> MetadataResult<Vec<ArkRow>> {
            let rows = sqlx::query_as::<_, ArkRow>(
                "SELECT * FROM arks WHERE naan = ? AND shoulder = ? ORDER BY RANDOM() LIMIT ?",
            )
            .bind(naan)
            .bind(shoulder)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn delete_arks_for_shoulder(&self, naan: i64, shoulder: &str) -> MetadataResult<u64> {
            let result = sqlx::query("DELETE FROM arks WHERE naan = ? AND shoulder = ?")
                .bind(naan)
                .bind(shoulder)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected())
        }
    }
}

const SCHEMA_SQL: &str = r#"
-- Naming authorities. Never updated or deleted once referenced.
CREATE TABLE IF NOT EXISTS naans (
    naan INTEGER PRIMARY KEY CHECK (naan >= 0),
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    url TEXT NOT NULL
);

-- Shoulders
CREATE TABLE IF NOT EXISTS shoulders (
    naan INTEGER NOT NULL REFERENCES naans(naan) ON DELETE RESTRICT,
    shoulder TEXT NOT NULL CHECK (substr(shoulder, 1, 1) = '/'),
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    PRIMARY KEY (naan, shoulder)
);

-- API keys (Argon2 hashes only)
CREATE TABLE IF NOT EXISTS api_keys (
    key_id BLOB PRIMARY KEY,
    naan INTEGER NOT NULL REFERENCES naans(naan) ON DELETE RESTRICT,
    key_hash TEXT NOT NULL,
    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    deactivated_at TEXT,
    description TEXT
);
CREATE INDEX IF NOT EXISTS idx_api_keys_naan_active ON api_keys(naan, active);

-- Identifier records
CREATE TABLE IF NOT EXISTS arks (
    ark TEXT PRIMARY KEY,
    naan INTEGER NOT NULL REFERENCES naans(naan) ON DELETE RESTRICT,
    shoulder TEXT NOT NULL,
    assigned_name TEXT NOT NULL,
    url TEXT NOT NULL DEFAULT '',
    metadata TEXT NOT NULL DEFAULT '',
    commitment TEXT NOT NULL DEFAULT '',
    title TEXT NOT NULL DEFAULT '',
    "type" TEXT NOT NULL DEFAULT '',
    identifier TEXT NOT NULL DEFAULT '',
    format TEXT NOT NULL DEFAULT '',
    relation TEXT NOT NULL DEFAULT '',
    source TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    FOREIGN KEY (naan, shoulder) REFERENCES shoulders(naan, shoulder) ON DELETE RESTRICT
);
CREATE INDEX IF NOT EXISTS idx_arks_naan_shoulder ON arks(naan, shoulder);
"#;
