//! PostgreSQL-based metadata store implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::models::*;
use crate::repos::arks::{touched_fields, update_set_clause};
use crate::repos::{ArkRepo, KeyRepo, NaanRepo, ShoulderRepo};
use crate::store::MetadataStore;
use arklet_core::ArkUpdate;
use arklet_core::config::PgSslMode;
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode as SqlxPgSslMode};
use sqlx::query::Query;
use sqlx::{Pool, Postgres};
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;

/// PostgreSQL schema (embedded).
const POSTGRES_SCHEMA: &str = include_str!("postgres_schema.sql");

fn postgres_schema_statements(schema: &str) -> Vec<&str> {
    schema
        .split(';')
        .filter_map(|statement| {
            let trimmed = statement.trim();
            if trimmed.is_empty() {
                return None;
            }
            let has_sql = trimmed.lines().any(|line| {
                let line = line.trim();
                !line.is_empty() && !line.starts_with("--")
            });
            has_sql.then_some(trimmed)
        })
        .collect()
}

type PgQuery<'q> = Query<'q, Postgres, <Postgres as sqlx::Database>::Arguments<'q>>;

const INSERT_ARK_SQL: &str = r#"
    INSERT INTO arks (
        ark, naan, shoulder, assigned_name, url, metadata, commitment, title,
        "type", identifier, format, relation, source, created_at, updated_at
    ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
"#;

fn bind_insert(ark: &ArkRow) -> PgQuery<'_> {
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

/// PostgreSQL-based metadata store.
pub struct PostgresStore {
    pool: Pool<Postgres>,
}

impl PostgresStore {
    /// Create a new PostgreSQL store from a connection URL.
    pub async fn from_url(
        url: &str,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> MetadataResult<Self> {
        let opts = PgConnectOptions::from_str(url)?;
        Self::connect(opts, max_connections, statement_timeout_ms).await
    }

    /// Create a new PostgreSQL store from individual connection parameters,
    /// so the password can come from the environment.
    #[allow(clippy::too_many_arguments)]
    pub async fn from_params(
        host: &str,
        port: u16,
        username: Option<&str>,
        password: Option<&str>,
        database: &str,
        ssl_mode: Option<PgSslMode>,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> MetadataResult<Self> {
        let mut opts = PgConnectOptions::new()
            .host(host)
            .port(port)
            .database(database);

        if let Some(user) = username {
            opts = opts.username(user);
        }

        if let Some(pass) = password {
            opts = opts.password(pass);
        }

        if let Some(mode) = ssl_mode {
            let sqlx_mode = match mode {
                PgSslMode::Disable => SqlxPgSslMode::Disable,
                PgSslMode::Prefer => SqlxPgSslMode::Prefer,
                PgSslMode::Require => SqlxPgSslMode::Require,
            };
            opts = opts.ssl_mode(sqlx_mode);
        }

        // Log connection info without password
        tracing::info!(
            host = host,
            port = port,
            database = database,
            username = username.unwrap_or("<none>"),
            ssl_mode = ?ssl_mode,
            "Connecting to PostgreSQL with individual parameters"
        );

        Self::connect(opts, max_connections, statement_timeout_ms).await
    }

    async fn connect(
        mut opts: PgConnectOptions,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> MetadataResult<Self> {
        if let Some(timeout_ms) = statement_timeout_ms {
            opts = opts.options([("statement_timeout", format!("{}ms", timeout_ms))]);
            tracing::info!("PostgreSQL statement_timeout set to {}ms", timeout_ms);
        }

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;

        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for PostgresStore {
    async fn migrate(&self) -> MetadataResult<()> {
        // PostgreSQL doesn't allow multiple statements in a single prepared statement,
        // so we split the schema and execute each statement separately.
        for statement in postgres_schema_statements(POSTGRES_SCHEMA) {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl NaanRepo for PostgresStore {
    async fn create_naan(&self, naan: &NaanRow) -> MetadataResult<()> {
        sqlx::query("INSERT INTO naans (naan, name, description, url) VALUES ($1, $2, $3, $4)")
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
        let row = sqlx::query_as::<_, NaanRow>("SELECT * FROM naans WHERE naan = $1")
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
impl ShoulderRepo for PostgresStore {
    async fn create_shoulder(&self, shoulder: &ShoulderRow) -> MetadataResult<()> {
        sqlx::query(
            "INSERT INTO shoulders (naan, shoulder, name, description, created_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(shoulder.naan)
        .bind(&shoulder.shoulder)
        .bind(&shoulder.name)
        .bind(&shoulder.description)
        .bind(shoulder.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            MetadataError::from_insert(e, format!("shoulder {}{}", shoulder.naan, shoulder.shoulder))
        })?;
        Ok(())
    }

    async fn get_shoulder(&self, naan: i64, shoulder: &str) -> MetadataResult<Option<ShoulderRow>> {
        let row = sqlx::query_as::<_, ShoulderRow>(
            "SELECT * FROM shoulders WHERE naan = $1 AND shoulder = $2",
        )
        .bind(naan)
        .bind(shoulder)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list_shoulders(&self, naan: i64) -> MetadataResult<Vec<ShoulderRow>> {
        let rows = sqlx::query_as::<_, ShoulderRow>(
            "SELECT * FROM shoulders WHERE naan = $1 ORDER BY shoulder",
        )
        .bind(naan)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[async_trait]
impl KeyRepo for PostgresStore {
    async fn create_key(&self, key: &KeyRow) -> MetadataResult<()> {
        sqlx::query(
            r#"
            INSERT INTO api_keys (
                key_id, naan, key_hash, active, created_at, deactivated_at, description
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
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
            "SELECT * FROM api_keys WHERE naan = $1 AND active",
        )
        .bind(naan)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list_keys(&self, naan: i64) -> MetadataResult<Vec<KeyRow>> {
        let rows = sqlx::query_as::<_, KeyRow>(
            "SELECT * FROM api_keys WHERE naan = $1 ORDER BY created_at",
        )
        .bind(naan)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn deactivate_key(&self, key_id: Uuid, at: OffsetDateTime) -> MetadataResult<()> {
        let result = sqlx::query(
            "UPDATE api_keys SET active = FALSE, deactivated_at = $1 WHERE key_id = $2 AND active",
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
impl ArkRepo for PostgresStore {
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
        let row = sqlx::query_as::<_, ArkRow>("SELECT * FROM arks WHERE ark = $1")
            .bind(ark)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn get_arks(&self, keys: &[String]) -> MetadataResult<Vec<ArkRow>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, ArkRow>("SELECT * FROM arks WHERE ark = ANY($1)")
            .bind(keys)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn update_ark(&self, ark: &ArkRow) -> MetadataResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE arks SET
                url = $1, metadata = $2, commitment = $3, title = $4, "type" = $5,
                identifier = $6, format = $7, relation = $8, source = $9, updated_at = $10
            WHERE ark = $11
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
            "UPDATE arks SET {} WHERE ark = ${}",
            update_set_clause(&fields, |i| format!("${i}")),
            fields.len() + 2
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
            "SELECT shoulder, COUNT(*) AS count FROM arks WHERE naan = $1 GROUP BY shoulder ORDER BY shoulder",
        )
        .bind(naan)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn sample_arks(&self, naan: i64, shoulder: &str, limit: u32) -> MetadataResult<Vec<ArkRow>> {
        let rows = sqlx::query_as::<_, ArkRow>(
            "SELECT * FROM arks WHERE naan = $1 AND shoulder = $2 ORDER BY RANDOM() LIMIT $3",
        )
        .bind(naan)
        .bind(shoulder)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn delete_arks_for_shoulder(&self, naan: i64, shoulder: &str) -> MetadataResult<u64> {
        let result = sqlx::query("DELETE FROM arks WHERE naan = $1 AND shoulder = $2")
            .bind(naan)
            .bind(shoulder)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
