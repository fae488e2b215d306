//! Identifier allocation.
//!
//! A candidate name is generated, its check character appended, and the
//! record inserted. The store's unique key on `arks.ark` is the only thing
//! that detects a collision; on `AlreadyExists` the minter tries again with
//! a fresh name, up to [`MAX_MINT_ATTEMPTS`] times.

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use arklet_core::ark::assign_name;
use arklet_core::{ArkFields, MAX_MINT_ATTEMPTS, Naan, NoidGenerator, RandomNoid, Shoulder};
use arklet_metadata::models::ArkRow;
use arklet_metadata::{MetadataError, MetadataStore};
use std::sync::Arc;
use time::OffsetDateTime;

/// One record to allocate in a batch.
#[derive(Clone, Debug)]
pub struct MintRequest {
    pub shoulder: Shoulder,
    pub fields: ArkFields,
}

/// Allocates new identifiers.
#[derive(Clone)]
pub struct Minter {
    generator: Arc<dyn NoidGenerator>,
    noid_length: usize,
}

impl Minter {
    pub fn new(generator: Arc<dyn NoidGenerator>, noid_length: usize) -> Self {
        Self {
            generator,
            noid_length,
        }
    }

    /// Minter backed by the OS random source.
    pub fn random(noid_length: usize) -> Self {
        Self::new(Arc::new(RandomNoid), noid_length)
    }

    fn candidate(&self, naan: Naan, request: &MintRequest, now: OffsetDateTime) -> ArkRow {
        let noid = self.generator.generate(self.noid_length);
        let assigned = assign_name(naan, &request.shoulder, &noid);
        ArkRow::new(naan, &request.shoulder, assigned, request.fields.clone(), now)
    }

    /// Allocate and persist one record.
    pub async fn mint_one(
        &self,
        metadata: &dyn MetadataStore,
        naan: Naan,
        request: &MintRequest,
    ) -> ApiResult<ArkRow> {
        let mut collisions = 0;
        for _ in 0..MAX_MINT_ATTEMPTS {
            let row = self.candidate(naan, request, OffsetDateTime::now_utc());
            match metadata.create_ark(&row).await {
                Ok(()) => {
                    record_success(&row.ark, collisions, 1);
                    return Ok(row);
                }
                Err(MetadataError::AlreadyExists(_)) => {
                    collisions += 1;
                    tracing::debug!(ark = %row.ark, "generated name already taken");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(exhausted(naan, collisions))
    }

    /// Allocate and persist a set of records atomically.
    ///
    /// The whole set is generated and inserted in one transaction. If any
    /// name is taken the transaction rolls back and every name is
    /// regenerated; attempts are counted per set, not per record.
    pub async fn mint_batch(
        &self,
        metadata: &dyn MetadataStore,
        naan: Naan,
        requests: &[MintRequest],
    ) -> ApiResult<Vec<ArkRow>> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }

        let mut collisions = 0;
        for _ in 0..MAX_MINT_ATTEMPTS {
            let now = OffsetDateTime::now_utc();
            let rows: Vec<ArkRow> = requests
                .iter()
                .map(|request| self.candidate(naan, request, now))
                .collect();

            // Names repeated inside the set would fail the insert anyway.
            let mut keys: Vec<&str> = rows.iter().map(|r| r.ark.as_str()).collect();
            keys.sort_unstable();
            keys.dedup();
            if keys.len() != rows.len() {
                collisions += 1;
                continue;
            }

            match metadata.create_arks(&rows).await {
                Ok(()) => {
                    record_success(&rows[0].ark, collisions, rows.len());
                    return Ok(rows);
                }
                Err(MetadataError::AlreadyExists(_)) => collisions += 1,
                Err(e) => return Err(e.into()),
            }
        }
        Err(exhausted(naan, collisions))
    }
}

fn record_success(ark: &str, collisions: usize, count: usize) {
    metrics::ARKS_MINTED.inc_by(count as u64);
    if collisions > 0 {
        metrics::MINT_COLLISIONS.inc_by(collisions as u64);
        tracing::warn!(ark, collisions, "ark created after collisions");
    } else {
        tracing::info!(ark, count, "minted");
    }
}

fn exhausted(naan: Naan, collisions: usize) -> ApiError {
    metrics::MINT_COLLISIONS.inc_by(collisions as u64);
    metrics::MINT_EXHAUSTED.inc();
    tracing::error!(naan, collisions, "gave up creating ark");
    ApiError::AllocationExhausted { collisions }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arklet_metadata::SqliteStore;
    use arklet_metadata::models::{NaanRow, ShoulderRow};
    use arklet_metadata::repos::{ArkRepo, NaanRepo, ShoulderRepo};
    use std::sync::Mutex;

    /// Replays a fixed list of names, repeating the last one forever.
    struct ScriptedNoid(Mutex<Vec<&'static str>>);

    impl ScriptedNoid {
        fn new(names: &[&'static str]) -> Arc<Self> {
            let mut names = names.to_vec();
            names.reverse();
            Arc::new(Self(Mutex::new(names)))
        }
    }

    impl NoidGenerator for ScriptedNoid {
        fn generate(&self, _length: usize) -> String {
            let mut names = self.0.lock().unwrap();
            if names.len() > 1 {
                names.pop().unwrap().to_string()
            } else {
                names[0].to_string()
            }
        }
    }

    async fn seeded_store() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::new(dir.path().join("arklet.db"), None)
            .await
            .unwrap();
        store
            .create_naan(&NaanRow {
                naan: 100,
                name: "Test".to_string(),
                description: String::new(),
                url: "https://example.org".to_string(),
            })
            .await
            .unwrap();
        store
            .create_shoulder(&ShoulderRow {
                naan: 100,
                shoulder: "/b0".to_string(),
                name: "b0".to_string(),
                description: String::new(),
                created_at: OffsetDateTime::now_utc(),
            })
            .await
            .unwrap();
        (dir, store)
    }

    fn request() -> MintRequest {
        MintRequest {
            shoulder: Shoulder::new("/b0").unwrap(),
            fields: ArkFields::default(),
        }
    }

    #[tokio::test]
    async fn test_mint_shape() {
        let (_dir, store) = seeded_store().await;
        let minter = Minter::random(8);
        let row = minter.mint_one(&store, 100, &request()).await.unwrap();
        assert!(row.ark.starts_with("100/b0"));
        assert_eq!(row.assigned_name.len(), 9);
        row.verify().unwrap();
        assert!(store.get_ark(&row.ark).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_retries_after_collision() {
        let (_dir, store) = seeded_store().await;
        let minter = Minter::new(ScriptedNoid::new(&["bbbb", "bbbb", "cccc"]), 4);
        let first = minter.mint_one(&store, 100, &request()).await.unwrap();
        let second = minter.mint_one(&store, 100, &request()).await.unwrap();
        assert_ne!(first.ark, second.ark);
        assert!(second.assigned_name.starts_with("cccc"));
    }

    #[tokio::test]
    async fn test_gives_up_after_ten_attempts() {
        let (_dir, store) = seeded_store().await;
        let minter = Minter::new(ScriptedNoid::new(&["bbbb"]), 4);
        minter.mint_one(&store, 100, &request()).await.unwrap();

        let err = minter.mint_one(&store, 100, &request()).await.unwrap_err();
        assert!(matches!(
            err,
            ApiError::AllocationExhausted { collisions: 10 }
        ));
        assert_eq!(store.count_arks_by_shoulder(100).await.unwrap()[0].count, 1);
    }

    #[tokio::test]
    async fn test_batch_regenerates_whole_set() {
        let (_dir, store) = seeded_store().await;
        let taken = Minter::new(ScriptedNoid::new(&["dddd"]), 4)
            .mint_one(&store, 100, &request())
            .await
            .unwrap();

        // First set collides with the stored record, second is clean.
        let minter = Minter::new(ScriptedNoid::new(&["bbbb", "dddd", "ffff", "gggg"]), 4);
        let rows = minter
            .mint_batch(&store, 100, &[request(), request()])
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].assigned_name.starts_with("ffff"));
        assert!(rows[1].assigned_name.starts_with("gggg"));
        // The rolled-back first attempt left nothing behind.
        let rolled_back = assign_name(100, &Shoulder::new("/b0").unwrap(), "bbbb");
        assert!(store.get_ark(&rolled_back.ark).await.unwrap().is_none());
        assert!(store.get_ark(&taken.ark).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_batch_exhaustion_writes_nothing() {
        let (_dir, store) = seeded_store().await;
        let minter = Minter::new(ScriptedNoid::new(&["bbbb"]), 4);
        let err = minter
            .mint_batch(&store, 100, &[request(), request()])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApiError::AllocationExhausted { collisions: 10 }
        ));
        assert!(store.count_arks_by_shoulder(100).await.unwrap().is_empty());
    }
}
