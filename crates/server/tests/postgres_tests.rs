//! PostgreSQL integration tests using testcontainers.
//!
//! They require Docker to be running. Set SKIP_POSTGRES_TESTS=1 to skip.

mod common;

use arklet_core::Shoulder;
use arklet_core::credential::generate_secret;
use arklet_server::minter::{MintRequest, Minter};
use common::{NAAN, POSTGRES_CONTAINER_START_ERR_PREFIX, PostgresTestMetadata, SECRET, SHOULDER, seed};
use std::collections::BTreeSet;

/// Try to create a PostgreSQL test store, skipping if Docker is unavailable
/// or SKIP_POSTGRES_TESTS is set.
///
/// Only container-start failures cause a skip. Schema or connection errors
/// still panic so real regressions are not silently swallowed.
async fn postgres_or_skip() -> Option<PostgresTestMetadata> {
    if std::env::var("SKIP_POSTGRES_TESTS").is_ok() {
        return None;
    }
    match PostgresTestMetadata::new().await {
        Ok(metadata) => Some(metadata),
        Err(err) => {
            let msg = err.to_string();
            if msg.contains(POSTGRES_CONTAINER_START_ERR_PREFIX) {
                eprintln!("Skipping PostgreSQL test (Docker unavailable): {msg}");
                None
            } else {
                panic!("PostgreSQL test setup failed: {msg}");
            }
        }
    }
}

#[tokio::test]
async fn test_postgres_concurrent_minting_yields_unique_arks() {
    let Some(metadata) = postgres_or_skip().await else {
        return;
    };
    let store = metadata.store();
    seed(store.as_ref()).await;

    let minter = Minter::random(4);
    let request = MintRequest {
        shoulder: Shoulder::new(SHOULDER).unwrap(),
        fields: Default::default(),
    };

    let mut handles = Vec::new();
    for _ in 0..20 {
        let store = store.clone();
        let minter = minter.clone();
        let request = request.clone();
        handles.push(tokio::spawn(async move {
            minter
                .mint_one(store.as_ref(), NAAN as u64, &request)
                .await
                .map(|row| row.ark)
        }));
    }

    let mut arks = BTreeSet::new();
    for handle in handles {
        arks.insert(handle.await.unwrap().expect("mint failed"));
    }
    assert_eq!(arks.len(), 20);
    assert_eq!(store.count_arks_by_shoulder(NAAN).await.unwrap()[0].count, 20);
}

#[tokio::test]
async fn test_postgres_authorization() {
    let Some(metadata) = postgres_or_skip().await else {
        return;
    };
    let store = metadata.store();
    seed(store.as_ref()).await;

    let authorized = arklet_server::authz::authorize(store.as_ref(), NAAN as u64, Some(SECRET))
        .await
        .unwrap();
    assert!(authorized.is_some());

    let stranger = generate_secret();
    let denied = arklet_server::authz::authorize(store.as_ref(), NAAN as u64, Some(&stranger))
        .await
        .unwrap();
    assert!(denied.is_none());
}
