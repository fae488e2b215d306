//! Seed data shared by the integration tests.

use arklet_core::credential::hash_secret;
use arklet_metadata::MetadataStore;
use arklet_metadata::models::{ArkRow, KeyRow, NaanRow, ShoulderRow};
use time::OffsetDateTime;
use uuid::Uuid;

/// NAAN registered by [`seed`].
#[allow(dead_code)]
pub const NAAN: i64 = 12345;

/// Second NAAN registered by [`seed`], with its own key.
#[allow(dead_code)]
pub const OTHER_NAAN: i64 = 67890;

/// Shoulder registered under both NAANs.
#[allow(dead_code)]
pub const SHOULDER: &str = "/x5";

/// API key for [`NAAN`].
#[allow(dead_code)]
pub const SECRET: &str = "test-secret-12345";

/// API key for [`OTHER_NAAN`].
#[allow(dead_code)]
pub const OTHER_SECRET: &str = "test-secret-67890";

/// Register both NAANs with a shoulder and an active key each.
#[allow(dead_code)]
pub async fn seed(metadata: &dyn MetadataStore) {
    for (naan, secret) in [(NAAN, SECRET), (OTHER_NAAN, OTHER_SECRET)] {
        let now = OffsetDateTime::now_utc();
        metadata
            .create_naan(&NaanRow {
                naan,
                name: format!("Test authority {naan}"),
                description: String::new(),
                url: format!("https://naan{naan}.example.org/"),
            })
            .await
            .expect("Failed to create naan");
        metadata
            .create_shoulder(&ShoulderRow {
                naan,
                shoulder: SHOULDER.to_string(),
                name: "test shoulder".to_string(),
                description: String::new(),
                created_at: now,
            })
            .await
            .expect("Failed to create shoulder");
        metadata
            .create_key(&KeyRow {
                key_id: Uuid::new_v4(),
                naan,
                key_hash: hash_secret(secret).expect("Failed to hash secret"),
                active: true,
                created_at: now,
                deactivated_at: None,
                description: Some("test key".to_string()),
            })
            .await
            .expect("Failed to create key");
    }
}

/// Build a record under [`SHOULDER`] without going through the minter.
#[allow(dead_code)]
pub fn ark_row(naan: i64, assigned_name: &str, url: &str) -> ArkRow {
    let now = OffsetDateTime::now_utc();
    ArkRow {
        ark: format!("{naan}{SHOULDER}{assigned_name}"),
        naan,
        shoulder: SHOULDER.to_string(),
        assigned_name: assigned_name.to_string(),
        url: url.to_string(),
        metadata: String::new(),
        commitment: String::new(),
        title: String::new(),
        kind: String::new(),
        identifier: String::new(),
        format: String::new(),
        relation: String::new(),
        source: String::new(),
        created_at: now,
        updated_at: now,
    }
}
