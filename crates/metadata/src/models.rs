//! Database models mapping to the metadata schema.

use arklet_core::ark::verify_composition;
use arklet_core::fields::{ArkField, ArkFields};
use arklet_core::{AssignedName, Naan, Shoulder};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

// =============================================================================
// Naming authorities
// =============================================================================

/// Name Assigning Authority record.
#[derive(Debug, Clone, FromRow)]
pub struct NaanRow {
    pub naan: i64,
    pub name: String,
    pub description: String,
    /// Base URL used when an ARK under this NAAN has no local match.
    pub url: String,
}

/// Shoulder record. Keyed by `(naan, shoulder)`.
#[derive(Debug, Clone, FromRow)]
pub struct ShoulderRow {
    pub naan: i64,
    pub shoulder: String,
    pub name: String,
    pub description: String,
    pub created_at: OffsetDateTime,
}

// =============================================================================
// API keys
// =============================================================================

/// API key record. Only the Argon2 hash of the secret is stored.
#[derive(Debug, Clone, FromRow)]
pub struct KeyRow {
    pub key_id: Uuid,
    pub naan: i64,
    pub key_hash: String,
    pub active: bool,
    pub created_at: OffsetDateTime,
    pub deactivated_at: Option<OffsetDateTime>,
    pub description: Option<String>,
}

// =============================================================================
// Identifier records
// =============================================================================

/// A minted identifier and its descriptive fields.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct ArkRow {
    /// Primary key: `{naan}{shoulder}{assigned_name}`.
    pub ark: String,
    pub naan: i64,
    pub shoulder: String,
    pub assigned_name: String,
    pub url: String,
    pub metadata: String,
    pub commitment: String,
    pub title: String,
    #[sqlx(rename = "type")]
    pub kind: String,
    pub identifier: String,
    pub format: String,
    pub relation: String,
    pub source: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl ArkRow {
    /// Build a new record for a freshly assigned name.
    pub fn new(
        naan: Naan,
        shoulder: &Shoulder,
        assigned: AssignedName,
        fields: ArkFields,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            ark: assigned.ark,
            naan: naan as i64,
            shoulder: shoulder.as_str().to_string(),
            assigned_name: assigned.assigned_name,
            url: fields.url,
            metadata: fields.metadata,
            commitment: fields.commitment,
            title: fields.title,
            kind: fields.kind,
            identifier: fields.identifier,
            format: fields.format,
            relation: fields.relation,
            source: fields.source,
            created_at: now,
            updated_at: now,
        }
    }

    /// Descriptive fields as a value.
    pub fn fields(&self) -> ArkFields {
        ArkFields {
            url: self.url.clone(),
            metadata: self.metadata.clone(),
            commitment: self.commitment.clone(),
            title: self.title.clone(),
            kind: self.kind.clone(),
            identifier: self.identifier.clone(),
            format: self.format.clone(),
            relation: self.relation.clone(),
            source: self.source.clone(),
        }
    }

    /// Overwrite the descriptive fields.
    pub fn set_fields(&mut self, fields: ArkFields) {
        self.url = fields.url;
        self.metadata = fields.metadata;
        self.commitment = fields.commitment;
        self.title = fields.title;
        self.kind = fields.kind;
        self.identifier = fields.identifier;
        self.format = fields.format;
        self.relation = fields.relation;
        self.source = fields.source;
    }

    /// Value of a descriptive field.
    pub fn field(&self, field: ArkField) -> &str {
        match field {
            ArkField::Url => &self.url,
            ArkField::Metadata => &self.metadata,
            ArkField::Commitment => &self.commitment,
            ArkField::Title => &self.title,
            ArkField::Type => &self.kind,
            ArkField::Identifier => &self.identifier,
            ArkField::Format => &self.format,
            ArkField::Relation => &self.relation,
            ArkField::Source => &self.source,
        }
    }

    /// Check `ark == naan + shoulder + assigned_name`.
    pub fn verify(&self) -> arklet_core::Result<()> {
        if self.naan < 0 {
            return Err(arklet_core::Error::Integrity {
                expected: "non-negative naan".to_string(),
                actual: self.naan.to_string(),
            });
        }
        verify_composition(
            &self.ark,
            self.naan as Naan,
            &self.shoulder,
            &self.assigned_name,
        )
    }
}

/// Number of identifiers minted under one shoulder.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct ShoulderCount {
    pub shoulder: String,
    pub count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use arklet_core::ark::assign_name;

    #[test]
    fn test_new_row_verifies() {
        let shoulder = Shoulder::new("/b0").unwrap();
        let assigned = assign_name(100, &shoulder, "bcdfghjk");
        let fields = ArkFields {
            title: "A title".to_string(),
            ..Default::default()
        };
        let row = ArkRow::new(100, &shoulder, assigned, fields, OffsetDateTime::now_utc());
        assert_eq!(row.ark, "100/b0bcdfghjk9");
        assert_eq!(row.field(ArkField::Title), "A title");
        row.verify().unwrap();
    }

    #[test]
    fn test_tampered_row_fails_verification() {
        let shoulder = Shoulder::new("/b0").unwrap();
        let assigned = assign_name(100, &shoulder, "bcdfghjk");
        let mut row = ArkRow::new(
            100,
            &shoulder,
            assigned,
            ArkFields::default(),
            OffsetDateTime::now_utc(),
        );
        row.shoulder = "/b1".to_string();
        assert!(row.verify().is_err());
    }
}
