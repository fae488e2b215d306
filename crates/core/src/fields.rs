//! Descriptive fields carried by an ARK record.
//!
//! The set of fields is closed. Updates go through [`ArkUpdate`], which only
//! has slots for these fields, so the primary key and assigned name can never
//! be set from a request.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A settable descriptive field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArkField {
    Url,
    Metadata,
    Commitment,
    Title,
    Type,
    Identifier,
    Format,
    Relation,
    Source,
}

/// Semantic annotation published for a field in JSON inflections.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldAnnotation {
    pub property: Option<&'static str>,
    pub datatype: &'static str,
}

impl ArkField {
    /// Every field, in storage column order.
    pub const ALL: [ArkField; 9] = [
        ArkField::Url,
        ArkField::Metadata,
        ArkField::Commitment,
        ArkField::Title,
        ArkField::Type,
        ArkField::Identifier,
        ArkField::Format,
        ArkField::Relation,
        ArkField::Source,
    ];

    /// Column / JSON key name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Url => "url",
            Self::Metadata => "metadata",
            Self::Commitment => "commitment",
            Self::Title => "title",
            Self::Type => "type",
            Self::Identifier => "identifier",
            Self::Format => "format",
            Self::Relation => "relation",
            Self::Source => "source",
        }
    }

    /// Whether a non-empty value must be an absolute URL.
    pub fn is_url(&self) -> bool {
        matches!(self, Self::Url | Self::Source)
    }

    /// Fixed annotation table consumed by existing JSON clients.
    ///
    /// `metadata` has no annotation at all.
    pub fn annotation(&self) -> Option<FieldAnnotation> {
        let (property, datatype) = match self {
            Self::Title => (Some("http://purl.org/dc/elements/1.1/title"), "xsd:string"),
            Self::Type => (Some("http://purl.org/dc/elements/1.1/type"), "xsd:string"),
            Self::Commitment => (None, "xsd:string"),
            Self::Identifier => (Some("http://purl.org/dc/elements/1.1/identifier"), "xsd:string"),
            Self::Format => (Some("http://purl.org/dc/elements/1.1/format"), "xsd:string"),
            Self::Relation => (Some("http://purl.org/dc/elements/1.1/relation"), "xsd:anyURI"),
            Self::Source => (Some("http://purl.org/dc/elements/1.1/source"), "xsd:anyURI"),
            Self::Url => (Some("https://schema.org/url"), "xsd:anyURI"),
            Self::Metadata => return None,
        };
        Some(FieldAnnotation { property, datatype })
    }
}

impl fmt::Display for ArkField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validate a URL-valued field. Empty means "unset" and is always accepted.
pub fn validate_url(field: ArkField, value: &str) -> crate::Result<()> {
    if value.is_empty() {
        return Ok(());
    }
    let parsed = url::Url::parse(value).map_err(|e| crate::Error::InvalidField {
        field: field.as_str(),
        reason: format!("enter a valid URL ({e})"),
    })?;
    if !matches!(parsed.scheme(), "http" | "https" | "ftp" | "ftps") || parsed.host().is_none() {
        return Err(crate::Error::InvalidField {
            field: field.as_str(),
            reason: "enter a valid URL".to_string(),
        });
    }
    Ok(())
}

/// Current values of every descriptive field. Unset fields are empty strings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArkFields {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub metadata: String,
    #[serde(default)]
    pub commitment: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub identifier: String,
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub relation: String,
    #[serde(default)]
    pub source: String,
}

impl ArkFields {
    /// Value of a single field.
    pub fn get(&self, field: ArkField) -> &str {
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

    fn slot_mut(&mut self, field: ArkField) -> &mut String {
        match field {
            ArkField::Url => &mut self.url,
            ArkField::Metadata => &mut self.metadata,
            ArkField::Commitment => &mut self.commitment,
            ArkField::Title => &mut self.title,
            ArkField::Type => &mut self.kind,
            ArkField::Identifier => &mut self.identifier,
            ArkField::Format => &mut self.format,
            ArkField::Relation => &mut self.relation,
            ArkField::Source => &mut self.source,
        }
    }

    /// Build the initial field set for a new record from an update-shaped request.
    pub fn from_update(update: &ArkUpdate) -> Self {
        let mut fields = Self::default();
        update.apply(&mut fields);
        fields
    }
}

/// A partial update: `Some` slots are written, `None` slots are left alone.
///
/// JSON `null` and absent keys both deserialize to `None`; unknown keys are
/// ignored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArkUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commitment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl ArkUpdate {
    /// Requested value for a field, if any.
    pub fn get(&self, field: ArkField) -> Option<&str> {
        let slot = match field {
            ArkField::Url => &self.url,
            ArkField::Metadata => &self.metadata,
            ArkField::Commitment => &self.commitment,
            ArkField::Title => &self.title,
            ArkField::Type => &self.kind,
            ArkField::Identifier => &self.identifier,
            ArkField::Format => &self.format,
            ArkField::Relation => &self.relation,
            ArkField::Source => &self.source,
        };
        slot.as_deref()
    }

    fn slot_mut(&mut self, field: ArkField) -> &mut Option<String> {
        match field {
            ArkField::Url => &mut self.url,
            ArkField::Metadata => &mut self.metadata,
            ArkField::Commitment => &mut self.commitment,
            ArkField::Title => &mut self.title,
            ArkField::Type => &mut self.kind,
            ArkField::Identifier => &mut self.identifier,
            ArkField::Format => &mut self.format,
            ArkField::Relation => &mut self.relation,
            ArkField::Source => &mut self.source,
        }
    }

    /// Fold a later update into this one; its provided slots win.
    pub fn merge(&mut self, later: &ArkUpdate) {
        for field in ArkField::ALL {
            if let Some(value) = later.get(field) {
                *self.slot_mut(field) = Some(value.to_string());
            }
        }
    }

    /// Fields this update writes.
    pub fn touched(&self) -> BTreeSet<ArkField> {
        ArkField::ALL
            .into_iter()
            .filter(|f| self.get(*f).is_some())
            .collect()
    }

    /// Whether the update writes nothing.
    pub fn is_empty(&self) -> bool {
        ArkField::ALL.iter().all(|f| self.get(*f).is_none())
    }

    /// Check every provided value.
    pub fn validate(&self) -> crate::Result<()> {
        for field in ArkField::ALL {
            if let Some(value) = self.get(field)
                && field.is_url()
            {
                validate_url(field, value)?;
            }
        }
        Ok(())
    }

    /// Write the provided slots into `fields`.
    pub fn apply(&self, fields: &mut ArkFields) {
        for field in ArkField::ALL {
            if let Some(value) = self.get(field) {
                *fields.slot_mut(field) = value.to_string();
            }
        }
    }
}
