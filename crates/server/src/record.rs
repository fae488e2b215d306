//! Client-facing renderings of a stored record.

use crate::error::{ApiError, ApiResult};
use arklet_core::ArkField;
use arklet_metadata::models::ArkRow;
use askama::Template;
use serde::Serialize;
use serde_json::{Map, Value, json};

/// A record as returned by update and bulk operations: identity plus the
/// descriptive fields, no annotations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArkRecord {
    pub ark: String,
    pub naan: i64,
    pub shoulder: String,
    pub assigned_name: String,
    pub url: String,
    pub metadata: String,
    pub commitment: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub identifier: String,
    pub format: String,
    pub relation: String,
    pub source: String,
}

impl From<ArkRow> for ArkRecord {
    fn from(row: ArkRow) -> Self {
        Self {
            ark: row.ark,
            naan: row.naan,
            shoulder: row.shoulder,
            assigned_name: row.assigned_name,
            url: row.url,
            metadata: row.metadata,
            commitment: row.commitment,
            title: row.title,
            kind: row.kind,
            identifier: row.identifier,
            format: row.format,
            relation: row.relation,
            source: row.source,
        }
    }
}

/// JSON inflection: every field with its semantic property and datatype.
///
/// `ark` and `metadata` carry only a `value`.
pub fn annotated_json(row: &ArkRow) -> Value {
    let mut obj = Map::new();
    obj.insert("ark".to_string(), json!({ "value": row.ark }));
    for field in ArkField::ALL {
        let mut entry = Map::new();
        if let Some(annotation) = field.annotation() {
            if let Some(property) = annotation.property {
                entry.insert("property".to_string(), json!(property));
            }
            entry.insert("type".to_string(), json!(annotation.datatype));
        }
        entry.insert("value".to_string(), json!(row.field(field)));
        obj.insert(field.as_str().to_string(), Value::Object(entry));
    }
    Value::Object(obj)
}

fn has_link_scheme(value: &str) -> bool {
    ["http://", "https://", "ftp://", "ftps://"]
        .iter()
        .any(|scheme| value.starts_with(scheme))
}

/// One row of the info page.
#[derive(Debug, Clone)]
pub struct InfoField {
    pub name: &'static str,
    pub datatype: &'static str,
    pub value: String,
    /// Value starts with a scheme a browser can follow.
    pub web_scheme: bool,
}

/// Info inflection: a small human-readable page of every field.
#[derive(Template)]
#[template(path = "info.html")]
pub struct InfoPage {
    pub ark: String,
    pub fields: Vec<InfoField>,
}

impl InfoPage {
    pub fn new(row: &ArkRow) -> Self {
        let fields = ArkField::ALL
            .into_iter()
            .map(|field| {
                let value = row.field(field);
                InfoField {
                    name: field.as_str(),
                    datatype: field.annotation().map_or("", |a| a.datatype),
                    value: value.to_string(),
                    web_scheme: has_link_scheme(value),
                }
            })
            .collect();
        Self {
            ark: row.ark.clone(),
            fields,
        }
    }
}

/// Render the info page for a record.
pub fn info_page(row: &ArkRow) -> ApiResult<String> {
    InfoPage::new(row).render().map_err(|e| {
        tracing::error!(ark = %row.ark, error = %e, "info page rendering failed");
        ApiError::Internal("info page rendering failed".to_string())
    })
}
