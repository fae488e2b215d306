//! Resolution of ARK references to records or redirect targets.

use crate::error::{ApiError, ApiResult};
use arklet_core::ArkId;
use arklet_metadata::MetadataStore;
use arklet_metadata::models::ArkRow;
use url::form_urlencoded;

/// Alternate representation requested through the query string.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Inflection {
    None,
    /// `?info`: human-readable page.
    Info,
    /// `?json`: annotated JSON.
    Json,
}

impl Inflection {
    /// Detect an inflection from a raw query string. A key counts with or
    /// without a value, percent-encoded or not; `info` wins over `json`.
    pub fn from_query(query: Option<&str>) -> Self {
        let Some(query) = query else {
            return Self::None;
        };
        let has_key = |wanted: &str| {
            form_urlencoded::parse(query.as_bytes()).any(|(key, _)| key == wanted)
        };
        if has_key("info") {
            Self::Info
        } else if has_key("json") {
            Self::Json
        } else {
            Self::None
        }
    }
}

/// Outcome of resolving one reference.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// Stored record with exactly this key.
    Located(ArkRow),
    /// Longest stored prefix; `target` is its URL plus the unmatched suffix.
    Prefix { matched: ArkRow, target: String },
    /// Longest stored prefix has no URL to redirect to; it is described
    /// instead.
    PrefixDescribed(ArkRow),
    /// NAAN is registered here but the identifier is not.
    Authority { target: String },
    /// NAAN is unknown; hand off to the global resolver.
    Global { target: String },
    /// Nothing matched and an inflection forbids redirecting elsewhere.
    Unresolvable,
}

impl Resolution {
    /// Label used for metrics and logs.
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::Located(_) => "exact",
            Self::Prefix { .. } | Self::PrefixDescribed(_) => "prefix",
            Self::Authority { .. } => "authority",
            Self::Global { .. } => "global",
            Self::Unresolvable => "not_found",
        }
    }
}

/// Resolves references against the record store.
#[derive(Clone, Debug)]
pub struct Resolver {
    global_resolver: String,
}

impl Resolver {
    pub fn new(global_resolver: impl Into<String>) -> Self {
        let global_resolver: String = global_resolver.into();
        Self {
            global_resolver: global_resolver.trim_end_matches('/').to_string(),
        }
    }

    /// Resolve `ark`: exact key, then longest stored prefix, then the NAAN's
    /// own resolver, then the global one. With an inflection the last two
    /// steps are replaced by [`Resolution::Unresolvable`].
    pub async fn resolve(
        &self,
        metadata: &dyn MetadataStore,
        ark: &ArkId,
        inflection: Inflection,
    ) -> ApiResult<Resolution> {
        let key = ark.lookup_key();

        if let Some(row) = metadata.get_ark(&key).await? {
            verify(&row)?;
            return Ok(Resolution::Located(row));
        }

        let prefixes = ark.prefix_keys();
        if !prefixes.is_empty() {
            let best = metadata
                .get_arks(&prefixes)
                .await?
                .into_iter()
                .max_by_key(|row| row.ark.len());
            if let Some(matched) = best {
                verify(&matched)?;
                if matched.url.is_empty() {
                    return Ok(Resolution::PrefixDescribed(matched));
                }
                let suffix = &key[matched.ark.len()..];
                let target = join_suffix(&matched.url, suffix);
                return Ok(Resolution::Prefix { matched, target });
            }
        }

        if inflection != Inflection::None {
            return Ok(Resolution::Unresolvable);
        }

        let naan = match i64::try_from(ark.naan()) {
            Ok(naan) => metadata.get_naan(naan).await?,
            Err(_) => None,
        };
        Ok(match naan {
            Some(naan) => Resolution::Authority {
                target: format!("{}/ark:/{key}", naan.url.trim_end_matches('/')),
            },
            None => Resolution::Global {
                target: format!("{}/ark:/{key}", self.global_resolver),
            },
        })
    }
}

fn verify(row: &ArkRow) -> ApiResult<()> {
    row.verify()
        .map_err(|e| ApiError::Integrity(format!("stored record {}: {e}", row.ark)))
}

/// Append `suffix` to `url`, collapsing the slash they would otherwise double.
pub fn join_suffix(url: &str, suffix: &str) -> String {
    if url.ends_with('/') && suffix.starts_with('/') {
        format!("{url}{}", &suffix[1..])
    } else {
        format!("{url}{suffix}")
    }
}

/// Append a query string to a redirect target, if there is one.
pub fn with_query(target: &str, query: Option<&str>) -> String {
    match query.filter(|q| !q.is_empty()) {
        Some(query) if target.contains('?') => format!("{target}&{query}"),
        Some(query) => format!("{target}?{query}"),
        None => target.to_string(),
    }
}
