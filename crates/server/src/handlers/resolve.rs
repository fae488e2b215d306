//! Resolution endpoint.
//!
//! ARK paths contain `:` and any number of `/`, which a route pattern cannot
//! express, so resolution is the router's fallback handler. Both
//! `/ark:/{naan}/{name}` and `/resolve/ark:/{naan}/{name}` are accepted.

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::record::{annotated_json, info_page};
use crate::resolver::{Inflection, Resolution, with_query};
use crate::state::AppState;
use arklet_core::ArkId;
use arklet_core::ark::ARK_LABEL;
use arklet_metadata::models::ArkRow;
use axum::Json;
use axum::extract::State;
use axum::http::header::LOCATION;
use axum::http::{HeaderValue, Method, StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};
use percent_encoding::percent_decode_str;

fn found(target: &str) -> ApiResult<Response> {
    let location = HeaderValue::try_from(target)
        .map_err(|_| ApiError::BadRequest("redirect target is not a valid header value".to_string()))?;
    Ok((StatusCode::FOUND, [(LOCATION, location)]).into_response())
}

/// Extract the reference from a request path, or `None` if the path is not
/// an ARK at all.
fn reference(path: &str) -> ApiResult<Option<String>> {
    let raw = path
        .strip_prefix("/resolve/")
        .or_else(|| path.strip_prefix('/'))
        .unwrap_or(path);
    let decoded = percent_decode_str(raw)
        .decode_utf8()
        .map_err(|_| ApiError::BadRequest("path is not valid UTF-8".to_string()))?;
    if decoded.contains(ARK_LABEL) {
        Ok(Some(decoded.into_owned()))
    } else {
        Ok(None)
    }
}

/// GET /ark:/{naan}/{name} - Resolve, redirect or describe a reference.
pub async fn resolve(State(state): State<AppState>, method: Method, uri: Uri) -> ApiResult<Response> {
    let Some(reference) = reference(uri.path())? else {
        return Err(ApiError::NotFound(format!("no route for {}", uri.path())));
    };
    if method != Method::GET && method != Method::HEAD {
        return Ok(StatusCode::METHOD_NOT_ALLOWED.into_response());
    }

    let ark = match ArkId::parse(&reference) {
        Ok(ark) => ark,
        Err(e) => {
            metrics::record_resolution("invalid");
            return Err(e.into());
        }
    };
    let inflection = Inflection::from_query(uri.query());
    let resolution = state
        .resolver
        .resolve(state.metadata.as_ref(), &ark, inflection)
        .await?;
    metrics::record_resolution(resolution.outcome());
    tracing::debug!(ark = %ark, outcome = resolution.outcome(), "resolved");

    match resolution {
        Resolution::Located(row) => match inflection {
            Inflection::None if !row.url.is_empty() => found(&with_query(&row.url, uri.query())),
            _ => describe(&row, inflection),
        },
        Resolution::PrefixDescribed(row) => describe(&row, inflection),
        Resolution::Prefix { target, .. }
        | Resolution::Authority { target }
        | Resolution::Global { target } => found(&target),
        Resolution::Unresolvable => Err(ApiError::NotFound(format!("{ark} is not registered"))),
    }
}

/// Annotated JSON for `?json`, the info page otherwise.
fn describe(row: &ArkRow, inflection: Inflection) -> ApiResult<Response> {
    match inflection {
        Inflection::Json => Ok(Json(annotated_json(row)).into_response()),
        Inflection::Info | Inflection::None => Ok(Html(info_page(row)?).into_response()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_extraction() {
        assert_eq!(
            reference("/ark:/100/b0x").unwrap().as_deref(),
            Some("ark:/100/b0x")
        );
        assert_eq!(
            reference("/resolve/ark:/100/b0x/c").unwrap().as_deref(),
            Some("ark:/100/b0x/c")
        );
        assert_eq!(
            reference("/ark%3A/100/a%20b").unwrap().as_deref(),
            Some("ark:/100/a b")
        );
        assert_eq!(reference("/favicon.ico").unwrap(), None);
        assert!(reference("/ark:/100/%FF").is_err());
    }

    #[test]
    fn test_found_rejects_control_characters() {
        assert!(found("https://example.org/a\nb").is_err());
        let response = found("https://example.org/a").unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[LOCATION], "https://example.org/a");
    }
}
