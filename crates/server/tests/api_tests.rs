//! Integration tests for HTTP API endpoints.

mod common;

use arklet_core::credential::hash_secret;
use arklet_metadata::models::KeyRow;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{NAAN, OTHER_NAAN, OTHER_SECRET, SECRET, SHOULDER, TestServer, ark_row};
use serde_json::{Value, json};
use time::OffsetDateTime;
use uuid::Uuid;

async fn mint(server: &TestServer, body: Value) -> String {
    let (status, response) = server.json("POST", "/mint", Some(body), Some(SECRET)).await;
    assert_eq!(status, StatusCode::OK, "mint failed: {response}");
    response["ark"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_status() {
    let server = TestServer::new().await;
    let (status, body) = server.json("GET", "/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["mode"], "full");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_mint_then_info_page() {
    let server = TestServer::new().await;
    let ark = mint(
        &server,
        json!({"naan": NAAN, "shoulder": SHOULDER, "title": "Field notes"}),
    )
    .await;
    assert!(ark.starts_with(&format!("ark:/{NAAN}{SHOULDER}")));
    // 8 generated characters plus the check character
    assert_eq!(ark.len(), format!("ark:/{NAAN}{SHOULDER}").len() + 9);

    // No URL: a plain resolution shows the info page.
    let (status, _, page) = server.get(&format!("/{ark}")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(page.contains("Field notes"));

    let (status, _, page) = server.get(&format!("/{ark}?info")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(page.contains(&ark));

    let (status, body) = server.json("GET", &format!("/{ark}?json"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ark"]["value"], ark.trim_start_matches("ark:/"));
    assert_eq!(body["title"]["value"], "Field notes");
    assert_eq!(
        body["title"]["property"],
        "http://purl.org/dc/elements/1.1/title"
    );
}

#[tokio::test]
async fn test_mint_validation() {
    let server = TestServer::new().await;

    let (status, body) = server
        .json(
            "POST",
            "/mint",
            Some(json!({"naan": NAAN, "shoulder": "/unknown"})),
            Some(SECRET),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["shoulder"].is_string());

    let (status, body) = server
        .json(
            "POST",
            "/mint",
            Some(json!({"naan": NAAN, "shoulder": SHOULDER, "url": "not a url"})),
            Some(SECRET),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["url"].is_string());

    let (status, _) = server
        .json("POST", "/mint", Some(json!({"shoulder": SHOULDER})), Some(SECRET))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_forbidden_is_uniform() {
    let server = TestServer::new().await;
    let body = json!({"naan": NAAN, "shoulder": SHOULDER});

    let deactivated = Uuid::new_v4();
    server
        .metadata()
        .create_key(&KeyRow {
            key_id: deactivated,
            naan: NAAN,
            key_hash: hash_secret("retired-key").unwrap(),
            active: true,
            created_at: OffsetDateTime::now_utc(),
            deactivated_at: None,
            description: None,
        })
        .await
        .unwrap();
    server
        .metadata()
        .deactivate_key(deactivated, OffsetDateTime::now_utc())
        .await
        .unwrap();

    let mut responses = Vec::new();
    for key in [None, Some("wrong"), Some(OTHER_SECRET), Some("retired-key")] {
        responses.push(server.json("POST", "/mint", Some(body.clone()), key).await);
    }
    responses.push(
        server
            .json(
                "POST",
                "/mint",
                Some(json!({"naan": 99999, "shoulder": SHOULDER})),
                Some(SECRET),
            )
            .await,
    );

    for (status, body) in &responses {
        assert_eq!(*status, StatusCode::FORBIDDEN);
        assert_eq!(body, &responses[0].1);
    }
    assert_eq!(responses[0].1["code"], "forbidden");
}

#[tokio::test]
async fn test_bare_key_is_accepted() {
    let server = TestServer::new().await;
    let request = Request::builder()
        .method("POST")
        .uri("/mint")
        .header("Authorization", SECRET)
        .header("Content-Type", "application/json")
        .body(Body::from(
            serde_json::to_vec(&json!({"naan": NAAN, "shoulder": SHOULDER})).unwrap(),
        ))
        .unwrap();
    assert_eq!(server.send(request).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_update() {
    let server = TestServer::new().await;
    let ark = mint(&server, json!({"naan": NAAN, "shoulder": SHOULDER, "title": "old"})).await;

    let (status, body) = server
        .json(
            "PUT",
            "/update",
            Some(json!({
                "ark": ark,
                "url": "https://example.org/object",
                "type": "Image",
                "title": null,
                "naan": 1,
                "assigned_name": "nope",
            })),
            Some(SECRET),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["url"], "https://example.org/object");
    assert_eq!(body["type"], "Image");
    assert_eq!(body["title"], "old");
    assert_eq!(body["naan"], NAAN);

    let (status, location, _) = server.get(&format!("/{ark}?q=1")).await;
    assert_eq!(status, StatusCode::FOUND);
    assert_eq!(location.as_deref(), Some("https://example.org/object?q=1"));

    let (status, _) = server
        .json(
            "PUT",
            "/update",
            Some(json!({"ark": format!("ark:/{NAAN}/x5missing"), "title": "x"})),
            Some(SECRET),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = server
        .json(
            "PUT",
            "/update",
            Some(json!({"ark": ark, "title": "x"})),
            Some(OTHER_SECRET),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_longest_prefix_without_url_is_described() {
    let server = TestServer::new().await;
    let metadata = server.metadata();
    metadata
        .create_ark(&ark_row(NAAN, "ab", "https://x.example/"))
        .await
        .unwrap();
    metadata
        .create_ark(&ark_row(NAAN, "ab/cd", ""))
        .await
        .unwrap();

    let (status, location, page) = server.get(&format!("/ark:/{NAAN}/x5ab/cd/ef")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(location.is_none());
    assert!(page.contains(&format!("ark:/{NAAN}/x5ab/cd")));

    let (status, body) = server
        .json("GET", &format!("/ark:/{NAAN}/x5ab/cd/ef?json"), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ark"]["value"], format!("{NAAN}/x5ab/cd"));

    // A shorter prefix with a URL still redirects when nothing longer matches.
    let (status, location, _) = server.get(&format!("/ark:/{NAAN}/x5ab/zz")).await;
    assert_eq!(status, StatusCode::FOUND);
    assert_eq!(location.as_deref(), Some("https://x.example/zz"));
}

#[tokio::test]
async fn test_resolution_fallbacks() {
    let server = TestServer::new().await;
    let metadata = server.metadata();
    metadata
        .create_ark(&ark_row(NAAN, "ab", "https://x.example/"))
        .await
        .unwrap();

    // Prefix match, with and without an inflection
    let (status, location, _) = server.get(&format!("/ark:/{NAAN}/x5ab/cd")).await;
    assert_eq!(status, StatusCode::FOUND);
    assert_eq!(location.as_deref(), Some("https://x.example/cd"));
    let (status, location, _) = server
        .get(&format!("/resolve/ark:/{NAAN}/x5ab/cd?json"))
        .await;
    assert_eq!(status, StatusCode::FOUND);
    assert_eq!(location.as_deref(), Some("https://x.example/cd"));

    // Authority fallback
    let (status, location, _) = server.get(&format!("/ark:/{NAAN}/x5zz")).await;
    assert_eq!(status, StatusCode::FOUND);
    assert_eq!(
        location.as_deref(),
        Some(format!("https://naan{NAAN}.example.org/ark:/{NAAN}/x5zz").as_str())
    );

    // Global fallback
    let (status, location, _) = server.get("/ark:/99999/zz").await;
    assert_eq!(status, StatusCode::FOUND);
    assert_eq!(location.as_deref(), Some("https://n2t.net/ark:/99999/zz"));

    // Inflections never leave this resolver
    let (status, _, _) = server.get(&format!("/ark:/{NAAN}/x5zz?info")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Malformed references
    let (status, _, _) = server.get("/ark:/notanumber/x").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _, _) = server.get("/ark:/100").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _, _) = server.get("/no-such-page").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_bulk_mint_and_query() {
    let server = TestServer::new().await;
    let data: Vec<Value> = (0..3)
        .map(|i| json!({"shoulder": SHOULDER, "title": format!("item {i}")}))
        .collect();
    let (status, body) = server
        .json(
            "POST",
            "/bulk_mint",
            Some(json!({"naan": NAAN, "data": data})),
            Some(SECRET),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["num_received"], 3);
    let created = body["arks_created"].as_array().unwrap();
    assert_eq!(created.len(), 3);
    assert_eq!(created[2]["title"], "item 2");

    let query: Vec<Value> = created
        .iter()
        .map(|r| json!({"ark": format!("ark:/{}", r["ark"].as_str().unwrap())}))
        .chain(std::iter::once(json!({"ark": format!("ark:/{NAAN}/x5none")})))
        .collect();
    let (status, body) = server
        .json("POST", "/bulk_query", Some(Value::Array(query)), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_bulk_limits() {
    let server = TestServer::new().await;
    let data: Vec<Value> = (0..101).map(|_| json!({"shoulder": SHOULDER})).collect();
    let (status, _) = server
        .json(
            "POST",
            "/bulk_mint",
            Some(json!({"naan": NAAN, "data": data})),
            Some(SECRET),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(
        server
            .metadata()
            .count_arks_by_shoulder(NAAN)
            .await
            .unwrap()
            .is_empty()
    );

    let ark = mint(&server, json!({"naan": NAAN, "shoulder": SHOULDER, "title": "keep"})).await;
    let (status, _) = server
        .json(
            "POST",
            "/bulk_update",
            Some(json!({"data": [
                {"ark": ark, "title": "changed"},
                {"ark": format!("ark:/{OTHER_NAAN}/x5abc"), "title": "changed"},
            ]})),
            Some(SECRET),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (_, body) = server.json("GET", &format!("/{ark}?json"), None, None).await;
    assert_eq!(body["title"]["value"], "keep");

    let (status, body) = server
        .json(
            "POST",
            "/bulk_update",
            Some(json!({"data": [{"ark": ark, "title": "changed"}]})),
            Some(SECRET),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"num_received": 1, "num_updated": 1}));
}

#[tokio::test]
async fn test_resolver_only_mode() {
    let server = TestServer::with_config(|config| {
        config.server.resolver_only = true;
    })
    .await;

    let (status, body) = server.json("GET", "/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mode"], "resolver");

    let (status, _) = server
        .json(
            "POST",
            "/mint",
            Some(json!({"naan": NAAN, "shoulder": SHOULDER})),
            Some(SECRET),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = server.get("/ark:/99999/zz").await;
    assert_eq!(status, StatusCode::FOUND);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let server = TestServer::new().await;
    server.get("/ark:/99999/zz").await;
    let (status, _, text) = server.get("/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(text.contains("arklet_resolutions_total"));

    let server = TestServer::with_config(|config| {
        config.server.metrics_enabled = false;
    })
    .await;
    let (status, _, _) = server.get("/metrics").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_rate_limit_returns_retry_after() {
    let server = TestServer::with_config(|config| {
        config.rate_limit.enabled = true;
        config.rate_limit.burst_size = 2;
        config.rate_limit.requests_per_minute = 1;
    })
    .await;

    for _ in 0..2 {
        assert_eq!(server.get("/").await.0, StatusCode::OK);
    }
    let response = server
        .send(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key("retry-after"));
}
