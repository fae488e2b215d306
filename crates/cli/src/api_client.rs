use anyhow::{Context, Result};
use arklet_core::ArkUpdate;
use reqwest::Url;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, api_key: Option<&str>) -> Result<Self> {
        let base_url = Url::parse(base_url).context("invalid server URL")?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            api_key: api_key.map(str::to_string),
        })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).context("failed to build API URL")
    }

    /// URL of an identifier. `Url::join` would read `ark:` as a scheme, so
    /// the path is set directly.
    fn ark_url(&self, ark: &str) -> Url {
        let reference = if ark.starts_with("ark:") {
            ark.to_string()
        } else {
            format!("ark:/{}", ark.trim_start_matches('/'))
        };
        let mut url = self.base_url.clone();
        url.set_path(&format!("/{reference}"));
        url
    }

    async fn send_json<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder) -> Result<T> {
        let req = match &self.api_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        };
        let response = req.send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            anyhow::bail!("API error ({}): {}", status, body);
        }
        Ok(serde_json::from_str(&body)?)
    }

    pub async fn status(&self) -> Result<StatusResponse> {
        let url = self.url("/")?;
        self.send_json(self.http.get(url)).await
    }

    pub async fn mint(&self, req: &MintRequest) -> Result<MintResponse> {
        let url = self.url("/mint")?;
        self.send_json(self.http.post(url).json(req)).await
    }

    pub async fn update(&self, req: &UpdateRequest) -> Result<ArkRecord> {
        let url = self.url("/update")?;
        self.send_json(self.http.put(url).json(req)).await
    }

    /// Annotated JSON description of one identifier (`?json`).
    pub async fn query(&self, ark: &str) -> Result<serde_json::Value> {
        let mut url = self.ark_url(ark);
        url.set_query(Some("json"));
        self.send_json(self.http.get(url)).await
    }

    pub async fn bulk_query(&self, items: &[QueryItem]) -> Result<Vec<ArkRecord>> {
        let url = self.url("/bulk_query")?;
        self.send_json(self.http.post(url).json(items)).await
    }

    pub async fn bulk_update(&self, req: &BulkUpdateRequest) -> Result<BulkUpdateResponse> {
        let url = self.url("/bulk_update")?;
        self.send_json(self.http.post(url).json(req)).await
    }

    pub async fn bulk_mint(&self, req: &BulkMintRequest) -> Result<BulkMintResponse> {
        let url = self.url("/bulk_mint")?;
        self.send_json(self.http.post(url).json(req)).await
    }
}

// =============================================================================
// Request/response types (mirrored from server handlers)
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub version: String,
    pub mode: String,
}

#[derive(Debug, Serialize)]
pub struct MintRequest {
    pub naan: u64,
    pub shoulder: String,
    #[serde(flatten)]
    pub update: ArkUpdate,
}

#[derive(Debug, Deserialize)]
pub struct MintResponse {
    pub ark: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateRequest {
    pub ark: String,
    #[serde(flatten)]
    pub update: ArkUpdate,
}

#[derive(Debug, Serialize, Deserialize)]
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

#[derive(Debug, Serialize, Deserialize)]
pub struct QueryItem {
    pub ark: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BulkUpdateRequest {
    pub data: Vec<UpdateRequest>,
}

#[derive(Debug, Deserialize)]
pub struct BulkUpdateResponse {
    pub num_received: usize,
    pub num_updated: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MintItem {
    pub shoulder: String,
    #[serde(flatten)]
    pub update: ArkUpdate,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BulkMintRequest {
    pub naan: u64,
    pub data: Vec<MintItem>,
}

#[derive(Debug, Deserialize)]
pub struct BulkMintResponse {
    pub num_received: usize,
    pub arks_created: Vec<ArkRecord>,
}
