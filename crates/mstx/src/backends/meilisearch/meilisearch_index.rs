use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::{debug, trace};

use crate::backends::CommonHttpConfig;
use crate::backends::remote_index::{FacetSearchRequest, FacetSearchResult, RemoteIndex, TaskHandle};
use crate::common::{IndexTarget, Row};
use crate::error::{Result, TaskError};

/// 💀 The error body Meilisearch sends with every non-2xx: `{message, code, type, link}`.
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    hits: Vec<Row>,
}

#[derive(Debug, Deserialize)]
struct FacetSearchResponse {
    #[serde(default, rename = "facetHits")]
    facet_hits: Vec<Row>,
}

/// 📡 A handle on one Meilisearch server, speaking its REST API over reqwest.
///
/// Built once per task invocation and dropped with it. Holds the HTTP client (connection
/// pool included), the parsed base URL and the key. No state beyond that. Every method is
/// exactly one HTTP round trip, and a failure is returned as-is, never retried.
pub struct MeilisearchIndex {
    client: reqwest::Client,
    base_url: Url,
    key: String,
}

// 🔒 hand-rolled so the key never shows up in `{:?}`
impl std::fmt::Debug for MeilisearchIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeilisearchIndex")
            .field("base_url", &self.base_url.as_str())
            .finish()
    }
}

impl MeilisearchIndex {
    /// 🚀 Builds the HTTP client and parses the base URL. No request is sent yet.
    pub fn new(target: &IndexTarget, http: &CommonHttpConfig) -> Result<Self> {
        let base_url = Url::parse(target.url()).map_err(|e| {
            TaskError::remote(None, "invalid_url", format!("'{}' is not a usable URL: {e}", target.url()))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(TaskError::remote(
                None,
                "invalid_url",
                format!("'{}' cannot be used as a base URL", target.url()),
            ));
        }

        let client = reqwest::Client::builder()
            .connect_timeout(http.connect_timeout())
            .timeout(http.request_timeout())
            .build()
            .map_err(|e| TaskError::remote(None, "client_init", describe_transport(&e)))?;

        debug!("🔌 Meilisearch handle ready for {}", base_url);
        Ok(Self {
            client,
            base_url,
            key: target.key().to_string(),
        })
    }

    /// 🧭 `base/seg/seg/...`, each segment percent-encoded. Ids with slashes stay one segment.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // ✅ checked in new(): a base URL always has path segments
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// 🔒 Bearer auth when there is a key. An empty key means an open instance.
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        if self.key.is_empty() {
            request
        } else {
            request.bearer_auth(&self.key)
        }
    }

    /// 📡 Sends the request, turning transport failures and non-2xx answers into `TaskError`s.
    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| TaskError::remote(None, "transport", describe_transport(&e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        // 💀 the body usually says exactly what went wrong, so we keep it
        let body = response.text().await.unwrap_or_default();
        let parsed: ApiErrorBody = serde_json::from_str(&body).unwrap_or_default();
        let code = if parsed.code.is_empty() {
            "unknown".to_string()
        } else {
            parsed.code
        };
        let message = if parsed.message.is_empty() {
            if body.is_empty() { status.to_string() } else { body }
        } else {
            parsed.message
        };
        Err(TaskError::remote(Some(status.as_u16()), code, message))
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status().as_u16();
        response
            .json::<T>()
            .await
            .map_err(|e| TaskError::remote(Some(status), "invalid_response", describe_transport(&e)))
    }
}

#[async_trait]
impl RemoteIndex for MeilisearchIndex {
    async fn add_row(&self, index: &str, encoded_row: &str) -> Result<TaskHandle> {
        let url = self.endpoint(&["indexes", index, "documents"]);
        trace!("📬 POST {} ({} bytes)", url, encoded_row.len());
        let request = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(encoded_row.to_string());
        let handle: TaskHandle = Self::decode(self.send(request).await?).await?;
        trace!("🎫 enqueued as task {}", handle.task_uid);
        Ok(handle)
    }

    async fn get_by_id(&self, index: &str, id: &str) -> Result<Row> {
        let url = self.endpoint(&["indexes", index, "documents", id]);
        trace!("🔍 GET {}", url);
        match self.send(self.client.get(url)).await {
            Ok(response) => Self::decode(response).await,
            Err(TaskError::RemoteIndex { status: Some(404), code, .. }) if code == "document_not_found" => {
                Err(TaskError::NotFound {
                    index: index.to_string(),
                    id: id.to_string(),
                })
            }
            Err(other) => Err(other),
        }
    }

    async fn search(&self, index: &str, query: &str) -> Result<Vec<Row>> {
        let url = self.endpoint(&["indexes", index, "search"]);
        trace!("🔎 POST {} q={:?}", url, query);
        let response = self.send(self.client.post(url).json(&json!({ "q": query }))).await?;
        let decoded: SearchResponse = Self::decode(response).await?;
        Ok(decoded.hits)
    }

    async fn facet_search(&self, index: &str, request: &FacetSearchRequest) -> Result<FacetSearchResult> {
        let url = self.endpoint(&["indexes", index, "facet-search"]);
        let mut body = Map::new();
        body.insert("facetName".into(), Value::String(request.facet_name.clone()));
        if let Some(ref facet_query) = request.facet_query {
            body.insert("facetQuery".into(), Value::String(facet_query.clone()));
        }
        if !request.filters.is_empty() {
            body.insert(
                "filter".into(),
                Value::Array(request.filters.iter().cloned().map(Value::String).collect()),
            );
        }
        trace!("🔎 POST {} {:?}", url, body);
        let response = self.send(self.client.post(url).json(&body)).await?;
        let decoded: FacetSearchResponse = Self::decode(response).await?;
        Ok(FacetSearchResult::from_hits(decoded.facet_hits))
    }
}

/// 🧅 reqwest errors hide the good part ("connection refused") in their source chain.
fn describe_transport(err: &reqwest::Error) -> String {
    let mut description = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        description.push_str(": ");
        description.push_str(&cause.to_string());
        source = cause.source();
    }
    description
}
