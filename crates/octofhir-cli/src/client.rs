use anyhow::Result;
use async_trait::async_trait;
use octofhir_storage::{Bundle, ResourceStore, SearchParams, StorageError};
use serde_json::Value;

use crate::config::ServerSettings;

const FHIR_JSON: &str = "application/fhir+json";

#[derive(Debug, Clone)]
pub enum Auth {
    Basic { username: String, password: String },
    Bearer { token: String },
}

impl Auth {
    /// Token first, then username/password.
    pub fn from_settings(settings: &ServerSettings) -> Option<Self> {
        if let Some(token) = &settings.token {
            return Some(Auth::Bearer {
                token: token.clone(),
            });
        }
        match (&settings.username, &settings.password) {
            (Some(username), password) => Some(Auth::Basic {
                username: username.clone(),
                password: password.clone().unwrap_or_default(),
            }),
            _ => None,
        }
    }
}

/// A `ResourceStore` over a FHIR REST API.
pub struct HttpStore {
    http: reqwest::Client,
    base_url: String,
    auth: Option<Auth>,
}

impl HttpStore {
    pub fn new(base_url: &str, auth: Option<Auth>) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        Self {
            http: reqwest::Client::new(),
            base_url,
            auth,
        }
    }

    pub fn from_settings(settings: &ServerSettings, side: &str) -> Result<Self> {
        let url = settings.require_url(side)?;
        url::Url::parse(url).map_err(|e| anyhow::anyhow!("Invalid {side} URL {url}: {e}"))?;
        Ok(Self::new(url, Auth::from_settings(settings)))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn fhir_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        let mut req = self.http.request(method, url);
        match &self.auth {
            Some(Auth::Basic { username, password }) => {
                req = req.basic_auth(username, Some(password));
            }
            Some(Auth::Bearer { token }) => {
                req = req.bearer_auth(token);
            }
            None => {}
        }
        req.header("Accept", FHIR_JSON)
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response, StorageError> {
        req.send()
            .await
            .map_err(|e| StorageError::connection_error(format!("{}: {e}", self.base_url)))
    }
}

#[async_trait]
impl ResourceStore for HttpStore {
    async fn read(&self, resource_type: &str, id: &str) -> Result<Option<Value>, StorageError> {
        let url = self.fhir_url(&format!("{resource_type}/{id}"));
        tracing::debug!(%url, "GET");
        let resp = self.send(self.request(reqwest::Method::GET, &url)).await?;
        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::GONE {
            return Ok(None);
        }
        handle_response(resp).await.map(Some)
    }

    async fn search(
        &self,
        resource_type: &str,
        params: &SearchParams,
    ) -> Result<Vec<Value>, StorageError> {
        let url = self.fhir_url(resource_type);
        let query = params.to_query_pairs();
        tracing::debug!(%url, ?query, "search");
        let resp = self
            .send(self.request(reqwest::Method::GET, &url).query(&query))
            .await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        let bundle = handle_response(resp).await?;
        Ok(searchset_resources(&bundle, resource_type))
    }

    async fn batch_execute(&self, bundle: &Bundle) -> Result<Bundle, StorageError> {
        tracing::debug!(url = %self.base_url, entries = bundle.len(), "POST bundle");
        let resp = self
            .send(
                self.request(reqwest::Method::POST, &self.base_url)
                    .header("Content-Type", FHIR_JSON)
                    .json(bundle),
            )
            .await?;
        let body = handle_response(resp).await.map_err(|e| match e {
            StorageError::Internal { message } => StorageError::transaction_error(message),
            other => other,
        })?;
        serde_json::from_value(body)
            .map_err(|e| StorageError::internal(format!("Malformed response bundle: {e}")))
    }

    fn backend_name(&self) -> &'static str {
        "http"
    }
}

/// `entry[].resource` of a searchset, limited to `resource_type`.
fn searchset_resources(bundle: &Value, resource_type: &str) -> Vec<Value> {
    bundle
        .get("entry")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|e| e.get("resource"))
                .filter(|r| r.get("resourceType").and_then(Value::as_str) == Some(resource_type))
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

async fn handle_response(resp: reqwest::Response) -> Result<Value, StorageError> {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();

    if !status.is_success() {
        if let Ok(json) = serde_json::from_str::<Value>(&body)
            && json.get("resourceType").and_then(|v| v.as_str()) == Some("OperationOutcome")
            && let Some(issues) = json.get("issue").and_then(|v| v.as_array())
        {
            let msgs: Vec<&str> = issues
                .iter()
                .filter_map(|i| {
                    i.get("diagnostics")
                        .or_else(|| i.get("details").and_then(|d| d.get("text")))
                        .and_then(|d| d.as_str())
                })
                .collect();
            if !msgs.is_empty() {
                return Err(StorageError::internal(format!(
                    "HTTP {status}: {}",
                    msgs.join("; ")
                )));
            }
        }
        return Err(StorageError::internal(format!("HTTP {status}: {body}")));
    }

    if body.is_empty() {
        return Ok(Value::Null);
    }

    serde_json::from_str(&body)
        .map_err(|e| StorageError::internal(format!("Failed to parse response JSON: {e}")))
}
