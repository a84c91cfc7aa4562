use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

use crate::diff::{diff, Record};
use crate::error::ApiError;
use crate::settings::ClientSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Freight,
    Farm,
    Driver,
}

impl ResourceKind {
    pub fn route(&self) -> &'static str {
        match self {
            ResourceKind::Freight => "freights",
            ResourceKind::Farm => "farms",
            ResourceKind::Driver => "drivers",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Freight => "freight",
            ResourceKind::Farm => "farm",
            ResourceKind::Driver => "driver",
        };
        f.write_str(name)
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "freight" | "freights" => Ok(ResourceKind::Freight),
            "farm" | "farms" => Ok(ResourceKind::Farm),
            "driver" | "drivers" => Ok(ResourceKind::Driver),
            other => Err(format!("unknown resource kind: {other}")),
        }
    }
}

#[derive(Clone)]
pub struct ResourceClient {
    client: reqwest::Client,
    base_url: Url,
}

impl ResourceClient {
    pub fn new(settings: &ClientSettings) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("freightdesk/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()?;
        let base_url = Url::parse(&settings.api_base_url)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {e}", settings.api_base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(settings.api_base_url.clone()));
        }
        Ok(Self { client, base_url })
    }

    pub async fn list(&self, kind: ResourceKind, token: Option<&str>) -> Result<Vec<Value>, ApiError> {
        let res = self.request(Method::GET, self.collection_url(kind), token).send().await?;
        match unwrap_data(read_json(res).await?) {
            Value::Array(items) => Ok(items),
            other => Err(ApiError::Decode(format!("expected a list of {kind}, got {other}"))),
        }
    }

    pub async fn get(&self, kind: ResourceKind, id: &str, token: Option<&str>) -> Result<Value, ApiError> {
        let res = self.request(Method::GET, self.item_url(kind, id), token).send().await?;
        Ok(unwrap_data(read_json(res).await?))
    }

    /// Creates a record from the non-empty fields of `record`.
    pub async fn create(
        &self,
        kind: ResourceKind,
        record: &Record,
        token: Option<&str>,
    ) -> Result<Value, ApiError> {
        let body = diff(None, record);
        let res = self
            .request(Method::POST, self.collection_url(kind), token)
            .json(&body)
            .send()
            .await?;
        Ok(unwrap_data(read_json(res).await?))
    }

    /// Sends only the changed fields. Returns `None` without touching the
    /// network when nothing changed.
    pub async fn update(
        &self,
        kind: ResourceKind,
        id: &str,
        original: &Record,
        edited: &Record,
        token: Option<&str>,
    ) -> Result<Option<Value>, ApiError> {
        let changes = diff(Some(original), edited);
        if changes.is_empty() {
            debug!(%kind, id, "no changes to send");
            return Ok(None);
        }
        let res = self
            .request(Method::PATCH, self.item_url(kind, id), token)
            .json(&changes)
            .send()
            .await?;
        Ok(Some(unwrap_data(read_json(res).await?)))
    }

    pub async fn delete(&self, kind: ResourceKind, id: &str, token: Option<&str>) -> Result<(), ApiError> {
        let res = self.request(Method::DELETE, self.item_url(kind, id), token).send().await?;
        check_status(res).await?;
        Ok(())
    }

    fn collection_url(&self, kind: ResourceKind) -> Url {
        self.url_with_segments(&[kind.route()])
    }

    /// `id` is a single path segment; `/`, `?` and `#` are percent-encoded.
    fn item_url(&self, kind: ResourceKind, id: &str) -> Url {
        self.url_with_segments(&[kind.route(), id])
    }

    fn url_with_segments(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // checked in new(): the base URL can carry a path
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, url: Url, token: Option<&str>) -> RequestBuilder {
        debug!(%method, %url, "resource request");
        let builder = self.client.request(method, url);
        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

async fn check_status(res: Response) -> Result<Response, ApiError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let url = res.url().path().to_string();
    let body = res.bytes().await.unwrap_or_default();
    Err(status_error(status, &url, &body))
}

async fn read_json(res: Response) -> Result<Value, ApiError> {
    let res = check_status(res).await?;
    let body = res.bytes().await?;
    if body.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_slice(&body).map_err(|e| ApiError::Decode(e.to_string()))
}

/// Error for a non-success response. The message comes from the body's
/// `message` or `error` field when present.
pub fn status_error(status: StatusCode, path: &str, body: &[u8]) -> ApiError {
    match status {
        StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
        StatusCode::NOT_FOUND => ApiError::NotFound(path.to_string()),
        _ => {
            let message = serde_json::from_slice::<Value>(body)
                .ok()
                .and_then(|v| {
                    v.get("message")
                        .or_else(|| v.get("error"))
                        .and_then(Value::as_str)
                        .map(str::to_string)
                })
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
            ApiError::Status {
                status: status.as_u16(),
                message,
            }
        }
    }
}

/// Accepts both bare payloads and `{ "data": ... }` envelopes.
pub fn unwrap_data(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.contains_key("data") => map.remove("data").unwrap_or(Value::Null),
        other => other,
    }
}
