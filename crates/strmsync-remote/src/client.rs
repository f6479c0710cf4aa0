//! HTTP client for the remote listing API
//!
//! Provides a typed HTTP client for the JSON listing API: directory
//! resolution, paginated child listings and item lookups. Status codes are
//! mapped onto [`RemoteError`] so the retry layer can classify them.
//!
//! ## Endpoints
//!
//! - `GET {base}/dirs/resolve?path=` - `{"id": u64}` or 404
//! - `GET {base}/dirs/{id}/children?offset=&limit=&ancestors=&sort=&asc=&suffix=`
//! - `GET {base}/items/{id}`
//!
//! ## Usage
//!
//! ```rust,no_run
//! use strmsync_remote::client::RemoteClient;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = RemoteClient::new("http://localhost:8080/api")?;
//! let id = client.resolve_dir("/Movies").await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::rate_limit::parse_retry_after;
use crate::RemoteError;

/// Default retry-after duration when header is missing (30 seconds)
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(30);

/// Default request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// API response types
// ============================================================================

/// Response from `dirs/resolve`
#[derive(Debug, Deserialize)]
pub(crate) struct ResolveResponse {
    pub(crate) id: u64,
}

/// One child record in a listing or item lookup
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ItemDto {
    pub(crate) id: u64,
    #[serde(default)]
    pub(crate) parent_id: u64,
    #[serde(default)]
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) is_dir: bool,
    #[serde(default)]
    pub(crate) size: u64,
    /// Epoch seconds
    #[serde(default)]
    pub(crate) mtime: i64,
    /// Content handle, files only
    pub(crate) handle: Option<String>,
}

/// Ancestor record in an ancestor-aware listing
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AncestorDto {
    pub(crate) id: u64,
    #[serde(default)]
    pub(crate) parent_id: u64,
    #[serde(default)]
    pub(crate) name: String,
}

/// Response from `dirs/{id}/children`
#[derive(Debug, Deserialize)]
pub(crate) struct ChildrenResponse {
    pub(crate) total: u64,
    #[serde(default)]
    pub(crate) items: Vec<ItemDto>,
    pub(crate) ancestors: Option<Vec<AncestorDto>>,
}

/// Query parameters for a children listing
#[derive(Debug, Clone, Default)]
pub struct ChildrenQuery<'a> {
    pub offset: u64,
    pub limit: u32,
    pub with_ancestors: bool,
    pub sort: &'a str,
    pub ascending: bool,
    pub suffix: Option<&'a str>,
}

// ============================================================================
// RemoteClient
// ============================================================================

/// HTTP client for the remote listing API
///
/// Wraps `reqwest::Client` with base URL construction and status mapping.
#[derive(Debug, Clone)]
pub struct RemoteClient {
    /// The underlying HTTP client
    client: Client,
    /// Base URL for API requests, without trailing slash
    base_url: String,
}

impl RemoteClient {
    /// Creates a client for `base_url` with the default timeout
    pub fn new(base_url: impl Into<String>) -> Result<Self, RemoteError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Creates a client for `base_url` with a per-request timeout
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RemoteError> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }

    /// Returns the base URL for API requests
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Creates a request builder for the given method and path
    ///
    /// # Arguments
    /// * `method` - HTTP method
    /// * `path` - API path relative to base URL (e.g., "/items/42")
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client.request(method, url)
    }

    /// Sends a request and decodes its JSON body, mapping error statuses
    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> Result<T, RemoteError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                RemoteError::Timeout(what.to_string())
            } else {
                RemoteError::NetworkError(e)
            }
        })?;

        let response = check_status(response, what)?;
        response
            .json::<T>()
            .await
            .map_err(|e| RemoteError::InvalidResponse(format!("{what}: {e}")))
    }

    /// Resolves a directory path to its identifier
    ///
    /// Returns `Ok(None)` when the server answers 404.
    pub async fn resolve_dir(&self, path: &str) -> Result<Option<u64>, RemoteError> {
        debug!(path, "Resolving remote directory");
        let request = self
            .request(Method::GET, "/dirs/resolve")
            .query(&[("path", path)]);

        match self.send_json::<ResolveResponse>(request, path).await {
            Ok(resp) => Ok(Some(resp.id)),
            Err(RemoteError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Lists one page of a directory's children
    pub(crate) async fn list_children(
        &self,
        id: u64,
        query: &ChildrenQuery<'_>,
    ) -> Result<ChildrenResponse, RemoteError> {
        debug!(
            id,
            offset = query.offset,
            limit = query.limit,
            with_ancestors = query.with_ancestors,
            "Listing remote directory"
        );

        let mut params: Vec<(&str, String)> = vec![
            ("offset", query.offset.to_string()),
            ("limit", query.limit.to_string()),
            ("ancestors", u8::from(query.with_ancestors).to_string()),
            ("sort", query.sort.to_string()),
            ("asc", u8::from(query.ascending).to_string()),
        ];
        if let Some(suffix) = query.suffix {
            params.push(("suffix", suffix.to_string()));
        }

        let request = self
            .request(Method::GET, &format!("/dirs/{id}/children"))
            .query(&params);
        self.send_json(request, &format!("children of {id}")).await
    }

    /// Fetches a single item record
    pub(crate) async fn get_item(&self, id: u64) -> Result<ItemDto, RemoteError> {
        let request = self.request(Method::GET, &format!("/items/{id}"));
        self.send_json(request, &format!("item {id}")).await
    }
}

/// Maps non-success statuses onto [`RemoteError`]
fn check_status(response: Response, what: &str) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::NOT_FOUND {
        return Err(RemoteError::NotFound(what.to_string()));
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .map(|v| parse_retry_after(v, DEFAULT_RETRY_AFTER))
            .unwrap_or(DEFAULT_RETRY_AFTER);
        return Err(RemoteError::TooManyRequests { retry_after });
    }

    if status.is_server_error() {
        return Err(RemoteError::ServerError(format!("{status} for {what}")));
    }

    Err(RemoteError::InvalidResponse(format!(
        "unexpected status {status} for {what}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let client = RemoteClient::new("http://localhost:8080/api/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080/api");
        let request = client.request(Method::GET, "/items/42").build().unwrap();
        assert_eq!(request.url().as_str(), "http://localhost:8080/api/items/42");
    }

    #[test]
    fn test_children_response_deserialization() {
        let json = r#"{
            "total": 2,
            "items": [
                {"id": 10, "parent_id": 5, "name": "A", "is_dir": true, "mtime": 1700000000},
                {"id": 11, "parent_id": 5, "name": "a.mkv", "is_dir": false,
                 "size": 1024, "mtime": 1700000001, "handle": "abcdefghij1234567"}
            ],
            "ancestors": [
                {"id": 0, "parent_id": 0, "name": ""},
                {"id": 5, "parent_id": 0, "name": "Movies"}
            ]
        }"#;

        let resp: ChildrenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.total, 2);
        assert_eq!(resp.items.len(), 2);
        assert!(resp.items[0].is_dir);
        assert_eq!(resp.items[1].handle.as_deref(), Some("abcdefghij1234567"));
        assert_eq!(resp.ancestors.unwrap().len(), 2);
    }

    #[test]
    fn test_children_response_missing_optional_fields() {
        let json = r#"{"total": 0}"#;
        let resp: ChildrenResponse = serde_json::from_str(json).unwrap();
        assert!(resp.items.is_empty());
        assert!(resp.ancestors.is_none());
    }

    #[test]
    fn test_item_defaults() {
        let item: ItemDto = serde_json::from_str(r#"{"id": 3}"#).unwrap();
        assert_eq!(item.parent_id, 0);
        assert!(item.name.is_empty());
        assert!(!item.is_dir);
        assert!(item.handle.is_none());
    }
}
