//! Shared test helpers for listing API integration tests
//!
//! Provides wiremock-based mock server setup. Each helper mounts the
//! necessary mock endpoints; [`setup_remote_mock`] returns a provider
//! pointing at the mock server.

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use strmsync_remote::client::RemoteClient;
use strmsync_remote::HttpRemoteTree;

/// Starts a mock server and returns a (MockServer, HttpRemoteTree) tuple.
///
/// Pre-configured endpoints:
/// - GET /dirs/resolve?path=/Movies → id 5
pub async fn setup_remote_mock() -> (MockServer, HttpRemoteTree) {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/dirs/resolve"))
        .and(query_param("path", "/Movies"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": 5 })))
        .mount(&server)
        .await;

    let client = RemoteClient::new(server.uri()).expect("build client");
    (server, HttpRemoteTree::new(client))
}

/// Mounts one page of children for directory `id` at `offset`.
pub async fn mount_children_page(
    server: &MockServer,
    id: u64,
    offset: u64,
    total: u64,
    items: serde_json::Value,
) {
    Mock::given(method("GET"))
        .and(path(format!("/dirs/{id}/children")))
        .and(query_param("offset", offset.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "total": total,
            "items": items,
        })))
        .mount(server)
        .await;
}

/// A file record as the API returns it.
pub fn file_json(id: u64, parent_id: u64, name: &str, handle: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "parent_id": parent_id,
        "name": name,
        "is_dir": false,
        "size": 1_073_741_824_u64,
        "mtime": 1_700_000_000,
        "handle": handle,
    })
}

/// A directory record as the API returns it.
pub fn dir_json(id: u64, parent_id: u64, name: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "parent_id": parent_id,
        "name": name,
        "is_dir": true,
        "mtime": 1_700_000_000,
    })
}
