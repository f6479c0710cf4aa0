//! Integration tests for directory resolution and listings
//!
//! Verifies:
//! - Path resolution, including 404 → `None`
//! - Paged children listings and query parameters
//! - Ancestor-aware listings
//! - Single-item metadata lookups

use strmsync_core::domain::{ItemKind, RemoteId, RemotePath};
use strmsync_core::ports::{IRemoteTree, ListOptions, SortField};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use crate::common;

#[tokio::test]
async fn test_resolve_existing_directory() {
    let (_server, remote) = common::setup_remote_mock().await;

    let id = remote
        .resolve_path_to_id(&RemotePath::new("/Movies").unwrap())
        .await
        .expect("resolve failed");

    assert_eq!(id, Some(RemoteId::new(5)));
}

#[tokio::test]
async fn test_resolve_missing_directory_is_none() {
    let (server, remote) = common::setup_remote_mock().await;

    Mock::given(method("GET"))
        .and(path("/dirs/resolve"))
        .and(query_param("path", "/Nope"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let id = remote
        .resolve_path_to_id(&RemotePath::new("/Nope").unwrap())
        .await
        .expect("resolve failed");

    assert!(id.is_none());
}

#[tokio::test]
async fn test_list_children_page() {
    let (server, remote) = common::setup_remote_mock().await;

    common::mount_children_page(
        &server,
        5,
        0,
        2,
        serde_json::json!([
            common::dir_json(10, 5, "A"),
            common::file_json(11, 5, "a.mkv", "abcdefghij1234567"),
        ]),
    )
    .await;

    let page = remote
        .list_children(RemoteId::new(5), 0, 100, &ListOptions::default())
        .await
        .expect("list failed");

    assert_eq!(page.total, 2);
    assert_eq!(page.entries.len(), 2);
    assert!(page.entries[0].is_dir());
    assert_eq!(page.entries[1].name, "a.mkv");
    assert!(page.ancestors.is_none());
}

#[tokio::test]
async fn test_list_children_sends_options() {
    let (server, remote) = common::setup_remote_mock().await;

    Mock::given(method("GET"))
        .and(path("/dirs/5/children"))
        .and(query_param("offset", "50"))
        .and(query_param("limit", "25"))
        .and(query_param("ancestors", "0"))
        .and(query_param("sort", "mtime"))
        .and(query_param("asc", "0"))
        .and(query_param("suffix", "mkv"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "total": 60, "items": [] })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let options = ListOptions {
        sort: SortField::ModifyTime,
        ascending: false,
        suffix: Some("mkv".into()),
    };
    let page = remote
        .list_children(RemoteId::new(5), 50, 25, &options)
        .await
        .expect("list failed");

    assert_eq!(page.total, 60);
    assert!(page.entries.is_empty());
}

#[tokio::test]
async fn test_list_children_with_ancestors() {
    let (server, remote) = common::setup_remote_mock().await;

    Mock::given(method("GET"))
        .and(path("/dirs/10/children"))
        .and(query_param("ancestors", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "total": 1,
            "items": [common::file_json(11, 10, "a.mkv", "abcdefghij1234567")],
            "ancestors": [
                {"id": 0, "parent_id": 0, "name": ""},
                {"id": 5, "parent_id": 0, "name": "Movies"},
                {"id": 10, "parent_id": 5, "name": "A"}
            ]
        })))
        .mount(&server)
        .await;

    let page = remote
        .list_children_with_ancestors(RemoteId::new(10), 0, 100, &ListOptions::default())
        .await
        .expect("list failed");

    assert_eq!(page.ancestors.as_ref().map(Vec::len), Some(3));
    assert_eq!(page.ancestor_path().unwrap().as_str(), "/Movies/A");
}

#[tokio::test]
async fn test_get_item_metadata() {
    let (server, remote) = common::setup_remote_mock().await;

    Mock::given(method("GET"))
        .and(path("/items/11"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(common::file_json(11, 10, "a.mkv", "abcdefghij1234567")),
        )
        .mount(&server)
        .await;

    let entry = remote
        .get_item_metadata(RemoteId::new(11))
        .await
        .expect("metadata failed");

    assert_eq!(entry.parent_id, RemoteId::new(10));
    match entry.kind {
        ItemKind::File {
            size,
            content_handle,
        } => {
            assert_eq!(size, 1_073_741_824);
            assert_eq!(content_handle.as_deref(), Some("abcdefghij1234567"));
        }
        ItemKind::Directory => panic!("expected a file"),
    }
}
