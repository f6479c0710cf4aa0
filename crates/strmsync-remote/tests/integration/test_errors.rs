//! Integration tests for error mapping and retries
//!
//! Verifies that HTTP statuses map onto `RemoteError` variants and that
//! the rate-limited decorator retries transient failures only.

use std::sync::Arc;
use std::time::Duration;

use strmsync_core::domain::RemoteId;
use strmsync_core::ports::{IRemoteTree, ListOptions};
use strmsync_remote::{RateLimitedRemote, RemoteError, RetryPolicy, SlidingWindowLimiter};
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common;

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_retries: 3,
        base_delay: Duration::from_millis(5),
    }
}

#[tokio::test]
async fn test_missing_item_maps_to_not_found() {
    let (server, remote) = common::setup_remote_mock().await;

    Mock::given(method("GET"))
        .and(path("/items/404"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = remote.get_item_metadata(RemoteId::new(404)).await.unwrap_err();
    assert!(RemoteError::is_not_found(&err));
}

#[tokio::test]
async fn test_server_error_maps_to_server_error() {
    let (server, remote) = common::setup_remote_mock().await;

    Mock::given(method("GET"))
        .and(path("/dirs/5/children"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = remote
        .list_children(RemoteId::new(5), 0, 10, &ListOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RemoteError>(),
        Some(RemoteError::ServerError(_))
    ));
}

#[tokio::test]
async fn test_throttle_maps_to_too_many_requests() {
    let (server, remote) = common::setup_remote_mock().await;

    Mock::given(method("GET"))
        .and(path("/dirs/5/children"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
        .mount(&server)
        .await;

    let err = remote
        .list_children(RemoteId::new(5), 0, 10, &ListOptions::default())
        .await
        .unwrap_err();
    match err.downcast_ref::<RemoteError>() {
        Some(RemoteError::TooManyRequests { retry_after }) => {
            assert_eq!(*retry_after, Duration::from_secs(7));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_body_maps_to_invalid_response() {
    let (server, remote) = common::setup_remote_mock().await;

    Mock::given(method("GET"))
        .and(path("/items/1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = remote.get_item_metadata(RemoteId::new(1)).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RemoteError>(),
        Some(RemoteError::InvalidResponse(_))
    ));
}

#[tokio::test]
async fn test_decorator_retries_server_errors_until_success() {
    let (server, remote) = common::setup_remote_mock().await;

    // First two calls fail, then the regular page is served
    Mock::given(method("GET"))
        .and(path("/dirs/5/children"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    common::mount_children_page(
        &server,
        5,
        0,
        1,
        serde_json::json!([common::file_json(11, 5, "a.mkv", "abcdefghij1234567")]),
    )
    .await;

    let limited = RateLimitedRemote::new(
        remote,
        Arc::new(SlidingWindowLimiter::new(100, Duration::from_secs(1))),
        Duration::ZERO,
        fast_retry(),
    );

    let page = limited
        .list_children(RemoteId::new(5), 0, 10, &ListOptions::default())
        .await
        .expect("list should succeed after retries");
    assert_eq!(page.entries.len(), 1);
}

#[tokio::test]
async fn test_decorator_does_not_retry_not_found() {
    let (server, remote) = common::setup_remote_mock().await;

    Mock::given(method("GET"))
        .and(path("/items/9"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let limited = RateLimitedRemote::new(
        remote,
        Arc::new(SlidingWindowLimiter::new(100, Duration::from_secs(1))),
        Duration::ZERO,
        fast_retry(),
    );

    let err = limited.get_item_metadata(RemoteId::new(9)).await.unwrap_err();
    assert!(RemoteError::is_not_found(&err));
}
