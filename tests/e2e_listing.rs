//! E2E tests for the server listing, its cache and the timeline

mod common;

use common::TestApp;
use photosync::data::{LocalPhoto, SERVER_PHOTOS_CACHE_KEY};

#[tokio::test]
async fn test_fetch_maps_listing_and_fills_cache() {
    let app = TestApp::new().await;
    app.server.add_photo(
        "1",
        "beach.jpg",
        "2024-07-02T09:00:00Z",
        Some("2024-06-30T18:30:00Z"),
        b"beach",
    );
    app.server
        .add_photo("2", "city.jpg", "2024-05-10T12:00:00Z", None, b"city");

    let photos = app.state.gallery.fetch_server_photos(None).await;

    assert_eq!(photos.len(), 2);
    assert_eq!(photos[0].id, "1");
    assert_eq!(photos[0].url, app.server.url("/files/beach.jpg"));
    assert_eq!(photos[0].capture_date.as_deref(), Some("2024-06-30T18:30:00Z"));
    // missing capture date falls back to the upload time
    assert_eq!(photos[1].capture_date.as_deref(), Some("2024-05-10T12:00:00Z"));

    let cached = app.state.gallery.cache().get_cached().await.unwrap();
    assert_eq!(cached, Some(photos));
}

#[tokio::test]
async fn test_second_fetch_is_served_from_cache() {
    let app = TestApp::new().await;
    app.server
        .add_photo("1", "a.jpg", "2024-05-10T12:00:00Z", None, b"a");

    let first = app.state.gallery.fetch_server_photos(None).await;
    let second = app.state.gallery.fetch_server_photos(None).await;

    assert_eq!(first, second);
    assert_eq!(app.server.with_state(|s| s.list_calls), 1);
}

#[tokio::test]
async fn test_refresh_bypasses_cache() {
    let app = TestApp::new().await;
    app.server
        .add_photo("1", "a.jpg", "2024-05-10T12:00:00Z", None, b"a");
    assert_eq!(app.state.gallery.fetch_server_photos(None).await.len(), 1);

    app.server
        .add_photo("2", "b.jpg", "2024-05-11T12:00:00Z", None, b"b");
    assert_eq!(app.state.gallery.fetch_server_photos(None).await.len(), 1);

    let refreshed = app.state.gallery.refresh_server_photos(None).await;
    assert_eq!(refreshed.len(), 2);
    assert_eq!(app.server.with_state(|s| s.list_calls), 2);
}

#[tokio::test]
async fn test_folder_id_is_sent() {
    let app = TestApp::new().await;

    app.state.gallery.fetch_server_photos(Some("holiday")).await;

    let body = app.server.with_state(|s| s.last_list_body.clone()).unwrap();
    assert_eq!(body["folder_id"], "holiday");
}

#[tokio::test]
async fn test_server_failure_yields_empty_and_nothing_cached() {
    let app = TestApp::new().await;
    app.server
        .add_photo("1", "a.jpg", "2024-05-10T12:00:00Z", None, b"a");
    app.server.with_state(|s| s.list_success = false);

    assert!(app.state.gallery.fetch_server_photos(None).await.is_empty());
    assert!(app.state.gallery.cache().get_cached().await.unwrap().is_none());

    app.server.with_state(|s| s.list_success = true);
    assert_eq!(app.state.gallery.fetch_server_photos(None).await.len(), 1);
    assert_eq!(app.server.with_state(|s| s.list_calls), 2);
}

#[tokio::test]
async fn test_unreachable_server_yields_empty() {
    let app = TestApp::unreachable().await;
    assert!(app.state.gallery.fetch_server_photos(None).await.is_empty());
}

#[tokio::test]
async fn test_corrupt_cache_blob_is_refetched() {
    let app = TestApp::new().await;
    app.server
        .add_photo("1", "a.jpg", "2024-05-10T12:00:00Z", None, b"a");
    app.state
        .store
        .set(SERVER_PHOTOS_CACHE_KEY, &"not a listing")
        .await
        .unwrap();

    assert_eq!(app.state.gallery.fetch_server_photos(None).await.len(), 1);
    assert_eq!(app.server.with_state(|s| s.list_calls), 1);
}

#[tokio::test]
async fn test_timeline_merges_local_and_server_photos() {
    let app = TestApp::new().await;
    app.server.add_photo(
        "s1",
        "server.jpg",
        "2024-07-02T09:00:00Z",
        Some("2024-05-20T08:00:00Z"),
        b"s",
    );
    let server = app.state.gallery.fetch_server_photos(None).await;
    let local = vec![LocalPhoto {
        id: "l1".to_string(),
        uri: "file:///photos/l1.jpg".to_string(),
        creation_time: 1_719_835_200_000, // 2024-07-01T12:00:00Z
        modification_time: 1_719_835_200_000,
    }];

    let groups = app.state.gallery.timeline(&local, &server);

    assert_eq!(groups.len(), 2);
    assert_eq!((groups[0].month.as_str(), groups[0].year), ("July", 2024));
    assert_eq!((groups[1].month.as_str(), groups[1].year), ("May", 2024));
    assert_eq!(groups[1].photos.len(), 1);
}
