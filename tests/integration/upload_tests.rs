//! Image uploads.

use axum::http::StatusCode;

use image_gallery::storage::names::{MAX_STEM_LEN, MIN_STEM_LEN};
use image_gallery::store::GalleryStore;

use super::test_utils::{assert_unauthorized, body_text, location, multipart_body, TestApp};

const PNG: &[u8] = b"\x89PNG\r\n\x1a\nnot really a png";

#[tokio::test]
async fn test_upload_requires_login() {
    let app = TestApp::new().await;

    assert_unauthorized(&app.get("/upload", None).await);

    let body = multipart_body(Some(("cat.png", PNG)), Some("A cat"));
    let response = app.post_multipart("/upload", body, None).await;
    assert_unauthorized(&response);

    let html = body_text(response).await;
    assert!(html.contains("url=/auth/login"));
    assert!(app.store.get_images().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_upload_form_for_signed_in_user() {
    let app = TestApp::new().await;
    let cookie = app.signup("alice", "pw").await;

    let response = app.get("/upload", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let html = body_text(response).await;
    assert!(html.contains(r#"enctype="multipart/form-data""#));
    assert!(html.contains(r#"name="image""#));
    assert!(html.contains(r#"name="description""#));
}

#[tokio::test]
async fn test_upload_stores_record_and_file() {
    let app = TestApp::new().await;
    let cookie = app.signup("alice", "pw").await;

    let body = multipart_body(Some(("Holiday.JPG", PNG)), Some("Beach day"));
    let response = app.post_multipart("/upload", body, Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response).as_deref(), Some("/"));

    let images = app.store.get_images().await.unwrap();
    assert_eq!(images.len(), 1);
    let image = &images[0];
    assert_eq!(image.alt(), "Beach day");
    assert_eq!(image.views(), 0);

    let stem = image.name().strip_suffix(".jpg").unwrap();
    assert!((MIN_STEM_LEN..=MAX_STEM_LEN).contains(&stem.len()));
    assert!(stem.chars().all(|c| c.is_ascii_alphanumeric()));

    let stored = std::fs::read(app.image_path(image.name())).unwrap();
    assert_eq!(stored, PNG);

    let html = body_text(app.get("/", None).await).await;
    assert!(html.contains("Beach day"));
}

#[tokio::test]
async fn test_upload_missing_description() {
    let app = TestApp::new().await;
    let cookie = app.signup("alice", "pw").await;

    let body = multipart_body(Some(("cat.png", PNG)), None);
    let response = app.post_multipart("/upload", body, Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(location(&response).as_deref(), Some("/upload"));

    let html = body_text(app.get("/upload", Some(&cookie)).await).await;
    assert!(html.contains("Ensure all fields are filled out"));
    assert!(app.store.get_images().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_upload_missing_file() {
    let app = TestApp::new().await;
    let cookie = app.signup("alice", "pw").await;

    let body = multipart_body(None, Some("Nothing attached"));
    let response = app.post_multipart("/upload", body, Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = multipart_body(Some(("empty.png", &b""[..])), Some("Empty file"));
    let response = app.post_multipart("/upload", body, Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert!(app.store.get_images().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_upload_unsupported_extension() {
    let app = TestApp::new().await;
    let cookie = app.signup("alice", "pw").await;

    for filename in ["noextension", "image.toolong"] {
        let body = multipart_body(Some((filename, PNG)), Some("Bad name"));
        let response = app.post_multipart("/upload", body, Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", filename);
    }

    let html = body_text(app.get("/upload", Some(&cookie)).await).await;
    assert!(html.contains("Unsupported file type"));
    assert!(app.store.get_images().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_upload_description_too_long() {
    let app = TestApp::new().await;
    let cookie = app.signup("alice", "pw").await;

    let long = "d".repeat(51);
    let body = multipart_body(Some(("cat.png", PNG)), Some(&long));
    let response = app.post_multipart("/upload", body, Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let html = body_text(app.get("/upload", Some(&cookie)).await).await;
    assert!(html.contains("The description must be at most 50 characters"));
}

#[tokio::test]
async fn test_upload_rejects_non_multipart_body() {
    let app = TestApp::new().await;
    let cookie = app.signup("alice", "pw").await;

    let response = app
        .post_form("/upload", "description=hello", Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(location(&response).as_deref(), Some("/upload"));
}
