//! Image page, comments, ratings and admin actions.

use axum::http::StatusCode;

use image_gallery::store::{GalleryStore, RatingKey};

use super::test_utils::{assert_unauthorized, body_text, location, TestApp};

// =============================================================================
// Image Page
// =============================================================================

#[tokio::test]
async fn test_each_view_increments_once() {
    let app = TestApp::new().await;
    let (id, _) = app.add_image("Counted").await;

    for expected in 1..=3 {
        let response = app.get(&format!("/{}", id), None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let image = app.store.get_image(id).await.unwrap().unwrap();
        assert_eq!(image.views(), expected);
    }

    let html = body_text(app.get(&format!("/{}", id), None).await).await;
    assert!(html.contains("4 views"));
}

#[tokio::test]
async fn test_unknown_image_is_not_found() {
    let app = TestApp::new().await;

    for uri in ["/999", "/not-a-number", "/1.5"] {
        let response = app.get(uri, None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", uri);
        let html = body_text(response).await;
        assert!(html.contains("No Image Found"));
    }
}

#[tokio::test]
async fn test_image_page_shows_description_and_forms() {
    let app = TestApp::new().await;
    let (id, name) = app.add_image("A harbor at dusk").await;

    let html = body_text(app.get(&format!("/{}", id), None).await).await;
    assert!(html.contains("A harbor at dusk"));
    assert!(html.contains(&format!("/public/images/{}", name)));
    assert!(!html.contains(&format!("/{}/comments", id)));

    let cookie = app.signup("alice", "pw").await;
    let html = body_text(app.get(&format!("/{}", id), Some(&cookie)).await).await;
    assert!(html.contains(&format!("/{}/comments", id)));
    assert!(html.contains(&format!("/{}/ratings", id)));
    assert!(!html.contains(&format!("/{}/remove", id)));
}

// =============================================================================
// Comments
// =============================================================================

#[tokio::test]
async fn test_comment_requires_login() {
    let app = TestApp::new().await;
    let (id, _) = app.add_image("Quiet").await;

    let response = app
        .post_form(&format!("/{}/comments", id), "comment=hello", None)
        .await;
    assert_unauthorized(&response);
    assert!(app.store.get_comments_for_image(id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_comment_is_shown_with_author() {
    let app = TestApp::new().await;
    let (id, _) = app.add_image("Chatty").await;
    let cookie = app.signup("alice", "pw").await;

    let response = app
        .post_form(
            &format!("/{}/comments", id),
            "comment=Lovely+%3Cb%3Elight%3C%2Fb%3E",
            Some(&cookie),
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some(format!("/{}", id)));

    let comments = app.store.get_comments_for_image(id).await.unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].user(), app.user_id("alice").await);

    let html = body_text(app.get(&format!("/{}", id), None).await).await;
    assert!(html.contains("<strong>alice</strong>: Lovely &lt;b&gt;light&lt;/b&gt;"));
}

#[tokio::test]
async fn test_empty_comment_rejected() {
    let app = TestApp::new().await;
    let (id, _) = app.add_image("Silent").await;
    let cookie = app.signup("alice", "pw").await;

    let response = app
        .post_form(&format!("/{}/comments", id), "comment=+++", Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(location(&response), Some(format!("/{}", id)));

    let html = body_text(app.get(&format!("/{}", id), Some(&cookie)).await).await;
    assert!(html.contains("Ensure all fields are filled out"));
}

#[tokio::test]
async fn test_comment_on_missing_image() {
    let app = TestApp::new().await;
    let cookie = app.signup("alice", "pw").await;

    let response = app
        .post_form("/42/comments", "comment=hello", Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Ratings
// =============================================================================

#[tokio::test]
async fn test_rating_requires_login() {
    let app = TestApp::new().await;
    let (id, _) = app.add_image("Unrated").await;

    let response = app
        .post_form(&format!("/{}/ratings", id), "rating=5", None)
        .await;
    assert_unauthorized(&response);
}

#[tokio::test]
async fn test_second_rating_updates() {
    let app = TestApp::new().await;
    let (id, _) = app.add_image("Rated").await;
    let cookie = app.signup("alice", "pw").await;
    let key = RatingKey {
        user: app.user_id("alice").await,
        image: id,
    };

    let response = app
        .post_form(&format!("/{}/ratings", id), "rating=2", Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let stored = app.store.get_rating_for_user_image(key).await.unwrap().unwrap();
    assert_eq!(stored.rating(), 2);

    let response = app
        .post_form(&format!("/{}/ratings", id), "rating=5", Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let stored = app.store.get_rating_for_user_image(key).await.unwrap().unwrap();
    assert_eq!(stored.rating(), 5);

    // A single row: the average is the latest rating
    assert_eq!(
        app.store.get_average_rating_for_image(id).await.unwrap(),
        Some(5.0)
    );

    // Same value again is accepted without change
    let response = app
        .post_form(&format!("/{}/ratings", id), "rating=5", Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        app.store.get_average_rating_for_image(id).await.unwrap(),
        Some(5.0)
    );
}

#[tokio::test]
async fn test_average_over_users() {
    let app = TestApp::new().await;
    let (id, _) = app.add_image("Popular").await;
    let alice = app.signup("alice", "pw").await;
    let bob = app.signup("bob", "pw").await;

    app.post_form(&format!("/{}/ratings", id), "rating=3", Some(&alice))
        .await;
    app.post_form(&format!("/{}/ratings", id), "rating=4", Some(&bob))
        .await;

    let html = body_text(app.get(&format!("/{}", id), None).await).await;
    assert!(html.contains("3.5 / 5"));
}

#[tokio::test]
async fn test_invalid_rating_rejected() {
    let app = TestApp::new().await;
    let (id, _) = app.add_image("Strict").await;
    let cookie = app.signup("alice", "pw").await;

    for body in ["", "rating=0", "rating=6", "rating=abc"] {
        let response = app
            .post_form(&format!("/{}/ratings", id), body, Some(&cookie))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", body);
        assert_eq!(location(&response), Some(format!("/{}", id)));
    }

    let html = body_text(app.get(&format!("/{}", id), Some(&cookie)).await).await;
    assert!(html.contains("Rating must be a number between 1 and 5"));
    assert_eq!(
        app.store.get_average_rating_for_image(id).await.unwrap(),
        None
    );
}

// =============================================================================
// Admin Actions
// =============================================================================

#[tokio::test]
async fn test_non_admin_cannot_edit_or_remove() {
    let app = TestApp::new().await;
    let (id, name) = app.add_image("Protected").await;
    let member = app.signup("alice", "pw").await;

    for cookie in [None, Some(member.as_str())] {
        for (uri, body) in [
            (format!("/{}", id), "description=Hacked"),
            (format!("/{}", id), ""),
            (format!("/{}/remove", id), ""),
            ("/9999".to_string(), "description=Hacked"),
            ("/9999/remove".to_string(), ""),
            ("/nope/remove".to_string(), "junk"),
        ] {
            let response = app.post_form(&uri, body, cookie).await;
            assert_unauthorized(&response);
        }
    }

    let image = app.store.get_image(id).await.unwrap().unwrap();
    assert_eq!(image.alt(), "Protected");
    assert!(app.image_path(&name).exists());
}

#[tokio::test]
async fn test_admin_edits_description() {
    let app = TestApp::new().await;
    let (id, _) = app.add_image("Old words").await;
    let admin = app.admin("root", "rootpw").await;

    // Views from the page load stay intact after the edit
    app.get(&format!("/{}", id), None).await;

    let response = app
        .post_form(&format!("/{}", id), "description=New+words", Some(&admin))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some(format!("/{}", id)));

    let image = app.store.get_image(id).await.unwrap().unwrap();
    assert_eq!(image.alt(), "New words");
    assert_eq!(image.views(), 1);

    let html = body_text(app.get(&format!("/{}", id), Some(&admin)).await).await;
    assert!(html.contains(&format!("/{}/remove", id)));
}

#[tokio::test]
async fn test_admin_edit_requires_description() {
    let app = TestApp::new().await;
    let (id, _) = app.add_image("Keep").await;
    let admin = app.admin("root", "rootpw").await;

    let response = app
        .post_form(&format!("/{}", id), "description=", Some(&admin))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(location(&response), Some(format!("/{}", id)));

    let long = "x".repeat(51);
    let response = app
        .post_form(
            &format!("/{}", id),
            &format!("description={}", long),
            Some(&admin),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let image = app.store.get_image(id).await.unwrap().unwrap();
    assert_eq!(image.alt(), "Keep");
}

#[tokio::test]
async fn test_admin_removes_image() {
    let app = TestApp::new().await;
    let (id, name) = app.add_image("Doomed").await;
    let admin = app.admin("root", "rootpw").await;
    let member = app.signup("alice", "pw").await;

    app.post_form(&format!("/{}/comments", id), "comment=bye", Some(&member))
        .await;
    app.post_form(&format!("/{}/ratings", id), "rating=4", Some(&member))
        .await;

    let response = app
        .post_form(&format!("/{}/remove", id), "", Some(&admin))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response).as_deref(), Some("/"));

    assert!(!app.image_path(&name).exists());
    assert!(app.store.get_image(id).await.unwrap().is_none());
    assert!(app.store.get_comments_for_image(id).await.unwrap().is_empty());

    let response = app.get(&format!("/{}", id), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_remove_missing_image() {
    let app = TestApp::new().await;
    let admin = app.admin("root", "rootpw").await;

    let response = app.post_form("/9999/remove", "", Some(&admin)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
