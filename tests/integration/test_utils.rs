//! Test utilities for integration tests.
//!
//! [`TestApp`] wires the real router to an in-memory SQLite store and a
//! scratch public directory, and offers request helpers that carry the
//! session cookie the way a browser would.

use std::path::PathBuf;

use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use image_gallery::server::hash_password;
use image_gallery::storage::{generate_image_name, ImageStorage};
use image_gallery::store::{GalleryStore, NewImage, NewUser};
use image_gallery::{create_router, RouterConfig, SqliteStore};

/// Lowest bcrypt cost, to keep signup and login fast in tests.
pub const TEST_BCRYPT_COST: u32 = 4;

pub const TEST_SECRET: &str = "integration-test-secret";

const BOUNDARY: &str = "gallery-test-boundary";

// =============================================================================
// Test Application
// =============================================================================

pub struct TestApp {
    pub router: Router,
    pub store: SqliteStore,
    pub storage: ImageStorage,
    pub public_dir: PathBuf,
}

impl TestApp {
    pub async fn new() -> Self {
        let store = SqliteStore::in_memory().await.unwrap();
        let public_dir =
            std::env::temp_dir().join(format!("image-gallery-it-{}", generate_image_name("d")));
        std::fs::create_dir_all(&public_dir).unwrap();

        let config = RouterConfig::new(TEST_SECRET, &public_dir)
            .with_bcrypt_cost(TEST_BCRYPT_COST)
            .with_tracing(false);
        let router = create_router(store.clone(), config);

        Self {
            router,
            store,
            storage: ImageStorage::new(&public_dir),
            public_dir,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    /// POST an `application/x-www-form-urlencoded` body.
    pub async fn post_form(&self, uri: &str, body: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    /// POST a `multipart/form-data` body built by [`multipart_body`].
    pub async fn post_multipart(
        &self,
        uri: &str,
        body: Vec<u8>,
        cookie: Option<&str>,
    ) -> Response<Body> {
        let mut builder = Request::builder().method("POST").uri(uri).header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        );
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body)).unwrap()).await
    }

    /// Sign up through the HTTP form and return the session cookie.
    pub async fn signup(&self, username: &str, password: &str) -> String {
        let body = format!(
            "username={0}&password={1}&passwordConfirm={1}",
            username, password
        );
        let response = self.post_form("/auth/signup", &body, None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        session_cookie(&response).expect("signup should set a session cookie")
    }

    /// Log in through the HTTP form and return the session cookie.
    pub async fn login(&self, username: &str, password: &str) -> String {
        let body = format!("username={}&password={}", username, password);
        let response = self.post_form("/auth/login", &body, None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        session_cookie(&response).expect("login should set a session cookie")
    }

    /// Create an admin directly in the store, then log in as them.
    pub async fn admin(&self, username: &str, password: &str) -> String {
        let passhash = hash_password(password, TEST_BCRYPT_COST).await.unwrap();
        self.store
            .insert_user(&NewUser::new(username, passhash, true).unwrap())
            .await
            .unwrap();
        self.login(username, password).await
    }

    pub async fn user_id(&self, username: &str) -> i64 {
        self.store
            .get_user_by_username(username)
            .await
            .unwrap()
            .expect("user should exist")
            .id()
    }

    /// Insert an image record and write a file for it, bypassing HTTP.
    pub async fn add_image(&self, alt: &str) -> (i64, String) {
        let name = generate_image_name("png");
        let id = self
            .store
            .insert_image(&NewImage::new(&name, alt).unwrap())
            .await
            .unwrap();
        self.storage
            .write(&name, bytes::Bytes::from_static(b"\x89PNG\r\n\x1a\n"))
            .await
            .unwrap();
        (id, name)
    }

    pub fn image_path(&self, name: &str) -> PathBuf {
        self.storage.path_for(name).unwrap()
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.public_dir);
    }
}

// =============================================================================
// Response Helpers
// =============================================================================

/// The `name=value` pair from a `Set-Cookie` header, ready for `Cookie`.
pub fn session_cookie<B>(response: &Response<B>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with("gallery_session="))
        .and_then(|value| value.split(';').next())
        .map(str::to_string)
}

pub fn location<B>(response: &Response<B>) -> Option<String> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Assert a 401 that sends the browser to the login page.
pub fn assert_unauthorized<B>(response: &Response<B>) {
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(location(response).as_deref(), Some("/auth/login"));
}

// =============================================================================
// Multipart Builder
// =============================================================================

/// Build a multipart body. `file` is `(filename, bytes)` for the `image` part.
pub fn multipart_body(file: Option<(&str, &[u8])>, description: Option<&str>) -> Vec<u8> {
    let mut body = Vec::new();

    if let Some((filename, data)) = file {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                BOUNDARY, filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }

    if let Some(description) = description {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"description\"\r\n\r\n{}\r\n",
                BOUNDARY, description
            )
            .as_bytes(),
        );
    }

    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}
