//! HTTP request handlers for the gallery.
//!
//! # Endpoints
//!
//! - `GET /` - Gallery of all images
//! - `GET /upload`, `POST /upload` - Upload form and submission
//! - `GET /{image}` - Image page (counts a view)
//! - `POST /{image}` - Edit description (admin)
//! - `POST /{image}/remove` - Delete image (admin)
//! - `POST /{image}/comments` - Add comment
//! - `POST /{image}/ratings` - Rate image
//! - `GET /auth/login`, `POST /auth/login`
//! - `GET /auth/signup`, `POST /auth/signup`
//! - `GET /auth/logout`
//! - `GET /health` - Health check endpoint

use std::sync::Arc;

use axum::{
    extract::{
        multipart::{Multipart, MultipartRejection},
        rejection::FormRejection,
        Path, State,
    },
    response::{Html, IntoResponse, Redirect, Response},
    Form, Json,
};
use bytes::Bytes;
use http::{header, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::{GalleryError, ValidationError};
use crate::storage::{generate_image_name, upload_extension, ImageStorage};
use crate::store::models::required;
use crate::store::{GalleryStore, Image, ImageRating, NewComment, NewImage, RatingKey};

use super::auth::{Authenticator, LoginForm, SignupForm};
use super::session::{FlashMessage, Session, SessionIdentity};
use super::views::{self, AuthMode, CommentView, PageContext};

// =============================================================================
// Application State
// =============================================================================

/// Shared application state.
///
/// This is passed to all handlers via Axum's State extractor.
pub struct AppState<S: GalleryStore> {
    /// Users, images, comments and ratings
    pub store: Arc<S>,

    /// Uploaded image files
    pub storage: ImageStorage,

    /// Login and signup
    pub auth: Authenticator<S>,
}

impl<S: GalleryStore> AppState<S> {
    /// Create application state sharing one store between handlers and auth.
    pub fn new(store: Arc<S>, storage: ImageStorage, bcrypt_cost: u32) -> Self {
        Self {
            auth: Authenticator::new(Arc::clone(&store), bcrypt_cost),
            store,
            storage,
        }
    }
}

impl<S: GalleryStore> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            storage: self.storage.clone(),
            auth: self.auth.clone(),
        }
    }
}

// =============================================================================
// Request Parameters
// =============================================================================

/// Body of `POST /{image}`.
#[derive(Debug, Default, Deserialize)]
pub struct DescriptionForm {
    #[serde(default)]
    pub description: Option<String>,
}

/// Body of `POST /{image}/comments`.
#[derive(Debug, Default, Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub comment: Option<String>,
}

/// Body of `POST /{image}/ratings`.
#[derive(Debug, Default, Deserialize)]
pub struct RatingForm {
    #[serde(default)]
    pub rating: Option<String>,
}

/// Image ids that are not integers name no image.
fn parse_image_id(raw: &str) -> Option<i64> {
    raw.parse().ok()
}

/// An unreadable form body counts as one with every field missing.
///
/// Handlers take the form as a `Result` so authorization is decided before
/// the payload is looked at.
fn form_or_default<T: Default>(form: Result<Form<T>, FormRejection>) -> T {
    match form {
        Ok(Form(form)) => form,
        Err(rejection) => {
            debug!(error = %rejection, "Unreadable form body");
            T::default()
        }
    }
}

fn image_path(id: i64) -> String {
    format!("/{}", id)
}

// =============================================================================
// Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,
}

/// `302 Found` to `location`.
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// A response with a `Location` header, a refreshing HTML body, and an
/// optional flash for the next page.
fn located(status: StatusCode, location: &str, flash: Option<String>) -> Response {
    let mut response = (
        status,
        [(header::LOCATION, location.to_string())],
        Html(views::redirect_page(location)),
    )
        .into_response();

    if let Some(message) = flash {
        response.extensions_mut().insert(FlashMessage(message));
    }
    response
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Convert GalleryError to HTTP response.
///
/// This implementation logs errors based on their severity:
/// - 5xx errors are logged at ERROR level
/// - 401 is logged at WARN level
/// - other client errors are logged at DEBUG level
impl IntoResponse for GalleryError {
    fn into_response(self) -> Response {
        let message = self.to_string();

        let response = match self {
            GalleryError::Unauthorized => {
                located(StatusCode::UNAUTHORIZED, "/auth/login", None)
            }

            GalleryError::Rejected {
                message,
                redirect_to,
            } => located(StatusCode::BAD_REQUEST, &redirect_to, Some(message)),

            GalleryError::LoginFailed {
                message,
                redirect_to,
            } => located(StatusCode::FOUND, &redirect_to, Some(message)),

            GalleryError::ImageNotFound { viewer } => {
                let ctx = PageContext::new(viewer, Some(message.clone()));
                (StatusCode::NOT_FOUND, Html(views::not_found_page(&ctx))).into_response()
            }

            GalleryError::Store(_) | GalleryError::Storage(_) | GalleryError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html("<h1>Internal Server Error</h1>".to_string()),
            )
                .into_response(),
        };

        let status = response.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), "Server error: {}", message);
        } else if status == StatusCode::UNAUTHORIZED {
            warn!(status = status.as_u16(), "Unauthorized: {}", message);
        } else {
            debug!(status = status.as_u16(), "Client error: {}", message);
        }

        response
    }
}

// =============================================================================
// Shared Lookups
// =============================================================================

/// The page context for a render: the viewer and the pending flash.
async fn page_context(session: &Session) -> PageContext {
    PageContext::new(session.identity().await, session.take_flash().await)
}

/// Resolve a raw path segment to an existing image.
async fn find_image<S: GalleryStore>(
    state: &AppState<S>,
    raw_id: &str,
    viewer: Option<SessionIdentity>,
) -> Result<Image, GalleryError> {
    let Some(id) = parse_image_id(raw_id) else {
        return Err(GalleryError::ImageNotFound { viewer });
    };

    match state.store.get_image(id).await? {
        Some(image) => Ok(image),
        None => Err(GalleryError::ImageNotFound { viewer }),
    }
}

// =============================================================================
// Gallery Handlers
// =============================================================================

/// Handle gallery requests.
///
/// # Endpoint
///
/// `GET /`
///
/// # Response
///
/// `200 OK` with every image and its average rating (one decimal place).
pub async fn gallery_handler<S: GalleryStore>(
    State(state): State<AppState<S>>,
    session: Session,
) -> Result<Html<String>, GalleryError> {
    let images = state.store.get_images().await?;

    let mut entries = Vec::with_capacity(images.len());
    for image in images {
        let rating = state.store.get_average_rating_for_image(image.id()).await?;
        entries.push((image, rating));
    }

    let ctx = page_context(&session).await;
    Ok(Html(views::gallery_page(&ctx, &entries)))
}

/// Handle upload form requests.
///
/// # Endpoint
///
/// `GET /upload`
///
/// # Errors
///
/// - `401 Unauthorized`: Not signed in
pub async fn upload_form_handler(session: Session) -> Result<Html<String>, GalleryError> {
    session.require_user().await?;
    let ctx = page_context(&session).await;
    Ok(Html(views::upload_page(&ctx)))
}

/// Handle image uploads.
///
/// # Endpoint
///
/// `POST /upload` (`multipart/form-data` with `image` and `description`)
///
/// # Response
///
/// `303 See Other` to `/` once the record is inserted and the file written.
///
/// # Errors
///
/// - `400 Bad Request`: Missing field, unsupported extension, or unreadable body
/// - `401 Unauthorized`: Not signed in
/// - `500 Internal Server Error`: Store or filesystem failure
pub async fn upload_handler<S: GalleryStore>(
    State(state): State<AppState<S>>,
    session: Session,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, GalleryError> {
    let user = session.require_user().await?;

    let mut multipart = multipart.map_err(|rejection| {
        debug!(error = %rejection, "Upload is not multipart");
        GalleryError::invalid(ValidationError::MissingField("image"), "/upload")
    })?;

    let mut file: Option<(Option<String>, Bytes)> = None;
    let mut description: Option<String> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => {
                return Err(GalleryError::rejected(
                    format!("Upload failed: {}", err.body_text()),
                    "/upload",
                ))
            }
        };

        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("image") => {
                let original_name = field.file_name().map(str::to_string);
                let data = field.bytes().await.map_err(|err| {
                    GalleryError::rejected(format!("Upload failed: {}", err.body_text()), "/upload")
                })?;
                file = Some((original_name, data));
            }
            Some("description") => {
                let text = field.text().await.map_err(|err| {
                    GalleryError::rejected(format!("Upload failed: {}", err.body_text()), "/upload")
                })?;
                description = Some(text);
            }
            _ => {}
        }
    }

    let (original_name, data) = match file {
        Some((name, data)) if !data.is_empty() => (name, data),
        _ => {
            return Err(GalleryError::invalid(
                ValidationError::MissingField("image"),
                "/upload",
            ))
        }
    };
    let description = required("description", description.as_deref())
        .map_err(|err| GalleryError::invalid(err, "/upload"))?;

    let extension = upload_extension(original_name.as_deref().unwrap_or_default())
        .map_err(|err| GalleryError::invalid(err, "/upload"))?;
    let name = generate_image_name(&extension);

    let new_image =
        NewImage::new(&name, description).map_err(|err| GalleryError::invalid(err, "/upload"))?;
    let id = state.store.insert_image(&new_image).await?;
    state.storage.write(&name, data).await?;

    info!(image_id = id, name = %name, user_id = user.user_id, "Image uploaded");
    Ok(Redirect::to("/").into_response())
}

/// Handle image page requests.
///
/// # Endpoint
///
/// `GET /{image}`
///
/// Every successful request adds one to the image's view count.
///
/// # Errors
///
/// - `404 Not Found`: Unknown or non-numeric id
pub async fn image_handler<S: GalleryStore>(
    State(state): State<AppState<S>>,
    Path(raw_id): Path<String>,
    session: Session,
) -> Result<Html<String>, GalleryError> {
    let viewer = session.identity().await;
    let image = find_image(&state, &raw_id, viewer.clone()).await?.viewed();
    state.store.update_image(&image).await?;

    let mut comments = Vec::new();
    for comment in state.store.get_comments_for_image(image.id()).await? {
        // comments.user is a foreign key and accounts are never deleted
        let author = state
            .store
            .get_user_by_id(comment.user())
            .await?
            .ok_or_else(|| {
                GalleryError::Internal(format!(
                    "comment {} has no author {}",
                    comment.id(),
                    comment.user()
                ))
            })?;
        comments.push(CommentView {
            author: author.username().to_string(),
            text: comment.text().to_string(),
        });
    }

    let rating = state
        .store
        .get_average_rating_for_image(image.id())
        .await?;

    let ctx = PageContext::new(viewer, session.take_flash().await);
    Ok(Html(views::image_page(&ctx, &image, &comments, rating)))
}

/// Handle description edits.
///
/// # Endpoint
///
/// `POST /{image}` with `description`
///
/// # Errors
///
/// - `400 Bad Request`: Missing or overlong description
/// - `401 Unauthorized`: Not an admin (checked before the image is looked up)
/// - `404 Not Found`: Unknown image
pub async fn edit_image_handler<S: GalleryStore>(
    State(state): State<AppState<S>>,
    Path(raw_id): Path<String>,
    session: Session,
    form: Result<Form<DescriptionForm>, FormRejection>,
) -> Result<Response, GalleryError> {
    let admin = session.require_admin().await?;
    let image = find_image(&state, &raw_id, Some(admin)).await?;
    let location = image_path(image.id());
    let form = form_or_default(form);

    let description = required("description", form.description.as_deref())
        .map_err(|err| GalleryError::invalid(err, location.clone()))?;
    let image = image
        .with_description(description)
        .map_err(|err| GalleryError::invalid(err, location.clone()))?;
    state.store.update_image(&image).await?;

    debug!(image_id = image.id(), "Image description updated");
    Ok(Redirect::to(&location).into_response())
}

/// Handle image removal.
///
/// # Endpoint
///
/// `POST /{image}/remove`
///
/// Deletes the stored file, then the record with its comments and ratings.
///
/// # Errors
///
/// - `401 Unauthorized`: Not an admin (checked before the image is looked up)
/// - `404 Not Found`: Unknown image
pub async fn remove_image_handler<S: GalleryStore>(
    State(state): State<AppState<S>>,
    Path(raw_id): Path<String>,
    session: Session,
) -> Result<Response, GalleryError> {
    let admin = session.require_admin().await?;
    let image = find_image(&state, &raw_id, Some(admin.clone())).await?;

    state.storage.remove(image.name()).await?;
    state.store.delete_image(image.id()).await?;

    info!(image_id = image.id(), user_id = admin.user_id, "Image removed");
    Ok(Redirect::to("/").into_response())
}

/// Handle new comments.
///
/// # Endpoint
///
/// `POST /{image}/comments` with `comment`
///
/// # Errors
///
/// - `400 Bad Request`: Missing or overlong comment
/// - `401 Unauthorized`: Not signed in
/// - `404 Not Found`: Unknown image
pub async fn comment_handler<S: GalleryStore>(
    State(state): State<AppState<S>>,
    Path(raw_id): Path<String>,
    session: Session,
    form: Result<Form<CommentForm>, FormRejection>,
) -> Result<Response, GalleryError> {
    let user = session.require_user().await?;
    let image = find_image(&state, &raw_id, Some(user.clone())).await?;
    let location = image_path(image.id());
    let form = form_or_default(form);

    let new_comment = required("comment", form.comment.as_deref())
        .and_then(|text| NewComment::new(text, user.user_id, image.id()))
        .map_err(|err| GalleryError::invalid(err, location.clone()))?;
    state.store.insert_comment(&new_comment).await?;

    Ok(Redirect::to(&location).into_response())
}

/// Handle ratings.
///
/// # Endpoint
///
/// `POST /{image}/ratings` with `rating` (1 to 5)
///
/// Inserts the caller's first rating, or updates it when the value changed.
///
/// # Errors
///
/// - `400 Bad Request`: Rating missing or out of range
/// - `401 Unauthorized`: Not signed in, or the account no longer exists
/// - `404 Not Found`: Unknown image
pub async fn rating_handler<S: GalleryStore>(
    State(state): State<AppState<S>>,
    Path(raw_id): Path<String>,
    session: Session,
    form: Result<Form<RatingForm>, FormRejection>,
) -> Result<Response, GalleryError> {
    let identity = session.require_user().await?;
    let user = state
        .store
        .get_user_by_id(identity.user_id)
        .await?
        .ok_or(GalleryError::Unauthorized)?;

    let image = find_image(&state, &raw_id, Some(identity)).await?;
    let location = image_path(image.id());
    let form = form_or_default(form);

    let key = RatingKey {
        user: user.id(),
        image: image.id(),
    };
    let rating = ImageRating::parse(key, form.rating.as_deref())
        .map_err(|err| GalleryError::invalid(err, location.clone()))?;

    match state.store.get_rating_for_user_image(key).await? {
        None => state.store.insert_rating(&rating).await?,
        Some(existing) if existing.rating() != rating.rating() => {
            state.store.update_rating(&rating).await?
        }
        Some(_) => debug!(image_id = image.id(), "Rating unchanged"),
    }

    Ok(Redirect::to(&location).into_response())
}

// =============================================================================
// Auth Handlers
// =============================================================================

/// Handle login form requests.
///
/// # Endpoint
///
/// `GET /auth/login`; signed-in users are sent to `/`.
pub async fn login_form_handler(session: Session) -> Response {
    if session.identity().await.is_some() {
        return found("/");
    }
    let ctx = page_context(&session).await;
    Html(views::auth_page(&ctx, AuthMode::Login)).into_response()
}

/// Handle login submissions.
///
/// # Endpoint
///
/// `POST /auth/login` with `username` and `password`
///
/// # Response
///
/// `303 See Other` to `/` with a fresh session cookie.
///
/// # Errors
///
/// - `302 Found` back to `/auth/login` on bad credentials
/// - `400 Bad Request`: Missing field
pub async fn login_handler<S: GalleryStore>(
    State(state): State<AppState<S>>,
    session: Session,
    form: Result<Form<LoginForm>, FormRejection>,
) -> Result<Response, GalleryError> {
    if session.identity().await.is_some() {
        return Ok(found("/"));
    }
    let form = form_or_default(form);

    let identity = state
        .auth
        .login(&form)
        .await
        .map_err(|err| err.into_gallery_error("/auth/login"))?;
    session.sign_in(identity).await;

    Ok(Redirect::to("/").into_response())
}

/// Handle signup form requests.
///
/// # Endpoint
///
/// `GET /auth/signup`; signed-in users are sent to `/`.
pub async fn signup_form_handler(session: Session) -> Response {
    if session.identity().await.is_some() {
        return found("/");
    }
    let ctx = page_context(&session).await;
    Html(views::auth_page(&ctx, AuthMode::Signup)).into_response()
}

/// Handle signup submissions.
///
/// # Endpoint
///
/// `POST /auth/signup` with `username`, `password` and `passwordConfirm`
///
/// # Response
///
/// `303 See Other` to `/`, signed in as the new account.
///
/// # Errors
///
/// - `400 Bad Request`: Missing field, mismatched passwords, or taken username
pub async fn signup_handler<S: GalleryStore>(
    State(state): State<AppState<S>>,
    session: Session,
    form: Result<Form<SignupForm>, FormRejection>,
) -> Result<Response, GalleryError> {
    if session.identity().await.is_some() {
        return Ok(found("/"));
    }
    let form = form_or_default(form);

    let identity = state
        .auth
        .signup(&form)
        .await
        .map_err(|err| err.into_gallery_error("/auth/signup"))?;
    session.sign_in(identity).await;

    Ok(Redirect::to("/").into_response())
}

/// Handle logout.
///
/// # Endpoint
///
/// `GET /auth/logout`
///
/// Always answers `302 Found` to `/`. A session that cannot be cleared is
/// logged, not reported.
pub async fn logout_handler(session: Session) -> Response {
    if let Some(identity) = session.identity().await {
        match session.sign_out().await {
            Ok(()) => debug!(user_id = identity.user_id, "User logged out"),
            Err(err) => warn!(error = %err, "Failed to clear session"),
        }
    }
    found("/")
}

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0"
/// }
/// ```
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
