//! HTML pages for the gallery.
//!
//! Pages are plain `format!` templates sharing one layout. Every value that
//! came from a user (usernames, descriptions, comments, flash text) goes
//! through [`html_escape`].

use crate::storage::names::MAX_EXTENSION_LEN;
use crate::store::{Image, MAX_RATING, MIN_RATING};

use super::session::SessionIdentity;

/// Escape HTML special characters to prevent XSS attacks.
pub fn html_escape(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#x27;"),
            _ => result.push(c),
        }
    }
    result
}

/// Data every page needs: who is looking and the message to show once.
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    pub user: Option<SessionIdentity>,
    pub error: Option<String>,
}

impl PageContext {
    pub fn new(user: Option<SessionIdentity>, error: Option<String>) -> Self {
        Self { user, error }
    }

    fn is_admin(&self) -> bool {
        self.user.as_ref().is_some_and(|user| user.admin)
    }
}

/// A comment with its author's name resolved.
#[derive(Debug, Clone)]
pub struct CommentView {
    pub author: String,
    pub text: String,
}

/// Which form the shared login template shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Login,
    Signup,
}

impl AuthMode {
    fn title(self) -> &'static str {
        match self {
            AuthMode::Login => "Log in",
            AuthMode::Signup => "Sign up",
        }
    }

    fn action(self) -> &'static str {
        match self {
            AuthMode::Login => "/auth/login",
            AuthMode::Signup => "/auth/signup",
        }
    }
}

fn format_rating(rating: Option<f64>) -> String {
    match rating {
        Some(rating) => format!("{:.1} / {}", rating, MAX_RATING),
        None => "No ratings yet".to_string(),
    }
}

fn image_src(image: &Image) -> String {
    format!("/public/images/{}", html_escape(image.name()))
}

// =============================================================================
// Layout
// =============================================================================

fn layout(title: &str, ctx: &PageContext, body: &str) -> String {
    let nav_user = match &ctx.user {
        Some(user) => format!(
            r#"<a href="/upload">Upload</a>
            <span class="who">Signed in as {}{}</span>
            <a href="/auth/logout">Log out</a>"#,
            html_escape(&user.username),
            if user.admin { " (admin)" } else { "" }
        ),
        None => r#"<a href="/auth/login">Log in</a>
            <a href="/auth/signup">Sign up</a>"#
            .to_string(),
    };

    let error = ctx
        .error
        .as_deref()
        .map(|message| format!(r#"<div class="error">{}</div>"#, html_escape(message)))
        .unwrap_or_default();

    format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title} - Image Gallery</title>
    <style>
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            margin: 0 auto;
            max-width: 960px;
            padding: 16px;
        }}
        nav {{
            display: flex;
            gap: 12px;
            align-items: center;
            border-bottom: 1px solid #ddd;
            padding-bottom: 8px;
            margin-bottom: 16px;
        }}
        nav .who {{
            margin-left: auto;
            color: #555;
        }}
        .error {{
            background: #fde8e8;
            color: #9b1c1c;
            padding: 8px 12px;
            border-radius: 4px;
            margin-bottom: 16px;
        }}
        .grid {{
            display: grid;
            grid-template-columns: repeat(auto-fill, minmax(200px, 1fr));
            gap: 16px;
        }}
        .grid img, .image img {{
            max-width: 100%;
        }}
        .meta {{
            color: #555;
            font-size: 13px;
        }}
    </style>
</head>
<body>
    <nav>
        <a href="/">Gallery</a>
        {nav_user}
    </nav>
    {error}
    <h1>{title}</h1>
    {body}
</body>
</html>"##,
        title = html_escape(title),
        nav_user = nav_user,
        error = error,
        body = body,
    )
}

// =============================================================================
// Pages
// =============================================================================

/// `GET /`: every image with its average rating.
pub fn gallery_page(ctx: &PageContext, images: &[(Image, Option<f64>)]) -> String {
    let body = if images.is_empty() {
        r#"<p class="empty">No images yet.</p>"#.to_string()
    } else {
        let cards: String = images
            .iter()
            .map(|(image, rating)| {
                format!(
                    r#"<figure>
            <a href="/{id}"><img src="{src}" alt="{alt}"></a>
            <figcaption>{alt}<br><span class="meta">{views} views, {rating}</span></figcaption>
        </figure>
        "#,
                    id = image.id(),
                    src = image_src(image),
                    alt = html_escape(image.alt()),
                    views = image.views(),
                    rating = format_rating(*rating),
                )
            })
            .collect();
        format!(r#"<div class="grid">{}</div>"#, cards)
    };

    layout("Gallery", ctx, &body)
}

/// `GET /upload`: multipart form with `image` and `description`.
pub fn upload_page(ctx: &PageContext) -> String {
    let body = format!(
        r#"<form method="post" action="/upload" enctype="multipart/form-data">
        <p><label>Image <input type="file" name="image" accept="image/*" required></label></p>
        <p class="hint">The file name needs an extension of at most {MAX_EXTENSION_LEN} letters or digits, such as .png, .jpeg or .webp.</p>
        <p><label>Description <input type="text" name="description" maxlength="50" required></label></p>
        <p><button type="submit">Upload</button></p>
    </form>"#
    );

    layout("Upload", ctx, &body)
}

/// `GET /{image}`: the image, its comments, and rating forms.
pub fn image_page(
    ctx: &PageContext,
    image: &Image,
    comments: &[CommentView],
    rating: Option<f64>,
) -> String {
    let id = image.id();

    let admin_forms = if ctx.is_admin() {
        format!(
            r#"<section class="admin">
        <form method="post" action="/{id}">
            <label>Description <input type="text" name="description" maxlength="50" value="{alt}"></label>
            <button type="submit">Save</button>
        </form>
        <form method="post" action="/{id}/remove">
            <button type="submit">Remove image</button>
        </form>
    </section>"#,
            id = id,
            alt = html_escape(image.alt()),
        )
    } else {
        String::new()
    };

    let comment_list = if comments.is_empty() {
        "<p class=\"meta\">No comments yet.</p>".to_string()
    } else {
        let items: String = comments
            .iter()
            .map(|comment| {
                format!(
                    "<li><strong>{}</strong>: {}</li>",
                    html_escape(&comment.author),
                    html_escape(&comment.text)
                )
            })
            .collect();
        format!("<ul class=\"comments\">{}</ul>", items)
    };

    let user_forms = if ctx.user.is_some() {
        let options: String = (MIN_RATING..=MAX_RATING)
            .map(|value| format!(r#"<option value="{0}">{0}</option>"#, value))
            .collect();
        format!(
            r#"<form method="post" action="/{id}/ratings">
            <label>Rate <select name="rating">{options}</select></label>
            <button type="submit">Rate</button>
        </form>
        <form method="post" action="/{id}/comments">
            <textarea name="comment" maxlength="255" required></textarea>
            <button type="submit">Comment</button>
        </form>"#,
            id = id,
            options = options,
        )
    } else {
        r#"<p class="meta"><a href="/auth/login">Log in</a> to comment or rate.</p>"#.to_string()
    };

    let body = format!(
        r#"<div class="image">
        <img src="{src}" alt="{alt}">
        <p>{alt}</p>
        <p class="meta">{views} views, rating {rating}</p>
    </div>
    {admin_forms}
    <h2>Comments</h2>
    {comment_list}
    {user_forms}"#,
        src = image_src(image),
        alt = html_escape(image.alt()),
        views = image.views(),
        rating = format_rating(rating),
        admin_forms = admin_forms,
        comment_list = comment_list,
        user_forms = user_forms,
    );

    layout("Image", ctx, &body)
}

/// The image page with no image; the context carries "No Image Found".
pub fn not_found_page(ctx: &PageContext) -> String {
    layout(
        "Image",
        ctx,
        r#"<p><a href="/">Back to the gallery</a></p>"#,
    )
}

/// `GET /auth/login` and `GET /auth/signup`.
pub fn auth_page(ctx: &PageContext, mode: AuthMode) -> String {
    let confirm = match mode {
        AuthMode::Signup => {
            r#"<p><label>Confirm password <input type="password" name="passwordConfirm" required></label></p>"#
        }
        AuthMode::Login => "",
    };
    let switch = match mode {
        AuthMode::Login => r#"No account? <a href="/auth/signup">Sign up</a>"#,
        AuthMode::Signup => r#"Have an account? <a href="/auth/login">Log in</a>"#,
    };

    let body = format!(
        r#"<form method="post" action="{action}">
        <p><label>Username <input type="text" name="username" maxlength="20" required></label></p>
        <p><label>Password <input type="password" name="password" required></label></p>
        {confirm}
        <p><button type="submit">{title}</button></p>
    </form>
    <p class="meta">{switch}</p>"#,
        action = mode.action(),
        confirm = confirm,
        title = mode.title(),
        switch = switch,
    );

    layout(mode.title(), ctx, &body)
}

/// Body for responses that carry a `Location` with a non-3xx status.
pub fn redirect_page(location: &str) -> String {
    let location = html_escape(location);
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta http-equiv="refresh" content="0; url={location}">
    <title>Redirecting</title>
</head>
<body>
    <p>Redirecting to <a href="{location}">{location}</a></p>
</body>
</html>"#,
        location = location,
    )
}
