use axum::{
    body::Body,
    http::{header, HeaderValue, Response, StatusCode},
    response::{Html, IntoResponse},
};
use rust_embed::RustEmbed;

#[derive(RustEmbed)]
#[folder = "assets/"]
pub struct Assets;

const FORM_TEMPLATE: &str = "upload.html";
const MESSAGE_SLOT: &str = "{{ message }}";

pub async fn static_handler(path: axum::extract::Path<String>) -> impl IntoResponse {
    let path = path.trim_start_matches('/');

    match serve_asset(path) {
        Ok(response) => response.into_response(),
        Err(status) => (status, "404 Not Found").into_response(),
    }
}

/// Upload form page with `message` shown above the file picker.
pub fn render_upload_form(message: &str) -> Result<Html<String>, StatusCode> {
    let asset = Assets::get(FORM_TEMPLATE).ok_or_else(|| {
        tracing::error!("Embedded asset {} is missing", FORM_TEMPLATE);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    let template = String::from_utf8_lossy(&asset.data);

    Ok(Html(template.replace(MESSAGE_SLOT, &html_escape(message))))
}

fn serve_asset(path: &str) -> Result<Response<Body>, StatusCode> {
    if let Some(asset) = Assets::get(path) {
        let mime = mime_guess::from_path(path).first_or_octet_stream();

        Response::builder()
            .header(
                header::CONTENT_TYPE,
                HeaderValue::from_str(mime.as_ref())
                    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?,
            )
            .body(Body::from(asset.data.into_owned()))
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
