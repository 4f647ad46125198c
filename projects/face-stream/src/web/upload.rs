use crate::cli::Args;
use crate::pipeline::detection::{FaceDetector, HaarFaceDetector};
use crate::web::assets::render_upload_form;
use crate::web::mjpeg::mjpeg_response;
use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;

pub const NO_FILE_PART: &str = "No file part";
pub const NO_FILE_SELECTED: &str = "Please Select the video file🙏🏻";

pub async fn upload_form() -> Result<Response, StatusCode> {
    form_response(" ")
}

/// Saves the uploaded video and answers with its annotated motion-JPEG stream.
pub async fn upload_video(
    State(args): State<Arc<Args>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, StatusCode> {
    // A body that is not multipart carries no file part either
    let Ok(mut multipart) = multipart else {
        return form_response(NO_FILE_PART);
    };

    while let Some(mut field) = multipart.next_field().await.map_err(|e| {
        tracing::warn!("Malformed upload: {}", e);
        StatusCode::BAD_REQUEST
    })? {
        // Plain form values are not file parts
        if field.name() != Some("file") {
            continue;
        }
        let Some(raw_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let Some(file_name) = upload_file_name(&raw_name) else {
            return form_response(NO_FILE_SELECTED);
        };

        fs::create_dir_all(&args.uploads_dir)
            .await
            .map_err(|e| internal_error("create uploads directory", e))?;
        let video_path = args.uploads_dir.join(file_name);

        let mut file = fs::File::create(&video_path)
            .await
            .map_err(|e| internal_error("create upload file", e))?;
        let mut written = 0usize;
        while let Some(chunk) = field.chunk().await.map_err(|e| {
            tracing::warn!("Upload interrupted: {}", e);
            StatusCode::BAD_REQUEST
        })? {
            file.write_all(&chunk)
                .await
                .map_err(|e| internal_error("write upload", e))?;
            written += chunk.len();
        }
        file.flush()
            .await
            .map_err(|e| internal_error("flush upload", e))?;
        tracing::info!("Saved upload {:?} ({} bytes)", video_path, written);

        let store = args.face_store();
        store
            .ensure_dir()
            .map_err(|e| internal_error("prepare output directory", e))?;

        let detector: Box<dyn FaceDetector> = Box::new(
            HaarFaceDetector::new(&args.detector_config())
                .map_err(|e| internal_error("load face detector", e))?,
        );

        return Ok(mjpeg_response(video_path, detector, store));
    }

    form_response(NO_FILE_PART)
}

/// Final path component of a client-supplied filename, `None` when empty.
fn upload_file_name(raw: &str) -> Option<&str> {
    let name = raw.rsplit(|c: char| c == '/' || c == '\\').next()?.trim();
    match name {
        "" | "." | ".." => None,
        _ => Some(name),
    }
}

fn form_response(message: &str) -> Result<Response, StatusCode> {
    render_upload_form(message).map(IntoResponse::into_response)
}

fn internal_error(action: &str, e: impl std::fmt::Display) -> StatusCode {
    tracing::error!("Failed to {}: {}", action, e);
    StatusCode::INTERNAL_SERVER_ERROR
}
