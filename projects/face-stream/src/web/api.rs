use crate::cli::Args;
use crate::face_store::SavedFace;
use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

pub async fn get_faces(State(args): State<Arc<Args>>) -> Result<Json<Vec<SavedFace>>, StatusCode> {
    let store = args.face_store();
    // Directory scan and JPEG header reads are blocking
    let faces = tokio::task::spawn_blocking(move || store.list())
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .map_err(|e| {
            tracing::error!("Failed to list faces: {:#}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok(Json(faces))
}
