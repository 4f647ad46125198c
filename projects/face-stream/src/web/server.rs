use crate::cli::Args;
use crate::web::api::get_faces;
use crate::web::assets::static_handler;
use crate::web::upload::{upload_form, upload_video};
use anyhow::Result;
use axum::{extract::DefaultBodyLimit, routing::get, Router};
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub fn build_router(args: Arc<Args>) -> Router {
    Router::new()
        .route("/", get(upload_form).post(upload_video))
        .route("/api/faces", get(get_faces))
        .route("/static/*path", get(static_handler))
        // Uploads are whole videos; no size limit
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
        .with_state(args)
}

pub async fn run_server(args: Args) -> Result<()> {
    let mut current_port = args.port;
    let listener = loop {
        let addr = SocketAddr::new(args.host, current_port);
        match TcpListener::bind(addr) {
            Ok(listener) => {
                // Must be non-blocking before registering with Tokio
                listener.set_nonblocking(true)?;
                info!("Successfully bound to {}", addr);
                break listener;
            }
            Err(e) => {
                warn!("Failed to bind to {}: {}. Trying next port...", addr, e);
                current_port = current_port
                    .checked_add(1)
                    .ok_or_else(|| anyhow::anyhow!("No available ports found"))?;
            }
        }
    };

    info!(
        "Uploads in {:?}, faces in {:?}, cascade {:?}",
        args.uploads_dir,
        args.output_dir,
        args.detector_config().cascade_path
    );

    let app = build_router(Arc::new(args));

    let tokio_listener = tokio::net::TcpListener::from_std(listener)?;
    info!(
        "Face stream server started on http://{:?}",
        tokio_listener.local_addr()?
    );

    axum::serve(tokio_listener, app).await?;

    Ok(())
}
