use crate::face_store::FaceStore;
use crate::pipeline::detection::FaceDetector;
use crate::pipeline::stream::{multipart_frame, FaceStream, MJPEG_CONTENT_TYPE};
use anyhow::Result;
use axum::{
    body::{Body, Bytes},
    http::{header, Response},
};
use futures::Stream;
use std::path::PathBuf;
use tokio::sync::mpsc;

/// Streams the annotated frames of `video_path` as a motion-JPEG response.
///
/// The generator runs on a blocking thread and hands over one frame at a
/// time, so it only advances as fast as the client reads.
pub fn mjpeg_response(
    video_path: PathBuf,
    detector: Box<dyn FaceDetector>,
    store: FaceStore,
) -> Response<Body> {
    let (tx, rx) = mpsc::channel::<Result<Vec<u8>>>(1);

    tokio::task::spawn_blocking(move || {
        let stream = FaceStream::open(&video_path, detector, store);
        for item in stream {
            let failed = item.is_err();
            if let Err(e) = &item {
                tracing::error!("Frame stream for {:?} failed: {:#}", video_path, e);
            }
            if tx.blocking_send(item).is_err() {
                tracing::info!("Client disconnected from {:?}", video_path);
                break;
            }
            if failed {
                break;
            }
        }
    });

    let mut response = Response::new(Body::from_stream(multipart_body(rx)));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static(MJPEG_CONTENT_TYPE),
    );
    response
}

/// An `Err` item ends the response mid-stream.
fn multipart_body(mut rx: mpsc::Receiver<Result<Vec<u8>>>) -> impl Stream<Item = Result<Bytes>> {
    async_stream::stream! {
        while let Some(item) = rx.recv().await {
            yield item.map(|jpeg| Bytes::from(multipart_frame(&jpeg)));
        }
    }
}
