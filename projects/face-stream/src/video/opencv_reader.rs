use super::VideoReader;
use anyhow::{anyhow, Context, Result};
use opencv::{
    prelude::*,
    videoio::{VideoCapture, CAP_ANY, CAP_PROP_FPS, CAP_PROP_FRAME_COUNT},
};
use std::path::Path;

pub struct OpencvReader {
    capture: VideoCapture,
    source_fps: f64,
    total_frames: usize,
}

impl OpencvReader {
    pub fn new(path: &Path) -> Result<Self> {
        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow!("Video path is not valid UTF-8: {:?}", path))?;

        let capture = VideoCapture::from_file(path_str, CAP_ANY)
            .with_context(|| format!("Failed to open video at: '{}'", path_str))?;
        if !capture.is_opened()? {
            return Err(anyhow!("Failed to open video file: {}", path_str));
        }

        let mut fps = capture.get(CAP_PROP_FPS)?;
        if fps <= 0.0 {
            tracing::warn!("OpencvReader: Failed to get FPS from metadata, falling back to 30.0");
            fps = 30.0;
        }
        // Container metadata; some formats report 0 or a negative count.
        let raw_count = capture.get(CAP_PROP_FRAME_COUNT)?.max(0.0) as usize;

        tracing::info!(
            "OpencvReader: opened {}, duration={:.2}s, fps={:.2}, stream_frames={}",
            path_str,
            raw_count as f64 / fps,
            fps,
            raw_count
        );

        Ok(Self {
            capture,
            source_fps: fps,
            total_frames: raw_count,
        })
    }
}

impl VideoReader for OpencvReader {
    fn frame_count(&self) -> Result<usize> {
        Ok(self.total_frames)
    }

    fn source_fps(&self) -> Result<f64> {
        Ok(self.source_fps)
    }

    fn next_frame(&mut self) -> Result<Option<Mat>> {
        let mut frame = Mat::default();
        let success = self.capture.read(&mut frame)?;
        if !success || frame.empty() {
            return Ok(None);
        }

        Ok(Some(frame))
    }
}

impl Drop for OpencvReader {
    fn drop(&mut self) {
        if let Err(e) = self.capture.release() {
            tracing::warn!("OpencvReader: failed to release capture: {}", e);
        }
    }
}
