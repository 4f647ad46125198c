use crate::pipeline::types::FaceBox;
use anyhow::{anyhow, Context, Result};
use opencv::core::{Mat, Rect, Size, Vector};
use opencv::objdetect::CascadeClassifier;
use opencv::prelude::*;
use opencv::imgproc;
use std::path::PathBuf;

/// Finds faces in a single-channel frame.
pub trait FaceDetector: Send {
    /// Boxes are returned in detector order, unsorted.
    fn detect(&mut self, gray: &Mat) -> Result<Vec<FaceBox>>;
}

const FRONTAL_FACE_CASCADE: &str = "haarcascade_frontalface_default.xml";

/// Locates the frontal face cascade when none is configured.
///
/// Asks OpenCV's sample search paths first (`OPENCV_SAMPLES_DATA_PATH` and the
/// installed `haarcascades/` data), then falls back to `models/`.
pub fn default_cascade_path() -> PathBuf {
    let relative = format!("haarcascades/{}", FRONTAL_FACE_CASCADE);
    match opencv::core::find_file(&relative, false, true) {
        Ok(found) if !found.is_empty() => PathBuf::from(found),
        Ok(_) => PathBuf::from("models").join(FRONTAL_FACE_CASCADE),
        Err(e) => {
            tracing::warn!("OpenCV could not search for {}: {}", relative, e);
            PathBuf::from("models").join(FRONTAL_FACE_CASCADE)
        }
    }
}

#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub cascade_path: PathBuf,
    pub scale_factor: f64,
    pub min_neighbors: i32,
    pub min_face_size: i32,
}

/// Frontal face detector backed by an OpenCV Haar cascade.
pub struct HaarFaceDetector {
    classifier: CascadeClassifier,
    scale_factor: f64,
    min_neighbors: i32,
    min_size: Size,
}

impl HaarFaceDetector {
    pub fn new(config: &DetectorConfig) -> Result<Self> {
        let path = &config.cascade_path;
        if !path.exists() {
            return Err(anyhow!("Face cascade NOT FOUND at: {:?}", path));
        }
        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow!("Face cascade path is invalid: {:?}", path))?;

        let classifier = CascadeClassifier::new(path_str)
            .with_context(|| format!("Failed to load face cascade: '{}'", path_str))?;
        if classifier.empty()? {
            return Err(anyhow!("Face cascade is empty: '{}'", path_str));
        }

        tracing::info!(
            "HaarFaceDetector: loaded {}, scale_factor={}, min_neighbors={}, min_size={}",
            path_str,
            config.scale_factor,
            config.min_neighbors,
            config.min_face_size
        );

        Ok(Self {
            classifier,
            scale_factor: config.scale_factor,
            min_neighbors: config.min_neighbors,
            min_size: Size::new(config.min_face_size, config.min_face_size),
        })
    }
}

impl FaceDetector for HaarFaceDetector {
    fn detect(&mut self, gray: &Mat) -> Result<Vec<FaceBox>> {
        let mut rects = Vector::<Rect>::new();
        self.classifier.detect_multi_scale(
            gray,
            &mut rects,
            self.scale_factor,
            self.min_neighbors,
            0,
            self.min_size,
            Size::default(),
        )?;

        Ok(rects.iter().map(FaceBox::from).collect())
    }
}

/// Convert a BGR frame to the grayscale image the detector runs on
pub fn to_grayscale(frame: &Mat) -> Result<Mat> {
    let mut gray = Mat::default();
    imgproc::cvt_color_def(frame, &mut gray, imgproc::COLOR_BGR2GRAY)
        .context("Failed to convert frame to grayscale")?;
    Ok(gray)
}
