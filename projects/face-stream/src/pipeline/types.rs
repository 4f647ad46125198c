use opencv::core::Rect;
use std::fmt;
use std::time::Duration;

/// Pixel-space bounding box of a detected face.
///
/// Also serves as the dedup key for a video: two detections are the same face
/// only if all four coordinates match exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FaceBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl FaceBox {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

impl From<Rect> for FaceBox {
    fn from(rect: Rect) -> Self {
        Self::new(rect.x, rect.y, rect.width, rect.height)
    }
}

impl fmt::Display for FaceBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}_{}", self.x, self.y, self.width, self.height)
    }
}

/// Counters for one pass over a video
#[derive(Debug, Clone, Default)]
pub struct StreamStats {
    /// Frame rate reported by the video, 0.0 when there is no video
    pub source_fps: f64,
    pub processed_frames: usize,
    pub raw_detections: usize,
    pub saved_faces: usize,
    pub duration: Duration,
}
