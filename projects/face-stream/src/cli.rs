use crate::face_store::FaceStore;
use crate::pipeline::detection::{default_cascade_path, DetectorConfig};
use clap::Parser;
use std::net::IpAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: IpAddr,

    /// Port to bind to
    #[arg(long, default_value_t = 5000)]
    pub port: u16,

    /// Directory uploaded videos are written to
    #[arg(long, env = "FACE_STREAM_UPLOADS_DIR", default_value = "uploads")]
    pub uploads_dir: PathBuf,

    /// Directory cropped faces are written to
    #[arg(long, env = "FACE_STREAM_OUTPUT_DIR", default_value = "output_faces")]
    pub output_dir: PathBuf,

    /// Haar cascade used for frontal face detection [default: OpenCV's
    /// haarcascade_frontalface_default.xml, else models/]
    #[arg(long, env = "FACE_STREAM_CASCADE")]
    pub cascade: Option<PathBuf>,

    /// Image pyramid scale step of the cascade detector
    #[arg(long, default_value_t = 1.1)]
    pub scale_factor: f64,

    /// Neighbouring candidates a detection needs to be kept
    #[arg(long, default_value_t = 5)]
    pub min_neighbors: i32,

    /// Smallest face edge in pixels
    #[arg(long, default_value_t = 30)]
    pub min_face_size: i32,
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn detector_config(&self) -> DetectorConfig {
        DetectorConfig {
            cascade_path: self
                .cascade
                .clone()
                .unwrap_or_else(default_cascade_path),
            scale_factor: self.scale_factor,
            min_neighbors: self.min_neighbors,
            min_face_size: self.min_face_size,
        }
    }

    pub fn face_store(&self) -> FaceStore {
        FaceStore::new(self.output_dir.clone())
    }
}
