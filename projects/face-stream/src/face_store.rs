use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use opencv::core::{Mat, Vector};
use opencv::imgcodecs;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A face crop persisted in the output directory
#[derive(Serialize, Debug, Clone)]
pub struct SavedFace {
    pub name: String,
    pub frame: usize,
    pub index: usize,
    pub width: u32,
    pub height: u32,
    pub size_bytes: u64,
    pub modified: Option<DateTime<Utc>>,
}

/// Shared output directory for face crops, named `face_{frame}_{index}.jpg`.
#[derive(Debug, Clone)]
pub struct FaceStore {
    dir: PathBuf,
}

impl FaceStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create output directory {:?}", self.dir))
    }

    pub fn face_path(&self, frame: usize, index: usize) -> PathBuf {
        self.dir.join(face_file_name(frame, index))
    }

    pub fn save(&self, frame: usize, index: usize, image: &Mat) -> Result<PathBuf> {
        let path = self.face_path(frame, index);
        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow!("Face path is not valid UTF-8: {:?}", path))?;

        let written = imgcodecs::imwrite(path_str, image, &Vector::new())
            .with_context(|| format!("Failed to encode face crop {}", path_str))?;
        if !written {
            return Err(anyhow!("Failed to write face crop {}", path_str));
        }

        Ok(path)
    }

    /// Lists the saved faces ordered by frame, then detection index.
    pub fn list(&self) -> Result<Vec<SavedFace>> {
        let mut faces = Vec::new();

        if !self.dir.exists() {
            return Ok(faces);
        }

        for entry in WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let name = entry.file_name().to_string_lossy().to_string();
            let Some((frame, index)) = parse_face_file_name(&name) else {
                continue;
            };

            // Files can vanish or be half-written while a video is processed
            match describe_face(entry.path(), name, frame, index) {
                Ok(face) => faces.push(face),
                Err(e) => tracing::warn!("Skipping face image: {:#}", e),
            }
        }

        faces.sort_by_key(|f| (f.frame, f.index));
        Ok(faces)
    }
}

fn describe_face(path: &Path, name: String, frame: usize, index: usize) -> Result<SavedFace> {
    let (width, height) = image::image_dimensions(path)
        .with_context(|| format!("Unreadable face image {}", name))?;
    let metadata =
        fs::metadata(path).with_context(|| format!("No metadata for face image {}", name))?;

    Ok(SavedFace {
        name,
        frame,
        index,
        width,
        height,
        size_bytes: metadata.len(),
        modified: metadata.modified().ok().map(DateTime::<Utc>::from),
    })
}

pub fn face_file_name(frame: usize, index: usize) -> String {
    format!("face_{}_{}.jpg", frame, index)
}

/// Inverse of [`face_file_name`].
pub fn parse_face_file_name(name: &str) -> Option<(usize, usize)> {
    let stem = name.strip_prefix("face_")?.strip_suffix(".jpg")?;
    let (frame, index) = stem.split_once('_')?;
    Some((frame.parse().ok()?, index.parse().ok()?))
}
