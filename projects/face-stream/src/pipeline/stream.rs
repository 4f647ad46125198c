// Frame generator: decode, detect, dedup, persist crops, re-encode.
//
// One `FaceStream` covers one pass over one video. It is lazy (a frame is only
// decoded when the consumer asks for it) and one-shot.

use crate::face_store::FaceStore;
use crate::pipeline::crop::{crop_face, draw_face_box};
use crate::pipeline::detection::{to_grayscale, FaceDetector};
use crate::pipeline::types::{FaceBox, StreamStats};
use crate::video::opencv_reader::OpencvReader;
use crate::video::VideoReader;
use anyhow::{anyhow, Context, Result};
use opencv::core::{Mat, Vector};
use opencv::imgcodecs;
use std::collections::HashSet;
use std::path::Path;
use std::time::Instant;

pub const BOUNDARY: &str = "frame";
pub const MJPEG_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

/// Wraps one JPEG frame as a part of the `multipart/x-mixed-replace` body.
pub fn multipart_frame(jpeg: &[u8]) -> Vec<u8> {
    let header = format!("--{}\r\nContent-Type: image/jpeg\r\n\r\n", BOUNDARY);
    let mut part = Vec::with_capacity(header.len() + jpeg.len() + 2);
    part.extend_from_slice(header.as_bytes());
    part.extend_from_slice(jpeg);
    part.extend_from_slice(b"\r\n");
    part
}

pub fn encode_jpeg(frame: &Mat) -> Result<Vec<u8>> {
    let mut buf = Vector::<u8>::new();
    let encoded = imgcodecs::imencode(".jpg", frame, &mut buf, &Vector::new())
        .context("Failed to encode frame as JPEG")?;
    if !encoded {
        return Err(anyhow!("JPEG encoder rejected frame"));
    }
    Ok(buf.to_vec())
}

pub struct FaceStream {
    reader: Option<Box<dyn VideoReader>>,
    detector: Box<dyn FaceDetector>,
    store: FaceStore,
    /// Every key captured so far; never cleared while the video is processed.
    seen: HashSet<FaceBox>,
    frame_count: usize,
    stats: StreamStats,
    start_time: Instant,
}

impl FaceStream {
    /// A `None` reader produces an empty stream.
    pub fn new(
        reader: Option<Box<dyn VideoReader>>,
        detector: Box<dyn FaceDetector>,
        store: FaceStore,
    ) -> Self {
        let source_fps = reader
            .as_ref()
            .and_then(|r| r.source_fps().ok())
            .unwrap_or(0.0);
        Self {
            reader,
            detector,
            store,
            seen: HashSet::new(),
            frame_count: 0,
            stats: StreamStats {
                source_fps,
                ..StreamStats::default()
            },
            start_time: Instant::now(),
        }
    }

    /// Opens `video_path` with OpenCV. A video that cannot be opened yields
    /// no frames.
    pub fn open(video_path: &Path, detector: Box<dyn FaceDetector>, store: FaceStore) -> Self {
        let reader: Option<Box<dyn VideoReader>> = match OpencvReader::new(video_path) {
            Ok(reader) => Some(Box::new(reader)),
            Err(e) => {
                tracing::warn!("FaceStream: {:#}; streaming no frames", e);
                None
            }
        };
        Self::new(reader, detector, store)
    }

    pub fn stats(&self) -> StreamStats {
        StreamStats {
            duration: self.start_time.elapsed(),
            ..self.stats.clone()
        }
    }

    fn process_frame(&mut self, mut frame: Mat) -> Result<Vec<u8>> {
        let gray = to_grayscale(&frame)?;
        let faces = self.detector.detect(&gray)?;
        self.stats.raw_detections += faces.len();

        for (index, face) in faces.iter().enumerate() {
            if self.seen.contains(face) {
                continue;
            }

            // Drawn before cropping, so the saved crop carries the outline.
            draw_face_box(&mut frame, face)?;

            match crop_face(&frame, face)? {
                Some(crop) => {
                    let path = self.store.save(self.frame_count, index, &crop)?;
                    self.stats.saved_faces += 1;
                    tracing::debug!("Saved face {} to {:?}", face, path);
                }
                None => tracing::warn!(
                    "Face {} in frame {} lies outside the image, not saved",
                    face,
                    self.frame_count
                ),
            }

            self.seen.insert(*face);
        }

        self.frame_count += 1;
        self.stats.processed_frames = self.frame_count;

        encode_jpeg(&frame)
    }

    /// Releases the video. Idempotent.
    fn finish(&mut self) {
        let Some(reader) = self.reader.take() else {
            return;
        };
        let expected = reader.frame_count().unwrap_or(0);
        drop(reader);

        let stats = self.stats();
        let video_secs = if stats.source_fps > 0.0 {
            stats.processed_frames as f64 / stats.source_fps
        } else {
            0.0
        };
        tracing::info!(
            "FaceStream finished: {}/{} frames ({:.2}s of video at {:.2} fps), {} detections, {} faces saved ({} distinct) in {:.2}s",
            stats.processed_frames,
            expected,
            video_secs,
            stats.source_fps,
            stats.raw_detections,
            stats.saved_faces,
            self.seen.len(),
            stats.duration.as_secs_f64()
        );
    }
}

impl Iterator for FaceStream {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        let reader = self.reader.as_mut()?;

        let frame = match reader.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                self.finish();
                return None;
            }
            Err(e) => {
                self.finish();
                return Some(Err(e.context("Failed to read frame")));
            }
        };

        let result = self.process_frame(frame);
        if result.is_err() {
            self.finish();
        }
        Some(result)
    }
}

impl Drop for FaceStream {
    fn drop(&mut self) {
        self.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{Scalar, Vec3b, CV_8UC3};
    use opencv::imgcodecs::{imdecode, imread, IMREAD_COLOR};
    use opencv::prelude::*;
    use std::collections::VecDeque;
    use std::fs;

    struct MemoryReader {
        frames: VecDeque<Result<Mat>>,
    }

    impl MemoryReader {
        fn blank(count: usize) -> Self {
            let frames = (0..count)
                .map(|_| {
                    Ok(Mat::new_rows_cols_with_default(120, 160, CV_8UC3, Scalar::all(90.0))
                        .unwrap())
                })
                .collect();
            Self { frames }
        }
    }

    impl VideoReader for MemoryReader {
        fn frame_count(&self) -> Result<usize> {
            Ok(self.frames.len())
        }

        fn source_fps(&self) -> Result<f64> {
            Ok(25.0)
        }

        fn next_frame(&mut self) -> Result<Option<Mat>> {
            self.frames.pop_front().transpose()
        }
    }

    /// Returns a fixed list of boxes per frame, nothing once the script runs out.
    struct ScriptedDetector {
        script: VecDeque<Vec<FaceBox>>,
    }

    impl ScriptedDetector {
        fn new(script: Vec<Vec<FaceBox>>) -> Self {
            Self {
                script: script.into(),
            }
        }
    }

    impl FaceDetector for ScriptedDetector {
        fn detect(&mut self, gray: &Mat) -> Result<Vec<FaceBox>> {
            assert_eq!(gray.channels(), 1);
            Ok(self.script.pop_front().unwrap_or_default())
        }
    }

    fn saved_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    fn run(frames: usize, script: Vec<Vec<FaceBox>>) -> (Vec<Vec<u8>>, StreamStats, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = FaceStore::new(dir.path());
        let mut stream = FaceStream::new(
            Some(Box::new(MemoryReader::blank(frames))),
            Box::new(ScriptedDetector::new(script)),
            store,
        );
        let chunks: Vec<Vec<u8>> = stream.by_ref().map(|c| c.unwrap()).collect();
        let stats = stream.stats();
        (chunks, stats, dir)
    }

    #[test]
    fn test_no_faces_emits_every_frame_and_saves_nothing() {
        let (chunks, stats, dir) = run(4, vec![]);

        assert_eq!(chunks.len(), 4);
        for chunk in &chunks {
            assert_eq!(&chunk[..2], &[0xFF, 0xD8]);
        }
        assert_eq!(stats.processed_frames, 4);
        assert!(saved_names(dir.path()).is_empty());
    }

    #[test]
    fn test_static_face_saved_once() {
        let face = FaceBox::new(20, 30, 40, 40);
        let (chunks, stats, dir) = run(3, vec![vec![face], vec![face], vec![face]]);

        assert_eq!(chunks.len(), 3);
        assert_eq!(stats.raw_detections, 3);
        assert_eq!(saved_names(dir.path()), vec!["face_0_0.jpg"]);
    }

    #[test]
    fn test_one_pixel_move_is_a_new_face() {
        let (_, _, dir) = run(
            2,
            vec![
                vec![FaceBox::new(20, 30, 40, 40)],
                vec![FaceBox::new(21, 30, 40, 40)],
            ],
        );

        assert_eq!(saved_names(dir.path()), vec!["face_0_0.jpg", "face_1_0.jpg"]);
    }

    #[test]
    fn test_saved_count_matches_distinct_keys() {
        let a = FaceBox::new(5, 5, 30, 30);
        let b = FaceBox::new(60, 10, 30, 30);
        let c = FaceBox::new(100, 70, 20, 20);
        let (chunks, stats, dir) = run(3, vec![vec![a, b], vec![a], vec![b, c]]);

        assert_eq!(chunks.len(), 3);
        assert_eq!(stats.raw_detections, 5);
        assert_eq!(stats.saved_faces, 3);
        // Index is the position in the detector output, seen faces included
        assert_eq!(
            saved_names(dir.path()),
            vec!["face_0_0.jpg", "face_0_1.jpg", "face_2_1.jpg"]
        );
    }

    #[test]
    fn test_saved_crop_has_box_dimensions() {
        let (_, _, dir) = run(1, vec![vec![FaceBox::new(10, 10, 32, 24)]]);

        let dims = image::image_dimensions(dir.path().join("face_0_0.jpg")).unwrap();
        assert_eq!(dims, (32, 24));
    }

    /// Green clearly outweighs red and blue, allowing for JPEG chroma loss.
    fn is_green(px: &Vec3b) -> bool {
        let (b, g, r) = (px[0] as i32, px[1] as i32, px[2] as i32);
        g - b.max(r) > 60
    }

    #[test]
    fn test_outline_drawn_only_on_first_sighting() {
        let face = FaceBox::new(40, 30, 64, 48);
        let (chunks, _, dir) = run(2, vec![vec![face], vec![face]]);
        assert_eq!(chunks.len(), 2);

        // Middle of the top edge, away from the corners
        let (row, col) = (face.y, face.x + face.width / 2);

        let first = imdecode(&Vector::<u8>::from_slice(&chunks[0]), IMREAD_COLOR).unwrap();
        assert!(is_green(first.at_2d::<Vec3b>(row, col).unwrap()));

        let second = imdecode(&Vector::<u8>::from_slice(&chunks[1]), IMREAD_COLOR).unwrap();
        assert!(!is_green(second.at_2d::<Vec3b>(row, col).unwrap()));

        // The crop starts on the outline, so its top edge is green
        let crop_path = dir.path().join("face_0_0.jpg");
        let crop = imread(crop_path.to_str().unwrap(), IMREAD_COLOR).unwrap();
        assert_eq!((crop.cols(), crop.rows()), (64, 48));
        assert!(is_green(crop.at_2d::<Vec3b>(0, face.width / 2).unwrap()));
    }

    #[test]
    fn test_stats_carry_source_fps() {
        let (_, stats, dir) = run(2, vec![]);
        assert_eq!(stats.source_fps, 25.0);
        assert_eq!(stats.processed_frames, 2);

        let empty = FaceStream::new(
            None,
            Box::new(ScriptedDetector::new(vec![])),
            FaceStore::new(dir.path()),
        );
        assert_eq!(empty.stats().source_fps, 0.0);
    }

    #[test]
    fn test_unopened_video_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut stream = FaceStream::open(
            &dir.path().join("missing.mp4"),
            Box::new(ScriptedDetector::new(vec![])),
            FaceStore::new(dir.path().join("faces")),
        );
        assert!(stream.next().is_none());
    }

    #[test]
    fn test_read_error_ends_stream() {
        let dir = tempfile::tempdir().unwrap();
        let mut reader = MemoryReader::blank(1);
        reader.frames.push_back(Err(anyhow!("corrupt packet")));
        reader.frames.extend(MemoryReader::blank(2).frames);

        let mut stream = FaceStream::new(
            Some(Box::new(reader)),
            Box::new(ScriptedDetector::new(vec![])),
            FaceStore::new(dir.path()),
        );

        assert!(stream.next().unwrap().is_ok());
        assert!(stream.next().unwrap().is_err());
        assert!(stream.next().is_none());
        assert_eq!(stream.stats().processed_frames, 1);
    }

    #[test]
    fn test_multipart_frame_layout() {
        let part = multipart_frame(b"JPEG");
        assert_eq!(
            part,
            b"--frame\r\nContent-Type: image/jpeg\r\n\r\nJPEG\r\n".to_vec()
        );
    }
}
