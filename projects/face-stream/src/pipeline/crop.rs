use crate::pipeline::types::FaceBox;
use anyhow::Result;
use opencv::core::{self, Mat, Point, Scalar};
use opencv::imgproc::{rectangle_points, LINE_8};
use opencv::prelude::*;

/// Annotation colour for newly captured faces (BGR green)
const FACE_BOX_COLOR: (f64, f64, f64) = (0.0, 255.0, 0.0);
const FACE_BOX_THICKNESS: i32 = 2;

/// Draws the box outline from (x, y) to (x + w, y + h).
pub fn draw_face_box(img: &mut Mat, face: &FaceBox) -> Result<()> {
    let (b, g, r) = FACE_BOX_COLOR;
    rectangle_points(
        img,
        Point::new(face.x, face.y),
        Point::new(face.x + face.width, face.y + face.height),
        Scalar::new(b, g, r, 0.0),
        FACE_BOX_THICKNESS,
        LINE_8,
        0,
    )?;
    Ok(())
}

/// Copies the face region out of `img`, clamped to the image bounds.
///
/// Returns `None` when nothing of the box lies inside the image.
pub fn crop_face(img: &Mat, face: &FaceBox) -> Result<Option<Mat>> {
    let size = img.size()?;

    let x1 = face.x.clamp(0, size.width);
    let y1 = face.y.clamp(0, size.height);
    let x2 = face.x.saturating_add(face.width).clamp(0, size.width);
    let y2 = face.y.saturating_add(face.height).clamp(0, size.height);

    let w = x2 - x1;
    let h = y2 - y1;
    if w <= 0 || h <= 0 {
        return Ok(None);
    }

    let roi = core::Rect::new(x1, y1, w, h);
    let cropped = Mat::roi(img, roi)?;

    let mut out = Mat::default();
    cropped.copy_to(&mut out)?;

    Ok(Some(out))
}
