pub mod opencv_reader;

use anyhow::Result;
use opencv::core::Mat;

pub trait VideoReader: Send {
    fn frame_count(&self) -> Result<usize>;
    fn source_fps(&self) -> Result<f64>;
    /// Reads the next decoded frame, `None` once the stream is exhausted.
    fn next_frame(&mut self) -> Result<Option<Mat>>;
}
