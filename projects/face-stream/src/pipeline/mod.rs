// Per-frame face detection pipeline

pub mod crop;
pub mod detection;
pub mod stream;
pub mod types;
