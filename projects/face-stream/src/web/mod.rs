pub mod api;
pub mod assets;
pub mod mjpeg;
pub mod server;
pub mod upload;
