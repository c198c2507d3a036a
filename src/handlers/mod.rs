/// HTTP handlers for the video ingestion and delivery core.
///
/// - `videos`: detail, processing status, byte-range streaming, deletion.
/// - `uploads`: multipart intake (`POST /videos`).
/// - `push`: the WebSocket upgrade endpoint for the Push Hub.
pub mod push;
pub mod uploads;
pub mod videos;

pub use push::push_connect;
pub use uploads::create_video;
pub use videos::{delete_video, get_video, processing_status, stream_video, stream_video_head};
