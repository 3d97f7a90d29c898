/// Thumbnail pipeline
///
/// This module handles:
/// - Decoding `.tbn` thumbnails off the GUI thread (decoder.rs)
/// - Keeping decoded thumbnails within a byte budget (cache.rs)
/// - Tracking decodes in flight so off-screen ones can be aborted (pending.rs)

pub mod cache;
pub mod decoder;
pub mod pending;
