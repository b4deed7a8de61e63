//! AdReel Media - FFmpeg integration for clip I/O
//!
//! This crate handles:
//! - Media file probing
//! - Decoding time windows to RGBA frames
//! - Encoding RGBA frames and concatenating pieces into the final video
//! - An in-memory backend for tests and dry runs

pub mod backend;
pub mod decoder;
pub mod export;
pub mod memory;
pub mod probe;

pub use backend::{FfmpegBackend, MediaBackend};
pub use decoder::DecodeWindow;
pub use export::{ConcatPiece, ConcatRequest, EncodeJob, EncodeSettings};
pub use memory::{MemoryBackend, MemoryClip};
pub use probe::MediaInfo;
