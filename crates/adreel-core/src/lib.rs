//! AdReel Core - Foundation types for ad timeline editing and rendering
//!
//! This crate provides the fundamental types used throughout AdReel:
//! - Time representation (RationalTime, FrameRate, TimeRange)
//! - RGBA frame buffers
//! - The error taxonomy shared by every crate
//! - Cooperative cancellation

pub mod cancel;
pub mod error;
pub mod frame;
pub mod fs;
pub mod time;

pub use cancel::{CancelToken, CancellationSource};
pub use error::{AdReelError, Result};
pub use frame::FrameBuffer;
pub use time::{FrameRate, RationalTime, TimeRange};
