//! AdReel Timeline - Editing-session data model
//!
//! Implements the editable timeline of a generated ad:
//! - Clips with optional trim sub-ranges and edit provenance
//! - Editing sessions with a version token and save/export lifecycle
//! - Trim, split and merge commands with stale-write detection
//! - Versioned JSON persistence
//! - Resolution of a session into media intervals for rendering

pub mod clip;
pub mod config;
pub mod edit;
pub mod resolve;
pub mod serialization;
pub mod service;
pub mod session;
pub mod store;

pub use clip::{Clip, MediaSource};
pub use config::TimelineConfig;
pub use edit::{EditCommand, EditOutcome};
pub use resolve::{resolve_intervals, MediaInterval};
pub use serialization::SessionFile;
pub use service::SessionService;
pub use session::{EditingSession, SessionStatus};
pub use store::{JsonSessionStore, MemorySessionStore, SessionStore};
