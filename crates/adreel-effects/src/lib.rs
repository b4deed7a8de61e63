//! AdReel Effects - Transition compositing
//!
//! Provides the closed transition vocabulary used between timeline clips
//! and CPU implementations of each transition over RGBA8 frames.

pub mod transition;
pub mod transitions;

pub use transition::{composite, Direction, Transition, TransitionKind, FADE_DURATION};
