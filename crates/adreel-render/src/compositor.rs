//! Frame compositor seam used by the stitcher.

use adreel_core::{FrameBuffer, Result};
use adreel_effects::TransitionKind;

/// Produces one frame of a transition segment.
pub trait FrameCompositor: Send + Sync {
    fn composite(
        &self,
        kind: TransitionKind,
        a: &FrameBuffer,
        b: &FrameBuffer,
        progress: f32,
        frame_index: u32,
    ) -> Result<FrameBuffer>;
}

/// CPU compositor backed by the built-in transitions.
#[derive(Debug, Default, Clone, Copy)]
pub struct EffectsCompositor;

impl FrameCompositor for EffectsCompositor {
    fn composite(
        &self,
        kind: TransitionKind,
        a: &FrameBuffer,
        b: &FrameBuffer,
        progress: f32,
        frame_index: u32,
    ) -> Result<FrameBuffer> {
        adreel_effects::composite(kind, a, b, progress, frame_index)
    }
}
