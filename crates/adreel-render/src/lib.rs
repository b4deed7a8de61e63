//! AdReel Render - Stitch clips into the final advert
//!
//! Takes an ordered list of rendered clips and one transition per boundary,
//! builds a composited segment for every non-cut boundary, and concatenates
//! the result with a fade at each end. A failing transition degrades to a
//! crossfade, then to a cut; only an unreadable source clip fails the render.

pub mod compositor;
pub mod settings;
pub mod stitch;
pub mod validate;

pub use compositor::{EffectsCompositor, FrameCompositor};
pub use settings::RenderSettings;
pub use stitch::{BoundaryReport, RenderClip, RenderOutput, RenderRequest, Stitcher};
