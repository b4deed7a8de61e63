//! Transition vocabulary and compositing dispatch.

use adreel_core::{AdReelError, FrameBuffer, RationalTime, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

use crate::transitions::{Crossfade, Flash, Glitch, WhipPan, Wipe, ZoomBlur};

/// Length of the fade-in at the start and the fade-out at the end of the
/// rendered output.
pub const FADE_DURATION: RationalTime = RationalTime::from_reduced(3, 10);

/// A per-pixel transition between two frames.
pub trait Transition: Send + Sync {
    /// Get the transition name.
    fn name(&self) -> &str;

    /// Render the transition between frame A and frame B.
    /// Progress goes from 0.0 (pure A) to 1.0 (pure B).
    /// Input frames are RGBA u8.
    fn render(&self, a: &[u8], b: &[u8], w: u32, h: u32, progress: f32) -> Vec<u8>;
}

/// Direction of a directional transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    #[default]
    Left,
    Right,
    Up,
    Down,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Up => "up",
            Self::Down => "down",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            _ => None,
        }
    }
}

/// Transition applied at one clip boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum TransitionKind {
    /// Plain concatenation
    Cut,
    /// Linear opacity blend
    #[default]
    Crossfade,
    /// Moving boundary line reveals B
    Wipe(Direction),
    /// A fades to white, B fades in from white
    Flash,
    /// A scales up fading out, B scales down fading in
    ZoomBlur,
    /// Both frames slide with motion blur
    WhipPan(Direction),
    /// Jittering bands while cross-fading
    Glitch,
}

impl TransitionKind {
    /// Every transition, in a stable order.
    pub const ALL: [Self; 13] = [
        Self::Cut,
        Self::Crossfade,
        Self::Wipe(Direction::Left),
        Self::Wipe(Direction::Right),
        Self::Wipe(Direction::Up),
        Self::Wipe(Direction::Down),
        Self::Flash,
        Self::ZoomBlur,
        Self::WhipPan(Direction::Left),
        Self::WhipPan(Direction::Right),
        Self::WhipPan(Direction::Up),
        Self::WhipPan(Direction::Down),
        Self::Glitch,
    ];

    /// Look up a transition by name.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        match name.as_str() {
            "cut" => Some(Self::Cut),
            "crossfade" => Some(Self::Crossfade),
            "flash" => Some(Self::Flash),
            "zoom_blur" => Some(Self::ZoomBlur),
            "glitch" => Some(Self::Glitch),
            _ => {
                if let Some(dir) = name.strip_prefix("wipe_") {
                    Direction::parse(dir).map(Self::Wipe)
                } else if let Some(dir) = name.strip_prefix("whip_pan_") {
                    Direction::parse(dir).map(Self::WhipPan)
                } else {
                    None
                }
            }
        }
    }

    /// Look up a transition by name; unknown names become a crossfade.
    pub fn parse(name: &str) -> Self {
        Self::from_name(name).unwrap_or_else(|| {
            warn!(name, "Unknown transition type, using crossfade");
            Self::Crossfade
        })
    }

    pub fn name(self) -> String {
        match self {
            Self::Cut => "cut".into(),
            Self::Crossfade => "crossfade".into(),
            Self::Wipe(d) => format!("wipe_{}", d.as_str()),
            Self::Flash => "flash".into(),
            Self::ZoomBlur => "zoom_blur".into(),
            Self::WhipPan(d) => format!("whip_pan_{}", d.as_str()),
            Self::Glitch => "glitch".into(),
        }
    }

    /// Time consumed from each side of the boundary.
    pub fn overlap(self) -> RationalTime {
        match self {
            Self::Cut => RationalTime::ZERO,
            Self::Crossfade | Self::Wipe(_) => RationalTime::new(1, 2),
            Self::Flash => RationalTime::new(1, 10),
            Self::ZoomBlur => RationalTime::new(3, 10),
            Self::WhipPan(_) => RationalTime::new(1, 5),
            Self::Glitch => RationalTime::new(3, 20),
        }
    }

    /// Whether this transition builds a composited segment.
    pub fn is_cut(self) -> bool {
        matches!(self, Self::Cut)
    }
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl From<String> for TransitionKind {
    fn from(name: String) -> Self {
        Self::parse(&name)
    }
}

impl From<TransitionKind> for String {
    fn from(kind: TransitionKind) -> Self {
        kind.name()
    }
}

/// Composite one frame of a transition.
///
/// `frame_index` is the frame's position inside the transition segment and
/// drives the time-varying jitter of `glitch`.
pub fn composite(
    kind: TransitionKind,
    a: &FrameBuffer,
    b: &FrameBuffer,
    progress: f32,
    frame_index: u32,
) -> Result<FrameBuffer> {
    a.validate()?;
    b.validate()?;
    if !a.same_size(b) {
        return Err(AdReelError::Effect(format!(
            "{kind}: frame sizes differ ({}x{} vs {}x{})",
            a.width, a.height, b.width, b.height
        )));
    }
    if !progress.is_finite() {
        return Err(AdReelError::Effect(format!("{kind}: progress is not finite")));
    }

    let (w, h) = (a.width, a.height);
    let data = match kind {
        TransitionKind::Cut => {
            if progress < 0.5 {
                a.data.clone()
            } else {
                b.data.clone()
            }
        }
        TransitionKind::Crossfade => Crossfade.render(&a.data, &b.data, w, h, progress),
        TransitionKind::Wipe(direction) => Wipe { direction }.render(&a.data, &b.data, w, h, progress),
        TransitionKind::Flash => Flash.render(&a.data, &b.data, w, h, progress),
        TransitionKind::ZoomBlur => ZoomBlur::default().render(&a.data, &b.data, w, h, progress),
        TransitionKind::WhipPan(direction) => {
            WhipPan { direction }.render(&a.data, &b.data, w, h, progress)
        }
        TransitionKind::Glitch => Glitch { frame_index }.render(&a.data, &b.data, w, h, progress),
    };
    FrameBuffer::from_rgba(w, h, data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_roundtrip() {
        for kind in TransitionKind::ALL {
            assert_eq!(TransitionKind::from_name(&kind.name()), Some(kind));
        }
    }

    #[test]
    fn test_unknown_defaults_to_crossfade() {
        assert_eq!(TransitionKind::parse("nonexistent_type"), TransitionKind::Crossfade);
        assert_eq!(TransitionKind::parse("wipe_diagonal"), TransitionKind::Crossfade);
        assert_eq!(TransitionKind::parse(" Flash "), TransitionKind::Flash);
    }

    #[test]
    fn test_overlaps() {
        assert_eq!(TransitionKind::Cut.overlap(), RationalTime::ZERO);
        assert_eq!(TransitionKind::Crossfade.overlap().to_seconds_f64(), 0.5);
        assert_eq!(TransitionKind::Wipe(Direction::Up).overlap().to_seconds_f64(), 0.5);
        assert_eq!(TransitionKind::Flash.overlap().to_seconds_f64(), 0.1);
        assert_eq!(TransitionKind::ZoomBlur.overlap().to_seconds_f64(), 0.3);
        assert_eq!(TransitionKind::WhipPan(Direction::Down).overlap().to_seconds_f64(), 0.2);
        assert_eq!(TransitionKind::Glitch.overlap().to_seconds_f64(), 0.15);
        assert_eq!(FADE_DURATION.to_seconds_f64(), 0.3);
    }

    #[test]
    fn test_serde_as_name() {
        let json = serde_json::to_string(&TransitionKind::WhipPan(Direction::Left)).unwrap();
        assert_eq!(json, "\"whip_pan_left\"");
        let kinds: Vec<TransitionKind> = serde_json::from_str(r#"["cut", "bogus"]"#).unwrap();
        assert_eq!(kinds, vec![TransitionKind::Cut, TransitionKind::Crossfade]);
    }

    #[test]
    fn test_composite_every_kind_keeps_size() {
        let a = FrameBuffer::solid(32, 18, [255, 0, 0, 255]);
        let b = FrameBuffer::solid(32, 18, [0, 0, 255, 255]);
        for kind in TransitionKind::ALL {
            for (i, p) in [0.0, 0.25, 0.5, 0.75, 1.0].into_iter().enumerate() {
                let out = composite(kind, &a, &b, p, i as u32).unwrap();
                assert_eq!((out.width, out.height), (32, 18), "{kind}");
            }
        }
    }

    #[test]
    fn test_endpoints_are_pure() {
        let a = FrameBuffer::solid(16, 16, [200, 10, 10, 255]);
        let b = FrameBuffer::solid(16, 16, [10, 10, 200, 255]);
        for kind in [TransitionKind::Crossfade, TransitionKind::Wipe(Direction::Left)] {
            assert_eq!(composite(kind, &a, &b, 0.0, 0).unwrap(), a, "{kind}");
            assert_eq!(composite(kind, &a, &b, 1.0, 0).unwrap(), b, "{kind}");
        }
    }

    #[test]
    fn test_size_mismatch_is_error() {
        let a = FrameBuffer::solid(16, 16, [0, 0, 0, 255]);
        let b = FrameBuffer::solid(8, 16, [0, 0, 0, 255]);
        let err = composite(TransitionKind::Crossfade, &a, &b, 0.5, 0).unwrap_err();
        assert!(matches!(err, AdReelError::Effect(_)));
    }
}
