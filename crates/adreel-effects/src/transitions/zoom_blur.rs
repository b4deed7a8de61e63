use glam::Vec2;
use rayon::prelude::*;

use super::{mix, sample_clamped};
use crate::transition::Transition;

/// A scales up while fading out; B starts enlarged and settles to its
/// normal size while fading in. Each sample is averaged along the radial
/// direction to fake a zoom blur.
pub struct ZoomBlur {
    /// Scale reached by A at the end (and B's starting scale).
    pub max_scale: f32,
    /// Radial samples per output pixel.
    pub taps: u32,
}

impl Default for ZoomBlur {
    fn default() -> Self {
        Self {
            max_scale: 1.5,
            taps: 4,
        }
    }
}

impl ZoomBlur {
    fn sample(&self, data: &[u8], w: u32, h: u32, pos: Vec2, scale: f32) -> [f32; 4] {
        let center = Vec2::new(w as f32, h as f32) * 0.5;
        let rel = (pos - center) / scale;
        // Blur length grows with the amount of zoom.
        let spread = (scale - 1.0) * 0.08;
        let taps = self.taps.max(1);
        let mut acc = [0f32; 4];
        for t in 0..taps {
            let k = 1.0 - spread * t as f32 / taps as f32;
            let p = center + rel * k;
            let px = sample_clamped(data, w, h, p.x as i32, p.y as i32);
            for c in 0..4 {
                acc[c] += px[c] as f32;
            }
        }
        acc.map(|v| v / taps as f32)
    }
}

impl Transition for ZoomBlur {
    fn name(&self) -> &str {
        "zoom_blur"
    }

    fn render(&self, a: &[u8], b: &[u8], w: u32, h: u32, progress: f32) -> Vec<u8> {
        let size = (w * h * 4) as usize;
        let mut out = vec![0u8; size];
        let p = progress.clamp(0.0, 1.0);
        let row_bytes = (w * 4) as usize;
        if row_bytes == 0 {
            return out;
        }
        let extra = self.max_scale - 1.0;
        let scale_a = 1.0 + extra * p;
        let scale_b = 1.0 + extra * (1.0 - p);

        out.par_chunks_mut(row_bytes)
            .enumerate()
            .for_each(|(y, row)| {
                for x in 0..w as usize {
                    let pos = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                    let sa = self.sample(a, w, h, pos, scale_a);
                    let sb = self.sample(b, w, h, pos, scale_b);
                    for c in 0..4 {
                        row[x * 4 + c] = mix(sa[c].round() as u8, sb[c].round() as u8, p);
                    }
                }
            });
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_frames_blend_linearly() {
        let a = vec![100u8; 8 * 8 * 4];
        let b = vec![200u8; 8 * 8 * 4];
        let out = ZoomBlur::default().render(&a, &b, 8, 8, 0.5);
        assert!(out.iter().all(|&v| v == 150));
    }
}
