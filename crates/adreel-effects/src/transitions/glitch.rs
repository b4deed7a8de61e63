use rayon::prelude::*;

use super::{mix, sample_clamped};
use crate::transition::Transition;

/// Horizontal band jitter with a red/blue channel split, cross-fading from
/// A to B. The jitter pattern changes every frame and peaks mid-transition.
pub struct Glitch {
    /// Frame position inside the transition segment.
    pub frame_index: u32,
}

/// Rows per jitter band, as a fraction of the frame height.
const BAND_FRACTION: f32 = 1.0 / 12.0;
/// Largest horizontal displacement, as a fraction of the frame width.
const MAX_SHIFT: f32 = 0.06;

impl Glitch {
    /// Deterministic per-band offset in `[-1, 1]`.
    fn band_jitter(&self, band: u32) -> f32 {
        let mut v = band
            .wrapping_mul(0x9E37_79B9)
            .wrapping_add(self.frame_index.wrapping_mul(0x85EB_CA6B));
        v ^= v >> 15;
        v = v.wrapping_mul(0x2C1B_3C6D);
        v ^= v >> 12;
        (v % 2001) as f32 / 1000.0 - 1.0
    }
}

impl Transition for Glitch {
    fn name(&self) -> &str {
        "glitch"
    }

    fn render(&self, a: &[u8], b: &[u8], w: u32, h: u32, progress: f32) -> Vec<u8> {
        let size = (w * h * 4) as usize;
        let mut out = vec![0u8; size];
        let p = progress.clamp(0.0, 1.0);
        let row_bytes = (w * 4) as usize;
        if row_bytes == 0 {
            return out;
        }

        let intensity = 1.0 - (2.0 * p - 1.0).abs();
        let band_rows = ((h as f32 * BAND_FRACTION) as u32).max(1);
        let max_shift = w as f32 * MAX_SHIFT * intensity;

        out.par_chunks_mut(row_bytes)
            .enumerate()
            .for_each(|(y, row)| {
                let band = y as u32 / band_rows;
                let shift = (self.band_jitter(band) * max_shift).round() as i32;
                let split = (max_shift * 0.25).round() as i32;
                for x in 0..w as usize {
                    let sx = x as i32 + shift;
                    let y = y as i32;
                    let pa = sample_clamped(a, w, h, sx, y);
                    let pb = sample_clamped(b, w, h, sx, y);
                    let ra = sample_clamped(a, w, h, sx + split, y)[0];
                    let rb = sample_clamped(b, w, h, sx + split, y)[0];
                    let ba = sample_clamped(a, w, h, sx - split, y)[2];
                    let bb = sample_clamped(b, w, h, sx - split, y)[2];
                    let o = x * 4;
                    row[o] = mix(ra, rb, p);
                    row[o + 1] = mix(pa[1], pb[1], p);
                    row[o + 2] = mix(ba, bb, p);
                    row[o + 3] = mix(pa[3], pb[3], p);
                }
            });
        out
    }
}
