use rayon::prelude::*;

use crate::transition::Transition;

/// Whiteout: A fades to white over the first half, B fades in from white
/// over the second.
pub struct Flash;

impl Transition for Flash {
    fn name(&self) -> &str {
        "flash"
    }

    fn render(&self, a: &[u8], b: &[u8], w: u32, h: u32, progress: f32) -> Vec<u8> {
        let size = (w * h * 4) as usize;
        let mut out = vec![0u8; size];
        let p = progress.clamp(0.0, 1.0);

        let (src, whiteness) = if p < 0.5 {
            // Fade A to white
            (a, p * 2.0)
        } else {
            // Fade white to B
            (b, 1.0 - (p - 0.5) * 2.0)
        };

        out.par_chunks_mut(4)
            .zip(src.par_chunks(4))
            .for_each(|(o, px)| {
                for c in 0..3 {
                    let v = px[c] as f32;
                    o[c] = (v + (255.0 - v) * whiteness).round().min(255.0) as u8;
                }
                o[3] = 255;
            });
        out
    }
}
