use rayon::prelude::*;

use super::mix;
use crate::transition::Transition;

pub struct Crossfade;

impl Transition for Crossfade {
    fn name(&self) -> &str {
        "crossfade"
    }

    fn render(&self, a: &[u8], b: &[u8], w: u32, h: u32, progress: f32) -> Vec<u8> {
        let size = (w * h * 4) as usize;
        let mut out = vec![0u8; size];
        let p = progress.clamp(0.0, 1.0);

        out.par_chunks_mut(4096)
            .zip(a.par_chunks(4096))
            .zip(b.par_chunks(4096))
            .for_each(|((out_chunk, a_chunk), b_chunk)| {
                for ((o, a_px), b_px) in out_chunk.iter_mut().zip(a_chunk).zip(b_chunk) {
                    *o = mix(*a_px, *b_px, p);
                }
            });
        out
    }
}
