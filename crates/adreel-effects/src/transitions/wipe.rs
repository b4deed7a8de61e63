use rayon::prelude::*;

use crate::transition::{Direction, Transition};

/// Directional reveal: a boundary line sweeps across the frame, with B
/// behind it.
pub struct Wipe {
    pub direction: Direction,
}

impl Default for Wipe {
    fn default() -> Self {
        Self {
            direction: Direction::Left,
        }
    }
}

impl Transition for Wipe {
    fn name(&self) -> &str {
        "wipe"
    }

    fn render(&self, a: &[u8], b: &[u8], w: u32, h: u32, progress: f32) -> Vec<u8> {
        let size = (w * h * 4) as usize;
        let mut out = vec![0u8; size];
        let p = progress.clamp(0.0, 1.0);
        let row_bytes = (w * 4) as usize;
        if row_bytes == 0 {
            return out;
        }

        out.par_chunks_mut(row_bytes)
            .enumerate()
            .for_each(|(y, row)| {
                for x in 0..w as usize {
                    // `wipe_left` moves the line leftwards, revealing B from the right edge.
                    let threshold = match self.direction {
                        Direction::Left => 1.0 - (x as f32 + 0.5) / w as f32,
                        Direction::Right => (x as f32 + 0.5) / w as f32,
                        Direction::Up => 1.0 - (y as f32 + 0.5) / h as f32,
                        Direction::Down => (y as f32 + 0.5) / h as f32,
                    };
                    let src = if threshold < p { b } else { a };
                    let idx = y * row_bytes + x * 4;
                    let o = x * 4;
                    row[o..o + 4].copy_from_slice(&src[idx..idx + 4]);
                }
            });
        out
    }
}
