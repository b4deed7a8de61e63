use glam::Vec2;
use rayon::prelude::*;

use crate::transition::{Direction, Transition};

/// Both frames slide in `direction`: A leaves the frame while B enters
/// from the opposite edge, smeared along the motion.
pub struct WhipPan {
    pub direction: Direction,
}

impl Default for WhipPan {
    fn default() -> Self {
        Self {
            direction: Direction::Left,
        }
    }
}

const BLUR_TAPS: i32 = 5;

impl WhipPan {
    fn unit(&self) -> Vec2 {
        match self.direction {
            Direction::Left => Vec2::new(-1.0, 0.0),
            Direction::Right => Vec2::new(1.0, 0.0),
            Direction::Up => Vec2::new(0.0, -1.0),
            Direction::Down => Vec2::new(0.0, 1.0),
        }
    }
}

impl Transition for WhipPan {
    fn name(&self) -> &str {
        "whip_pan"
    }

    fn render(&self, a: &[u8], b: &[u8], w: u32, h: u32, progress: f32) -> Vec<u8> {
        let size = (w * h * 4) as usize;
        let mut out = vec![0u8; size];
        let p = progress.clamp(0.0, 1.0);
        let row_bytes = (w * 4) as usize;
        if row_bytes == 0 {
            return out;
        }

        let dims = Vec2::new(w as f32, h as f32);
        let unit = self.unit();
        // Content moves along `unit`; A is displaced by p, B by p - 1.
        let shift = unit * dims * p;
        let span = (unit * dims).abs().max_element();
        // Fastest (blurriest) in the middle of the move.
        let blur = unit * span * 0.04 * (std::f32::consts::PI * p).sin().max(0.0);

        out.par_chunks_mut(row_bytes)
            .enumerate()
            .for_each(|(y, row)| {
                for x in 0..w as usize {
                    let pos = Vec2::new(x as f32, y as f32);
                    let mut acc = [0f32; 4];
                    for t in 0..BLUR_TAPS {
                        let k = t as f32 / (BLUR_TAPS - 1) as f32 - 0.5;
                        let src = pos - shift - blur * k;
                        let px = sample_pan(a, b, w, h, src, unit * dims);
                        for c in 0..4 {
                            acc[c] += px[c] as f32;
                        }
                    }
                    for c in 0..4 {
                        row[x * 4 + c] = (acc[c] / BLUR_TAPS as f32).round() as u8;
                    }
                }
            });
        out
    }
}

/// Sample the A/B strip at `src` in A's coordinates; B sits one frame
/// behind A along the motion.
fn sample_pan(a: &[u8], b: &[u8], w: u32, h: u32, src: Vec2, offset: Vec2) -> [u8; 4] {
    let inside = |p: Vec2| p.x >= 0.0 && p.y >= 0.0 && p.x < w as f32 && p.y < h as f32;
    let (data, p) = if inside(src) {
        (a, src)
    } else {
        (b, src + offset)
    };
    let x = (p.x as i32).clamp(0, w as i32 - 1) as usize;
    let y = (p.y as i32).clamp(0, h as i32 - 1) as usize;
    let i = (y * w as usize + x) * 4;
    match data.get(i..i + 4) {
        Some(px) => [px[0], px[1], px[2], px[3]],
        None => [0, 0, 0, 255],
    }
}
