//! Built-in transition implementations.

mod crossfade;
mod flash;
mod glitch;
mod whip_pan;
mod wipe;
mod zoom_blur;

pub use crossfade::Crossfade;
pub use flash::Flash;
pub use glitch::Glitch;
pub use whip_pan::WhipPan;
pub use wipe::Wipe;
pub use zoom_blur::ZoomBlur;

/// Linear blend of two channel values.
#[inline]
pub(crate) fn mix(a: u8, b: u8, t: f32) -> u8 {
    (a as f32 * (1.0 - t) + b as f32 * t).round().clamp(0.0, 255.0) as u8
}

/// RGBA pixel at `(x, y)`, clamped to the frame edges.
#[inline]
pub(crate) fn sample_clamped(data: &[u8], w: u32, h: u32, x: i32, y: i32) -> [u8; 4] {
    let x = x.clamp(0, w as i32 - 1) as usize;
    let y = y.clamp(0, h as i32 - 1) as usize;
    let i = (y * w as usize + x) * 4;
    match data.get(i..i + 4) {
        Some(px) => [px[0], px[1], px[2], px[3]],
        None => [0, 0, 0, 255],
    }
}
