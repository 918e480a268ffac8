use glam::Vec4;
use hewboit_core::constants::RESOLVE_EPSILON;
use hewboit_core::ConfigError;
use rayon::prelude::*;

use crate::images::{texel_index, AccumImage, RevealageImage};

/// Resolve one pixel. `None` means discard: the opaque background is left untouched.
///
/// Output is premultiplied: `(average_color * final_alpha, final_alpha)`.
pub fn resolve_pixel(accum: Vec4, revealage: f32) -> Option<Vec4> {
    if accum.w < RESOLVE_EPSILON {
        return None;
    }
    let average_color = accum.truncate() / accum.w.max(RESOLVE_EPSILON);
    let final_alpha = 1.0 - revealage;
    Some((average_color * final_alpha).extend(final_alpha))
}

/// Resolved transparent layer, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<Option<Vec4>>,
}

impl ResolvedImage {
    pub fn get(&self, x: u32, y: u32) -> Option<Vec4> {
        self.pixels[texel_index(self.width, x, y)]
    }

    /// Pixels that produced output.
    pub fn covered_pixels(&self) -> usize {
        self.pixels.iter().filter(|p| p.is_some()).count()
    }

    /// Premultiplied over onto an opaque frame: `src + dst * (1 - src.a)`.
    pub fn composite_over(&self, background: &mut [Vec4]) -> Result<(), ConfigError> {
        if background.len() != self.pixels.len() {
            return Err(ConfigError::BufferSizeMismatch {
                resource: "background",
                expected: self.pixels.len(),
                actual: background.len(),
            });
        }
        for (dst, src) in background.iter_mut().zip(&self.pixels) {
            if let Some(src) = src {
                *dst = *src + *dst * (1.0 - src.w);
            }
        }
        Ok(())
    }
}

/// Run the resolver over the whole target, one row per task.
pub fn resolve(accum: &AccumImage, revealage: &RevealageImage) -> ResolvedImage {
    debug_assert_eq!(accum.width(), revealage.width());
    debug_assert_eq!(accum.height(), revealage.height());
    let width = accum.width();
    let height = accum.height();

    let mut pixels = vec![None; width as usize * height as usize];
    if width > 0 {
        pixels
            .par_chunks_mut(width as usize)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, out) in row.iter_mut().enumerate() {
                    let (x, y) = (x as u32, y as u32);
                    *out = resolve_pixel(accum.load(x, y), revealage.load(x, y));
                }
            });
    }

    ResolvedImage {
        width,
        height,
        pixels,
    }
}
