use std::sync::atomic::{AtomicU32, Ordering};

use glam::Vec4;

/// `f32` stored as bits in an `AtomicU32`, combined with CAS loops.
#[derive(Debug, Default)]
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }

    /// Returns the previous value.
    pub fn fetch_add(&self, rhs: f32) -> f32 {
        self.fetch_combine(|v| v + rhs)
    }

    /// Returns the previous value.
    pub fn fetch_mul(&self, rhs: f32) -> f32 {
        self.fetch_combine(|v| v * rhs)
    }

    fn fetch_combine(&self, f: impl Fn(f32) -> f32) -> f32 {
        let prev = self
            .0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                Some(f(f32::from_bits(bits)).to_bits())
            });
        match prev {
            Ok(bits) | Err(bits) => f32::from_bits(bits),
        }
    }
}

/// Row-major texel index, widened before multiplying.
pub(crate) fn texel_index(width: u32, x: u32, y: u32) -> usize {
    y as usize * width as usize + x as usize
}

/// Weighted premultiplied color sum per pixel. Cleared to zero each frame.
pub struct AccumImage {
    width: u32,
    height: u32,
    texels: Vec<[AtomicF32; 4]>,
}

impl AccumImage {
    pub fn new(width: u32, height: u32) -> Self {
        let texels = (0..width as usize * height as usize)
            .map(|_| Default::default())
            .collect();
        Self {
            width,
            height,
            texels,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Additive combine (`One, One, Add`).
    pub fn add(&self, x: u32, y: u32, value: Vec4) {
        let texel = &self.texels[texel_index(self.width, x, y)];
        for (channel, v) in texel.iter().zip(value.to_array()) {
            channel.fetch_add(v);
        }
    }

    pub fn load(&self, x: u32, y: u32) -> Vec4 {
        let texel = &self.texels[texel_index(self.width, x, y)];
        Vec4::new(
            texel[0].load(),
            texel[1].load(),
            texel[2].load(),
            texel[3].load(),
        )
    }

    pub fn clear(&self) {
        for texel in &self.texels {
            for channel in texel {
                channel.store(0.0);
            }
        }
    }
}

/// Per-pixel product of `(1 - alpha)`. Reset to 1.0 each frame.
pub struct RevealageImage {
    width: u32,
    height: u32,
    texels: Vec<AtomicF32>,
}

impl RevealageImage {
    pub fn new(width: u32, height: u32) -> Self {
        let texels = (0..width as usize * height as usize)
            .map(|_| AtomicF32::new(1.0))
            .collect();
        Self {
            width,
            height,
            texels,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Multiplicative combine (`Zero, OneMinusSrc, Add` with src = alpha).
    pub fn multiply(&self, x: u32, y: u32, factor: f32) {
        self.texels[texel_index(self.width, x, y)].fetch_mul(factor);
    }

    pub fn load(&self, x: u32, y: u32) -> f32 {
        self.texels[texel_index(self.width, x, y)].load()
    }

    pub fn reset(&self) {
        for texel in &self.texels {
            texel.store(1.0);
        }
    }
}
