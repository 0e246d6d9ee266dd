use crate::core::color::Rgb;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const FINGERPRINT_GRID: usize = 16;
pub const FINGERPRINT_BITS: usize = FINGERPRINT_GRID * FINGERPRINT_GRID;

/// Compact description of an image used for matching against the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageFeatures {
    /// Most frequent quantized colors, most frequent first.
    pub dominant_colors: Vec<Rgb>,
    pub labels: Vec<String>,
    pub shape: ShapeFeatures,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub texture: Option<TextureFeatures>,
    pub fingerprint: Fingerprint,
}

/// All fields except `aspect_ratio` lie in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShapeFeatures {
    pub aspect_ratio: f64,
    pub rectangularity: f64,
    pub roundness: f64,
    pub squareness: f64,
    pub symmetry: f64,
    pub compactness: f64,
    pub complexity: f64,
}

impl ShapeFeatures {
    /// 1.0 for identical shapes, 0.0 for maximally different ones.
    pub fn similarity(&self, other: &ShapeFeatures) -> f64 {
        let metrics = [
            (self.rectangularity, other.rectangularity),
            (self.roundness, other.roundness),
            (self.squareness, other.squareness),
            (self.symmetry, other.symmetry),
            (self.compactness, other.compactness),
            (self.complexity, other.complexity),
        ];
        let mean_diff =
            metrics.iter().map(|(a, b)| (a - b).abs()).sum::<f64>() / metrics.len() as f64;

        let aspect = if self.aspect_ratio > 0.0 && other.aspect_ratio > 0.0 {
            self.aspect_ratio.min(other.aspect_ratio) / self.aspect_ratio.max(other.aspect_ratio)
        } else {
            0.0
        };

        (((1.0 - mean_diff) + aspect) / 2.0).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextureFeatures {
    pub coarseness: f64,
    pub contrast: f64,
    pub directionality: f64,
    pub roughness: f64,
    pub regularity: f64,
}

impl TextureFeatures {
    pub fn similarity(&self, other: &TextureFeatures) -> f64 {
        let diffs = [
            (self.coarseness - other.coarseness).abs(),
            (self.contrast - other.contrast).abs(),
            (self.directionality - other.directionality).abs(),
            (self.roughness - other.roughness).abs(),
            (self.regularity - other.regularity).abs(),
        ];
        (1.0 - diffs.iter().sum::<f64>() / diffs.len() as f64).clamp(0.0, 1.0)
    }
}

/// 256-bit brightness hash of a 16x16 grid, row-major, one bit per cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Fingerprint(pub [u64; 4]);

impl Fingerprint {
    pub fn from_bits<I: IntoIterator<Item = bool>>(bits: I) -> Self {
        let mut words = [0u64; 4];
        for (i, bit) in bits.into_iter().take(FINGERPRINT_BITS).enumerate() {
            if bit {
                words[i / 64] |= 1u64 << (i % 64);
            }
        }
        Fingerprint(words)
    }

    pub fn bit(&self, index: usize) -> bool {
        index < FINGERPRINT_BITS && self.0[index / 64] & (1u64 << (index % 64)) != 0
    }

    pub fn count_ones(&self) -> u32 {
        self.0.iter().map(|w| w.count_ones()).sum()
    }

    pub fn hamming(&self, other: &Fingerprint) -> u32 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum()
    }

    pub fn similarity(&self, other: &Fingerprint) -> f64 {
        1.0 - self.hamming(other) as f64 / FINGERPRINT_BITS as f64
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for word in self.0 {
            write!(f, "{:016x}", word)?;
        }
        Ok(())
    }
}
