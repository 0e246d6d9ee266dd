//! Color utilities: quantization and the named-color tables used to turn
//! dominant colors into search keywords.

use serde::{Deserialize, Serialize};

/// Largest possible Euclidean distance between two RGB triples.
pub const MAX_RGB_DISTANCE: f64 = 441.672_955_930_063_7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// Round each channel to the nearest multiple of `step`, saturating at 255.
    pub fn quantize(self, step: u8) -> Self {
        let q = |c: u8| -> u8 {
            let step = step.max(1) as u32;
            let rounded = (c as u32 + step / 2) / step * step;
            rounded.min(255) as u8
        };
        Rgb(q(self.0), q(self.1), q(self.2))
    }

    pub fn distance(&self, other: &Rgb) -> f64 {
        let dr = self.0 as f64 - other.0 as f64;
        let dg = self.1 as f64 - other.1 as f64;
        let db = self.2 as f64 - other.2 as f64;
        (dr * dr + dg * dg + db * db).sqrt()
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

#[derive(Debug)]
pub struct NamedColor {
    pub name: &'static str,
    pub rgb: Rgb,
    /// Item keywords commonly associated with this color in a lost-and-found catalog.
    pub keywords: &'static [&'static str],
}

pub static NAMED_COLORS: &[NamedColor] = &[
    NamedColor {
        name: "black",
        rgb: Rgb(0, 0, 0),
        keywords: &["electronics", "phone", "laptop", "wallet", "headphones", "charger", "bag", "umbrella"],
    },
    NamedColor {
        name: "white",
        rgb: Rgb(255, 255, 255),
        keywords: &["electronics", "earbuds", "charger", "documents", "cup", "shoes"],
    },
    NamedColor {
        name: "gray",
        rgb: Rgb(128, 128, 128),
        keywords: &["electronics", "laptop", "keys", "bottle", "jacket"],
    },
    NamedColor {
        name: "silver",
        rgb: Rgb(192, 192, 192),
        keywords: &["electronics", "keys", "watch", "jewelry", "bottle"],
    },
    NamedColor {
        name: "red",
        rgb: Rgb(255, 0, 0),
        keywords: &["clothing", "bag", "wallet", "umbrella", "bottle"],
    },
    NamedColor {
        name: "green",
        rgb: Rgb(0, 128, 0),
        keywords: &["clothing", "bag", "bottle", "notebook"],
    },
    NamedColor {
        name: "blue",
        rgb: Rgb(0, 0, 255),
        keywords: &["clothing", "jeans", "jacket", "bag", "notebook", "bottle"],
    },
    NamedColor {
        name: "navy",
        rgb: Rgb(0, 0, 128),
        keywords: &["clothing", "jacket", "backpack", "bag"],
    },
    NamedColor {
        name: "yellow",
        rgb: Rgb(255, 255, 0),
        keywords: &["clothing", "umbrella", "notebook", "toy"],
    },
    NamedColor {
        name: "orange",
        rgb: Rgb(255, 165, 0),
        keywords: &["clothing", "bag", "ball", "toy"],
    },
    NamedColor {
        name: "purple",
        rgb: Rgb(128, 0, 128),
        keywords: &["clothing", "bag", "umbrella"],
    },
    NamedColor {
        name: "pink",
        rgb: Rgb(255, 192, 203),
        keywords: &["clothing", "bag", "accessories", "toy"],
    },
    NamedColor {
        name: "brown",
        rgb: Rgb(139, 69, 19),
        keywords: &["wallet", "bag", "accessories", "leather", "shoes", "belt"],
    },
    NamedColor {
        name: "beige",
        rgb: Rgb(245, 245, 220),
        keywords: &["clothing", "bag", "accessories", "hat"],
    },
    NamedColor {
        name: "gold",
        rgb: Rgb(255, 215, 0),
        keywords: &["jewelry", "ring", "watch", "accessories", "keys"],
    },
];

/// Closest entry of [`NAMED_COLORS`]. Ties resolve to the earlier entry.
pub fn nearest_named(color: &Rgb) -> &'static NamedColor {
    let mut best = &NAMED_COLORS[0];
    let mut best_distance = f64::MAX;
    for named in NAMED_COLORS {
        let d = color.distance(&named.rgb);
        if d < best_distance {
            best = named;
            best_distance = d;
        }
    }
    best
}

pub fn named(name: &str) -> Option<&'static NamedColor> {
    NAMED_COLORS.iter().find(|c| c.name == name)
}

/// Similarity of two palettes in [0, 1]. Each query color is matched to its
/// nearest candidate color; earlier (more dominant) query colors weigh more.
pub fn palette_similarity(query: &[Rgb], candidate: &[Rgb]) -> f64 {
    if query.is_empty() || candidate.is_empty() {
        return 0.0;
    }

    let mut weighted = 0.0;
    let mut total_weight = 0.0;
    for (rank, color) in query.iter().enumerate() {
        let nearest = candidate
            .iter()
            .map(|c| color.distance(c))
            .fold(f64::MAX, f64::min);
        let weight = 1.0 / (rank as f64 + 1.0);
        weighted += weight * (1.0 - nearest / MAX_RGB_DISTANCE);
        total_weight += weight;
    }

    (weighted / total_weight).clamp(0.0, 1.0)
}
