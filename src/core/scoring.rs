use crate::config::ScoreWeights;
use crate::core::catalog::CatalogItem;
use crate::core::color::{named, palette_similarity};
use crate::core::features::ImageFeatures;
use crate::error::{MatchError, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

const DIRECT_CATEGORY_SCORE: f64 = 0.7;
const PARTIAL_CATEGORY_SCORE: f64 = 0.2;
const DEFAULT_MAX_SCORE: f64 = 0.98;

/// Each component in [0, 1] before weighting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub title: f64,
    pub category: f64,
    pub description: f64,
    pub color: f64,
    pub object: f64,
    pub feature: f64,
}

impl ScoreBreakdown {
    pub fn weighted(&self, weights: &ScoreWeights) -> f64 {
        self.title * weights.title
            + self.category * weights.category
            + self.description * weights.description
            + self.color * weights.color
            + self.object * weights.object
            + self.feature * weights.feature
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredItem {
    pub item: CatalogItem,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
}

/// Weighted heuristic relevance of catalog items to extracted features.
#[derive(Debug, Clone)]
pub struct CatalogScorer {
    weights: ScoreWeights,
    max_score: f64,
}

impl Default for CatalogScorer {
    fn default() -> Self {
        Self {
            weights: ScoreWeights::default(),
            max_score: DEFAULT_MAX_SCORE,
        }
    }
}

impl CatalogScorer {
    /// `max_score` must lie in (0, 1].
    pub fn new(weights: ScoreWeights, max_score: f64) -> Result<Self> {
        if !(max_score > 0.0 && max_score <= 1.0) {
            return Err(MatchError::InvalidConfig(format!(
                "max_score must be within (0, 1], got {}",
                max_score
            )));
        }
        Ok(Self { weights, max_score })
    }

    /// One result per item, in catalog order.
    pub fn score_all(&self, features: &ImageFeatures, items: &[CatalogItem]) -> Vec<ScoredItem> {
        items
            .par_iter()
            .map(|item| self.score_item(features, item))
            .collect()
    }

    pub fn score_item(&self, features: &ImageFeatures, item: &CatalogItem) -> ScoredItem {
        let breakdown = self.breakdown(features, item);
        let score = breakdown
            .weighted(&self.weights)
            .clamp(0.0, self.max_score);

        ScoredItem {
            item: item.clone(),
            score,
            breakdown,
        }
    }

    pub fn breakdown(&self, features: &ImageFeatures, item: &CatalogItem) -> ScoreBreakdown {
        let labels: Vec<String> = features.labels.iter().map(|l| l.to_lowercase()).collect();

        let mut breakdown = ScoreBreakdown {
            title: ranked_containment(&labels, &item.title),
            category: category_score(&labels, &item.category),
            description: ranked_containment(&labels, &item.description),
            ..ScoreBreakdown::default()
        };

        if let Some(visual) = &item.visual {
            breakdown.color = palette_similarity(&features.dominant_colors, &visual.dominant_colors);
            breakdown.object = features.shape.similarity(&visual.shape);

            let fingerprint = features.fingerprint.similarity(&visual.fingerprint);
            breakdown.feature = match (&features.texture, &visual.texture) {
                (Some(a), Some(b)) => (fingerprint + a.similarity(b)) / 2.0,
                _ => fingerprint,
            };
        }

        breakdown
    }
}

/// Sum of 1/(rank+1) over labels found in `text`, capped at 1.
fn ranked_containment(labels: &[String], text: &str) -> f64 {
    if text.is_empty() {
        return 0.0;
    }
    let text = text.to_lowercase();
    labels
        .iter()
        .enumerate()
        .filter(|(_, label)| !label.is_empty() && text.contains(label.as_str()))
        .map(|(rank, _)| 1.0 / (rank as f64 + 1.0))
        .sum::<f64>()
        .min(1.0)
}

/// A label inside the category is a direct hit. Keywords of colors named
/// among the labels that did not make it into the label list add partial
/// credit.
fn category_score(labels: &[String], category: &str) -> f64 {
    if category.is_empty() {
        return 0.0;
    }
    let category = category.to_lowercase();

    let mut score = 0.0;
    if labels
        .iter()
        .any(|label| !label.is_empty() && category.contains(label.as_str()))
    {
        score += DIRECT_CATEGORY_SCORE;
    }

    let mut seen: Vec<&str> = Vec::new();
    for color in labels.iter().filter_map(|label| named(label)) {
        for &keyword in color.keywords {
            if seen.contains(&keyword) || labels.iter().any(|l| l == keyword) {
                continue;
            }
            seen.push(keyword);
            if category.contains(keyword) {
                score += PARTIAL_CATEGORY_SCORE;
            }
        }
    }

    score.min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::color::Rgb;
    use crate::core::features::{Fingerprint, ShapeFeatures, TextureFeatures};

    fn features(labels: &[&str]) -> ImageFeatures {
        ImageFeatures {
            dominant_colors: vec![Rgb(0, 0, 0)],
            labels: labels.iter().map(|l| l.to_string()).collect(),
            shape: ShapeFeatures {
                aspect_ratio: 1.0,
                rectangularity: 0.67,
                roundness: 0.87,
                squareness: 1.0,
                symmetry: 1.0,
                compactness: 0.0,
                complexity: 0.0,
            },
            texture: Some(TextureFeatures {
                coarseness: 1.0,
                contrast: 0.0,
                directionality: 0.0,
                roughness: 0.0,
                regularity: 1.0,
            }),
            fingerprint: Fingerprint::default(),
        }
    }

    #[test]
    fn test_title_match_is_case_insensitive() {
        let scorer = CatalogScorer::default();
        let item = CatalogItem::new("1", "Blue Wallet", "accessories");

        for labels in [&["blue"][..], &["WALLET"][..], &["Blue", "wallet"][..]] {
            let breakdown = scorer.breakdown(&features(labels), &item);
            assert!(breakdown.title > 0.0, "labels {:?}", labels);
        }
        assert_eq!(scorer.breakdown(&features(&["red"]), &item).title, 0.0);
    }

    #[test]
    fn test_title_weights_earlier_labels_more() {
        let scorer = CatalogScorer::default();
        let item = CatalogItem::new("1", "Phone", "");
        let first = scorer.breakdown(&features(&["phone", "x"]), &item).title;
        let second = scorer.breakdown(&features(&["x", "phone"]), &item).title;
        assert_eq!(first, 1.0);
        assert_eq!(second, 0.5);
    }

    #[test]
    fn test_category_direct_and_partial() {
        fn owned(v: &[&str]) -> Vec<String> {
            v.iter().map(|s| s.to_string()).collect()
        }

        // "electronics" is a label: direct hit.
        assert_eq!(category_score(&owned(&["black", "electronics"]), "Electronics"), 0.7);
        // Only the color made it into the labels: keyword table gives partial credit.
        assert_eq!(category_score(&owned(&["black"]), "electronics"), 0.2);
        assert_eq!(category_score(&owned(&["black"]), "clothing"), 0.0);
        assert_eq!(category_score(&owned(&["black"]), ""), 0.0);
    }

    #[test]
    fn test_visual_components_need_stored_features() {
        let scorer = CatalogScorer::default();
        let query = features(&["black"]);

        let plain = CatalogItem::new("1", "Charger", "electronics");
        let breakdown = scorer.breakdown(&query, &plain);
        assert_eq!((breakdown.color, breakdown.object, breakdown.feature), (0.0, 0.0, 0.0));

        let indexed = plain.clone().with_visual(query.clone());
        let breakdown = scorer.breakdown(&query, &indexed);
        assert!((breakdown.color - 1.0).abs() < 1e-9);
        assert!((breakdown.object - 1.0).abs() < 1e-9);
        assert!((breakdown.feature - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_score_is_capped() {
        let weights = ScoreWeights {
            title: 1.0,
            ..ScoreWeights::default()
        };
        let scorer = CatalogScorer::new(weights.clone(), 0.98).unwrap();
        let query = features(&["black", "phone", "electronics"]);
        let item = CatalogItem::new("1", "Black phone", "electronics")
            .with_description("black phone, electronics")
            .with_visual(query.clone());

        let scored = scorer.score_item(&query, &item);
        assert_eq!(scored.score, 0.98);
        assert!(scored.breakdown.weighted(&weights) > 0.98);
    }

    #[test]
    fn test_out_of_range_cap_is_rejected() {
        for cap in [-0.5, 0.0, 1.5, f64::NAN] {
            let err = CatalogScorer::new(ScoreWeights::default(), cap).unwrap_err();
            assert!(matches!(err, MatchError::InvalidConfig(_)), "cap {}", cap);
        }
        assert!(CatalogScorer::new(ScoreWeights::default(), 1.0).is_ok());
    }

    #[test]
    fn test_score_all_keeps_catalog_order() {
        let scorer = CatalogScorer::default();
        let items: Vec<CatalogItem> = (0..50)
            .map(|i| CatalogItem::new(i.to_string(), format!("Item {}", i), "others"))
            .collect();
        let scored = scorer.score_all(&features(&["black"]), &items);
        let ids: Vec<&str> = scored.iter().map(|s| s.item.id.as_str()).collect();
        let expected: Vec<String> = (0..50).map(|i| i.to_string()).collect();
        assert_eq!(ids, expected);
        assert!(scored.iter().all(|s| (0.0..=0.98).contains(&s.score)));
    }
}
