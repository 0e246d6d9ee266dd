//! Hosted label detection as a pluggable extraction strategy.

use crate::core::color::nearest_named;
use crate::core::extractor::{FeatureExtractor, LocalHeuristicExtractor};
use crate::core::features::ImageFeatures;
use crate::error::{MatchError, Result};
use image::DynamicImage;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisionLabel {
    pub description: String,
    /// Service confidence in [0, 1].
    pub score: f64,
}

/// Client for an image-labelling service.
pub trait VisionClient: Send + Sync {
    fn detect_labels(
        &self,
        image: &DynamicImage,
    ) -> std::result::Result<Vec<VisionLabel>, Box<dyn std::error::Error + Send + Sync>>;
}

/// Pixel statistics come from the local pipeline; labels come from the
/// service, followed by the dominant color names.
pub struct RemoteVisionExtractor<C: VisionClient> {
    client: C,
    local: LocalHeuristicExtractor,
    min_confidence: f64,
}

impl<C: VisionClient> RemoteVisionExtractor<C> {
    pub fn new(client: C, local: LocalHeuristicExtractor) -> Self {
        Self {
            client,
            local,
            min_confidence: 0.5,
        }
    }

    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    fn merge_labels(&self, mut remote: Vec<VisionLabel>, features: &ImageFeatures) -> Vec<String> {
        let max_labels = self.local.config().max_labels;
        remote.retain(|l| l.score >= self.min_confidence);
        remote.sort_by(|a, b| b.score.total_cmp(&a.score));

        let color_names = features
            .dominant_colors
            .iter()
            .map(|c| nearest_named(c).name.to_string());

        let mut labels: Vec<String> = Vec::new();
        for label in remote
            .into_iter()
            .map(|l| l.description.trim().to_lowercase())
            .chain(color_names)
        {
            if labels.len() >= max_labels {
                break;
            }
            if !label.is_empty() && !labels.contains(&label) {
                labels.push(label);
            }
        }
        labels
    }
}

impl<C: VisionClient> FeatureExtractor for RemoteVisionExtractor<C> {
    fn name(&self) -> &'static str {
        "remote-vision"
    }

    fn extract(&self, image: &DynamicImage) -> Result<ImageFeatures> {
        let mut features = self.local.extract(image)?;
        let remote = self
            .client
            .detect_labels(image)
            .map_err(|e| MatchError::VisionService(e.to_string()))?;
        log::debug!("Vision service returned {} labels", remote.len());

        features.labels = self.merge_labels(remote, &features);
        Ok(features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba};

    struct FixedLabels(Vec<(&'static str, f64)>);

    impl VisionClient for FixedLabels {
        fn detect_labels(
            &self,
            _image: &DynamicImage,
        ) -> std::result::Result<Vec<VisionLabel>, Box<dyn std::error::Error + Send + Sync>>
        {
            Ok(self
                .0
                .iter()
                .map(|(d, s)| VisionLabel {
                    description: d.to_string(),
                    score: *s,
                })
                .collect())
        }
    }

    struct Offline;

    impl VisionClient for Offline {
        fn detect_labels(
            &self,
            _image: &DynamicImage,
        ) -> std::result::Result<Vec<VisionLabel>, Box<dyn std::error::Error + Send + Sync>>
        {
            Err("service unreachable".into())
        }
    }

    fn black() -> DynamicImage {
        DynamicImage::ImageRgba8(ImageBuffer::from_pixel(20, 20, Rgba([0, 0, 0, 255])))
    }

    #[test]
    fn test_remote_labels_lead() {
        let client = FixedLabels(vec![
            ("Mobile Phone", 0.91),
            ("Gadget", 0.97),
            ("Noise", 0.2),
            ("gadget", 0.6),
        ]);
        let extractor = RemoteVisionExtractor::new(client, LocalHeuristicExtractor::default());
        let features = extractor.extract(&black()).unwrap();

        assert_eq!(features.labels, vec!["gadget", "mobile phone", "black"]);
        assert_eq!(extractor.name(), "remote-vision");
    }

    #[test]
    fn test_service_failure_is_not_hidden() {
        let extractor = RemoteVisionExtractor::new(Offline, LocalHeuristicExtractor::default());
        let err = extractor.extract(&black()).unwrap_err();
        assert!(matches!(err, MatchError::VisionService(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_label_cap_applies() {
        let many: Vec<(&'static str, f64)> = [
            "a1", "a2", "a3", "a4", "a5", "a6", "a7", "a8", "a9", "a10", "a11", "a12",
        ]
        .iter()
        .map(|d| (*d, 0.9))
        .collect();
        let extractor =
            RemoteVisionExtractor::new(FixedLabels(many), LocalHeuristicExtractor::default())
                .with_min_confidence(0.0);
        let features = extractor.extract(&black()).unwrap();
        assert_eq!(features.labels.len(), 10);
        assert!(!features.labels.contains(&"black".to_string()));
    }
}
