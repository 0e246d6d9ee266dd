use crate::config::EngineConfig;
use crate::core::catalog::{CatalogItem, CatalogSource};
use crate::core::extractor::{FeatureExtractor, LocalHeuristicExtractor};
use crate::core::features::ImageFeatures;
use crate::core::ranker::Ranker;
use crate::core::scoring::{CatalogScorer, ScoredItem};
use crate::core::source::{decode, ImageSource, UrlFetcher};
use crate::error::Result;
use serde::Serialize;
use std::time::Instant;

/// Result of one complete image search.
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    /// BLAKE3 digest of the uploaded bytes.
    pub digest: String,
    pub features: ImageFeatures,
    pub matches: Vec<ScoredItem>,
    pub catalog_size: usize,
}

/// image -> features -> per-item scores -> ranked list.
///
/// Holds configuration only; searches share nothing mutable and may run
/// concurrently.
pub struct MatchEngine {
    extractor: Box<dyn FeatureExtractor>,
    scorer: CatalogScorer,
    ranker: Ranker,
    fetcher: Option<Box<dyn UrlFetcher>>,
    skip_resolved_items: bool,
}

impl MatchEngine {
    /// Engine using the local heuristic extractor. Rejects an invalid config.
    pub fn new(config: EngineConfig) -> Result<Self> {
        let extractor = LocalHeuristicExtractor::new(config.extraction.clone());
        Self::with_extractor(config, Box::new(extractor))
    }

    pub fn with_extractor(
        config: EngineConfig,
        extractor: Box<dyn FeatureExtractor>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            extractor,
            scorer: CatalogScorer::new(config.weights, config.max_score)?,
            ranker: Ranker::new(config.top_k),
            fetcher: None,
            skip_resolved_items: config.skip_resolved_items,
        })
    }

    pub fn with_url_fetcher(mut self, fetcher: Box<dyn UrlFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn extractor_name(&self) -> &'static str {
        self.extractor.name()
    }

    pub fn extract_features(&self, source: &ImageSource) -> Result<ImageFeatures> {
        let bytes = source.read_bytes(self.fetcher.as_deref())?;
        self.extract_from_bytes(&bytes)
    }

    pub fn extract_from_bytes(&self, bytes: &[u8]) -> Result<ImageFeatures> {
        let image = decode(bytes)?;
        self.extractor.extract(&image)
    }

    /// At most `top_k` items, best first.
    pub fn rank_similar_items(
        &self,
        features: &ImageFeatures,
        items: &[CatalogItem],
    ) -> Vec<ScoredItem> {
        let scored = if self.skip_resolved_items {
            let open: Vec<CatalogItem> = items
                .iter()
                .filter(|item| !item.status.is_resolved())
                .cloned()
                .collect();
            self.scorer.score_all(features, &open)
        } else {
            self.scorer.score_all(features, items)
        };
        self.ranker.rank(scored)
    }

    /// Extract features, fetch the whole catalog, rank.
    pub fn search(&self, source: &ImageSource, catalog: &dyn CatalogSource) -> Result<SearchOutcome> {
        let start = Instant::now();
        let bytes = source.read_bytes(self.fetcher.as_deref())?;
        let digest = blake3::hash(&bytes).to_hex().to_string();
        let features = self.extract_from_bytes(&bytes)?;

        let items = catalog.fetch_all_items()?;
        let matches = self.rank_similar_items(&features, &items);

        log::info!(
            "Searched {} against {} ({} items) with {}: {} matches in {:.2?}",
            source,
            catalog.describe(),
            items.len(),
            self.extractor.name(),
            matches.len(),
            start.elapsed()
        );

        Ok(SearchOutcome {
            digest,
            features,
            matches,
            catalog_size: items.len(),
        })
    }
}

impl Default for MatchEngine {
    fn default() -> Self {
        Self {
            extractor: Box::new(LocalHeuristicExtractor::default()),
            scorer: CatalogScorer::default(),
            ranker: Ranker::default(),
            fetcher: None,
            skip_resolved_items: false,
        }
    }
}
