pub mod catalog;
pub mod color;
pub mod engine;
pub mod extractor;
pub mod features;
pub mod ranker;
pub mod scoring;
pub mod session;
pub mod source;
pub mod store;
pub mod vision;

pub use catalog::{CatalogItem, CatalogSource, InMemoryCatalog, ItemStatus, JsonCatalog};
pub use engine::{MatchEngine, SearchOutcome};
pub use extractor::{FeatureExtractor, LocalHeuristicExtractor};
pub use features::{Fingerprint, ImageFeatures, ShapeFeatures, TextureFeatures};
pub use ranker::Ranker;
pub use scoring::{CatalogScorer, ScoreBreakdown, ScoredItem};
pub use session::{SearchEvent, SearchSession, SearchState, SearchTicket, SessionError};
pub use source::{ImageSource, UrlFetcher};
pub use store::SqliteCatalog;
pub use vision::{RemoteVisionExtractor, VisionClient, VisionLabel};
