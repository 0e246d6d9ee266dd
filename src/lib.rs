//! Visual similarity matching for a lost-and-found catalog.
//!
//! An uploaded photo is reduced to [`ImageFeatures`] (dominant colors,
//! color-derived keywords, shape and texture statistics, a brightness
//! fingerprint) and every catalog item is scored against them. The best
//! few items are returned as likely matches.
//!
//! ```no_run
//! use lostfound_match::{EngineConfig, ImageSource, JsonCatalog, MatchEngine};
//!
//! let engine = MatchEngine::new(EngineConfig::default())?;
//! let outcome = engine.search(
//!     &ImageSource::parse("upload.jpg"),
//!     &JsonCatalog::new("items.json"),
//! )?;
//! for m in &outcome.matches {
//!     println!("{:.2} {}", m.score, m.item.title);
//! }
//! # Ok::<(), lostfound_match::MatchError>(())
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod history;

pub use config::{EngineConfig, ExtractionConfig, ScoreWeights};
pub use crate::core::*;
pub use error::{MatchError, Result};
