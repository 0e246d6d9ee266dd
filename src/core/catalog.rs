use crate::core::features::ImageFeatures;
use crate::error::{MatchError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    #[default]
    Found,
    Pending,
    Claimed,
    Returned,
    #[serde(other)]
    Other,
}

impl ItemStatus {
    /// The item has already gone back to its owner or is being handed over.
    pub fn is_resolved(&self) -> bool {
        matches!(self, ItemStatus::Claimed | ItemStatus::Returned)
    }
}

/// A found item as stored in the catalog. Read-only to the matcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub location: String,
    /// Photo location, a path or URL.
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub status: ItemStatus,
    /// Features precomputed from the item's own photo.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual: Option<ImageFeatures>,
}

impl CatalogItem {
    pub fn new(id: impl Into<String>, title: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            category: category.into(),
            location: String::new(),
            image: String::new(),
            status: ItemStatus::Found,
            visual: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_visual(mut self, visual: ImageFeatures) -> Self {
        self.visual = Some(visual);
        self
    }
}

/// Read-only query over the item store.
pub trait CatalogSource: Send + Sync {
    /// Every current item, in a stable order.
    fn fetch_all_items(&self) -> Result<Vec<CatalogItem>>;

    fn describe(&self) -> String;
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    items: Vec<CatalogItem>,
}

impl InMemoryCatalog {
    pub fn new(items: Vec<CatalogItem>) -> Self {
        Self { items }
    }
}

impl CatalogSource for InMemoryCatalog {
    fn fetch_all_items(&self) -> Result<Vec<CatalogItem>> {
        Ok(self.items.clone())
    }

    fn describe(&self) -> String {
        format!("in-memory catalog ({} items)", self.items.len())
    }
}

/// A JSON array of items in a file.
#[derive(Debug, Clone)]
pub struct JsonCatalog {
    path: PathBuf,
}

impl JsonCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory that relative `image` paths are resolved against.
    pub fn base_dir(&self) -> PathBuf {
        self.path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }

    pub fn save(&self, items: &[CatalogItem]) -> Result<()> {
        let json = serde_json::to_string_pretty(items).map_err(MatchError::catalog)?;
        fs::write(&self.path, json)
            .map_err(|e| MatchError::catalog(format!("{}: {}", self.path.display(), e)))
    }
}

impl CatalogSource for JsonCatalog {
    fn fetch_all_items(&self) -> Result<Vec<CatalogItem>> {
        let raw = fs::read_to_string(&self.path)
            .map_err(|e| MatchError::catalog(format!("{}: {}", self.path.display(), e)))?;
        serde_json::from_str(&raw)
            .map_err(|e| MatchError::catalog(format!("{}: {}", self.path.display(), e)))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_minimal_json_item() {
        let raw = r#"[{ "id": "a1", "title": "Blue Wallet", "status": "claimed" },
                      { "id": "a2", "title": "Keys", "status": "archived" }]"#;
        let items: Vec<CatalogItem> = serde_json::from_str(raw).unwrap();

        assert_eq!(items[0].status, ItemStatus::Claimed);
        assert!(items[0].status.is_resolved());
        assert_eq!(items[0].description, "");
        assert!(items[0].visual.is_none());
        assert_eq!(items[1].status, ItemStatus::Other);
    }

    #[test]
    fn test_json_catalog_save_and_fetch() {
        let temp_dir = TempDir::new().unwrap();
        let catalog = JsonCatalog::new(temp_dir.path().join("items.json"));
        let items = vec![
            CatalogItem::new("1", "Black iPhone", "electronics").with_description("cracked case"),
            CatalogItem::new("2", "Red Scarf", "clothing"),
        ];

        catalog.save(&items).unwrap();
        assert_eq!(catalog.fetch_all_items().unwrap(), items);
        assert_eq!(catalog.base_dir(), temp_dir.path());
    }

    #[test]
    fn test_missing_json_catalog_is_unavailable() {
        let temp_dir = TempDir::new().unwrap();
        let catalog = JsonCatalog::new(temp_dir.path().join("absent.json"));
        let err = catalog.fetch_all_items().unwrap_err();
        assert!(matches!(err, MatchError::CatalogUnavailable { .. }));
    }

    #[test]
    fn test_corrupt_json_catalog_is_unavailable() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("items.json");
        fs::write(&path, "[{ \"id\": ").unwrap();
        let err = JsonCatalog::new(path).fetch_all_items().unwrap_err();
        assert!(matches!(err, MatchError::CatalogUnavailable { .. }));
    }

    #[test]
    fn test_in_memory_catalog() {
        let catalog = InMemoryCatalog::new(vec![CatalogItem::new("x", "Umbrella", "others")]);
        assert_eq!(catalog.fetch_all_items().unwrap().len(), 1);
        assert!(InMemoryCatalog::default().fetch_all_items().unwrap().is_empty());
    }
}
