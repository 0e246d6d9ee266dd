use crate::core::catalog::{CatalogItem, CatalogSource, ItemStatus};
use crate::error::{MatchError, Result};
use rusqlite::{params, Connection, OpenFlags};
use std::path::{Path, PathBuf};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS items (
    id          TEXT PRIMARY KEY NOT NULL,
    title       TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    category    TEXT NOT NULL DEFAULT '',
    location    TEXT NOT NULL DEFAULT '',
    image       TEXT NOT NULL DEFAULT '',
    status      TEXT NOT NULL DEFAULT 'found',
    visual      TEXT
);
";

/// Catalog kept in a SQLite file. Stored features are a JSON column.
///
/// A connection is opened per call so the catalog can be shared between
/// threads without a pool.
#[derive(Debug, Clone)]
pub struct SqliteCatalog {
    path: PathBuf,
}

impl SqliteCatalog {
    /// Open an existing database read-only; fails if it is missing.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create the database and schema if needed.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let catalog = Self { path: path.into() };
        let conn = Connection::open(&catalog.path).map_err(|e| catalog.unavailable(e))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| catalog.unavailable(e))?;
        Ok(catalog)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert or replace items, keeping existing insertion order for ids
    /// that are already present.
    pub fn upsert_items(&self, items: &[CatalogItem]) -> Result<usize> {
        let mut conn = Connection::open(&self.path).map_err(|e| self.unavailable(e))?;
        let tx = conn.transaction().map_err(|e| self.unavailable(e))?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO items (id, title, description, category, location, image, status, visual)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                     ON CONFLICT(id) DO UPDATE SET
                        title = excluded.title,
                        description = excluded.description,
                        category = excluded.category,
                        location = excluded.location,
                        image = excluded.image,
                        status = excluded.status,
                        visual = excluded.visual",
                )
                .map_err(|e| self.unavailable(e))?;

            for item in items {
                let visual = item
                    .visual
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()
                    .map_err(|e| self.unavailable(e))?;
                stmt.execute(params![
                    item.id,
                    item.title,
                    item.description,
                    item.category,
                    item.location,
                    item.image,
                    status_to_str(item.status),
                    visual,
                ])
                .map_err(|e| self.unavailable(e))?;
            }
        }
        tx.commit().map_err(|e| self.unavailable(e))?;

        log::info!("Stored {} items in {}", items.len(), self.path.display());
        Ok(items.len())
    }

    fn unavailable(&self, err: impl std::fmt::Display) -> MatchError {
        MatchError::catalog(format!("{}: {}", self.path.display(), err))
    }
}

impl CatalogSource for SqliteCatalog {
    fn fetch_all_items(&self) -> Result<Vec<CatalogItem>> {
        let conn = Connection::open_with_flags(&self.path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|e| self.unavailable(e))?;
        let mut stmt = conn
            .prepare(
                "SELECT id, title, description, category, location, image, status, visual
                 FROM items ORDER BY rowid",
            )
            .map_err(|e| self.unavailable(e))?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    CatalogItem {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        description: row.get(2)?,
                        category: row.get(3)?,
                        location: row.get(4)?,
                        image: row.get(5)?,
                        status: status_from_str(&row.get::<_, String>(6)?),
                        visual: None,
                    },
                    row.get::<_, Option<String>>(7)?,
                ))
            })
            .map_err(|e| self.unavailable(e))?;

        let mut items = Vec::new();
        for row in rows {
            let (mut item, visual) = row.map_err(|e| self.unavailable(e))?;
            if let Some(json) = visual {
                match serde_json::from_str(&json) {
                    Ok(features) => item.visual = Some(features),
                    Err(e) => log::warn!("Ignoring unreadable features for item {}: {}", item.id, e),
                }
            }
            items.push(item);
        }
        Ok(items)
    }

    fn describe(&self) -> String {
        format!("sqlite:{}", self.path.display())
    }
}

fn status_to_str(status: ItemStatus) -> &'static str {
    match status {
        ItemStatus::Found => "found",
        ItemStatus::Pending => "pending",
        ItemStatus::Claimed => "claimed",
        ItemStatus::Returned => "returned",
        ItemStatus::Other => "other",
    }
}

fn status_from_str(value: &str) -> ItemStatus {
    match value {
        "found" => ItemStatus::Found,
        "pending" => ItemStatus::Pending,
        "claimed" => ItemStatus::Claimed,
        "returned" => ItemStatus::Returned,
        _ => ItemStatus::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::color::Rgb;
    use crate::core::features::{Fingerprint, ImageFeatures, ShapeFeatures};
    use tempfile::TempDir;

    fn features() -> ImageFeatures {
        ImageFeatures {
            dominant_colors: vec![Rgb(0, 0, 0), Rgb(192, 192, 192)],
            labels: vec!["black".into(), "silver".into()],
            shape: ShapeFeatures {
                aspect_ratio: 0.5,
                rectangularity: 0.6,
                roundness: 0.1,
                squareness: 0.0,
                symmetry: 0.9,
                compactness: 0.8,
                complexity: 0.2,
            },
            texture: None,
            fingerprint: Fingerprint([1, 2, 3, u64::MAX]),
        }
    }

    #[test]
    fn test_upsert_and_fetch_preserves_order() {
        let temp_dir = TempDir::new().unwrap();
        let catalog = SqliteCatalog::create(temp_dir.path().join("catalog.db")).unwrap();

        let mut phone = CatalogItem::new("p1", "Black iPhone", "electronics").with_visual(features());
        phone.status = ItemStatus::Claimed;
        let scarf = CatalogItem::new("s1", "Red Scarf", "clothing");
        catalog.upsert_items(&[phone.clone(), scarf.clone()]).unwrap();

        let items = catalog.fetch_all_items().unwrap();
        assert_eq!(items, vec![phone.clone(), scarf.clone()]);

        let renamed = CatalogItem::new("p1", "Black iPhone 13", "electronics");
        catalog.upsert_items(&[renamed.clone()]).unwrap();
        let items = catalog.fetch_all_items().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0], renamed);
        assert_eq!(items[1], scarf);
    }

    #[test]
    fn test_missing_database_is_unavailable() {
        let temp_dir = TempDir::new().unwrap();
        let catalog = SqliteCatalog::open(temp_dir.path().join("missing.db"));
        let err = catalog.fetch_all_items().unwrap_err();
        assert!(matches!(err, MatchError::CatalogUnavailable { .. }));
        assert!(!temp_dir.path().join("missing.db").exists());
    }

    #[test]
    fn test_status_text_roundtrip() {
        for status in [
            ItemStatus::Found,
            ItemStatus::Pending,
            ItemStatus::Claimed,
            ItemStatus::Returned,
            ItemStatus::Other,
        ] {
            assert_eq!(status_from_str(status_to_str(status)), status);
        }
    }
}
