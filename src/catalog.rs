//! Catalog providers: where the index gets its `(code, name)` rows from.

use crate::document::{clean_image_ref, CatalogItem};
use crate::enrich::{Enrichment, MetadataProvider};
use crate::error::CatalogError;
use flate2::read::GzDecoder;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

/// Source of catalog rows, consulted only while rebuilding the index
pub trait CatalogSource: Send + Sync {
    fn load(&self) -> Result<Vec<CatalogItem>, CatalogError>;
}

/// Fixed set of rows held in memory
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    items: RwLock<Vec<CatalogItem>>,
}

impl MemoryCatalog {
    pub fn new(items: Vec<CatalogItem>) -> Self {
        Self {
            items: RwLock::new(items),
        }
    }

    /// Replace the rows; takes effect on the next rebuild
    pub fn replace(&self, items: Vec<CatalogItem>) {
        *self.items.write() = items;
    }
}

impl CatalogSource for MemoryCatalog {
    fn load(&self) -> Result<Vec<CatalogItem>, CatalogError> {
        Ok(self.items.read().clone())
    }
}

impl MetadataProvider for MemoryCatalog {
    fn fetch(&self, ids: &[String]) -> Result<HashMap<String, Enrichment>, CatalogError> {
        let items = self.items.read();
        Ok(collect_enrichment(items.iter(), ids))
    }
}

/// Catalog dump on disk: a JSON array or JSON-lines file, gzip-compressed
/// when the file name ends in `.gz`.
///
/// The metadata columns of the last successful load are kept for
/// enrichment, so the file is read once per rebuild.
#[derive(Debug)]
pub struct FileCatalog {
    path: PathBuf,
    metadata: RwLock<HashMap<String, Enrichment>>,
}

impl FileCatalog {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            metadata: RwLock::new(HashMap::new()),
        }
    }

    fn read_to_string(&self) -> Result<String, CatalogError> {
        let io_err = |source| CatalogError::Io {
            path: self.path.clone(),
            source,
        };

        let file = File::open(&self.path).map_err(io_err)?;
        let mut reader: Box<dyn Read> = if self.is_gzip() {
            Box::new(GzDecoder::new(BufReader::new(file)))
        } else {
            Box::new(BufReader::new(file))
        };

        let mut text = String::new();
        reader.read_to_string(&mut text).map_err(io_err)?;
        Ok(text)
    }

    fn is_gzip(&self) -> bool {
        self.path
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("gz"))
    }

    fn parse(&self, text: &str) -> Result<Vec<CatalogItem>, CatalogError> {
        let trimmed = text.trim_start();
        if trimmed.starts_with('[') {
            let rows: Vec<serde_json::Value> =
                serde_json::from_str(trimmed).map_err(|e| CatalogError::Parse {
                    path: self.path.clone(),
                    message: e.to_string(),
                })?;
            return self.collect_rows(rows.into_iter().map(serde_json::from_value));
        }

        self.collect_rows(
            text.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(|line| serde_json::from_str(line)),
        )
    }

    /// Keep the rows that deserialize; a bad row is dropped, not fatal
    fn collect_rows<I>(&self, rows: I) -> Result<Vec<CatalogItem>, CatalogError>
    where
        I: Iterator<Item = serde_json::Result<CatalogItem>>,
    {
        let mut items = Vec::new();
        let mut bad_rows = 0usize;
        for row in rows {
            match row {
                Ok(item) => items.push(item),
                Err(_) => bad_rows += 1,
            }
        }

        if bad_rows > 0 {
            tracing::warn!(
                path = %self.path.display(),
                bad_rows,
                "Skipped malformed catalog rows"
            );
        }
        if items.is_empty() && bad_rows > 0 {
            return Err(CatalogError::Parse {
                path: self.path.clone(),
                message: format!("no readable rows ({} malformed)", bad_rows),
            });
        }

        Ok(items)
    }
}

impl CatalogSource for FileCatalog {
    fn load(&self) -> Result<Vec<CatalogItem>, CatalogError> {
        let text = self.read_to_string()?;
        let items = self.parse(&text)?;

        let metadata = items
            .iter()
            .map(|item| (item.code.trim().to_string(), Enrichment::from(item)))
            .collect();
        *self.metadata.write() = metadata;

        tracing::debug!(path = %self.path.display(), rows = items.len(), "Read catalog");
        Ok(items)
    }
}

impl MetadataProvider for FileCatalog {
    fn fetch(&self, ids: &[String]) -> Result<HashMap<String, Enrichment>, CatalogError> {
        let metadata = self.metadata.read();
        Ok(ids
            .iter()
            .filter_map(|id| metadata.get(id).map(|e| (id.clone(), e.clone())))
            .collect())
    }
}

impl From<&CatalogItem> for Enrichment {
    fn from(item: &CatalogItem) -> Self {
        Self {
            price: item.price,
            quantity: item.balance_qty,
            unit: item.unit.clone(),
            supplier_code: item.supplier_code.clone(),
            image_url: item.image_url.as_deref().and_then(clean_image_ref),
        }
    }
}

fn collect_enrichment<'a>(
    items: impl Iterator<Item = &'a CatalogItem>,
    ids: &[String],
) -> HashMap<String, Enrichment> {
    let wanted: std::collections::HashSet<&str> = ids.iter().map(String::as_str).collect();
    items
        .filter(|item| wanted.contains(item.code.trim()))
        .map(|item| (item.code.trim().to_string(), Enrichment::from(item)))
        .collect()
}
