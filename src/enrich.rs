//! Post-ranking enrichment of a result page with price, stock and image data.
//!
//! Enrichment runs after the page is cut, in one batched lookup, so it can
//! never change rank order or pagination.

use crate::engine::SearchResult;
use crate::error::CatalogError;
use serde::Serialize;
use std::collections::HashMap;

/// Metadata attached to a ranked result
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Enrichment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(rename = "balance_qty", skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplier_code: Option<String>,
    #[serde(rename = "img_url", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Batch lookup of enrichment data by product code
pub trait MetadataProvider: Send + Sync {
    fn fetch(&self, ids: &[String]) -> Result<HashMap<String, Enrichment>, CatalogError>;
}

/// A ranked result with whatever metadata was found for it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedResult {
    #[serde(flatten)]
    pub result: SearchResult,
    #[serde(flatten)]
    pub enrichment: Enrichment,
}

/// Attach metadata to a page, keeping its order. A failed lookup leaves the
/// rows bare rather than failing the search.
pub fn enrich_page(page: Vec<SearchResult>, provider: &dyn MetadataProvider) -> Vec<EnrichedResult> {
    if page.is_empty() {
        return Vec::new();
    }

    let ids: Vec<String> = page.iter().map(|r| r.id.clone()).collect();
    let mut metadata = match provider.fetch(&ids) {
        Ok(metadata) => metadata,
        Err(e) => {
            tracing::warn!(error = %e, rows = ids.len(), "Failed to fetch result metadata");
            HashMap::new()
        }
    };

    page.into_iter()
        .map(|result| {
            let enrichment = metadata.remove(&result.id).unwrap_or_default();
            EnrichedResult { result, enrichment }
        })
        .collect()
}
