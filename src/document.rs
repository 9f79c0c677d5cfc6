use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// One row of the product catalog as supplied by a catalog provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    #[serde(default, alias = "id", deserialize_with = "null_as_empty")]
    pub code: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default, alias = "img_url")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default, alias = "quantity")]
    pub balance_qty: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub supplier_code: Option<String>,
}

impl CatalogItem {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    /// Rows without a code or a name cannot be indexed
    pub fn is_indexable(&self) -> bool {
        !self.code.trim().is_empty() && !self.name.trim().is_empty()
    }
}

/// Exports write missing text columns as `null`; such rows are kept and
/// later skipped as not indexable.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Normalize an image reference from the catalog.
///
/// Catalog exports sometimes store the field as a JSON array literal
/// (`["https://..."]`, `[]`) or as the placeholder `N/A`.
pub fn clean_image_ref(raw: &str) -> Option<String> {
    let cleaned = raw
        .trim()
        .replace("[\"", "")
        .replace("\"]", "")
        .replace("[]", "");
    let cleaned = cleaned.trim();

    if cleaned.is_empty() || cleaned.eq_ignore_ascii_case("n/a") {
        None
    } else {
        Some(cleaned.to_string())
    }
}

/// An indexed product
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub id: String,
    pub name: String,
    /// Text the term frequencies were computed from (name + code)
    pub searchable_text: String,
    pub image_ref: Option<String>,
    pub term_frequency: HashMap<String, f64>,
}

impl Document {
    pub fn compose_text(name: &str, id: &str) -> String {
        format!("{} {}", name, id)
    }

    pub fn has_image(&self) -> bool {
        self.image_ref.is_some()
    }
}
