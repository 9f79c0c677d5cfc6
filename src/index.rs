use crate::document::{clean_image_ref, CatalogItem, Document};
use crate::tokenizer::{relative_frequencies, Tokenizer};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// In-memory corpus: documents by product code plus the corpus-wide IDF table.
///
/// A `CorpusIndex` is immutable once built; the engine publishes a new one
/// on every rebuild instead of mutating the current one.
#[derive(Debug, Clone, Default)]
pub struct CorpusIndex {
    documents: HashMap<String, Document>,
    idf: HashMap<String, f64>,
    total_docs: usize,
}

/// Outcome of building a corpus from catalog rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub indexed: usize,
    /// Rows without a code or a name
    pub skipped: usize,
    /// Rows whose code was seen earlier in the same load; the later row wins
    pub duplicates: usize,
}

impl CorpusIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a corpus from catalog rows
    pub fn build(items: Vec<CatalogItem>, tokenizer: &Tokenizer) -> (Self, BuildReport) {
        let mut report = BuildReport::default();

        let mut rows: HashMap<String, CatalogItem> = HashMap::with_capacity(items.len());
        for item in items {
            if !item.is_indexable() {
                report.skipped += 1;
                continue;
            }
            let code = item.code.trim().to_string();
            if rows.insert(code, item).is_some() {
                report.duplicates += 1;
            }
        }

        let mut documents = HashMap::with_capacity(rows.len());
        let mut doc_frequency: HashMap<String, usize> = HashMap::new();

        for (id, item) in rows {
            let name = item.name.trim().to_string();
            let searchable_text = Document::compose_text(&name, &id);
            let tokens = tokenizer.analyze(&searchable_text);
            let term_frequency = relative_frequencies(&tokens);

            for term in term_frequency.keys() {
                *doc_frequency.entry(term.clone()).or_insert(0) += 1;
            }

            let image_ref = item.image_url.as_deref().and_then(clean_image_ref);
            documents.insert(
                id.clone(),
                Document {
                    id,
                    name,
                    searchable_text,
                    image_ref,
                    term_frequency,
                },
            );
        }

        let total_docs = documents.len();
        let idf = doc_frequency
            .into_iter()
            .map(|(term, df)| (term, (total_docs as f64 / df as f64).ln()))
            .collect();

        report.indexed = total_docs;
        (
            Self {
                documents,
                idf,
                total_docs,
            },
            report,
        )
    }

    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.documents.values()
    }

    pub fn get(&self, id: &str) -> Option<&Document> {
        self.documents.get(id)
    }

    /// Inverse document frequency of a term; `None` outside the vocabulary
    pub fn idf(&self, term: &str) -> Option<f64> {
        self.idf.get(term).copied()
    }

    pub fn total_documents(&self) -> usize {
        self.total_docs
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            total_documents: self.total_docs,
            total_terms: self.idf.len(),
            generation: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub total_documents: usize,
    pub total_terms: usize,
    /// Number of rebuilds published so far
    pub generation: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Vec<CatalogItem> {
        vec![
            CatalogItem::new("07-1151", "Baby Shampoo Pink"),
            CatalogItem::new("ABC-100", "Water Bottle"),
            CatalogItem::new("XYZ-200", "Drinking Water Filter"),
        ]
    }

    #[test]
    fn test_build_counts_and_idf() {
        let tokenizer = Tokenizer::new();
        let (index, report) = CorpusIndex::build(catalog(), &tokenizer);

        assert_eq!(report.indexed, 3);
        assert_eq!(index.total_documents(), 3);

        // "water" appears in two of three documents
        let idf = index.idf("water").unwrap();
        assert!((idf - (3.0f64 / 2.0).ln()).abs() < 1e-12);
        // "shampoo" appears once
        let idf = index.idf("shampoo").unwrap();
        assert!((idf - 3.0f64.ln()).abs() < 1e-12);
        assert_eq!(index.idf("unseen"), None);
    }

    #[test]
    fn test_term_frequency_over_document_tokens() {
        let tokenizer = Tokenizer::new();
        let (index, _) = CorpusIndex::build(catalog(), &tokenizer);

        let doc = index.get("ABC-100").unwrap();
        assert_eq!(doc.searchable_text, "Water Bottle ABC-100");
        // water, bottl, abc, 100
        assert_eq!(doc.term_frequency.len(), 4);
        assert!((doc.term_frequency["water"] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_malformed_rows_skipped() {
        let tokenizer = Tokenizer::new();
        let mut items = catalog();
        items.push(CatalogItem::new("NO-NAME", ""));
        items.push(CatalogItem::new("ABC-100", "Water Bottle Large"));

        let (index, report) = CorpusIndex::build(items, &tokenizer);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.duplicates, 1);
        assert_eq!(index.total_documents(), 3);
        assert_eq!(index.get("ABC-100").unwrap().name, "Water Bottle Large");
        assert!(index.get("NO-NAME").is_none());
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let tokenizer = Tokenizer::new();
        let (a, _) = CorpusIndex::build(catalog(), &tokenizer);
        let (b, _) = CorpusIndex::build(catalog(), &tokenizer);

        assert_eq!(a.idf, b.idf);
        for doc in a.documents() {
            assert_eq!(Some(doc), b.get(&doc.id));
        }
    }

    #[test]
    fn test_empty_corpus() {
        let tokenizer = Tokenizer::new();
        let (index, report) = CorpusIndex::build(Vec::new(), &tokenizer);
        assert!(index.is_empty());
        assert_eq!(report, BuildReport::default());
        assert_eq!(index.stats().total_terms, 0);
    }

    #[test]
    fn test_image_reference_cleaned() {
        let tokenizer = Tokenizer::new();
        let items = vec![
            CatalogItem::new("A-1", "Cup").with_image("[\"a.jpg\"]"),
            CatalogItem::new("A-2", "Mug").with_image("N/A"),
        ];
        let (index, _) = CorpusIndex::build(items, &tokenizer);
        assert_eq!(index.get("A-1").unwrap().image_ref.as_deref(), Some("a.jpg"));
        assert!(!index.get("A-2").unwrap().has_image());
    }
}
