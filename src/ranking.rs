use crate::document::Document;
use crate::index::CorpusIndex;
use crate::tokenizer::relative_frequencies;
use std::collections::{BTreeMap, HashMap};

/// Sparse term-weight vector, ordered by term so sums are reproducible
pub type TermVector = BTreeMap<String, f64>;

/// TF-IDF weights of a document. Terms outside the corpus vocabulary are
/// left out rather than stored as zero.
pub fn tfidf_vector(doc: &Document, index: &CorpusIndex) -> TermVector {
    weigh(&doc.term_frequency, index)
}

/// TF-IDF weights of a tokenized query, using the corpus IDF table
pub fn query_vector(tokens: &[String], index: &CorpusIndex) -> TermVector {
    if tokens.is_empty() {
        return TermVector::new();
    }
    weigh(&relative_frequencies(tokens), index)
}

fn weigh(term_frequency: &HashMap<String, f64>, index: &CorpusIndex) -> TermVector {
    term_frequency
        .iter()
        .filter_map(|(term, tf)| index.idf(term).map(|idf| (term.clone(), tf * idf)))
        .collect()
}

/// Cosine of the angle between two vectors; 0 when either has zero norm
pub fn cosine_similarity(a: &TermVector, b: &TermVector) -> f64 {
    // Iterate the smaller vector for the dot product
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let dot: f64 = small
        .iter()
        .filter_map(|(term, x)| large.get(term).map(|y| x * y))
        .sum();

    let norm_a = a.values().map(|v| v * v).sum::<f64>().sqrt();
    let norm_b = b.values().map(|v| v * v).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    // Rounding can push identical vectors a hair above 1
    (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
}

/// Document paired with its similarity to a query
#[derive(Debug, Clone)]
pub struct ScoredDocument<'a> {
    pub doc: &'a Document,
    pub score: f64,
}

/// Score every document against the query vector, keep those above
/// `threshold`, most similar first (code ascending on equal scores).
pub fn rank_documents<'a>(
    query: &TermVector,
    index: &'a CorpusIndex,
    threshold: f64,
) -> Vec<ScoredDocument<'a>> {
    if query.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<ScoredDocument<'a>> = index
        .documents()
        .filter_map(|doc| {
            let score = cosine_similarity(query, &tfidf_vector(doc, index));
            (score > threshold).then_some(ScoredDocument { doc, score })
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.doc.id.cmp(&b.doc.id))
    });

    scored
}
