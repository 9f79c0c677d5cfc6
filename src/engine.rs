use crate::catalog::CatalogSource;
use crate::error::SearchError;
use crate::index::{BuildReport, CorpusIndex, IndexStats};
use crate::ranking::{query_vector, rank_documents};
use crate::tokenizer::Tokenizer;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Score given to every code match
pub const CODE_MATCH_SCORE: f64 = 1.0;
/// Score given to every name match
pub const NAME_MATCH_SCORE: f64 = 0.8;
/// Vector matches at or below this similarity are dropped
pub const MIN_SIMILARITY: f64 = 0.01;
/// Results of one tier whose scores are this close prefer the one with an image
pub const IMAGE_TIE_WINDOW: f64 = 0.1;

pub const DEFAULT_CANDIDATE_MULTIPLIER: usize = 2;
/// Largest page a caller may request
pub const DEFAULT_MAX_PAGE: usize = 100;

/// Match class of a result; lower tiers outrank higher ones
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(into = "u8")]
pub enum Tier {
    /// Code contains the query
    Code = 1,
    /// Name contains the query
    Name = 2,
    /// TF-IDF cosine similarity
    Vector = 3,
}

impl From<Tier> for u8 {
    fn from(tier: Tier) -> u8 {
        tier as u8
    }
}

/// One ranked hit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub id: String,
    pub name: String,
    #[serde(rename = "similarity_score")]
    pub score: f64,
    #[serde(rename = "search_priority")]
    pub tier: Tier,
    pub has_image: bool,
}

impl SearchResult {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        score: f64,
        tier: Tier,
        has_image: bool,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            score,
            tier,
            has_image,
        }
    }
}

/// A page of results
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResponse {
    pub page: Vec<SearchResult>,
    /// Size of the merged result set before pagination
    pub total_count: usize,
    pub query: String,
    pub duration_ms: f64,
}

impl SearchResponse {
    fn empty(query: &str, started: Instant) -> Self {
        Self {
            page: Vec::new(),
            total_count: 0,
            query: query.to_string(),
            duration_ms: elapsed_ms(started),
        }
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

/// Three-tier product search over an in-memory corpus.
///
/// Searches read a snapshot of the current corpus; a rebuild constructs a
/// complete new corpus and publishes it with a single pointer swap, so a
/// reader never sees a partially built index.
pub struct SearchEngine {
    source: Arc<dyn CatalogSource>,
    tokenizer: Tokenizer,
    index: RwLock<Arc<CorpusIndex>>,
    /// Serializes rebuilds so concurrent callers load the catalog once
    rebuild_lock: Mutex<()>,
    generation: AtomicU64,
    /// Per-tier candidate cap, `None` when uncapped
    tier_cap: Option<usize>,
}

impl SearchEngine {
    pub fn new(source: Arc<dyn CatalogSource>) -> Self {
        Self {
            source,
            tokenizer: Tokenizer::new(),
            index: RwLock::new(Arc::new(CorpusIndex::new())),
            rebuild_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
            tier_cap: tier_cap(DEFAULT_CANDIDATE_MULTIPLIER, DEFAULT_MAX_PAGE),
        }
    }

    pub fn with_tokenizer(mut self, tokenizer: Tokenizer) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    /// Cap each tier at `multiplier × max_page` candidates; a multiplier of
    /// 0 disables the cap. The cap never depends on the requested page, so
    /// every page of a query is cut from the same merged list.
    pub fn with_candidate_cap(mut self, multiplier: usize, max_page: usize) -> Self {
        self.tier_cap = tier_cap(multiplier, max_page);
        self
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    /// Reload the catalog and replace the corpus
    pub fn rebuild(&self) -> Result<BuildReport, SearchError> {
        let _guard = self.rebuild_lock.lock();
        self.rebuild_locked()
    }

    fn rebuild_locked(&self) -> Result<BuildReport, SearchError> {
        let started = Instant::now();
        let items = self.source.load()?;
        let rows = items.len();

        let (index, report) = CorpusIndex::build(items, &self.tokenizer);
        let terms = index.stats().total_terms;

        *self.index.write() = Arc::new(index);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        if report.skipped > 0 {
            tracing::warn!(skipped = report.skipped, "Skipped catalog rows without code or name");
        }
        tracing::info!(
            generation,
            rows,
            documents = report.indexed,
            terms,
            duplicates = report.duplicates,
            duration_ms = elapsed_ms(started),
            "Rebuilt search index"
        );

        Ok(report)
    }

    pub fn is_empty(&self) -> bool {
        self.index.read().is_empty()
    }

    /// The currently published corpus
    pub fn snapshot(&self) -> Arc<CorpusIndex> {
        self.index.read().clone()
    }

    fn ensure_loaded(&self) -> Result<Arc<CorpusIndex>, SearchError> {
        let snapshot = self.snapshot();
        if !snapshot.is_empty() {
            return Ok(snapshot);
        }

        let _guard = self.rebuild_lock.lock();
        // Another caller may have finished a rebuild while we waited
        let snapshot = self.snapshot();
        if !snapshot.is_empty() {
            return Ok(snapshot);
        }

        self.rebuild_locked()?;
        Ok(self.snapshot())
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            generation: self.generation.load(Ordering::SeqCst),
            ..self.snapshot().stats()
        }
    }

    fn candidate_cap(&self) -> usize {
        self.tier_cap.unwrap_or(usize::MAX)
    }

    /// Search the catalog. Builds the index first if it has never been
    /// loaded; that load is the only way this can fail.
    pub fn search(
        &self,
        query: &str,
        limit: usize,
        offset: usize,
    ) -> Result<SearchResponse, SearchError> {
        let started = Instant::now();
        let index = self.ensure_loaded()?;

        let tokens = self.tokenizer.analyze(query);
        if tokens.is_empty() {
            return Ok(SearchResponse::empty(query, started));
        }

        let needle = query.trim().to_lowercase();
        let cap = self.candidate_cap();

        let code = code_matches(&index, &needle, cap);
        let name = name_matches(&index, &needle, cap);
        let vector = vector_matches(&index, &tokens, cap);
        tracing::debug!(
            query,
            code = code.len(),
            name = name.len(),
            vector = vector.len(),
            "Tier candidates"
        );

        let mut merged = merge_tiers([code, name, vector]);
        sort_results(&mut merged);

        let total_count = merged.len();
        let page = if offset >= total_count {
            Vec::new()
        } else {
            merged.into_iter().skip(offset).take(limit).collect()
        };

        Ok(SearchResponse {
            page,
            total_count,
            query: query.to_string(),
            duration_ms: elapsed_ms(started),
        })
    }
}

fn tier_cap(multiplier: usize, max_page: usize) -> Option<usize> {
    (multiplier > 0).then(|| multiplier.saturating_mul(max_page))
}

/// Tier 1: codes containing the query; exact codes first, then by code
fn code_matches(index: &CorpusIndex, needle: &str, cap: usize) -> Vec<SearchResult> {
    let mut hits: Vec<(bool, SearchResult)> = index
        .documents()
        .filter_map(|doc| {
            let code = doc.id.to_lowercase();
            code.contains(needle).then(|| {
                let result = SearchResult::new(
                    doc.id.clone(),
                    doc.name.clone(),
                    CODE_MATCH_SCORE,
                    Tier::Code,
                    doc.has_image(),
                );
                (code == needle, result)
            })
        })
        .collect();

    hits.sort_by(|(a_exact, a), (b_exact, b)| b_exact.cmp(a_exact).then_with(|| a.id.cmp(&b.id)));
    hits.into_iter().take(cap).map(|(_, r)| r).collect()
}

/// Tier 2: names containing the query; exact names first, then by name
fn name_matches(index: &CorpusIndex, needle: &str, cap: usize) -> Vec<SearchResult> {
    let mut hits: Vec<(bool, SearchResult)> = index
        .documents()
        .filter_map(|doc| {
            let name = doc.name.to_lowercase();
            name.contains(needle).then(|| {
                let result = SearchResult::new(
                    doc.id.clone(),
                    doc.name.clone(),
                    NAME_MATCH_SCORE,
                    Tier::Name,
                    doc.has_image(),
                );
                (name == needle, result)
            })
        })
        .collect();

    hits.sort_by(|(a_exact, a), (b_exact, b)| {
        b_exact
            .cmp(a_exact)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.id.cmp(&b.id))
    });
    hits.into_iter().take(cap).map(|(_, r)| r).collect()
}

/// Tier 3: cosine similarity of TF-IDF vectors, most similar first
fn vector_matches(index: &CorpusIndex, tokens: &[String], cap: usize) -> Vec<SearchResult> {
    let query = query_vector(tokens, index);
    rank_documents(&query, index, MIN_SIMILARITY)
        .into_iter()
        .take(cap)
        .map(|scored| {
            SearchResult::new(
                scored.doc.id.clone(),
                scored.doc.name.clone(),
                scored.score,
                Tier::Vector,
                scored.doc.has_image(),
            )
        })
        .collect()
}

/// Concatenate ranked lists in priority order, keeping only the first
/// occurrence of each id. A product matched by several lists keeps the
/// tier and score of the earliest one.
pub fn merge_tiers<I>(tiers: I) -> Vec<SearchResult>
where
    I: IntoIterator<Item = Vec<SearchResult>>,
{
    let mut seen = HashSet::new();
    let mut merged = Vec::new();

    for tier in tiers {
        for result in tier {
            if seen.insert(result.id.clone()) {
                merged.push(result);
            }
        }
    }

    merged
}

/// Order merged results: tier ascending, then score descending, except that
/// within a band of scores less than [`IMAGE_TIE_WINDOW`] below the band's
/// top score, results with an image come first. Remaining ties keep their
/// incoming order, which is each tier's own ordering.
///
/// The last tie-break is each tier's own order, not the id: tier 2 lists
/// exact names first and then sorts by name.
pub fn sort_results(results: &mut Vec<SearchResult>) {
    results.sort_by(|a, b| a.tier.cmp(&b.tier).then_with(|| b.score.total_cmp(&a.score)));

    let mut band = 0usize;
    let mut leader: Option<(Tier, f64)> = None;
    let mut keyed: Vec<(usize, SearchResult)> = Vec::with_capacity(results.len());

    for result in results.drain(..) {
        match leader {
            Some((tier, top)) if tier == result.tier && top - result.score < IMAGE_TIE_WINDOW => {}
            Some(_) => {
                band += 1;
                leader = Some((result.tier, result.score));
            }
            None => leader = Some((result.tier, result.score)),
        }
        keyed.push((band, result));
    }

    // Stable: score order and tier order survive inside each band
    keyed.sort_by_key(|(band, result)| (*band, !result.has_image));
    results.extend(keyed.into_iter().map(|(_, result)| result));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryCatalog;
    use crate::document::CatalogItem;
    use crate::error::CatalogError;

    fn engine(items: Vec<CatalogItem>) -> SearchEngine {
        SearchEngine::new(Arc::new(MemoryCatalog::new(items)))
    }

    fn scenario() -> SearchEngine {
        engine(vec![
            CatalogItem::new("07-1151", "Baby Shampoo Pink"),
            CatalogItem::new("ABC-100", "Water Bottle"),
            CatalogItem::new("XYZ-200", "Drinking Water Filter"),
        ])
    }

    fn ids(response: &SearchResponse) -> Vec<&str> {
        response.page.iter().map(|r| r.id.as_str()).collect()
    }

    struct Unreachable;

    impl CatalogSource for Unreachable {
        fn load(&self) -> Result<Vec<CatalogItem>, CatalogError> {
            Err(CatalogError::Unavailable("connection refused".into()))
        }
    }

    #[test]
    fn test_code_match() {
        let engine = scenario();
        let response = engine.search("07-1151", 10, 0).unwrap();

        assert_eq!(response.total_count, 1);
        assert_eq!(ids(&response), vec!["07-1151"]);
        assert_eq!(response.page[0].tier, Tier::Code);
        assert_eq!(response.page[0].score, 1.0);
    }

    #[test]
    fn test_name_match_alphabetical() {
        let engine = scenario();
        let response = engine.search("water", 10, 0).unwrap();

        assert_eq!(response.total_count, 2);
        assert_eq!(ids(&response), vec!["XYZ-200", "ABC-100"]);
        assert!(response.page.iter().all(|r| r.tier == Tier::Name && r.score == 0.8));
    }

    #[test]
    fn test_substring_needle_is_trimmed() {
        let engine = scenario();
        let padded = engine.search("  Water \t", 10, 0).unwrap();
        let plain = engine.search("water", 10, 0).unwrap();

        assert_eq!(padded.page, plain.page);
        assert_eq!(padded.total_count, 2);

        let response = engine.search(" 07-1151 ", 10, 0).unwrap();
        assert_eq!(ids(&response), vec!["07-1151"]);
        assert_eq!(response.page[0].tier, Tier::Code);
    }

    #[test]
    fn test_no_match() {
        let engine = scenario();
        let response = engine.search("nonexistentterm", 10, 0).unwrap();
        assert_eq!(response.total_count, 0);
        assert!(response.page.is_empty());
    }

    #[test]
    fn test_vector_tier() {
        let engine = scenario();
        // no code or name contains the whole phrase
        let response = engine.search("filter for drinking", 10, 0).unwrap();

        assert_eq!(ids(&response), vec!["XYZ-200"]);
        assert_eq!(response.page[0].tier, Tier::Vector);
        assert!(response.page[0].score > MIN_SIMILARITY && response.page[0].score <= 1.0);
    }

    #[test]
    fn test_exact_code_first() {
        let engine = engine(vec![
            CatalogItem::new("AB-10", "Tape"),
            CatalogItem::new("AB-100", "Glue"),
            CatalogItem::new("AA-AB-100", "Glue Stick"),
        ]);
        let response = engine.search("ab-100", 10, 0).unwrap();
        assert_eq!(ids(&response), vec!["AB-100", "AA-AB-100"]);
    }

    #[test]
    fn test_exact_name_first() {
        let engine = engine(vec![
            CatalogItem::new("P-1", "Baby Soap Bar"),
            CatalogItem::new("P-2", "baby soap"),
            CatalogItem::new("P-3", "Antibacterial Baby Soap"),
        ]);
        let response = engine.search("Baby Soap", 10, 0).unwrap();
        assert_eq!(&ids(&response)[..3], &["P-2", "P-3", "P-1"]);
    }

    #[test]
    fn test_priority_preserved_across_tiers() {
        let engine = engine(vec![
            CatalogItem::new("MILK-01", "Fresh Milk"),
            CatalogItem::new("C-2", "Milk Powder"),
            CatalogItem::new("C-3", "Chocolate Drink"),
        ]);
        let response = engine.search("milk", 10, 0).unwrap();

        // MILK-01 matches code, name and vector tiers; it keeps tier 1
        assert_eq!(response.page[0].id, "MILK-01");
        assert_eq!(response.page[0].tier, Tier::Code);
        assert_eq!(response.page[0].score, CODE_MATCH_SCORE);
        assert_eq!(response.page[1].id, "C-2");
        assert_eq!(response.page[1].tier, Tier::Name);
        assert_eq!(response.total_count, 2);
    }

    #[test]
    fn test_image_breaks_close_scores() {
        let engine = engine(vec![
            CatalogItem::new("B-1", "Water Bottle"),
            CatalogItem::new("B-2", "Water Jug").with_image("jug.jpg"),
        ]);
        let response = engine.search("water", 10, 0).unwrap();
        assert_eq!(ids(&response), vec!["B-2", "B-1"]);
        assert!(response.page[0].has_image);
    }

    #[test]
    fn test_vacuous_query() {
        let engine = scenario();
        for query in ["", "   ", "!?", "07"] {
            let response = engine.search(query, 10, 0).unwrap();
            assert_eq!(response.total_count, 0, "query {:?}", query);
            assert!(response.page.is_empty());
        }
    }

    #[test]
    fn test_offset_past_end() {
        let engine = scenario();
        let response = engine.search("water", 10, 2).unwrap();
        assert_eq!(response.total_count, 2);
        assert!(response.page.is_empty());

        let response = engine.search("water", 10, 50).unwrap();
        assert!(response.page.is_empty());
    }

    #[test]
    fn test_zero_limit() {
        let engine = scenario();
        let response = engine.search("water", 0, 0).unwrap();
        assert!(response.page.is_empty());
        assert_eq!(response.total_count, 2);
    }

    #[test]
    fn test_search_triggers_rebuild() {
        let engine = scenario();
        assert!(engine.is_empty());
        engine.search("water", 10, 0).unwrap();
        assert!(!engine.is_empty());
        assert_eq!(engine.stats().generation, 1);

        // loaded index is reused
        engine.search("bottle", 10, 0).unwrap();
        assert_eq!(engine.stats().generation, 1);
    }

    #[test]
    fn test_index_load_error_propagates() {
        let engine = SearchEngine::new(Arc::new(Unreachable));
        let err = engine.search("water", 10, 0).unwrap_err();
        assert!(matches!(err, SearchError::IndexLoad(CatalogError::Unavailable(_))));
        assert!(engine.rebuild().is_err());
    }

    #[test]
    fn test_empty_catalog_is_not_an_error() {
        let engine = engine(Vec::new());
        let response = engine.search("water", 10, 0).unwrap();
        assert_eq!(response.total_count, 0);
    }

    #[test]
    fn test_rebuild_replaces_corpus() {
        let catalog = Arc::new(MemoryCatalog::new(vec![CatalogItem::new("A-1", "Water Bottle")]));
        let engine = SearchEngine::new(catalog.clone());
        engine.rebuild().unwrap();

        catalog.replace(vec![CatalogItem::new("B-1", "Coffee Mug")]);
        // still serving the old snapshot
        assert_eq!(engine.search("water", 10, 0).unwrap().total_count, 1);

        engine.rebuild().unwrap();
        assert_eq!(engine.search("water", 10, 0).unwrap().total_count, 0);
        assert_eq!(engine.search("mug", 10, 0).unwrap().page[0].id, "B-1");
        assert_eq!(engine.stats().generation, 2);
    }

    #[test]
    fn test_candidate_cap() {
        let items: Vec<CatalogItem> = (0..10)
            .map(|i| CatalogItem::new(format!("W-{:02}", i), "Water Bottle"))
            .collect();
        let default = engine(items.clone());
        assert_eq!(
            default.candidate_cap(),
            DEFAULT_CANDIDATE_MULTIPLIER * DEFAULT_MAX_PAGE
        );

        let capped = engine(items.clone()).with_candidate_cap(2, 2);
        assert_eq!(capped.candidate_cap(), 4);
        for offset in 0..6 {
            assert_eq!(capped.search("water", 1, offset).unwrap().total_count, 4);
        }

        let uncapped = engine(items).with_candidate_cap(0, 2);
        assert_eq!(uncapped.candidate_cap(), usize::MAX);
        assert_eq!(uncapped.search("water", 3, 0).unwrap().total_count, 10);
    }

    #[test]
    fn test_merge_tiers_dedups_by_priority() {
        let first = vec![SearchResult::new("A", "a", 1.0, Tier::Code, false)];
        let second = vec![
            SearchResult::new("B", "b", 0.8, Tier::Name, false),
            SearchResult::new("A", "a", 0.8, Tier::Name, false),
        ];
        let third = vec![SearchResult::new("B", "b", 0.5, Tier::Vector, true)];

        let merged = merge_tiers([first, second, third]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].tier, Tier::Code);
        assert_eq!(merged[1].tier, Tier::Name);
        assert!(!merged[1].has_image);
    }

    #[test]
    fn test_sort_results_bands() {
        let mut results = vec![
            SearchResult::new("V-1", "v1", 0.55, Tier::Vector, false),
            SearchResult::new("V-2", "v2", 0.50, Tier::Vector, true),
            SearchResult::new("V-3", "v3", 0.30, Tier::Vector, true),
            SearchResult::new("N-1", "n1", 0.8, Tier::Name, false),
        ];
        sort_results(&mut results);

        let order: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        // V-2 is within 0.1 of V-1 and has an image; V-3 is too far below
        assert_eq!(order, vec!["N-1", "V-2", "V-1", "V-3"]);
    }

    #[test]
    fn test_concurrent_search_during_rebuild() {
        let engine = scenario();
        engine.rebuild().unwrap();

        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..50 {
                        let response = engine.search("water", 10, 0).unwrap();
                        assert_eq!(response.total_count, 2);
                    }
                });
            }
            s.spawn(|| {
                for _ in 0..10 {
                    engine.rebuild().unwrap();
                }
            });
        });

        assert_eq!(engine.stats().generation, 11);
    }
}
