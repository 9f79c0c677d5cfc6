use crate::thai::{is_thai, ThaiDictionary, ThaiSegmenter};
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashMap;

/// Bilingual tokenizer: dictionary segmentation for Thai, Snowball stemming
/// for everything else.
pub struct Tokenizer {
    stemmer: Stemmer,
    segmenter: ThaiSegmenter,
}

impl Tokenizer {
    pub fn new() -> Self {
        Self::with_dictionary(ThaiDictionary::builtin())
    }

    pub fn with_dictionary(dict: ThaiDictionary) -> Self {
        Self {
            stemmer: Stemmer::create(Algorithm::English),
            segmenter: ThaiSegmenter::new(dict),
        }
    }

    /// Lowercase, and blank out everything that is not a letter, a digit or
    /// a Thai codepoint (Thai vowel and tone marks are not letters).
    fn clean(&self, text: &str) -> String {
        text.to_lowercase()
            .chars()
            .map(|c| {
                if c.is_alphabetic() || c.is_numeric() || is_thai(c) {
                    c
                } else {
                    ' '
                }
            })
            .collect()
    }

    /// Keep words longer than two characters and stem them
    fn stemmer_filter<'a>(&self, words: impl Iterator<Item = &'a str>) -> Vec<String> {
        words
            .filter(|w| w.chars().count() > 2)
            .map(|w| {
                let stemmed = self.stemmer.stem(w);
                if stemmed.chars().count() > 1 {
                    stemmed.into_owned()
                } else {
                    w.to_string()
                }
            })
            .collect()
    }

    /// Full analysis pipeline
    pub fn analyze(&self, text: &str) -> Vec<String> {
        let cleaned = self.clean(text);

        // Any Thai codepoint routes the whole string through segmentation
        if cleaned.chars().any(is_thai) {
            self.segmenter
                .segment(&cleaned)
                .into_iter()
                .filter(|t| t.chars().count() > 1)
                .collect()
        } else {
            self.stemmer_filter(cleaned.split_whitespace())
        }
    }

    /// Relative term frequencies: occurrences over the total token count
    pub fn term_frequencies(&self, text: &str) -> HashMap<String, f64> {
        let tokens = self.analyze(text);
        relative_frequencies(&tokens)
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn relative_frequencies(tokens: &[String]) -> HashMap<String, f64> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for token in tokens {
        *counts.entry(token.as_str()).or_insert(0) += 1;
    }

    let total = tokens.len() as f64;
    counts
        .into_iter()
        .map(|(term, count)| (term.to_string(), count as f64 / total))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_strips_punctuation() {
        let tokenizer = Tokenizer::new();
        assert_eq!(tokenizer.clean("Hello, World!"), "hello  world ");
        assert_eq!(tokenizer.clean("07-1151"), "07 1151");
    }

    #[test]
    fn test_analyze_english() {
        let tokenizer = Tokenizer::new();
        let tokens = tokenizer.analyze("Drinking Water Filters");
        assert_eq!(tokens, vec!["drink", "water", "filter"]);
    }

    #[test]
    fn test_short_words_dropped() {
        let tokenizer = Tokenizer::new();
        // "07" and "of" are two characters long
        assert_eq!(tokenizer.analyze("07-1151 box of"), vec!["1151", "box"]);
    }

    #[test]
    fn test_empty_input() {
        let tokenizer = Tokenizer::new();
        assert!(tokenizer.analyze("").is_empty());
        assert!(tokenizer.analyze("   \t ").is_empty());
        assert!(tokenizer.analyze("!!! ---").is_empty());
    }

    #[test]
    fn test_thai_segmented() {
        let tokenizer = Tokenizer::new();
        assert_eq!(tokenizer.analyze("แชมพูเด็ก"), vec!["แชมพู", "เด็ก"]);
    }

    #[test]
    fn test_thai_product_names() {
        let tokenizer = Tokenizer::new();
        assert_eq!(
            tokenizer.analyze("ครีมกันแดดสำหรับผิวหน้า"),
            vec!["ครีมกันแดด", "สำหรับ", "ผิวหน้า"]
        );
        assert_eq!(
            tokenizer.analyze("กระติกน้ำร้อนไฟฟ้า 1.8 ลิตร"),
            vec!["กระติกน้ำร้อน", "ไฟฟ้า", "ลิตร"]
        );
    }

    #[test]
    fn test_mixed_text_treated_as_thai() {
        let tokenizer = Tokenizer::new();
        // Latin words are not stemmed on the Thai path
        let tokens = tokenizer.analyze("แชมพู Shampoos 07-1151");
        assert_eq!(tokens, vec!["แชมพู", "shampoos", "07", "1151"]);
    }

    #[test]
    fn test_term_frequencies() {
        let tokenizer = Tokenizer::new();
        let tf = tokenizer.term_frequencies("water water filter");
        assert_eq!(tf.len(), 2);
        assert!((tf["water"] - 2.0 / 3.0).abs() < 1e-12);
        assert!((tf["filter"] - 1.0 / 3.0).abs() < 1e-12);
    }
}
