//! Dictionary-based Thai word segmentation.
//!
//! Thai is written without spaces between words, so a cleaned Thai string is
//! cut into words by dynamic programming over grapheme clusters: the chosen
//! segmentation leaves the fewest graphemes outside the dictionary and, among
//! those, uses the fewest pieces. Runs of unknown graphemes are kept together
//! as a single segment.

use std::collections::HashSet;
use std::path::Path;
use unicode_segmentation::UnicodeSegmentation;

const BUILTIN_WORDS: &str = include_str!("../data/thai_words.txt");

lazy_static::lazy_static! {
    static ref BUILTIN: ThaiDictionary = ThaiDictionary::parse(BUILTIN_WORDS);
}

/// Thai script block, U+0E00..=U+0E7F
pub fn is_thai(c: char) -> bool {
    ('\u{0E00}'..='\u{0E7F}').contains(&c)
}

/// Word list used by the segmenter
#[derive(Debug, Clone, Default)]
pub struct ThaiDictionary {
    words: HashSet<String>,
    /// Longest entry, in grapheme clusters
    max_len: usize,
}

impl ThaiDictionary {
    /// The lexicon compiled into the binary
    pub fn builtin() -> Self {
        BUILTIN.clone()
    }

    /// Parse a newline-separated word list; `#` starts a comment line.
    pub fn parse(text: &str) -> Self {
        let mut dict = Self::default();
        dict.extend(
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#')),
        );
        dict
    }

    /// Read an additional word list from disk
    pub fn load_file<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::parse(&text))
    }

    pub fn extend<I, S>(&mut self, words: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for word in words {
            let word = word.as_ref().to_lowercase();
            if word.is_empty() {
                continue;
            }
            self.max_len = self.max_len.max(word.graphemes(true).count());
            self.words.insert(word);
        }
    }

    pub fn merge(mut self, other: &ThaiDictionary) -> Self {
        self.extend(other.words.iter());
        self
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(word)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Word(usize),
    Unknown,
}

/// Splits cleaned text into words
#[derive(Debug, Clone)]
pub struct ThaiSegmenter {
    dict: ThaiDictionary,
}

impl ThaiSegmenter {
    pub fn new(dict: ThaiDictionary) -> Self {
        Self { dict }
    }

    /// Segment whitespace-separated text. Thai runs go through the dictionary;
    /// any other run (digits, Latin letters) is emitted as one segment.
    pub fn segment(&self, text: &str) -> Vec<String> {
        let mut segments = Vec::new();

        for chunk in text.split_whitespace() {
            let mut run_start = 0;
            let mut run_thai: Option<bool> = None;

            for (pos, c) in chunk.char_indices() {
                let thai = is_thai(c);
                match run_thai {
                    Some(prev) if prev != thai => {
                        self.push_run(&chunk[run_start..pos], prev, &mut segments);
                        run_start = pos;
                    }
                    _ => {}
                }
                run_thai = Some(thai);
            }

            if let Some(thai) = run_thai {
                self.push_run(&chunk[run_start..], thai, &mut segments);
            }
        }

        segments
    }

    fn push_run(&self, run: &str, thai: bool, out: &mut Vec<String>) {
        if thai {
            out.extend(self.segment_thai(run));
        } else {
            out.push(run.to_string());
        }
    }

    fn segment_thai(&self, run: &str) -> Vec<String> {
        let mut bounds: Vec<usize> = run.grapheme_indices(true).map(|(i, _)| i).collect();
        let n = bounds.len();
        bounds.push(run.len());

        // best[i] = (unknown graphemes, pieces) for the suffix starting at i
        let mut best = vec![(0usize, 0usize); n + 1];
        let mut step = vec![Step::Unknown; n];

        for i in (0..n).rev() {
            let mut choice = (best[i + 1].0 + 1, best[i + 1].1 + 1);
            let mut chosen = Step::Unknown;

            let longest = (i + self.dict.max_len).min(n);
            for j in (i + 1..=longest).rev() {
                if !self.dict.contains(&run[bounds[i]..bounds[j]]) {
                    continue;
                }
                let cand = (best[j].0, best[j].1 + 1);
                if cand < choice || (matches!(chosen, Step::Unknown) && cand == choice) {
                    choice = cand;
                    chosen = Step::Word(j);
                }
            }

            best[i] = choice;
            step[i] = chosen;
        }

        let mut words = Vec::new();
        let mut unknown_start: Option<usize> = None;
        let mut i = 0;
        while i < n {
            match step[i] {
                Step::Word(j) => {
                    if let Some(start) = unknown_start.take() {
                        words.push(run[bounds[start]..bounds[i]].to_string());
                    }
                    words.push(run[bounds[i]..bounds[j]].to_string());
                    i = j;
                }
                Step::Unknown => {
                    unknown_start.get_or_insert(i);
                    i += 1;
                }
            }
        }
        if let Some(start) = unknown_start {
            words.push(run[bounds[start]..].to_string());
        }

        words
    }
}

impl Default for ThaiSegmenter {
    fn default() -> Self {
        Self::new(ThaiDictionary::builtin())
    }
}
