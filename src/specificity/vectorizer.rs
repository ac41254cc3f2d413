//! TF-IDF n-gram text representation
//!
//! Text is lower-cased and split into runs of two or more word characters.
//! Stop words are removed before n-grams are formed. Rows are raw term counts
//! weighted by a smoothed IDF and scaled to unit L2 norm.

use crate::config::SpecificityConfig;
use crate::error::TrajectoryError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

static TOKEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\w\w+\b").unwrap());

static STOP_WORDS: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| ENGLISH_STOP_WORDS.iter().copied().collect());

/// English stop words removed before n-gram construction
pub const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "about", "above", "across", "after", "afterwards", "again", "against", "all", "almost",
    "alone", "along", "already", "also", "although", "always", "am", "among", "amongst",
    "amoungst", "amount", "an", "and", "another", "any", "anyhow", "anyone", "anything", "anyway",
    "anywhere", "are", "around", "as", "at", "back", "be", "became", "because", "become",
    "becomes", "becoming", "been", "before", "beforehand", "behind", "being", "below", "beside",
    "besides", "between", "beyond", "bill", "both", "bottom", "but", "by", "call", "can",
    "cannot", "cant", "co", "con", "could", "couldnt", "cry", "de", "describe", "detail", "do",
    "done", "down", "due", "during", "each", "eg", "eight", "either", "eleven", "else",
    "elsewhere", "empty", "enough", "etc", "even", "ever", "every", "everyone", "everything",
    "everywhere", "except", "few", "fifteen", "fifty", "fill", "find", "fire", "first", "five",
    "for", "former", "formerly", "forty", "found", "four", "from", "front", "full", "further",
    "get", "give", "go", "had", "has", "hasnt", "have", "he", "hence", "her", "here",
    "hereafter", "hereby", "herein", "hereupon", "hers", "herself", "him", "himself", "his",
    "how", "however", "hundred", "i", "ie", "if", "in", "inc", "indeed", "interest", "into",
    "is", "it", "its", "itself", "keep", "last", "latter", "latterly", "least", "less", "ltd",
    "made", "many", "may", "me", "meanwhile", "might", "mill", "mine", "more", "moreover",
    "most", "mostly", "move", "much", "must", "my", "myself", "name", "namely", "neither",
    "never", "nevertheless", "next", "nine", "no", "nobody", "none", "noone", "nor", "not",
    "nothing", "now", "nowhere", "of", "off", "often", "on", "once", "one", "only", "onto", "or",
    "other", "others", "otherwise", "our", "ours", "ourselves", "out", "over", "own", "part",
    "per", "perhaps", "please", "put", "rather", "re", "same", "see", "seem", "seemed",
    "seeming", "seems", "serious", "several", "she", "should", "show", "side", "since",
    "sincere", "six", "sixty", "so", "some", "somehow", "someone", "something", "sometime",
    "sometimes", "somewhere", "still", "such", "system", "take", "ten", "than", "that", "the",
    "their", "them", "themselves", "then", "thence", "there", "thereafter", "thereby",
    "therefore", "therein", "thereupon", "these", "they", "thick", "thin", "third", "this",
    "those", "though", "three", "through", "throughout", "thru", "thus", "to", "together", "too",
    "top", "toward", "towards", "twelve", "twenty", "two", "un", "under", "until", "up", "upon",
    "us", "very", "via", "was", "we", "well", "were", "what", "whatever", "when", "whence",
    "whenever", "where", "whereafter", "whereas", "whereby", "wherein", "whereupon", "wherever",
    "whether", "which", "while", "whither", "who", "whoever", "whole", "whom", "whose", "why",
    "will", "with", "within", "without", "would", "yet", "you", "your", "yours", "yourself",
    "yourselves",
];

/// Sparse row: `(feature index, value)` pairs sorted by index
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseVector {
    entries: Vec<(usize, f64)>,
}

impl SparseVector {
    pub fn entries(&self) -> &[(usize, f64)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Dot product with another sparse row
    pub fn dot(&self, other: &SparseVector) -> f64 {
        let (mut i, mut j) = (0, 0);
        let mut sum = 0.0;
        while i < self.entries.len() && j < other.entries.len() {
            let (a_idx, a_val) = self.entries[i];
            let (b_idx, b_val) = other.entries[j];
            match a_idx.cmp(&b_idx) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    sum += a_val * b_val;
                    i += 1;
                    j += 1;
                }
            }
        }
        sum
    }

    /// Dot product with a dense vector
    pub fn dot_dense(&self, dense: &[f64]) -> f64 {
        self.entries
            .iter()
            .filter_map(|&(idx, val)| dense.get(idx).map(|d| d * val))
            .sum()
    }
}

/// Fitted TF-IDF vectorizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    /// Sorted vocabulary; a term's position is its feature index
    terms: Vec<String>,
    /// IDF weight per feature
    idf: Vec<f64>,
    max_ngram: usize,
    remove_stop_words: bool,
}

impl TfidfVectorizer {
    /// Learn vocabulary and IDF weights from training texts
    pub fn fit(texts: &[&str], config: &SpecificityConfig) -> Result<Self, TrajectoryError> {
        let terms_of = |text: &str| analyze(text, config.max_ngram, config.remove_stop_words);

        let mut document_frequency: BTreeMap<String, usize> = BTreeMap::new();
        for &text in texts {
            let mut seen = terms_of(text);
            seen.sort();
            seen.dedup();
            for term in seen {
                *document_frequency.entry(term).or_insert(0) += 1;
            }
        }

        let n_documents = texts.len() as f64;
        let (terms, idf): (Vec<String>, Vec<f64>) = document_frequency
            .into_iter()
            .filter(|(_, df)| *df >= config.min_df)
            .map(|(term, df)| {
                let idf = ((1.0 + n_documents) / (1.0 + df as f64)).ln() + 1.0;
                (term, idf)
            })
            .unzip();

        if terms.is_empty() {
            return Err(TrajectoryError::ModelError(
                "training texts produced an empty vocabulary".to_string(),
            ));
        }

        Ok(Self {
            terms,
            idf,
            max_ngram: config.max_ngram,
            remove_stop_words: config.remove_stop_words,
        })
    }

    /// Check the invariants `transform` relies on: one finite IDF weight per
    /// term and a strictly increasing vocabulary.
    pub fn validate(&self) -> Result<(), TrajectoryError> {
        if self.idf.len() != self.terms.len() {
            return Err(TrajectoryError::ModelError(format!(
                "vectorizer has {} idf weights for {} terms",
                self.idf.len(),
                self.terms.len()
            )));
        }
        if let Some(pair) = self.terms.windows(2).find(|pair| pair[0] >= pair[1]) {
            return Err(TrajectoryError::ModelError(format!(
                "vocabulary is not sorted at '{}'",
                pair[1]
            )));
        }
        if self.idf.iter().any(|w| !w.is_finite()) {
            return Err(TrajectoryError::ModelError(
                "vectorizer has a non-finite idf weight".to_string(),
            ));
        }
        if self.max_ngram == 0 {
            return Err(TrajectoryError::ModelError(
                "vectorizer max_ngram must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Number of features
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Feature index of a term
    pub fn index_of(&self, term: &str) -> Option<usize> {
        self.terms.binary_search_by(|t| t.as_str().cmp(term)).ok()
    }

    /// Vectorize a text; out-of-vocabulary terms are ignored
    pub fn transform(&self, text: &str) -> SparseVector {
        let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
        for term in analyze(text, self.max_ngram, self.remove_stop_words) {
            if let Some(idx) = self.index_of(&term) {
                *counts.entry(idx).or_insert(0.0) += 1.0;
            }
        }

        let mut entries: Vec<(usize, f64)> = counts
            .into_iter()
            .filter_map(|(idx, count)| self.idf.get(idx).map(|w| (idx, count * w)))
            .collect();

        let norm = entries.iter().map(|(_, v)| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, v) in entries.iter_mut() {
                *v /= norm;
            }
        }

        SparseVector { entries }
    }
}

/// Split text into terms: filtered tokens and their n-grams up to `max_ngram`
fn analyze(text: &str, max_ngram: usize, remove_stop_words: bool) -> Vec<String> {
    let lower = text.to_lowercase();
    let tokens: Vec<&str> = TOKEN_PATTERN
        .find_iter(&lower)
        .map(|m| m.as_str())
        .filter(|t| !remove_stop_words || !STOP_WORDS.contains(t))
        .collect();

    let mut terms = Vec::new();
    for n in 1..=max_ngram.max(1) {
        if tokens.len() < n {
            break;
        }
        terms.extend(tokens.windows(n).map(|gram| gram.join(" ")));
    }
    terms
}
