//! TF-IDF text feature extractor

use commentguard_core::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::OnceLock;

/// Sparse feature vector: `(feature index, value)` sorted by index
pub type SparseVector = Vec<(usize, f64)>;

fn token_pattern() -> Result<&'static Regex> {
    static PATTERN: OnceLock<std::result::Result<Regex, regex::Error>> = OnceLock::new();
    // Words of two or more characters.
    PATTERN
        .get_or_init(|| Regex::new(r"\b\w\w+\b"))
        .as_ref()
        .map_err(|e| Error::internal(format!("Failed to compile token pattern: {}", e)))
}

/// Lowercase and split text into word tokens
pub fn tokenize(text: &str) -> Result<Vec<String>> {
    let lowered = text.to_lowercase();
    Ok(token_pattern()?
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect())
}

/// Term-frequency / inverse-document-frequency vectorizer.
///
/// Smoothed idf (`ln((1 + n) / (1 + df)) + 1`), raw term counts, L2
/// normalised rows. The vocabulary keeps the `max_features` most frequent
/// terms across the corpus and is indexed in lexical order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    vocabulary: BTreeMap<String, usize>,
    idf: Vec<f64>,
    max_features: usize,
}

impl TfidfVectorizer {
    /// Fit the vocabulary and idf weights on a corpus
    pub fn fit<S: AsRef<str>>(documents: &[S], max_features: usize) -> Result<Self> {
        if max_features == 0 {
            return Err(Error::config("max_features must be positive"));
        }

        let mut term_counts: HashMap<String, usize> = HashMap::new();
        let mut doc_freq: HashMap<String, usize> = HashMap::new();

        for doc in documents {
            let tokens = tokenize(doc.as_ref())?;
            let mut seen = HashSet::new();
            for token in tokens {
                if seen.insert(token.clone()) {
                    *doc_freq.entry(token.clone()).or_default() += 1;
                }
                *term_counts.entry(token).or_default() += 1;
            }
        }

        if term_counts.is_empty() {
            return Err(Error::training(
                "empty vocabulary; documents contain no word tokens",
            ));
        }

        let mut ranked: Vec<(String, usize)> = term_counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(max_features);

        let mut terms: Vec<String> = ranked.into_iter().map(|(term, _)| term).collect();
        terms.sort();

        let n_docs = documents.len() as f64;
        let mut vocabulary = BTreeMap::new();
        let mut idf = Vec::with_capacity(terms.len());
        for (index, term) in terms.into_iter().enumerate() {
            let df = doc_freq.get(&term).copied().unwrap_or(0) as f64;
            idf.push(((1.0 + n_docs) / (1.0 + df)).ln() + 1.0);
            vocabulary.insert(term, index);
        }

        Ok(Self {
            vocabulary,
            idf,
            max_features,
        })
    }

    /// Transform one document into a normalised sparse vector
    pub fn transform(&self, text: &str) -> Result<SparseVector> {
        let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
        for token in tokenize(text)? {
            if let Some(&index) = self.vocabulary.get(&token) {
                *counts.entry(index).or_default() += 1.0;
            }
        }

        let mut vector: SparseVector = counts
            .into_iter()
            .map(|(index, tf)| (index, tf * self.idf[index]))
            .collect();

        let norm = vector.iter().map(|(_, v)| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, v) in vector.iter_mut() {
                *v /= norm;
            }
        }
        Ok(vector)
    }

    /// Number of features
    pub fn len(&self) -> usize {
        self.idf.len()
    }

    /// Whether the vocabulary is empty
    pub fn is_empty(&self) -> bool {
        self.idf.is_empty()
    }

    /// Feature names ordered by index
    pub fn feature_names(&self) -> Vec<&str> {
        let mut names = vec![""; self.idf.len()];
        for (term, &index) in &self.vocabulary {
            names[index] = term.as_str();
        }
        names
    }

    /// Check internal consistency after deserialising
    pub fn validate(&self) -> Result<()> {
        if self.vocabulary.len() != self.idf.len()
            || self.vocabulary.values().any(|&i| i >= self.idf.len())
        {
            return Err(Error::scorer_unavailable(
                "vectorizer vocabulary and idf weights disagree",
            ));
        }
        Ok(())
    }
}
