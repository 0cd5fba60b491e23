//! Word-list toxicity scorer

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};
use async_trait::async_trait;
use commentguard_core::{Error, Result};
use std::collections::HashSet;

use crate::scorer::Scorer;

const DEFAULT_TERMS: &[&str] = &[
    "hate", "stupid", "idiot", "dumb", "kill", "die", "worst", "terrible", "awful", "sucks",
    "garbage", "trash", "shit", "fuck", "damn", "hell", "asshole", "bastard", "bitch", "loser",
    "moron",
];

/// Toxicity scorer driven by a fixed word list.
///
/// Each distinct matched term adds `weight` to the score, capped at `ceiling`
/// so that a lexicon match never claims full certainty.
pub struct LexiconScorer {
    name: String,
    matcher: AhoCorasick,
    weight: f32,
    ceiling: f32,
}

impl LexiconScorer {
    /// Create a scorer with the built-in word list
    pub fn new() -> Result<Self> {
        Self::with_terms(DEFAULT_TERMS.iter().copied())
    }

    /// Create a scorer with a custom word list
    pub fn with_terms<I, S>(terms: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let terms: Vec<String> = terms
            .into_iter()
            .map(|t| t.as_ref().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();

        let matcher = AhoCorasickBuilder::new()
            .ascii_case_insensitive(true)
            .match_kind(MatchKind::LeftmostLongest)
            .build(&terms)
            .map_err(|e| Error::scorer_unavailable(format!("invalid lexicon: {}", e)))?;

        Ok(Self {
            name: "lexicon".to_string(),
            matcher,
            weight: 0.35,
            ceiling: 0.95,
        })
    }

    fn score_text(&self, text: &str) -> f32 {
        let lowered = text.to_lowercase();
        let distinct: HashSet<usize> = self
            .matcher
            .find_iter(&lowered)
            .filter(|m| is_whole_word(&lowered, m.start(), m.end()))
            .map(|m| m.pattern().as_usize())
            .collect();

        (distinct.len() as f32 * self.weight).clamp(0.0, self.ceiling)
    }
}

/// True when the match is not flanked by word characters
fn is_whole_word(text: &str, start: usize, end: usize) -> bool {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.is_some_and(is_word) && !after.is_some_and(is_word)
}

#[async_trait]
impl Scorer for LexiconScorer {
    async fn score(&self, texts: &[String]) -> Result<Vec<f32>> {
        Ok(texts.iter().map(|t| self.score_text(t)).collect())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
