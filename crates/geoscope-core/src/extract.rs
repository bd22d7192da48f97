//! Mention and sentiment extraction over a single response text.
//!
//! None of these functions fail: malformed or empty input degrades to the
//! documented default (`false`, `None`, `0.0`).

use regex::Regex;
use std::collections::HashSet;

/// Case-insensitive containment of `name` in `text`, both trimmed.
pub fn detect_mention(text: &str, name: &str) -> bool {
    let needle = name.trim().to_lowercase();
    if needle.is_empty() {
        return false;
    }
    text.trim().to_lowercase().contains(&needle)
}

/// Offset of the first mention relative to the text length, in [0, 1),
/// rounded to two decimals.
pub fn mention_offset(text: &str, name: &str) -> Option<f64> {
    let needle = name.trim().to_lowercase();
    if needle.is_empty() || text.is_empty() {
        return None;
    }
    let haystack = text.to_lowercase();
    let byte_idx = haystack.find(&needle)?;
    let char_idx = haystack[..byte_idx].chars().count();
    let len = haystack.chars().count();
    Some(round2(char_idx as f64 / len as f64))
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Opaque polarity scorer. Implementations return a value in [-1, 1] and
/// 0.0 for empty text.
pub trait SentimentScorer: Send + Sync {
    fn score(&self, text: &str) -> f64;
    fn name(&self) -> &'static str;
}

pub struct NeutralSentiment;

impl SentimentScorer for NeutralSentiment {
    fn score(&self, _text: &str) -> f64 {
        0.0
    }

    fn name(&self) -> &'static str {
        "neutral"
    }
}

const POSITIVE: &[&str] = &[
    "best",
    "excellent",
    "great",
    "good",
    "top",
    "trusted",
    "friendly",
    "recommended",
    "affordable",
    "professional",
    "reliable",
    "outstanding",
    "quality",
    "popular",
    "helpful",
];

const NEGATIVE: &[&str] = &[
    "bad",
    "poor",
    "worst",
    "expensive",
    "overpriced",
    "avoid",
    "complaints",
    "rude",
    "unreliable",
    "terrible",
    "slow",
    "closed",
];

/// Word-list polarity: `(positive - negative) / (positive + negative)`.
pub struct KeywordSentiment {
    word: Regex,
    positive: HashSet<String>,
    negative: HashSet<String>,
}

impl KeywordSentiment {
    pub fn new(extra_positive: &[String], extra_negative: &[String]) -> anyhow::Result<Self> {
        let word = Regex::new(r"[\p{L}\p{N}']+")
            .map_err(|e| anyhow::anyhow!("invalid word pattern: {}", e))?;
        let collect = |builtin: &[&str], extra: &[String]| -> HashSet<String> {
            builtin
                .iter()
                .map(|w| w.to_string())
                .chain(extra.iter().map(|w| w.trim().to_lowercase()))
                .filter(|w| !w.is_empty())
                .collect()
        };
        Ok(Self {
            word,
            positive: collect(POSITIVE, extra_positive),
            negative: collect(NEGATIVE, extra_negative),
        })
    }
}

impl SentimentScorer for KeywordSentiment {
    fn score(&self, text: &str) -> f64 {
        let lower = text.to_lowercase();
        let (mut pos, mut neg) = (0u32, 0u32);
        for m in self.word.find_iter(&lower) {
            let w = m.as_str();
            if self.positive.contains(w) {
                pos += 1;
            } else if self.negative.contains(w) {
                neg += 1;
            }
        }
        if pos + neg == 0 {
            return 0.0;
        }
        let raw = (pos as f64 - neg as f64) / (pos + neg) as f64;
        raw.clamp(-1.0, 1.0)
    }

    fn name(&self) -> &'static str {
        "keyword"
    }
}
