// src/detect.rs
//! Firm detection: maps a raw text blob to zero-or-one firm identities
//! using alias/keyword matching with deterministic tie-breaking.
//!
//! Matching is exact substring on token boundaries only. Stemming and
//! typo tolerance are an explicit extension point, not a silent behavior.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use regex::Regex;

use crate::registry::{Firm, FirmRegistry};

/// Keywords that indicate quantitative-finance content. These raise a
/// match's confidence and feed relevance scoring; they are never alone
/// sufficient to attribute a firm.
pub const QUANT_KEYWORDS: &[&str] = &[
    "quantitative",
    "quant",
    "trader",
    "trading",
    "systematic",
    "algorithmic",
    "market maker",
    "portfolio manager",
    "derivatives",
    "machine learning",
    "data science",
    "stochastic calculus",
    "time series",
    "high frequency",
    "hft",
    "low latency",
    "options",
    "futures",
    "volatility",
    "arbitrage",
    "alpha",
    "financial engineering",
    "computational finance",
    "econometrics",
];

/// Job role phrases that mark a posting as relevant on their own,
/// independent of keyword density.
pub const QUANT_JOB_ROLES: &[&str] = &[
    "quantitative researcher",
    "quant researcher",
    "quantitative trader",
    "quant trader",
    "trader",
    "quantitative developer",
    "quant developer",
    "quant dev",
    "quantitative analyst",
    "quant analyst",
    "research scientist",
    "research engineer",
    "data scientist",
    "ml engineer",
    "machine learning",
    "trading systems",
    "systematic trader",
    "portfolio manager",
    "portfolio analyst",
    "risk analyst",
    "risk manager",
    "derivatives analyst",
    "derivatives trader",
    "market maker",
];

/// A successful firm attribution with its supporting evidence.
#[derive(Debug, Clone, PartialEq)]
pub struct FirmMatch {
    pub firm: Firm,
    /// The canonical name or alias that matched (most specific wins).
    pub matched_term: String,
    /// Quant-keyword co-occurrences in the same text; confidence only.
    pub keyword_hits: usize,
}

/// Pure, side-effect-free detector over a read-only registry snapshot.
#[derive(Debug, Clone)]
pub struct FirmDetector {
    registry: Arc<FirmRegistry>,
}

/// Lower-case and strip punctuation down to space-separated tokens,
/// padded with one leading and trailing space so token-boundary matching
/// is a plain substring test.
fn normalize_tokens(text: &str) -> String {
    static RE_NON_WORD: OnceCell<Regex> = OnceCell::new();
    let re = RE_NON_WORD.get_or_init(|| Regex::new(r"[^\p{L}\p{N}]+").unwrap());
    let lowered = text.to_lowercase();
    let collapsed = re.replace_all(&lowered, " ");
    format!(" {} ", collapsed.trim())
}

fn contains_term(padded: &str, term: &str) -> bool {
    let needle = normalize_tokens(term);
    !needle.trim().is_empty() && padded.contains(&needle)
}

impl FirmDetector {
    pub fn new(registry: Arc<FirmRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &FirmRegistry {
        &self.registry
    }

    /// Attribute a text blob to at most one firm.
    ///
    /// Tie-break policy: the longest matched alias wins (most specific);
    /// among equal lengths, the first firm in registry iteration order.
    /// Returns `None` rather than guessing when no firm-name token is
    /// present -- unattributed items are retained downstream, because
    /// relevance is independent of firm attribution.
    pub fn detect(&self, text: &str) -> Option<FirmMatch> {
        let padded = normalize_tokens(text);

        let mut best: Option<(usize, Firm, String)> = None;
        for firm in self.registry.all() {
            for term in firm.match_terms() {
                if !contains_term(&padded, term) {
                    continue;
                }
                let specificity = normalize_tokens(term).trim().chars().count();
                let better = match &best {
                    None => true,
                    // Strictly greater keeps the earlier firm on ties.
                    Some((len, _, _)) => specificity > *len,
                };
                if better {
                    best = Some((specificity, firm.clone(), term.to_string()));
                }
            }
        }

        best.map(|(_, firm, matched_term)| FirmMatch {
            firm,
            matched_term,
            keyword_hits: self.keyword_hits(text),
        })
    }

    /// Count distinct quant keywords present in the text. Keywords match
    /// as plain substrings so inflected forms ("quants", "traders") still
    /// count; token boundaries apply to firm names only.
    pub fn keyword_hits(&self, text: &str) -> usize {
        let haystack = normalize_tokens(text);
        QUANT_KEYWORDS
            .iter()
            .filter(|kw| haystack.contains(*kw))
            .count()
    }

    /// Whether the text clears a keyword-count relevance threshold.
    pub fn is_quant_related(&self, text: &str, threshold: usize) -> bool {
        self.keyword_hits(text) >= threshold
    }

    /// Whether a job posting is worth keeping: an explicit role phrase
    /// matches, or general keyword density clears a higher bar.
    pub fn is_relevant_job(&self, title: &str, description: &str) -> bool {
        let combined = format!("{title} {description}");
        let haystack = normalize_tokens(&combined);
        if QUANT_JOB_ROLES.iter().any(|role| haystack.contains(*role)) {
            return true;
        }
        self.keyword_hits(&combined) >= 3
    }

    /// Score relevance on a 0-10 scale: a firm mention is worth 5 points,
    /// keyword density up to 5 more.
    pub fn relevance_score(&self, title: &str, body: &str) -> u8 {
        let combined = format!("{title} {body}");
        let mut score = 0usize;
        if self.detect(&combined).is_some() {
            score += 5;
        }
        score += self.keyword_hits(&combined).min(5);
        score.min(10) as u8
    }
}

/// Detect whether an event text asks attendees to register.
pub fn requires_registration(text: &str) -> bool {
    const REGISTRATION_KEYWORDS: &[&str] = &[
        "register",
        "registration",
        "rsvp",
        "sign up",
        "signup",
        "reserve",
        "reservation",
    ];
    let padded = normalize_tokens(text);
    REGISTRATION_KEYWORDS
        .iter()
        .any(|kw| contains_term(&padded, kw))
}
