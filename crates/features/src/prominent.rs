//! Prominent (legally distinctive) element selection and matching.
//!
//! Two selection strategies sit behind `ProminentElementStrategy`: one asks
//! an oracle, the other applies a fixed token heuristic. The resolver tries
//! the oracle first and falls back to the heuristic whenever the oracle is
//! missing, fails, or answers with nothing.

use crate::phonetic::{codes_match, phonetic_key};
use crate::similarity::ratio;
use clearmark_model::FallbackStrategy;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors from the prominent-element oracle.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("Oracle unavailable: {0}")]
    Unavailable(String),

    #[error("Oracle has no answer for mark: {0}")]
    NoAnswer(String),

    #[error("Malformed oracle response: {0}")]
    Malformed(String),
}

/// An external service that names the distinctive element of a mark.
pub trait ProminentElementOracle: Send + Sync {
    /// Raw answer text for `mark`.
    fn prominent_element(&self, mark: &str) -> Result<String, OracleError>;
}

/// A way of choosing the prominent element of a mark.
pub trait ProminentElementStrategy: Send + Sync {
    /// The chosen element, lowercase, or `None` when this strategy has no answer.
    fn select(&self, mark: &str) -> Option<String>;
}

/// Deterministic token heuristic.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicStrategy {
    pub fallback: FallbackStrategy,
}

impl HeuristicStrategy {
    pub fn new(fallback: FallbackStrategy) -> Self {
        Self { fallback }
    }
}

impl ProminentElementStrategy for HeuristicStrategy {
    fn select(&self, mark: &str) -> Option<String> {
        let tokens: Vec<&str> = mark
            .split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .filter(|t| !t.is_empty())
            .collect();

        let chosen = match self.fallback {
            FallbackStrategy::First => tokens.first().copied(),
            FallbackStrategy::Last => tokens.last().copied(),
            FallbackStrategy::Longest => tokens
                .iter()
                .copied()
                .fold(None, |best: Option<&str>, t| match best {
                    Some(b) if b.chars().count() >= t.chars().count() => Some(b),
                    _ => Some(t),
                }),
        };

        Some(chosen.unwrap_or(mark).to_lowercase())
    }
}

/// Oracle-backed strategy. Keeps the first line of the answer, trimmed,
/// unquoted and lowercased.
#[derive(Clone)]
pub struct OracleStrategy {
    oracle: Arc<dyn ProminentElementOracle>,
}

impl OracleStrategy {
    pub fn new(oracle: Arc<dyn ProminentElementOracle>) -> Self {
        Self { oracle }
    }
}

impl ProminentElementStrategy for OracleStrategy {
    fn select(&self, mark: &str) -> Option<String> {
        match self.oracle.prominent_element(mark) {
            Ok(answer) => {
                let cleaned = clean_answer(&answer);
                (!cleaned.is_empty()).then_some(cleaned)
            }
            Err(e) => {
                warn!(error = %e, mark, "Prominent-element oracle failed, using heuristic");
                None
            }
        }
    }
}

/// First line of an oracle answer, trimmed, quotes stripped, lowercase.
pub fn clean_answer(answer: &str) -> String {
    answer
        .trim()
        .lines()
        .next()
        .unwrap_or("")
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
        .to_lowercase()
}

/// Where a prominent element came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementSource {
    Oracle,
    Heuristic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProminentElement {
    pub element: String,
    pub source: ElementSource,
}

/// Picks the prominent element of a mark: oracle first, heuristic second.
#[derive(Clone, Default)]
pub struct ProminentElementResolver {
    oracle: Option<OracleStrategy>,
    heuristic: HeuristicStrategy,
}

impl ProminentElementResolver {
    /// Heuristic only.
    pub fn heuristic(fallback: FallbackStrategy) -> Self {
        Self {
            oracle: None,
            heuristic: HeuristicStrategy::new(fallback),
        }
    }

    pub fn with_oracle(mut self, oracle: Arc<dyn ProminentElementOracle>) -> Self {
        self.oracle = Some(OracleStrategy::new(oracle));
        self
    }

    pub fn resolve(&self, mark: &str) -> ProminentElement {
        if let Some(element) = self.oracle.as_ref().and_then(|o| o.select(mark)) {
            return ProminentElement {
                element,
                source: ElementSource::Oracle,
            };
        }

        ProminentElement {
            element: self.heuristic.select(mark).unwrap_or_default(),
            source: ElementSource::Heuristic,
        }
    }
}

/// Outcome of comparing the prominent elements of two marks.
#[derive(Debug, Clone, Serialize)]
pub struct ProminentMatch {
    pub is_match: bool,
    pub element1: String,
    pub element2: String,
    pub phonetic_code1: String,
    pub phonetic_code2: String,
    /// Non-empty codes are identical
    pub exact_match: bool,
    /// Ratio between the codes (raw elements when a code is empty)
    pub fuzzy_score: u8,
    pub threshold: u8,
    /// Both elements were chosen by the oracle
    pub used_oracle: bool,
}

/// Compare the Metaphone codes of the prominent elements of two marks.
pub fn prominent_phonetic_match(
    resolver: &ProminentElementResolver,
    name1: &str,
    name2: &str,
    threshold: u8,
) -> ProminentMatch {
    let first = resolver.resolve(name1);
    let second = resolver.resolve(name2);

    let phonetic_code1 = phonetic_key(&first.element);
    let phonetic_code2 = phonetic_key(&second.element);

    let exact_match = codes_match(&phonetic_code1, &phonetic_code2);
    let lhs = if phonetic_code1.is_empty() { &first.element } else { &phonetic_code1 };
    let rhs = if phonetic_code2.is_empty() { &second.element } else { &phonetic_code2 };
    let fuzzy_score = ratio(lhs, rhs);

    debug!(
        element1 = %first.element,
        element2 = %second.element,
        code1 = %phonetic_code1,
        code2 = %phonetic_code2,
        fuzzy_score,
        "Prominent element comparison"
    );

    ProminentMatch {
        is_match: exact_match || fuzzy_score >= threshold,
        used_oracle: first.source == ElementSource::Oracle
            && second.source == ElementSource::Oracle,
        element1: first.element,
        element2: second.element,
        phonetic_code1,
        phonetic_code2,
        exact_match,
        fuzzy_score,
        threshold,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    struct FixedOracle(HashMap<&'static str, &'static str>);

    impl ProminentElementOracle for FixedOracle {
        fn prominent_element(&self, mark: &str) -> Result<String, OracleError> {
            self.0
                .get(mark)
                .map(|s| s.to_string())
                .ok_or_else(|| OracleError::NoAnswer(mark.to_string()))
        }
    }

    struct DownOracle;

    impl ProminentElementOracle for DownOracle {
        fn prominent_element(&self, _mark: &str) -> Result<String, OracleError> {
            Err(OracleError::Unavailable("connection refused".into()))
        }
    }

    #[test]
    fn test_heuristic_strategies() {
        let mark = "The Great Colorgrip Co";
        let select = |s| HeuristicStrategy::new(s).select(mark).unwrap();
        assert_eq!(select(FallbackStrategy::Last), "co");
        assert_eq!(select(FallbackStrategy::First), "the");
        assert_eq!(select(FallbackStrategy::Longest), "colorgrip");
    }

    #[test]
    fn test_heuristic_longest_keeps_first_tie() {
        let strategy = HeuristicStrategy::new(FallbackStrategy::Longest);
        assert_eq!(strategy.select("blue moon").unwrap(), "blue");
    }

    #[test]
    fn test_heuristic_without_tokens() {
        let strategy = HeuristicStrategy::default();
        assert_eq!(strategy.select("!!!").unwrap(), "!!!");
    }

    #[test]
    fn test_clean_answer() {
        assert_eq!(clean_answer("  \"GRIP\"\nBecause it is arbitrary"), "grip");
        assert_eq!(clean_answer(""), "");
    }

    #[test]
    fn test_resolver_prefers_oracle() {
        let oracle = FixedOracle(HashMap::from([("Color Grip Pro", "\"Grip\"")]));
        let resolver =
            ProminentElementResolver::heuristic(FallbackStrategy::Last).with_oracle(Arc::new(oracle));

        let element = resolver.resolve("Color Grip Pro");
        assert_eq!(element.element, "grip");
        assert_eq!(element.source, ElementSource::Oracle);

        let fallback = resolver.resolve("Blue Moon");
        assert_eq!(fallback.element, "moon");
        assert_eq!(fallback.source, ElementSource::Heuristic);
    }

    #[test]
    fn test_resolver_with_failing_oracle() {
        let resolver =
            ProminentElementResolver::heuristic(FallbackStrategy::Last).with_oracle(Arc::new(DownOracle));
        let result = prominent_phonetic_match(&resolver, "Acme Smith", "Acme Smyth", 90);
        assert!(result.is_match);
        assert!(result.exact_match);
        assert!(!result.used_oracle);
        assert_eq!(result.element1, "smith");
        assert_eq!(result.element2, "smyth");
    }

    #[test]
    fn test_prominent_match_with_oracle() {
        let oracle = FixedOracle(HashMap::from([
            ("Color Grip Pro", "grip"),
            ("Grip Master", "grip"),
        ]));
        let resolver =
            ProminentElementResolver::heuristic(FallbackStrategy::Last).with_oracle(Arc::new(oracle));
        let result = prominent_phonetic_match(&resolver, "Color Grip Pro", "Grip Master", 90);
        assert!(result.is_match);
        assert!(result.used_oracle);
        assert_eq!(result.fuzzy_score, 100);
    }

    #[test]
    fn test_prominent_no_match() {
        let resolver = ProminentElementResolver::heuristic(FallbackStrategy::Last);
        let result = prominent_phonetic_match(&resolver, "Blue Zebra", "Red Colorgrip", 90);
        assert!(!result.is_match);
        assert!(!result.exact_match);
        assert!(result.fuzzy_score < 90);
    }
}
