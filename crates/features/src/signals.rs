//! Name signal evaluators.
//!
//! Each predicate compares two mark names that have already gone through
//! `Normalizer::for_marks`. Empty names never match.

use crate::embed::Embedder;
use crate::normalize::Normalizer;
use crate::phonetic::{codes_match, phonetic_key};
use crate::similarity::{partial_ratio, ratio};
use clearmark_model::Thresholds;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, warn};

/// How far a score sits from its threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    /// `High` at or above threshold + margin, `Low` below threshold - margin.
    pub fn band(score: f32, threshold: f32, margin: f32) -> Self {
        if score >= threshold + margin {
            Self::High
        } else if score < threshold - margin {
            Self::Low
        } else {
            Self::Medium
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

/// Case-insensitive, trimmed equality.
pub fn is_exact_match(name1: &str, name2: &str) -> bool {
    let a = name1.trim();
    !a.is_empty() && a.to_lowercase() == name2.trim().to_lowercase()
}

/// Ratio between the lowercased names meets `threshold`.
pub fn is_phonetically_equivalent(name1: &str, name2: &str, threshold: u8) -> bool {
    ratio(&name1.to_lowercase(), &name2.to_lowercase()) >= threshold
}

/// Ratio over the first two words of each name. Both names need two words.
pub fn first_words_phonetically_equivalent(existing: &str, proposed: &str, threshold: u8) -> bool {
    let existing = existing.to_lowercase();
    let proposed = proposed.to_lowercase();
    let existing_words: Vec<&str> = existing.split_whitespace().collect();
    let proposed_words: Vec<&str> = proposed.split_whitespace().collect();

    if existing_words.len() < 2 || proposed_words.len() < 2 {
        return false;
    }
    ratio(&existing_words[..2].join(" "), &proposed_words[..2].join(" ")) >= threshold
}

/// The proposed name starts the existing name.
pub fn is_prefix_match(existing: &str, proposed: &str) -> bool {
    let proposed = proposed.trim().to_lowercase();
    !proposed.is_empty() && existing.trim().to_lowercase().starts_with(&proposed)
}

/// Either name contains the other.
pub fn is_substring_match(name1: &str, name2: &str) -> bool {
    let a = name1.trim().to_lowercase();
    let b = name2.trim().to_lowercase();
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a.contains(&b) || b.contains(&a)
}

/// The names share at least one whitespace token.
pub fn has_shared_word(name1: &str, name2: &str) -> bool {
    let a = name1.to_lowercase();
    let b = name2.to_lowercase();
    let words1: HashSet<&str> = a.split_whitespace().collect();
    b.split_whitespace().any(|w| words1.contains(w))
}

/// Cosine similarity of the two names, or `None` when the embedder fails.
pub fn semantic_score(embedder: &dyn Embedder, name1: &str, name2: &str) -> Option<f32> {
    match embedder.similarity(name1, name2) {
        Ok(score) => {
            debug!(name1, name2, score, model = embedder.model_name(), "Semantic score");
            Some(score)
        }
        Err(e) => {
            warn!(error = %e, name1, name2, "Embedding failed, semantic signal treated as no match");
            None
        }
    }
}

/// One of the five name sub-signals behind the name condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NameSignal {
    ExactMatch,
    SemanticEquivalent,
    PhoneticEquivalent,
    FirstWordsPhonetic,
    PrefixContainment,
}

/// Outcome of the name sub-signals for one pair.
#[derive(Debug, Clone, Serialize)]
pub struct NameSignals {
    pub exact: bool,
    pub semantic: bool,
    /// `None` when the embedding service was unavailable
    pub semantic_score: Option<f32>,
    pub semantic_confidence: Option<Confidence>,
    pub phonetic: bool,
    pub phonetic_score: u8,
    pub phonetic_confidence: Confidence,
    pub first_words: bool,
    pub prefix: bool,
}

impl NameSignals {
    /// Name condition: any sub-signal fired.
    pub fn any(&self) -> bool {
        self.exact || self.semantic || self.phonetic || self.first_words || self.prefix
    }

    /// Sub-signals that fired, in evaluation order.
    pub fn fired(&self) -> Vec<NameSignal> {
        [
            (self.exact, NameSignal::ExactMatch),
            (self.semantic, NameSignal::SemanticEquivalent),
            (self.phonetic, NameSignal::PhoneticEquivalent),
            (self.first_words, NameSignal::FirstWordsPhonetic),
            (self.prefix, NameSignal::PrefixContainment),
        ]
        .into_iter()
        .filter_map(|(fired, signal)| fired.then_some(signal))
        .collect()
    }
}

/// Evaluate the name condition sub-signals for an existing/proposed pair.
pub fn evaluate_name_signals(
    embedder: &dyn Embedder,
    normalizer: &Normalizer,
    existing: &str,
    proposed: &str,
    thresholds: &Thresholds,
) -> NameSignals {
    let existing = normalizer.normalize(existing);
    let proposed = normalizer.normalize(proposed);

    let semantic_score = semantic_score(embedder, &existing, &proposed);
    let semantic = semantic_score.is_some_and(|s| s >= thresholds.semantic_name);
    let semantic_confidence = semantic_score
        .map(|s| Confidence::band(s, thresholds.semantic_name, thresholds.semantic_margin));

    let phonetic_score = ratio(&existing, &proposed);
    debug!(existing = %existing, proposed = %proposed, phonetic_score, "Phonetic ratio");
    let phonetic_confidence = Confidence::band(
        f32::from(phonetic_score),
        f32::from(thresholds.phonetic_name),
        f32::from(thresholds.phonetic_margin),
    );

    NameSignals {
        exact: is_exact_match(&existing, &proposed),
        semantic,
        semantic_score,
        semantic_confidence,
        phonetic: is_phonetically_equivalent(&existing, &proposed, thresholds.phonetic_name),
        phonetic_score,
        phonetic_confidence,
        first_words: first_words_phonetically_equivalent(
            &existing,
            &proposed,
            thresholds.phonetic_name,
        ),
        prefix: is_prefix_match(&existing, &proposed),
    }
}

/// Outcome of the wider OR used for marks outside the proposed classes.
#[derive(Debug, Clone, Serialize)]
pub struct CrossClassSignals {
    pub phonetic_code1: String,
    pub phonetic_code2: String,
    pub phonetic_code_match: bool,
    pub substring: bool,
    pub shared_word: bool,
    /// `None` when the embedding service was unavailable
    pub semantic_score: Option<f32>,
    pub semantic: bool,
    pub ratio: u8,
    pub ratio_match: bool,
    pub partial_ratio: u8,
    pub partial_ratio_match: bool,
}

impl CrossClassSignals {
    pub fn any(&self) -> bool {
        self.phonetic_code_match
            || self.substring
            || self.shared_word
            || self.semantic
            || self.ratio_match
            || self.partial_ratio_match
    }
}

/// Evaluate the six cross-class sub-conditions for an existing/proposed pair.
pub fn evaluate_cross_class_signals(
    embedder: &dyn Embedder,
    normalizer: &Normalizer,
    existing: &str,
    proposed: &str,
    thresholds: &Thresholds,
) -> CrossClassSignals {
    let existing = normalizer.normalize(existing);
    let proposed = normalizer.normalize(proposed);

    let phonetic_code1 = phonetic_key(&existing);
    let phonetic_code2 = phonetic_key(&proposed);
    let phonetic_code_match = codes_match(&phonetic_code1, &phonetic_code2);

    let semantic_score = semantic_score(embedder, &existing, &proposed);
    let ratio_score = ratio(&existing, &proposed);
    let partial_score = partial_ratio(&existing, &proposed);

    CrossClassSignals {
        phonetic_code_match,
        phonetic_code1,
        phonetic_code2,
        substring: is_substring_match(&existing, &proposed),
        shared_word: has_shared_word(&existing, &proposed),
        semantic: semantic_score.is_some_and(|s| s >= thresholds.cross_class_semantic),
        semantic_score,
        ratio_match: ratio_score >= thresholds.cross_class_ratio,
        ratio: ratio_score,
        partial_ratio_match: partial_score >= thresholds.cross_class_partial_ratio,
        partial_ratio: partial_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::{Embedding, EmbeddingError, HashingEmbedder};

    struct FailingEmbedder;

    impl Embedder for FailingEmbedder {
        fn embed(&self, _text: &str) -> Result<Embedding, EmbeddingError> {
            Err(EmbeddingError::Unavailable("offline".into()))
        }

        fn model_name(&self) -> &str {
            "failing"
        }
    }

    #[test]
    fn test_exact_match_symmetric() {
        assert!(is_exact_match(" ColorGrip ", "colorgrip"));
        assert!(is_exact_match("colorgrip", " ColorGrip "));
        assert!(!is_exact_match("", ""));
        assert!(!is_exact_match("acme", "acmme"));
    }

    #[test]
    fn test_substring_symmetric() {
        assert!(is_substring_match("color grip pro", "color grip"));
        assert!(is_substring_match("color grip", "color grip pro"));
        assert!(!is_substring_match("", "color"));
        assert!(!is_substring_match("nike", "adidas"));
    }

    #[test]
    fn test_phonetic_equivalence_symmetric() {
        assert!(is_phonetically_equivalent("Colorgrip", "ColourGrip", 84));
        assert!(is_phonetically_equivalent("ColourGrip", "Colorgrip", 84));
        assert!(!is_phonetically_equivalent("Colorgrip", "Zebra", 84));
    }

    #[test]
    fn test_first_words_requires_two_tokens() {
        assert!(first_words_phonetically_equivalent("blue sky pro", "blue skye max", 84));
        assert!(!first_words_phonetically_equivalent("bluesky", "blue sky", 84));
    }

    #[test]
    fn test_prefix_match() {
        assert!(is_prefix_match("colorgrip pro", "colorgrip"));
        assert!(!is_prefix_match("colorgrip", "colorgrip pro"));
        assert!(!is_prefix_match("colorgrip", "  "));
    }

    #[test]
    fn test_shared_word() {
        assert!(has_shared_word("blue sky", "sky high"));
        assert!(!has_shared_word("blue sky", "red sea"));
        assert!(!has_shared_word("", ""));
    }

    #[test]
    fn test_name_signals_identical() {
        let signals = evaluate_name_signals(
            &HashingEmbedder::default(),
            &Normalizer::for_marks(),
            "ColorGrip",
            "Colorgrip",
            &Thresholds::default(),
        );
        assert!(signals.any());
        assert_eq!(
            signals.fired(),
            vec![
                NameSignal::ExactMatch,
                NameSignal::SemanticEquivalent,
                NameSignal::PhoneticEquivalent,
                NameSignal::PrefixContainment,
            ]
        );
        assert_eq!(signals.phonetic_confidence, Confidence::High);
    }

    #[test]
    fn test_name_signals_embedder_down() {
        let signals = evaluate_name_signals(
            &FailingEmbedder,
            &Normalizer::for_marks(),
            "ColorGrip",
            "Colorgrip",
            &Thresholds::default(),
        );
        assert!(!signals.semantic);
        assert_eq!(signals.semantic_score, None);
        assert!(signals.exact);
    }

    #[test]
    fn test_cross_class_identical_names() {
        let signals = evaluate_cross_class_signals(
            &HashingEmbedder::default(),
            &Normalizer::for_marks(),
            "ColorGrip",
            "Colorgrip",
            &Thresholds::default(),
        );
        assert!(signals.phonetic_code_match);
        assert!(signals.substring);
        assert_eq!(signals.ratio, 100);
        assert!(signals.any());
    }

    #[test]
    fn test_cross_class_unrelated_names() {
        let signals = evaluate_cross_class_signals(
            &FailingEmbedder,
            &Normalizer::for_marks(),
            "Zebra",
            "Colorgrip",
            &Thresholds::default(),
        );
        assert!(!signals.any());
    }

    #[test]
    fn test_confidence_band() {
        assert_eq!(Confidence::band(0.95, 0.84, 0.05), Confidence::High);
        assert_eq!(Confidence::band(0.84, 0.84, 0.05), Confidence::Medium);
        assert_eq!(Confidence::band(0.5, 0.84, 0.05), Confidence::Low);
    }
}
