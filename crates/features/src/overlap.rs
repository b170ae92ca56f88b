//! Class and goods/services overlap evaluators.

use crate::embed::Embedder;
use crate::normalize::Normalizer;
use crate::signals::semantic_score;
use clearmark_model::ClassSet;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};

/// Overlapping Nice classes, ascending.
pub fn class_overlap(classes1: &ClassSet, classes2: &ClassSet) -> Vec<u16> {
    classes1.intersection(classes2).copied().collect()
}

/// True when the class sets intersect.
pub fn classes_overlap(classes1: &ClassSet, classes2: &ClassSet) -> bool {
    !classes1.is_disjoint(classes2)
}

/// Result of the goods/services overlap evaluator.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GoodsOverlap {
    pub overlaps: bool,
    /// `None` when either side was empty or the embedder failed
    pub semantic_score: Option<f32>,
    /// Lemmas present in both descriptions
    pub shared_lemmas: Vec<String>,
}

/// Goods/services overlap: semantic similarity at or above `threshold`,
/// otherwise any shared lemma after normalization.
///
/// Empty or whitespace-only descriptions never overlap.
pub fn goods_services_overlap(
    embedder: &dyn Embedder,
    normalizer: &Normalizer,
    existing: &str,
    proposed: &str,
    threshold: f32,
) -> GoodsOverlap {
    let existing = normalizer.normalize(existing);
    let proposed = normalizer.normalize(proposed);

    if existing.is_empty() || proposed.is_empty() {
        return GoodsOverlap::default();
    }

    let semantic_score = semantic_score(embedder, &existing, &proposed);

    let existing_lemmas: BTreeSet<String> = existing.split_whitespace().map(lemmatize).collect();
    let proposed_lemmas: BTreeSet<String> = proposed.split_whitespace().map(lemmatize).collect();
    let shared_lemmas: Vec<String> = existing_lemmas
        .intersection(&proposed_lemmas)
        .cloned()
        .collect();

    let overlaps =
        semantic_score.is_some_and(|s| s >= threshold) || !shared_lemmas.is_empty();

    GoodsOverlap {
        overlaps,
        semantic_score,
        shared_lemmas,
    }
}

/// Fold a word to its singular noun form.
///
/// Suffix rules only: `-sses` -> `-ss`, `-xes`/`-ches`/`-shes` drop `-es`,
/// `-ies` -> `-y`, and a trailing `-s` is dropped unless the word ends in
/// `-ss`, `-us` or `-is`.
pub fn lemmatize(word: &str) -> String {
    let w = word.to_lowercase();
    let len = w.chars().count();

    if w.ends_with("sses") {
        return w[..w.len() - 2].to_string();
    }
    if ["xes", "ches", "shes"].iter().any(|s| w.ends_with(s)) {
        return w[..w.len() - 2].to_string();
    }
    if len > 4 && w.ends_with("ies") {
        return format!("{}y", &w[..w.len() - 3]);
    }
    if len > 3 && w.ends_with('s') && !["ss", "us", "is"].iter().any(|s| w.ends_with(s)) {
        return w[..w.len() - 1].to_string();
    }
    w
}

const KEYWORD_STOPWORDS: &[&str] = &["and", "or", "the", "a", "an", "in", "on", "for", "of", "to", "with"];

fn keywords(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty() && !KEYWORD_STOPWORDS.contains(w))
        .map(str::to_string)
        .collect()
}

/// Shared keywords divided by the size of the smaller keyword set.
///
/// `None` when either side has no keywords.
pub fn keyword_overlap_ratio(existing: &str, proposed: &str) -> Option<f32> {
    let existing = keywords(existing);
    let proposed = keywords(proposed);
    if existing.is_empty() || proposed.is_empty() {
        return None;
    }

    let shared = existing.intersection(&proposed).count();
    Some(shared as f32 / existing.len().min(proposed.len()) as f32)
}

/// Cheap lexical relevance test used to pre-filter candidates.
pub fn is_relevant_goods(existing: &str, proposed: &str, threshold: f32) -> bool {
    let existing_lower = existing.trim().to_lowercase();
    let proposed_lower = proposed.trim().to_lowercase();

    if existing_lower == proposed_lower {
        return true;
    }
    if !existing_lower.is_empty()
        && !proposed_lower.is_empty()
        && (existing_lower.contains(&proposed_lower) || proposed_lower.contains(&existing_lower))
    {
        return true;
    }

    keyword_overlap_ratio(&existing_lower, &proposed_lower).is_some_and(|r| r > threshold)
}
