//! Canonical text forms used before any comparison.

use std::collections::{HashMap, HashSet};

/// Category nouns and filler words dropped from goods/services text.
pub const GOODS_STOPWORDS: &[&str] = &[
    "class", "care", "in", "and", "the", "for", "with", "from", "to", "under", "using", "of",
    "no", "include", "ex", "example", "classes", "search", "scope", "shower", "products",
];

/// Domain terms folded to their category form in goods/services text.
pub const GOODS_SYNONYMS: &[(&str, &str)] = &[("shampoos", "hair")];

/// Text normalizer.
///
/// Lowercases, folds dash variants to `-`, replaces other punctuation with
/// spaces, optionally drops standalone digit runs, applies synonyms,
/// removes stopwords and collapses whitespace. `normalize` is idempotent as
/// long as no synonym maps onto a stopword or onto another synonym key.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    stopwords: HashSet<String>,
    synonyms: HashMap<String, String>,
    strip_numbers: bool,
}

impl Normalizer {
    pub fn new<'a>(
        stopwords: impl IntoIterator<Item = &'a str>,
        synonyms: impl IntoIterator<Item = (&'a str, &'a str)>,
        strip_numbers: bool,
    ) -> Self {
        Self {
            stopwords: stopwords.into_iter().map(str::to_lowercase).collect(),
            synonyms: synonyms
                .into_iter()
                .map(|(from, to)| (from.to_lowercase(), to.to_lowercase()))
                .collect(),
            strip_numbers,
        }
    }

    /// Normalizer for mark names: no stopwords, numbers kept.
    pub fn for_marks() -> Self {
        Self::default()
    }

    /// Normalizer for goods/services descriptions.
    pub fn for_goods() -> Self {
        Self::new(
            GOODS_STOPWORDS.iter().copied(),
            GOODS_SYNONYMS.iter().copied(),
            true,
        )
    }

    pub fn normalize(&self, text: &str) -> String {
        let mut cleaned = String::with_capacity(text.len());
        for c in text.chars() {
            if is_dash(c) {
                cleaned.push('-');
                continue;
            }
            for lower in c.to_lowercase() {
                if lower.is_alphanumeric() || lower == '_' || lower == '-' {
                    cleaned.push(lower);
                } else {
                    cleaned.push(' ');
                }
            }
        }

        cleaned
            .split_whitespace()
            .filter_map(|token| {
                if self.strip_numbers {
                    strip_digit_runs(token)
                } else {
                    Some(token.to_string())
                }
            })
            .map(|token| self.synonyms.get(&token).cloned().unwrap_or(token))
            .filter(|token| !self.stopwords.contains(token))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Normalized whitespace tokens.
    pub fn tokens(&self, text: &str) -> Vec<String> {
        self.normalize(text)
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }
}

/// Remove digit runs bounded by hyphens or token edges, keeping the
/// hyphens: `25-t-shirts` becomes `-t-shirts`. `None` when nothing but
/// hyphens is left.
fn strip_digit_runs(token: &str) -> Option<String> {
    let stripped = token
        .split('-')
        .map(|part| {
            if !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()) {
                ""
            } else {
                part
            }
        })
        .collect::<Vec<_>>()
        .join("-");

    stripped.chars().any(|c| c != '-').then_some(stripped)
}

/// En/em dashes, the minus sign and other hyphen-like glyphs.
fn is_dash(c: char) -> bool {
    matches!(
        c,
        '\u{2010}'..='\u{2015}' | '\u{2212}' | '\u{FE58}' | '\u{FE63}' | '\u{FF0D}'
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_mark_normalization() {
        let n = Normalizer::for_marks();
        assert_eq!(n.normalize("  Color\u{2014}Grip!  Pro. "), "color-grip pro");
        assert_eq!(n.normalize("ACME, Inc."), "acme inc");
        assert_eq!(n.normalize("Forever 21"), "forever 21");
    }

    #[test]
    fn test_goods_normalization() {
        let n = Normalizer::for_goods();
        assert_eq!(
            n.normalize("Class 3: Shampoos and hair care products, for use in the shower"),
            "hair hair use"
        );
        assert_eq!(n.normalize("Permanent HAIR color"), "permanent hair color");
    }

    #[test]
    fn test_numeric_tokens_removed_for_goods() {
        let n = Normalizer::for_goods();
        assert_eq!(n.normalize("25 t-shirts 2024"), "t-shirts");
    }

    #[test]
    fn test_hyphen_joined_numbers_removed_for_goods() {
        let n = Normalizer::for_goods();
        assert_eq!(n.normalize("25-t-shirts"), "-t-shirts");
        assert_eq!(n.normalize("size-12 caps 3-4"), "size- caps");
        assert_eq!(n.normalize("mp3 players"), "mp3 players");
        assert_eq!(Normalizer::for_marks().normalize("Route-66"), "route-66");
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "Class 3 \u{2013} Shampoos, conditioners & SHOWER gels",
            "  Color\u{2212}Grip\u{2122} ",
            "İstanbul café_bar",
            "25-t-shirts, size-12 caps",
            "",
            "   ",
        ];
        for normalizer in [Normalizer::for_marks(), Normalizer::for_goods()] {
            for input in inputs {
                let once = normalizer.normalize(input);
                assert_eq!(normalizer.normalize(&once), once, "input: {input:?}");
            }
        }
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(Normalizer::for_goods().normalize(" \t\n"), "");
        assert!(Normalizer::for_goods().tokens("").is_empty());
    }
}
