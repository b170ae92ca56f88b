//! Goods/services overlap verdicts returned by the oracle.

use crate::parse::{lenient_bool, parse_oracle_json, text_or_empty};
use clearmark_model::CandidateMark;
use serde::Deserialize;
use std::collections::HashSet;
use tracing::warn;

#[derive(Debug, Deserialize)]
struct OverlapVerdicts {
    #[serde(default)]
    results: Vec<OverlapVerdict>,
}

#[derive(Debug, Deserialize)]
struct OverlapVerdict {
    #[serde(default, deserialize_with = "text_or_empty")]
    mark: String,
    #[serde(default, deserialize_with = "lenient_bool")]
    overlap: bool,
}

/// Keep the candidates the oracle confirmed as overlapping.
///
/// Names are matched trimmed and case-insensitively. Unreadable oracle text
/// keeps every candidate.
pub fn filter_by_overlap<'a>(candidates: &'a [CandidateMark], oracle_text: &str) -> Vec<&'a CandidateMark> {
    let verdicts: OverlapVerdicts = match parse_oracle_json(oracle_text) {
        Ok(verdicts) => verdicts,
        Err(e) => {
            warn!(error = %e, "Overlap verdicts unreadable, keeping all candidates");
            return candidates.iter().collect();
        }
    };

    let overlapping: HashSet<String> = verdicts
        .results
        .into_iter()
        .filter(|v| v.overlap)
        .map(|v| v.mark.to_lowercase())
        .collect();

    candidates
        .iter()
        .filter(|c| overlapping.contains(&c.name.trim().to_lowercase()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn names<'a>(marks: &[&'a CandidateMark]) -> Vec<&'a str> {
        marks.iter().map(|m| m.name.as_str()).collect()
    }

    #[test]
    fn test_filter_by_overlap() {
        let candidates = vec![
            CandidateMark::new("ColorGrip"),
            CandidateMark::new("Zebra Stripe"),
            CandidateMark::new("Hue Hold"),
        ];
        let text = r#"{"results": [
            {"mark": "colorgrip", "overlap": true},
            {"mark": "Zebra Stripe", "overlap": false},
            {"mark": "Hue Hold", "overlap": "yes"}
        ]}"#;
        assert_eq!(names(&filter_by_overlap(&candidates, text)), vec!["ColorGrip", "Hue Hold"]);
    }

    #[test]
    fn test_unreadable_verdicts_keep_everything() {
        let candidates = vec![CandidateMark::new("ColorGrip")];
        assert_eq!(filter_by_overlap(&candidates, "no verdicts today").len(), 1);
    }
}
