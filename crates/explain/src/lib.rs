//! Reasoning text for conflict verdicts.
//!
//! Turns evaluator outcomes into the human-readable trace stored on each
//! `ConflictVerdict`, and verdicts into short summaries for display.

use clearmark_features::{CrossClassSignals, GoodsOverlap, NameSignal, NameSignals, ProminentMatch};
use clearmark_model::{ConflictGrade, ConflictVerdict, Thresholds};
use serde::{Deserialize, Serialize};

/// A structured explanation of a verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Explanation {
    /// Short summary (1 line)
    pub summary: String,

    /// Full reasoning trace
    pub detail: String,

    /// Evidence items supporting this explanation
    pub evidence: Vec<EvidenceItem>,
}

/// A piece of evidence supporting a verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceItem {
    /// Type of evidence
    pub kind: String,

    /// The specific value or match
    pub value: String,

    /// Optional context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// Human-readable label for a name sub-signal.
pub fn signal_label(signal: NameSignal) -> &'static str {
    match signal {
        NameSignal::ExactMatch => "Exact character-for-character match",
        NameSignal::SemanticEquivalent => "Semantically equivalent",
        NameSignal::PhoneticEquivalent => "Phonetically equivalent",
        NameSignal::FirstWordsPhonetic => "First two or more words are phonetically equivalent",
        NameSignal::PrefixContainment => "Proposed name begins the existing mark",
    }
}

fn satisfied(flag: bool) -> &'static str {
    if flag {
        "Satisfied"
    } else {
        "Not Satisfied"
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "match"
    } else {
        "no match"
    }
}

/// Reasoning for a dead registration.
pub fn status_override_reasoning(status: &str) -> String {
    format!(
        "The existing trademark status is '{}' (cancelled, abandoned or expired); \
         graded Low without further scoring.",
        status.trim()
    )
}

/// Reasoning for the three-condition grader.
pub fn grade_reasoning(
    signals: &NameSignals,
    overlapping_classes: &[u16],
    goods: &GoodsOverlap,
) -> String {
    let condition_1 = if signals.any() {
        let details: Vec<String> = signals
            .fired()
            .into_iter()
            .map(|signal| match signal {
                NameSignal::SemanticEquivalent => match (signals.semantic_score, signals.semantic_confidence) {
                    (Some(score), Some(confidence)) => format!(
                        "{} (score {:.2}, {} confidence)",
                        signal_label(signal),
                        score,
                        confidence.label()
                    ),
                    _ => signal_label(signal).to_string(),
                },
                NameSignal::PhoneticEquivalent => format!(
                    "{} (ratio {}, {} confidence)",
                    signal_label(signal),
                    signals.phonetic_score,
                    signals.phonetic_confidence.label()
                ),
                other => signal_label(other).to_string(),
            })
            .collect();
        format!("Condition 1: Satisfied - {}.", details.join(", "))
    } else {
        let semantic = signals
            .semantic_score
            .map(|s| format!("{:.2}", s))
            .unwrap_or_else(|| "unavailable".to_string());
        format!(
            "Condition 1: Not Satisfied (semantic score {}, phonetic ratio {}).",
            semantic, signals.phonetic_score
        )
    };

    let condition_2 = if overlapping_classes.is_empty() {
        "Condition 2: Not Satisfied - Overlap in class numbers.".to_string()
    } else {
        format!(
            "Condition 2: Satisfied - Overlap in class numbers ({}).",
            join_classes(overlapping_classes)
        )
    };

    let condition_3 = format!(
        "Condition 3: {} - Overlap in goods/services and target market{}.",
        satisfied(goods.overlaps),
        goods_detail(goods)
    );

    format!("{}\n{}\n{}", condition_1, condition_2, condition_3)
}

fn goods_detail(goods: &GoodsOverlap) -> String {
    let mut parts = Vec::new();
    if let Some(score) = goods.semantic_score {
        parts.push(format!("semantic score {:.2}", score));
    }
    if !goods.shared_lemmas.is_empty() {
        parts.push(format!("shared terms: {}", goods.shared_lemmas.join(", ")));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join("; "))
    }
}

fn join_classes(classes: &[u16]) -> String {
    classes
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Reasoning for the cross-class name-match detector, one line per sub-condition.
pub fn name_match_reasoning(
    signals: &CrossClassSignals,
    thresholds: &Thresholds,
    grade: ConflictGrade,
) -> String {
    let semantic = match signals.semantic_score {
        Some(score) => format!(
            "Semantic similarity: {:.2} (threshold {:.2}) - {}",
            score,
            thresholds.cross_class_semantic,
            yes_no(signals.semantic)
        ),
        None => "Semantic similarity: unavailable - no match".to_string(),
    };

    let lines = [
        "No overlap in class numbers; names compared for a direct hit.".to_string(),
        format!(
            "Phonetic codes: '{}' vs '{}' - {}",
            signals.phonetic_code1,
            signals.phonetic_code2,
            yes_no(signals.phonetic_code_match)
        ),
        format!("Substring match: {}", yes_no(signals.substring)),
        format!("Shared word: {}", yes_no(signals.shared_word)),
        semantic,
        format!(
            "String similarity: {} (threshold {}) - {}",
            signals.ratio,
            thresholds.cross_class_ratio,
            yes_no(signals.ratio_match)
        ),
        format!(
            "Partial string similarity: {} (threshold {}) - {}",
            signals.partial_ratio,
            thresholds.cross_class_partial_ratio,
            yes_no(signals.partial_ratio_match)
        ),
        format!("Conflict Grade: {}", grade.label()),
    ];

    lines.join("\n")
}

/// Reasoning for the prominent-element grading profile.
pub fn prominent_reasoning(
    analysis: &ProminentMatch,
    class_overlap: bool,
    goods_overlap: bool,
    grade: ConflictGrade,
) -> String {
    let mut parts = Vec::new();

    let chooser = if analysis.used_oracle {
        "Oracle"
    } else {
        "Fallback strategy"
    };
    parts.push(format!(
        "{} identified prominent elements: '{}' and '{}'",
        chooser, analysis.element1, analysis.element2
    ));

    if analysis.exact_match {
        parts.push("Phonetic codes match exactly".to_string());
    } else {
        parts.push(format!(
            "Phonetic similarity score: {}% (threshold: {}%)",
            analysis.fuzzy_score, analysis.threshold
        ));
    }

    if class_overlap {
        parts.push("International classes overlap".to_string());
    }
    if goods_overlap {
        parts.push("Goods/Services overlap".to_string());
    }

    parts.push(format!("\nConflict Grade: {}", grade.label()));
    parts.push(
        match grade {
            ConflictGrade::High => "All three conditions are met: prominent element similarity, class overlap, and goods/services overlap",
            ConflictGrade::Moderate => "Two conditions are met",
            ConflictGrade::Low => "One condition is met",
            ConflictGrade::NameMatch => "Names are similar but no other conditions are met",
            ConflictGrade::None => "No significant conflict detected",
        }
        .to_string(),
    );

    parts.join("\n")
}

/// One-line summary of a verdict.
pub fn summarize_verdict(verdict: &ConflictVerdict) -> String {
    if verdict.status_override {
        return format!("LOW: {} - inactive registration", verdict.mark_name);
    }

    let mut met = Vec::new();
    if verdict.conditions.name {
        met.push("Name");
    }
    if verdict.conditions.class {
        met.push("Class");
    }
    if verdict.conditions.goods {
        met.push("Goods/Services");
    }

    let level = verdict.grade.label().to_uppercase();
    if met.is_empty() {
        format!("{}: {} - no conditions met", level, verdict.mark_name)
    } else {
        format!("{}: {} - {}", level, verdict.mark_name, met.join(", "))
    }
}

/// Structured explanation of a verdict.
pub fn explain_verdict(verdict: &ConflictVerdict) -> Explanation {
    let mut evidence = vec![EvidenceItem {
        kind: "grade".to_string(),
        value: verdict.grade.label().to_string(),
        context: Some(format!("{:?}", verdict.path)),
    }];

    for (kind, flag) in [
        ("name_condition", verdict.conditions.name),
        ("class_condition", verdict.conditions.class),
        ("goods_condition", verdict.conditions.goods),
    ] {
        evidence.push(EvidenceItem {
            kind: kind.to_string(),
            value: flag.to_string(),
            context: None,
        });
    }

    if verdict.direct_hit {
        evidence.push(EvidenceItem {
            kind: "direct_hit".to_string(),
            value: verdict.mark_name.clone(),
            context: Some("Name conflict outside the proposed classes".to_string()),
        });
    }

    Explanation {
        summary: summarize_verdict(verdict),
        detail: verdict.reasoning.clone(),
        evidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clearmark_features::Confidence;
    use clearmark_model::{AssessmentPath, ConditionFlags, MarkKind};

    fn signals(exact: bool) -> NameSignals {
        NameSignals {
            exact,
            semantic: exact,
            semantic_score: Some(if exact { 1.0 } else { 0.2 }),
            semantic_confidence: Some(if exact { Confidence::High } else { Confidence::Low }),
            phonetic: exact,
            phonetic_score: if exact { 100 } else { 20 },
            phonetic_confidence: if exact { Confidence::High } else { Confidence::Low },
            first_words: false,
            prefix: false,
        }
    }

    #[test]
    fn test_grade_reasoning_lists_fired_signals() {
        let goods = GoodsOverlap {
            overlaps: true,
            semantic_score: Some(0.71),
            shared_lemmas: vec!["hair".to_string()],
        };
        let text = grade_reasoning(&signals(true), &[3], &goods);
        assert!(text.contains("Condition 1: Satisfied - Exact character-for-character match"));
        assert!(text.contains("Semantically equivalent (score 1.00, high confidence)"));
        assert!(text.contains("Condition 2: Satisfied - Overlap in class numbers (3)."));
        assert!(text.contains("Condition 3: Satisfied"));
        assert!(text.contains("shared terms: hair"));
    }

    #[test]
    fn test_grade_reasoning_not_satisfied() {
        let text = grade_reasoning(&signals(false), &[], &GoodsOverlap::default());
        assert!(text.contains("Condition 1: Not Satisfied"));
        assert!(text.contains("Condition 2: Not Satisfied"));
        assert!(text.contains("Condition 3: Not Satisfied"));
    }

    #[test]
    fn test_summarize_verdict() {
        let verdict = ConflictVerdict {
            mark_name: "COLORGRIP".to_string(),
            grade: ConflictGrade::Moderate,
            conditions: ConditionFlags {
                name: true,
                class: true,
                goods: false,
            },
            reasoning: String::new(),
            direct_hit: false,
            kind: MarkKind::Word,
            path: AssessmentPath::SameClass,
            status_override: false,
        };
        assert_eq!(summarize_verdict(&verdict), "MODERATE: COLORGRIP - Name, Class");

        let explanation = explain_verdict(&verdict);
        assert_eq!(explanation.evidence.len(), 4);
    }
}
