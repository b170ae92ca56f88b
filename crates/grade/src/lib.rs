//! Conflict grading for candidate marks.
//!
//! Combines the name, class and goods/services evaluators with status facts
//! into a graded `ConflictVerdict`. Candidates sharing a class with the
//! proposed mark go through the three-condition grader; candidates filed in
//! other classes go through the looser name-match detector.

use clearmark_explain::{
    grade_reasoning, name_match_reasoning, prominent_reasoning, status_override_reasoning,
};
use clearmark_features::{
    class_overlap, classes_overlap, evaluate_cross_class_signals, evaluate_name_signals,
    goods_services_overlap, is_relevant_goods, prominent_phonetic_match, Normalizer,
    ProminentElementOracle, ProminentElementResolver, SharedEmbedder,
};
use clearmark_model::{
    AssessmentPath, CandidateMark, ConditionFlags, ConflictGrade, ConflictVerdict,
    FallbackStrategy, ProposedMark, Thresholds,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Configuration for the conflict engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub thresholds: Thresholds,
    /// Heuristic used when the prominent-element oracle has no answer
    pub fallback_strategy: FallbackStrategy,
}

/// Grades candidate marks against a proposed mark.
///
/// Holds only read-only state; one engine can serve every comparison of a
/// run, from any number of threads.
#[derive(Clone)]
pub struct ConflictEngine {
    embedder: SharedEmbedder,
    resolver: ProminentElementResolver,
    thresholds: Thresholds,
    mark_normalizer: Normalizer,
    goods_normalizer: Normalizer,
}

impl ConflictEngine {
    pub fn new(embedder: SharedEmbedder, config: EngineConfig) -> Self {
        Self {
            embedder,
            resolver: ProminentElementResolver::heuristic(config.fallback_strategy),
            thresholds: config.thresholds,
            mark_normalizer: Normalizer::for_marks(),
            goods_normalizer: Normalizer::for_goods(),
        }
    }

    /// Use an oracle for prominent-element selection.
    pub fn with_oracle(mut self, oracle: Arc<dyn ProminentElementOracle>) -> Self {
        self.resolver = self.resolver.with_oracle(oracle);
        self
    }

    /// Verdict for a dead registration, if the candidate is one.
    fn status_override(
        &self,
        candidate: &CandidateMark,
        path: AssessmentPath,
    ) -> Option<ConflictVerdict> {
        if !candidate.status_category().is_dead() {
            return None;
        }

        debug!(mark = %candidate.name, status = %candidate.status, "Status override");
        Some(ConflictVerdict {
            mark_name: candidate.name.clone(),
            grade: ConflictGrade::Low,
            conditions: ConditionFlags::default(),
            reasoning: status_override_reasoning(&candidate.status),
            direct_hit: false,
            kind: candidate.kind(),
            path,
            status_override: true,
        })
    }

    /// Three-condition grader for candidates sharing a class with the proposed mark.
    ///
    /// One point each for name similarity, class overlap and goods/services
    /// overlap: 3 = High, 2 = Moderate, 1 = Low, 0 = None. Cancelled,
    /// abandoned and expired marks are always Low.
    pub fn grade_conflict(&self, candidate: &CandidateMark, proposed: &ProposedMark) -> ConflictVerdict {
        if let Some(verdict) = self.status_override(candidate, AssessmentPath::SameClass) {
            return verdict;
        }

        let name_signals = evaluate_name_signals(
            self.embedder.as_ref(),
            &self.mark_normalizer,
            &candidate.name,
            &proposed.name,
            &self.thresholds,
        );
        let overlapping_classes = class_overlap(&candidate.classes, &proposed.classes);
        let goods = goods_services_overlap(
            self.embedder.as_ref(),
            &self.goods_normalizer,
            &candidate.goods_services,
            &proposed.goods_services,
            self.thresholds.goods_semantic,
        );

        let conditions = ConditionFlags {
            name: name_signals.any(),
            class: !overlapping_classes.is_empty(),
            goods: goods.overlaps,
        };
        let grade = ConflictGrade::from_points(conditions.points());

        debug!(
            mark = %candidate.name,
            grade = grade.label(),
            name = conditions.name,
            class = conditions.class,
            goods = conditions.goods,
            "Graded candidate"
        );

        ConflictVerdict {
            mark_name: candidate.name.clone(),
            grade,
            conditions,
            reasoning: grade_reasoning(&name_signals, &overlapping_classes, &goods),
            direct_hit: false,
            kind: candidate.kind(),
            path: AssessmentPath::SameClass,
            status_override: false,
        }
    }

    /// Name-match detector for candidates filed only in other classes.
    ///
    /// Any of the six cross-class signals firing grades the candidate
    /// `NameMatch` (a direct hit); otherwise Low.
    pub fn detect_name_match(
        &self,
        candidate: &CandidateMark,
        proposed: &ProposedMark,
    ) -> ConflictVerdict {
        if let Some(verdict) = self.status_override(candidate, AssessmentPath::CrossClass) {
            return verdict;
        }

        let signals = evaluate_cross_class_signals(
            self.embedder.as_ref(),
            &self.mark_normalizer,
            &candidate.name,
            &proposed.name,
            &self.thresholds,
        );
        let name_match = signals.any();
        let grade = if name_match {
            ConflictGrade::NameMatch
        } else {
            ConflictGrade::Low
        };

        debug!(mark = %candidate.name, grade = grade.label(), "Cross-class check");

        ConflictVerdict {
            mark_name: candidate.name.clone(),
            grade,
            conditions: ConditionFlags {
                name: name_match,
                class: false,
                goods: false,
            },
            reasoning: name_match_reasoning(&signals, &self.thresholds, grade),
            direct_hit: name_match,
            kind: candidate.kind(),
            path: AssessmentPath::CrossClass,
            status_override: false,
        }
    }

    /// Which path a candidate takes.
    ///
    /// Candidates without classes stay on the grader so they still get a
    /// class condition of "not satisfied" rather than a name-only check.
    pub fn path_for(&self, candidate: &CandidateMark, proposed: &ProposedMark) -> AssessmentPath {
        if candidate.classes.is_empty() || classes_overlap(&candidate.classes, &proposed.classes) {
            AssessmentPath::SameClass
        } else {
            AssessmentPath::CrossClass
        }
    }

    /// Grade a candidate on the path its classes call for.
    pub fn assess(&self, candidate: &CandidateMark, proposed: &ProposedMark) -> ConflictVerdict {
        match self.path_for(candidate, proposed) {
            AssessmentPath::SameClass => self.grade_conflict(candidate, proposed),
            AssessmentPath::CrossClass => self.detect_name_match(candidate, proposed),
        }
    }

    /// Grade using the prominent element of each name instead of the whole name.
    ///
    /// A name match that is the only satisfied condition is a `NameMatch`.
    pub fn grade_prominent(
        &self,
        candidate: &CandidateMark,
        proposed: &ProposedMark,
    ) -> ConflictVerdict {
        let path = self.path_for(candidate, proposed);
        if let Some(verdict) = self.status_override(candidate, path) {
            return verdict;
        }

        let analysis = prominent_phonetic_match(
            &self.resolver,
            &candidate.name,
            &proposed.name,
            self.thresholds.prominent_phonetic,
        );
        let conditions = ConditionFlags {
            name: analysis.is_match,
            class: classes_overlap(&candidate.classes, &proposed.classes),
            goods: goods_services_overlap(
                self.embedder.as_ref(),
                &self.goods_normalizer,
                &candidate.goods_services,
                &proposed.goods_services,
                self.thresholds.goods_semantic,
            )
            .overlaps,
        };

        let grade = if conditions.name && conditions.points() == 1 {
            ConflictGrade::NameMatch
        } else {
            ConflictGrade::from_points(conditions.points())
        };

        ConflictVerdict {
            mark_name: candidate.name.clone(),
            grade,
            conditions,
            reasoning: prominent_reasoning(&analysis, conditions.class, conditions.goods, grade),
            direct_hit: grade == ConflictGrade::NameMatch,
            kind: candidate.kind(),
            path,
            status_override: false,
        }
    }

    /// Assess every candidate in parallel. Verdicts keep input order.
    pub fn screen(&self, candidates: &[CandidateMark], proposed: &ProposedMark) -> ScreeningReport {
        let verdicts: Vec<ConflictVerdict> = candidates
            .par_iter()
            .map(|candidate| self.assess(candidate, proposed))
            .collect();

        let report = ScreeningReport { verdicts };
        let dashboard = report.dashboard();
        info!(
            proposed = %proposed.name,
            candidates = candidates.len(),
            conflicts = dashboard.total_conflicts,
            high = dashboard.high,
            moderate = dashboard.moderate,
            name_match = dashboard.name_match,
            low = dashboard.low,
            "Screening complete"
        );

        report
    }

    /// Like `screen`, but grading with the prominent-element profile.
    pub fn screen_prominent(
        &self,
        candidates: &[CandidateMark],
        proposed: &ProposedMark,
    ) -> ScreeningReport {
        let verdicts = candidates
            .par_iter()
            .map(|candidate| self.grade_prominent(candidate, proposed))
            .collect();
        ScreeningReport { verdicts }
    }
}

/// Verdicts for every candidate of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreeningReport {
    pub verdicts: Vec<ConflictVerdict>,
}

/// Conflict counts for a screening run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dashboard {
    pub total_conflicts: usize,
    /// 3 conditions satisfied
    pub high: usize,
    /// 2 conditions satisfied
    pub moderate: usize,
    pub name_match: usize,
    /// 1 condition satisfied (same-class path only)
    pub low: usize,
}

impl ScreeningReport {
    pub fn by_grade(&self, grade: ConflictGrade) -> impl Iterator<Item = &ConflictVerdict> {
        self.verdicts.iter().filter(move |v| v.grade == grade)
    }

    /// Counts per grade. Cross-class Low verdicts are cleared marks, not conflicts.
    pub fn dashboard(&self) -> Dashboard {
        let mut dashboard = Dashboard::default();
        for verdict in &self.verdicts {
            match verdict.grade {
                ConflictGrade::High => dashboard.high += 1,
                ConflictGrade::Moderate => dashboard.moderate += 1,
                ConflictGrade::NameMatch => dashboard.name_match += 1,
                ConflictGrade::Low if verdict.path == AssessmentPath::SameClass => {
                    dashboard.low += 1
                }
                ConflictGrade::Low | ConflictGrade::None => {}
            }
        }
        dashboard.total_conflicts =
            dashboard.high + dashboard.moderate + dashboard.name_match + dashboard.low;
        dashboard
    }
}

/// Every text the semantic evaluators will embed when screening
/// `candidates` against `proposed`: normalized mark names and normalized
/// goods/services descriptions. Empty texts are left out.
pub fn embedding_inputs(candidates: &[CandidateMark], proposed: &ProposedMark) -> BTreeSet<String> {
    let marks = Normalizer::for_marks();
    let goods = Normalizer::for_goods();

    let names = candidates
        .iter()
        .map(|c| c.name.as_str())
        .chain(std::iter::once(proposed.name.as_str()))
        .map(|name| marks.normalize(name));
    let descriptions = candidates
        .iter()
        .map(|c| c.goods_services.as_str())
        .chain(std::iter::once(proposed.goods_services.as_str()))
        .map(|text| goods.normalize(text));

    names.chain(descriptions).filter(|t| !t.is_empty()).collect()
}

/// Keep candidates whose goods/services look relevant to the proposed ones.
///
/// Returns the kept candidates and the number excluded. Candidates with no
/// goods/services description are kept.
pub fn relevant_candidates<'a>(
    candidates: &'a [CandidateMark],
    proposed_goods: &str,
    threshold: f32,
) -> (Vec<&'a CandidateMark>, usize) {
    let mut relevant = Vec::new();
    let mut excluded = 0;

    for candidate in candidates {
        if candidate.goods_services.trim().is_empty()
            || is_relevant_goods(&candidate.goods_services, proposed_goods, threshold)
        {
            relevant.push(candidate);
        } else {
            excluded += 1;
        }
    }

    debug!(kept = relevant.len(), excluded, "Relevance pre-filter");
    (relevant, excluded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clearmark_features::{
        Embedding, EmbeddingError, Embedder, HashingEmbedder, OracleError, PrecomputedEmbedder,
    };
    use std::collections::HashMap;
    use clearmark_model::MarkKind;
    use pretty_assertions::assert_eq;

    struct FailingEmbedder;

    impl Embedder for FailingEmbedder {
        fn embed(&self, _text: &str) -> Result<Embedding, EmbeddingError> {
            Err(EmbeddingError::Unavailable("model not loaded".into()))
        }

        fn model_name(&self) -> &str {
            "failing"
        }
    }

    struct DownOracle;

    impl ProminentElementOracle for DownOracle {
        fn prominent_element(&self, _mark: &str) -> Result<String, OracleError> {
            Err(OracleError::Unavailable("timeout".into()))
        }
    }

    fn engine() -> ConflictEngine {
        ConflictEngine::new(Arc::new(HashingEmbedder::default()), EngineConfig::default())
    }

    fn proposed() -> ProposedMark {
        ProposedMark::new("Colorgrip", "3", "permanent hair color")
    }

    fn make_candidate(name_match: bool, class_match: bool, goods_match: bool) -> CandidateMark {
        CandidateMark::new(if name_match { "ColorGrip" } else { "Zebra Stripe" })
            .with_classes([if class_match { 3 } else { 25 }])
            .with_goods(if goods_match { "hair color" } else { "steel bolts" })
    }

    #[test]
    fn test_point_grid() {
        let engine = engine();
        let proposed = proposed();

        for name in [false, true] {
            for class in [false, true] {
                for goods in [false, true] {
                    let verdict = engine.grade_conflict(&make_candidate(name, class, goods), &proposed);
                    let expected = match name as u8 + class as u8 + goods as u8 {
                        3 => ConflictGrade::High,
                        2 => ConflictGrade::Moderate,
                        1 => ConflictGrade::Low,
                        _ => ConflictGrade::None,
                    };
                    assert_eq!(verdict.grade, expected, "name={name} class={class} goods={goods}");
                    assert_eq!(
                        verdict.conditions,
                        ConditionFlags { name, class, goods }
                    );
                }
            }
        }
    }

    #[test]
    fn test_colorgrip_scenario_high() {
        let candidate = CandidateMark::new("ColorGrip")
            .with_classes([3])
            .with_goods("hair color")
            .with_status("Registered");
        let verdict = engine().grade_conflict(&candidate, &proposed());

        assert_eq!(verdict.grade, ConflictGrade::High);
        assert!(verdict.conditions.name && verdict.conditions.class && verdict.conditions.goods);
        assert!(verdict.reasoning.contains("Exact character-for-character match"));
        assert!(verdict.reasoning.contains("Semantically equivalent"));
        assert_eq!(verdict.kind, MarkKind::Word);
        assert!(!verdict.direct_hit);
    }

    #[test]
    fn test_dead_status_always_low() {
        let engine = engine();
        for status in ["Cancelled", "ABANDONED", "  expired ", "Registered; Can celled 2019"] {
            let candidate = make_candidate(true, true, true).with_status(status);
            let verdict = engine.grade_conflict(&candidate, &proposed());
            assert_eq!(verdict.grade, ConflictGrade::Low, "status={status}");
            assert!(verdict.status_override);
            assert_eq!(verdict.conditions, ConditionFlags::default());
        }
    }

    #[test]
    fn test_cross_class_name_match_scenario() {
        let candidate = CandidateMark::new("ColorGrip")
            .with_classes([25])
            .with_goods("hair color")
            .with_status("Registered");
        let engine = engine();
        assert_eq!(engine.path_for(&candidate, &proposed()), AssessmentPath::CrossClass);

        let verdict = engine.assess(&candidate, &proposed());
        assert_eq!(verdict.grade, ConflictGrade::NameMatch);
        assert!(verdict.direct_hit);
        assert_eq!(verdict.path, AssessmentPath::CrossClass);
        assert!(verdict.reasoning.contains("Phonetic codes"));
        assert!(verdict.reasoning.contains("Partial string similarity: 100"));
    }

    #[test]
    fn test_cross_class_unrelated_is_low() {
        let candidate = CandidateMark::new("Zebra").with_classes([25]);
        let verdict = engine().detect_name_match(&candidate, &proposed());
        assert_eq!(verdict.grade, ConflictGrade::Low);
        assert!(!verdict.direct_hit);
    }

    #[test]
    fn test_cross_class_dead_mark_is_low() {
        let candidate = CandidateMark::new("ColorGrip")
            .with_classes([25])
            .with_status("Abandoned");
        let verdict = engine().detect_name_match(&candidate, &proposed());
        assert_eq!(verdict.grade, ConflictGrade::Low);
        assert!(verdict.status_override);
    }

    #[test]
    fn test_embedder_failure_does_not_abort() {
        let engine = ConflictEngine::new(Arc::new(FailingEmbedder), EngineConfig::default());
        let candidate = CandidateMark::new("ColorGrip")
            .with_classes([3])
            .with_goods("hair color");
        let verdict = engine.grade_conflict(&candidate, &proposed());
        assert_eq!(verdict.grade, ConflictGrade::High);
        assert!(verdict.reasoning.contains("shared terms"));
    }

    #[test]
    fn test_unparseable_proposed_classes() {
        let proposed = ProposedMark::new("Colorgrip", "three", "permanent hair color");
        let candidate = CandidateMark::new("ColorGrip")
            .with_classes([3])
            .with_goods("hair color");
        let verdict = engine().grade_conflict(&candidate, &proposed);
        assert!(!verdict.conditions.class);
        assert_eq!(verdict.grade, ConflictGrade::Moderate);
    }

    #[test]
    fn test_candidate_without_classes_uses_grader() {
        let candidate = CandidateMark::new("ColorGrip").with_goods("hair color");
        let verdict = engine().assess(&candidate, &proposed());
        assert_eq!(verdict.path, AssessmentPath::SameClass);
        assert_eq!(verdict.grade, ConflictGrade::Moderate);
    }

    #[test]
    fn test_grade_prominent_name_only_is_name_match() {
        let engine = ConflictEngine::new(Arc::new(HashingEmbedder::default()), EngineConfig::default())
            .with_oracle(Arc::new(DownOracle));
        let candidate = CandidateMark::new("Acme Smyth")
            .with_classes([25])
            .with_goods("steel bolts");
        let proposed = ProposedMark::new("Blue Smith", "3", "permanent hair color");

        let verdict = engine.grade_prominent(&candidate, &proposed);
        assert_eq!(verdict.grade, ConflictGrade::NameMatch);
        assert!(verdict.direct_hit);
        assert!(verdict.reasoning.contains("Fallback strategy identified prominent elements: 'smyth' and 'smith'"));
    }

    #[test]
    fn test_grade_prominent_all_conditions() {
        let candidate = CandidateMark::new("Acme Smyth")
            .with_classes([3])
            .with_goods("hair color");
        let proposed = ProposedMark::new("Blue Smith", "3", "permanent hair color");
        let verdict = engine().grade_prominent(&candidate, &proposed);
        assert_eq!(verdict.grade, ConflictGrade::High);
    }

    #[test]
    fn test_grade_prominent_long_elements_are_not_truncated() {
        let candidate = CandidateMark::new("Green Starbucks")
            .with_classes([25])
            .with_goods("steel bolts");
        let proposed = ProposedMark::new("Red Starbright", "3", "permanent hair color");

        let verdict = engine().grade_prominent(&candidate, &proposed);
        assert!(!verdict.conditions.name);
        assert_eq!(verdict.grade, ConflictGrade::None);
        assert!(!verdict.direct_hit);
    }

    fn sunrise_embeddings() -> PrecomputedEmbedder {
        PrecomputedEmbedder::new(HashMap::from([
            ("sunrise".to_string(), vec![1.0, 0.0, 0.0]),
            ("dawn".to_string(), vec![0.95, 0.1, 0.0]),
            ("apparel".to_string(), vec![0.0, 1.0, 0.0]),
            ("clothing".to_string(), vec![0.0, 0.95, 0.3]),
        ]))
    }

    #[test]
    fn test_semantic_embeddings_drive_name_and_goods() {
        let candidate = CandidateMark::new("Dawn").with_classes([25]).with_goods("Clothing");
        let proposed = ProposedMark::new("Sunrise", "25", "apparel");

        let engine = ConflictEngine::new(Arc::new(sunrise_embeddings()), EngineConfig::default());
        let verdict = engine.grade_conflict(&candidate, &proposed);
        assert_eq!(verdict.conditions, ConditionFlags { name: true, class: true, goods: true });
        assert_eq!(verdict.grade, ConflictGrade::High);
    }

    #[test]
    fn test_missing_embeddings_fall_back_to_lexical() {
        let candidate = CandidateMark::new("Dawn").with_classes([25]).with_goods("Clothing");
        let proposed = ProposedMark::new("Sunrise", "25", "apparel");

        let engine = ConflictEngine::new(
            Arc::new(PrecomputedEmbedder::new(HashMap::new())),
            EngineConfig::default(),
        );
        let verdict = engine.grade_conflict(&candidate, &proposed);
        assert_eq!(verdict.conditions, ConditionFlags { name: false, class: true, goods: false });
        assert_eq!(verdict.grade, ConflictGrade::Low);
    }

    #[test]
    fn test_embedding_inputs_are_normalized() {
        let candidates = vec![
            CandidateMark::new("Dawn").with_goods("Clothing, for men"),
            CandidateMark::new("  ").with_goods("Class 25"),
        ];
        let proposed = ProposedMark::new("Sunrise!", "25", "apparel");

        let inputs: Vec<String> = embedding_inputs(&candidates, &proposed).into_iter().collect();
        assert_eq!(inputs, vec!["apparel", "clothing men", "dawn", "sunrise"]);
    }

    #[test]
    fn test_screen_dashboard() {
        let candidates = vec![
            make_candidate(true, true, true),
            make_candidate(true, true, false),
            make_candidate(false, true, false),
            make_candidate(false, true, true).with_status("Cancelled"),
            CandidateMark::new("ColorGrip").with_classes([25]),
            CandidateMark::new("Zebra").with_classes([25]),
        ];
        let report = engine().screen(&candidates, &proposed());

        assert_eq!(report.verdicts.len(), candidates.len());
        assert_eq!(report.verdicts[4].mark_name, "ColorGrip");
        assert_eq!(
            report.dashboard(),
            Dashboard {
                total_conflicts: 5,
                high: 1,
                moderate: 1,
                name_match: 1,
                low: 2,
            }
        );
        assert_eq!(report.by_grade(ConflictGrade::Low).count(), 3);
        assert_eq!(
            report
                .by_grade(ConflictGrade::NameMatch)
                .map(|v| v.mark_name.as_str())
                .collect::<Vec<_>>(),
            vec!["ColorGrip"]
        );
    }

    #[test]
    fn test_relevant_candidates() {
        let candidates = vec![
            CandidateMark::new("A").with_goods("hair color"),
            CandidateMark::new("B").with_goods("steel bolts"),
            CandidateMark::new("C"),
        ];
        let (kept, excluded) = relevant_candidates(&candidates, "permanent hair color", 0.3);
        assert_eq!(kept.len(), 2);
        assert_eq!(excluded, 1);
        assert_eq!(kept[1].name, "C");
    }

    #[test]
    fn test_engine_config_from_json() {
        let config: EngineConfig = serde_json::from_str(
            r#"{"thresholds": {"goods_semantic": 0.3}, "fallback_strategy": "longest"}"#,
        )
        .unwrap();
        assert_eq!(config.fallback_strategy, FallbackStrategy::Longest);
        assert_eq!(config.thresholds.goods_semantic, 0.3);
        assert_eq!(config.thresholds.cross_class_ratio, 55);
    }
}
