//! Core domain model for clearmark conflict analysis.
//!
//! This crate defines the fundamental types used throughout the system:
//! - `CandidateMark`: A previously registered mark parsed from a search report
//! - `ProposedMark`: The mark being cleared
//! - `MarkStatus`: Active, Cancelled, Abandoned, Expired, Other
//! - `ConflictVerdict`: The graded outcome of one candidate/proposed comparison
//! - `Thresholds`: Named per-evaluator configuration

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Nice classification numbers (1-45).
pub type ClassSet = BTreeSet<u16>;

/// Lowest valid Nice class.
pub const MIN_NICE_CLASS: u16 = 1;
/// Highest valid Nice class.
pub const MAX_NICE_CLASS: u16 = 45;

/// Design phrase written by the extraction layer when a record has none.
pub const NO_DESIGN_PHRASE: &str = "No Design phrase presented in document";

/// Parse a comma-separated class list such as `"3, 25"`.
///
/// Fails closed: if any non-empty token is not an integer in 1..=45 the
/// whole list is rejected and an empty set is returned.
pub fn parse_class_list(text: &str) -> ClassSet {
    let mut classes = ClassSet::new();

    for token in text.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        match token.parse::<u16>() {
            Ok(class) if (MIN_NICE_CLASS..=MAX_NICE_CLASS).contains(&class) => {
                classes.insert(class);
            }
            _ => {
                tracing::warn!(input = %text, token = %token, "Unparseable class list, treating as empty");
                return ClassSet::new();
            }
        }
    }

    classes
}

/// Status of a registered mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarkStatus {
    /// Registered, live or pending
    Active,
    Cancelled,
    Abandoned,
    Expired,
    /// Anything the status text does not identify
    Other,
}

impl Default for MarkStatus {
    fn default() -> Self {
        Self::Other
    }
}

impl From<&str> for MarkStatus {
    fn from(s: &str) -> Self {
        let folded = fold_status(s);

        if folded.contains("cancelled") || folded.contains("canceled") {
            Self::Cancelled
        } else if folded.contains("abandoned") {
            Self::Abandoned
        } else if folded.contains("expired") {
            Self::Expired
        } else if ["registered", "live", "active", "pending"]
            .iter()
            .any(|kw| folded.contains(kw))
        {
            Self::Active
        } else {
            Self::Other
        }
    }
}

impl MarkStatus {
    /// Cancelled, abandoned and expired marks cannot ground a conflict.
    pub fn is_dead(self) -> bool {
        matches!(self, Self::Cancelled | Self::Abandoned | Self::Expired)
    }
}

/// Lowercase and drop all whitespace so "C ancelled" and "CANCELLED" agree.
fn fold_status(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Word mark or design (stylized/logo) mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarkKind {
    Word,
    Design,
}

fn default_design_phrase() -> String {
    NO_DESIGN_PHRASE.to_string()
}

/// A previously registered mark parsed from one record of a search report.
///
/// Field aliases accept the extraction layer's JSON schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateMark {
    /// The mark text
    #[serde(alias = "trademark_name", alias = "mark")]
    pub name: String,

    /// Free-text status as printed in the report (e.g. "Registered")
    #[serde(default)]
    pub status: String,

    /// Owner/registrant name
    #[serde(default)]
    pub owner: String,

    /// Nice classification numbers
    #[serde(default, alias = "international_class_number")]
    pub classes: ClassSet,

    /// Goods and services description
    #[serde(default)]
    pub goods_services: String,

    /// Serial number (opaque)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,

    /// Registration number (opaque)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_number: Option<String>,

    /// Design phrase, or the `NO_DESIGN_PHRASE` sentinel
    #[serde(default = "default_design_phrase")]
    pub design_phrase: String,

    /// Page of the source report the record came from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
}

impl CandidateMark {
    /// Create a minimal active word mark.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: "Registered".to_string(),
            owner: String::new(),
            classes: ClassSet::new(),
            goods_services: String::new(),
            serial_number: None,
            registration_number: None,
            design_phrase: default_design_phrase(),
            page_number: None,
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    pub fn with_classes(mut self, classes: impl IntoIterator<Item = u16>) -> Self {
        self.classes = classes.into_iter().collect();
        self
    }

    pub fn with_goods(mut self, goods_services: impl Into<String>) -> Self {
        self.goods_services = goods_services.into();
        self
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = owner.into();
        self
    }

    pub fn with_design_phrase(mut self, phrase: impl Into<String>) -> Self {
        self.design_phrase = phrase.into();
        self
    }

    /// Status category derived from the free-text status.
    pub fn status_category(&self) -> MarkStatus {
        MarkStatus::from(self.status.as_str())
    }

    /// Word unless a real design phrase is present.
    pub fn kind(&self) -> MarkKind {
        let phrase = self.design_phrase.trim();
        if phrase.is_empty() || phrase.eq_ignore_ascii_case(NO_DESIGN_PHRASE) {
            MarkKind::Word
        } else {
            MarkKind::Design
        }
    }
}

/// The mark being cleared.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProposedMark {
    pub name: String,

    #[serde(default)]
    pub classes: ClassSet,

    #[serde(default)]
    pub goods_services: String,
}

impl ProposedMark {
    /// Build from the raw comma-separated class string entered by the user.
    pub fn new(
        name: impl Into<String>,
        class_list: &str,
        goods_services: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            classes: parse_class_list(class_list),
            goods_services: goods_services.into(),
        }
    }

    pub fn with_classes(mut self, classes: impl IntoIterator<Item = u16>) -> Self {
        self.classes = classes.into_iter().collect();
        self
    }
}

/// Graded conflict verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConflictGrade {
    None,
    Low,
    Moderate,
    High,
    /// Same or confusingly similar name filed outside the proposed classes
    #[serde(rename = "Name-Match")]
    NameMatch,
}

impl ConflictGrade {
    /// Grade for a 0-3 point count.
    pub fn from_points(points: u8) -> Self {
        match points {
            0 => Self::None,
            1 => Self::Low,
            2 => Self::Moderate,
            _ => Self::High,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Low => "Low",
            Self::Moderate => "Moderate",
            Self::High => "High",
            Self::NameMatch => "Name-Match",
        }
    }
}

/// Which scoring path produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentPath {
    /// Class sets intersect (or the candidate lists no classes)
    SameClass,
    /// Disjoint, non-empty class sets
    CrossClass,
}

/// The three scored conditions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionFlags {
    /// Name similarity
    pub name: bool,
    /// Class overlap
    pub class: bool,
    /// Goods/services overlap
    pub goods: bool,
}

impl ConditionFlags {
    pub fn points(&self) -> u8 {
        self.name as u8 + self.class as u8 + self.goods as u8
    }
}

/// Outcome of comparing one candidate against the proposed mark.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictVerdict {
    /// Candidate mark text
    pub mark_name: String,

    pub grade: ConflictGrade,

    pub conditions: ConditionFlags,

    /// Trace of the conditions that fired
    pub reasoning: String,

    /// Name conflict outside the proposed classes
    pub direct_hit: bool,

    pub kind: MarkKind,

    pub path: AssessmentPath,

    /// Grade forced by a dead status
    #[serde(default)]
    pub status_override: bool,
}

/// Heuristic used when the prominent-element oracle gives no answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackStrategy {
    #[default]
    Last,
    First,
    Longest,
}

/// Preset threshold profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TuningProfile {
    Standard,
    Strict,
}

/// Thresholds, one per evaluator call site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Cosine similarity for semantic name equivalence
    pub semantic_name: f32,
    /// Ratio (0-100) for phonetic name equivalence
    pub phonetic_name: u8,
    /// Band around `semantic_name` reported as medium confidence
    pub semantic_margin: f32,
    /// Band around `phonetic_name` reported as medium confidence
    pub phonetic_margin: u8,
    /// Cosine similarity for goods/services overlap
    pub goods_semantic: f32,
    /// Cosine similarity in the cross-class detector
    pub cross_class_semantic: f32,
    /// Ratio in the cross-class detector
    pub cross_class_ratio: u8,
    /// Partial ratio in the cross-class detector
    pub cross_class_partial_ratio: u8,
    /// Ratio between prominent-element phonetic codes
    pub prominent_phonetic: u8,
    /// Keyword overlap ratio for the relevance pre-filter
    pub relevance_keyword_overlap: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self::profile(TuningProfile::Standard)
    }
}

impl Thresholds {
    pub fn profile(profile: TuningProfile) -> Self {
        let (semantic_name, phonetic_name) = match profile {
            TuningProfile::Standard => (0.84, 84),
            TuningProfile::Strict => (0.87, 85),
        };

        Self {
            semantic_name,
            phonetic_name,
            semantic_margin: 0.05,
            phonetic_margin: 5,
            goods_semantic: 0.65,
            cross_class_semantic: 0.5,
            cross_class_ratio: 55,
            cross_class_partial_ratio: 55,
            prominent_phonetic: 90,
            relevance_keyword_overlap: 0.3,
        }
    }
}
