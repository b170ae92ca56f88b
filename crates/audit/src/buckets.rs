//! Edit-distance re-bucketing of oracle classification output.

use crate::parse::{
    lenient_bool, lenient_classes, lenient_f64, lenient_u32, parse_oracle_json, text_or_empty,
    text_or_unknown, unknown,
};
use clearmark_features::edit_distance;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::{debug, warn};

pub const NO_COORDINATED_CLASSES: &str = "No coordinated classes identified";
pub const COORDINATED_CLASSES_UNAVAILABLE: &str = "Unable to identify coordinated classes";
pub const CROWDED_FIELD_UNKNOWN: &str = "Unable to determine crowded field status";

/// One mark as listed by the oracle, with missing fields filled in.
///
/// Fields the oracle adds on its own (`letter_variation`,
/// `similarity_reasoning`, ...) are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkEntry {
    #[serde(default, deserialize_with = "text_or_empty")]
    pub mark: String,

    #[serde(default = "unknown", deserialize_with = "text_or_unknown")]
    pub owner: String,

    #[serde(default = "unknown", deserialize_with = "text_or_unknown")]
    pub goods_services: String,

    #[serde(default = "unknown", deserialize_with = "text_or_unknown")]
    pub status: String,

    #[serde(default = "unknown", deserialize_with = "text_or_unknown")]
    pub class: String,

    #[serde(default, deserialize_with = "lenient_bool")]
    pub class_match: bool,

    #[serde(default, deserialize_with = "lenient_bool")]
    pub goods_services_match: bool,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MarkEntry {
    /// An entry that only names its mark.
    pub fn named(mark: impl Into<String>) -> Self {
        Self {
            mark: mark.into(),
            owner: unknown(),
            goods_services: unknown(),
            status: unknown(),
            class: unknown(),
            class_match: false,
            goods_services_match: false,
            extra: Map::new(),
        }
    }

    fn identity(&self) -> (String, String, String) {
        (self.mark.trim().to_string(), self.owner.to_lowercase(), self.class.clone())
    }
}

/// A bucket of mark entries.
///
/// Oracles sometimes list bare mark names instead of objects, or put a
/// sentence where the list should be. Strings become named entries;
/// anything else that is not an object is skipped, and a bucket that is not
/// a list reads as empty.
pub(crate) fn entries<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<MarkEntry>, D::Error> {
    let Value::Array(items) = Value::deserialize(d)? else {
        return Ok(Vec::new());
    };

    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            Value::String(name) => Some(MarkEntry::named(name.trim())),
            Value::Object(map) => match serde_json::from_value(Value::Object(map)) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "Unreadable oracle mark entry skipped");
                    None
                }
            },
            other => {
                debug!(entry = %other, "Non-object oracle mark entry skipped");
                None
            }
        })
        .collect())
}

/// Crowded-field section; anything but an object reads as the default.
pub(crate) fn crowded_field<'de, D: Deserializer<'de>>(d: D) -> Result<CrowdedField, D::Error> {
    match Value::deserialize(d)? {
        Value::Object(map) => Ok(serde_json::from_value(Value::Object(map)).unwrap_or_else(|e| {
            warn!(error = %e, "Unreadable crowded field, using defaults");
            CrowdedField::default()
        })),
        Value::Null => Ok(CrowdedField::default()),
        other => {
            debug!(crowded_field = %other, "Non-object crowded field, using defaults");
            Ok(CrowdedField::default())
        }
    }
}

fn crowded_explanation<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    let text = text_or_empty(d)?;
    Ok(if text.is_empty() {
        CROWDED_FIELD_UNKNOWN.to_string()
    } else {
        text
    })
}

fn crowded_field_unknown() -> String {
    CROWDED_FIELD_UNKNOWN.to_string()
}

/// Crowded-field summary.
///
/// `percentage` is the share of distinct owners among the hits; component
/// analyses call it `distinct_owner_percentage`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrowdedField {
    #[serde(default, deserialize_with = "lenient_bool")]
    pub is_crowded: bool,

    #[serde(default, deserialize_with = "lenient_u32")]
    pub total_hits: u32,

    #[serde(
        default,
        alias = "distinct_owner_percentage",
        deserialize_with = "lenient_f64"
    )]
    pub percentage: f64,

    #[serde(default = "crowded_field_unknown", deserialize_with = "crowded_explanation")]
    pub explanation: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for CrowdedField {
    fn default() -> Self {
        Self {
            is_crowded: false,
            total_hits: 0,
            percentage: 0.0,
            explanation: crowded_field_unknown(),
            extra: Map::new(),
        }
    }
}

/// Raw classification as returned by the oracle.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OracleClassification {
    #[serde(default, deserialize_with = "lenient_classes")]
    pub identified_coordinated_classes: Vec<u16>,

    #[serde(default, deserialize_with = "text_or_empty")]
    pub coordinated_classes_explanation: String,

    #[serde(default, deserialize_with = "entries")]
    pub identical_marks: Vec<MarkEntry>,

    #[serde(default, deserialize_with = "entries")]
    pub one_letter_marks: Vec<MarkEntry>,

    #[serde(default, deserialize_with = "entries")]
    pub two_letter_marks: Vec<MarkEntry>,

    #[serde(default, deserialize_with = "entries")]
    pub one_two_letter_marks: Vec<MarkEntry>,

    #[serde(default, deserialize_with = "entries")]
    pub similar_marks: Vec<MarkEntry>,

    #[serde(default, deserialize_with = "crowded_field")]
    pub crowded_field: CrowdedField,
}

/// Which bucket an edit distance belongs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceBucket {
    Identical,
    OneLetter,
    TwoLetter,
    Similar,
}

impl DistanceBucket {
    pub fn from_distance(distance: usize) -> Self {
        match distance {
            0 => DistanceBucket::Identical,
            1 => DistanceBucket::OneLetter,
            2 => DistanceBucket::TwoLetter,
            _ => DistanceBucket::Similar,
        }
    }
}

/// Classification after the audit. Identical, one-letter and two-letter
/// buckets are partitioned by computed edit distance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrectedBucketSet {
    pub identified_coordinated_classes: Vec<u16>,
    pub coordinated_classes_explanation: String,
    pub identical_marks: Vec<MarkEntry>,
    pub one_letter_marks: Vec<MarkEntry>,
    pub two_letter_marks: Vec<MarkEntry>,
    pub similar_marks: Vec<MarkEntry>,
    pub crowded_field: CrowdedField,
}

impl CorrectedBucketSet {
    /// Empty result used when the oracle output could not be read.
    pub fn unavailable() -> Self {
        Self {
            identified_coordinated_classes: Vec::new(),
            coordinated_classes_explanation: COORDINATED_CLASSES_UNAVAILABLE.to_string(),
            identical_marks: Vec::new(),
            one_letter_marks: Vec::new(),
            two_letter_marks: Vec::new(),
            similar_marks: Vec::new(),
            crowded_field: CrowdedField::default(),
        }
    }

    fn bucket_mut(&mut self, bucket: DistanceBucket) -> &mut Vec<MarkEntry> {
        match bucket {
            DistanceBucket::Identical => &mut self.identical_marks,
            DistanceBucket::OneLetter => &mut self.one_letter_marks,
            DistanceBucket::TwoLetter => &mut self.two_letter_marks,
            DistanceBucket::Similar => &mut self.similar_marks,
        }
    }

    pub fn total_marks(&self) -> usize {
        self.identical_marks.len()
            + self.one_letter_marks.len()
            + self.two_letter_marks.len()
            + self.similar_marks.len()
    }
}

/// Re-file the oracle's identical and near-identical entries by their edit
/// distance to `proposed_mark`.
///
/// Distance is taken on trimmed names; case differences count as edits. Entries the oracle filed
/// as similar pass through first and are not re-audited. A mark listed in
/// several near-identical buckets is kept once.
pub fn audit_classification(output: OracleClassification, proposed_mark: &str) -> CorrectedBucketSet {
    let proposed = proposed_mark.trim();

    let coordinated_classes_explanation = if output.coordinated_classes_explanation.is_empty() {
        NO_COORDINATED_CLASSES.to_string()
    } else {
        output.coordinated_classes_explanation
    };

    let mut corrected = CorrectedBucketSet {
        identified_coordinated_classes: output.identified_coordinated_classes,
        coordinated_classes_explanation,
        identical_marks: Vec::new(),
        one_letter_marks: Vec::new(),
        two_letter_marks: Vec::new(),
        similar_marks: output.similar_marks,
        crowded_field: output.crowded_field,
    };

    let mut seen = HashSet::new();
    let mut moved = 0usize;
    let near_identical = output
        .identical_marks
        .into_iter()
        .map(|e| (DistanceBucket::Identical, e))
        .chain(output.one_letter_marks.into_iter().map(|e| (DistanceBucket::OneLetter, e)))
        .chain(output.two_letter_marks.into_iter().map(|e| (DistanceBucket::TwoLetter, e)))
        .chain(
            output
                .one_two_letter_marks
                .into_iter()
                .map(|e| (DistanceBucket::OneLetter, e)),
        );

    for (claimed, entry) in near_identical {
        if !seen.insert(entry.identity()) {
            debug!(mark = %entry.mark, "Duplicate oracle entry dropped");
            continue;
        }

        let distance = edit_distance(proposed, entry.mark.trim());
        let bucket = DistanceBucket::from_distance(distance);
        if bucket != claimed {
            moved += 1;
            debug!(mark = %entry.mark, distance, ?claimed, ?bucket, "Oracle entry re-filed");
        }
        corrected.bucket_mut(bucket).push(entry);
    }

    debug!(
        proposed = %proposed_mark,
        moved,
        total = corrected.total_marks(),
        identical = corrected.identical_marks.len(),
        one_letter = corrected.one_letter_marks.len(),
        two_letter = corrected.two_letter_marks.len(),
        similar = corrected.similar_marks.len(),
        "Oracle classification audited"
    );

    corrected
}

/// Parse raw oracle text and audit it. Unreadable text yields
/// `CorrectedBucketSet::unavailable()`.
pub fn audit_oracle_text(text: &str, proposed_mark: &str) -> CorrectedBucketSet {
    match parse_oracle_json::<OracleClassification>(text) {
        Ok(output) => audit_classification(output, proposed_mark),
        Err(e) => {
            warn!(error = %e, "Oracle classification unreadable, returning empty buckets");
            CorrectedBucketSet::unavailable()
        }
    }
}
