//! Field repair for component-analysis oracle output.

use crate::buckets::{crowded_field, entries, CrowdedField, MarkEntry, NO_COORDINATED_CLASSES};
use crate::parse::{lenient_classes, parse_oracle_json, text_or_empty, OracleOutputError};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Legal strength of a mark component.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Distinctiveness {
    Generic,
    #[default]
    Descriptive,
    Suggestive,
    Arbitrary,
    Fanciful,
}

impl Distinctiveness {
    fn parse(text: &str) -> Option<Self> {
        match text.trim().to_uppercase().as_str() {
            "GENERIC" => Some(Self::Generic),
            "DESCRIPTIVE" => Some(Self::Descriptive),
            "SUGGESTIVE" => Some(Self::Suggestive),
            "ARBITRARY" => Some(Self::Arbitrary),
            "FANCIFUL" => Some(Self::Fanciful),
            _ => None,
        }
    }
}

/// Unrecognised labels read as `Descriptive`.
impl<'de> Deserialize<'de> for Distinctiveness {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let text = text_or_empty(d)?;
        Ok(Distinctiveness::parse(&text).unwrap_or_default())
    }
}

/// One component of a compound mark and the marks that share it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    /// Empty until repaired
    #[serde(default, deserialize_with = "text_or_empty")]
    pub component: String,

    #[serde(default, deserialize_with = "entries")]
    pub marks: Vec<MarkEntry>,

    #[serde(default)]
    pub distinctiveness: Distinctiveness,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Component analysis as returned by the oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentAnalysis {
    #[serde(default, deserialize_with = "lenient_classes")]
    pub identified_coordinated_classes: Vec<u16>,

    #[serde(default, deserialize_with = "text_or_empty")]
    pub coordinated_classes_explanation: String,

    #[serde(default, deserialize_with = "components")]
    pub components: Vec<Component>,

    #[serde(default, deserialize_with = "crowded_field")]
    pub crowded_field: CrowdedField,
}

/// Component list; a bare string names a component, other non-objects are
/// skipped and a section that is not a list reads as empty.
fn components<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Component>, D::Error> {
    let Value::Array(items) = Value::deserialize(d)? else {
        return Ok(Vec::new());
    };

    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            Value::String(name) => Some(Component {
                component: name.trim().to_string(),
                marks: Vec::new(),
                distinctiveness: Distinctiveness::default(),
                extra: Map::new(),
            }),
            Value::Object(map) => match serde_json::from_value(Value::Object(map)) {
                Ok(component) => Some(component),
                Err(e) => {
                    warn!(error = %e, "Unreadable component skipped");
                    None
                }
            },
            other => {
                debug!(component = %other, "Non-object component skipped");
                None
            }
        })
        .collect())
}

/// Fill in everything a component analysis may be missing.
///
/// Unnamed components become `Component {n}` (1-based). Mark entries and
/// the crowded field were already defaulted while deserializing.
pub fn repair_component_analysis(mut analysis: ComponentAnalysis) -> ComponentAnalysis {
    if analysis.coordinated_classes_explanation.is_empty() {
        analysis.coordinated_classes_explanation = NO_COORDINATED_CLASSES.to_string();
    }

    for (i, component) in analysis.components.iter_mut().enumerate() {
        if component.component.is_empty() {
            component.component = format!("Component {}", i + 1);
            debug!(index = i, "Unnamed component repaired");
        }
    }

    analysis
}

/// Parse raw oracle text into a repaired component analysis.
pub fn parse_component_analysis(text: &str) -> Result<ComponentAnalysis, OracleOutputError> {
    parse_oracle_json(text).map(repair_component_analysis)
}
