//! Locating indicator values in an XBRL instance.
//!
//! Extraction runs in two passes over each indicator's tags:
//! 1. the first fact, in tag order, whose context is primary
//!    (see [`ReportingContext::is_primary`]);
//! 2. otherwise the first tag with any fact at all, taking the fact whose
//!    context ranks best. Such results are marked [`ContextMatch::Fallback`].

use crate::indicators::{Indicator, IndicatorSpec};
use serde::{Deserialize, Serialize};
use tracing::debug;
use yuho_registry::xbrl::{
    Cumulation, FactValue, RelativePeriod, ReportingContext, Scope, XbrlDocument, XbrlFact,
};

/// How the context of an extracted fact was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextMatch {
    /// Consolidated, current period, non-cumulative, no extra dimensions
    Primary,
    /// No primary fact existed; best remaining context used
    Fallback,
}

/// Value of one indicator in one report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IndicatorValue {
    /// A fact was found
    Found {
        /// Reported value
        value: FactValue,
        /// Unit id of the fact, if numeric
        unit: Option<String>,
        /// Element the fact was reported under
        tag: String,
        /// Context id of the fact
        context_ref: String,
        /// Whether the context was primary
        context_match: ContextMatch,
    },
    /// None of the indicator's tags occur in the report
    NotFound,
}

impl IndicatorValue {
    /// Whether a fact was found.
    pub const fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }

    /// The found value, if any.
    pub const fn value(&self) -> Option<&FactValue> {
        match self {
            Self::Found { value, .. } => Some(value),
            Self::NotFound => None,
        }
    }

    /// The unit of the found value, if any.
    pub fn unit(&self) -> Option<&str> {
        match self {
            Self::Found { unit, .. } => unit.as_deref(),
            Self::NotFound => None,
        }
    }
}

/// An indicator name paired with its value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedFact {
    /// Indicator name
    pub indicator: String,
    /// Found value or explicit absence
    pub value: IndicatorValue,
}

/// Extraction result: one entry per configured indicator, in spec order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractedIndicators {
    facts: Vec<ExtractedFact>,
}

impl ExtractedIndicators {
    /// Value of `indicator`, if it was configured.
    pub fn get(&self, indicator: &str) -> Option<&IndicatorValue> {
        self.facts
            .iter()
            .find(|fact| fact.indicator == indicator)
            .map(|fact| &fact.value)
    }

    /// Entries in spec order.
    pub fn iter(&self) -> impl Iterator<Item = &ExtractedFact> {
        self.facts.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.facts.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// Number of indicators that were found.
    pub fn found_count(&self) -> usize {
        self.facts.iter().filter(|fact| fact.value.is_found()).count()
    }

    /// Take the entries.
    pub fn into_facts(self) -> Vec<ExtractedFact> {
        self.facts
    }
}

impl IntoIterator for ExtractedIndicators {
    type Item = ExtractedFact;
    type IntoIter = std::vec::IntoIter<ExtractedFact>;

    fn into_iter(self) -> Self::IntoIter {
        self.facts.into_iter()
    }
}

/// Extract every indicator of `spec` from `payload`.
///
/// Total: the result has exactly one entry per indicator, in spec order.
pub fn extract(payload: &XbrlDocument, spec: &IndicatorSpec) -> ExtractedIndicators {
    let facts = spec
        .indicators()
        .iter()
        .map(|indicator| ExtractedFact {
            indicator: indicator.name.clone(),
            value: extract_indicator(payload, indicator),
        })
        .collect();
    ExtractedIndicators { facts }
}

/// Extract a single indicator.
pub fn extract_indicator(payload: &XbrlDocument, indicator: &Indicator) -> IndicatorValue {
    if let Some((tag, fact)) = find_primary(payload, indicator) {
        return found(tag, fact, ContextMatch::Primary);
    }

    match find_fallback(payload, indicator) {
        Some((tag, fact)) => {
            debug!(
                indicator = %indicator.name,
                tag,
                context = %fact.context_ref,
                "No primary context, using fallback"
            );
            found(tag, fact, ContextMatch::Fallback)
        }
        None => IndicatorValue::NotFound,
    }
}

fn found(tag: &str, fact: &XbrlFact, context_match: ContextMatch) -> IndicatorValue {
    IndicatorValue::Found {
        value: fact.value.clone(),
        unit: fact.unit_ref.clone(),
        tag: tag.to_string(),
        context_ref: fact.context_ref.clone(),
        context_match,
    }
}

fn with_context<T>(
    payload: &XbrlDocument,
    fact: &XbrlFact,
    f: impl FnOnce(&ReportingContext) -> T,
) -> T {
    match payload.context(&fact.context_ref) {
        Some(context) => f(context),
        None => f(&ReportingContext::from_id(fact.context_ref.clone())),
    }
}

fn find_primary<'a>(
    payload: &'a XbrlDocument,
    indicator: &'a Indicator,
) -> Option<(&'a str, &'a XbrlFact)> {
    indicator.tags.iter().find_map(|tag| {
        payload
            .facts_for_tag(tag)
            .find(|fact| with_context(payload, fact, ReportingContext::is_primary))
            .map(|fact| (tag.as_str(), fact))
    })
}

fn find_fallback<'a>(
    payload: &'a XbrlDocument,
    indicator: &'a Indicator,
) -> Option<(&'a str, &'a XbrlFact)> {
    indicator.tags.iter().find_map(|tag| {
        payload
            .facts_for_tag(tag)
            .min_by_key(|fact| with_context(payload, fact, fallback_rank))
            .map(|fact| (tag.as_str(), fact))
    })
}

/// Lower is better. `min_by_key` keeps the first of equal ranks, so ties fall
/// back to document order.
fn fallback_rank(context: &ReportingContext) -> (u8, u8, u8, u8) {
    let period = match context.relative_period() {
        RelativePeriod::Current | RelativePeriod::Filing => 0,
        RelativePeriod::Other => 1,
        RelativePeriod::Prior => 2,
    };
    let scope = match context.scope() {
        Scope::Consolidated => 0,
        Scope::NonConsolidated => 1,
    };
    let dimensions = u8::from(context.has_extra_dimensions());
    let cumulative = u8::from(context.cumulation() == Cumulation::YearToDate);
    (period, scope, dimensions, cumulative)
}
