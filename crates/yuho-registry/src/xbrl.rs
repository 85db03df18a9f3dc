//! XBRL instance parsing for EDINET filings.
//!
//! EDINET serves each document as a zip archive; the XBRL instance of the main
//! report sits under `XBRL/PublicDoc/` with an `.xbrl` extension. This module
//! reads that instance into a flat list of facts plus the reporting contexts
//! they refer to, and classifies contexts by scope, period and cumulation.
//!
//! # Example
//!
//! ```
//! use yuho_registry::xbrl::{FactValue, XbrlDocument};
//!
//! let xml = r#"<xbrli:xbrl xmlns:xbrli="http://www.xbrl.org/2003/instance"
//!                          xmlns:jppfs_cor="http://example.com/jppfs">
//!   <xbrli:context id="CurrentYearDuration">
//!     <xbrli:entity><xbrli:identifier scheme="http://disclosure.edinet-fsa.go.jp">E00001-000</xbrli:identifier></xbrli:entity>
//!     <xbrli:period><xbrli:startDate>2023-04-01</xbrli:startDate><xbrli:endDate>2024-03-31</xbrli:endDate></xbrli:period>
//!   </xbrli:context>
//!   <jppfs_cor:NetSales contextRef="CurrentYearDuration" unitRef="JPY" decimals="-6">1000000</jppfs_cor:NetSales>
//! </xbrli:xbrl>"#;
//!
//! let doc = XbrlDocument::parse_xml(xml).unwrap();
//! let fact = doc.facts_for_tag("NetSales").next().unwrap();
//! assert_eq!(fact.value, FactValue::Number(1_000_000.0));
//! assert!(doc.context(&fact.context_ref).unwrap().is_primary());
//! ```

use crate::error::{RegistryError, Result};
use chrono::NaiveDate;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::io::{Cursor, Read};

/// Directory inside an EDINET archive that holds the main report's instance.
const PUBLIC_DOC_DIR: &str = "XBRL/PublicDoc/";

/// Value of a fact: numeric when the fact carries a unit, text otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FactValue {
    /// Numeric fact (amounts, headcounts, ratios)
    Number(f64),
    /// Non-numeric fact (dates, names, text blocks)
    Text(String),
}

impl FactValue {
    /// The numeric value, if any.
    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Text(_) => None,
        }
    }
}

impl fmt::Display for FactValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) => write!(f, "{value}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

/// A single fact reported in an instance document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XbrlFact {
    /// Element name as written (e.g. "jppfs_cor:NetSales")
    pub concept: String,

    /// Id of the reporting context
    pub context_ref: String,

    /// Id of the unit, present for numeric facts (e.g. "JPY", "pure")
    pub unit_ref: Option<String>,

    /// Precision hint as written (e.g. "-6")
    pub decimals: Option<String>,

    /// Reported value
    pub value: FactValue,
}

impl XbrlFact {
    /// Element name without its namespace prefix.
    pub fn local_name(&self) -> &str {
        self.concept
            .split_once(':')
            .map_or(self.concept.as_str(), |(_, local)| local)
    }

    /// Whether this fact is reported under `tag`.
    ///
    /// A qualified tag ("jppfs_cor:NetSales") must match exactly; a bare tag
    /// ("NetSales") matches the local name under any prefix.
    pub fn matches_tag(&self, tag: &str) -> bool {
        if tag.contains(':') {
            self.concept == tag
        } else {
            self.local_name() == tag
        }
    }
}

/// Whether a context covers the group or the filer alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    /// Consolidated (連結)
    Consolidated,
    /// Standalone (個別)
    NonConsolidated,
}

/// Position of a context's period relative to the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelativePeriod {
    /// The fiscal period the report covers
    Current,
    /// Comparative prior periods
    Prior,
    /// The filing date (DEI facts)
    Filing,
    /// Anything else
    Other,
}

/// How a context's period accumulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cumulation {
    /// Point in time (balance sheet items)
    Instant,
    /// A whole period (income statement items)
    Duration,
    /// Year-to-date cumulative period (累計)
    YearToDate,
}

/// The period element of a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Period {
    /// `<xbrli:instant>`
    Instant(NaiveDate),
    /// `<xbrli:startDate>` / `<xbrli:endDate>`
    Duration {
        /// First day
        start: NaiveDate,
        /// Last day
        end: NaiveDate,
    },
    /// `<xbrli:forever/>`
    Forever,
}

/// An explicit dimension member attached to a context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionMember {
    /// Axis (e.g. "jppfs_cor:ConsolidatedOrNonConsolidatedAxis")
    pub dimension: String,
    /// Member (e.g. "jppfs_cor:NonConsolidatedMember")
    pub member: String,
}

/// A reporting context: what entity scope and period a fact describes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportingContext {
    /// Context id (e.g. "CurrentYearDuration_NonConsolidatedMember")
    pub id: String,
    /// Period, if declared
    pub period: Option<Period>,
    /// Dimension members from the segment
    pub members: Vec<DimensionMember>,
}

const NON_CONSOLIDATED_MEMBER: &str = "NonConsolidatedMember";
const CONSOLIDATION_AXIS: &str = "ConsolidatedOrNonConsolidatedAxis";

fn local(name: &str) -> &str {
    name.split_once(':').map_or(name, |(_, local)| local)
}

impl ReportingContext {
    /// A context known only by its id (no `<xbrli:context>` element seen).
    pub fn from_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            period: None,
            members: Vec::new(),
        }
    }

    fn base_id(&self) -> &str {
        self.id.split('_').next().unwrap_or(&self.id)
    }

    fn id_members(&self) -> impl Iterator<Item = &str> {
        self.id.split('_').skip(1)
    }

    /// Consolidated unless the id or a member names the standalone member.
    pub fn scope(&self) -> Scope {
        let standalone = self.id_members().any(|m| m == NON_CONSOLIDATED_MEMBER)
            || self
                .members
                .iter()
                .any(|m| local(&m.member) == NON_CONSOLIDATED_MEMBER);
        if standalone {
            Scope::NonConsolidated
        } else {
            Scope::Consolidated
        }
    }

    /// Classify the period from EDINET's context id conventions.
    pub fn relative_period(&self) -> RelativePeriod {
        let base = self.base_id();
        if ["CurrentYear", "CurrentYTD", "CurrentQuarter", "Interim"]
            .iter()
            .any(|prefix| base.starts_with(prefix))
        {
            RelativePeriod::Current
        } else if base.starts_with("Prior") {
            RelativePeriod::Prior
        } else if base.starts_with("FilingDate") {
            RelativePeriod::Filing
        } else {
            RelativePeriod::Other
        }
    }

    /// Instant, whole-period or year-to-date.
    pub fn cumulation(&self) -> Cumulation {
        let base = self.base_id();
        if base.contains("YTD") {
            return Cumulation::YearToDate;
        }
        match self.period {
            Some(Period::Instant(_)) => Cumulation::Instant,
            Some(Period::Duration { .. } | Period::Forever) => Cumulation::Duration,
            None if base.ends_with("Instant") => Cumulation::Instant,
            None => Cumulation::Duration,
        }
    }

    /// Whether the context carries dimensions besides the consolidation axis.
    pub fn has_extra_dimensions(&self) -> bool {
        self.id_members().any(|m| m != NON_CONSOLIDATED_MEMBER)
            || self
                .members
                .iter()
                .any(|m| local(&m.dimension) != CONSOLIDATION_AXIS)
    }

    /// Consolidated, current period, not year-to-date and dimension-free.
    ///
    /// Filing-date contexts count as current: they carry the report's own
    /// document and entity information.
    pub fn is_primary(&self) -> bool {
        self.scope() == Scope::Consolidated
            && matches!(
                self.relative_period(),
                RelativePeriod::Current | RelativePeriod::Filing
            )
            && self.cumulation() != Cumulation::YearToDate
            && !self.has_extra_dimensions()
    }
}

/// The facts and contexts of one XBRL instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct XbrlDocument {
    /// All non-nil facts, in document order
    pub facts: Vec<XbrlFact>,

    /// Contexts by id; every fact's `context_ref` has an entry
    pub contexts: HashMap<String, ReportingContext>,
}

impl XbrlDocument {
    /// Creates a new empty document
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the main report's instance out of an EDINET document archive.
    pub fn from_archive(bytes: &[u8]) -> Result<Self> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;

        let instance = archive
            .file_names()
            .filter(|name| name.starts_with(PUBLIC_DOC_DIR) && name.ends_with(".xbrl"))
            .min()
            .map(str::to_string)
            .ok_or_else(|| {
                RegistryError::XbrlParse(format!(
                    "No {PUBLIC_DOC_DIR}*.xbrl instance in archive"
                ))
            })?;

        let mut xml = String::new();
        archive
            .by_name(&instance)?
            .read_to_string(&mut xml)
            .map_err(|e| RegistryError::Archive(format!("Failed to read {instance}: {e}")))?;

        Self::parse_xml(&xml)
    }

    /// Parses an XBRL instance document.
    ///
    /// Nil facts are dropped. A fact with a unit whose content is not a number
    /// makes the whole document malformed.
    pub fn parse_xml(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut parser = InstanceParser::default();
        loop {
            match reader.read_event()? {
                Event::Start(e) => parser.start(&e, false)?,
                Event::Empty(e) => parser.start(&e, true)?,
                Event::End(_) => parser.end()?,
                Event::Text(t) => parser.text(&t.unescape()?),
                Event::CData(c) => parser.text(&String::from_utf8_lossy(&c)),
                Event::Eof => break,
                _ => {}
            }
        }
        parser.finish()
    }

    /// Look up a context by id.
    pub fn context(&self, id: &str) -> Option<&ReportingContext> {
        self.contexts.get(id)
    }

    /// All facts reported under `tag`, in document order.
    pub fn facts_for_tag<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a XbrlFact> + 'a {
        self.facts.iter().filter(move |fact| fact.matches_tag(tag))
    }

    /// Gets all available concepts in the document
    pub fn get_concepts(&self) -> Vec<String> {
        let mut concepts: Vec<String> = self.facts.iter().map(|f| f.concept.clone()).collect();
        concepts.sort();
        concepts.dedup();
        concepts
    }
}

#[derive(Debug)]
enum ContextField {
    StartDate,
    EndDate,
    Instant,
    Member(String),
}

#[derive(Debug)]
struct PendingFact {
    concept: String,
    context_ref: String,
    unit_ref: Option<String>,
    decimals: Option<String>,
    nil: bool,
    /// Depth of markup nested inside the fact element
    depth: usize,
    text: String,
}

#[derive(Debug, Default)]
struct PendingContext {
    id: String,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    instant: Option<NaiveDate>,
    forever: bool,
    members: Vec<DimensionMember>,
    field: Option<ContextField>,
    text: String,
}

#[derive(Debug, Default)]
struct InstanceParser {
    saw_root: bool,
    facts: Vec<XbrlFact>,
    contexts: HashMap<String, ReportingContext>,
    context: Option<PendingContext>,
    fact: Option<PendingFact>,
    /// Local names of open elements outside facts
    open: Vec<Vec<u8>>,
}

fn attribute(e: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr.map_err(|err| RegistryError::XbrlParse(err.to_string()))?;
        if attr.key.as_ref() == name || attr.key.local_name().as_ref() == name {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn parse_date(text: &str, context_id: &str) -> Result<NaiveDate> {
    // Instants are sometimes written as dateTime
    let date = text.trim().get(..10).unwrap_or(text.trim());
    NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|e| {
        RegistryError::XbrlParse(format!("Invalid date {text:?} in context {context_id}: {e}"))
    })
}

impl InstanceParser {
    fn start(&mut self, e: &BytesStart<'_>, empty: bool) -> Result<()> {
        if let Some(fact) = self.fact.as_mut() {
            if !empty {
                fact.depth += 1;
            }
            return Ok(());
        }

        let local_name = e.local_name().as_ref().to_vec();
        if !empty {
            self.open.push(local_name.clone());
        }

        if let Some(context) = self.context.as_mut() {
            context.text.clear();
            context.field = match local_name.as_slice() {
                b"startDate" => Some(ContextField::StartDate),
                b"endDate" => Some(ContextField::EndDate),
                b"instant" => Some(ContextField::Instant),
                b"explicitMember" | b"typedMember" => {
                    let dimension = attribute(e, b"dimension")?.unwrap_or_default();
                    Some(ContextField::Member(dimension))
                }
                b"forever" => {
                    context.forever = true;
                    None
                }
                _ => None,
            };
            if empty {
                self.close_context_field()?;
            }
            return Ok(());
        }

        match local_name.as_slice() {
            b"xbrl" => self.saw_root = true,
            b"context" => {
                let id = attribute(e, b"id")?.ok_or_else(|| {
                    RegistryError::XbrlParse("Context without an id".to_string())
                })?;
                self.context = Some(PendingContext {
                    id,
                    ..PendingContext::default()
                });
                if empty {
                    self.open.pop();
                    self.close_context()?;
                }
            }
            _ => {
                if let Some(context_ref) = attribute(e, b"contextRef")? {
                    if !empty {
                        self.open.pop();
                    }
                    self.fact = Some(PendingFact {
                        concept: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
                        context_ref,
                        unit_ref: attribute(e, b"unitRef")?,
                        decimals: attribute(e, b"decimals")?,
                        nil: attribute(e, b"nil")?.is_some_and(|v| v == "true"),
                        depth: 0,
                        text: String::new(),
                    });
                    if empty {
                        self.close_fact()?;
                    }
                }
            }
        }
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        if let Some(fact) = self.fact.as_mut() {
            if fact.depth > 0 {
                fact.depth -= 1;
                return Ok(());
            }
            return self.close_fact();
        }

        let closed = self.open.pop().unwrap_or_default();
        if self.context.is_some() {
            if closed.as_slice() == b"context" {
                self.close_context()?;
            } else {
                self.close_context_field()?;
            }
        }
        Ok(())
    }

    fn text(&mut self, text: &str) {
        if let Some(fact) = self.fact.as_mut() {
            fact.text.push_str(text);
        } else if let Some(context) = self.context.as_mut() {
            context.text.push_str(text);
        }
    }

    fn close_context_field(&mut self) -> Result<()> {
        let Some(context) = self.context.as_mut() else {
            return Ok(());
        };
        let text = std::mem::take(&mut context.text);
        match context.field.take() {
            Some(ContextField::StartDate) => context.start = Some(parse_date(&text, &context.id)?),
            Some(ContextField::EndDate) => context.end = Some(parse_date(&text, &context.id)?),
            Some(ContextField::Instant) => context.instant = Some(parse_date(&text, &context.id)?),
            Some(ContextField::Member(dimension)) => context.members.push(DimensionMember {
                dimension,
                member: text.trim().to_string(),
            }),
            None => {}
        }
        Ok(())
    }

    fn close_context(&mut self) -> Result<()> {
        let Some(pending) = self.context.take() else {
            return Ok(());
        };
        let period = match (pending.instant, pending.start, pending.end) {
            (Some(instant), _, _) => Some(Period::Instant(instant)),
            (None, Some(start), Some(end)) => Some(Period::Duration { start, end }),
            (None, None, None) if pending.forever => Some(Period::Forever),
            (None, None, None) => None,
            _ => {
                return Err(RegistryError::XbrlParse(format!(
                    "Context {} has an incomplete period",
                    pending.id
                )));
            }
        };
        self.contexts.insert(
            pending.id.clone(),
            ReportingContext {
                id: pending.id,
                period,
                members: pending.members,
            },
        );
        Ok(())
    }

    fn close_fact(&mut self) -> Result<()> {
        let Some(pending) = self.fact.take() else {
            return Ok(());
        };
        if pending.nil {
            return Ok(());
        }

        let value = if pending.unit_ref.is_some() {
            let raw = pending.text.trim();
            let number = raw.parse::<f64>().map_err(|_| {
                RegistryError::XbrlParse(format!(
                    "Non-numeric value {raw:?} for {} in context {}",
                    pending.concept, pending.context_ref
                ))
            })?;
            FactValue::Number(number)
        } else {
            FactValue::Text(pending.text)
        };

        self.facts.push(XbrlFact {
            concept: pending.concept,
            context_ref: pending.context_ref,
            unit_ref: pending.unit_ref,
            decimals: pending.decimals,
            value,
        });
        Ok(())
    }

    fn finish(mut self) -> Result<XbrlDocument> {
        if !self.saw_root {
            return Err(RegistryError::XbrlParse(
                "Not an XBRL instance: missing <xbrl> root element".to_string(),
            ));
        }
        if self.fact.is_some() || self.context.is_some() {
            return Err(RegistryError::XbrlParse(
                "Unexpected end of document".to_string(),
            ));
        }

        for fact in &self.facts {
            self.contexts
                .entry(fact.context_ref.clone())
                .or_insert_with(|| ReportingContext::from_id(fact.context_ref.clone()));
        }

        Ok(XbrlDocument {
            facts: self.facts,
            contexts: self.contexts,
        })
    }
}

/// Common EDINET taxonomy elements for annual securities reports
pub mod concepts {
    /// Japanese GAAP financial statement elements (jppfs)
    pub mod jppfs {
        /// Net sales (売上高)
        pub const NET_SALES: &str = "jppfs_cor:NetSales";

        /// Operating revenue (営業収益)
        pub const OPERATING_REVENUE: &str = "jppfs_cor:OperatingRevenue1";

        /// Operating income (営業利益)
        pub const OPERATING_INCOME: &str = "jppfs_cor:OperatingIncome";

        /// Ordinary income (経常利益)
        pub const ORDINARY_INCOME: &str = "jppfs_cor:OrdinaryIncome";

        /// Profit attributable to owners of parent (親会社株主に帰属する当期純利益)
        pub const PROFIT_ATTRIBUTABLE_TO_OWNERS: &str =
            "jppfs_cor:ProfitLossAttributableToOwnersOfParent";

        /// Profit (当期純利益)
        pub const PROFIT_LOSS: &str = "jppfs_cor:ProfitLoss";

        /// Total assets (資産合計)
        pub const ASSETS: &str = "jppfs_cor:Assets";

        /// Net assets (純資産合計)
        pub const NET_ASSETS: &str = "jppfs_cor:NetAssets";

        /// Capital stock (資本金)
        pub const CAPITAL_STOCK: &str = "jppfs_cor:CapitalStock";
    }

    /// Cabinet Office ordinance elements (jpcrp), mostly the key-figures summary
    pub mod jpcrp {
        /// Net sales in the summary of business results
        pub const NET_SALES_SUMMARY: &str = "jpcrp_cor:NetSalesSummaryOfBusinessResults";

        /// IFRS revenue in the summary of business results
        pub const REVENUE_IFRS_SUMMARY: &str = "jpcrp_cor:RevenueIFRSSummaryOfBusinessResults";

        /// Ordinary income in the summary of business results
        pub const ORDINARY_INCOME_SUMMARY: &str =
            "jpcrp_cor:OrdinaryIncomeLossSummaryOfBusinessResults";

        /// Profit attributable to owners of parent in the summary
        pub const PROFIT_ATTRIBUTABLE_TO_OWNERS_SUMMARY: &str =
            "jpcrp_cor:ProfitLossAttributableToOwnersOfParentSummaryOfBusinessResults";

        /// Net income in the summary (standalone filers)
        pub const NET_INCOME_SUMMARY: &str = "jpcrp_cor:NetIncomeLossSummaryOfBusinessResults";

        /// Total assets in the summary
        pub const TOTAL_ASSETS_SUMMARY: &str = "jpcrp_cor:TotalAssetsSummaryOfBusinessResults";

        /// Net assets in the summary
        pub const NET_ASSETS_SUMMARY: &str = "jpcrp_cor:NetAssetsSummaryOfBusinessResults";

        /// Capital stock in the summary
        pub const CAPITAL_STOCK_SUMMARY: &str = "jpcrp_cor:CapitalStockSummaryOfBusinessResults";

        /// Number of employees (従業員数)
        pub const NUMBER_OF_EMPLOYEES: &str = "jpcrp_cor:NumberOfEmployees";
    }

    /// IFRS elements (jpigp)
    pub mod jpigp {
        /// Revenue
        pub const REVENUE: &str = "jpigp_cor:RevenueIFRS";

        /// Operating profit
        pub const OPERATING_PROFIT: &str = "jpigp_cor:OperatingProfitLossIFRS";

        /// Profit attributable to owners of parent
        pub const PROFIT_ATTRIBUTABLE_TO_OWNERS: &str =
            "jpigp_cor:ProfitLossAttributableToOwnersOfParentIFRS";

        /// Total assets
        pub const ASSETS: &str = "jpigp_cor:AssetsIFRS";

        /// Total equity
        pub const EQUITY: &str = "jpigp_cor:EquityIFRS";
    }

    /// Document and entity information (jpdei)
    pub mod jpdei {
        /// Fiscal year end date of the current period
        pub const CURRENT_FISCAL_YEAR_END: &str = "jpdei_cor:CurrentFiscalYearEndDateDEI";

        /// Filer name in Japanese
        pub const FILER_NAME: &str = "jpdei_cor:FilerNameInJapaneseDEI";
    }
}
