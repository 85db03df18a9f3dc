//! Indicator definitions: which figures to extract and under which tags.

use crate::error::{ExtractError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use yuho_registry::xbrl::concepts::{jpcrp, jpdei, jpigp, jppfs};

/// One figure to extract, with the tags it may be reported under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Indicator {
    /// Output name (e.g. "NetSales")
    pub name: String,

    /// Candidate tags in priority order
    pub tags: Vec<String>,
}

impl Indicator {
    /// Create an indicator from a name and its tags.
    pub fn new<I, S>(name: impl Into<String>, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            tags: tags.into_iter().map(Into::into).collect(),
        }
    }
}

/// Ordered, validated set of indicators.
///
/// Names are unique and every indicator has at least one tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct IndicatorSpec {
    indicators: Vec<Indicator>,
}

impl IndicatorSpec {
    /// Validate a list of indicators.
    pub fn new(indicators: Vec<Indicator>) -> Result<Self> {
        if indicators.is_empty() {
            return Err(ExtractError::EmptySpec);
        }

        let mut seen = HashSet::new();
        for (position, indicator) in indicators.iter().enumerate() {
            if indicator.name.trim().is_empty() {
                return Err(ExtractError::EmptyName(position));
            }
            if !seen.insert(indicator.name.as_str()) {
                return Err(ExtractError::DuplicateIndicator(indicator.name.clone()));
            }
            if indicator.tags.iter().all(|tag| tag.trim().is_empty()) {
                return Err(ExtractError::NoTags(indicator.name.clone()));
            }
        }

        Ok(Self { indicators })
    }

    /// Parse a JSON array of `{"name": ..., "tags": [...]}` objects.
    ///
    /// # Example
    ///
    /// ```
    /// use yuho_extract::IndicatorSpec;
    ///
    /// let spec = IndicatorSpec::from_json(
    ///     r#"[{"name": "Revenue", "tags": ["jppfs_cor:NetSales", "RevenueIFRS"]}]"#,
    /// ).unwrap();
    /// assert_eq!(spec.names().collect::<Vec<_>>(), vec!["Revenue"]);
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        let indicators: Vec<Indicator> = serde_json::from_str(json)?;
        Self::new(indicators)
    }

    /// Load a spec from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Indicators in output order.
    pub fn indicators(&self) -> &[Indicator] {
        &self.indicators
    }

    /// Indicator names in output order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.indicators.iter().map(|indicator| indicator.name.as_str())
    }

    /// Look up an indicator by name.
    pub fn get(&self, name: &str) -> Option<&Indicator> {
        self.indicators.iter().find(|indicator| indicator.name == name)
    }

    /// Number of indicators.
    pub fn len(&self) -> usize {
        self.indicators.len()
    }

    /// Always false for a validated spec.
    pub fn is_empty(&self) -> bool {
        self.indicators.is_empty()
    }
}

impl<'de> Deserialize<'de> for IndicatorSpec {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let indicators = Vec::<Indicator>::deserialize(deserializer)?;
        Self::new(indicators).map_err(serde::de::Error::custom)
    }
}

impl Default for IndicatorSpec {
    /// Key figures of an annual securities report.
    ///
    /// Japanese GAAP statement elements come first, then IFRS, then the
    /// key-figures summary that every filer includes.
    fn default() -> Self {
        let indicators = vec![
            Indicator::new(
                "NetSales",
                [
                    jppfs::NET_SALES,
                    jppfs::OPERATING_REVENUE,
                    jpigp::REVENUE,
                    jpcrp::NET_SALES_SUMMARY,
                    jpcrp::REVENUE_IFRS_SUMMARY,
                ],
            ),
            Indicator::new(
                "OperatingIncome",
                [jppfs::OPERATING_INCOME, jpigp::OPERATING_PROFIT],
            ),
            Indicator::new(
                "OrdinaryIncome",
                [jppfs::ORDINARY_INCOME, jpcrp::ORDINARY_INCOME_SUMMARY],
            ),
            Indicator::new(
                "NetIncome",
                [
                    jppfs::PROFIT_ATTRIBUTABLE_TO_OWNERS,
                    jpigp::PROFIT_ATTRIBUTABLE_TO_OWNERS,
                    jppfs::PROFIT_LOSS,
                    jpcrp::PROFIT_ATTRIBUTABLE_TO_OWNERS_SUMMARY,
                    jpcrp::NET_INCOME_SUMMARY,
                ],
            ),
            Indicator::new(
                "TotalAssets",
                [jppfs::ASSETS, jpigp::ASSETS, jpcrp::TOTAL_ASSETS_SUMMARY],
            ),
            Indicator::new(
                "NetAssets",
                [jppfs::NET_ASSETS, jpigp::EQUITY, jpcrp::NET_ASSETS_SUMMARY],
            ),
            Indicator::new(
                "Capital",
                [jppfs::CAPITAL_STOCK, jpcrp::CAPITAL_STOCK_SUMMARY],
            ),
            Indicator::new("Employees", [jpcrp::NUMBER_OF_EMPLOYEES]),
            Indicator::new("FiscalYearEnd", [jpdei::CURRENT_FISCAL_YEAR_END]),
        ];
        Self { indicators }
    }
}
