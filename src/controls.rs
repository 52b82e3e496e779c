//! User-facing control values.
//!
//! Every control is a plain value type with `PartialEq`, so the view graph can
//! ignore writes that do not change anything.

use crate::table::Field;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Closed numeric interval `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    /// Bounds given in the wrong order are swapped, as a two-handle slider would.
    pub fn new(a: f64, b: f64) -> Self {
        if a <= b {
            Range { min: a, max: b }
        } else {
            Range { min: b, max: a }
        }
    }

    #[inline]
    pub fn contains(&self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

/// Row filter over the base table. Both intervals are inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterCriteria {
    pub happiness: Range,
    pub gdp: Range,
}

impl FilterCriteria {
    pub fn matches(&self, ladder_score: f64, logged_gdp: f64) -> bool {
        self.happiness.contains(ladder_score) && self.gdp.contains(logged_gdp)
    }
}

impl Default for FilterCriteria {
    fn default() -> Self {
        FilterCriteria {
            happiness: DEFAULT_HAPPINESS_RANGE,
            gdp: DEFAULT_GDP_RANGE,
        }
    }
}

/// Error for an unknown factor or clustering feature identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown identifier '{0}'")]
pub struct UnknownIdentifier(pub String);

/// Factors selectable for the scatter panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Factor {
    Gdp,
    Social,
    Health,
    Freedom,
    Generosity,
    Corruption,
}

impl Factor {
    pub const ALL: [Factor; 6] = [
        Factor::Gdp,
        Factor::Social,
        Factor::Health,
        Factor::Freedom,
        Factor::Generosity,
        Factor::Corruption,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Factor::Gdp => "gdp",
            Factor::Social => "social",
            Factor::Health => "health",
            Factor::Freedom => "freedom",
            Factor::Generosity => "generosity",
            Factor::Corruption => "corruption",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Factor::Gdp => "GDP per Capita",
            Factor::Social => "Social Support",
            Factor::Health => "Life Expectancy",
            Factor::Freedom => "Freedom to Make Choices",
            Factor::Generosity => "Generosity",
            Factor::Corruption => "Corruption Perception",
        }
    }

    pub fn field(self) -> Field {
        match self {
            Factor::Gdp => Field::LoggedGdp,
            Factor::Social => Field::SocialSupport,
            Factor::Health => Field::HealthyLifeExpectancy,
            Factor::Freedom => Field::Freedom,
            Factor::Generosity => Field::Generosity,
            Factor::Corruption => Field::Corruption,
        }
    }
}

impl FromStr for Factor {
    type Err = UnknownIdentifier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Factor::ALL
            .into_iter()
            .find(|f| f.id() == s)
            .ok_or_else(|| UnknownIdentifier(s.to_string()))
    }
}

/// Columns selectable as clustering features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterFeature {
    Ladder,
    Gdp,
    Social,
    Health,
    Freedom,
}

impl ClusterFeature {
    pub const ALL: [ClusterFeature; 5] = [
        ClusterFeature::Ladder,
        ClusterFeature::Gdp,
        ClusterFeature::Social,
        ClusterFeature::Health,
        ClusterFeature::Freedom,
    ];

    pub fn id(self) -> &'static str {
        match self {
            ClusterFeature::Ladder => "ladder",
            ClusterFeature::Gdp => "gdp",
            ClusterFeature::Social => "social",
            ClusterFeature::Health => "health",
            ClusterFeature::Freedom => "freedom",
        }
    }

    pub fn field(self) -> Field {
        match self {
            ClusterFeature::Ladder => Field::LadderScore,
            ClusterFeature::Gdp => Field::LoggedGdp,
            ClusterFeature::Social => Field::SocialSupport,
            ClusterFeature::Health => Field::HealthyLifeExpectancy,
            ClusterFeature::Freedom => Field::Freedom,
        }
    }
}

impl FromStr for ClusterFeature {
    type Err = UnknownIdentifier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ClusterFeature::ALL
            .into_iter()
            .find(|f| f.id() == s)
            .ok_or_else(|| UnknownIdentifier(s.to_string()))
    }
}

pub const DEFAULT_HAPPINESS_RANGE: Range = Range { min: 3.0, max: 8.0 };
pub const DEFAULT_GDP_RANGE: Range = Range { min: 7.0, max: 11.5 };
pub const DEFAULT_CLUSTER_COUNT: usize = 4;
/// Maximum rows in the searched table.
pub const SEARCH_LIMIT: usize = 20;
/// Number of bars in the top-countries chart.
pub const TOP_COUNTRIES: usize = 10;

pub fn default_factors() -> BTreeSet<Factor> {
    [Factor::Gdp, Factor::Social, Factor::Health].into_iter().collect()
}

pub fn default_cluster_features() -> BTreeSet<ClusterFeature> {
    [
        ClusterFeature::Ladder,
        ClusterFeature::Gdp,
        ClusterFeature::Social,
        ClusterFeature::Health,
    ]
    .into_iter()
    .collect()
}

/// A partial change to the controls. Absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlUpdate {
    pub happiness_range: Option<Range>,
    pub gdp_range: Option<Range>,
    pub factors: Option<BTreeSet<Factor>>,
    pub cluster_count: Option<usize>,
    pub cluster_features: Option<BTreeSet<ClusterFeature>>,
    pub search: Option<String>,
}

impl ControlUpdate {
    pub fn is_empty(&self) -> bool {
        *self == ControlUpdate::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_is_closed() {
        let range = Range::new(3.0, 8.0);
        assert!(range.contains(3.0));
        assert!(range.contains(8.0));
        assert!(!range.contains(8.000001));
        assert!(!range.contains(f64::NAN));
    }

    #[test]
    fn test_range_swaps_reversed_bounds() {
        assert_eq!(Range::new(9.0, 2.0), Range { min: 2.0, max: 9.0 });
    }

    #[test]
    fn test_identifiers_parse() {
        assert_eq!("social".parse::<Factor>(), Ok(Factor::Social));
        assert_eq!("ladder".parse::<ClusterFeature>(), Ok(ClusterFeature::Ladder));
        assert!("happiness".parse::<Factor>().is_err());
        assert!("corruption".parse::<ClusterFeature>().is_err());
    }

    #[test]
    fn test_control_update_from_json() {
        let update: ControlUpdate = serde_json::from_str(
            r#"{"cluster_count": 3, "factors": ["gdp", "freedom"], "search": "land"}"#,
        )
        .unwrap();

        assert_eq!(update.cluster_count, Some(3));
        assert_eq!(
            update.factors,
            Some([Factor::Gdp, Factor::Freedom].into_iter().collect())
        );
        assert_eq!(update.search.as_deref(), Some("land"));
        assert!(update.happiness_range.is_none());
        assert!(!update.is_empty());
        assert!(ControlUpdate::default().is_empty());
    }

    #[test]
    fn test_cluster_features_keep_choice_order() {
        let features: Vec<_> = default_cluster_features().into_iter().collect();
        assert_eq!(
            features,
            vec![
                ClusterFeature::Ladder,
                ClusterFeature::Gdp,
                ClusterFeature::Social,
                ClusterFeature::Health
            ]
        );
    }
}
