/// Presentation adapters
///
/// Stateless builders that turn tables into serializable chart and table
/// specifications. The JSON follows the trace/layout shape of common
/// plotting front ends, so a client can hand `traces` and `layout` straight
/// to its renderer. Every builder fails with [`SpecBuildError`] when the table
/// lacks a column it needs.

use crate::cluster::{cluster_name, ClusteredTable};
use crate::column::ColumnValue;
use crate::controls::{Factor, TOP_COUNTRIES};
use crate::error::{SpecBuildError, StatsError, TableError};
use crate::stats::{correlation_matrix, summarize};
use crate::table::{Field, Table};
use crate::view::{FilterView, ProjectionView, SortKey, SortedView};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Placeholder shown in a stat card when there is nothing to summarize.
pub const NO_DATA: &str = "—";

pub const HISTOGRAM_BINS: usize = 30;
pub const CLUSTER_TOP_COUNTRIES: usize = 3;

/// Columns of the data explorer listing.
pub const LISTING_FIELDS: [Field; 6] = [
    Field::CountryName,
    Field::LadderScore,
    Field::LoggedGdp,
    Field::SocialSupport,
    Field::HealthyLifeExpectancy,
    Field::Freedom,
];

/// Marker colour: one colour for the whole trace or one value per point.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MarkerColor {
    Fixed(String),
    Values(Vec<f64>),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Marker {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<MarkerColor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colorscale: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub showscale: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Trace {
    Bar {
        x: Vec<f64>,
        y: Vec<String>,
        orientation: String,
        marker: Marker,
    },
    Histogram {
        x: Vec<f64>,
        nbinsx: usize,
        marker: Marker,
    },
    Scatter {
        name: String,
        x: Vec<f64>,
        y: Vec<f64>,
        mode: String,
        marker: Marker,
    },
    Heatmap {
        z: Vec<Vec<f64>>,
        x: Vec<String>,
        y: Vec<String>,
        text: Vec<Vec<String>>,
        colorscale: String,
        zmid: f64,
    },
    Scatter3d {
        x: Vec<f64>,
        y: Vec<f64>,
        z: Vec<f64>,
        text: Vec<String>,
        mode: String,
        marker: Marker,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Layout {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xaxis_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yaxis_title: Option<String>,
    /// Only set for 3-D scenes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zaxis_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    pub traces: Vec<Trace>,
    pub layout: Layout,
}

/// Tabular panel: header plus JSON cells.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSpec {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl TableSpec {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Formatted headline statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatCards {
    pub count: String,
    pub mean: String,
    pub median: String,
    pub std: String,
}

fn column_error(panel: &'static str) -> impl Fn(TableError) -> SpecBuildError {
    move |source| SpecBuildError::Column { panel, source }
}

fn names(table: &Table, panel: &'static str) -> Result<Vec<String>, SpecBuildError> {
    Ok(table.texts(Field::CountryName).map_err(column_error(panel))?.to_vec())
}

/// Numeric column with missing cells shown as NaN (serialized as null).
fn series(table: &Table, field: Field, panel: &'static str) -> Result<Vec<f64>, SpecBuildError> {
    Ok(table
        .numbers(field)
        .map_err(column_error(panel))?
        .iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect())
}

/// Count, mean, median and standard deviation of the happiness score.
pub fn stat_cards(table: &Table) -> Result<StatCards, SpecBuildError> {
    match summarize(table, Field::LadderScore) {
        Ok(s) => Ok(StatCards {
            count: s.count.to_string(),
            mean: format!("{:.2}", s.mean),
            median: format!("{:.2}", s.median),
            std: format!("{:.2}", s.std),
        }),
        Err(StatsError::EmptyInput { .. }) => Ok(StatCards {
            count: "0".to_string(),
            mean: NO_DATA.to_string(),
            median: NO_DATA.to_string(),
            std: NO_DATA.to_string(),
        }),
        Err(source) => Err(SpecBuildError::Statistics {
            panel: "summary_stats",
            source,
        }),
    }
}

/// Horizontal bar of the `n` happiest countries, lowest at the bottom.
pub fn top_countries_bar(table: &Arc<Table>, n: usize) -> Result<ChartSpec, SpecBuildError> {
    const PANEL: &str = "top_countries";
    let top = SortedView::new(
        "top_countries",
        Arc::clone(table),
        vec![SortKey::descending(Field::LadderScore)],
    )
    .map_err(column_error(PANEL))?
    .top(n)
    .reversed()
    .materialize()
    .map_err(column_error(PANEL))?;

    let scores = series(&top, Field::LadderScore, PANEL)?;
    Ok(ChartSpec {
        traces: vec![Trace::Bar {
            x: scores.clone(),
            y: names(&top, PANEL)?,
            orientation: "h".to_string(),
            marker: Marker {
                color: Some(MarkerColor::Values(scores)),
                colorscale: Some("Viridis".to_string()),
                showscale: Some(false),
                ..Marker::default()
            },
        }],
        layout: Layout {
            title: format!("Top {n} Happiest Countries"),
            xaxis_title: Some("Happiness Score".to_string()),
            yaxis_title: Some("Country".to_string()),
            height: Some(400),
            ..Layout::default()
        },
    })
}

/// Top-countries bar with the default count.
pub fn top_ten_bar(table: &Arc<Table>) -> Result<ChartSpec, SpecBuildError> {
    top_countries_bar(table, TOP_COUNTRIES)
}

pub fn score_histogram(table: &Table) -> Result<ChartSpec, SpecBuildError> {
    let scores = table
        .present_values(Field::LadderScore)
        .map_err(column_error("distribution"))?;
    Ok(ChartSpec {
        traces: vec![Trace::Histogram {
            x: scores,
            nbinsx: HISTOGRAM_BINS,
            marker: Marker {
                color: Some(MarkerColor::Fixed("rgba(102, 126, 234, 0.7)".to_string())),
                ..Marker::default()
            },
        }],
        layout: Layout {
            title: "Distribution of Happiness Scores".to_string(),
            xaxis_title: Some("Ladder Score".to_string()),
            yaxis_title: Some("Frequency".to_string()),
            height: Some(400),
            ..Layout::default()
        },
    })
}

/// Series drawn for a factor: trace name, colour and the scale applied to
/// bring it next to the 0-10 happiness axis. Factors without a series
/// return None.
fn factor_series(factor: Factor) -> Option<(&'static str, &'static str, f64)> {
    match factor {
        Factor::Gdp => Some(("GDP vs Happiness", "blue", 1.0)),
        Factor::Social => Some(("Social Support vs Happiness", "green", 10.0)),
        Factor::Health => Some(("Life Expectancy vs Happiness", "red", 0.1)),
        Factor::Freedom | Factor::Generosity | Factor::Corruption => None,
    }
}

/// One scatter series per selected factor against the happiness score.
pub fn factor_scatter(table: &Table, factors: &BTreeSet<Factor>) -> Result<ChartSpec, SpecBuildError> {
    const PANEL: &str = "factor_scatter";
    let x = series(table, Field::LadderScore, PANEL)?;

    let mut traces = Vec::new();
    for factor in factors {
        let Some((name, color, scale)) = factor_series(*factor) else {
            continue;
        };
        let y = series(table, factor.field(), PANEL)?
            .into_iter()
            .map(|v| v * scale)
            .collect();
        traces.push(Trace::Scatter {
            name: name.to_string(),
            x: x.clone(),
            y,
            mode: "markers".to_string(),
            marker: Marker {
                color: Some(MarkerColor::Fixed(color.to_string())),
                size: Some(8.0),
                opacity: Some(0.6),
                ..Marker::default()
            },
        });
    }

    Ok(ChartSpec {
        traces,
        layout: Layout {
            title: "Filtered Analysis - Factors vs Happiness Score".to_string(),
            xaxis_title: Some("Happiness Score".to_string()),
            yaxis_title: Some("Factor Value".to_string()),
            height: Some(500),
            ..Layout::default()
        },
    })
}

/// Pearson correlations between the seven numeric inputs.
pub fn correlation_heatmap(table: &Table) -> Result<ChartSpec, SpecBuildError> {
    let matrix = correlation_matrix(table, &Field::NUMERIC).map_err(column_error("correlation"))?;
    let labels: Vec<String> = Field::NUMERIC.iter().map(|f| f.header().to_string()).collect();
    let text = matrix
        .iter()
        .map(|row| row.iter().map(|r| format!("{r:.2}")).collect())
        .collect();

    Ok(ChartSpec {
        traces: vec![Trace::Heatmap {
            z: matrix,
            x: labels.clone(),
            y: labels,
            text,
            colorscale: "RdBu".to_string(),
            zmid: 0.0,
        }],
        layout: Layout {
            title: "Correlation Heatmap of Happiness Factors".to_string(),
            height: Some(600),
            width: Some(900),
            ..Layout::default()
        },
    })
}

/// Standardized features in 3-D, coloured by cluster id.
pub fn cluster_scatter_3d(clustered: &ClusteredTable, k: usize) -> Result<ChartSpec, SpecBuildError> {
    const PANEL: &str = "cluster_3d";
    let [x, y, z] = clustered.clustering.projection_3d();
    let ids = clustered
        .table
        .ints(Field::Cluster)
        .map_err(column_error(PANEL))?
        .iter()
        .map(|id| *id as f64)
        .collect();

    Ok(ChartSpec {
        traces: vec![Trace::Scatter3d {
            x,
            y,
            z,
            text: names(&clustered.table, PANEL)?,
            mode: "markers".to_string(),
            marker: Marker {
                color: Some(MarkerColor::Values(ids)),
                colorscale: Some("Viridis".to_string()),
                showscale: Some(true),
                size: Some(6.0),
                ..Marker::default()
            },
        }],
        layout: Layout {
            title: format!("K-Means Clustering (k={k})"),
            xaxis_title: Some("Feature 1 (scaled)".to_string()),
            yaxis_title: Some("Feature 2 (scaled)".to_string()),
            zaxis_title: Some("Feature 3 (scaled)".to_string()),
            height: Some(600),
            ..Layout::default()
        },
    })
}

/// One row per cluster id present, ascending: label, size, mean happiness
/// and the three happiest members.
pub fn cluster_summary(clustered: &ClusteredTable) -> Result<TableSpec, SpecBuildError> {
    const PANEL: &str = "cluster_table";
    let table = &clustered.table;
    let ids = table.ints(Field::Cluster).map_err(column_error(PANEL))?;
    let present: BTreeMap<i64, usize> = ids.iter().fold(BTreeMap::new(), |mut acc, id| {
        *acc.entry(*id).or_insert(0) += 1;
        acc
    });

    let ranked = Arc::new(
        SortedView::new(
            "ranked",
            Arc::clone(table),
            vec![SortKey::descending(Field::LadderScore)],
        )
        .and_then(|view| view.materialize())
        .map_err(column_error(PANEL))?,
    );

    let mut rows = Vec::with_capacity(present.len());
    for (id, count) in present {
        let members = FilterView::new("members", Arc::clone(&ranked), |row| {
            row.get(&Field::Cluster).and_then(ColumnValue::as_i64) == Some(id)
        })
        .materialize()
        .map_err(column_error(PANEL))?;

        let scores = members
            .present_values(Field::LadderScore)
            .map_err(column_error(PANEL))?;
        let average = scores.iter().sum::<f64>() / scores.len().max(1) as f64;
        let top: Vec<String> = names(&members, PANEL)?
            .into_iter()
            .take(CLUSTER_TOP_COUNTRIES)
            .collect();

        rows.push(vec![
            serde_json::Value::from(cluster_name(id as usize)),
            serde_json::Value::from(count),
            serde_json::Value::from(format!("{average:.2}")),
            serde_json::Value::from(top.join(", ")),
        ]);
    }

    Ok(TableSpec {
        columns: ["Cluster", "Count", "Avg Happiness", "Countries"]
            .iter()
            .map(|c| c.to_string())
            .collect(),
        rows,
    })
}

/// Country listing for the data explorer.
pub fn data_listing(table: &Arc<Table>) -> Result<TableSpec, SpecBuildError> {
    const PANEL: &str = "data_table";
    let projection = ProjectionView::new("listing", Arc::clone(table), LISTING_FIELDS.to_vec())
        .map_err(column_error(PANEL))?;

    let rows = (0..projection.len())
        .map(|row| {
            projection
                .fields()
                .iter()
                .map(|field| projection.get_value(row, *field).map(|v| v.to_json()))
                .collect::<Result<Vec<_>, _>>()
        })
        .collect::<Result<Vec<_>, _>>()
        .map_err(column_error(PANEL))?;

    Ok(TableSpec {
        columns: projection.fields().iter().map(|f| f.header().to_string()).collect(),
        rows,
    })
}
