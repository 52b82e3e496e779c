//! Dashboard session.
//!
//! Wires the base table, one signal per control and the derived views into a
//! single [`ViewGraph`]:
//!
//! ```text
//! happiness_range ─┐
//! gdp_range ───────┴─ filtered ─┬─────────────────────── factor_scatter
//! factors ──────────────────────┘
//! cluster_count ───┐
//! cluster_features ┴─ clustered (filtered) ─┬─ cluster3d
//!                                           └─ cluster_table
//! search ──────────── searched ───────────────── data_table
//! (base only)  summary_stats, top_countries, distribution, correlation
//! ```
//!
//! Panels are rendered on demand; each keeps its own cached outcome, so a
//! failing panel never hides the others.

use crate::charts::{
    cluster_scatter_3d, cluster_summary, correlation_heatmap, data_listing, factor_scatter,
    score_histogram, stat_cards, top_ten_bar, ChartSpec, StatCards, TableSpec,
};
use crate::cluster::ClusteredTable;
use crate::controls::{
    default_cluster_features, default_factors, ClusterFeature, ControlUpdate, Factor,
    FilterCriteria, Range, UnknownIdentifier, DEFAULT_CLUSTER_COUNT, DEFAULT_GDP_RANGE,
    DEFAULT_HAPPINESS_RANGE, SEARCH_LIMIT,
};
use crate::error::ViewError;
use crate::graph::{Signal, Source, View, ViewGraph, ViewState};
use crate::table::Table;
use crate::view::FilterView;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Every output of the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Panel {
    SummaryStats,
    TopCountries,
    Distribution,
    FactorScatter,
    Correlation,
    Cluster3d,
    ClusterTable,
    DataTable,
}

impl Panel {
    pub const ALL: [Panel; 8] = [
        Panel::SummaryStats,
        Panel::TopCountries,
        Panel::Distribution,
        Panel::FactorScatter,
        Panel::Correlation,
        Panel::Cluster3d,
        Panel::ClusterTable,
        Panel::DataTable,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Panel::SummaryStats => "summary_stats",
            Panel::TopCountries => "top_countries",
            Panel::Distribution => "distribution",
            Panel::FactorScatter => "factor_scatter",
            Panel::Correlation => "correlation",
            Panel::Cluster3d => "cluster3d",
            Panel::ClusterTable => "cluster_table",
            Panel::DataTable => "data_table",
        }
    }
}

impl fmt::Display for Panel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Panel {
    type Err = UnknownIdentifier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Panel::ALL
            .into_iter()
            .find(|p| p.id() == s)
            .ok_or_else(|| UnknownIdentifier(s.to_string()))
    }
}

/// Rendered content of one panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "spec", rename_all = "snake_case")]
pub enum PanelOutput {
    Stats(StatCards),
    Chart(ChartSpec),
    Table(TableSpec),
}

pub type PanelResult = Result<Arc<PanelOutput>, ViewError>;

/// Dependency list of panels drawn from the base table alone.
fn no_inputs() -> std::iter::Empty<Arc<dyn Source>> {
    std::iter::empty()
}

/// One dashboard session over an immutable base table.
pub struct Dashboard {
    graph: ViewGraph,
    base: Arc<Table>,
    happiness_range: Signal<Range>,
    gdp_range: Signal<Range>,
    factors: Signal<BTreeSet<Factor>>,
    cluster_count: Signal<usize>,
    cluster_features: Signal<BTreeSet<ClusterFeature>>,
    search: Signal<String>,
    filtered: View<Arc<Table>>,
    clustered: View<ClusteredTable>,
    searched: View<Arc<Table>>,
    panels: BTreeMap<Panel, View<PanelOutput>>,
}

impl Dashboard {
    pub fn new(base: Arc<Table>) -> Self {
        let graph = ViewGraph::new();

        let happiness_range = graph.signal("happiness_range", DEFAULT_HAPPINESS_RANGE);
        let gdp_range = graph.signal("gdp_range", DEFAULT_GDP_RANGE);
        let factors = graph.signal("factors", default_factors());
        let cluster_count = graph.signal("cluster_count", DEFAULT_CLUSTER_COUNT);
        let cluster_features = graph.signal("cluster_features", default_cluster_features());
        let search = graph.signal("search", String::new());

        let filtered = graph.view(
            "filtered",
            [happiness_range.as_source(), gdp_range.as_source()],
            {
                let (base, happiness, gdp) =
                    (Arc::clone(&base), happiness_range.clone(), gdp_range.clone());
                move |inputs| {
                    let criteria = FilterCriteria {
                        happiness: *inputs.read(&happiness)?,
                        gdp: *inputs.read(&gdp)?,
                    };
                    let view = FilterView::by_criteria("filtered", Arc::clone(&base), &criteria)?;
                    log::debug!("filter {:?} kept {} rows", criteria, view.len());
                    Ok(Arc::new(view.materialize()?))
                }
            },
        );

        let clustered = graph.view(
            "clustered",
            [
                filtered.as_source(),
                cluster_count.as_source(),
                cluster_features.as_source(),
            ],
            {
                let (filtered, count, features) =
                    (filtered.clone(), cluster_count.clone(), cluster_features.clone());
                move |inputs| {
                    let source = Arc::clone(&*inputs.read(&filtered)?);
                    let k = *inputs.read(&count)?;
                    let features: Vec<ClusterFeature> =
                        inputs.read(&features)?.iter().copied().collect();
                    Ok(ClusteredTable::build("clustered", source, &features, k)?)
                }
            },
        );

        let searched = graph.view("searched", [search.as_source()], {
            let (base, search) = (Arc::clone(&base), search.clone());
            move |inputs| {
                let needle = inputs.read(&search)?;
                let view = FilterView::by_name("searched", Arc::clone(&base), &needle)?
                    .limit(SEARCH_LIMIT);
                Ok(Arc::new(view.materialize()?))
            }
        });

        let mut panels = BTreeMap::new();
        for panel in Panel::ALL {
            let view = match panel {
                Panel::SummaryStats => {
                    let base = Arc::clone(&base);
                    graph.view(panel.id(), no_inputs(), move |_| {
                        Ok(PanelOutput::Stats(stat_cards(&base)?))
                    })
                }
                Panel::TopCountries => {
                    let base = Arc::clone(&base);
                    graph.view(panel.id(), no_inputs(), move |_| {
                        Ok(PanelOutput::Chart(top_ten_bar(&base)?))
                    })
                }
                Panel::Distribution => {
                    let base = Arc::clone(&base);
                    graph.view(panel.id(), no_inputs(), move |_| {
                        Ok(PanelOutput::Chart(score_histogram(&base)?))
                    })
                }
                Panel::Correlation => {
                    let base = Arc::clone(&base);
                    graph.view(panel.id(), no_inputs(), move |_| {
                        Ok(PanelOutput::Chart(correlation_heatmap(&base)?))
                    })
                }
                Panel::FactorScatter => {
                    let (filtered, factors) = (filtered.clone(), factors.clone());
                    graph.view(
                        panel.id(),
                        [filtered.as_source(), factors.as_source()],
                        move |inputs| {
                            let table = inputs.read(&filtered)?;
                            let selected = inputs.read(&factors)?;
                            Ok(PanelOutput::Chart(factor_scatter(&table, &selected)?))
                        },
                    )
                }
                Panel::Cluster3d => {
                    let clustered = clustered.clone();
                    graph.view(panel.id(), [clustered.as_source()], move |inputs| {
                        let clustered = inputs.read(&clustered)?;
                        Ok(PanelOutput::Chart(cluster_scatter_3d(
                            &clustered,
                            clustered.k(),
                        )?))
                    })
                }
                Panel::ClusterTable => {
                    let clustered = clustered.clone();
                    graph.view(panel.id(), [clustered.as_source()], move |inputs| {
                        Ok(PanelOutput::Table(cluster_summary(&*inputs.read(&clustered)?)?))
                    })
                }
                Panel::DataTable => {
                    let searched = searched.clone();
                    graph.view(panel.id(), [searched.as_source()], move |inputs| {
                        Ok(PanelOutput::Table(data_listing(&*inputs.read(&searched)?)?))
                    })
                }
            };
            panels.insert(panel, view);
        }

        log::info!(
            "dashboard ready: {} rows, {} graph nodes",
            base.len(),
            graph.len()
        );

        Dashboard {
            graph,
            base,
            happiness_range,
            gdp_range,
            factors,
            cluster_count,
            cluster_features,
            search,
            filtered,
            clustered,
            searched,
            panels,
        }
    }

    pub fn base(&self) -> &Arc<Table> {
        &self.base
    }

    pub fn graph(&self) -> &ViewGraph {
        &self.graph
    }

    fn panel_view(&self, panel: Panel) -> &View<PanelOutput> {
        // Every variant is inserted in `new`.
        &self.panels[&panel]
    }

    /// Renders one panel, recomputing it only if an input changed.
    pub fn render(&self, panel: Panel) -> PanelResult {
        self.panel_view(panel).get()
    }

    /// Renders every panel. Each entry carries its own outcome.
    pub fn render_all(&self) -> Vec<(Panel, PanelResult)> {
        Panel::ALL
            .into_iter()
            .map(|panel| (panel, self.render(panel)))
            .collect()
    }

    /// Renders the given panels.
    pub fn render_panels(&self, panels: &[Panel]) -> Vec<(Panel, PanelResult)> {
        panels
            .iter()
            .map(|panel| (*panel, self.render(*panel)))
            .collect()
    }

    pub fn panel_state(&self, panel: Panel) -> ViewState {
        self.panel_view(panel).state()
    }

    /// How often a panel has been computed.
    pub fn panel_computations(&self, panel: Panel) -> usize {
        self.panel_view(panel).computations()
    }

    /// Panels that would recompute on their next render.
    pub fn stale_panels(&self) -> Vec<Panel> {
        Panel::ALL
            .into_iter()
            .filter(|panel| self.panel_state(*panel) == ViewState::Stale)
            .collect()
    }

    pub fn filtered(&self) -> Result<Arc<Table>, ViewError> {
        self.filtered.get().map(|t| Arc::clone(&*t))
    }

    pub fn clustered(&self) -> Result<Arc<ClusteredTable>, ViewError> {
        self.clustered.get()
    }

    pub fn searched(&self) -> Result<Arc<Table>, ViewError> {
        self.searched.get().map(|t| Arc::clone(&*t))
    }

    /// Reversed bounds, as they may arrive over the wire, are swapped.
    pub fn set_happiness_range(&self, range: Range) -> bool {
        self.happiness_range.set(Range::new(range.min, range.max))
    }

    pub fn set_gdp_range(&self, range: Range) -> bool {
        self.gdp_range.set(Range::new(range.min, range.max))
    }

    pub fn set_factors(&self, factors: BTreeSet<Factor>) -> bool {
        self.factors.set(factors)
    }

    pub fn set_cluster_count(&self, k: usize) -> bool {
        self.cluster_count.set(k)
    }

    pub fn set_cluster_features(&self, features: BTreeSet<ClusterFeature>) -> bool {
        self.cluster_features.set(features)
    }

    pub fn set_search(&self, text: impl Into<String>) -> bool {
        self.search.set(text.into())
    }

    /// Applies every present field of `update` and returns the panels whose
    /// inputs changed.
    pub fn apply(&self, update: ControlUpdate) -> Vec<Panel> {
        let before: BTreeSet<Panel> = self.stale_panels().into_iter().collect();

        let mut changed = false;
        if let Some(range) = update.happiness_range {
            changed |= self.set_happiness_range(range);
        }
        if let Some(range) = update.gdp_range {
            changed |= self.set_gdp_range(range);
        }
        if let Some(factors) = update.factors {
            changed |= self.set_factors(factors);
        }
        if let Some(k) = update.cluster_count {
            changed |= self.set_cluster_count(k);
        }
        if let Some(features) = update.cluster_features {
            changed |= self.set_cluster_features(features);
        }
        if let Some(text) = update.search {
            changed |= self.set_search(text);
        }

        if !changed {
            return Vec::new();
        }
        let affected: Vec<Panel> = self
            .stale_panels()
            .into_iter()
            .filter(|panel| !before.contains(panel))
            .collect();
        log::debug!("controls changed; affected panels {:?}", affected);
        affected
    }

    /// Current control values as a full update.
    pub fn controls(&self) -> ControlUpdate {
        ControlUpdate {
            happiness_range: Some(*self.happiness_range.get()),
            gdp_range: Some(*self.gdp_range.get()),
            factors: Some((*self.factors.get()).clone()),
            cluster_count: Some(*self.cluster_count.get()),
            cluster_features: Some((*self.cluster_features.get()).clone()),
            search: Some((*self.search.get()).clone()),
        }
    }
}

impl fmt::Debug for Dashboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dashboard")
            .field("base", &self.base)
            .field("graph", &self.graph)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::Trace;
    use crate::error::{ClusterError, Error};
    use crate::table::fixtures::{record, sample_table};
    use crate::table::{CountryRecord, Field};
    use proptest::prelude::*;
    use std::sync::Barrier;
    use std::thread;

    fn dashboard() -> Dashboard {
        Dashboard::new(Arc::new(sample_table()))
    }

    fn names(table: &Table) -> Vec<String> {
        table.texts(Field::CountryName).unwrap().to_vec()
    }

    #[test]
    fn test_default_render_all_succeeds() {
        let dash = dashboard();
        let rendered = dash.render_all();

        assert_eq!(rendered.len(), 8);
        for (panel, result) in &rendered {
            assert!(result.is_ok(), "{panel} failed: {:?}", result.as_ref().err());
        }
        // Afghanistan falls below the default happiness range.
        assert_eq!(dash.filtered().unwrap().len(), 11);
    }

    #[test]
    fn test_panels_are_memoized() {
        let dash = dashboard();
        dash.render(Panel::FactorScatter).unwrap();
        dash.render(Panel::FactorScatter).unwrap();
        assert_eq!(dash.panel_computations(Panel::FactorScatter), 1);
        assert_eq!(dash.panel_state(Panel::FactorScatter), ViewState::Cached);
    }

    #[test]
    fn test_unrelated_control_keeps_cache() {
        let dash = dashboard();
        dash.render_all();

        assert!(dash.set_cluster_count(3));
        assert_eq!(dash.panel_state(Panel::FactorScatter), ViewState::Cached);
        assert_eq!(dash.panel_state(Panel::Cluster3d), ViewState::Stale);
        assert_eq!(dash.panel_state(Panel::DataTable), ViewState::Cached);

        dash.render_all();
        assert_eq!(dash.panel_computations(Panel::FactorScatter), 1);
        assert_eq!(dash.panel_computations(Panel::Cluster3d), 2);
        assert_eq!(dash.panel_computations(Panel::SummaryStats), 1);
    }

    #[test]
    fn test_factor_selection_changes_scatter() {
        let dash = dashboard();
        dash.set_factors([Factor::Health].into_iter().collect());

        let output = dash.render(Panel::FactorScatter).unwrap();
        let PanelOutput::Chart(chart) = &*output else {
            panic!("expected chart");
        };
        assert_eq!(chart.traces.len(), 1);
        assert!(matches!(&chart.traces[0], Trace::Scatter { name, .. } if name == "Life Expectancy vs Happiness"));
    }

    #[test]
    fn test_invalid_cluster_count_fails_only_cluster_panels() {
        let dash = dashboard();
        dash.set_cluster_count(0);

        for (panel, result) in dash.render_all() {
            match panel {
                Panel::Cluster3d | Panel::ClusterTable => {
                    let err = result.unwrap_err();
                    assert!(matches!(
                        err.root_cause(),
                        Error::Cluster(ClusterError::InvalidClusterCount { k: 0 })
                    ));
                }
                _ => assert!(result.is_ok()),
            }
        }

        // Sticky until the count changes.
        dash.render(Panel::Cluster3d).unwrap_err();
        assert_eq!(dash.panel_computations(Panel::Cluster3d), 1);
        assert_eq!(dash.panel_state(Panel::Cluster3d), ViewState::Error);

        dash.set_cluster_count(2);
        assert!(dash.render(Panel::Cluster3d).is_ok());
    }

    #[test]
    fn test_narrow_filter_leaves_too_few_rows() {
        let dash = dashboard();
        dash.set_happiness_range(Range::new(7.5, 8.0));

        assert_eq!(names(&dash.filtered().unwrap()), vec!["Finland", "Denmark", "Iceland"]);
        let err = dash.clustered().unwrap_err();
        assert!(matches!(
            err.root_cause(),
            Error::Cluster(ClusterError::TooFewRows { rows: 3, k: 4 })
        ));
        assert!(dash.render(Panel::FactorScatter).is_ok());
    }

    #[test]
    fn test_search() {
        let dash = dashboard();
        assert_eq!(dash.searched().unwrap().len(), 12);

        dash.set_search("LAND");
        assert_eq!(names(&dash.searched().unwrap()), vec!["Finland", "Iceland"]);

        let output = dash.render(Panel::DataTable).unwrap();
        let PanelOutput::Table(listing) = &*output else {
            panic!("expected table");
        };
        assert_eq!(listing.len(), 2);
    }

    #[test]
    fn test_search_is_capped_at_limit() {
        let records: Vec<CountryRecord> = (0..30)
            .map(|i| record(&format!("Landia {i}"), 3.0 + i as f64 * 0.1, 9.0))
            .collect();
        let dash = Dashboard::new(Arc::new(Table::from_records("wide", &records)));
        let first: Vec<String> = (0..SEARCH_LIMIT).map(|i| format!("Landia {i}")).collect();

        assert_eq!(names(&dash.searched().unwrap()), first);

        dash.set_search("LANDIA");
        assert_eq!(names(&dash.searched().unwrap()), first);

        dash.set_search("landia 1");
        assert_eq!(dash.searched().unwrap().len(), 11);
        let output = dash.render(Panel::DataTable).unwrap();
        let PanelOutput::Table(listing) = &*output else {
            panic!("expected table");
        };
        assert_eq!(listing.len(), 11);
    }

    #[test]
    fn test_unchanged_filter_result_skips_clustering() {
        let dash = dashboard();
        dash.render_all();

        // Every sample country already lies below 7.9.
        assert!(dash.set_happiness_range(Range::new(3.0, 7.9)));
        for (_, result) in dash.render_all() {
            assert!(result.is_ok());
        }
        assert_eq!(dash.filtered().unwrap().len(), 11);
        assert_eq!(dash.filtered.computations(), 2);
        assert_eq!(dash.clustered.computations(), 1);
        assert_eq!(dash.panel_computations(Panel::FactorScatter), 1);
        assert_eq!(dash.panel_computations(Panel::ClusterTable), 1);

        // A change reverted before anyone reads it.
        assert!(dash.set_cluster_count(3));
        assert!(dash.set_cluster_count(DEFAULT_CLUSTER_COUNT));
        assert!(dash.stale_panels().is_empty());
        dash.render_all();
        assert_eq!(dash.clustered.computations(), 1);
        assert_eq!(dash.panel_computations(Panel::Cluster3d), 1);
    }

    #[test]
    fn test_apply_reports_affected_panels() {
        let dash = dashboard();
        dash.render_all();

        let affected = dash.apply(ControlUpdate {
            search: Some("ice".to_string()),
            ..ControlUpdate::default()
        });
        assert_eq!(affected, vec![Panel::DataTable]);

        let affected = dash.apply(ControlUpdate {
            gdp_range: Some(Range::new(8.0, 11.0)),
            ..ControlUpdate::default()
        });
        assert_eq!(
            affected,
            vec![Panel::FactorScatter, Panel::Cluster3d, Panel::ClusterTable]
        );

        assert!(dash
            .apply(ControlUpdate {
                gdp_range: Some(Range::new(8.0, 11.0)),
                ..ControlUpdate::default()
            })
            .is_empty());
        assert_eq!(dash.controls().search.as_deref(), Some("ice"));
    }

    #[test]
    fn test_concurrent_render_computes_once() {
        const READERS: usize = 6;
        let dash = dashboard();
        let barrier = Barrier::new(READERS);

        thread::scope(|s| {
            for _ in 0..READERS {
                s.spawn(|| {
                    barrier.wait();
                    for (_, result) in dash.render_all() {
                        assert!(result.is_ok());
                    }
                });
            }
        });

        for panel in Panel::ALL {
            assert_eq!(dash.panel_computations(panel), 1, "{panel}");
        }
    }

    #[test]
    fn test_panel_ids_parse() {
        for panel in Panel::ALL {
            assert_eq!(panel.id().parse::<Panel>(), Ok(panel));
            assert_eq!(
                serde_json::to_value(panel).unwrap(),
                serde_json::json!(panel.id())
            );
        }
        assert!("summary".parse::<Panel>().is_err());
    }

    proptest! {
        #[test]
        fn prop_filter_respects_ranges(
            a in 0.0f64..10.0,
            b in 0.0f64..10.0,
            c in 6.0f64..12.0,
            d in 6.0f64..12.0,
        ) {
            let dash = dashboard();
            let happiness = Range::new(a, b);
            let gdp = Range::new(c, d);
            dash.set_happiness_range(happiness);
            dash.set_gdp_range(gdp);

            let base = dash.base();
            let filtered = dash.filtered().unwrap();
            let kept: BTreeSet<String> = names(&filtered).into_iter().collect();

            let ladder = base.numbers(Field::LadderScore).unwrap();
            let income = base.numbers(Field::LoggedGdp).unwrap();
            for (i, name) in names(base).iter().enumerate() {
                let (l, g) = (ladder[i].unwrap(), income[i].unwrap());
                prop_assert_eq!(kept.contains(name), happiness.contains(l) && gdp.contains(g));
            }
        }

        #[test]
        fn prop_search_is_capped_substring(needle in "[a-zA-Z ]{0,3}") {
            let dash = dashboard();
            dash.set_search(needle.clone());
            let found = names(&dash.searched().unwrap());
            let lowered = needle.to_lowercase();

            let expected: Vec<String> = names(dash.base())
                .into_iter()
                .filter(|n| n.to_lowercase().contains(&lowered))
                .take(SEARCH_LIMIT)
                .collect();
            prop_assert!(found.len() <= SEARCH_LIMIT);
            prop_assert_eq!(found, expected);
        }
    }
}
