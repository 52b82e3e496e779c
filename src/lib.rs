/// Happiness Dashboard - Reactive Analytics Core
///
/// Loads the World Happiness Report once, then derives every dashboard panel
/// (summary cards, charts, cluster tables) from a small reactive graph of
/// control signals and memoized views. Panels render to plain serializable
/// specs; the optional `server` feature exposes them over HTTP and WebSocket.

pub mod column;
pub mod table;
pub mod view;
pub mod controls;
pub mod error;
pub mod stats;
pub mod kmeans;
pub mod cluster;
pub mod graph;
pub mod config;
pub mod dataset;
pub mod charts;
pub mod dashboard;
pub mod messages;

pub use column::{Column, ColumnType, ColumnValue};
pub use table::{CountryRecord, Field, Row, Schema, Table};
pub use view::{ComputedView, FilterView, ProjectionView, SortKey, SortOrder, SortedView};
pub use controls::{ClusterFeature, ControlUpdate, Factor, FilterCriteria, Range};
pub use error::{
    ClusterError, ConfigError, DataLoadError, Error, SpecBuildError, StatsError, TableError,
    ViewError,
};
pub use stats::Summary;
pub use kmeans::{FeatureMatrix, KMeans, KMeansFit};
pub use cluster::{ClusteredTable, Clustering};
pub use graph::{Inputs, Signal, View, ViewGraph, ViewState};
pub use config::DashboardConfig;
pub use charts::{ChartSpec, StatCards, TableSpec, Trace};
pub use dashboard::{Dashboard, Panel, PanelOutput, PanelResult};

// WebSocket server modules - only when server feature is enabled
#[cfg(feature = "server")]
pub mod websocket;
#[cfg(feature = "server")]
pub mod server;

#[cfg(test)]
mod integration_tests {
    use super::*;

    const CSV: &str = "\
Country name,Ladder score,Logged GDP per capita,Social support,Healthy life expectancy,Freedom to make life choices,Generosity,Perceptions of corruption
Finland,7.804,10.792,0.969,71.150,0.961,-0.019,0.182
Denmark,7.586,10.962,0.954,71.250,0.934,0.134,0.196
Iceland,7.530,10.896,0.983,72.050,0.936,0.211,0.668
Israel,7.473,10.639,0.943,72.697,0.809,-0.023,0.708
Mexico,6.330,9.859,0.841,65.900,0.806,-0.170,0.799
Brazil,6.125,9.567,0.878,64.600,0.802,-0.018,0.771
India,4.036,8.759,0.608,60.777,0.897,0.072,0.774
Zimbabwe,3.204,7.641,0.690,54.050,0.654,-0.046,0.766
Sierra Leone,3.138,7.394,0.555,54.900,0.660,0.105,0.858
Afghanistan,1.859,7.324,0.341,54.712,0.382,-0.081,
";

    fn table_rows(output: &PanelOutput) -> usize {
        match output {
            PanelOutput::Table(spec) => spec.rows.len(),
            other => panic!("expected a table panel, got {:?}", other),
        }
    }

    #[test]
    fn test_complete_workflow() {
        // Load with imputation
        let base = dataset::load_from_reader(CSV.as_bytes()).unwrap();
        assert_eq!(base.len(), 10);
        let corruption = base.numbers(Field::Corruption).unwrap();
        assert!((corruption[9].unwrap() - 5.722 / 9.0).abs() < 1e-9);

        // Every panel renders on first use
        let dashboard = Dashboard::new(base);
        let rendered = dashboard.render_all();
        assert_eq!(rendered.len(), Panel::ALL.len());
        for (panel, result) in &rendered {
            assert!(result.is_ok(), "{} failed: {:?}", panel, result);
        }
        assert_eq!(dashboard.filtered().unwrap().len(), 9);
        assert_eq!(table_rows(&dashboard.render(Panel::DataTable).unwrap()), 10);
        assert!(dashboard.stale_panels().is_empty());

        // Search only touches the data table
        let affected = dashboard.apply(ControlUpdate {
            search: Some("land".to_string()),
            ..ControlUpdate::default()
        });
        assert_eq!(affected, vec![Panel::DataTable]);
        assert_eq!(table_rows(&dashboard.render(Panel::DataTable).unwrap()), 2);

        // Narrowing the happiness range re-derives the filtered branch
        let affected = dashboard.apply(ControlUpdate {
            happiness_range: Some(Range::new(5.0, 8.0)),
            ..ControlUpdate::default()
        });
        assert_eq!(
            affected,
            vec![Panel::FactorScatter, Panel::Cluster3d, Panel::ClusterTable]
        );
        for (_, result) in dashboard.render_panels(&affected) {
            assert!(result.is_ok());
        }
        assert_eq!(dashboard.filtered().unwrap().len(), 6);
        assert_eq!(dashboard.clustered().unwrap().table.len(), 6);

        // Base-only panels never recomputed
        assert_eq!(dashboard.panel_computations(Panel::SummaryStats), 1);
        assert_eq!(dashboard.panel_computations(Panel::Correlation), 1);

        // A re-send of the same values changes nothing
        let affected = dashboard.apply(dashboard.controls());
        assert!(affected.is_empty());
    }

    #[test]
    fn test_cluster_failure_is_isolated() {
        let base = dataset::load_from_reader(CSV.as_bytes()).unwrap();
        let dashboard = Dashboard::new(base);

        dashboard.set_cluster_count(20);
        let rendered = dashboard.render_all();
        for (panel, result) in rendered {
            match panel {
                Panel::Cluster3d | Panel::ClusterTable => assert!(result.is_err()),
                _ => assert!(result.is_ok(), "{} failed", panel),
            }
        }

        dashboard.set_cluster_count(3);
        assert!(dashboard.render(Panel::ClusterTable).is_ok());
    }
}
