//! Dataset store.
//!
//! Reads the happiness CSV once, validates the header, fills missing numeric
//! cells with their column mean and hands out the result as an immutable
//! `Arc<Table>`.

use crate::column::Column;
use crate::config::DashboardConfig;
use crate::error::DataLoadError;
use crate::table::{Field, Table};
use serde::{de, Deserialize, Deserializer};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;

/// Name given to the loaded table.
pub const BASE_TABLE: &str = "base";

/// Cell contents read as a missing value, matched after trimming.
pub const MISSING_MARKERS: [&str; 19] = [
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// One CSV row. Missing markers and non-finite numbers deserialize to `None`.
#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(rename = "Country name")]
    country: String,
    #[serde(rename = "Ladder score", deserialize_with = "cell")]
    ladder_score: Option<f64>,
    #[serde(rename = "Logged GDP per capita", deserialize_with = "cell")]
    logged_gdp: Option<f64>,
    #[serde(rename = "Social support", deserialize_with = "cell")]
    social_support: Option<f64>,
    #[serde(rename = "Healthy life expectancy", deserialize_with = "cell")]
    healthy_life_expectancy: Option<f64>,
    #[serde(rename = "Freedom to make life choices", deserialize_with = "cell")]
    freedom: Option<f64>,
    #[serde(rename = "Generosity", deserialize_with = "cell")]
    generosity: Option<f64>,
    #[serde(rename = "Perceptions of corruption", deserialize_with = "cell")]
    corruption: Option<f64>,
}

fn cell<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let raw = raw.trim();
    if MISSING_MARKERS.contains(&raw) {
        return Ok(None);
    }
    let value: f64 = raw
        .parse()
        .map_err(|e| de::Error::custom(format!("invalid number '{raw}': {e}")))?;
    Ok(Some(value).filter(|v| v.is_finite()))
}

impl RawRecord {
    fn value(&self, field: Field) -> Option<f64> {
        match field {
            Field::LadderScore => self.ladder_score,
            Field::LoggedGdp => self.logged_gdp,
            Field::SocialSupport => self.social_support,
            Field::HealthyLifeExpectancy => self.healthy_life_expectancy,
            Field::Freedom => self.freedom,
            Field::Generosity => self.generosity,
            Field::Corruption => self.corruption,
            _ => None,
        }
    }
}

/// Loads the base table from the configured data path.
pub fn initialize(config: &DashboardConfig) -> Result<Arc<Table>, DataLoadError> {
    log::info!("loading dataset from {}", config.data_path.display());
    load(&config.data_path)
}

/// Loads and sanitizes a CSV file.
pub fn load(path: impl AsRef<Path>) -> Result<Arc<Table>, DataLoadError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => DataLoadError::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => DataLoadError::FileRead {
            path: path.to_path_buf(),
            source,
        },
    })?;
    load_from_reader(file)
}

/// Loads and sanitizes CSV data from any reader.
pub fn load_from_reader<R: Read>(reader: R) -> Result<Arc<Table>, DataLoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|source| DataLoadError::Csv { source })?
        .clone();
    let present: Vec<Field> = headers.iter().filter_map(Field::from_header).collect();
    for field in Field::REQUIRED {
        if !present.contains(&field) {
            return Err(DataLoadError::MissingColumn { column: field });
        }
    }

    let mut records = Vec::new();
    for result in reader.deserialize::<RawRecord>() {
        let line = records.len() as u64 + 2;
        records.push(result.map_err(|e| row_error(e, line))?);
    }

    let mut columns = vec![Column::string(
        Field::CountryName,
        records.iter().map(|r| r.country.clone()).collect(),
    )];
    for field in Field::NUMERIC {
        let mut column = Column::float64(field, records.iter().map(|r| r.value(field)).collect());
        if column.null_count() > 0 {
            let mean = column
                .mean()
                .ok_or(DataLoadError::NoValues { column: field })?;
            let filled = column.fill_nulls(mean);
            log::info!("imputed {} missing '{}' cells with mean {:.4}", filled, field, mean);
        }
        columns.push(column);
    }

    let table = Table::new(BASE_TABLE, columns).map_err(|e| DataLoadError::Parse {
        line: 0,
        message: e.to_string(),
    })?;
    log::info!("loaded {} countries", table.len());
    Ok(Arc::new(table))
}

fn row_error(error: csv::Error, fallback_line: u64) -> DataLoadError {
    let parse = match error.kind() {
        csv::ErrorKind::Deserialize { pos, err } => Some((
            pos.as_ref().map_or(fallback_line, |p| p.line()),
            err.to_string(),
        )),
        _ => None,
    };
    match parse {
        Some((line, message)) => DataLoadError::Parse { line, message },
        None => DataLoadError::Csv { source: error },
    }
}
