//! Data loading utilities

use crate::error::{ChurnError, Result};
use crate::schema::{CustomerRecord, FieldKind, FieldSpec, FieldValue, Schema, TrainingTable};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::{info, warn};

/// CSV loader for customer tables
#[derive(Debug, Clone)]
pub struct DataLoader {
    /// Fill blank or unparseable cells of imputable fields with the column median
    impute: bool,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    pub fn new() -> Self {
        Self { impute: true }
    }

    pub fn with_imputation(mut self, impute: bool) -> Self {
        self.impute = impute;
        self
    }

    /// Load a CSV file with every column read as text
    pub fn load_csv(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| ChurnError::DataError(format!("{}: {}", path.display(), e)))?;

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .into_reader_with_file_handle(file)
            .finish()?;
        info!(path = %path.display(), rows = df.height(), columns = df.width(), "csv loaded");
        Ok(df)
    }

    /// Parse every schema field of every row. Extra columns are ignored.
    pub fn records_from_dataframe(&self, df: &DataFrame, schema: &Schema) -> Result<Vec<CustomerRecord>> {
        let n_rows = df.height();
        let mut records = vec![CustomerRecord::new(); n_rows];

        for spec in schema.fields() {
            let cells = text_column(df, &spec.name)?;
            let fill = if self.impute && spec.impute_median {
                Some(column_median(&cells, &spec.name)?)
            } else {
                None
            };

            let mut imputed = 0usize;
            for (row, cell) in cells.iter().enumerate() {
                let value = match parse_cell(spec, cell.as_deref()) {
                    Ok(value) => value,
                    Err(reason) => match fill {
                        Some(median) => {
                            imputed += 1;
                            FieldValue::Number(median)
                        }
                        None => {
                            return Err(ChurnError::DataError(format!(
                                "row {}, column '{}': {}",
                                row, spec.name, reason
                            )))
                        }
                    },
                };
                records[row].set(spec.name.clone(), value);
            }
            if imputed > 0 {
                warn!(column = %spec.name, count = imputed, "imputed missing values with median");
            }
        }
        Ok(records)
    }

    /// Records plus the 0/1 target column (`Yes` is churned)
    pub fn table_from_dataframe(&self, df: &DataFrame, schema: &Schema) -> Result<TrainingTable> {
        let records = self.records_from_dataframe(df, schema)?;
        let labels = text_column(df, schema.target())?
            .iter()
            .enumerate()
            .map(|(row, cell)| match cell.as_deref() {
                Some("Yes") => Ok(1u8),
                Some("No") => Ok(0u8),
                other => Err(ChurnError::DataError(format!(
                    "row {}, column '{}': expected Yes or No, got {:?}",
                    row,
                    schema.target(),
                    other.unwrap_or("")
                ))),
            })
            .collect::<Result<Vec<_>>>()?;
        TrainingTable::new(records, labels)
    }

    pub fn load_training_table(&self, path: impl AsRef<Path>, schema: &Schema) -> Result<TrainingTable> {
        let df = self.load_csv(path)?;
        self.table_from_dataframe(&df, schema)
    }
}

/// Data saver for report and prediction tables
pub struct DataSaver;

impl DataSaver {
    /// Save to CSV
    pub fn save_csv(df: &mut DataFrame, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path.as_ref())?;
        CsvWriter::new(&mut file).finish(df)?;
        Ok(())
    }
}

/// Trimmed cells of a column; blank cells become `None`
fn text_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df
        .column(name)
        .map_err(|_| ChurnError::DataError(format!("column '{}' not found", name)))?;
    let series = column.as_materialized_series().cast(&DataType::String)?;
    Ok(series
        .str()?
        .into_iter()
        .map(|cell| {
            cell.map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        })
        .collect())
}

fn parse_cell(spec: &FieldSpec, cell: Option<&str>) -> std::result::Result<FieldValue, String> {
    let cell = cell.ok_or_else(|| "missing value".to_string())?;
    match spec.kind {
        FieldKind::Categorical => Ok(FieldValue::Text(cell.to_string())),
        FieldKind::Flag | FieldKind::Numeric => {
            let value: f64 = cell
                .parse()
                .map_err(|_| format!("'{}' is not a number", cell))?;
            if !value.is_finite() {
                return Err(format!("'{}' is not finite", cell));
            }
            Ok(FieldValue::Number(value))
        }
    }
}

fn column_median(cells: &[Option<String>], name: &str) -> Result<f64> {
    let mut values: Vec<f64> = cells
        .iter()
        .flatten()
        .filter_map(|c| c.parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .collect();
    if values.is_empty() {
        return Err(ChurnError::DataError(format!(
            "column '{}' has no numeric values to impute from",
            name
        )));
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    Ok(if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    })
}
