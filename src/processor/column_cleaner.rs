use crate::config::InputConfig;
use crate::error::{DataQualityWarning, PipelineError, Result};
use crate::models::{CategoricalField, KNOWN_EXTRA_COLUMNS, OrderLine, REQUIRED_COLUMNS};
use polars::prelude::*;
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use tracing::{info, warn};

/// Completeness of one required column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnCompleteness {
    pub column: String,
    pub missing: usize,
    pub total: usize,
}

impl ColumnCompleteness {
    pub fn rate(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        (self.total - self.missing) as f64 / self.total as f64
    }
}

#[derive(Debug, Clone, Default)]
pub struct QualityReport {
    pub rows: usize,
    pub dropped_column: Option<String>,
    pub completeness: Vec<ColumnCompleteness>,
    pub completion_rate: f64,
    /// Distinct values and their counts per categorical column.
    pub distinct_values: BTreeMap<String, BTreeMap<String, usize>>,
    pub warnings: Vec<DataQualityWarning>,
}

impl QualityReport {
    pub fn is_complete(&self) -> bool {
        self.completeness.iter().all(|c| c.missing == 0)
    }

    pub fn incomplete_columns(&self) -> Vec<&str> {
        self.completeness
            .iter()
            .filter(|c| c.missing > 0)
            .map(|c| c.column.as_str())
            .collect()
    }

    pub fn unlisted_values(&self) -> Vec<(&str, &str)> {
        self.warnings
            .iter()
            .filter_map(|w| match w {
                DataQualityWarning::UnlistedValue { column, value, .. } => {
                    Some((column.as_str(), value.as_str()))
                }
                _ => None,
            })
            .collect()
    }

    pub fn log(&self) {
        info!(
            "Quality report: {} rows, completion rate {:.2}%",
            self.rows,
            self.completion_rate * 100.0
        );
        for (column, values) in &self.distinct_values {
            info!("  {} has {} distinct values", column, values.len());
        }
        for warning in &self.warnings {
            warn!("⚠️ {}", warning);
        }
    }
}

pub struct CleanedFrame {
    pub frame: DataFrame,
    pub report: QualityReport,
}

/// Normalises headers, drops the discard column and inspects the raw text
/// cells. Never rewrites a value: findings go into the `QualityReport`.
pub struct ColumnCleaner {
    config: InputConfig,
    separator_regex: Regex,
}

impl ColumnCleaner {
    pub fn new(config: InputConfig) -> Self {
        ColumnCleaner {
            config,
            separator_regex: Regex::new(r"[^a-z0-9]+").expect("static regex"),
        }
    }

    pub fn normalize_column_name(&self, name: &str) -> String {
        let lowered = name.trim().to_lowercase();
        self.separator_regex
            .replace_all(&lowered, "_")
            .trim_matches('_')
            .to_string()
    }

    pub fn clean(&self, raw: &DataFrame) -> Result<CleanedFrame> {
        let (frame, dropped_column) = self.drop_discard_column(raw)?;
        let frame = self.normalize_columns(&frame)?;

        let mut report = QualityReport {
            rows: frame.height(),
            dropped_column,
            ..QualityReport::default()
        };

        self.check_unexpected_columns(&frame, &mut report)?;
        self.check_completeness(&frame, &mut report)?;
        self.check_categoricals(&frame, &mut report)?;

        Ok(CleanedFrame { frame, report })
    }

    /// Numeric findings that only make sense once the rows are typed.
    pub fn range_warnings(&self, orders: &[OrderLine]) -> Vec<DataQualityWarning> {
        let mut warnings = Vec::new();
        for order in orders {
            if !(0.0..1.0).contains(&order.discount) {
                warnings.push(DataQualityWarning::OutOfRange {
                    column: "discount".to_string(),
                    row_id: order.row_id,
                    value: order.discount,
                });
            }
            if order.sales <= 0.0 {
                warnings.push(DataQualityWarning::OutOfRange {
                    column: "sales".to_string(),
                    row_id: order.row_id,
                    value: order.sales,
                });
            }
            if order.quantity == 0 {
                warnings.push(DataQualityWarning::OutOfRange {
                    column: "quantity".to_string(),
                    row_id: order.row_id,
                    value: 0.0,
                });
            }
        }
        warnings
    }

    fn drop_discard_column(&self, raw: &DataFrame) -> Result<(DataFrame, Option<String>)> {
        let Some(index) = self.config.discard_column_index else {
            return Ok((raw.clone(), None));
        };

        let names: Vec<String> = raw
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();

        match names.get(index.saturating_sub(1)) {
            Some(name) if REQUIRED_COLUMNS.contains(&self.normalize_column_name(name).as_str()) => {
                warn!(
                    "Discard column {} is the required column '{}'; nothing dropped",
                    index, name
                );
                Ok((raw.clone(), None))
            }
            Some(name) => {
                info!("Dropping column {} ('{}')", index, name);
                Ok((raw.drop(name)?, Some(name.clone())))
            }
            None => {
                warn!(
                    "Discard column {} is beyond the {} columns read; nothing dropped",
                    index,
                    names.len()
                );
                Ok((raw.clone(), None))
            }
        }
    }

    fn normalize_columns(&self, frame: &DataFrame) -> Result<DataFrame> {
        let normalized: Vec<String> = frame
            .get_column_names()
            .iter()
            .map(|name| self.normalize_column_name(name))
            .collect();

        let mut seen = HashSet::new();
        for name in &normalized {
            if !seen.insert(name.as_str()) {
                return Err(PipelineError::malformed(format!(
                    "two columns normalise to '{}'",
                    name
                )));
            }
        }

        let mut renamed = frame.clone();
        renamed.set_column_names(normalized)?;
        Ok(renamed)
    }

    fn check_unexpected_columns(&self, frame: &DataFrame, report: &mut QualityReport) -> Result<()> {
        for name in frame.get_column_names() {
            let name = name.as_str();
            if REQUIRED_COLUMNS.contains(&name) || KNOWN_EXTRA_COLUMNS.contains(&name) {
                continue;
            }
            if self.config.strict_columns {
                return Err(PipelineError::malformed(format!(
                    "column '{}' is not part of the order schema",
                    name
                )));
            }
            report
                .warnings
                .push(DataQualityWarning::UnexpectedColumn(name.to_string()));
        }
        Ok(())
    }

    fn check_completeness(&self, frame: &DataFrame, report: &mut QualityReport) -> Result<()> {
        let total = frame.height();
        let mut missing_cells = 0usize;

        for name in REQUIRED_COLUMNS {
            let missing = match frame.column(name) {
                Ok(column) => match column.str() {
                    Ok(values) => values
                        .into_iter()
                        .filter(|v| v.map(|s| s.trim().is_empty()).unwrap_or(true))
                        .count(),
                    Err(_) => column.null_count(),
                },
                Err(_) => total,
            };

            if missing > 0 {
                report.warnings.push(DataQualityWarning::IncompleteColumn {
                    column: name.to_string(),
                    missing,
                    total,
                });
            }
            missing_cells += missing;
            report.completeness.push(ColumnCompleteness {
                column: name.to_string(),
                missing,
                total,
            });
        }

        let cells = total * REQUIRED_COLUMNS.len();
        report.completion_rate = if cells == 0 {
            1.0
        } else {
            (cells - missing_cells) as f64 / cells as f64
        };

        Ok(())
    }

    fn check_categoricals(&self, frame: &DataFrame, report: &mut QualityReport) -> Result<()> {
        for field in CategoricalField::ALL {
            let Ok(column) = frame.column(field.column()) else {
                continue;
            };

            let mut counts: BTreeMap<String, usize> = BTreeMap::new();
            for value in column.str()?.into_iter().flatten() {
                let value = value.trim();
                if value.is_empty() {
                    continue;
                }
                *counts.entry(value.to_string()).or_default() += 1;
            }

            for (value, occurrences) in &counts {
                if !field.is_allowed(value) {
                    report.warnings.push(DataQualityWarning::UnlistedValue {
                        column: field.column().to_string(),
                        value: value.clone(),
                        occurrences: *occurrences,
                    });
                }
            }

            report
                .distinct_values
                .insert(field.column().to_string(), counts);
        }
        Ok(())
    }
}
