use crate::error::{PipelineError, Result};
use polars::prelude::*;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reducer {
    Sum,
    Mean,
    Count,
}

impl fmt::Display for Reducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reducer::Sum => f.write_str("sum"),
            Reducer::Mean => f.write_str("mean"),
            Reducer::Count => f.write_str("count"),
        }
    }
}

/// A reduced column, e.g. `sum(profit)` which lands in `sum_profit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Measure {
    pub column: String,
    pub reducer: Reducer,
}

impl Measure {
    pub fn new(column: &str, reducer: Reducer) -> Self {
        Measure {
            column: column.to_string(),
            reducer,
        }
    }

    pub fn sum(column: &str) -> Self {
        Self::new(column, Reducer::Sum)
    }

    pub fn mean(column: &str) -> Self {
        Self::new(column, Reducer::Mean)
    }

    pub fn count(column: &str) -> Self {
        Self::new(column, Reducer::Count)
    }

    pub fn alias(&self) -> String {
        format!("{}_{}", self.reducer, self.column)
    }

    fn expr(&self) -> Expr {
        let source = col(self.column.as_str());
        let reduced = match self.reducer {
            Reducer::Sum => source.sum(),
            Reducer::Mean => source.mean(),
            Reducer::Count => source.count(),
        };
        reduced.cast(DataType::Float64).alias(self.alias())
    }
}

/// Output ordering. Single-factor summaries are usually ranked by a
/// measure; heatmap inputs keep key order.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupOrder {
    Natural,
    Descending(Measure),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRow {
    pub keys: Vec<String>,
    pub values: Vec<f64>,
}

/// Result of one grouping. Only observed key combinations are present.
#[derive(Debug, Clone)]
pub struct AggregateTable {
    pub group_by: Vec<String>,
    pub measures: Vec<Measure>,
    pub frame: DataFrame,
}

impl AggregateTable {
    pub fn len(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    pub fn rows(&self) -> Result<Vec<AggregateRow>> {
        let key_columns = self
            .group_by
            .iter()
            .map(|name| Ok(self.frame.column(name)?.cast(&DataType::String)?))
            .collect::<Result<Vec<Column>>>()?;
        let key_values = key_columns
            .iter()
            .map(|c| Ok(c.str()?))
            .collect::<Result<Vec<&StringChunked>>>()?;
        let measure_values = self
            .measures
            .iter()
            .map(|m| Ok(self.frame.column(&m.alias())?.f64()?))
            .collect::<Result<Vec<&Float64Chunked>>>()?;

        let rows = (0..self.frame.height())
            .map(|i| AggregateRow {
                keys: key_values
                    .iter()
                    .map(|k| k.get(i).unwrap_or_default().to_string())
                    .collect(),
                values: measure_values
                    .iter()
                    .map(|m| m.get(i).unwrap_or(f64::NAN))
                    .collect(),
            })
            .collect();

        Ok(rows)
    }

    /// Looks up one cell; `None` when the key combination was never observed.
    pub fn value(&self, keys: &[&str], measure: &Measure) -> Result<Option<f64>> {
        let Some(position) = self.measures.iter().position(|m| m == measure) else {
            return Err(PipelineError::UnknownColumn(measure.alias()));
        };

        Ok(self
            .rows()?
            .into_iter()
            .find(|row| row.keys.iter().map(String::as_str).eq(keys.iter().copied()))
            .map(|row| row.values[position]))
    }
}

/// Group-by reductions over the enriched order table.
pub struct Aggregator;

impl Aggregator {
    pub fn aggregate(
        &self,
        table: &DataFrame,
        group_by: &[&str],
        measures: &[Measure],
        order: GroupOrder,
    ) -> Result<AggregateTable> {
        if group_by.is_empty() || measures.is_empty() {
            return Err(PipelineError::Config(
                "an aggregate needs at least one key and one measure".into(),
            ));
        }

        for name in group_by
            .iter()
            .copied()
            .chain(measures.iter().map(|m| m.column.as_str()))
        {
            if table.column(name).is_err() {
                return Err(PipelineError::UnknownColumn(name.to_string()));
            }
        }

        if let GroupOrder::Descending(measure) = &order {
            if !measures.contains(measure) {
                return Err(PipelineError::UnknownColumn(measure.alias()));
            }
        }

        let keys: Vec<Expr> = group_by.iter().map(|name| col(*name)).collect();
        let aggregations: Vec<Expr> = measures.iter().map(Measure::expr).collect();

        let grouped = table.clone().lazy().group_by(keys.clone()).agg(aggregations);

        let sorted = match &order {
            GroupOrder::Natural => grouped.sort_by_exprs(keys, SortMultipleOptions::default()),
            GroupOrder::Descending(measure) => {
                let mut by = vec![col(measure.alias())];
                by.extend(keys);
                let descending = std::iter::once(true).chain(group_by.iter().map(|_| false));
                grouped.sort_by_exprs(
                    by,
                    SortMultipleOptions::default().with_order_descending_multi(descending),
                )
            }
        };

        let frame = sorted.collect()?;

        Ok(AggregateTable {
            group_by: group_by.iter().map(|s| s.to_string()).collect(),
            measures: measures.to_vec(),
            frame,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment_fixture() -> DataFrame {
        df!(
            "segment" => ["Consumer", "Corporate", "Consumer"],
            "sub_category" => ["Chairs", "Tables", "Phones"],
            "sales" => [100.0, 50.0, 25.0],
            "profit" => [-10.0, 30.0, 5.0]
        )
        .unwrap()
    }

    #[test]
    fn test_sum_by_segment() {
        let table = Aggregator
            .aggregate(
                &segment_fixture(),
                &["segment"],
                &[Measure::sum("sales")],
                GroupOrder::Natural,
            )
            .unwrap();

        let rows = table.rows().unwrap();
        assert_eq!(
            rows,
            vec![
                AggregateRow {
                    keys: vec!["Consumer".into()],
                    values: vec![125.0]
                },
                AggregateRow {
                    keys: vec!["Corporate".into()],
                    values: vec![50.0]
                },
            ]
        );
    }

    #[test]
    fn test_sorted_descending_by_profit() {
        let profit = Measure::sum("profit");
        let table = Aggregator
            .aggregate(
                &segment_fixture(),
                &["segment"],
                &[Measure::sum("sales"), profit.clone()],
                GroupOrder::Descending(profit.clone()),
            )
            .unwrap();

        let rows = table.rows().unwrap();
        assert_eq!(rows[0].keys, vec!["Corporate"]);
        assert_eq!(rows[0].values, vec![50.0, 30.0]);
        assert_eq!(rows[1].keys, vec!["Consumer"]);
        assert_eq!(rows[1].values, vec![125.0, -5.0]);
    }

    #[test]
    fn test_unobserved_combinations_are_absent() {
        let profit = Measure::sum("profit");
        let table = Aggregator
            .aggregate(
                &segment_fixture(),
                &["segment", "sub_category"],
                &[profit.clone()],
                GroupOrder::Natural,
            )
            .unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.value(&["Consumer", "Chairs"], &profit).unwrap(), Some(-10.0));
        assert_eq!(table.value(&["Corporate", "Chairs"], &profit).unwrap(), None);
    }

    #[test]
    fn test_mean_and_count() {
        let table = Aggregator
            .aggregate(
                &segment_fixture(),
                &["segment"],
                &[Measure::mean("sales"), Measure::count("sales")],
                GroupOrder::Natural,
            )
            .unwrap();

        let consumer = &table.rows().unwrap()[0];
        assert_eq!(consumer.values, vec![62.5, 2.0]);
    }

    #[test]
    fn test_unknown_column() {
        let err = Aggregator
            .aggregate(
                &segment_fixture(),
                &["territory"],
                &[Measure::sum("sales")],
                GroupOrder::Natural,
            )
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnknownColumn(name) if name == "territory"));
    }
}
