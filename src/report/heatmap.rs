use crate::analysis::AggregateTable;
use crate::error::{PipelineError, Result};
use polars::prelude::*;
use std::collections::{BTreeSet, HashMap};

/// Two-key aggregate laid out as a grid. Unobserved cells stay `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct Heatmap {
    pub row_key: String,
    pub column_key: String,
    pub measure: String,
    pub rows: Vec<String>,
    pub columns: Vec<String>,
    pub cells: Vec<Vec<Option<f64>>>,
}

impl Heatmap {
    pub fn from_aggregate(table: &AggregateTable) -> Result<Self> {
        let [row_key, column_key] = table.group_by.as_slice() else {
            return Err(PipelineError::Config(format!(
                "a heatmap needs exactly two keys, got {}",
                table.group_by.len()
            )));
        };
        let measure = table
            .measures
            .first()
            .ok_or_else(|| PipelineError::Config("a heatmap needs a measure".into()))?;

        let aggregate_rows = table.rows()?;
        let rows: BTreeSet<String> = aggregate_rows.iter().map(|r| r.keys[0].clone()).collect();
        let columns: BTreeSet<String> = aggregate_rows.iter().map(|r| r.keys[1].clone()).collect();
        let rows: Vec<String> = rows.into_iter().collect();
        let columns: Vec<String> = columns.into_iter().collect();

        let observed: HashMap<(&str, &str), f64> = aggregate_rows
            .iter()
            .map(|r| ((r.keys[0].as_str(), r.keys[1].as_str()), r.values[0]))
            .collect();

        let cells = rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|column| observed.get(&(row.as_str(), column.as_str())).copied())
                    .collect()
            })
            .collect();

        Ok(Heatmap {
            row_key: row_key.clone(),
            column_key: column_key.clone(),
            measure: measure.alias(),
            rows,
            columns,
            cells,
        })
    }

    pub fn cell(&self, row: &str, column: &str) -> Option<f64> {
        let r = self.rows.iter().position(|x| x == row)?;
        let c = self.columns.iter().position(|x| x == column)?;
        self.cells[r][c]
    }

    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let mut columns: Vec<Column> =
            vec![Series::new(self.row_key.as_str().into(), self.rows.clone()).into()];
        for (c, name) in self.columns.iter().enumerate() {
            let values: Vec<Option<f64>> = self.cells.iter().map(|row| row[c]).collect();
            columns.push(Series::new(name.as_str().into(), values).into());
        }
        Ok(DataFrame::new(columns)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{Aggregator, GroupOrder, Measure};

    #[test]
    fn test_absent_cells_are_not_zero() {
        let frame = df!(
            "segment" => ["Consumer", "Corporate", "Consumer"],
            "sub_category" => ["Chairs", "Tables", "Tables"],
            "profit" => [10.0, -4.0, 3.0]
        )
        .unwrap();
        let table = Aggregator
            .aggregate(
                &frame,
                &["segment", "sub_category"],
                &[Measure::sum("profit")],
                GroupOrder::Natural,
            )
            .unwrap();

        let heatmap = Heatmap::from_aggregate(&table).unwrap();
        assert_eq!(heatmap.rows, vec!["Consumer", "Corporate"]);
        assert_eq!(heatmap.columns, vec!["Chairs", "Tables"]);
        assert_eq!(heatmap.cell("Consumer", "Chairs"), Some(10.0));
        assert_eq!(heatmap.cell("Corporate", "Chairs"), None);

        let grid = heatmap.to_dataframe().unwrap();
        assert_eq!(grid.column("Chairs").unwrap().null_count(), 1);
    }
}
