use crate::config::InputConfig;
use crate::error::{PipelineError, Result};
use crate::models::OrderLine;
use chrono::NaiveDate;
use polars::prelude::*;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

/// Reads order-line files. Reading keeps every cell as text so that the
/// cleaner can count gaps before anything is coerced; `parse_orders` then
/// applies the typed schema.
pub struct OrderLoader {
    config: InputConfig,
}

impl OrderLoader {
    pub fn new(config: InputConfig) -> Self {
        OrderLoader { config }
    }

    pub fn config(&self) -> &InputConfig {
        &self.config
    }

    pub fn read_frame(&self, path: &Path) -> Result<DataFrame> {
        if !path.exists() {
            return Err(PipelineError::malformed(format!(
                "input file not found: {}",
                path.display()
            )));
        }

        let separator = self.config.delimiter_byte()?;

        let frame = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .with_parse_options(CsvParseOptions::default().with_separator(separator))
            .try_into_reader_with_file_path(Some(path.to_path_buf()))
            .map_err(|e| PipelineError::malformed(format!("Failed to create CSV reader: {}", e)))?
            .finish()
            .map_err(|e| PipelineError::malformed(format!("Failed to read CSV: {}", e)))?;

        if frame.height() == 0 {
            return Err(PipelineError::malformed(format!(
                "{} contains no order lines",
                path.display()
            )));
        }

        info!(
            "Read {} rows x {} columns from {}",
            frame.height(),
            frame.width(),
            path.display()
        );

        Ok(frame)
    }

    /// Converts a cleaned frame (normalised column names) into typed rows.
    pub fn parse_orders(&self, frame: &DataFrame) -> Result<Vec<OrderLine>> {
        let row_id = text_column(frame, "row_id")?;
        let order_id = text_column(frame, "order_id")?;
        let order_date = text_column(frame, "order_date")?;
        let ship_date = text_column(frame, "ship_date")?;
        let ship_mode = text_column(frame, "ship_mode")?;
        let customer_id = text_column(frame, "customer_id")?;
        let segment = text_column(frame, "segment")?;
        let region = text_column(frame, "region")?;
        let product_id = text_column(frame, "product_id")?;
        let category = text_column(frame, "category")?;
        let sub_category = text_column(frame, "sub_category")?;
        let sales = text_column(frame, "sales")?;
        let quantity = text_column(frame, "quantity")?;
        let discount = text_column(frame, "discount")?;
        let profit = text_column(frame, "profit")?;

        let date_format = self.config.date_format.as_str();
        let mut orders = Vec::with_capacity(frame.height());

        for row in 0..frame.height() {
            let order = OrderLine {
                row_id: parse_value(row_id, "row_id", row)?,
                order_id: required(order_id, "order_id", row)?.to_string(),
                order_date: parse_date(order_date, "order_date", row, date_format)?,
                ship_date: parse_date(ship_date, "ship_date", row, date_format)?,
                ship_mode: required(ship_mode, "ship_mode", row)?.to_string(),
                customer_id: required(customer_id, "customer_id", row)?.to_string(),
                segment: required(segment, "segment", row)?.to_string(),
                region: required(region, "region", row)?.to_string(),
                product_id: required(product_id, "product_id", row)?.to_string(),
                category: required(category, "category", row)?.to_string(),
                sub_category: required(sub_category, "sub_category", row)?.to_string(),
                sales: parse_amount(sales, "sales", row)?,
                quantity: parse_value(quantity, "quantity", row)?,
                discount: parse_amount(discount, "discount", row)?,
                profit: parse_amount(profit, "profit", row)?,
            };
            orders.push(order);
        }

        debug!("Parsed {} typed order lines", orders.len());
        Ok(orders)
    }
}

fn text_column<'a>(frame: &'a DataFrame, name: &str) -> Result<&'a StringChunked> {
    let column = frame
        .column(name)
        .map_err(|_| PipelineError::malformed(format!("required column '{}' is absent", name)))?;

    column
        .str()
        .map_err(|_| PipelineError::malformed(format!("column '{}' was not read as text", name)))
}

// Rows are reported as file line numbers (header is line 1).
fn required<'a>(values: &'a StringChunked, name: &str, row: usize) -> Result<&'a str> {
    match values.get(row).map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(PipelineError::malformed(format!(
            "line {}: column '{}' has no value",
            row + 2,
            name
        ))),
    }
}

fn parse_value<T: FromStr>(values: &StringChunked, name: &str, row: usize) -> Result<T> {
    let raw = required(values, name, row)?;
    raw.parse::<T>().map_err(|_| {
        PipelineError::malformed(format!(
            "line {}: cannot read '{}' in column '{}' as {}",
            row + 2,
            raw,
            name,
            std::any::type_name::<T>()
        ))
    })
}

fn parse_amount(values: &StringChunked, name: &str, row: usize) -> Result<f64> {
    let amount: f64 = parse_value(values, name, row)?;
    if !amount.is_finite() {
        return Err(PipelineError::malformed(format!(
            "line {}: column '{}' holds a non-finite number",
            row + 2,
            name
        )));
    }
    Ok(amount)
}

fn parse_date(values: &StringChunked, name: &str, row: usize, format: &str) -> Result<NaiveDate> {
    let raw = required(values, name, row)?;
    NaiveDate::parse_from_str(raw, format).map_err(|e| {
        PipelineError::malformed(format!(
            "line {}: '{}' in column '{}' does not match {} ({})",
            row + 2,
            raw,
            name,
            format,
            e
        ))
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::PathBuf;
    use uuid::Uuid;

    pub const HEADER: &str = "Row ID,Order ID,Order Date,Ship Date,Ship Mode,Customer ID,Customer Name,Segment,Region,Product ID,Category,Sub-Category,Sales,Quantity,Discount,Profit";

    pub fn write_fixture(contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("superstore-{}.csv", Uuid::new_v4()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    pub fn fixture_with_rows(rows: &[&str]) -> PathBuf {
        let mut contents = String::from(HEADER);
        for row in rows {
            contents.push('\n');
            contents.push_str(row);
        }
        contents.push('\n');
        write_fixture(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::processor::ColumnCleaner;

    fn loader() -> OrderLoader {
        OrderLoader::new(InputConfig::default())
    }

    fn load(rows: &[&str]) -> Result<Vec<OrderLine>> {
        let path = fixture_with_rows(rows);
        let loader = loader();
        let frame = loader.read_frame(&path)?;
        let cleaned = ColumnCleaner::new(loader.config().clone()).clean(&frame)?;
        let _ = std::fs::remove_file(&path);
        loader.parse_orders(&cleaned.frame)
    }

    #[test]
    fn test_reads_typed_rows() {
        let orders = load(&[
            "1,CA-2016-152156,11/8/16,11/11/16,Second Class,CG-12520,Claire Gute,Consumer,South,FUR-BO-10001798,Furniture,Bookcases,261.96,2,0,41.9136",
            "2,CA-2016-152156,11/8/16,11/11/16,Second Class,CG-12520,Claire Gute,Consumer,South,FUR-CH-10000454,Furniture,Chairs,731.94,3,0,219.582",
        ])
        .unwrap();

        assert_eq!(orders.len(), 2);
        let first = &orders[0];
        assert_eq!(first.row_id, 1);
        assert_eq!(first.order_date, NaiveDate::from_ymd_opt(2016, 11, 8).unwrap());
        assert_eq!(first.ship_date, NaiveDate::from_ymd_opt(2016, 11, 11).unwrap());
        assert_eq!(first.sub_category, "Bookcases");
        assert_eq!(first.quantity, 2);
        assert_eq!(first.discount, 0.0);
        assert!((first.profit - 41.9136).abs() < 1e-9);
    }

    #[test]
    fn test_missing_file_is_malformed_input() {
        let err = loader()
            .read_frame(Path::new("/definitely/not/here.csv"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::MalformedInput(_)));
    }

    #[test]
    fn test_bad_date_is_rejected() {
        let err = load(&[
            "1,CA-1,13/40/16,11/11/16,Second Class,CG-1,Claire Gute,Consumer,South,P-1,Furniture,Chairs,10,1,0,1",
        ])
        .unwrap_err();
        match err {
            PipelineError::MalformedInput(message) => assert!(message.contains("order_date")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_four_digit_year_does_not_match_format() {
        let err = load(&[
            "1,CA-1,11/8/2016,11/11/16,Second Class,CG-1,Claire Gute,Consumer,South,P-1,Furniture,Chairs,10,1,0,1",
        ])
        .unwrap_err();
        assert!(matches!(err, PipelineError::MalformedInput(_)));
    }

    #[test]
    fn test_non_numeric_sales_is_rejected() {
        let err = load(&[
            "1,CA-1,11/8/16,11/11/16,Second Class,CG-1,Claire Gute,Consumer,South,P-1,Furniture,Chairs,lots,1,0,1",
        ])
        .unwrap_err();
        match err {
            PipelineError::MalformedInput(message) => {
                assert!(message.contains("sales"));
                assert!(message.contains("line 2"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_absent_required_column_is_rejected() {
        let path = write_fixture(
            "Row ID,Order ID,Order Date,Ship Date,Ship Mode,Customer ID,Customer Name,Segment\n1,CA-1,11/8/16,11/11/16,Second Class,CG-1,Claire Gute,Consumer\n",
        );
        let loader = loader();
        let frame = loader.read_frame(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        let cleaned = ColumnCleaner::new(loader.config().clone())
            .clean(&frame)
            .unwrap();

        let err = loader.parse_orders(&cleaned.frame).unwrap_err();
        match err {
            PipelineError::MalformedInput(message) => assert!(message.contains("absent")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
