use crate::error::{PipelineError, Result};
use crate::models::{DerivedFeatures, DiscountBucket, EnrichedOrder, OrderLine, month_of};
use polars::prelude::*;
use tracing::info;

/// Rounds to `places` decimals, sending exact halves to the even digit
/// (`0.125` becomes `0.12`).
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round_ties_even() / factor
}

/// Row-wise derivation of turnaround, margin, discount bucket and month.
pub struct FeatureDeriver;

impl FeatureDeriver {
    pub fn derive_row(&self, order: &OrderLine) -> Result<DerivedFeatures> {
        let turnaround = (order.ship_date - order.order_date).num_days();
        if turnaround < 0 {
            return Err(PipelineError::NegativeTurnaround {
                row_id: order.row_id,
                order_date: order.order_date,
                ship_date: order.ship_date,
            });
        }

        if order.sales == 0.0 {
            return Err(PipelineError::DivisionUndefined {
                row_id: order.row_id,
            });
        }

        Ok(DerivedFeatures {
            turnaround,
            margin: round_to(order.profit / order.sales, 2),
            discount_bucket: DiscountBucket::from_discount(order.discount),
            month: month_of(order.order_date),
        })
    }

    /// Builds a new table; the input rows are cloned, never touched.
    pub fn derive(&self, orders: &[OrderLine]) -> Result<EnrichedTable> {
        let rows = orders
            .iter()
            .map(|order| {
                Ok(EnrichedOrder {
                    order: order.clone(),
                    features: self.derive_row(order)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        info!("Derived features for {} order lines", rows.len());
        Ok(EnrichedTable { rows })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrichedTable {
    pub rows: Vec<EnrichedOrder>,
}

impl EnrichedTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let rows = self.rows.as_slice();
        let columns = vec![
            column("row_id", rows, |r| r.order.row_id),
            column("order_id", rows, |r| r.order.order_id.clone()),
            column("order_date", rows, |r| r.order.order_date.to_string()),
            column("ship_date", rows, |r| r.order.ship_date.to_string()),
            column("ship_mode", rows, |r| r.order.ship_mode.clone()),
            column("customer_id", rows, |r| r.order.customer_id.clone()),
            column("segment", rows, |r| r.order.segment.clone()),
            column("region", rows, |r| r.order.region.clone()),
            column("product_id", rows, |r| r.order.product_id.clone()),
            column("category", rows, |r| r.order.category.clone()),
            column("sub_category", rows, |r| r.order.sub_category.clone()),
            column("sales", rows, |r| r.order.sales),
            column("quantity", rows, |r| r.order.quantity),
            column("discount", rows, |r| r.order.discount),
            column("profit", rows, |r| r.order.profit),
            column("turnaround", rows, |r| r.features.turnaround),
            column("margin", rows, |r| r.features.margin),
            column("discount_bucket", rows, |r| r.features.discount_bucket.label()),
            column("month", rows, |r| r.features.month_name().to_string()),
            column("month_number", rows, |r| r.features.month_number()),
        ];

        Ok(DataFrame::new(columns)?)
    }
}

pub(crate) fn column<R, T, F>(name: &str, rows: &[R], value: F) -> Column
where
    F: Fn(&R) -> T,
    Series: NamedFrom<Vec<T>, [T]>,
{
    let values: Vec<T> = rows.iter().map(value).collect();
    Series::new(name.into(), values).into()
}
