//! Ordinary least squares for `profit ~ discount * sub_category * sales`.
//!
//! The full factorial expands to the intercept, the three main effects, the
//! three pairwise interactions and the triple interaction. `sub_category`
//! is treatment coded against its alphabetically first observed level, so
//! with `k` levels the design has `4k` columns.
//!
//! The fit is a Householder QR on unit-scaled columns. A column whose
//! remaining norm after projecting out the earlier columns falls below the
//! rank tolerance makes the fit fail instead of producing arbitrary
//! coefficients.

use crate::error::{PipelineError, Result};
use crate::models::{OrderLine, PredictedOrder};
use crate::processor::EnrichedTable;
use crate::processor::feature_deriver::column;
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info};

pub const FORMULA: &str = "profit ~ discount * sub_category * sales";

/// Term layout of the design matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct DesignLayout {
    levels: Vec<String>,
}

impl DesignLayout {
    pub fn from_orders<'a>(orders: impl Iterator<Item = &'a OrderLine>) -> Self {
        let levels: BTreeSet<String> = orders.map(|o| o.sub_category.clone()).collect();
        DesignLayout {
            levels: levels.into_iter().collect(),
        }
    }

    pub fn reference_level(&self) -> Option<&str> {
        self.levels.first().map(String::as_str)
    }

    fn contrast_levels(&self) -> &[String] {
        self.levels.get(1..).unwrap_or(&[])
    }

    pub fn n_params(&self) -> usize {
        4 * self.levels.len().max(1)
    }

    pub fn term_names(&self) -> Vec<String> {
        let contrasts = self.contrast_levels();
        let mut names = vec!["(Intercept)".to_string(), "discount".to_string()];
        names.extend(contrasts.iter().map(|l| format!("sub_category{}", l)));
        names.push("sales".to_string());
        names.extend(contrasts.iter().map(|l| format!("discount:sub_category{}", l)));
        names.push("discount:sales".to_string());
        names.extend(contrasts.iter().map(|l| format!("sub_category{}:sales", l)));
        names.extend(
            contrasts
                .iter()
                .map(|l| format!("discount:sub_category{}:sales", l)),
        );
        names
    }

    /// One design row, laid out like `term_names`.
    pub fn encode(&self, discount: f64, sub_category: &str, sales: f64) -> Result<Vec<f64>> {
        if !self.levels.iter().any(|l| l == sub_category) {
            return Err(PipelineError::UnknownLevel {
                term: "sub_category".to_string(),
                level: sub_category.to_string(),
            });
        }

        let indicators: Vec<f64> = self
            .contrast_levels()
            .iter()
            .map(|l| if l == sub_category { 1.0 } else { 0.0 })
            .collect();

        let mut row = Vec::with_capacity(self.n_params());
        row.push(1.0);
        row.push(discount);
        row.extend(indicators.iter().copied());
        row.push(sales);
        row.extend(indicators.iter().map(|i| discount * i));
        row.push(discount * sales);
        row.extend(indicators.iter().map(|i| i * sales));
        row.extend(indicators.iter().map(|i| discount * i * sales));
        Ok(row)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Coefficient {
    pub term: String,
    pub estimate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FitSummary {
    pub formula: String,
    pub n_obs: usize,
    pub n_params: usize,
    pub r_squared: f64,
    pub adj_r_squared: Option<f64>,
    pub residual_std_error: Option<f64>,
    /// Minimum, first quartile, median, third quartile, maximum.
    pub residual_quantiles: [f64; 5],
    pub coefficients: Vec<Coefficient>,
}

#[derive(Debug, Clone)]
pub struct RegressionModel {
    design: DesignLayout,
    coefficients: Array1<f64>,
    summary: FitSummary,
}

impl RegressionModel {
    pub fn summary(&self) -> &FitSummary {
        &self.summary
    }

    pub fn r_squared(&self) -> f64 {
        self.summary.r_squared
    }

    pub fn coefficients(&self) -> &[Coefficient] {
        &self.summary.coefficients
    }

    pub fn coefficient(&self, term: &str) -> Option<f64> {
        self.summary
            .coefficients
            .iter()
            .find(|c| c.term == term)
            .map(|c| c.estimate)
    }

    pub fn predict(&self, order: &OrderLine) -> Result<f64> {
        let row = self
            .design
            .encode(order.discount, &order.sub_category, order.sales)?;
        Ok(row
            .iter()
            .zip(self.coefficients.iter())
            .map(|(x, b)| x * b)
            .sum())
    }

    pub fn residual(&self, order: &OrderLine) -> Result<f64> {
        Ok(order.profit - self.predict(order)?)
    }

    /// Second append-only pass: each enriched row gains its fitted value
    /// and residual.
    pub fn append_predictions(&self, table: &EnrichedTable) -> Result<PredictedTable> {
        let rows = table
            .rows
            .iter()
            .map(|enriched| {
                let fitted_profit = self.predict(&enriched.order)?;
                Ok(PredictedOrder {
                    enriched: enriched.clone(),
                    fitted_profit,
                    residual: enriched.order.profit - fitted_profit,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(PredictedTable { rows })
    }
}

#[derive(Debug, Clone, Default)]
pub struct PredictedTable {
    pub rows: Vec<PredictedOrder>,
}

impl PredictedTable {
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let enriched = EnrichedTable {
            rows: self.rows.iter().map(|r| r.enriched.clone()).collect(),
        };
        let mut frame = enriched.to_dataframe()?;
        frame.with_column(column("fitted_profit", self.rows.as_slice(), |r| r.fitted_profit))?;
        frame.with_column(column("residual", self.rows.as_slice(), |r| r.residual))?;
        Ok(frame)
    }
}

pub struct Modeler {
    rank_tolerance: f64,
}

impl Default for Modeler {
    fn default() -> Self {
        Self::new(1e-7)
    }
}

impl Modeler {
    pub fn new(rank_tolerance: f64) -> Self {
        Modeler { rank_tolerance }
    }

    pub fn fit(&self, table: &EnrichedTable) -> Result<RegressionModel> {
        let design = DesignLayout::from_orders(table.rows.iter().map(|r| &r.order));
        let n_obs = table.len();
        let n_params = design.n_params();

        if n_obs == 0 {
            return Err(singular("no observations", n_obs, n_params));
        }
        if n_obs < n_params {
            return Err(singular(
                "fewer observations than model terms",
                n_obs,
                n_params,
            ));
        }

        let mut x = Array2::<f64>::zeros((n_obs, n_params));
        let mut y = Array1::<f64>::zeros(n_obs);
        for (i, enriched) in table.rows.iter().enumerate() {
            let order = &enriched.order;
            let row = design.encode(order.discount, &order.sub_category, order.sales)?;
            for (j, value) in row.into_iter().enumerate() {
                x[[i, j]] = value;
            }
            y[i] = order.profit;
        }

        let names = design.term_names();
        let coefficients = self.least_squares(&x, &y, &names)?;

        let fitted = x.dot(&coefficients);
        let residuals = &y - &fitted;
        let summary = summarize(&y, &residuals, &coefficients, &names);

        info!(
            "Fitted {} on {} rows: {} terms, R² = {:.4}",
            FORMULA, n_obs, n_params, summary.r_squared
        );

        Ok(RegressionModel {
            design,
            coefficients,
            summary,
        })
    }

    fn least_squares(&self, x: &Array2<f64>, y: &Array1<f64>, names: &[String]) -> Result<Array1<f64>> {
        let (n, p) = x.dim();

        let mut scale = Array1::<f64>::zeros(p);
        for j in 0..p {
            scale[j] = x.column(j).iter().map(|v| v * v).sum::<f64>().sqrt();
            if scale[j] == 0.0 {
                return Err(singular(
                    &format!("term '{}' is identically zero", names[j]),
                    n,
                    p,
                ));
            }
        }

        let mut a = x.clone();
        for j in 0..p {
            let s = scale[j];
            a.column_mut(j).mapv_inplace(|v| v / s);
        }
        let mut qty = y.clone();

        for j in 0..p {
            let norm = (j..n).map(|i| a[[i, j]] * a[[i, j]]).sum::<f64>().sqrt();
            if norm <= self.rank_tolerance {
                return Err(singular(
                    &format!(
                        "term '{}' is a linear combination of earlier terms",
                        names[j]
                    ),
                    n,
                    p,
                ));
            }

            let alpha = if a[[j, j]] > 0.0 { -norm } else { norm };
            let mut v: Vec<f64> = (j..n).map(|i| a[[i, j]]).collect();
            v[0] -= alpha;
            let v_norm2: f64 = v.iter().map(|e| e * e).sum();

            if v_norm2 > 0.0 {
                for k in j..p {
                    let dot: f64 = (j..n).map(|i| v[i - j] * a[[i, k]]).sum();
                    let factor = 2.0 * dot / v_norm2;
                    for i in j..n {
                        a[[i, k]] -= factor * v[i - j];
                    }
                }
                let dot: f64 = (j..n).map(|i| v[i - j] * qty[i]).sum();
                let factor = 2.0 * dot / v_norm2;
                for i in j..n {
                    qty[i] -= factor * v[i - j];
                }
            }
        }

        // Back substitution on the upper triangle, then undo the scaling.
        let mut beta = Array1::<f64>::zeros(p);
        for j in (0..p).rev() {
            let tail: f64 = ((j + 1)..p).map(|k| a[[j, k]] * beta[k]).sum();
            beta[j] = (qty[j] - tail) / a[[j, j]];
        }

        debug!("Solved {} x {} least squares system", n, p);
        Ok(&beta / &scale)
    }
}

fn singular(reason: &str, n_obs: usize, n_params: usize) -> PipelineError {
    PipelineError::SingularFit {
        reason: reason.to_string(),
        n_obs,
        n_params,
    }
}

fn summarize(
    y: &Array1<f64>,
    residuals: &Array1<f64>,
    coefficients: &Array1<f64>,
    names: &[String],
) -> FitSummary {
    let n = y.len();
    let p = coefficients.len();
    let mean = y.sum() / n as f64;
    let ss_tot: f64 = y.iter().map(|v| (v - mean).powi(2)).sum();
    let ss_res: f64 = residuals.iter().map(|r| r * r).sum();

    // A constant response has nothing to explain.
    let r_squared = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 };
    let (adj_r_squared, residual_std_error) = if n > p {
        let df = (n - p) as f64;
        (
            Some(1.0 - (1.0 - r_squared) * (n as f64 - 1.0) / df),
            Some((ss_res / df).sqrt()),
        )
    } else {
        (None, None)
    };

    let mut sorted: Vec<f64> = residuals.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    FitSummary {
        formula: FORMULA.to_string(),
        n_obs: n,
        n_params: p,
        r_squared,
        adj_r_squared,
        residual_std_error,
        residual_quantiles: [0.0, 0.25, 0.5, 0.75, 1.0].map(|q| quantile(&sorted, q)),
        coefficients: names
            .iter()
            .zip(coefficients.iter())
            .map(|(term, estimate)| Coefficient {
                term: term.clone(),
                estimate: *estimate,
            })
            .collect(),
    }
}

/// Linear interpolation between order statistics of a sorted slice.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let weight = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}
