use super::{Heatmap, ReportSink};
use crate::error::Result;
use crate::pipeline::{AnalysisReport, ModelOutcome, SectionKind};

/// Prints every section as a table on stdout.
pub struct ConsoleReporter {
    show_rows: usize,
}

impl ConsoleReporter {
    pub fn new(show_rows: usize) -> Self {
        ConsoleReporter { show_rows }
    }
}

impl ReportSink for ConsoleReporter {
    fn render(&mut self, report: &AnalysisReport) -> Result<()> {
        let quality = &report.quality;
        println!("=== DATA QUALITY ===");
        println!(
            "{} rows, completion rate {:.2}%",
            quality.rows,
            quality.completion_rate * 100.0
        );
        if let Some(dropped) = &quality.dropped_column {
            println!("Dropped column: {}", dropped);
        }
        for warning in &quality.warnings {
            println!("  ⚠️ {}", warning);
        }

        for section in &report.sections {
            println!("\n=== {} ===", section.title.to_uppercase());
            let frame = match section.kind {
                SectionKind::Ranking => section.table.frame.clone(),
                SectionKind::Heatmap => Heatmap::from_aggregate(&section.table)?.to_dataframe()?,
            };
            println!("{}", frame.head(Some(self.show_rows)));
        }

        println!("\n=== REGRESSION ===");
        match &report.model {
            ModelOutcome::Fitted { model, .. } => {
                let summary = model.summary();
                println!("{}", summary.formula);
                println!(
                    "{} observations, {} terms, R² = {:.4}",
                    summary.n_obs, summary.n_params, summary.r_squared
                );
                if let (Some(adjusted), Some(sigma)) =
                    (summary.adj_r_squared, summary.residual_std_error)
                {
                    println!("Adjusted R² = {:.4}, residual std. error = {:.3}", adjusted, sigma);
                }
                let [min, q1, median, q3, max] = summary.residual_quantiles;
                println!(
                    "Residuals: min {:.3} | Q1 {:.3} | median {:.3} | Q3 {:.3} | max {:.3}",
                    min, q1, median, q3, max
                );
                for coefficient in summary.coefficients.iter().take(self.show_rows) {
                    println!("  {:<40} {:>14.6}", coefficient.term, coefficient.estimate);
                }
                if summary.coefficients.len() > self.show_rows {
                    println!("  ... {} more terms", summary.coefficients.len() - self.show_rows);
                }
            }
            ModelOutcome::Failed(e) => println!("Model not fitted: {}", e),
            ModelOutcome::Skipped => println!("Model disabled"),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::loader::test_support::*;
    use crate::pipeline::AnalysisPipeline;

    #[test]
    fn test_renders_failed_model_without_error() {
        let path = fixture_with_rows(&[
            "1,CA-1,11/8/16,11/11/16,Second Class,CG-1,Claire Gute,Consumer,South,P-1,Furniture,Chairs,500,2,0,100",
            "2,CA-2,11/9/16,11/12/16,Second Class,CG-1,Claire Gute,Consumer,South,P-2,Furniture,Tables,500,2,0.5,-50",
        ]);
        let report = AnalysisPipeline::new(AnalysisConfig::default())
            .run_path(&path)
            .unwrap();
        let _ = std::fs::remove_file(&path);

        assert!(ConsoleReporter::new(5).render(&report).is_ok());
    }
}
