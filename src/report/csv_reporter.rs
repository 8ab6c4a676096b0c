use super::{Heatmap, ReportSink, run_directory, section_file};
use crate::error::Result;
use crate::pipeline::{AnalysisReport, ModelOutcome, SectionKind};
use chrono::Utc;
use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::info;

/// Writes every section as CSV into a fresh run directory, plus the
/// per-row predictions and a JSON model summary when a fit exists.
pub struct CsvReporter {
    run_dir: PathBuf,
}

impl CsvReporter {
    pub fn new(base: &Path) -> Self {
        CsvReporter {
            run_dir: run_directory(base, Utc::now()),
        }
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    fn write_frame(&self, slug: &str, frame: &DataFrame) -> Result<PathBuf> {
        let path = section_file(&self.run_dir, slug);
        let mut file = File::create(&path)?;
        CsvWriter::new(&mut file).finish(&mut frame.clone())?;
        Ok(path)
    }
}

impl ReportSink for CsvReporter {
    fn render(&mut self, report: &AnalysisReport) -> Result<()> {
        std::fs::create_dir_all(&self.run_dir)?;

        for section in &report.sections {
            let frame = match section.kind {
                SectionKind::Ranking => section.table.frame.clone(),
                SectionKind::Heatmap => Heatmap::from_aggregate(&section.table)?.to_dataframe()?,
            };
            let path = self.write_frame(section.slug, &frame)?;
            info!("Stored section '{}' at: {}", section.slug, path.display());
        }

        if let ModelOutcome::Fitted { model, predictions } = &report.model {
            let path = self.write_frame("predictions", &predictions.to_dataframe()?)?;
            info!("Stored predictions at: {}", path.display());

            let summary_path = self.run_dir.join("model_summary.json");
            let json = serde_json::to_string_pretty(model.summary())?;
            std::fs::write(&summary_path, json)?;
            info!("Stored model summary at: {}", summary_path.display());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::loader::test_support::*;
    use crate::analysis::Modeler;
    use crate::analysis::modeler::tests::synthetic_table;
    use crate::pipeline::AnalysisPipeline;
    use crate::processor::QualityReport;

    #[test]
    fn test_writes_one_file_per_section() {
        let path = fixture_with_rows(&[
            "1,CA-1,11/8/16,11/11/16,Second Class,CG-1,Claire Gute,Consumer,South,P-1,Furniture,Chairs,100,2,0,10",
            "2,CA-2,12/8/16,12/11/16,Standard Class,CG-2,Darrin Van Huff,Corporate,West,P-2,Technology,Phones,50,1,0.2,-5",
        ]);
        let report = AnalysisPipeline::new(AnalysisConfig::default())
            .run_path(&path)
            .unwrap();
        let _ = std::fs::remove_file(&path);

        let base = std::env::temp_dir().join(format!("superstore-report-{}", uuid::Uuid::new_v4()));
        let mut reporter = CsvReporter::new(&base);
        reporter.render(&report).unwrap();

        for section in &report.sections {
            assert!(section_file(reporter.run_dir(), section.slug).exists());
        }
        // Two rows cannot carry the regression
        assert!(!reporter.run_dir().join("model_summary.json").exists());

        let _ = std::fs::remove_dir_all(&base);
    }

    #[test]
    fn test_fitted_model_writes_predictions_and_summary() {
        let table = synthetic_table(60, 11);
        let model = Modeler::default().fit(&table).unwrap();
        let predictions = model.append_predictions(&table).unwrap();
        let report = AnalysisReport {
            quality: QualityReport::default(),
            table: table.clone(),
            sections: Vec::new(),
            model: ModelOutcome::Fitted {
                model: model.clone(),
                predictions,
            },
        };

        let base = std::env::temp_dir().join(format!("superstore-report-{}", uuid::Uuid::new_v4()));
        let mut reporter = CsvReporter::new(&base);
        reporter.render(&report).unwrap();

        let predictions_path = section_file(reporter.run_dir(), "predictions");
        let written = CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(predictions_path))
            .unwrap()
            .finish()
            .unwrap();
        assert_eq!(written.height(), table.len());
        assert!(written.column("fitted_profit").is_ok());
        assert!(written.column("residual").is_ok());

        let json = std::fs::read_to_string(reporter.run_dir().join("model_summary.json")).unwrap();
        let summary: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(summary["n_obs"], 60);
        assert_eq!(summary["n_params"], 12);
        assert!((summary["r_squared"].as_f64().unwrap() - model.r_squared()).abs() < 1e-12);
        assert!(summary["adj_r_squared"].is_f64());
        assert_eq!(summary["residual_quantiles"].as_array().unwrap().len(), 5);
        assert_eq!(summary["coefficients"].as_array().unwrap().len(), 12);
        assert_eq!(summary["coefficients"][0]["term"], "(Intercept)");

        let _ = std::fs::remove_dir_all(&base);
    }
}
