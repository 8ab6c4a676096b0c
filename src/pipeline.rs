use crate::analysis::{
    AggregateTable, Aggregator, GroupOrder, Measure, Modeler, PredictedTable, RegressionModel,
};
use crate::config::AnalysisConfig;
use crate::error::{PipelineError, Result};
use crate::loader::OrderLoader;
use crate::processor::{ColumnCleaner, EnrichedTable, FeatureDeriver, QualityReport};
use polars::prelude::DataFrame;
use std::path::Path;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    Ranking,
    Heatmap,
}

/// One grouping of the report: keys, measures and presentation.
#[derive(Debug, Clone)]
pub struct SectionPlan {
    pub slug: &'static str,
    pub title: &'static str,
    pub group_by: Vec<&'static str>,
    pub measures: Vec<Measure>,
    pub order: GroupOrder,
    pub kind: SectionKind,
}

impl SectionPlan {
    fn ranking(slug: &'static str, title: &'static str, key: &'static str) -> Self {
        let profit = Measure::sum("profit");
        SectionPlan {
            slug,
            title,
            group_by: vec![key],
            measures: vec![Measure::sum("sales"), profit.clone()],
            order: GroupOrder::Descending(profit),
            kind: SectionKind::Ranking,
        }
    }

    fn heatmap(
        slug: &'static str,
        title: &'static str,
        keys: [&'static str; 2],
        measure: Measure,
    ) -> Self {
        SectionPlan {
            slug,
            title,
            group_by: keys.to_vec(),
            measures: vec![measure],
            order: GroupOrder::Natural,
            kind: SectionKind::Heatmap,
        }
    }
}

/// The sections of the Superstore report, in presentation order.
pub fn standard_sections() -> Vec<SectionPlan> {
    vec![
        SectionPlan {
            slug: "turnaround_by_ship_mode",
            title: "Mean turnaround (days) by ship mode",
            group_by: vec!["ship_mode"],
            measures: vec![Measure::mean("turnaround"), Measure::count("row_id")],
            order: GroupOrder::Natural,
            kind: SectionKind::Ranking,
        },
        SectionPlan::ranking("by_category", "Sales and profit by category", "category"),
        SectionPlan::ranking(
            "by_sub_category",
            "Sales and profit by sub-category",
            "sub_category",
        ),
        SectionPlan::ranking("by_region", "Sales and profit by region", "region"),
        SectionPlan::ranking("by_segment", "Sales and profit by segment", "segment"),
        SectionPlan::heatmap(
            "segment_x_sub_category",
            "Profit by segment and sub-category",
            ["segment", "sub_category"],
            Measure::sum("profit"),
        ),
        SectionPlan::heatmap(
            "region_x_category",
            "Profit by region and category",
            ["region", "category"],
            Measure::sum("profit"),
        ),
        SectionPlan {
            slug: "by_discount_bucket",
            title: "Profit and margin by discount bucket",
            group_by: vec!["discount_bucket"],
            measures: vec![
                Measure::count("row_id"),
                Measure::mean("profit"),
                Measure::mean("margin"),
            ],
            order: GroupOrder::Natural,
            kind: SectionKind::Ranking,
        },
        SectionPlan::heatmap(
            "discount_bucket_x_sub_category",
            "Mean profit by discount bucket and sub-category",
            ["discount_bucket", "sub_category"],
            Measure::mean("profit"),
        ),
        SectionPlan {
            slug: "by_month",
            title: "Sales and profit by order month",
            group_by: vec!["month_number", "month"],
            measures: vec![Measure::sum("sales"), Measure::sum("profit")],
            order: GroupOrder::Natural,
            kind: SectionKind::Ranking,
        },
    ]
}

#[derive(Debug, Clone)]
pub struct ReportSection {
    pub slug: &'static str,
    pub title: &'static str,
    pub kind: SectionKind,
    pub table: AggregateTable,
}

/// Model stage result. A failed fit leaves the aggregates untouched.
#[derive(Debug)]
pub enum ModelOutcome {
    Fitted {
        model: RegressionModel,
        predictions: PredictedTable,
    },
    Failed(PipelineError),
    Skipped,
}

#[derive(Debug)]
pub struct AnalysisReport {
    pub quality: QualityReport,
    pub table: EnrichedTable,
    pub sections: Vec<ReportSection>,
    pub model: ModelOutcome,
}

impl AnalysisReport {
    pub fn section(&self, slug: &str) -> Option<&ReportSection> {
        self.sections.iter().find(|s| s.slug == slug)
    }
}

pub struct AnalysisPipeline {
    config: AnalysisConfig,
    sections: Vec<SectionPlan>,
}

impl AnalysisPipeline {
    pub fn new(config: AnalysisConfig) -> Self {
        AnalysisPipeline {
            config,
            sections: standard_sections(),
        }
    }

    pub fn with_sections(mut self, sections: Vec<SectionPlan>) -> Self {
        self.sections = sections;
        self
    }

    pub fn run(&self) -> Result<AnalysisReport> {
        let path = self.config.input.path.clone();
        self.run_path(Path::new(&path))
    }

    pub fn run_path(&self, path: &Path) -> Result<AnalysisReport> {
        let loader = OrderLoader::new(self.config.input.clone());
        let cleaner = ColumnCleaner::new(self.config.input.clone());

        let raw = loader.read_frame(path)?;
        let cleaned = cleaner.clean(&raw)?;
        let mut quality = cleaned.report;
        quality.log();

        if !quality.is_complete() {
            error!(
                "Incomplete columns: {}",
                quality.incomplete_columns().join(", ")
            );
        }

        let orders = loader.parse_orders(&cleaned.frame)?;
        let range_warnings = cleaner.range_warnings(&orders);
        for warning in &range_warnings {
            warn!("⚠️ {}", warning);
        }
        quality.warnings.extend(range_warnings);
        info!("Loaded {} order lines", orders.len());

        let table = FeatureDeriver.derive(&orders)?;
        let frame = table.to_dataframe()?;
        let sections = self.aggregate_sections(&frame)?;
        info!("Computed {} report sections", sections.len());

        let model = self.fit_model(&table);

        Ok(AnalysisReport {
            quality,
            table,
            sections,
            model,
        })
    }

    pub fn aggregate_sections(&self, frame: &DataFrame) -> Result<Vec<ReportSection>> {
        self.sections
            .iter()
            .map(|plan| {
                let table = Aggregator.aggregate(
                    frame,
                    &plan.group_by,
                    &plan.measures,
                    plan.order.clone(),
                )?;
                Ok(ReportSection {
                    slug: plan.slug,
                    title: plan.title,
                    kind: plan.kind,
                    table,
                })
            })
            .collect()
    }

    fn fit_model(&self, table: &EnrichedTable) -> ModelOutcome {
        if !self.config.model.enabled {
            info!("Regression disabled by configuration");
            return ModelOutcome::Skipped;
        }

        let modeler = Modeler::new(self.config.model.rank_tolerance);
        let fitted = modeler
            .fit(table)
            .and_then(|model| Ok((model.append_predictions(table)?, model)));

        match fitted {
            Ok((predictions, model)) => ModelOutcome::Fitted { model, predictions },
            Err(e) => {
                error!("❌ Regression failed, aggregates are unaffected: {}", e);
                ModelOutcome::Failed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::test_support::*;

    fn two_row_fixture() -> std::path::PathBuf {
        fixture_with_rows(&[
            "1,CA-2017-1,1/3/17,1/7/17,Standard Class,AA-1,Aaron Bergman,Consumer,West,FUR-CH-1,Furniture,Chairs,500,2,0,100",
            "2,CA-2017-2,2/14/17,2/16/17,Second Class,AA-2,Adam Hart,Consumer,East,FUR-TA-1,Furniture,Tables,500,3,0.5,-50",
        ])
    }

    #[test]
    fn test_two_row_scenario_isolates_model_failure() {
        let path = two_row_fixture();
        let report = AnalysisPipeline::new(AnalysisConfig::default())
            .run_path(&path)
            .unwrap();
        let _ = std::fs::remove_file(&path);

        let by_sub_category = &report.section("by_sub_category").unwrap().table;
        let profit = Measure::sum("profit");
        assert_eq!(by_sub_category.value(&["Chairs"], &profit).unwrap(), Some(100.0));
        assert_eq!(by_sub_category.value(&["Tables"], &profit).unwrap(), Some(-50.0));

        // Sorted by profit, descending
        let rows = by_sub_category.rows().unwrap();
        assert_eq!(rows[0].keys, vec!["Chairs"]);

        assert!(matches!(
            report.model,
            ModelOutcome::Failed(PipelineError::SingularFit { .. })
        ));
        assert_eq!(report.sections.len(), standard_sections().len());
    }

    #[test]
    fn test_month_section_is_in_calendar_order() {
        let path = fixture_with_rows(&[
            "1,CA-1,11/8/16,11/11/16,Second Class,CG-1,Claire Gute,Consumer,South,P-1,Furniture,Chairs,100,2,0,10",
            "2,CA-2,2/8/16,2/11/16,Second Class,CG-1,Claire Gute,Consumer,South,P-2,Furniture,Chairs,50,2,0,5",
            "3,CA-3,11/20/16,11/21/16,Same Day,CG-1,Claire Gute,Consumer,South,P-3,Furniture,Chairs,25,1,0.2,-1",
        ]);
        let report = AnalysisPipeline::new(AnalysisConfig::default())
            .run_path(&path)
            .unwrap();
        let _ = std::fs::remove_file(&path);

        let rows = report.section("by_month").unwrap().table.rows().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].keys, vec!["2", "February"]);
        assert_eq!(rows[1].keys, vec!["11", "November"]);
        assert_eq!(rows[1].values, vec![125.0, 9.0]);
    }

    #[test]
    fn test_null_field_reports_then_fails() {
        let path = fixture_with_rows(&[
            "1,CA-1,11/8/16,11/11/16,Second Class,CG-1,Claire Gute,,South,P-1,Furniture,Chairs,100,2,0,10",
        ]);
        let err = AnalysisPipeline::new(AnalysisConfig::default())
            .run_path(&path)
            .unwrap_err();
        let _ = std::fs::remove_file(&path);

        match err {
            PipelineError::MalformedInput(message) => assert!(message.contains("segment")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_zero_sales_aborts_before_aggregation() {
        let path = fixture_with_rows(&[
            "1,CA-1,11/8/16,11/11/16,Second Class,CG-1,Claire Gute,Consumer,South,P-1,Furniture,Chairs,0,2,0,10",
        ]);
        let err = AnalysisPipeline::new(AnalysisConfig::default())
            .run_path(&path)
            .unwrap_err();
        let _ = std::fs::remove_file(&path);

        assert!(matches!(err, PipelineError::DivisionUndefined { row_id: 1 }));
    }

    #[test]
    fn test_model_can_be_disabled() {
        let path = two_row_fixture();
        let mut config = AnalysisConfig::default();
        config.model.enabled = false;
        let report = AnalysisPipeline::new(config).run_path(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert!(matches!(report.model, ModelOutcome::Skipped));
    }
}
