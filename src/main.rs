use anyhow::{Context, Result};
use std::env;
use std::path::Path;
use superstore_analysis::config::AnalysisConfig;
use superstore_analysis::pipeline::{AnalysisPipeline, ModelOutcome};
use superstore_analysis::report::{ConsoleReporter, CsvReporter, ReportSink};
use tracing::{info, warn};

const DEFAULT_CONFIG: &str = "src/configs/superstore.toml";

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    // Load environment variables
    dotenv::dotenv().ok();

    let config_path = env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG.to_string());

    let file_config = if Path::new(&config_path).exists() {
        AnalysisConfig::from_file(&config_path)
            .with_context(|| format!("Failed to load config from {}", config_path))?
    } else {
        warn!("Config file not found: {}, using defaults", config_path);
        AnalysisConfig::default()
    };
    let config = file_config.with_env_overrides();

    config.validate().context("Invalid configuration")?;

    info!("🚀 Starting Superstore analysis on {}", config.input.path);

    let pipeline = AnalysisPipeline::new(config.clone());
    let report = pipeline
        .run()
        .with_context(|| format!("Failed to analyse {}", config.input.path))?;

    let mut console = ConsoleReporter::new(config.report.show_rows);
    console.render(&report)?;

    if let Some(output_dir) = &config.report.output_dir {
        let mut csv = CsvReporter::new(output_dir);
        csv.render(&report)
            .with_context(|| format!("Failed to write report under {}", output_dir.display()))?;
        info!("Stored report at: {}", csv.run_dir().display());
    }

    info!("\n=== Analysis Summary ===");
    info!("📊 {} order lines, {} sections", report.table.len(), report.sections.len());
    match &report.model {
        ModelOutcome::Fitted { model, .. } => {
            info!("✅ Regression fitted, R² = {:.4}", model.r_squared())
        }
        ModelOutcome::Failed(e) => warn!("⚠️ Regression not available: {}", e),
        ModelOutcome::Skipped => info!("Regression skipped"),
    }

    Ok(())
}
