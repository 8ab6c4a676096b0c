use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use superstore_analysis::config::AnalysisConfig;
use superstore_analysis::loader::OrderLoader;
use superstore_analysis::processor::ColumnCleaner;

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    dotenv::dotenv().ok();

    let config = AnalysisConfig::default().with_env_overrides();
    let path = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&config.input.path));

    println!("=== INSPECTING {} ===\n", path.display());

    let loader = OrderLoader::new(config.input.clone());
    let cleaner = ColumnCleaner::new(config.input.clone());

    let raw = loader
        .read_frame(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    println!("1. Columns as read:");
    for name in raw.get_column_names() {
        println!("   {} -> {}", name, cleaner.normalize_column_name(name));
    }

    let cleaned = cleaner.clean(&raw)?;
    let report = &cleaned.report;

    println!("\n2. Completeness ({:.2}% overall):", report.completion_rate * 100.0);
    for column in &report.completeness {
        println!(
            "   {:<14} {:>6.2}% ({} missing)",
            column.column,
            column.rate() * 100.0,
            column.missing
        );
    }

    println!("\n3. Categorical values:");
    for (column, values) in &report.distinct_values {
        println!("   {}:", column);
        for (value, count) in values {
            println!("      {:<20} {}", value, count);
        }
    }

    if !report.warnings.is_empty() {
        println!("\n4. Findings for review:");
        for warning in &report.warnings {
            println!("   ⚠️ {}", warning);
        }
    }

    // Surface coercion problems without running the rest of the analysis
    match loader.parse_orders(&cleaned.frame) {
        Ok(orders) => {
            println!("\n✅ {} rows parse against the order schema", orders.len());
            for warning in cleaner.range_warnings(&orders) {
                println!("   ⚠️ {}", warning);
            }
        }
        Err(e) => println!("\n❌ {}", e),
    }

    Ok(())
}
