pub mod console_reporter;
pub mod csv_reporter;
pub mod heatmap;
pub mod output_paths;

pub use console_reporter::*;
pub use csv_reporter::*;
pub use heatmap::*;
pub use output_paths::*;

use crate::error::Result;
use crate::pipeline::AnalysisReport;

/// Presentation seam: receives finished aggregates and model outputs,
/// never the raw data.
pub trait ReportSink {
    fn render(&mut self, report: &AnalysisReport) -> Result<()>;
}
