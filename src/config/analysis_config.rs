use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

pub const INPUT_PATH_ENV: &str = "SUPERSTORE_CSV";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub input: InputConfig,
    pub report: ReportConfig,
    pub model: ModelConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub path: String,
    pub delimiter: String,
    pub date_format: String,
    /// 1-based position of the identifier column dropped on load.
    pub discard_column_index: Option<usize>,
    /// Reject columns outside the order schema instead of ignoring them.
    pub strict_columns: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub output_dir: Option<PathBuf>,
    pub show_rows: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub enabled: bool,
    pub rank_tolerance: f64,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            path: "data/superstore_sample.csv".to_string(),
            delimiter: ",".to_string(),
            date_format: "%m/%d/%y".to_string(),
            discard_column_index: Some(7),
            strict_columns: false,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            show_rows: 20,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rank_tolerance: 1e-7,
        }
    }
}

impl AnalysisConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: AnalysisConfig = toml::from_str(&content)
            .map_err(|e| PipelineError::Config(format!("Failed to parse {}: {}", path, e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `SUPERSTORE_CSV` on top of the file settings.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(path) = env::var(INPUT_PATH_ENV) {
            if !path.trim().is_empty() {
                self.input.path = path;
            }
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.input.path.trim().is_empty() {
            return Err(PipelineError::Config("input path cannot be empty".into()));
        }

        self.input.delimiter_byte()?;

        if self.input.discard_column_index == Some(0) {
            return Err(PipelineError::Config(
                "discard_column_index is 1-based and cannot be 0".into(),
            ));
        }

        if !(self.model.rank_tolerance > 0.0) {
            return Err(PipelineError::Config(format!(
                "rank_tolerance must be positive, got {}",
                self.model.rank_tolerance
            )));
        }

        Ok(())
    }
}

impl InputConfig {
    pub fn delimiter_byte(&self) -> Result<u8> {
        match self.delimiter.as_bytes() {
            [byte] => Ok(*byte),
            _ => Err(PipelineError::Config(format!(
                "delimiter must be a single byte, got '{}'",
                self.delimiter
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AnalysisConfig::default();
        assert_eq!(config.input.delimiter_byte().unwrap(), b',');
        assert_eq!(config.input.date_format, "%m/%d/%y");
        assert_eq!(config.input.discard_column_index, Some(7));
        assert!(config.model.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: AnalysisConfig = toml::from_str(
            r#"
            [input]
            path = "orders.tsv"
            delimiter = "\t"

            [model]
            enabled = false
            "#,
        )
        .unwrap();

        assert_eq!(config.input.path, "orders.tsv");
        assert_eq!(config.input.delimiter_byte().unwrap(), b'\t');
        assert_eq!(config.input.date_format, "%m/%d/%y");
        assert!(!config.model.enabled);
        assert_eq!(config.model.rank_tolerance, 1e-7);
        assert_eq!(config.report.show_rows, 20);
    }

    #[test]
    fn test_env_override_replaces_input_path() {
        let mut config = AnalysisConfig::default();
        config.input.path = "from_file.csv".to_string();

        unsafe { env::set_var(INPUT_PATH_ENV, "  ") };
        let config = config.with_env_overrides();
        assert_eq!(config.input.path, "from_file.csv");

        unsafe { env::set_var(INPUT_PATH_ENV, "/data/override.csv") };
        let config = config.with_env_overrides();
        unsafe { env::remove_var(INPUT_PATH_ENV) };
        assert_eq!(config.input.path, "/data/override.csv");
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = AnalysisConfig::default();
        config.input.delimiter = ";;".to_string();
        assert!(config.validate().is_err());

        let mut config = AnalysisConfig::default();
        config.input.discard_column_index = Some(0);
        assert!(config.validate().is_err());

        let mut config = AnalysisConfig::default();
        config.model.rank_tolerance = 0.0;
        assert!(config.validate().is_err());
    }
}
