// Matrix Config Parser
// Loads and validates matrix.yml config files

use crate::schema::{Dimension, DimensionSchema, ResultDimension, SchemaError};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use std::fs;
use std::path::{Path, PathBuf};

/// File names looked up by [`MatrixConfigParser::discover`]
const CONFIG_FILE_NAMES: &[&str] = &["matrix.yml", "matrix.yaml", ".matrix.yml", ".matrix.yaml"];

/// Errors that can occur while loading a matrix config
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("IO error reading config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error in config file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid dimension schema: {0}")]
    Schema(#[from] SchemaError),

    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Settings for the bundled simulated runner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Maximum leaves executing at once (0 = unbounded)
    pub concurrency: usize,
    /// Lower bound of the simulated per-leaf delay
    pub min_delay_ms: u64,
    /// Upper bound of the simulated per-leaf delay
    pub max_delay_ms: u64,
    /// Probability that a simulated leaf passes
    pub pass_rate: f64,
    /// Optional RNG seed for reproducible runs
    pub seed: Option<u64>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            concurrency: 2,
            min_delay_ms: 150,
            max_delay_ms: 600,
            pass_rate: 0.85,
            seed: None,
        }
    }
}

/// A complete matrix config loaded from YAML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ConfigFile")]
pub struct MatrixConfig {
    /// Optional matrix name (used in reports)
    #[serde(default)]
    pub name: Option<String>,
    /// Dimensions and result dimensions
    #[serde(flatten)]
    pub schema: DimensionSchema,
    /// Simulated runner settings
    #[serde(default)]
    pub runner: RunnerConfig,
}

// On-disk layout. Dimensions are read as typed fields rather than through
// `flatten`, so plain scalars such as `16` load as value strings.
#[derive(Deserialize)]
struct ConfigFile {
    #[serde(default)]
    name: Option<String>,
    dimensions: Vec<Dimension>,
    #[serde(default)]
    result_dimensions: Vec<ResultDimension>,
    #[serde(default)]
    runner: RunnerConfig,
}

impl From<ConfigFile> for MatrixConfig {
    fn from(file: ConfigFile) -> Self {
        Self {
            name: file.name,
            schema: DimensionSchema::new(file.dimensions)
                .with_result_dimensions(file.result_dimensions),
            runner: file.runner,
        }
    }
}

/// Parser for matrix config files
pub struct MatrixConfigParser;

impl MatrixConfigParser {
    /// Parse a config from a YAML string
    pub fn parse(content: &str) -> Result<MatrixConfig, ConfigError> {
        let config: MatrixConfig = serde_yaml::from_str(content)?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Parse a config from a file path
    pub fn parse_file(path: &Path) -> Result<MatrixConfig, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let mut config = Self::parse(&content)?;

        if config.name.is_none() {
            config.name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .map(|s| s.to_string());
        }

        Ok(config)
    }

    /// Find config files in a directory, in probing order
    pub fn discover(dir: &Path) -> Vec<PathBuf> {
        CONFIG_FILE_NAMES
            .iter()
            .map(|name| dir.join(name))
            .filter(|path| path.is_file())
            .collect()
    }

    fn validate(config: &MatrixConfig) -> Result<(), ConfigError> {
        config.schema.validate()?;

        let runner = &config.runner;
        if !(0.0..=1.0).contains(&runner.pass_rate) {
            return Err(ConfigError::Validation(format!(
                "runner.pass_rate must be between 0 and 1, got {}",
                runner.pass_rate
            )));
        }
        if runner.min_delay_ms > runner.max_delay_ms {
            return Err(ConfigError::Validation(format!(
                "runner.min_delay_ms ({}) exceeds runner.max_delay_ms ({})",
                runner.min_delay_ms, runner.max_delay_ms
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaErrorKind;

    const SAMPLE: &str = r#"
name: api-matrix
dimensions:
  - name: Testing Env
    key: env
    values: [local, remote]
  - name: Platform
    key: platform
    values: [native, docker]
result_dimensions:
  - name: Backend
    key: backend
  - name: Frontend
    key: frontend
runner:
  concurrency: 3
  seed: 7
"#;

    #[test]
    fn test_parse_config() {
        let config = MatrixConfigParser::parse(SAMPLE).unwrap();

        assert_eq!(config.name.as_deref(), Some("api-matrix"));
        assert_eq!(config.schema.dimensions.len(), 2);
        assert_eq!(config.schema.dimensions[1].values, vec!["native", "docker"]);
        assert_eq!(config.schema.result_dimensions.len(), 2);
        assert_eq!(config.runner.concurrency, 3);
        assert_eq!(config.runner.seed, Some(7));
        // unspecified runner fields fall back to defaults
        assert_eq!(config.runner.max_delay_ms, RunnerConfig::default().max_delay_ms);
    }

    #[test]
    fn test_parse_without_optional_sections() {
        let config = MatrixConfigParser::parse(
            "dimensions:\n  - { name: Env, key: env, values: [a, b] }\n",
        )
        .unwrap();

        assert!(config.name.is_none());
        assert!(config.schema.result_dimensions.is_empty());
        assert_eq!(config.runner, RunnerConfig::default());
    }

    #[test]
    fn test_numeric_values_load_as_strings() {
        let config = MatrixConfigParser::parse(
            "dimensions:\n  - { name: Node, key: node, values: [16, 18, 20] }\n  - { name: Edition, key: edition, values: [2021, '2024'] }\n",
        )
        .unwrap();

        assert_eq!(config.schema.dimensions[0].values, vec!["16", "18", "20"]);
        assert_eq!(config.schema.dimensions[1].values, vec!["2021", "2024"]);
        assert_eq!(config.schema.leaf_count(), 6);
    }

    #[test]
    fn test_schema_errors_surface() {
        let err = MatrixConfigParser::parse(
            "dimensions:\n  - { name: Env, key: env, values: [] }\n",
        )
        .unwrap_err();

        match err {
            ConfigError::Schema(e) => assert_eq!(e.kind, SchemaErrorKind::EmptyValues),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_blank_result_key_is_yaml_error() {
        let err = MatrixConfigParser::parse(
            "dimensions:\n  - { name: Env, key: env, values: [a] }\nresult_dimensions:\n  - { name: Backend, key: ' ' }\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }

    #[test]
    fn test_runner_validation() {
        let err = MatrixConfigParser::parse(
            "dimensions:\n  - { name: Env, key: env, values: [a] }\nrunner:\n  pass_rate: 1.5\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));

        let err = MatrixConfigParser::parse(
            "dimensions:\n  - { name: Env, key: env, values: [a] }\nrunner:\n  min_delay_ms: 10\n  max_delay_ms: 5\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_parse_file_defaults_name_to_stem() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("checkout.yml");
        fs::write(&path, "dimensions:\n  - { name: Env, key: env, values: [a] }\n").unwrap();

        let config = MatrixConfigParser::parse_file(&path).unwrap();
        assert_eq!(config.name.as_deref(), Some("checkout"));
    }

    #[test]
    fn test_parse_file_not_found() {
        let err = MatrixConfigParser::parse_file(Path::new("/nonexistent/matrix.yml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_discover() {
        let temp = tempfile::tempdir().unwrap();
        assert!(MatrixConfigParser::discover(temp.path()).is_empty());

        fs::write(temp.path().join("matrix.yaml"), SAMPLE).unwrap();
        fs::write(temp.path().join(".matrix.yml"), SAMPLE).unwrap();

        let found = MatrixConfigParser::discover(temp.path());
        assert_eq!(found.len(), 2);
        assert!(found[0].ends_with("matrix.yaml"));
        assert!(found[1].ends_with(".matrix.yml"));
    }
}
