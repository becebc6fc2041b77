use aastat::AnalysisParams;
use serde::{
    Deserialize,
    Serialize,
};
use std::path::{
    Path,
    PathBuf,
};

use crate::cli::Cli;
use crate::errors::CliError;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub input: InputConfig,
    pub analysis: AnalysisParams,
    pub csv: CsvConfig,
    pub output: Option<OutputConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct InputConfig {
    pub csv: Vec<PathBuf>,
}

/// Layout of the open search result tables.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct CsvConfig {
    pub delimiter: char,
    /// Separates proteins in a cell that is not a list literal.
    pub proteins_delimiter: String,
    pub peptides_column: String,
    pub proteins_column: String,
    pub mass_shifts_column: String,
    /// Lower is better.
    pub score_column: String,
    pub spectrum_column: Option<String>,
}

impl Default for CsvConfig {
    fn default() -> Self {
        Self {
            delimiter: ',',
            proteins_delimiter: ";".to_string(),
            peptides_column: "peptide".to_string(),
            proteins_column: "protein".to_string(),
            mass_shifts_column: "massdiff".to_string(),
            score_column: "expect".to_string(),
            spectrum_column: Some("spectrum".to_string()),
        }
    }
}

impl CsvConfig {
    pub fn delimiter_byte(&self) -> Result<u8, CliError> {
        if self.delimiter.is_ascii() {
            Ok(self.delimiter as u8)
        } else {
            Err(CliError::Config {
                source: format!("CSV delimiter {:?} is not an ASCII character", self.delimiter),
            })
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OutputConfig {
    pub directory: PathBuf,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, CliError> {
        let conf = std::fs::File::open(path).map_err(|e| CliError::io(e, path))?;
        serde_json::from_reader(conf).map_err(|e| CliError::ParseError { msg: e.to_string() })
    }

    /// Loads the config file (if any) and applies the command line overrides.
    pub fn with_cli_args(args: &Cli) -> Result<Self, CliError> {
        let mut config = match &args.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        if !args.csv.is_empty() {
            config.input.csv = args.csv.clone();
        }
        if let Some(output_dir) = &args.output_dir {
            config.output = Some(OutputConfig {
                directory: output_dir.clone(),
            });
        }
        if config.input.csv.is_empty() {
            return Err(CliError::Config {
                source: "No input provided, please provide one in either the config file or with the --csv flag".to_string(),
            });
        }
        Ok(config)
    }

    pub fn output_directory(&self) -> PathBuf {
        match &self.output {
            Some(x) => x.directory.clone(),
            None => PathBuf::from("."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_overrides_file() {
        let path = std::env::temp_dir().join("aastat_cli_config_test.json");
        std::fs::write(
            &path,
            r#"{
                "input": {"csv": ["from_config.csv"]},
                "analysis": {"fdr": 0.05, "cleavage_rule": "lys-c"},
                "csv": {"delimiter": "\t", "score_column": "hyperscore_rank"}
            }"#,
        )
        .unwrap();

        let args = Cli::parse_from([
            "aastat",
            "--config",
            path.to_str().unwrap(),
            "--csv",
            "override.csv",
        ]);
        let config = Config::with_cli_args(&args).unwrap();
        assert_eq!(config.input.csv, vec![PathBuf::from("override.csv")]);
        assert_eq!(config.analysis.fdr, 0.05);
        assert_eq!(config.analysis.bin_width, 0.001);
        assert_eq!(config.csv.delimiter_byte().unwrap(), b'\t');
        assert_eq!(config.csv.peptides_column, "peptide");
        assert_eq!(config.output_directory(), PathBuf::from("."));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_missing_input_is_error() {
        let args = Cli::parse_from(["aastat"]);
        assert!(matches!(
            Config::with_cli_args(&args),
            Err(CliError::Config { .. })
        ));
    }
}
