use aastat::ConfigError;

#[derive(Debug)]
pub enum CliError {
    Config {
        source: String,
    },
    ParseError {
        msg: String,
    },
    Io {
        source: String,
        path: Option<String>,
    },
    MissingColumn {
        column: String,
        path: String,
    },
    Csv {
        source: String,
        path: String,
    },
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Config { source } => write!(f, "Error interpreting the config: {}", source),
            CliError::ParseError { msg } => write!(f, "Error parsing config: {}", msg),
            CliError::Io { source, path } => {
                if let Some(path) = path {
                    write!(f, "Error accessing file {}: {}", path, source)
                } else {
                    write!(f, "Error accessing file: {}", source)
                }
            }
            CliError::MissingColumn { column, path } => {
                write!(f, "Column {:?} not found in {}", column, path)
            }
            CliError::Csv { source, path } => write!(f, "Error reading table {}: {}", path, source),
        }
    }
}

impl std::error::Error for CliError {}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config {
            source: e.to_string(),
        }
    }
}

impl CliError {
    pub fn io(e: std::io::Error, path: &std::path::Path) -> Self {
        CliError::Io {
            source: e.to_string(),
            path: Some(path.to_string_lossy().to_string()),
        }
    }

    pub fn csv(e: csv::Error, path: &std::path::Path) -> Self {
        CliError::Csv {
            source: e.to_string(),
            path: path.to_string_lossy().to_string(),
        }
    }
}
