/// Problems with the analysis parameters.
///
/// These are the only fatal errors of a run, and they are all raised by
/// [`crate::config::AnalysisParams::resolve`] before any data is touched.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    InvalidRange {
        lo: f64,
        hi: f64,
    },
    NonPositiveBinWidth(f64),
    FdrOutOfRange(f64),
    WindowTooSmall {
        window: usize,
        order: usize,
        context: &'static str,
    },
    NonPositiveParameter {
        field: &'static str,
        value: f64,
    },
    InvalidCleavageRule {
        rule: String,
        msg: String,
    },
    InvalidLabel(String),
    InvalidReferenceWindow {
        lo: f64,
        hi: f64,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidRange { lo, hi } => {
                write!(f, "Mass shift range [{}, {}] is empty or inverted", lo, hi)
            }
            ConfigError::NonPositiveBinWidth(w) => {
                write!(f, "Bin width must be positive, got {}", w)
            }
            ConfigError::FdrOutOfRange(fdr) => {
                write!(f, "FDR must be in (0, 1], got {}", fdr)
            }
            ConfigError::WindowTooSmall {
                window,
                order,
                context,
            } => write!(
                f,
                "Window of {} bins is too small for polynomial order {} ({})",
                window, order, context
            ),
            ConfigError::NonPositiveParameter { field, value } => {
                write!(f, "Parameter `{}` must be positive, got {}", field, value)
            }
            ConfigError::InvalidCleavageRule { rule, msg } => {
                write!(f, "Unable to interpret cleavage rule {:?}: {}", rule, msg)
            }
            ConfigError::InvalidLabel(label) => {
                write!(f, "Label {:?} is not a single amino acid letter", label)
            }
            ConfigError::InvalidReferenceWindow { lo, hi } => {
                write!(f, "Reference window [{}, {}] is empty or inverted", lo, hi)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Problems with a single input row. Rows failing these checks are skipped.
#[derive(Debug, Clone, PartialEq)]
pub enum DataProcessingError {
    ExpectedNonEmptyData { context: Option<String> },
    ExpectedFiniteNonNanData { context: String },
}

impl std::fmt::Display for DataProcessingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataProcessingError::ExpectedNonEmptyData { context } => match context {
                Some(context) => write!(f, "Expected non-empty data: {}", context),
                None => write!(f, "Expected non-empty data"),
            },
            DataProcessingError::ExpectedFiniteNonNanData { context } => {
                write!(f, "Expected finite values: {}", context)
            }
        }
    }
}

impl std::error::Error for DataProcessingError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_errors_carry_context() {
        let err = DataProcessingError::ExpectedFiniteNonNanData {
            context: "PSM AAK has mass shift NaN".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Expected finite values: PSM AAK has mass shift NaN"
        );
        let err = DataProcessingError::ExpectedNonEmptyData { context: None };
        assert_eq!(err.to_string(), "Expected non-empty data");
    }
}
