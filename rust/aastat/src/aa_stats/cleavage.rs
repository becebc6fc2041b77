use regex::Regex;
use std::sync::LazyLock;
use tracing::warn;

use crate::errors::ConfigError;

/// `[KR]|{P}` (C-terminal of K/R, not before P) or `{P}|[D]` (N-terminal
/// of D, not after P). The braces are optional.
static CUSTOM_RULE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\{([A-Z]+)\})?(?:\[([A-Z]+)\])?\|(?:\[([A-Z]+)\])?(?:\{([A-Z]+)\})?$")
        .unwrap()
});

/// Expasy trypsin, with the WKP and MRP exceptions.
const TRYPSIN_PATTERN: &str = r"([KR](?=[^P]))|((?<=W)K(?=P))|((?<=M)R(?=P))";

#[derive(Debug, Clone)]
enum Specificity {
    Sites {
        cleave_at: Vec<char>,
        /// Residues that block the cut when adjacent on the other side.
        restrict: Vec<char>,
        c_terminal: bool,
    },
    /// The sequence is cut after every match.
    Pattern(fancy_regex::Regex),
}

/// A proteolytic rule, either residue sites or a (lookaround) regex.
#[derive(Debug, Clone)]
pub struct CleavageRule {
    name: String,
    specificity: Specificity,
}

fn looks_like_enzyme_name(rule: &str) -> bool {
    rule.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '/' | '_' | ' '))
        && rule.chars().any(|c| c.is_ascii_lowercase())
}

impl CleavageRule {
    pub fn new(
        name: impl Into<String>,
        cleave_at: &str,
        restrict: &str,
        c_terminal: bool,
    ) -> Self {
        Self {
            name: name.into(),
            specificity: Specificity::Sites {
                cleave_at: cleave_at.chars().collect(),
                restrict: restrict.chars().collect(),
                c_terminal,
            },
        }
    }

    /// A rule cutting after every match of `expression`.
    pub fn from_pattern(name: impl Into<String>, expression: &str) -> Result<Self, ConfigError> {
        let name = name.into();
        let regex =
            fancy_regex::Regex::new(expression).map_err(|e| ConfigError::InvalidCleavageRule {
                rule: name.clone(),
                msg: e.to_string(),
            })?;
        Ok(Self {
            name,
            specificity: Specificity::Pattern(regex),
        })
    }

    /// Named rules (case insensitive), a `[XY]|{Z}` expression, or a
    /// regular expression whose match ends are the cleavage sites.
    pub fn parse(rule: &str) -> Result<Self, ConfigError> {
        let trimmed = rule.trim();
        let named = match trimmed.to_ascii_lowercase().as_str() {
            "trypsin" => return Self::from_pattern("trypsin", TRYPSIN_PATTERN),
            "trypsin/p" => Some(Self::new("trypsin/p", "KR", "", true)),
            "lys-c" | "lysc" => Some(Self::new("lys-c", "K", "", true)),
            "arg-c" | "argc" => Some(Self::new("arg-c", "R", "", true)),
            "glu-c" | "gluc" => Some(Self::new("glu-c", "E", "", true)),
            "asp-n" | "aspn" => Some(Self::new("asp-n", "D", "", false)),
            "chymotrypsin" => Some(Self::new("chymotrypsin", "FWY", "P", true)),
            "pepsin" => Some(Self::new("pepsin", "FWYL", "", true)),
            _ => None,
        };
        if let Some(named) = named {
            return Ok(named);
        }

        let invalid = |msg: &str| ConfigError::InvalidCleavageRule {
            rule: rule.to_string(),
            msg: msg.to_string(),
        };
        let Some(caps) = CUSTOM_RULE_REGEX.captures(trimmed) else {
            if looks_like_enzyme_name(trimmed) {
                return Err(invalid("unknown enzyme name"));
            }
            return Self::from_pattern(trimmed, trimmed);
        };
        let group = |i: usize| caps.get(i).map(|m| m.as_str());
        match (group(1), group(2), group(3), group(4)) {
            (None, Some(at), None, restrict) => Ok(Self::new(
                trimmed,
                at,
                restrict.unwrap_or_default(),
                true,
            )),
            (restrict, None, Some(at), None) => Ok(Self::new(
                trimmed,
                at,
                restrict.unwrap_or_default(),
                false,
            )),
            _ => Err(invalid(
                "exactly one `[...]` group is required, with the restriction on the other side of `|`",
            )),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Byte offsets where `sequence` is cut, ascending.
    fn sites(&self, sequence: &str) -> Vec<usize> {
        match &self.specificity {
            Specificity::Sites {
                cleave_at,
                restrict,
                c_terminal,
            } => {
                let mut sites = Vec::new();
                let mut chars = sequence.char_indices().peekable();
                while let Some((_, before)) = chars.next() {
                    let Some(&(pos, after)) = chars.peek() else {
                        break;
                    };
                    let cuts = if *c_terminal {
                        cleave_at.contains(&before) && !restrict.contains(&after)
                    } else {
                        cleave_at.contains(&after) && !restrict.contains(&before)
                    };
                    if cuts {
                        sites.push(pos);
                    }
                }
                sites
            }
            Specificity::Pattern(regex) => {
                let mut sites = Vec::new();
                for found in regex.find_iter(sequence) {
                    match found {
                        Ok(m) => sites.push(m.end()),
                        Err(e) => {
                            warn!("Cleavage rule {} failed on {}: {}", self.name, sequence, e);
                            break;
                        }
                    }
                }
                sites
            }
        }
    }

    /// Fully cleaved (no missed cleavage) fragments of `sequence`, in order.
    pub fn cleave<'a>(&self, sequence: &'a str) -> Vec<&'a str> {
        let mut out = Vec::new();
        let mut start = 0;
        for site in self.sites(sequence) {
            if site > start && site < sequence.len() {
                out.push(&sequence[start..site]);
                start = site;
            }
        }
        if start < sequence.len() {
            out.push(&sequence[start..]);
        }
        out
    }
}
