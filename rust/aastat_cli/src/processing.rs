use aastat::calibration::recalibrate;
use aastat::models::label_from_proteins;
use aastat::{
    AnalysisParams,
    Psm,
};
use indicatif::{
    ProgressIterator,
    ProgressStyle,
};
use regex::Regex;
use std::path::{
    Path,
    PathBuf,
};
use std::sync::LazyLock;
use std::time::Instant;
use tracing::{
    debug,
    info,
    warn,
};

use crate::config::CsvConfig;
use crate::errors::CliError;

/// Quoted items of a list literal like `['sp|P1|A', "DECOY_P2"]`.
static LIST_ITEM_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"'([^']*)'|"([^"]*)""#).unwrap());

/// Proteins of a cell, either a list literal or `delimiter` separated.
pub fn parse_proteins(cell: &str, delimiter: &str) -> Vec<String> {
    let cell = cell.trim();
    if cell.starts_with('[') && cell.ends_with(']') {
        return LIST_ITEM_REGEX
            .captures_iter(cell)
            .filter_map(|c| c.get(1).or_else(|| c.get(2)))
            .map(|m| m.as_str().trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
    }
    if delimiter.is_empty() {
        return vec![cell.to_string()];
    }
    cell.split(delimiter)
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

fn column_index(
    headers: &csv::StringRecord,
    column: &str,
    path: &Path,
) -> Result<usize, CliError> {
    headers
        .iter()
        .position(|h| h.trim() == column)
        .ok_or_else(|| CliError::MissingColumn {
            column: column.to_string(),
            path: path.to_string_lossy().to_string(),
        })
}

/// Reads one open search table.
///
/// Rows with a mass shift or score that is not a finite number are skipped.
pub fn read_csv(path: &Path, csv_config: &CsvConfig, decoy_prefix: &str) -> Result<Vec<Psm>, CliError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(csv_config.delimiter_byte()?)
        .flexible(true)
        .from_path(path)
        .map_err(|e| CliError::csv(e, path))?;
    let headers = reader.headers().map_err(|e| CliError::csv(e, path))?.clone();

    let peptide_idx = column_index(&headers, &csv_config.peptides_column, path)?;
    let proteins_idx = column_index(&headers, &csv_config.proteins_column, path)?;
    let shift_idx = column_index(&headers, &csv_config.mass_shifts_column, path)?;
    let score_idx = column_index(&headers, &csv_config.score_column, path)?;
    let spectrum_idx = match &csv_config.spectrum_column {
        Some(column) => {
            let idx = headers.iter().position(|h| h.trim() == column);
            if idx.is_none() {
                debug!("No spectrum column {:?} in {:?}", column, path);
            }
            idx
        }
        None => None,
    };

    let mut rows = Vec::new();
    let mut skipped = 0;
    for record in reader.records() {
        let record = record.map_err(|e| CliError::csv(e, path))?;
        let field = |i: usize| record.get(i).unwrap_or("").trim();

        let mass_shift = field(shift_idx).parse::<f64>();
        let score = field(score_idx).parse::<f64>();
        let (Ok(mass_shift), Ok(score)) = (mass_shift, score) else {
            skipped += 1;
            continue;
        };
        let proteins = parse_proteins(field(proteins_idx), &csv_config.proteins_delimiter);
        let label = label_from_proteins(&proteins, decoy_prefix);
        let spectrum = spectrum_idx
            .map(|i| field(i).to_string())
            .filter(|s| !s.is_empty());

        match Psm::try_new(
            field(peptide_idx).to_ascii_uppercase(),
            mass_shift,
            score,
            label,
            proteins,
            spectrum,
        ) {
            Ok(psm) => rows.push(psm),
            Err(e) => {
                debug!("Skipping row: {}", e);
                skipped += 1;
            }
        }
    }
    if skipped > 0 {
        warn!(
            "Skipped {} rows of {:?} without a usable peptide, mass shift or score",
            skipped, path
        );
    }
    info!("Read {} rows from {:?}", rows.len(), path);
    Ok(rows)
}

/// Reads every input table, correcting each one for its systematic shift
/// when `recalibrate` is set.
pub fn load_inputs(
    paths: &[PathBuf],
    csv_config: &CsvConfig,
    analysis: &AnalysisParams,
) -> Result<Vec<Psm>, CliError> {
    let start = Instant::now();
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar());

    let mut all_rows = Vec::new();
    for path in paths.iter().progress_with_style(style) {
        let mut rows = read_csv(path, csv_config, &analysis.decoy_prefix)?;
        if analysis.recalibrate {
            recalibrate(&mut rows, &path.to_string_lossy());
        }
        all_rows.extend(rows);
    }
    info!(
        "Loaded {} rows from {} files in {:?}",
        all_rows.len(),
        paths.len(),
        start.elapsed()
    );
    Ok(all_rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aastat::TargetDecoy;

    #[test]
    fn test_list_literal_and_delimited_agree() {
        let literal = parse_proteins("['sp|P1|A', 'DECOY_P2']", ";");
        let delimited = parse_proteins("sp|P1|A; DECOY_P2", ";");
        assert_eq!(literal, delimited);
        assert_eq!(literal, vec!["sp|P1|A".to_string(), "DECOY_P2".to_string()]);
        assert_eq!(parse_proteins("[\"P1\"]", ";"), vec!["P1".to_string()]);
        assert!(parse_proteins("[]", ";").is_empty());
    }

    #[test]
    fn test_read_csv() {
        let path = std::env::temp_dir().join("aastat_cli_read_test.tsv");
        std::fs::write(
            &path,
            "peptide\tprotein\tmassdiff\texpect\tspectrum\n\
             pepTIDEK\t['P1', 'DECOY_P1']\t0.001\t0.01\tscan=1\n\
             AAAK\t['DECOY_P2']\t79.97\t0.5\tscan=2\n\
             CCCK\t['P3']\tnan\t0.5\tscan=3\n\
             DDDK\t['P4']\t1.0\tnot_a_number\tscan=4\n",
        )
        .unwrap();

        let csv_config = CsvConfig {
            delimiter: '\t',
            ..Default::default()
        };
        let rows = read_csv(&path, &csv_config, "DECOY_").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].peptide.as_ref(), "PEPTIDEK");
        assert_eq!(rows[0].label, TargetDecoy::Target);
        assert_eq!(rows[1].label, TargetDecoy::Decoy);
        assert_eq!(rows[1].spectrum.as_deref(), Some("scan=2"));

        let missing = CsvConfig {
            delimiter: '\t',
            score_column: "hyperscore".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            read_csv(&path, &missing, "DECOY_"),
            Err(CliError::MissingColumn { .. })
        ));
        std::fs::remove_file(&path).unwrap();
    }
}
