//! Result tables and the run summary.

use aastat::aa_stats::PeakAaStats;
use aastat::fdr::FilteredSubset;
use aastat::pipeline::PipelineTimings;
use aastat::{
    AnalysisOutput,
    RunWarning,
};
use serde::Serialize;
use std::path::Path;
use tracing::info;

use crate::config::Config;
use crate::errors::CliError;

pub fn unimod_url(mass_shift: f64) -> String {
    format!(
        "http://www.unimod.org/modifications_list.php?a=search&value=1&SearchFor={:.0}.&SearchOption=Starts+with+...&SearchField=mono_mass",
        mass_shift
    )
}

pub fn format_shift(mass_shift: f64) -> String {
    format!("{:+.4}", mass_shift)
}

fn fmt_f64(x: f64) -> String {
    if x.is_nan() { String::new() } else { x.to_string() }
}

/// One row of the amino acid table, before sorting.
#[derive(Debug, Clone)]
pub struct AaTableRow {
    pub mass_shift: f64,
    pub stats: PeakAaStats,
}

impl AaTableRow {
    /// `(max ratio - 1) * #peptides`, NaN ratios ignored.
    pub fn sort_key(&self) -> f64 {
        let max_ratio = self
            .stats
            .ratios
            .iter()
            .copied()
            .filter(|r| !r.is_nan())
            .fold(f64::NEG_INFINITY, f64::max);
        (max_ratio - 1.0) * self.stats.num_peptides as f64
    }
}

/// Rows for every peak with statistics (and an explicit reference window),
/// most interesting first.
pub fn aa_table_rows(output: &AnalysisOutput) -> Vec<AaTableRow> {
    let mut rows: Vec<AaTableRow> = output
        .peaks
        .iter()
        .filter_map(|p| {
            p.stats.as_ref().map(|stats| AaTableRow {
                mass_shift: p.peak.mass_shift_value,
                stats: stats.clone(),
            })
        })
        .collect();
    if let Some(reference) = output.reference.as_ref().filter(|r| r.bin_index.is_none()) {
        rows.push(AaTableRow {
            mass_shift: reference.mass_shift,
            stats: reference.stats.as_peak_stats(),
        });
    }
    rows.sort_by(|a, b| b.sort_key().total_cmp(&a.sort_key()));
    rows
}

fn open_writer(path: &Path, delimiter: u8) -> Result<csv::Writer<std::fs::File>, CliError> {
    csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_path(path)
        .map_err(|e| CliError::csv(e, path))
}

fn write_rows(
    path: &Path,
    delimiter: u8,
    header: Vec<String>,
    rows: impl IntoIterator<Item = Vec<String>>,
) -> Result<(), CliError> {
    let mut writer = open_writer(path, delimiter)?;
    writer
        .write_record(&header)
        .map_err(|e| CliError::csv(e, path))?;
    for row in rows {
        writer.write_record(&row).map_err(|e| CliError::csv(e, path))?;
    }
    writer.flush().map_err(|e| CliError::io(e, path))
}

fn write_histogram(output: &AnalysisOutput, dir: &Path) -> Result<(), CliError> {
    write_rows(
        &dir.join("histogram.csv"),
        b',',
        vec!["left".into(), "right".into(), "count".into()],
        output
            .histogram
            .iter_bins()
            .filter(|b| b.count > 0)
            .map(|b| vec![b.left.to_string(), b.right.to_string(), b.count.to_string()]),
    )
}

fn write_fit_diagnostics(output: &AnalysisOutput, dir: &Path) -> Result<(), CliError> {
    let grid = output.histogram.grid();
    let header = [
        "bin",
        "mass shift",
        "smoothed height",
        "outcome",
        "reason",
        "amplitude",
        "center",
        "sigma",
        "amplitude error",
        "center error",
        "sigma error",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    let rows = output.fits.iter().map(|f| {
        let height = output
            .candidates
            .get(f.candidate_index)
            .map(|c| c.smoothed_height)
            .unwrap_or(f64::NAN);
        let reason = match f.outcome {
            aastat::peaks::FitOutcome::Rejected { reason, .. } => format!("{:?}", reason),
            _ => String::new(),
        };
        let mut row = vec![
            f.bin_index.to_string(),
            format_shift(grid.center(f.bin_index)),
            fmt_f64(height),
            f.outcome.label().to_string(),
            reason,
        ];
        match f.outcome.fit() {
            Some(fit) => row.extend(
                [
                    fit.amplitude,
                    fit.center,
                    fit.sigma,
                    fit.amplitude_err,
                    fit.center_err,
                    fit.sigma_err,
                ]
                .iter()
                .map(|&v| fmt_f64(v)),
            ),
            None => row.extend(std::iter::repeat_n(String::new(), 6)),
        }
        row
    });
    write_rows(&dir.join("fit_diagnostics.csv"), b',', header, rows)
}

fn write_aa_tables(output: &AnalysisOutput, dir: &Path) -> Result<(), CliError> {
    let rows = aa_table_rows(output);
    let labels: Vec<String> = output.labels.iter().map(|c| c.to_string()).collect();

    let mut header = vec!["mass shift".to_string(), "# peptides in bin".to_string()];
    header.extend(labels.iter().cloned());
    header.push("Unimod".to_string());
    write_rows(
        &dir.join("aa_statistics_table.csv"),
        b',',
        header,
        rows.iter().map(|r| {
            let mut row = vec![format_shift(r.mass_shift), r.stats.num_peptides.to_string()];
            row.extend(r.stats.ratios.iter().map(|&v| fmt_f64(v)));
            row.push(unimod_url(r.mass_shift));
            row
        }),
    )?;

    let mut header = vec!["mass shift".to_string()];
    header.extend(labels.iter().cloned());
    write_rows(
        &dir.join("p_values.csv"),
        b',',
        header,
        rows.iter().map(|r| {
            let mut row = vec![format_shift(r.mass_shift)];
            row.extend(r.stats.p_values.iter().map(|&v| fmt_f64(v)));
            row
        }),
    )
}

/// File name of a peak's peptide table, unique per bin.
pub fn peptide_table_name(mass_shift: f64, bin_index: usize) -> String {
    format!("{}_bin{}.csv", format_shift(mass_shift), bin_index)
}

fn write_peptide_table(path: &Path, subset: &FilteredSubset) -> Result<(), CliError> {
    let header = ["peptide", "spectrum", "score", "q-value", "proteins"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    write_rows(
        path,
        b'\t',
        header,
        subset.rows.iter().map(|r| {
            vec![
                r.psm.peptide.to_string(),
                r.psm.spectrum.as_deref().unwrap_or("").to_string(),
                r.psm.score.to_string(),
                r.q_value.to_string(),
                r.psm.proteins.join(";"),
            ]
        }),
    )
}

#[derive(Serialize)]
struct PeakSummary<'a> {
    mass_shift: f64,
    bin_index: usize,
    num_peptides: usize,
    is_reference: bool,
    fit: &'a aastat::peaks::GaussianFit,
    unimod: String,
}

#[derive(Serialize)]
struct Summary<'a> {
    config: &'a Config,
    num_rows: usize,
    num_candidates: usize,
    peaks: Vec<PeakSummary<'a>>,
    reference_mass_shift: Option<f64>,
    warnings: &'a [RunWarning],
    timings: PipelineTimings,
}

fn write_summary(output: &AnalysisOutput, config: &Config, dir: &Path) -> Result<(), CliError> {
    let summary = Summary {
        config,
        num_rows: output.dataset.len(),
        num_candidates: output.candidates.len(),
        peaks: output
            .peaks
            .iter()
            .map(|p| PeakSummary {
                mass_shift: p.peak.mass_shift_value,
                bin_index: p.peak.bin_index,
                num_peptides: p.subset.len(),
                is_reference: p.is_reference,
                fit: &p.peak.fit,
                unimod: unimod_url(p.peak.mass_shift_value),
            })
            .collect(),
        reference_mass_shift: output.reference.as_ref().map(|r| r.mass_shift),
        warnings: &output.warnings,
        timings: output.timings,
    };
    let path = dir.join("summary.json");
    let file = std::fs::File::create(&path).map_err(|e| CliError::io(e, &path))?;
    serde_json::to_writer_pretty(file, &summary).map_err(|e| CliError::Io {
        source: e.to_string(),
        path: Some(path.to_string_lossy().to_string()),
    })
}

/// Writes every table of a finished run into `dir`.
pub fn write_outputs(output: &AnalysisOutput, config: &Config, dir: &Path) -> Result<(), CliError> {
    std::fs::create_dir_all(dir).map_err(|e| CliError::io(e, dir))?;
    write_histogram(output, dir)?;
    write_fit_diagnostics(output, dir)?;
    write_aa_tables(output, dir)?;
    for peak in &output.peaks {
        let name = peptide_table_name(peak.peak.mass_shift_value, peak.peak.bin_index);
        write_peptide_table(&dir.join(name), &peak.subset)?;
    }
    if let Some(reference) = output.reference.as_ref().filter(|r| r.bin_index.is_none()) {
        write_peptide_table(&dir.join("reference.csv"), &reference.subset)?;
    }
    write_summary(output, config, dir)?;
    info!("Results written to {:?}", dir);
    Ok(())
}
