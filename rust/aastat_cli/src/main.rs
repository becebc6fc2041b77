mod cli;
mod config;
mod errors;
mod output;
mod processing;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cli::Cli;
use config::Config;

#[cfg(target_os = "windows")]
use mimalloc::MiMalloc;

#[cfg(target_os = "windows")]
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() -> std::result::Result<(), errors::CliError> {
    let args = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(args.log_level().into())
                .from_env_lossy(),
        ) // This uses RUST_LOG environment variable
        .init();

    let config = Config::with_cli_args(&args)?;
    info!("Parsed configuration: {:#?}", config);
    let params = config.analysis.resolve()?;

    let output_dir = config.output_directory();
    std::fs::create_dir_all(&output_dir).map_err(|e| errors::CliError::io(e, &output_dir))?;

    let rows = processing::load_inputs(&config.input.csv, &config.csv, &config.analysis)?;
    let results = aastat::run(rows, &params);
    info!(
        "Found {} peaks ({} candidates) in {} rows",
        results.peaks.len(),
        results.candidates.len(),
        results.dataset.len()
    );

    output::write_outputs(&results, &config, &output_dir)?;
    Ok(())
}
