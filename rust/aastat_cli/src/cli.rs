use clap::Parser;
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the JSON configuration file (defaults are used otherwise)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Open search result tables (will over-write the config file)
    #[arg(long, num_args = 1..)]
    pub csv: Vec<PathBuf>,

    /// Path to the output directory
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// More logging, repeat for more (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            _ => LevelFilter::DEBUG,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_args() {
        let cli = Cli::parse_from([
            "aastat", "--csv", "a.csv", "b.csv", "-o", "out", "-vv",
        ]);
        assert_eq!(cli.csv, vec![PathBuf::from("a.csv"), PathBuf::from("b.csv")]);
        assert_eq!(cli.output_dir, Some(PathBuf::from("out")));
        assert_eq!(cli.log_level(), LevelFilter::DEBUG);
        assert!(cli.config.is_none());
    }
}
