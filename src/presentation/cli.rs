// Command-line arguments
use crate::infrastructure::config::DEFAULT_CONFIG_PATH;
use clap::{Parser, Subcommand, ValueHint};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Integrate solar flare irradiance from the MAVEN EUV archive", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Match catalog flares to archive files and write the energy report
    Run(RunArgs),

    /// Convert local data files into per-file CSV tables
    Convert(ConvertArgs),
}

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Configuration file, layered under FLARES__* environment variables
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH, value_hint = ValueHint::FilePath)]
    pub config: PathBuf,

    /// Overrides output.csv_path
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub csv: Option<PathBuf>,

    /// Overrides output.plot_dir
    #[arg(long, value_hint = ValueHint::DirPath)]
    pub plots: Option<PathBuf>,

    /// Overrides output.summary_path
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub summary: Option<PathBuf>,

    /// Overrides output.concurrency
    #[arg(long)]
    pub concurrency: Option<usize>,
}

#[derive(clap::Args, Debug)]
pub struct ConvertArgs {
    #[arg(long, value_hint = ValueHint::DirPath)]
    pub dir: PathBuf,

    #[arg(long, default_value = "r01.cdf")]
    pub suffix: String,

    /// Also write every row into this one table
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub combined: Option<PathBuf>,

    /// Read the [variables] layout from this file instead of the defaults
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
}
