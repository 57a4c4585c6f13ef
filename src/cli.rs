use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "toc2html",
    version,
    about = "Convert paginated PDF documents into heading-structured HTML"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Convert(ConvertArgs),
    Analyze(AnalyzeArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ConvertArgs {
    /// PDF files, or directories whose top-level PDFs are converted.
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Defaults to the directory of each input file.
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long, default_value_t = 1)]
    pub jobs: usize,

    #[arg(long, default_value_t = false)]
    pub fail_fast: bool,

    #[arg(long, default_value_t = false)]
    pub no_report: bool,

    #[arg(long, default_value_t = false)]
    pub no_images: bool,

    #[arg(long, default_value_t = false)]
    pub no_tables: bool,

    #[arg(long)]
    pub fuzzy_threshold: Option<f64>,

    #[arg(long)]
    pub page_window: Option<usize>,

    /// Batch manifest location; defaults to `conversion_manifest.json` in the
    /// output directory when several documents are converted.
    #[arg(long)]
    pub manifest_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct AnalyzeArgs {
    pub input: PathBuf,

    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}
