use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "evalboard",
    version,
    about = "Merge gold and current benchmark results into one comparison report"
)]
pub struct Cli {
    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Build the merged spreadsheet report
    Report(ReportArgs),
    /// List result files under a results root with their decoded run identity
    Scan(ScanArgs),
    Version,
}

#[derive(Parser, Clone, Debug)]
pub struct ReportArgs {
    /// Folder holding the current run; results are read from `<folder>/results`
    #[arg(long, default_value = "../results/", env = "EVALUATION_FOLDER")]
    pub evaluation_folder: PathBuf,

    /// Folder holding the accepted baseline; results are read from `<folder>/results`
    #[arg(long, default_value = "../results/", env = "EVALUATION_FOLDER_GOLD")]
    pub evaluation_folder_gold: PathBuf,

    /// Reference table, .xlsx or CSV (task,metric,random,max); adds the normalized sheet
    #[arg(long)]
    pub reference: Option<PathBuf>,

    /// Report configuration (YAML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Reject unknown keys in the config file
    #[arg(long)]
    pub strict_config: bool,

    /// Output directory (default: `<evaluation-folder>/reports`)
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Also write the merged rows as JSON
    #[arg(long)]
    pub json: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser, Clone, Debug)]
pub struct ScanArgs {
    /// Results root (`<root>/<group>/<model>/<run>/results_*.json`)
    #[arg(long)]
    pub root: PathBuf,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}
