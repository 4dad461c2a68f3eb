use clap::{Args, CommandFactory, Parser, Subcommand, ValueHint};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "gdd",
    author,
    version,
    about = "Lagrangian dual decomposition for block-structured models",
    long_about = None
)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "info", global = true)]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Solve a model graph by dual decomposition
    Solve(SolveArgs),
    /// Print structure statistics of a model graph
    Inspect {
        /// Model graph JSON file
        #[arg(value_hint = ValueHint::FilePath)]
        graph: PathBuf,
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Check a model graph for structural errors
    Validate {
        /// Model graph JSON file
        #[arg(value_hint = ValueHint::FilePath)]
        graph: PathBuf,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: Shell,
        /// Write output to a file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct SolveArgs {
    /// Model graph JSON file
    #[arg(value_hint = ValueHint::FilePath)]
    pub graph: PathBuf,

    /// TOML file with solver settings; flags below override it
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Multiplier update: subgradient, optimalstep, admm, cuttingplanes, bundle
    #[arg(long)]
    pub method: Option<String>,

    /// Maximum number of iterations
    #[arg(long)]
    pub max_iterations: Option<usize>,

    /// Convergence tolerance on the residual norm
    #[arg(long)]
    pub epsilon: Option<f64>,

    /// Step scaling factor
    #[arg(long)]
    pub alpha: Option<f64>,

    /// Wall-clock limit in seconds
    #[arg(long)]
    pub time_limit: Option<f64>,

    /// Lagrangian heuristic: fix-binaries or fix-integers
    #[arg(long)]
    pub heuristic: Option<String>,

    /// Starting multipliers: zero or relaxation
    #[arg(long)]
    pub initial_multipliers: Option<String>,

    /// LP solver for the cutting-plane master
    #[arg(long)]
    pub master_solver: Option<String>,

    /// Write the iteration trace as CSV
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub trace: Option<PathBuf>,

    /// Write the full solution as JSON
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub out: Option<PathBuf>,

    /// Print the solution as JSON instead of a text summary
    #[arg(long)]
    pub json: bool,

    /// Worker threads for block solves (0 = all cores)
    #[arg(long, default_value_t = 0)]
    pub threads: usize,
}

pub fn build_cli_command() -> clap::Command {
    Cli::command()
}
