use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::Context;
use clap::Parser;
use clap_complete::Shell;
use tracing::error;
use tracing_subscriber::FmtSubscriber;

use gdd_cli::cli::{build_cli_command, Cli, Commands};

mod commands;

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Solve(args) => commands::solve::handle(&args),
        Commands::Inspect { graph, json } => commands::inspect::handle(&graph, json),
        Commands::Validate { graph } => commands::validate::handle(&graph),
        Commands::Completions { shell, out } => write_completions(shell, out.as_deref()),
    }
}

fn write_completions(shell: Shell, out: Option<&Path>) -> anyhow::Result<()> {
    let mut script = Vec::new();
    clap_complete::generate(shell, &mut build_cli_command(), "gdd", &mut script);
    match out {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            fs::write(path, &script).with_context(|| format!("writing {}", path.display()))?;
            println!("Wrote {shell} completions to {}", path.display());
        }
        None => io::stdout().write_all(&script)?,
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    if let Err(err) = run(cli) {
        error!("{err:#}");
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
