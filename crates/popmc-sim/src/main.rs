use std::error::Error;

use clap::{Parser, Subcommand};
use commands::{
    analyze::{self, AnalyzeArgs},
    demo::{self, DemoArgs},
    resume::{self, ResumeArgs},
};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "popmc-sim", about = "Population MCMC for ODE parameter inference")]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate synthetic data from a reference model and sample its posterior.
    Demo(DemoArgs),
    /// Continue a demo run from one of its checkpoints.
    Resume(ResumeArgs),
    /// Summarise one chain of a trace CSV.
    Analyze(AnalyzeArgs),
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Demo(args) => demo::run(&args),
        Command::Resume(args) => resume::run(&args),
        Command::Analyze(args) => analyze::run(&args),
    }
}
