use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use popmc_mcmc::analysis;

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Trace CSV written by a run.
    #[arg(long)]
    pub traces: PathBuf,
    /// Chain to summarise; chain 1 samples the posterior.
    #[arg(long, default_value_t = 1)]
    pub chain: usize,
    /// Leading iterations to discard.
    #[arg(long, default_value_t = 0)]
    pub burn_in: usize,
}

pub fn run(args: &AnalyzeArgs) -> Result<(), Box<dyn Error>> {
    let summaries = analysis::summarize_traces_csv(&args.traces, args.chain, args.burn_in)?;
    println!("{}", serde_json::to_string_pretty(&summaries)?);
    Ok(())
}
