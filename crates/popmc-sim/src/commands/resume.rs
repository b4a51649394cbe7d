use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::Args;
use popmc_mcmc::Simulator;

use super::{read_observed_csv, write_json, DemoRecord, DEMO_RECORD_FILE, OBSERVED_FILE, SUMMARY_FILE};

#[derive(Args, Debug)]
pub struct ResumeArgs {
    /// Run directory produced by `popmc-sim demo`.
    #[arg(long)]
    pub run: PathBuf,
    /// Checkpoint file to continue from.
    #[arg(long)]
    pub checkpoint: PathBuf,
}

pub fn run(args: &ResumeArgs) -> Result<(), Box<dyn Error>> {
    let record: DemoRecord =
        serde_json::from_str(&fs::read_to_string(args.run.join(DEMO_RECORD_FILE))?)?;
    let system = record.model.system()?;
    let data = read_observed_csv(&args.run.join(OBSERVED_FILE))?;

    let mut simulator = Simulator::resume(&args.checkpoint, system, data)?;
    let summary = simulator.run()?;
    write_json(args.run.join(SUMMARY_FILE), &summary)?;
    println!("{}", serde_json::to_string_pretty(&summary.posterior)?);
    Ok(())
}
