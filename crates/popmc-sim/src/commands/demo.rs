use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::Args;
use popmc_core::{derive_substream_seed, RngHandle};
use popmc_mcmc::{RunConfig, Simulator};
use popmc_ode::{DataGenerator, ReferenceModel};
use tracing::info;

use super::{
    write_json, write_observed_csv, DemoRecord, DATA_SUBSTREAM, DEMO_RECORD_FILE, OBSERVED_FILE,
    SUMMARY_FILE,
};

#[derive(Args, Debug)]
pub struct DemoArgs {
    /// Reference model: exp-decay, logistic or oscillator.
    #[arg(long, default_value = "exp-decay")]
    pub model: ReferenceModel,
    /// Output directory for run artefacts.
    #[arg(long)]
    pub out: PathBuf,
    /// Optional YAML run configuration.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Master seed, overriding the configuration.
    #[arg(long)]
    pub seed: Option<u64>,
    /// Number of chains, overriding the configuration.
    #[arg(long)]
    pub chains: Option<usize>,
    /// Total iterations, overriding the configuration.
    #[arg(long)]
    pub max_its: Option<usize>,
    /// Initial-phase iterations, overriding the configuration.
    #[arg(long)]
    pub init_phase_its: Option<usize>,
}

pub fn run(args: &DemoArgs) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(&args.out)?;
    let config = build_config(args)?;
    let model = args.model;

    let system = model.system()?;
    let data_seed = derive_substream_seed(config.seed_policy.master_seed, DATA_SUBSTREAM);
    let data = DataGenerator::new(&system, model.true_theta(), model.true_sigma())?
        .generate(&mut RngHandle::from_seed(data_seed))?;
    write_observed_csv(&args.out.join(OBSERVED_FILE), system.times(), &data)?;
    write_json(
        args.out.join(DEMO_RECORD_FILE),
        &DemoRecord { model, data_seed },
    )?;
    fs::write(args.out.join("config.yaml"), config.to_yaml()?)?;
    info!(%model, out = %args.out.display(), "synthetic data written");

    let mut simulator = Simulator::new(system, data, model.bounds()?, config)?;
    let summary = simulator.run()?;
    write_json(args.out.join(SUMMARY_FILE), &summary)?;
    println!("{}", serde_json::to_string_pretty(&summary.posterior)?);
    Ok(())
}

fn build_config(args: &DemoArgs) -> Result<RunConfig, Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => RunConfig::from_yaml(&fs::read_to_string(path)?)?,
        None => RunConfig::default(),
    };
    if config.param_names.is_none() {
        config.param_names = Some(args.model.param_names());
    }
    if let Some(seed) = args.seed {
        config.seed_policy.master_seed = seed;
    }
    if let Some(chains) = args.chains {
        config.num_chains = chains;
    }
    if let Some(max_its) = args.max_its {
        config.max_its = max_its;
    }
    if let Some(init_phase_its) = args.init_phase_its {
        config.init_phase_its = init_phase_its;
    }
    config.output.run_directory = Some(args.out.clone());
    config.validate()?;
    Ok(config)
}
