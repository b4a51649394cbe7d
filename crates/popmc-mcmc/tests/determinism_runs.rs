use popmc_core::{ObservedData, RngHandle};
use popmc_ode::{DataGenerator, OdeSystem, ReferenceModel};

use popmc_mcmc::{ExchangePairing, RunConfig, Simulator};

fn decay_inputs() -> (OdeSystem, ObservedData) {
    let model = ReferenceModel::ExpDecay;
    let system = model.system().unwrap();
    let generator = DataGenerator::new(&system, model.true_theta(), model.true_sigma()).unwrap();
    let data = generator.generate(&mut RngHandle::from_seed(21)).unwrap();
    (system, data)
}

fn short_config(seed: u64) -> RunConfig {
    let mut config = RunConfig::default();
    config.max_its = 80;
    config.init_phase_its = 30;
    config.proposal.scale = 0.05;
    config.seed_policy.master_seed = seed;
    config
}

fn run_traces(config: RunConfig) -> Vec<Vec<Vec<f64>>> {
    let (system, data) = decay_inputs();
    let bounds = ReferenceModel::ExpDecay.bounds().unwrap();
    let mut simulator = Simulator::new(system, data, bounds, config).unwrap();
    simulator.run().unwrap();
    simulator
        .chains()
        .iter()
        .map(|chain| {
            chain
                .trace()
                .iter()
                .map(|state| state.as_slice().to_vec())
                .collect()
        })
        .collect()
}

#[test]
fn identical_seeds_give_bit_identical_traces() {
    let first = run_traces(short_config(4242));
    let second = run_traces(short_config(4242));
    assert_eq!(first.len(), 4);
    assert_eq!(first, second);
}

#[test]
fn different_seeds_diverge() {
    let first = run_traces(short_config(1));
    let second = run_traces(short_config(2));
    assert_ne!(first, second);
}

#[test]
fn mutated_chain_pairing_is_deterministic_too() {
    let mut config = short_config(99);
    config.exchange = ExchangePairing::MutatedChain;
    assert_eq!(run_traces(config.clone()), run_traces(config));
}

#[test]
fn step_reports_replay_identically() {
    let bounds = ReferenceModel::ExpDecay.bounds().unwrap();
    let reports = |seed| {
        let (system, data) = decay_inputs();
        let mut simulator = Simulator::new(system, data, bounds.clone(), short_config(seed)).unwrap();
        (0..40)
            .map(|_| simulator.step().unwrap())
            .collect::<Vec<_>>()
    };
    let a = reports(7);
    let b = reports(7);
    assert_eq!(a.len(), b.len());
    for (left, right) in a.iter().zip(&b) {
        assert_eq!(left.mutated_chain, right.mutated_chain);
        assert_eq!(left.mutation, right.mutation);
        assert_eq!(left.exchange_pair, right.exchange_pair);
        assert_eq!(left.exchange_accepted, right.exchange_accepted);
    }
}
