use popmc_core::{ParameterBounds, ParameterVector, RngHandle};
use popmc_ode::{DataGenerator, ReferenceModel};

use popmc_mcmc::{PriorKind, RunConfig, Simulator};

#[test]
fn pinned_noise_scale_never_moves() {
    let model = ReferenceModel::ExpDecay;
    let system = model.system().unwrap();
    let data = DataGenerator::new(&system, model.true_theta(), model.true_sigma())
        .unwrap()
        .generate(&mut RngHandle::from_seed(5))
        .unwrap();
    let bounds = ParameterBounds::new(vec![0.0, 0.1], vec![1.0, 0.1]).unwrap();

    let mut config = RunConfig::default();
    config.max_its = 300;
    config.init_phase_its = 100;
    config.proposal.scale = 0.05;
    let mut simulator = Simulator::new(system, data, bounds, config).unwrap();
    simulator.run().unwrap();

    for chain in simulator.chains() {
        assert!(chain.trace().iter().all(|state| state[1] == 0.1));
    }
    let theta_moved = simulator
        .target_trace()
        .windows(2)
        .any(|pair| pair[0][0] != pair[1][0]);
    assert!(theta_moved);
}

#[test]
fn pinned_coordinate_under_truncated_normal_prior() {
    let bounds = ParameterBounds::new(vec![-2.0, 3.0, 0.0], vec![2.0, 3.0, 1.0]).unwrap();
    let mut config = RunConfig::default();
    config.max_its = 500;
    config.init_phase_its = 100;
    config.prior = PriorKind::TruncatedNormal;
    let prior = popmc_mcmc::LogPrior::new(bounds.clone(), PriorKind::TruncatedNormal);
    let target = move |params: &ParameterVector| prior.evaluate(params);
    let mut simulator = Simulator::with_target(target, bounds, config).unwrap();
    simulator.run().unwrap();
    for chain in simulator.chains() {
        assert!(chain.trace().iter().all(|state| state[1] == 3.0));
    }
}
