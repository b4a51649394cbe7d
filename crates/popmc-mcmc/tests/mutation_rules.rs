use std::cell::Cell;

use popmc_core::{LogDensity, ParameterBounds, ParameterVector, RngHandle};

use popmc_mcmc::{Chain, MutationOutcome, RunConfig, Simulator};

/// Flat density that notes any evaluation outside its support.
struct BoundsWatcher {
    bounds: ParameterBounds,
    evaluations: Cell<usize>,
    outside: Cell<usize>,
}

impl LogDensity for BoundsWatcher {
    fn log_density(&self, params: &ParameterVector) -> f64 {
        self.evaluations.set(self.evaluations.get() + 1);
        if !self.bounds.contains(params) {
            self.outside.set(self.outside.get() + 1);
        }
        0.0
    }
}

fn unit_box() -> ParameterBounds {
    ParameterBounds::new(vec![0.0, 0.0], vec![1.0, 1.0]).unwrap()
}

fn wide_proposal_config() -> RunConfig {
    let mut config = RunConfig::default();
    config.max_its = 400;
    config.init_phase_its = 100;
    config.proposal.scale = 0.8;
    config
}

#[test]
fn out_of_bounds_proposals_are_never_evaluated_or_accepted() {
    let bounds = unit_box();
    let watcher = BoundsWatcher {
        bounds: bounds.clone(),
        evaluations: Cell::new(0),
        outside: Cell::new(0),
    };
    let mut simulator = Simulator::with_target(watcher, bounds.clone(), wide_proposal_config()).unwrap();
    let summary = simulator.run().unwrap();

    assert_eq!(simulator.target().outside.get(), 0);
    assert!(summary.out_of_bounds.iter().sum::<usize>() > 0);
    for chain in simulator.chains() {
        assert!(chain.trace().iter().all(|state| bounds.contains(state)));
    }
    // Initial draws plus one evaluation per in-bounds proposal.
    let in_bounds: usize = simulator
        .chains()
        .iter()
        .map(|c| c.counters().mutations_proposed - c.counters().out_of_bounds)
        .sum();
    assert_eq!(simulator.target().evaluations.get(), simulator.chains().len() + in_bounds);
}

#[test]
fn flat_target_accepts_every_in_bounds_proposal() {
    let mut simulator =
        Simulator::with_target(|_: &ParameterVector| 0.0, unit_box(), wide_proposal_config()).unwrap();
    simulator.run().unwrap();
    for chain in simulator.chains() {
        let counters = chain.counters();
        assert_eq!(
            counters.mutations_accepted + counters.out_of_bounds,
            counters.mutations_proposed
        );
    }
}

#[test]
fn proposals_at_least_as_dense_are_always_accepted() {
    let bounds = unit_box();
    let start = ParameterVector::new(vec![0.5, 0.5]);
    let anchor = start.clone();
    // The starting point is infeasible; anything else in the box is feasible.
    let target = move |params: &ParameterVector| {
        if *params == anchor {
            f64::NEG_INFINITY
        } else {
            -1.0
        }
    };
    for seed in 0..200 {
        let mut rng = RngHandle::from_seed(seed);
        let mut chain = Chain::new(3, 4, start.clone(), &target).unwrap();
        let outcome = chain.mutate(&target, &bounds, 0.1, &mut rng);
        assert_ne!(outcome, MutationOutcome::Rejected, "seed {seed}");
    }
}

#[test]
fn steeply_worse_proposals_are_rejected() {
    let bounds = ParameterBounds::new(vec![-1.0], vec![1.0]).unwrap();
    let target = |params: &ParameterVector| if params[0] == 0.0 { 0.0 } else { -1.0e6 };
    let mut rng = RngHandle::from_seed(77);
    let mut chain = Chain::new(1, 2, ParameterVector::new(vec![0.0]), &target).unwrap();
    for _ in 0..200 {
        chain.mutate(&target, &bounds, 0.1, &mut rng);
        assert_eq!(chain.current()[0], 0.0);
    }
    assert_eq!(chain.counters().mutations_accepted, 0);
}
