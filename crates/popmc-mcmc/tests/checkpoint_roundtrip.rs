use std::ops::ControlFlow;
use std::path::Path;

use popmc_core::{ObservedData, ParameterBounds, ParameterVector, RngHandle};
use popmc_ode::{DataGenerator, OdeSystem, ReferenceModel};
use tempfile::tempdir;

use popmc_mcmc::checkpoint::{checkpoint_path, CheckpointPayload};
use popmc_mcmc::trace::read_traces_csv;
use popmc_mcmc::{RunConfig, RunManifest, Simulator};

fn decay_inputs() -> (OdeSystem, ObservedData) {
    let model = ReferenceModel::ExpDecay;
    let system = model.system().unwrap();
    let data = DataGenerator::new(&system, model.true_theta(), model.true_sigma())
        .unwrap()
        .generate(&mut RngHandle::from_seed(8))
        .unwrap();
    (system, data)
}

fn checkpoint_config(root: &Path) -> RunConfig {
    let mut config = RunConfig::default();
    config.max_its = 200;
    config.init_phase_its = 100;
    config.proposal.scale = 0.05;
    config.param_names = Some(vec!["theta".into(), "sigma".into()]);
    config.checkpoint.interval = 50;
    config.checkpoint.max_to_keep = 4;
    config.output.run_directory = Some(root.join("run"));
    config
}

fn all_traces<D: popmc_core::LogDensity>(simulator: &Simulator<D>) -> Vec<Vec<ParameterVector>> {
    simulator
        .chains()
        .iter()
        .map(|chain| chain.trace().to_vec())
        .collect()
}

#[test]
fn resume_from_checkpoint_reproduces_the_uninterrupted_run() {
    let dir = tempdir().unwrap();
    let config = checkpoint_config(dir.path());
    let (system, data) = decay_inputs();
    let bounds = ReferenceModel::ExpDecay.bounds().unwrap();

    let mut original = Simulator::new(system.clone(), data.clone(), bounds, config).unwrap();
    let summary = original.run().unwrap();
    assert_eq!(summary.checkpoints.len(), 4);
    let expected = all_traces(&original);

    let middle = checkpoint_path(&dir.path().join("run").join("checkpoints"), 100);
    assert!(middle.exists());
    let payload = CheckpointPayload::load(&middle).unwrap();
    assert_eq!(payload.iteration, 100);
    assert!(payload.chains.iter().all(|c| c.trace.len() == 100));

    let mut resumed = Simulator::resume(&middle, system, data).unwrap();
    assert_eq!(resumed.iteration(), 100);
    resumed.run().unwrap();
    assert_eq!(all_traces(&resumed), expected);
    assert_eq!(resumed.summary().posterior, summary.posterior);
}

#[test]
fn retention_keeps_only_the_newest_checkpoints() {
    let dir = tempdir().unwrap();
    let mut config = checkpoint_config(dir.path());
    config.checkpoint.interval = 20;
    config.checkpoint.max_to_keep = 2;
    let (system, data) = decay_inputs();
    let bounds = ReferenceModel::ExpDecay.bounds().unwrap();
    let mut simulator = Simulator::new(system, data, bounds, config).unwrap();
    let summary = simulator.run().unwrap();

    let root = dir.path().join("run").join("checkpoints");
    assert_eq!(
        summary.checkpoints,
        vec![checkpoint_path(&root, 180), checkpoint_path(&root, 200)]
    );
    let on_disk = std::fs::read_dir(&root).unwrap().count();
    assert_eq!(on_disk, 2);
}

#[test]
fn retention_holds_across_a_resume() {
    let dir = tempdir().unwrap();
    let mut config = checkpoint_config(dir.path());
    config.checkpoint.interval = 20;
    config.checkpoint.max_to_keep = 3;
    let (system, data) = decay_inputs();
    let bounds = ReferenceModel::ExpDecay.bounds().unwrap();

    let mut first = Simulator::new(system.clone(), data.clone(), bounds, config).unwrap();
    first
        .run_with(|report| {
            if report.iteration == 100 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .unwrap();
    let root = dir.path().join("run").join("checkpoints");
    assert_eq!(std::fs::read_dir(&root).unwrap().count(), 3);

    let mut resumed = Simulator::resume(&checkpoint_path(&root, 100), system, data).unwrap();
    assert_eq!(
        resumed.checkpoints(),
        [60, 80, 100].map(|it| checkpoint_path(&root, it)).as_slice()
    );
    let summary = resumed.run().unwrap();

    let expected = [160, 180, 200].map(|it| checkpoint_path(&root, it));
    assert_eq!(summary.checkpoints, expected.to_vec());
    let mut on_disk: Vec<_> = std::fs::read_dir(&root)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    on_disk.sort();
    assert_eq!(on_disk, expected.to_vec());
}

#[test]
fn manual_checkpoint_resumes_a_custom_target() {
    let dir = tempdir().unwrap();
    let bounds = ParameterBounds::new(vec![-1.0, -1.0], vec![1.0, 1.0]).unwrap();
    let target = |p: &ParameterVector| -(p[0] * p[0] + p[1] * p[1]) / 0.08;
    let mut config = RunConfig::default();
    config.max_its = 120;
    config.init_phase_its = 40;

    let mut original = Simulator::with_target(target, bounds, config).unwrap();
    for _ in 0..70 {
        original.step().unwrap();
    }
    let path = dir.path().join("manual.json");
    original.checkpoint_now(&path).unwrap();
    original.run().unwrap();

    let mut resumed = Simulator::resume_with_target(&path, target).unwrap();
    assert_eq!(resumed.iteration(), 70);
    resumed.run().unwrap();
    assert_eq!(all_traces(&resumed), all_traces(&original));
}

#[test]
fn run_directory_holds_traces_and_manifest() {
    let dir = tempdir().unwrap();
    let config = checkpoint_config(dir.path());
    let (system, data) = decay_inputs();
    let data_hash = data.content_hash();
    let bounds = ReferenceModel::ExpDecay.bounds().unwrap();
    let mut simulator = Simulator::new(system, data, bounds, config).unwrap();
    let summary = simulator.run().unwrap();

    let traces_path = summary.traces_path.clone().unwrap();
    let table = read_traces_csv(&traces_path).unwrap();
    assert_eq!(table.param_names, vec!["theta", "sigma"]);
    assert_eq!(table.chain_ids(), vec![1, 2, 3, 4]);
    assert_eq!(table.rows.len(), 4 * 200);
    assert_eq!(table.chain_trace(1), simulator.target_trace());

    let manifest = RunManifest::load(&summary.manifest_path.clone().unwrap()).unwrap();
    assert_eq!(manifest.traces_file, Some("traces.csv".into()));
    assert_eq!(manifest.provenance.data_hash, data_hash);
    assert_eq!(manifest.provenance.model_title, "exponential_decay");
    assert_eq!(manifest.checkpoints.len(), 4);
    assert!(manifest.checkpoints.iter().all(|p| p.is_relative()));
    assert_eq!(manifest.summary.posterior, summary.posterior);
}
