use popmc_ode::models::{exponential_decay, logistic_growth, oscillator};
use popmc_ode::{linspace, Method, OdeSystem, SolveError};

#[test]
fn exponential_decay_matches_closed_form() {
    let times = linspace(0.0, 5.0, 51);
    let system = exponential_decay(1.0, times.clone()).unwrap();
    let trajectory = system.solve(&[0.8]).unwrap();
    for (row, t) in times.iter().enumerate() {
        let expected = (-0.8 * t).exp();
        assert!(
            (trajectory[(row, 0)] - expected).abs() < 1e-5,
            "t={t}: {} vs {expected}",
            trajectory[(row, 0)]
        );
    }
}

#[test]
fn logistic_growth_matches_closed_form() {
    let times = linspace(0.0, 10.0, 100);
    let system = logistic_growth(5.0, times.clone()).unwrap();
    let trajectory = system.solve(&[3.0, 7.0]).unwrap();
    for (row, t) in times.iter().enumerate() {
        let expected = 7.0 / (1.0 + (2.0 / 5.0) * (-3.0 * t).exp());
        assert!((trajectory[(row, 0)] - expected).abs() < 1e-4);
    }
}

#[test]
fn oscillator_matches_closed_form() {
    let times = linspace(0.0, 10.0, 100);
    let system = oscillator([0.0, 1.0], times.clone()).unwrap();
    let (a, b) = (2.0_f64, 1.0_f64);
    let omega = (a * b).sqrt();
    let trajectory = system.solve(&[a, b]).unwrap();
    assert_eq!(trajectory.ncols(), 2);
    for (row, t) in times.iter().enumerate() {
        let y1 = (a / b).sqrt() * (omega * t).sin();
        let y2 = (omega * t).cos();
        assert!((trajectory[(row, 0)] - y1).abs() < 1e-4);
        assert!((trajectory[(row, 1)] - y2).abs() < 1e-4);
    }
}

#[test]
fn rk4_agrees_with_dopri5() {
    let times = linspace(0.0, 3.0, 31);
    let adaptive = exponential_decay(2.0, times.clone()).unwrap();
    let fixed = adaptive
        .clone()
        .with_method(Method::Rk4 { max_step: 0.01 });
    let a = adaptive.solve(&[1.3]).unwrap();
    let b = fixed.solve(&[1.3]).unwrap();
    for row in 0..times.len() {
        assert!((a[(row, 0)] - b[(row, 0)]).abs() < 1e-5);
    }
}

#[test]
fn non_finite_derivative_is_a_solve_error() {
    let system = OdeSystem::new("blowup", 1, vec![1.0], linspace(0.0, 1.0, 5), |y, _t, theta, dy| {
        dy[0] = theta[0].ln() * y[0];
    })
    .unwrap();
    let err = system.solve(&[-1.0]).unwrap_err();
    assert!(matches!(err, SolveError::NonFinite { .. }));
}

fn riccati(times: Vec<f64>) -> OdeSystem {
    OdeSystem::new("riccati", 1, vec![1.0], times, |y, _t, theta, dy| {
        dy[0] = theta[0] * y[0] * y[0];
    })
    .unwrap()
}

#[test]
fn finite_time_blowup_fails_with_every_method() {
    // y = 1 / (1 - 2t) escapes to infinity at t = 0.5.
    let adaptive = riccati(linspace(0.0, 2.0, 11));
    let fixed = adaptive
        .clone()
        .with_method(Method::Rk4 { max_step: 0.01 });
    for system in [adaptive, fixed] {
        let result = system.solve(&[2.0]);
        assert!(result.is_err(), "{:?} solved past the pole", system.method());
    }
}

#[test]
fn riccati_below_the_pole_matches_closed_form() {
    let times = linspace(0.0, 2.0, 11);
    let trajectory = riccati(times.clone()).solve(&[0.3]).unwrap();
    for (row, t) in times.iter().enumerate() {
        let expected = 1.0 / (1.0 - 0.3 * t);
        assert!((trajectory[(row, 0)] - expected).abs() < 1e-5);
    }
}

#[test]
fn single_time_point_returns_initial_state() {
    let system = exponential_decay(3.0, vec![0.0]).unwrap();
    let trajectory = system.solve(&[1.0]).unwrap();
    assert_eq!(trajectory.nrows(), 1);
    assert_eq!(trajectory[(0, 0)], 3.0);
}
