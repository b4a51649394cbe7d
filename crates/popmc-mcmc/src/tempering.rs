use popmc_core::RngHandle;

/// Tempering exponent `T_i = (i - 1) / N` for the 1-based chain `id`.
pub fn tempering_exponent(id: usize, num_chains: usize) -> f64 {
    (id.saturating_sub(1)) as f64 / num_chains as f64
}

/// Uniformly spaced ladder `[0, 1/N, ..., (N-1)/N]`.
pub fn build_ladder(num_chains: usize) -> Vec<f64> {
    (1..=num_chains)
        .map(|id| tempering_exponent(id, num_chains))
        .collect()
}

/// Tempered log-density `(1 - T) * L`.
pub fn tempered(log_density: f64, tempering: f64) -> f64 {
    (1.0 - tempering) * log_density
}

/// Metropolis decision for `exp(proposed - current)`, made in log space.
///
/// One uniform is always drawn. Proposals at least as dense as the current
/// state are always accepted; a `-inf` proposal against a feasible current
/// state, or a NaN proposal, is always rejected.
pub fn metropolis_accept(proposed: f64, current: f64, rng: &mut RngHandle) -> bool {
    let u = rng.uniform();
    proposed >= current || u.ln() < proposed - current
}

/// Log acceptance ratio for swapping the states of chains `i` and `j`:
/// `pi_i(x_j) + pi_j(x_i) - pi_i(x_i) - pi_j(x_j)` over tempered log-densities.
///
/// NaN when either state is infeasible.
pub fn exchange_log_acceptance(
    log_density_i: f64,
    tempering_i: f64,
    log_density_j: f64,
    tempering_j: f64,
) -> f64 {
    let swapped = tempered(log_density_j, tempering_i) + tempered(log_density_i, tempering_j);
    let kept = tempered(log_density_i, tempering_i) + tempered(log_density_j, tempering_j);
    swapped - kept
}

/// Attempts a state exchange; returns the decision and the log acceptance ratio.
///
/// One uniform is always drawn. An undefined ratio is a rejection, so an
/// infeasible state never moves into another chain.
pub fn attempt_exchange(
    log_density_i: f64,
    tempering_i: f64,
    log_density_j: f64,
    tempering_j: f64,
    rng: &mut RngHandle,
) -> (bool, f64) {
    let log_acceptance =
        exchange_log_acceptance(log_density_i, tempering_i, log_density_j, tempering_j);
    let u = rng.uniform();
    (log_acceptance >= 0.0 || u.ln() < log_acceptance, log_acceptance)
}
