use std::path::Path;

use popmc_core::{ErrorInfo, ParameterVector, PopmcError};
use serde::{Deserialize, Serialize};

use crate::trace;

/// Marginal summary of one parameter over the post-burn-in trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSummary {
    /// Parameter label.
    pub name: String,
    /// Sample mean.
    pub mean: f64,
    /// Sample standard deviation (`n - 1` denominator; 0 for a single sample).
    pub std_dev: f64,
    /// Smallest sampled value.
    pub min: f64,
    /// Largest sampled value.
    pub max: f64,
    /// Effective sample size estimate.
    pub effective_sample_size: f64,
}

/// Summary of one chain read back from a trace CSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainSummary {
    /// 1-based chain id.
    pub chain_id: usize,
    /// Trace entries left after burn-in.
    pub samples: usize,
    /// [`acceptance_rate`] of the kept section.
    pub acceptance_rate: f64,
    /// Per-parameter summaries of the kept section.
    pub parameters: Vec<ParameterSummary>,
}

/// Per-parameter summaries of `trace[burn_in..]`.
///
/// Returns an empty vector when nothing remains after burn-in.
pub fn posterior_summary(
    trace: &[ParameterVector],
    names: &[String],
    burn_in: usize,
) -> Vec<ParameterSummary> {
    let kept = trace.get(burn_in..).unwrap_or(&[]);
    if kept.is_empty() {
        return Vec::new();
    }
    names
        .iter()
        .enumerate()
        .map(|(index, name)| {
            let series = column(kept, index);
            let mean = mean(&series);
            let std_dev = if series.len() > 1 {
                let ss: f64 = series.iter().map(|x| (x - mean).powi(2)).sum();
                (ss / (series.len() - 1) as f64).sqrt()
            } else {
                0.0
            };
            ParameterSummary {
                name: name.clone(),
                mean,
                std_dev,
                min: series.iter().copied().fold(f64::INFINITY, f64::min),
                max: series.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                effective_sample_size: effective_sample_size(&series),
            }
        })
        .collect()
}

/// Componentwise mean of `trace[burn_in..]`, or `None` if that section is empty.
pub fn posterior_mean(trace: &[ParameterVector], burn_in: usize) -> Option<ParameterVector> {
    let kept = trace.get(burn_in..).filter(|rest| !rest.is_empty())?;
    let dim = kept[0].len();
    let values = (0..dim).map(|index| mean(&column(kept, index))).collect();
    Some(ParameterVector::new(values))
}

/// Fraction of consecutive trace entries that differ.
///
/// From chain 1's trace alone this counts both accepted mutations and accepted
/// exchanges as moves.
pub fn acceptance_rate(trace: &[ParameterVector]) -> f64 {
    if trace.len() < 2 {
        return 0.0;
    }
    let moves = trace.windows(2).filter(|pair| pair[0] != pair[1]).count();
    moves as f64 / (trace.len() - 1) as f64
}

/// Effective sample size via Geyer's initial positive sequence estimator.
///
/// Constant series report their full length; the result never exceeds `n`.
pub fn effective_sample_size(series: &[f64]) -> f64 {
    let n = series.len();
    if n < 2 {
        return n as f64;
    }
    let mean = mean(series);
    let autocovariance = |lag: usize| -> f64 {
        series[..n - lag]
            .iter()
            .zip(&series[lag..])
            .map(|(a, b)| (a - mean) * (b - mean))
            .sum::<f64>()
            / n as f64
    };
    let variance = autocovariance(0);
    if variance <= 0.0 {
        return n as f64;
    }

    let mut pair_sum = 0.0;
    let mut lag = 0;
    while lag + 1 < n {
        let gamma = (autocovariance(lag) + autocovariance(lag + 1)) / variance;
        if gamma <= 0.0 {
            break;
        }
        pair_sum += gamma;
        lag += 2;
    }
    let tau = 2.0 * pair_sum - 1.0;
    if tau <= 1.0 {
        n as f64
    } else {
        n as f64 / tau
    }
}

/// Summary of chain `chain_id` read from a trace CSV.
pub fn summarize_traces_csv(
    path: &Path,
    chain_id: usize,
    burn_in: usize,
) -> Result<ChainSummary, PopmcError> {
    let table = trace::read_traces_csv(path)?;
    let chain = table.chain_trace(chain_id);
    if chain.is_empty() {
        return Err(PopmcError::Data(
            ErrorInfo::new("unknown-chain", "no trace rows for the requested chain")
                .with_context("path", path.display())
                .with_context("chain", chain_id)
                .with_context("available", format!("{:?}", table.chain_ids())),
        ));
    }
    let kept = chain.get(burn_in..).unwrap_or(&[]);
    Ok(ChainSummary {
        chain_id,
        samples: kept.len(),
        acceptance_rate: acceptance_rate(kept),
        parameters: posterior_summary(&chain, &table.param_names, burn_in),
    })
}

fn column(trace: &[ParameterVector], index: usize) -> Vec<f64> {
    trace.iter().map(|state| state[index]).collect()
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trace_of(values: &[f64]) -> Vec<ParameterVector> {
        values.iter().map(|v| ParameterVector::new(vec![*v])).collect()
    }

    #[test]
    fn summary_drops_burn_in() {
        let trace = trace_of(&[100.0, 100.0, 1.0, 2.0, 3.0]);
        let summary = posterior_summary(&trace, &["x".to_string()], 2);
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].mean, 2.0);
        assert_eq!(summary[0].std_dev, 1.0);
        assert_eq!(summary[0].min, 1.0);
        assert_eq!(summary[0].max, 3.0);
    }

    #[test]
    fn burn_in_past_the_end_is_empty() {
        let trace = trace_of(&[1.0, 2.0]);
        assert!(posterior_summary(&trace, &["x".to_string()], 5).is_empty());
        assert!(posterior_mean(&trace, 2).is_none());
    }

    #[test]
    fn constant_series_has_full_ess() {
        assert_eq!(effective_sample_size(&[4.0; 50]), 50.0);
    }

    #[test]
    fn sticky_series_has_reduced_ess() {
        let series: Vec<f64> = (0..400).map(|i| ((i / 20) % 2) as f64).collect();
        let ess = effective_sample_size(&series);
        assert!(ess < 100.0, "ess {ess}");
    }

    #[test]
    fn acceptance_counts_changes() {
        let trace = trace_of(&[1.0, 1.0, 2.0, 2.0, 3.0]);
        assert_eq!(acceptance_rate(&trace), 0.5);
    }

    #[test]
    fn csv_summary_reports_kept_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("traces.csv");
        let csv = "t,x,id\n1,9,1\n2,1,1\n3,1,1\n4,3,1\n1,5,2\n2,5,2\n3,5,2\n4,5,2\n";
        std::fs::write(&path, csv).unwrap();

        let summary = summarize_traces_csv(&path, 1, 1).unwrap();
        assert_eq!(summary.chain_id, 1);
        assert_eq!(summary.samples, 3);
        assert_eq!(summary.acceptance_rate, 0.5);
        assert_eq!(summary.parameters[0].min, 1.0);
        assert_eq!(summary.parameters[0].max, 3.0);

        let err = summarize_traces_csv(&path, 3, 0).unwrap_err();
        assert_eq!(err.info().code, "unknown-chain");
    }
}
