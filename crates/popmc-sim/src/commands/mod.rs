#![allow(clippy::field_reassign_with_default)]

pub mod analyze;
pub mod demo;
pub mod resume;

use std::error::Error;
use std::fs;
use std::path::Path;

use popmc_core::ObservedData;
use popmc_ode::ReferenceModel;
use serde::{Deserialize, Serialize};

/// Substream of the master seed reserved for synthetic data noise.
pub const DATA_SUBSTREAM: u64 = u64::MAX;

/// Inputs needed to rebuild a demo run's posterior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoRecord {
    pub model: ReferenceModel,
    pub data_seed: u64,
}

pub const DEMO_RECORD_FILE: &str = "demo.json";
pub const OBSERVED_FILE: &str = "observed.csv";
pub const SUMMARY_FILE: &str = "summary.json";

pub fn write_json<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<(), Box<dyn Error>> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}

/// Writes observations as `t,y_1,..,y_n`.
pub fn write_observed_csv(
    path: &Path,
    times: &[f64],
    data: &ObservedData,
) -> Result<(), Box<dyn Error>> {
    let mut writer = csv::Writer::from_path(path)?;
    let mut header = vec!["t".to_string()];
    header.extend((1..=data.num_variables()).map(|var| format!("y_{var}")));
    writer.write_record(&header)?;
    for (row, time) in times.iter().enumerate() {
        let mut record = vec![time.to_string()];
        record.extend(data.row(row).iter().map(|value| value.to_string()));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Reads a file written by [`write_observed_csv`], dropping the time column.
pub fn read_observed_csv(path: &Path) -> Result<ObservedData, Box<dyn Error>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row = record
            .iter()
            .skip(1)
            .map(|field| field.parse::<f64>())
            .collect::<Result<Vec<_>, _>>()?;
        rows.push(row);
    }
    Ok(ObservedData::from_rows(&rows)?)
}
