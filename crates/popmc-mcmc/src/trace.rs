//! CSV export of chain traces: header `t,<param names...>,id`, one row per
//! chain per iteration, grouped by chain id.

use std::path::Path;

use popmc_core::{ErrorInfo, ParameterVector, PopmcError};

use crate::chain::Chain;

/// One trace row.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceRow {
    /// 1-based iteration.
    pub t: usize,
    /// Chain id.
    pub id: usize,
    /// Recorded state.
    pub values: ParameterVector,
}

/// Traces read back from CSV.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TraceTable {
    /// Parameter labels taken from the header.
    pub param_names: Vec<String>,
    /// Rows in file order.
    pub rows: Vec<TraceRow>,
}

impl TraceTable {
    /// Distinct chain ids in ascending order.
    pub fn chain_ids(&self) -> Vec<usize> {
        let mut ids: Vec<usize> = self.rows.iter().map(|row| row.id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Trace of chain `id` ordered by iteration.
    pub fn chain_trace(&self, id: usize) -> Vec<ParameterVector> {
        let mut rows: Vec<&TraceRow> = self.rows.iter().filter(|row| row.id == id).collect();
        rows.sort_by_key(|row| row.t);
        rows.into_iter().map(|row| row.values.clone()).collect()
    }
}

/// Writes every chain's trace to `path`.
pub fn write_traces_csv(
    path: &Path,
    param_names: &[String],
    chains: &[Chain],
) -> Result<(), PopmcError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|err| PopmcError::serde_at("traces-mkdir", err, parent))?;
    }
    let mut writer =
        csv::Writer::from_path(path).map_err(|err| PopmcError::serde_at("traces-open", err, path))?;
    let mut header = Vec::with_capacity(param_names.len() + 2);
    header.push("t".to_string());
    header.extend(param_names.iter().cloned());
    header.push("id".to_string());
    writer
        .write_record(&header)
        .map_err(|err| PopmcError::serde_at("traces-write", err, path))?;

    for chain in chains {
        for (index, state) in chain.trace().iter().enumerate() {
            let mut record = Vec::with_capacity(header.len());
            record.push((index + 1).to_string());
            record.extend(state.iter().map(|value| value.to_string()));
            record.push(chain.id().to_string());
            writer
                .write_record(&record)
                .map_err(|err| PopmcError::serde_at("traces-write", err, path))?;
        }
    }
    writer
        .flush()
        .map_err(|err| PopmcError::serde_at("traces-flush", err, path))
}

/// Reads a trace CSV written by [`write_traces_csv`].
pub fn read_traces_csv(path: &Path) -> Result<TraceTable, PopmcError> {
    let mut reader =
        csv::Reader::from_path(path).map_err(|err| PopmcError::serde_at("traces-open", err, path))?;
    let header = reader
        .headers()
        .map_err(|err| PopmcError::serde_at("traces-read", err, path))?
        .clone();
    let columns: Vec<&str> = header.iter().collect();
    if columns.len() < 3 || columns[0] != "t" || columns[columns.len() - 1] != "id" {
        return Err(PopmcError::Data(
            ErrorInfo::new("traces-header", "expected header t,<param names...>,id")
                .with_context("path", path.display())
                .with_context("header", columns.join(",")),
        ));
    }
    let param_names: Vec<String> = columns[1..columns.len() - 1]
        .iter()
        .map(|name| name.to_string())
        .collect();

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|err| PopmcError::serde_at("traces-read", err, path))?;
        let bad_row = |field: &str| {
            PopmcError::Data(
                ErrorInfo::new("traces-row", format!("unparsable {field} column"))
                    .with_context("path", path.display())
                    .with_context("row", line + 1),
            )
        };
        if record.len() != columns.len() {
            return Err(bad_row("count"));
        }
        let t = record[0].parse::<usize>().map_err(|_| bad_row("t"))?;
        let id = record[record.len() - 1]
            .parse::<usize>()
            .map_err(|_| bad_row("id"))?;
        let values = (1..record.len() - 1)
            .map(|col| record[col].parse::<f64>().map_err(|_| bad_row(&columns[col])))
            .collect::<Result<Vec<_>, _>>()?;
        rows.push(TraceRow {
            t,
            id,
            values: ParameterVector::new(values),
        });
    }
    Ok(TraceTable { param_names, rows })
}
