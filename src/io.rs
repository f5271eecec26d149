//! Reading and writing sample tables.
//!
//! Traces are written as delimited text with one header row naming the columns, which is also the
//! format [`read_sample_table`] understands, so exported traces can be fed back into the
//! convergence test.

use crate::diagnostics::{BatchSummary, SampleTrace};
use crate::error::ConfigurationError;
use crate::integrators::importance::{ConvergenceWarning, FullOutput};
use crate::registry::ProposalMetadata;
use crate::Result;
use csv::{ReaderBuilder, Trim, WriterBuilder};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

/// Name of the column holding the logarithm of the integrand.
pub const LN_L_COLUMN: &str = "lnL";

/// Write `trace` as a table with the columns `param_1 ... param_k lnL`.
pub fn write_trace<W: Write>(writer: W, trace: &SampleTrace, delimiter: u8) -> Result<()> {
    let mut wtr = WriterBuilder::new().delimiter(delimiter).from_writer(writer);

    let mut header: Vec<&str> = trace.names().iter().map(String::as_str).collect();
    header.push(LN_L_COLUMN);
    wtr.write_record(&header)?;

    for row in trace.rows() {
        wtr.write_record(row.iter().map(|v| v.to_string()))?;
    }

    wtr.flush()?;
    Ok(())
}

/// Save `trace` to the file `path`, separating columns with spaces.
pub fn save_trace<P: AsRef<Path>>(path: P, trace: &SampleTrace) -> Result<()> {
    write_trace(File::create(path)?, trace, b' ')
}

/// A table of named numeric columns, stored row by row.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SampleTable {
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl SampleTable {
    /// Names of all columns.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// All rows.
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of the column `name`.
    pub fn column(&self, name: &str) -> std::result::Result<Vec<f64>, ConfigurationError> {
        let index = self.index_of(name)?;
        Ok(self.rows.iter().map(|row| row[index]).collect())
    }

    /// Rows restricted to the columns `names`, in that order.
    pub fn select<S: AsRef<str>>(
        &self,
        names: &[S],
    ) -> std::result::Result<Vec<Vec<f64>>, ConfigurationError> {
        let indices = names
            .iter()
            .map(|name| self.index_of(name.as_ref()))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(self
            .rows
            .iter()
            .map(|row| indices.iter().map(|&i| row[i]).collect())
            .collect())
    }

    fn index_of(&self, name: &str) -> std::result::Result<usize, ConfigurationError> {
        self.columns
            .iter()
            .position(|column| column == name)
            .ok_or_else(|| ConfigurationError::UnknownParameter(name.to_string()))
    }
}

fn invalid_data(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}

/// Replaces every run of whitespace within a line by a single space.
fn collapse_whitespace<R: Read>(mut reader: R) -> io::Result<String> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;

    Ok(text
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("\n"))
}

/// Read a table whose first row names the columns. A leading `#` in the header is ignored. If
/// `delimiter` is a whitespace character, any run of whitespace separates two columns.
pub fn read_sample_table<R: Read>(reader: R, delimiter: u8) -> Result<SampleTable> {
    if delimiter.is_ascii_whitespace() {
        let text = collapse_whitespace(reader)?;
        parse_sample_table(text.as_bytes(), b' ')
    } else {
        parse_sample_table(reader, delimiter)
    }
}

fn parse_sample_table<R: Read>(reader: R, delimiter: u8) -> Result<SampleTable> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut columns: Vec<String> = rdr
        .headers()?
        .iter()
        .map(|column| column.to_string())
        .collect();
    if let Some(first) = columns.first_mut() {
        *first = first.trim_start_matches('#').trim().to_string();
    }
    if columns.first().map_or(false, String::is_empty) {
        columns.remove(0);
    }

    let mut rows = Vec::new();
    for (line, record) in rdr.records().enumerate() {
        let record = record?;
        if record.len() != columns.len() {
            return Err(invalid_data(format!(
                "row {} has {} fields, expected {}",
                line + 1,
                record.len(),
                columns.len()
            ))
            .into());
        }

        let row = record
            .iter()
            .map(|field| {
                field.parse::<f64>().map_err(|err| {
                    invalid_data(format!("row {}: cannot parse '{}': {}", line + 1, field, err))
                })
            })
            .collect::<io::Result<Vec<_>>>()?;
        rows.push(row);
    }

    Ok(SampleTable { columns, rows })
}

/// Load a sample table from the file `path`.
pub fn load_sample_table<P: AsRef<Path>>(path: P, delimiter: u8) -> Result<SampleTable> {
    read_sample_table(File::open(path)?, delimiter)
}

#[derive(Serialize)]
struct Summary<'a> {
    estimate: f64,
    variance: f64,
    neff: f64,
    calls: usize,
    non_finite_calls: usize,
    proposals: &'a BTreeMap<String, ProposalMetadata>,
    batches: &'a [BatchSummary],
    convergence_warning: Option<&'a ConvergenceWarning>,
}

/// Write the estimates of `output` together with the proposal metadata and the per-batch
/// estimates as JSON. The trace itself is not included; use [`write_trace`] for it.
pub fn write_summary_json<W: Write>(writer: W, output: &FullOutput) -> Result<()> {
    let summary = Summary {
        estimate: output.estimate,
        variance: output.variance,
        neff: output.neff,
        calls: output.extras.trace.len(),
        non_finite_calls: output.extras.non_finite_calls,
        proposals: &output.extras.proposals,
        batches: &output.extras.batches,
        convergence_warning: output.extras.convergence_warning.as_ref(),
    };

    serde_json::to_writer_pretty(writer, &summary)?;
    Ok(())
}
