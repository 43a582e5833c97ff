//! Reporter - fixed-column CSV projection and full JSON document
//!
//! Columns: host, returncode, observation_point, name, time.
//! Every other observation field is dropped from the CSV.

use chrono::SecondsFormat;
use serde::Serialize;
use std::io::Write;

use super::constants::REPORT_COLUMNS;
use crate::domain::{Batch, Observation, ObservationPoint};
use crate::error::{AppError, Result};

/// One CSV row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow<'a> {
    pub host: &'a str,
    pub returncode: i32,
    pub observation_point: ObservationPoint,
    pub name: &'a str,
    pub time: String,
}

impl<'a> From<&'a Observation> for ReportRow<'a> {
    fn from(observation: &'a Observation) -> Self {
        Self {
            host: observation.host(),
            returncode: observation.returncode(),
            observation_point: observation.observation_point(),
            name: observation.name(),
            time: observation.time().to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

pub struct Reporter;

impl Reporter {
    pub fn rows(batch: &Batch) -> Vec<ReportRow<'_>> {
        batch.observations.iter().map(ReportRow::from).collect()
    }

    /// Write header and rows; every field quoted, `\n` line endings
    pub fn write_csv<W: Write>(batch: &Batch, writer: W) -> Result<()> {
        let mut csv_writer = csv::WriterBuilder::new()
            .has_headers(false)
            .quote_style(csv::QuoteStyle::Always)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(writer);

        // Header written by hand so an empty batch still has one
        csv_writer.write_record(REPORT_COLUMNS)?;
        for row in Self::rows(batch) {
            csv_writer.serialize(row)?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    pub fn to_csv(batch: &Batch) -> Result<String> {
        let mut buf = Vec::new();
        Self::write_csv(batch, &mut buf)?;
        String::from_utf8(buf).map_err(|e| AppError::Validation(e.to_string()))
    }

    pub fn to_csv_lines(batch: &Batch) -> Result<Vec<String>> {
        Ok(Self::to_csv(batch)?.lines().map(str::to_string).collect())
    }

    /// Full, unprojected batch
    pub fn to_json(batch: &Batch) -> Result<String> {
        Ok(serde_json::to_string_pretty(batch)?)
    }
}
