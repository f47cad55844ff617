//! Citi Bike trip CSV ingestion.
//!
//! The trip export carries 15 columns; only the station ids, the bike id,
//! and the two timestamps feed the engine. Malformed rows are counted and
//! skipped, never surfaced as errors: an unreadable file aborts, a bad row
//! does not.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use hotpath_core::Trip;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

const COL_START_TIME: usize = 1;
const COL_STOP_TIME: usize = 2;
const COL_START_STATION: usize = 3;
const COL_END_STATION: usize = 7;
const COL_BIKE: usize = 11;

/// Minimum columns a row must carry to be parseable.
const MIN_COLUMNS: usize = 12;

const TS_WITH_FRACTION: &str = "%Y-%m-%d %H:%M:%S%.f";
const TS_SECONDS: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum TripParseError {
    #[error("expected at least {MIN_COLUMNS} columns, got {0}")]
    TooFewColumns(usize),

    #[error("invalid {field}: {value:?}")]
    BadField { field: &'static str, value: String },

    #[error("trip ends before it starts")]
    NegativeDuration,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestStats {
    /// Data rows seen (header excluded).
    pub rows: u64,
    /// Rows skipped as malformed.
    pub malformed: u64,
}

/// Read up to `max_events` trips from a Citi Bike CSV. Event ids are the
/// 1-based data row numbers, so a trip can be traced back to its row.
pub fn read_trips(path: &Path, max_events: Option<u64>) -> Result<(Vec<Trip>, IngestStats)> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("opening trip csv {}", path.display()))?;

    let mut trips = Vec::new();
    let mut stats = IngestStats::default();

    for record in reader.records() {
        if max_events.is_some_and(|cap| trips.len() as u64 >= cap) {
            break;
        }
        stats.rows += 1;
        let row = stats.rows;

        let record = match record {
            Ok(record) => record,
            Err(err) => {
                stats.malformed += 1;
                warn!(row, %err, "skipping unreadable trip row");
                continue;
            }
        };
        match parse_record(&record, row) {
            Ok(trip) => trips.push(trip),
            Err(err) => {
                stats.malformed += 1;
                warn!(row, %err, "skipping malformed trip row");
            }
        }
    }

    Ok((trips, stats))
}

fn parse_record(record: &StringRecord, event_id: u64) -> Result<Trip, TripParseError> {
    if record.len() < MIN_COLUMNS {
        return Err(TripParseError::TooFewColumns(record.len()));
    }

    let start_station = parse_station(record, COL_START_STATION, "start station")?;
    let end_station = parse_station(record, COL_END_STATION, "end station")?;
    let bike = parse_u64(record, COL_BIKE, "bike id")?;
    let start_time = parse_timestamp(record, COL_START_TIME, "start time")?;
    let end_time = parse_timestamp(record, COL_STOP_TIME, "stop time")?;

    if end_time < start_time {
        return Err(TripParseError::NegativeDuration);
    }

    Ok(Trip::new(
        event_id,
        bike,
        start_station,
        end_station,
        start_time,
        end_time,
    ))
}

fn field<'a>(record: &'a StringRecord, idx: usize) -> &'a str {
    record.get(idx).unwrap_or("").trim()
}

/// Station ids sometimes arrive as floats ("3002.0").
fn parse_station(
    record: &StringRecord,
    idx: usize,
    name: &'static str,
) -> Result<u32, TripParseError> {
    let value = field(record, idx);
    value
        .parse::<u32>()
        .ok()
        .or_else(|| {
            value
                .parse::<f64>()
                .ok()
                .filter(|v| v.fract() == 0.0 && *v >= 0.0 && *v <= f64::from(u32::MAX))
                .map(|v| v as u32)
        })
        .ok_or_else(|| TripParseError::BadField {
            field: name,
            value: value.to_string(),
        })
}

fn parse_u64(record: &StringRecord, idx: usize, name: &'static str) -> Result<u64, TripParseError> {
    let value = field(record, idx);
    value.parse::<u64>().map_err(|_| TripParseError::BadField {
        field: name,
        value: value.to_string(),
    })
}

fn parse_timestamp(
    record: &StringRecord,
    idx: usize,
    name: &'static str,
) -> Result<DateTime<Utc>, TripParseError> {
    let value = field(record, idx);
    NaiveDateTime::parse_from_str(value, TS_WITH_FRACTION)
        .or_else(|_| NaiveDateTime::parse_from_str(value, TS_SECONDS))
        .map(|naive| naive.and_utc())
        .map_err(|_| TripParseError::BadField {
            field: name,
            value: value.to_string(),
        })
}

/// Write trips in the Citi Bike column layout, so generated streams are
/// readable by `read_trips`.
pub fn write_trips(path: &Path, trips: &[Trip]) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .from_path(path)
        .with_context(|| format!("creating trip csv {}", path.display()))?;

    writer.write_record([
        "tripduration",
        "starttime",
        "stoptime",
        "start station id",
        "start station name",
        "start station latitude",
        "start station longitude",
        "end station id",
        "end station name",
        "end station latitude",
        "end station longitude",
        "bikeid",
        "usertype",
        "birth year",
        "gender",
    ])?;

    for trip in trips {
        let duration = (trip.end_time - trip.start_time).num_seconds();
        writer.write_record([
            duration.to_string(),
            trip.start_time.format(TS_SECONDS).to_string(),
            trip.end_time.format(TS_SECONDS).to_string(),
            trip.start_station.to_string(),
            format!("Station {}", trip.start_station),
            "40.75".to_string(),
            "-73.99".to_string(),
            trip.end_station.to_string(),
            format!("Station {}", trip.end_station),
            "40.75".to_string(),
            "-73.99".to_string(),
            trip.bike.to_string(),
            "Subscriber".to_string(),
            "1990".to_string(),
            "1".to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
