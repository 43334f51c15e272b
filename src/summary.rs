use std::path::Path;

use chrono::{DateTime, Duration, NaiveDateTime};

use crate::edf::EdfFile;
use crate::error::Result;
use crate::matching::SessionInterval;
use crate::types::SessionSummary;

/// Sample values the device uses as "no data" markers inside summary
/// channels. Present in both mask-time and statistic arrays.
const SENTINELS: [f64; 4] = [-32768.0, 32767.0, 65534.0, 65535.0];

/// Minutes in a day; mask-time samples below this are minute offsets
/// from the log's start date, larger ones are Unix timestamps.
const MINUTES_PER_DAY: f64 = 1440.0;

fn is_sentinel(value: f64) -> bool {
    SENTINELS.contains(&value)
}

/// One per-session statistic array from the summary log.
#[derive(Debug, Clone)]
pub struct SummaryChannel {
    pub label: String,
    pub unit: String,
    /// Column-oriented: one value per recorded session, in log order.
    pub values: Vec<f64>,
}

/// The decoded device-wide summary log: the second, independently
/// timestamped view of the same recording sessions.
#[derive(Debug, Clone)]
pub struct SummaryLog {
    pub start_datetime: NaiveDateTime,
    pub patient_id: String,
    pub recording_id: String,
    pub duration_seconds: f64,
    /// Mask-on/mask-off intervals, in log order.
    pub intervals: Vec<SessionInterval>,
    pub channels: Vec<SummaryChannel>,
}

impl SummaryLog {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<SummaryLog> {
        let file = EdfFile::open(path)?;
        Ok(Self::from_edf(&file))
    }

    /// Extracts intervals and statistic arrays from an already decoded
    /// summary file. The underlying reader has usually fallen back to
    /// raw digital values for several channels here; that is expected
    /// for this log's non-compliant signal metadata.
    pub fn from_edf(file: &EdfFile) -> SummaryLog {
        let channels: Vec<SummaryChannel> = file
            .signals
            .iter()
            .filter(|s| !s.is_annotation())
            .map(|s| SummaryChannel {
                label: s.label.clone(),
                unit: s.physical_dimension.clone(),
                values: s.values.clone(),
            })
            .collect();

        let intervals = extract_intervals(file.start_datetime, &channels);

        SummaryLog {
            start_datetime: file.start_datetime,
            patient_id: file.patient_id.clone(),
            recording_id: file.recording_id.clone(),
            duration_seconds: file.duration_seconds(),
            intervals,
            channels,
        }
    }

    pub fn channel(&self, label: &str) -> Option<&SummaryChannel> {
        self.channels.iter().find(|c| c.label == label)
    }

    /// Device serial number, harvested from the `SRN=` token of the
    /// recording-id header field.
    pub fn serial_number(&self) -> Option<String> {
        self.recording_id
            .split_whitespace()
            .find_map(|part| part.strip_prefix("SRN="))
            .map(|srn| srn.to_string())
    }

    /// Statistic value for one session position, with sentinel samples
    /// filtered out.
    fn statistic(&self, label: &str, session_index: usize) -> Option<f64> {
        let value = *self.channel(label)?.values.get(session_index)?;
        if is_sentinel(value) {
            None
        } else {
            Some(value)
        }
    }

    /// Builds the per-session summary for the session at `session_index`
    /// in the log's column-oriented statistic arrays.
    pub fn session_statistics(&self, session_index: usize) -> SessionSummary {
        let mut summary = SessionSummary::default();

        summary.ahi = self.statistic("AHI", session_index);
        summary.ai = self.statistic("AI", session_index);
        summary.hi = self.statistic("HI", session_index);
        summary.obstructive_ai = self.statistic("OAI", session_index);
        summary.central_ai = self.statistic("CAI", session_index);

        summary.pressure_median = self.statistic("MaskPress.50", session_index);
        summary.pressure_95th = self.statistic("MaskPress.95", session_index);

        summary.leak_median = self.statistic("Leak.50", session_index);
        summary.leak_95th = self.statistic("Leak.95", session_index);
        summary.leak_max = self.statistic("Leak.Max", session_index);

        summary.spo2_median = self.statistic("SpO2.50", session_index);
        summary.spo2_95th = self.statistic("SpO2.95", session_index);
        summary.spo2_max = self.statistic("SpO2.Max", session_index);

        summary.duration_minutes = self.statistic("Duration", session_index);
        summary.on_duration_minutes = self.statistic("OnDuration", session_index);

        summary.tidal_volume_median = self.statistic("TidVol.50", session_index);
        summary.minute_ventilation_median = self.statistic("MinVent.50", session_index);
        summary.respiratory_rate_median = self.statistic("RespRate.50", session_index);

        summary
    }
}

/// Pairs the MaskOn/MaskOff arrays into validated session intervals.
///
/// Sentinel samples (including 0) are skipped. Small values are minute
/// offsets from the log's start datetime; large ones are treated as Unix
/// timestamps. Pairs that do not satisfy off > on are discarded.
fn extract_intervals(
    start_datetime: NaiveDateTime,
    channels: &[SummaryChannel],
) -> Vec<SessionInterval> {
    let mask_on = channels.iter().find(|c| c.label == "MaskOn");
    let mask_off = channels.iter().find(|c| c.label == "MaskOff");

    let (mask_on, mask_off) = match (mask_on, mask_off) {
        (Some(on), Some(off)) => (on, off),
        _ => return Vec::new(),
    };

    let mut intervals = Vec::new();
    for (&on_val, &off_val) in mask_on.values.iter().zip(mask_off.values.iter()) {
        if on_val == 0.0 || off_val == 0.0 || is_sentinel(on_val) || is_sentinel(off_val) {
            continue;
        }

        let pair = if on_val < MINUTES_PER_DAY && off_val < MINUTES_PER_DAY {
            (
                mask_time_from_minutes(start_datetime, on_val),
                mask_time_from_minutes(start_datetime, off_val),
            )
        } else {
            (mask_time_from_epoch(on_val), mask_time_from_epoch(off_val))
        };

        if let (Some(on), Some(off)) = pair {
            if let Some(interval) = SessionInterval::new(on, off) {
                intervals.push(interval);
            } else {
                log::debug!("discarding inverted mask interval {on_val} / {off_val}");
            }
        }
    }

    intervals
}

fn mask_time_from_minutes(start: NaiveDateTime, minutes: f64) -> Option<NaiveDateTime> {
    Some(start + Duration::seconds((minutes * 60.0) as i64))
}

fn mask_time_from_epoch(value: f64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp(value as i64, 0).map(|dt| dt.naive_utc())
}
