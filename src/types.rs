use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::NaiveDateTime;

/// Kinds of respiratory and device events recorded by the machine.
///
/// This is a closed set: annotation text that does not map onto one of
/// these kinds produces no event at all (see [`crate::events`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ObstructiveApnea,
    CentralApnea,
    Hypopnea,
    /// Apnea that the device could not classify further.
    Apnea,
    FlowLimitation,
    /// Respiratory Effort Related Arousal.
    Rera,
    VibratorySnore,
    PeriodicBreathing,
    CheyneStokes,
    LargeLeak,
    MaskOn,
    MaskOff,
}

impl EventKind {
    /// Maps a short event code (as used in the vendor annotation tables)
    /// onto the closed event-kind set. Unknown codes yield `None`.
    pub fn from_code(code: &str) -> Option<EventKind> {
        Some(match code {
            "OA" => EventKind::ObstructiveApnea,
            "CA" => EventKind::CentralApnea,
            "H" => EventKind::Hypopnea,
            "A" => EventKind::Apnea,
            "FL" => EventKind::FlowLimitation,
            "RE" => EventKind::Rera,
            "VS" => EventKind::VibratorySnore,
            "PB" => EventKind::PeriodicBreathing,
            "CSR" => EventKind::CheyneStokes,
            "LL" => EventKind::LargeLeak,
            "mask_on" => EventKind::MaskOn,
            "mask_off" => EventKind::MaskOff,
            _ => return None,
        })
    }

    pub fn code(&self) -> &'static str {
        match self {
            EventKind::ObstructiveApnea => "OA",
            EventKind::CentralApnea => "CA",
            EventKind::Hypopnea => "H",
            EventKind::Apnea => "A",
            EventKind::FlowLimitation => "FL",
            EventKind::Rera => "RE",
            EventKind::VibratorySnore => "VS",
            EventKind::PeriodicBreathing => "PB",
            EventKind::CheyneStokes => "CSR",
            EventKind::LargeLeak => "LL",
            EventKind::MaskOn => "mask_on",
            EventKind::MaskOff => "mask_off",
        }
    }
}

/// Therapy modes the device can run in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpapMode {
    Cpap,
    Apap,
    BilevelT,
    BilevelS,
    BilevelSt,
    VpapAuto,
    Asv,
    AsvAuto,
    Ivaps,
    Pac,
    AutoForHer,
}

impl CpapMode {
    pub fn from_name(name: &str) -> Option<CpapMode> {
        Some(match name {
            "CPAP" => CpapMode::Cpap,
            "APAP" => CpapMode::Apap,
            "BiLevel-T" => CpapMode::BilevelT,
            "BiLevel-S" => CpapMode::BilevelS,
            "BiLevel-S/T" => CpapMode::BilevelSt,
            "VPAPauto" => CpapMode::VpapAuto,
            "ASV" => CpapMode::Asv,
            "ASVAuto" => CpapMode::AsvAuto,
            "iVAPS" => CpapMode::Ivaps,
            "PAC" => CpapMode::Pac,
            "Auto for Her" => CpapMode::AutoForHer,
            _ => return None,
        })
    }
}

/// One respiratory or device event at an absolute point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub kind: EventKind,
    pub timestamp: NaiveDateTime,
    /// Duration in seconds; 0.0 for instantaneous markers.
    pub duration: f64,
    /// Free-form auxiliary data, e.g. the raw annotation text.
    pub data: BTreeMap<String, String>,
}

/// A resolved time-series channel: canonical name, unit, rate and samples.
///
/// Produced by the channel identity resolver from raw signal records; at
/// most one waveform per canonical name survives a single file parse.
#[derive(Debug, Clone)]
pub struct Waveform {
    pub channel_name: String,
    pub unit: String,
    /// Samples per second.
    pub sample_rate: f64,
    pub start_time: NaiveDateTime,
    pub values: Vec<f64>,
}

impl Waveform {
    /// Total covered time span in seconds.
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate > 0.0 {
            self.values.len() as f64 / self.sample_rate
        } else {
            0.0
        }
    }
}

/// Summary statistics for one therapy session, populated from the
/// summary log where a matching interval exists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSummary {
    pub duration_seconds: f64,
    pub duration_hours: f64,
    pub mask_on_time: Option<NaiveDateTime>,
    pub mask_off_time: Option<NaiveDateTime>,

    pub ahi: Option<f64>,
    pub ai: Option<f64>,
    pub hi: Option<f64>,
    pub obstructive_ai: Option<f64>,
    pub central_ai: Option<f64>,

    pub pressure_median: Option<f64>,
    pub pressure_95th: Option<f64>,

    pub leak_median: Option<f64>,
    pub leak_95th: Option<f64>,
    pub leak_max: Option<f64>,

    pub spo2_median: Option<f64>,
    pub spo2_95th: Option<f64>,
    pub spo2_max: Option<f64>,

    pub duration_minutes: Option<f64>,
    pub on_duration_minutes: Option<f64>,

    pub tidal_volume_median: Option<f64>,
    pub minute_ventilation_median: Option<f64>,
    pub respiratory_rate_median: Option<f64>,
}

/// Device configuration as decoded from settings dumps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceSettings {
    pub mode: Option<CpapMode>,
    /// Fixed pressure in cmH2O (CPAP mode).
    pub pressure: Option<f64>,
    pub pressure_min: Option<f64>,
    pub pressure_max: Option<f64>,
    pub ramp_start_pressure: Option<f64>,

    pub epr_enabled: Option<bool>,
    pub epr_level: Option<i64>,
    pub epr_type: Option<String>,

    pub ramp_enabled: Option<bool>,
    /// Ramp time in minutes.
    pub ramp_time: Option<i64>,

    pub smart_start: Option<bool>,
    pub mask_type: Option<String>,
    pub tube_type: Option<String>,
    pub antibacterial_filter: Option<bool>,

    pub humidifier_enabled: Option<bool>,
    pub humidifier_level: Option<i64>,
    pub climate_control: Option<String>,
    pub temperature_enabled: Option<bool>,
    pub temperature: Option<f64>,

    /// AutoSet response ("Standard" / "Soft" / "For Her").
    pub response: Option<String>,
    pub patient_access_enabled: Option<bool>,
}

/// A CPAP device identified on the card.
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub serial_number: String,
    pub model_name: String,
    pub firmware_version: Option<String>,
}

/// Severity of a per-file validation diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// One per-file diagnostic recorded during a batch scan.
///
/// A corrupt file among many never aborts the scan; it becomes one of
/// these instead.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub path: PathBuf,
    pub kind: &'static str,
    pub message: String,
    pub severity: Severity,
}

/// Explicit two-state wrapper for data computed on first access.
///
/// Session events and waveforms are decoded from their source files only
/// when asked for; the wrapper makes that visible instead of hiding it
/// behind attribute access.
#[derive(Debug, Clone)]
pub enum Lazy<T> {
    Unloaded,
    Loaded(T),
}

impl<T> Lazy<T> {
    pub fn is_loaded(&self) -> bool {
        matches!(self, Lazy::Loaded(_))
    }

    pub fn get(&self) -> Option<&T> {
        match self {
            Lazy::Loaded(value) => Some(value),
            Lazy::Unloaded => None,
        }
    }

    /// Loads the value with `load` if not yet present, then returns it.
    pub fn ensure_loaded<F: FnOnce() -> T>(&mut self, load: F) -> &T {
        if let Lazy::Unloaded = self {
            *self = Lazy::Loaded(load());
        }
        match self {
            Lazy::Loaded(value) => value,
            Lazy::Unloaded => unreachable!(),
        }
    }
}

impl<T> Default for Lazy<T> {
    fn default() -> Self {
        Lazy::Unloaded
    }
}

/// One contiguous therapy session assembled from a DATALOG file group.
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    pub device_serial: String,
    pub start_time: NaiveDateTime,
    pub end_time: Option<NaiveDateTime>,

    pub summary: SessionSummary,
    pub settings: DeviceSettings,

    pub has_pressure_data: bool,
    pub has_flow_data: bool,
    pub has_spo2_data: bool,
    pub has_events: bool,

    // Source files backing the lazily decoded fields.
    pub brp_file: Option<PathBuf>,
    pub pld_file: Option<PathBuf>,
    pub sad_file: Option<PathBuf>,
    pub eve_file: Option<PathBuf>,
    pub csl_file: Option<PathBuf>,

    pub(crate) events: Lazy<Vec<Event>>,
    pub(crate) waveforms: Lazy<Vec<Waveform>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_kind_codes_round_trip() {
        for code in ["OA", "CA", "H", "A", "FL", "RE", "VS", "PB", "CSR", "LL"] {
            let kind = EventKind::from_code(code).unwrap();
            assert_eq!(kind.code(), code);
        }
        assert_eq!(EventKind::from_code("XYZ"), None);
    }

    #[test]
    fn lazy_loads_once() {
        let mut slot: Lazy<Vec<i32>> = Lazy::Unloaded;
        assert!(!slot.is_loaded());
        assert_eq!(slot.ensure_loaded(|| vec![1, 2]), &vec![1, 2]);
        // A second ensure must not replace the loaded value.
        assert_eq!(slot.ensure_loaded(|| vec![9]), &vec![1, 2]);
        assert!(slot.is_loaded());
    }
}
