//! # CPAP Data-Logger Library for Rust
//!
//! A pure Rust library for reading the SD card data written by ResMed
//! CPAP machines: the EDF-style binary DATALOG files (pressure, flow,
//! oximetry, events), the device-wide `STR.edf` summary log, and the
//! plain-text `.tgt` settings dumps. All sources are decoded into one
//! uniform channel/event/session model.
//!
//! The vendor files are only loosely standards-compliant, so decoding is
//! deliberately forgiving everywhere it can afford to be: one corrupt
//! annotation, setting line, or file degrades into fewer results and a
//! diagnostic, never a failed batch.
//!
//! ## Quick Start
//!
//! ### Scanning a card
//!
//! ```rust,no_run
//! use cpaplog::CpapArchive;
//!
//! fn main() -> cpaplog::Result<()> {
//!     let mut archive = CpapArchive::open("/mnt/sdcard")?;
//!
//!     println!("device: {}", archive.device().serial_number);
//!
//!     for session in archive.sessions_mut() {
//!         let event_count = session.events().len();
//!         println!(
//!             "{} AHI={:?} events={}",
//!             session.start_time,
//!             session.summary.ahi,
//!             event_count
//!         );
//!     }
//!
//!     // Per-file problems never abort the scan; they end up here.
//!     for issue in archive.issues() {
//!         eprintln!("{}: {}", issue.path.display(), issue.message);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ### Decoding a single file
//!
//! ```rust
//! use cpaplog::edf::EdfFile;
//! use cpaplog::channels::resolve_channels;
//! use cpaplog::synth::EdfBuilder;
//!
//! fn main() -> cpaplog::Result<()> {
//!     # let bytes = EdfBuilder::new()
//!     #     .signal("Press.40ms", "cmH2O", (0.0, 25.0), (0, 32767), vec![0, 16384, 32767])
//!     #     .build();
//!     // let bytes = std::fs::read("20241127_004009_BRP.edf")?;
//!     let file = EdfFile::parse(&bytes)?;
//!
//!     // Raw vendor labels become canonical channels, deduplicated in
//!     // favor of the higher-resolution variant.
//!     let waveforms = resolve_channels(&file, file.start_datetime);
//!     for waveform in &waveforms {
//!         println!(
//!             "{}: {} samples at {} Hz [{}]",
//!             waveform.channel_name,
//!             waveform.values.len(),
//!             waveform.sample_rate,
//!             waveform.unit
//!         );
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Sources of truth
//!
//! A single night is described by up to three independent sources: the
//! DATALOG filename carries a start timestamp, the summary log carries a
//! mask-on/mask-off interval list with per-session statistic arrays, and
//! the settings dumps carry the device configuration. The
//! [`matching`] module reconciles the first two under a two-hour
//! tolerance; [`settings`] decodes the third through its key-specific
//! encodings (deci/centi fixed point, bit fields, enumerations).

pub mod annotations;
pub mod channels;
pub mod crc;
pub mod edf;
pub mod error;
pub mod events;
pub mod matching;
pub mod scan;
pub mod settings;
pub mod summary;
pub mod types;
pub mod utils;

#[doc(hidden)]
pub mod synth; // fixture builders for doctests and tests

// Re-export main types for convenience
pub use annotations::{read_annotations, Annotation};
pub use channels::resolve_channels;
pub use crc::CrcMode;
pub use edf::{EdfFile, EdfSignal};
pub use error::{CpapError, Result};
pub use events::{classify_annotation, classify_events};
pub use matching::{match_interval, SessionInterval};
pub use scan::CpapArchive;
pub use settings::{decode_raw_settings, decode_text_settings, SettingsRecord};
pub use summary::SummaryLog;
pub use types::{
    Device, DeviceSettings, Event, EventKind, Session, SessionSummary, Severity, ValidationIssue,
    Waveform,
};

/// Upper bound on the signal count a file may declare.
pub const MAX_SIGNALS: usize = 4096;

/// Label marker identifying the embedded annotation channel.
pub const ANNOTATION_MARKER: &str = "EDF Annotations";

/// Library version
///
/// ```rust
/// let version = cpaplog::version();
/// assert!(version.contains('.'));
/// ```
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
