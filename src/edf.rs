use std::fs;
use std::path::Path;

use chrono::NaiveDateTime;

use crate::error::{CpapError, Result};
use crate::utils::{ascii_field, atof_nonlocalized, atoi_nonlocalized, parse_fixed_int};
use crate::{ANNOTATION_MARKER, MAX_SIGNALS};

/// One decoded signal from a data-logger file.
///
/// `values` holds physical values obtained by linear scaling of the raw
/// 16-bit samples. When the scaling parameters are unusable (non-numeric
/// bounds or a zero-width digital range) the raw digital values are kept
/// instead and `decode_fallback` is set; the read never aborts for this.
#[derive(Debug, Clone)]
pub struct EdfSignal {
    pub label: String,
    pub transducer: String,
    pub physical_dimension: String,
    pub physical_min: f64,
    pub physical_max: f64,
    pub digital_min: i32,
    pub digital_max: i32,
    pub prefilter: String,
    pub samples_per_record: usize,
    /// Samples per second, derived from the record duration.
    pub sample_frequency: f64,
    pub values: Vec<f64>,
    pub decode_fallback: bool,
}

impl EdfSignal {
    /// Whether this is the embedded annotation channel.
    pub fn is_annotation(&self) -> bool {
        self.label.contains(ANNOTATION_MARKER) || self.label.contains("EDF+")
    }
}

/// Scaling parameters for one signal, or `None` when the header fields
/// do not permit a defined linear conversion.
#[derive(Debug, Clone, Copy)]
struct Scaling {
    physical_min: f64,
    physical_max: f64,
    digital_min: f64,
    digital_max: f64,
}

impl Scaling {
    fn apply(&self, digital: i16) -> f64 {
        self.physical_min
            + (digital as f64 - self.digital_min) * (self.physical_max - self.physical_min)
                / (self.digital_max - self.digital_min)
    }
}

/// A fully decoded data-logger file: fixed 256-byte main header, one
/// metadata block per signal, then sequential data records of 16-bit
/// little-endian samples.
///
/// Parsing is a pure transform over an in-memory byte buffer; the only
/// I/O is the single bounded read done by [`EdfFile::open`].
///
/// # Examples
///
/// ```rust
/// use cpaplog::edf::EdfFile;
/// use cpaplog::synth::EdfBuilder;
///
/// let bytes = EdfBuilder::new()
///     .signal("Press.40ms", "cmH2O", (0.0, 25.0), (0, 32767), vec![0, 16384, 32767])
///     .build();
///
/// let file = EdfFile::parse(&bytes)?;
/// assert_eq!(file.signals.len(), 1);
/// assert_eq!(file.signals[0].label, "Press.40ms");
/// assert_eq!(file.signals[0].values[0], 0.0);
/// assert_eq!(file.signals[0].values[2], 25.0);
/// # Ok::<(), cpaplog::CpapError>(())
/// ```
#[derive(Debug, Clone)]
pub struct EdfFile {
    pub version: String,
    pub patient_id: String,
    pub recording_id: String,
    pub start_datetime: NaiveDateTime,
    pub data_record_count: usize,
    /// Duration of one data record in seconds.
    pub record_duration: f64,
    pub signals: Vec<EdfSignal>,
    /// Raw bytes of the annotation channel, one chunk per data record.
    /// Empty when the file declares no annotation signal.
    pub annotation_records: Vec<Vec<u8>>,
}

impl EdfFile {
    /// Reads and decodes a data-logger file from disk.
    ///
    /// # Errors
    ///
    /// * [`CpapError::FileNotFound`] - the file cannot be opened
    /// * [`CpapError::InvalidField`] - a structural header field is not a
    ///   valid number
    /// * [`CpapError::TruncatedRecord`] - fewer data bytes than declared
    pub fn open<P: AsRef<Path>>(path: P) -> Result<EdfFile> {
        let bytes = fs::read(&path)
            .map_err(|e| CpapError::FileNotFound(format!("{}: {}", path.as_ref().display(), e)))?;
        Self::parse(&bytes)
    }

    /// Decodes a data-logger file from an in-memory buffer.
    pub fn parse(bytes: &[u8]) -> Result<EdfFile> {
        if bytes.len() < 256 {
            return Err(CpapError::TruncatedRecord {
                needed: 256,
                available: bytes.len(),
            });
        }

        let version = ascii_field(bytes, 0, 8);
        if !version.starts_with('0') {
            return Err(CpapError::InvalidFormat(format!(
                "not a data-logger file, version {version:?}"
            )));
        }

        let patient_id = ascii_field(bytes, 8, 80);
        let recording_id = ascii_field(bytes, 88, 80);

        let start_datetime = crate::utils::parse_header_datetime(
            &ascii_field(bytes, 168, 8),
            &ascii_field(bytes, 176, 8),
        )?;

        let header_bytes = parse_fixed_int(bytes, 184, 8, "header_byte_count")? as usize;

        let data_record_count = {
            let text = ascii_field(bytes, 236, 8);
            if text.is_empty() {
                0
            } else {
                let count = parse_fixed_int(bytes, 236, 8, "data_record_count")?;
                if count < 0 {
                    return Err(CpapError::InvalidField {
                        field: "data_record_count",
                        offset: 236,
                    });
                }
                count as usize
            }
        };

        let record_duration = {
            let text = ascii_field(bytes, 244, 8);
            if text.is_empty() {
                0.0
            } else {
                text.parse::<f64>().map_err(|_| CpapError::InvalidField {
                    field: "record_duration",
                    offset: 244,
                })?
            }
        };

        let signal_count = parse_fixed_int(bytes, 252, 4, "signal_count")? as i32;
        if signal_count < 1 || signal_count > MAX_SIGNALS as i32 {
            return Err(CpapError::InvalidSignalCount(signal_count));
        }
        let ns = signal_count as usize;

        // The metadata region runs from byte 256 up to the declared header
        // size; data records start at the declared size even when it is not
        // the nominal (ns + 1) * 256.
        if header_bytes < 256 + ns * 256 || bytes.len() < header_bytes {
            return Err(CpapError::InvalidHeader);
        }
        let meta = &bytes[256..header_bytes];

        let (signals, annotation_index, record_size) =
            Self::parse_signal_metadata(meta, ns, record_duration)?;

        let mut signals = signals;
        let mut annotation_records = Vec::new();

        let needed = data_record_count * record_size;
        let available = bytes.len() - header_bytes;
        if available < needed {
            return Err(CpapError::TruncatedRecord { needed, available });
        }

        let mut pos = header_bytes;
        for _ in 0..data_record_count {
            for (idx, signal) in signals.iter_mut().enumerate() {
                let chunk_len = signal.samples_per_record * 2;
                let chunk = &bytes[pos..pos + chunk_len];
                pos += chunk_len;

                if annotation_index == Some(idx) {
                    annotation_records.push(chunk.to_vec());
                    continue;
                }

                let scaling = signal_scaling(signal);
                for pair in chunk.chunks_exact(2) {
                    let digital = i16::from_le_bytes([pair[0], pair[1]]);
                    let value = match scaling {
                        Some(s) => s.apply(digital),
                        None => digital as f64,
                    };
                    signal.values.push(value);
                }
            }
        }

        Ok(EdfFile {
            version,
            patient_id,
            recording_id,
            start_datetime,
            data_record_count,
            record_duration,
            signals,
            annotation_records,
        })
    }

    /// Looks up a signal by its raw (trimmed) label.
    pub fn signal_by_label(&self, label: &str) -> Option<&EdfSignal> {
        self.signals.iter().find(|s| s.label == label)
    }

    /// Total file duration in seconds.
    pub fn duration_seconds(&self) -> f64 {
        self.data_record_count as f64 * self.record_duration
    }

    fn parse_signal_metadata(
        meta: &[u8],
        ns: usize,
        record_duration: f64,
    ) -> Result<(Vec<EdfSignal>, Option<usize>, usize)> {
        let mut signals = Vec::with_capacity(ns);
        let mut annotation_index = None;
        let mut record_size = 0usize;

        for i in 0..ns {
            let label = ascii_field(meta, i * 16, 16);
            let transducer = ascii_field(meta, ns * 16 + i * 80, 80);
            let physical_dimension = ascii_field(meta, ns * 96 + i * 8, 8);

            let phys_min_text = ascii_field(meta, ns * 104 + i * 8, 8);
            let phys_max_text = ascii_field(meta, ns * 112 + i * 8, 8);
            let dig_min_text = ascii_field(meta, ns * 120 + i * 8, 8);
            let dig_max_text = ascii_field(meta, ns * 128 + i * 8, 8);

            let prefilter = ascii_field(meta, ns * 136 + i * 80, 80);

            let samples_offset = ns * 216 + i * 8;
            let samples_text = ascii_field(meta, samples_offset, 8);
            let samples_per_record = if samples_text.is_empty() {
                0
            } else {
                samples_text
                    .parse::<usize>()
                    .map_err(|_| CpapError::InvalidField {
                        field: "samples_per_record",
                        offset: 256 + samples_offset,
                    })?
            };

            let sample_frequency = if record_duration > 0.0 {
                samples_per_record as f64 / record_duration
            } else {
                0.0
            };

            // Scaling bounds are decoded leniently: a signal with unusable
            // bounds keeps its raw digital values instead of failing the
            // whole file.
            let bounds_numeric = parse_float_opt(&phys_min_text).is_some()
                && parse_float_opt(&phys_max_text).is_some()
                && parse_float_opt(&dig_min_text).is_some()
                && parse_float_opt(&dig_max_text).is_some();

            let digital_min = atoi_nonlocalized(&dig_min_text);
            let digital_max = atoi_nonlocalized(&dig_max_text);
            let decode_fallback = !bounds_numeric || digital_max <= digital_min;

            if decode_fallback {
                log::debug!("signal {label:?}: unusable scaling bounds, keeping digital values");
            }

            let signal = EdfSignal {
                label,
                transducer,
                physical_dimension,
                physical_min: atof_nonlocalized(&phys_min_text),
                physical_max: atof_nonlocalized(&phys_max_text),
                digital_min,
                digital_max,
                prefilter,
                samples_per_record,
                sample_frequency,
                values: Vec::new(),
                decode_fallback,
            };

            if annotation_index.is_none() && signal.is_annotation() {
                annotation_index = Some(i);
            }

            record_size += samples_per_record * 2;
            signals.push(signal);
        }

        Ok((signals, annotation_index, record_size))
    }
}

fn parse_float_opt(text: &str) -> Option<f64> {
    if text.is_empty() {
        None
    } else {
        text.parse::<f64>().ok()
    }
}

/// Digital-to-physical scaling for a signal, or `None` when the signal
/// fell back to raw digital values. The division is defined only when
/// digital_max > digital_min.
fn signal_scaling(signal: &EdfSignal) -> Option<Scaling> {
    if signal.decode_fallback {
        return None;
    }
    Some(Scaling {
        physical_min: signal.physical_min,
        physical_max: signal.physical_max,
        digital_min: signal.digital_min as f64,
        digital_max: signal.digital_max as f64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::EdfBuilder;

    #[test]
    fn endpoints_decode_exactly() {
        let bytes = EdfBuilder::new()
            .signal(
                "Test",
                "uV",
                (-100.0, 100.0),
                (-1000, 1000),
                vec![-1000, 0, 1000],
            )
            .build();
        let file = EdfFile::parse(&bytes).unwrap();
        let values = &file.signals[0].values;
        assert_eq!(values[0], -100.0);
        assert_eq!(values[1], 0.0);
        assert_eq!(values[2], 100.0);
    }

    #[test]
    fn out_of_range_samples_are_not_clamped() {
        // Digital range narrower than what the samples use: the linear
        // formula still applies, no clamping.
        let bytes = EdfBuilder::new()
            .signal("Test", "uV", (0.0, 100.0), (0, 100), vec![-50, 200])
            .build();
        let file = EdfFile::parse(&bytes).unwrap();
        let values = &file.signals[0].values;
        assert_eq!(values[0], -50.0);
        assert_eq!(values[1], 200.0);
    }

    #[test]
    fn blank_scaling_bounds_fall_back_to_digital() {
        let bytes = EdfBuilder::new()
            .raw_bounds_signal("Odd", "", "", "", "", "", vec![7, -3])
            .build();
        let file = EdfFile::parse(&bytes).unwrap();
        let signal = &file.signals[0];
        assert!(signal.decode_fallback);
        assert_eq!(signal.values, vec![7.0, -3.0]);
    }

    #[test]
    fn zero_width_digital_range_falls_back() {
        let bytes = EdfBuilder::new()
            .signal("Flat", "uV", (0.0, 10.0), (5, 5), vec![5, 5])
            .build();
        let file = EdfFile::parse(&bytes).unwrap();
        assert!(file.signals[0].decode_fallback);
        assert_eq!(file.signals[0].values, vec![5.0, 5.0]);
    }

    #[test]
    fn truncated_data_is_an_error() {
        let mut bytes = EdfBuilder::new()
            .signal("Test", "uV", (0.0, 10.0), (0, 100), vec![1, 2, 3, 4])
            .build();
        bytes.truncate(bytes.len() - 3);
        match EdfFile::parse(&bytes) {
            Err(CpapError::TruncatedRecord { needed, available }) => {
                assert!(available < needed);
            }
            other => panic!("expected TruncatedRecord, got {other:?}"),
        }
    }

    #[test]
    fn malformed_structural_field_is_an_error() {
        let mut bytes = EdfBuilder::new()
            .signal("Test", "uV", (0.0, 10.0), (0, 100), vec![1])
            .build();
        bytes[236..244].copy_from_slice(b"notanum ");
        match EdfFile::parse(&bytes) {
            Err(CpapError::InvalidField { field, offset }) => {
                assert_eq!(field, "data_record_count");
                assert_eq!(offset, 236);
            }
            other => panic!("expected InvalidField, got {other:?}"),
        }
    }

    #[test]
    fn header_fields_are_decoded() {
        let bytes = EdfBuilder::new()
            .patient_id("PAT 12345")
            .recording_id("SRN=22201234567 PCB=12345")
            .signal("Press.40ms", "cmH2O", (0.0, 25.0), (0, 32767), vec![0; 25])
            .build();
        let file = EdfFile::parse(&bytes).unwrap();
        assert_eq!(file.patient_id, "PAT 12345");
        assert_eq!(file.recording_id, "SRN=22201234567 PCB=12345");
        assert_eq!(file.data_record_count, 1);
        assert_eq!(file.signals[0].sample_frequency, 25.0);
    }
}
