//! Synthetic data-logger files for documentation examples and tests.
//!
//! The crate only reads vendor files, so tests build their fixtures as
//! in-memory byte buffers with [`EdfBuilder`] instead of shipping real
//! recordings.

/// Builder for a minimal but structurally valid data-logger byte buffer.
///
/// Defaults: start 2024-11-26 23:40:09, one data record, one second per
/// record. Samples-per-record for each signal is derived from its
/// sample count and the record count.
#[derive(Debug, Clone)]
pub struct EdfBuilder {
    patient_id: String,
    recording_id: String,
    start_date: String,
    start_time: String,
    record_duration: f64,
    data_records: usize,
    signals: Vec<SynthSignal>,
}

#[derive(Debug, Clone)]
struct SynthSignal {
    label: String,
    dimension: String,
    physical_min: String,
    physical_max: String,
    digital_min: String,
    digital_max: String,
    data: SignalData,
}

#[derive(Debug, Clone)]
enum SignalData {
    Samples(Vec<i16>),
    Annotation {
        samples_per_record: usize,
        chunks: Vec<Vec<u8>>,
    },
}

impl Default for EdfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EdfBuilder {
    pub fn new() -> EdfBuilder {
        EdfBuilder {
            patient_id: String::new(),
            recording_id: String::new(),
            start_date: "26.11.24".to_string(),
            start_time: "23.40.09".to_string(),
            record_duration: 1.0,
            data_records: 1,
            signals: Vec::new(),
        }
    }

    pub fn patient_id(mut self, value: &str) -> Self {
        self.patient_id = value.to_string();
        self
    }

    pub fn recording_id(mut self, value: &str) -> Self {
        self.recording_id = value.to_string();
        self
    }

    /// Raw header date/time fields, `dd.mm.yy` and `hh.mm.ss`.
    pub fn start_date(mut self, date: &str, time: &str) -> Self {
        self.start_date = date.to_string();
        self.start_time = time.to_string();
        self
    }

    pub fn record_duration(mut self, seconds: f64) -> Self {
        self.record_duration = seconds;
        self
    }

    pub fn data_records(mut self, count: usize) -> Self {
        self.data_records = count;
        self
    }

    /// Adds a sample signal; `samples` spans all data records.
    pub fn signal(
        mut self,
        label: &str,
        dimension: &str,
        physical: (f64, f64),
        digital: (i32, i32),
        samples: Vec<i16>,
    ) -> Self {
        self.signals.push(SynthSignal {
            label: label.to_string(),
            dimension: dimension.to_string(),
            physical_min: num_string(physical.0),
            physical_max: num_string(physical.1),
            digital_min: digital.0.to_string(),
            digital_max: digital.1.to_string(),
            data: SignalData::Samples(samples),
        });
        self
    }

    /// Adds a sample signal with the bound fields given verbatim, for
    /// exercising non-compliant metadata (blank or garbage bounds).
    #[allow(clippy::too_many_arguments)]
    pub fn raw_bounds_signal(
        mut self,
        label: &str,
        dimension: &str,
        physical_min: &str,
        physical_max: &str,
        digital_min: &str,
        digital_max: &str,
        samples: Vec<i16>,
    ) -> Self {
        self.signals.push(SynthSignal {
            label: label.to_string(),
            dimension: dimension.to_string(),
            physical_min: physical_min.to_string(),
            physical_max: physical_max.to_string(),
            digital_min: digital_min.to_string(),
            digital_max: digital_max.to_string(),
            data: SignalData::Samples(samples),
        });
        self
    }

    /// Adds an annotation channel carrying one byte chunk per data
    /// record; chunks shorter than the channel width are zero-padded.
    pub fn annotation_signal(mut self, samples_per_record: usize, chunks: Vec<Vec<u8>>) -> Self {
        self.signals.push(SynthSignal {
            label: "EDF Annotations".to_string(),
            dimension: String::new(),
            physical_min: "-1".to_string(),
            physical_max: "1".to_string(),
            digital_min: "-32768".to_string(),
            digital_max: "32767".to_string(),
            data: SignalData::Annotation {
                samples_per_record,
                chunks,
            },
        });
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let ns = self.signals.len();
        let records = self.data_records;
        let header_bytes = (ns + 1) * 256;

        let spr: Vec<usize> = self
            .signals
            .iter()
            .map(|s| match &s.data {
                SignalData::Samples(samples) => {
                    assert!(
                        records > 0 && samples.len() % records == 0,
                        "sample count {} does not divide into {} records",
                        samples.len(),
                        records
                    );
                    samples.len() / records
                }
                SignalData::Annotation {
                    samples_per_record, ..
                } => *samples_per_record,
            })
            .collect();

        let mut out = Vec::new();

        // Main header, 256 bytes of fixed-width ASCII.
        push_fixed(&mut out, "0", 8);
        push_fixed(&mut out, &self.patient_id, 80);
        push_fixed(&mut out, &self.recording_id, 80);
        push_fixed(&mut out, &self.start_date, 8);
        push_fixed(&mut out, &self.start_time, 8);
        push_fixed(&mut out, &header_bytes.to_string(), 8);
        push_fixed(&mut out, "", 44);
        push_fixed(&mut out, &records.to_string(), 8);
        push_fixed(&mut out, &num_string(self.record_duration), 8);
        push_fixed(&mut out, &ns.to_string(), 4);

        // Field-major signal metadata blocks.
        for s in &self.signals {
            push_fixed(&mut out, &s.label, 16);
        }
        for _ in &self.signals {
            push_fixed(&mut out, "", 80); // transducer
        }
        for s in &self.signals {
            push_fixed(&mut out, &s.dimension, 8);
        }
        for s in &self.signals {
            push_fixed(&mut out, &s.physical_min, 8);
        }
        for s in &self.signals {
            push_fixed(&mut out, &s.physical_max, 8);
        }
        for s in &self.signals {
            push_fixed(&mut out, &s.digital_min, 8);
        }
        for s in &self.signals {
            push_fixed(&mut out, &s.digital_max, 8);
        }
        for _ in &self.signals {
            push_fixed(&mut out, "", 80); // prefilter
        }
        for (i, _) in self.signals.iter().enumerate() {
            push_fixed(&mut out, &spr[i].to_string(), 8);
        }
        for _ in &self.signals {
            push_fixed(&mut out, "", 32); // reserved
        }

        // Data records: per signal in declared order, 16-bit LE samples.
        for record in 0..records {
            for (i, s) in self.signals.iter().enumerate() {
                match &s.data {
                    SignalData::Samples(samples) => {
                        let slice = &samples[record * spr[i]..(record + 1) * spr[i]];
                        for sample in slice {
                            out.extend_from_slice(&sample.to_le_bytes());
                        }
                    }
                    SignalData::Annotation { chunks, .. } => {
                        let width = spr[i] * 2;
                        let mut chunk = chunks.get(record).cloned().unwrap_or_default();
                        assert!(
                            chunk.len() <= width,
                            "annotation chunk of {} bytes exceeds channel width {}",
                            chunk.len(),
                            width
                        );
                        chunk.resize(width, 0);
                        out.extend_from_slice(&chunk);
                    }
                }
            }
        }

        out
    }
}

fn push_fixed(out: &mut Vec<u8>, value: &str, width: usize) {
    let mut bytes = value.as_bytes().to_vec();
    assert!(
        bytes.len() <= width,
        "field {value:?} exceeds its width {width}"
    );
    bytes.resize(width, b' ');
    out.extend_from_slice(&bytes);
}

fn num_string(value: f64) -> String {
    let plain = format!("{value}");
    if plain.len() <= 8 {
        plain
    } else {
        format!("{value:e}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_buffers_have_the_declared_layout() {
        let bytes = EdfBuilder::new()
            .signal("A", "uV", (0.0, 10.0), (0, 100), vec![1, 2])
            .signal("B", "uV", (0.0, 10.0), (0, 100), vec![3, 4])
            .build();

        // Header plus two metadata blocks, then 2 signals x 2 samples x 2 bytes.
        assert_eq!(bytes.len(), 3 * 256 + 8);
        assert_eq!(&bytes[0..1], b"0");
        assert_eq!(&bytes[252..256], b"2   ");
    }

    #[test]
    fn wide_bounds_render_in_exponent_form() {
        assert_eq!(num_string(2e9), "2e9");
        assert_eq!(num_string(25.0), "25");
        assert_eq!(num_string(0.5), "0.5");
    }
}
