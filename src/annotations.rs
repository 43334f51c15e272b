use crate::edf::EdfFile;
use crate::error::{CpapError, Result};

/// Single-byte code separating an onset from its duration inside an
/// annotation tuple. An opaque control byte, not a printable character.
pub const DURATION_SEPARATOR: u8 = 0x15;

/// Single-byte code terminating each field of an annotation tuple.
pub const FIELD_TERMINATOR: u8 = 0x14;

/// One decoded annotation: onset and duration in seconds from the
/// recording start, plus the free-form marker text.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub onset: f64,
    pub duration: f64,
    pub text: String,
}

/// Decodes all annotations embedded in a file's annotation channel.
///
/// Two-step pipeline: the standards-compliant decoder runs first; if it
/// fails or finds nothing, the byte-level recovery scanner is the sole
/// remaining attempt. The worst case for any input is an empty list,
/// never an error.
///
/// # Examples
///
/// ```rust
/// use cpaplog::annotations::read_annotations;
/// use cpaplog::edf::EdfFile;
/// use cpaplog::synth::EdfBuilder;
///
/// let bytes = EdfBuilder::new()
///     .annotation_signal(32, vec![b"+12.5\x153.0\x14Obstructive Apnea\x14".to_vec()])
///     .build();
///
/// let file = EdfFile::parse(&bytes)?;
/// let annotations = read_annotations(&file);
/// assert_eq!(annotations.len(), 1);
/// assert_eq!(annotations[0].onset, 12.5);
/// assert_eq!(annotations[0].duration, 3.0);
/// assert_eq!(annotations[0].text, "Obstructive Apnea");
/// # Ok::<(), cpaplog::CpapError>(())
/// ```
pub fn read_annotations(file: &EdfFile) -> Vec<Annotation> {
    match decode_compliant(&file.annotation_records) {
        Ok(list) if !list.is_empty() => list,
        _ => file
            .annotation_records
            .iter()
            .flat_map(|record| scan_record(record))
            .collect(),
    }
}

/// Standards-path decoder: each record must open with a timekeeping
/// entry (`+offset` terminated twice, no duration), followed by
/// well-formed annotation entries. Any structural violation is an error,
/// which callers turn into a fallback to [`scan_record`].
pub fn decode_compliant(records: &[Vec<u8>]) -> Result<Vec<Annotation>> {
    let mut out = Vec::new();

    for record in records {
        if record.iter().all(|&b| b == 0) {
            continue;
        }

        let mut saw_timekeeping = false;
        for entry in record.split(|&b| b == 0).filter(|e| !e.is_empty()) {
            let (onset, duration, texts) = parse_entry(entry)?;

            if !saw_timekeeping {
                if duration.is_some() {
                    return Err(CpapError::InvalidFormat(
                        "record does not open with a timekeeping entry".into(),
                    ));
                }
                saw_timekeeping = true;
                continue;
            }

            for text in texts {
                if !text.is_empty() {
                    out.push(Annotation {
                        onset,
                        duration: duration.unwrap_or(0.0),
                        text,
                    });
                }
            }
        }
    }

    Ok(out)
}

/// Parses one compliant entry: `<sign><number>[\x15<number>]` then one or
/// more terminated text fields, the entry ending on a terminator.
fn parse_entry(entry: &[u8]) -> Result<(f64, Option<f64>, Vec<String>)> {
    let malformed = || CpapError::InvalidFormat("malformed annotation entry".into());

    if entry.first() != Some(&b'+') && entry.first() != Some(&b'-') {
        return Err(malformed());
    }

    let mut i = 1;
    while i < entry.len() && (entry[i].is_ascii_digit() || entry[i] == b'.') {
        i += 1;
    }
    let onset: f64 = std::str::from_utf8(&entry[..i])
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(malformed)?;

    let duration = if entry.get(i) == Some(&DURATION_SEPARATOR) {
        i += 1;
        let start = i;
        while i < entry.len() && (entry[i].is_ascii_digit() || entry[i] == b'.') {
            i += 1;
        }
        let value: f64 = std::str::from_utf8(&entry[start..i])
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(malformed)?;
        Some(value)
    } else {
        None
    };

    if entry.get(i) != Some(&FIELD_TERMINATOR) || entry.last() != Some(&FIELD_TERMINATOR) {
        return Err(malformed());
    }

    let texts = entry[i + 1..entry.len() - 1]
        .split(|&b| b == FIELD_TERMINATOR)
        .map(|t| String::from_utf8_lossy(t).trim().to_string())
        .collect();

    Ok((onset, duration, texts))
}

/// Byte-level recovery scanner for one data record's annotation bytes.
///
/// Recognizes tuples of the form `<sign><digits>[\x15<digits>]\x14<text>\x14`
/// anywhere in the record. An onset followed directly by a terminator is
/// a bare timestamp marker and produces nothing. A malformed numeric
/// span skips that tuple only; scanning continues, so one corrupt tuple
/// never loses the rest of the stream.
pub fn scan_record(data: &[u8]) -> Vec<Annotation> {
    let mut out = Vec::new();
    let mut i = 0;

    while i < data.len() {
        let starts_tuple = (data[i] == b'+' || data[i] == b'-')
            && i + 1 < data.len()
            && data[i + 1].is_ascii_digit();

        if !starts_tuple {
            i += 1;
            continue;
        }

        let onset_start = i;
        i += 1;
        while i < data.len() && (data[i].is_ascii_digit() || data[i] == b'.') {
            i += 1;
        }
        let onset_str = &data[onset_start..i];

        if i >= data.len() || data[i] != DURATION_SEPARATOR {
            // Bare timestamp marker, or garbage after the onset: skip it.
            continue;
        }

        i += 1;
        let duration_start = i;
        while i < data.len() && (data[i].is_ascii_digit() || data[i] == b'.') {
            i += 1;
        }
        let duration_str = &data[duration_start..i];

        if i >= data.len() || data[i] != FIELD_TERMINATOR {
            continue;
        }
        i += 1;

        let text_start = i;
        while i < data.len() && data[i] != FIELD_TERMINATOR && data[i] != 0 {
            i += 1;
        }
        let text = String::from_utf8_lossy(&data[text_start..i])
            .trim()
            .to_string();

        let onset = std::str::from_utf8(onset_str)
            .ok()
            .and_then(|s| s.parse::<f64>().ok());
        let duration = if duration_str.is_empty() {
            Some(0.0)
        } else {
            std::str::from_utf8(duration_str)
                .ok()
                .and_then(|s| s.parse::<f64>().ok())
        };

        if let (Some(onset), Some(duration)) = (onset, duration) {
            if !text.is_empty() {
                out.push(Annotation {
                    onset,
                    duration,
                    text,
                });
            }
        }
    }

    out
}
