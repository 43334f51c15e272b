use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::{CpapError, Result};

/// Decodes a fixed-width ASCII header field, trimming the space padding.
/// Reads past the end of the buffer come back empty.
pub fn ascii_field(buf: &[u8], start: usize, len: usize) -> String {
    let end = (start + len).min(buf.len());
    if start >= end {
        return String::new();
    }
    String::from_utf8_lossy(&buf[start..end]).trim().to_string()
}

/// Strict fixed-width integer field parse.
///
/// Header counters (byte counts, record counts, signal counts) are
/// structural: a malformed field here fails the whole read, identifying
/// the field and its byte offset.
pub fn parse_fixed_int(buf: &[u8], start: usize, len: usize, field: &'static str) -> Result<i64> {
    let text = ascii_field(buf, start, len);
    text.parse::<i64>()
        .map_err(|_| CpapError::InvalidField { field, offset: start })
}

/// Non-localized lenient integer parse: empty or malformed input yields 0.
pub fn atoi_nonlocalized(s: &str) -> i32 {
    let s = s.trim();
    if s.is_empty() {
        return 0;
    }
    s.parse().unwrap_or(0)
}

/// Non-localized lenient float parse: empty or malformed input yields 0.0.
pub fn atof_nonlocalized(s: &str) -> f64 {
    let s = s.trim();
    if s.is_empty() {
        return 0.0;
    }
    s.parse().unwrap_or(0.0)
}

/// Parses the header start date/time pair (`dd.mm.yy` and `hh.mm.ss`).
///
/// Two-digit years pivot at 85: 85..99 map to 1985..1999, 0..84 map to
/// 2000..2084.
pub fn parse_header_datetime(date_str: &str, time_str: &str) -> Result<NaiveDateTime> {
    let date_parts: Vec<&str> = date_str.trim().split('.').collect();
    if date_parts.len() != 3 {
        return Err(CpapError::InvalidFormat(format!(
            "bad start date: {date_str:?}"
        )));
    }

    let day = atoi_nonlocalized(date_parts[0]);
    let month = atoi_nonlocalized(date_parts[1]);
    let year = {
        let yy = atoi_nonlocalized(date_parts[2]);
        if yy > 84 {
            1900 + yy
        } else {
            2000 + yy
        }
    };

    let date = NaiveDate::from_ymd_opt(year, month as u32, day as u32)
        .ok_or_else(|| CpapError::InvalidFormat(format!("bad start date: {date_str:?}")))?;

    let time_parts: Vec<&str> = time_str.trim().split('.').collect();
    if time_parts.len() != 3 {
        return Err(CpapError::InvalidFormat(format!(
            "bad start time: {time_str:?}"
        )));
    }

    let hour = atoi_nonlocalized(time_parts[0]);
    let minute = atoi_nonlocalized(time_parts[1]);
    let second = atoi_nonlocalized(time_parts[2]);

    let time = NaiveTime::from_hms_opt(hour as u32, minute as u32, second as u32)
        .ok_or_else(|| CpapError::InvalidFormat(format!("bad start time: {time_str:?}")))?;

    Ok(NaiveDateTime::new(date, time))
}

/// Splits a DATALOG file stem of the form `YYYYMMDD_HHMMSS_<TYPE>` into
/// its start timestamp and type code. Returns `None` for anything that
/// does not follow the convention.
pub fn parse_filename_timestamp(stem: &str) -> Option<(NaiveDateTime, String)> {
    let parts: Vec<&str> = stem.split('_').collect();
    if parts.len() < 3 {
        return None;
    }
    let stamp = format!("{}_{}", parts[0], parts[1]);
    let start = NaiveDateTime::parse_from_str(&stamp, "%Y%m%d_%H%M%S").ok()?;
    Some((start, parts[parts.len() - 1].to_ascii_uppercase()))
}
