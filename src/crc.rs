use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{CpapError, Result};
use crate::types::{Severity, ValidationIssue};

/// How strictly checksum sidecars are enforced during a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrcMode {
    /// A mismatch fails the scan.
    Strict,
    /// A mismatch becomes a warning diagnostic.
    Permissive,
    /// Sidecars are ignored entirely.
    Disabled,
}

/// Reads the expected checksum from a sidecar file: 2 or 4 bytes,
/// little-endian. Missing sidecars and unrecognized lengths yield
/// `None`.
pub fn read_crc_sidecar<P: AsRef<Path>>(path: P) -> Option<u32> {
    let bytes = fs::read(path).ok()?;
    match bytes.len() {
        2 => Some(u16::from_le_bytes([bytes[0], bytes[1]]) as u32),
        4 => Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])),
        _ => None,
    }
}

/// CRC-16/CCITT over the data, as medical loggers commonly use.
pub fn crc16_ccitt(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

/// CRC-32/IEEE over the data.
pub fn crc32_ieee(data: &[u8]) -> u32 {
    let mut crc: u32 = 0xFFFF_FFFF;
    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0xEDB8_8320;
            } else {
                crc >>= 1;
            }
        }
    }
    !crc
}

/// Validates one data file against its sidecar checksum. The sidecar's
/// width is ambiguous, so the file passes when either the 16-bit or the
/// 32-bit checksum matches.
pub fn validate_file<P: AsRef<Path>>(data_path: P, expected: u32) -> Result<()> {
    let data = fs::read(&data_path)?;
    let crc16 = crc16_ccitt(&data) as u32;
    let crc32 = crc32_ieee(&data);

    if expected == crc16 || expected == crc32 {
        return Ok(());
    }

    Err(CpapError::ChecksumMismatch {
        path: data_path.as_ref().display().to_string(),
        message: format!(
            "expected {expected:04X}, calculated CRC16={crc16:04X}, CRC32={crc32:08X}"
        ),
    })
}

/// Walks a directory tree and validates every data file that has a
/// `.crc` sidecar next to it. In permissive mode each mismatch becomes
/// a warning diagnostic; in strict mode the first mismatch fails.
pub fn validate_directory<P: AsRef<Path>>(dir: P, mode: CrcMode) -> Result<Vec<ValidationIssue>> {
    let mut issues = Vec::new();
    if mode == CrcMode::Disabled {
        return Ok(issues);
    }

    let mut stack = vec![dir.as_ref().to_path_buf()];
    while let Some(current) = stack.pop() {
        let entries = match fs::read_dir(&current) {
            Ok(entries) => entries,
            Err(_) => continue,
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
                continue;
            }

            if path.extension().map(|e| e == "crc").unwrap_or(false) {
                continue;
            }

            let sidecar: PathBuf = path.with_extension("crc");
            let expected = match read_crc_sidecar(&sidecar) {
                Some(expected) => expected,
                None => continue,
            };

            if let Err(err) = validate_file(&path, expected) {
                match mode {
                    CrcMode::Strict => return Err(err),
                    CrcMode::Permissive => issues.push(ValidationIssue {
                        path: path.clone(),
                        kind: "crc_mismatch",
                        message: err.to_string(),
                        severity: Severity::Warning,
                    }),
                    CrcMode::Disabled => unreachable!(),
                }
            }
        }
    }

    Ok(issues)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc16_known_vector() {
        // CRC-16/CCITT-FALSE of "123456789" is 0x29B1.
        assert_eq!(crc16_ccitt(b"123456789"), 0x29B1);
    }

    #[test]
    fn crc32_known_vector() {
        // CRC-32/IEEE of "123456789" is 0xCBF43926.
        assert_eq!(crc32_ieee(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn either_checksum_width_accepts() {
        let dir = tempfile::tempdir().unwrap();
        let data_path = dir.path().join("x.edf");
        fs::write(&data_path, b"123456789").unwrap();

        assert!(validate_file(&data_path, 0x29B1).is_ok());
        assert!(validate_file(&data_path, 0xCBF4_3926).is_ok());
        assert!(validate_file(&data_path, 0xDEAD).is_err());
    }

    #[test]
    fn directory_scan_reports_mismatches_permissively() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("good.edf"), b"123456789").unwrap();
        fs::write(dir.path().join("good.crc"), 0x29B1u16.to_le_bytes()).unwrap();
        fs::write(dir.path().join("bad.edf"), b"123456789").unwrap();
        fs::write(dir.path().join("bad.crc"), 0xBEEFu16.to_le_bytes()).unwrap();
        fs::write(dir.path().join("nocrc.edf"), b"whatever").unwrap();

        let issues = validate_directory(dir.path(), CrcMode::Permissive).unwrap();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].path.ends_with("bad.edf"));
        assert_eq!(issues[0].kind, "crc_mismatch");

        assert!(validate_directory(dir.path(), CrcMode::Strict).is_err());
        assert!(validate_directory(dir.path(), CrcMode::Disabled)
            .unwrap()
            .is_empty());
    }
}
