use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};

use crate::annotations::read_annotations;
use crate::channels::resolve_channels;
use crate::crc::{validate_directory, CrcMode};
use crate::edf::EdfFile;
use crate::error::{CpapError, Result};
use crate::events::{classify_events, parse_csl_annotations};
use crate::matching::{interval_index, match_interval, SessionInterval};
use crate::settings::{parse_identification_file, parse_settings_file};
use crate::summary::SummaryLog;
use crate::types::{
    Device, DeviceSettings, Event, Lazy, Session, SessionSummary, Severity, ValidationIssue,
    Waveform,
};
use crate::utils::parse_filename_timestamp;

/// File-type codes a DATALOG filename may carry.
const FILE_TYPES: [&str; 7] = ["BRP", "PLD", "SAD", "SA2", "EVE", "CSL", "AEV"];

/// Reader for a full SD card directory tree.
///
/// Opening an archive scans its structure, checks checksum sidecars and
/// decodes the summary log; per-session data files are decoded lazily.
/// A corrupt file anywhere turns into a [`ValidationIssue`] instead of
/// failing the scan, so a batch over many nights always yields the
/// decodable sessions plus a list of per-file diagnostics.
///
/// # Examples
///
/// ```rust,no_run
/// use cpaplog::scan::CpapArchive;
///
/// let mut archive = CpapArchive::open("/mnt/sdcard")?;
/// println!("device {}", archive.device().serial_number);
///
/// for session in archive.sessions_mut() {
///     let event_count = session.events().len();
///     println!(
///         "{}: {} events",
///         session.start_time,
///         event_count
///     );
/// }
///
/// for issue in archive.issues() {
///     eprintln!("{}: {}", issue.path.display(), issue.message);
/// }
/// # Ok::<(), cpaplog::CpapError>(())
/// ```
pub struct CpapArchive {
    root: PathBuf,
    datalog_path: PathBuf,
    settings_path: PathBuf,
    device: Device,
    summary: Option<SummaryLog>,
    issues: Vec<ValidationIssue>,
    sessions: Option<Vec<Session>>,
}

impl CpapArchive {
    /// Opens an archive with permissive checksum handling.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<CpapArchive> {
        Self::with_crc_mode(root, CrcMode::Permissive)
    }

    pub fn with_crc_mode<P: AsRef<Path>>(root: P, crc_mode: CrcMode) -> Result<CpapArchive> {
        let root = root.as_ref().to_path_buf();
        if !root.exists() {
            return Err(CpapError::FileNotFound(root.display().to_string()));
        }

        let datalog_path = root.join("DATALOG");
        let settings_path = root.join("SETTINGS");
        let mut issues = Vec::new();

        if !datalog_path.exists() {
            issues.push(ValidationIssue {
                path: root.clone(),
                kind: "missing_directory",
                message: "DATALOG directory not found".to_string(),
                severity: Severity::Error,
            });
        }
        if !settings_path.exists() {
            issues.push(ValidationIssue {
                path: root.clone(),
                kind: "missing_directory",
                message: "SETTINGS directory not found".to_string(),
                severity: Severity::Warning,
            });
        }

        issues.extend(validate_directory(&root, crc_mode)?);

        let summary_path = root.join("STR.edf");
        let summary = if summary_path.exists() {
            match SummaryLog::open(&summary_path) {
                Ok(log) => Some(log),
                Err(err) => {
                    // Sessions can still be found from the DATALOG files.
                    issues.push(ValidationIssue {
                        path: summary_path,
                        kind: "parse_warning",
                        message: format!("could not parse summary log: {err}"),
                        severity: Severity::Info,
                    });
                    None
                }
            }
        } else {
            None
        };

        let device = identify_device(&root, summary.as_ref(), &mut issues);

        Ok(CpapArchive {
            root,
            datalog_path,
            settings_path,
            device,
            summary,
            issues,
            sessions: None,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn summary(&self) -> Option<&SummaryLog> {
        self.summary.as_ref()
    }

    /// Diagnostics accumulated so far, including any produced while
    /// loading sessions.
    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    /// All sessions found on the card, oldest first.
    pub fn sessions(&mut self) -> &[Session] {
        self.ensure_sessions();
        self.sessions.as_deref().unwrap_or(&[])
    }

    /// Mutable access, needed for the sessions' lazily decoded fields.
    pub fn sessions_mut(&mut self) -> &mut [Session] {
        self.ensure_sessions();
        self.sessions.as_deref_mut().unwrap_or(&mut [])
    }

    fn ensure_sessions(&mut self) {
        if self.sessions.is_some() {
            return;
        }
        let (sessions, mut issues) = self.load_sessions();
        self.issues.append(&mut issues);
        self.sessions = Some(sessions);
    }

    fn load_sessions(&self) -> (Vec<Session>, Vec<ValidationIssue>) {
        let mut sessions = Vec::new();
        let mut issues = Vec::new();

        let settings = self.load_card_settings(&mut issues);

        let mut date_dirs: Vec<PathBuf> = match fs::read_dir(&self.datalog_path) {
            Ok(entries) => entries
                .flatten()
                .map(|e| e.path())
                .filter(|p| p.is_dir())
                .collect(),
            Err(_) => Vec::new(),
        };
        date_dirs.sort();

        for date_dir in date_dirs {
            let dir_name = match date_dir.file_name().and_then(|n| n.to_str()) {
                Some(name) => name,
                None => continue,
            };
            if NaiveDate::parse_from_str(dir_name, "%Y%m%d").is_err() {
                continue;
            }

            for (start_time, files) in group_session_files(&date_dir) {
                let mut usable = BTreeMap::new();
                for (kind, path) in files {
                    match EdfFile::open(&path) {
                        Ok(_) => {
                            usable.insert(kind, path);
                        }
                        Err(err) => issues.push(ValidationIssue {
                            path,
                            kind: "parse_error",
                            message: err.to_string(),
                            severity: Severity::Error,
                        }),
                    }
                }

                if usable.is_empty() {
                    continue;
                }

                sessions.push(self.build_session(start_time, usable, settings.clone()));
            }
        }

        (sessions, issues)
    }

    fn build_session(
        &self,
        start_time: NaiveDateTime,
        files: BTreeMap<String, PathBuf>,
        settings: DeviceSettings,
    ) -> Session {
        let matched: Option<SessionInterval> = self
            .summary
            .as_ref()
            .and_then(|log| match_interval(start_time, &log.intervals))
            .copied();

        let mut summary = SessionSummary {
            mask_on_time: Some(start_time),
            ..SessionSummary::default()
        };

        if let (Some(log), Some(interval)) = (self.summary.as_ref(), matched.as_ref()) {
            let index = interval_index(interval, &log.intervals);
            summary = log.session_statistics(index);
            summary.mask_on_time = Some(interval.start);
            summary.mask_off_time = Some(interval.end);
            summary.duration_seconds = interval.duration_seconds();
            summary.duration_hours = summary.duration_seconds / 3600.0;
        }

        let has_sad = files.contains_key("SAD") || files.contains_key("SA2");

        Session {
            session_id: format!(
                "{}_{}",
                self.device.serial_number,
                start_time.format("%Y%m%d_%H%M%S")
            ),
            device_serial: self.device.serial_number.clone(),
            start_time,
            end_time: matched.map(|i| i.end),
            summary,
            settings,
            has_pressure_data: files.contains_key("BRP") || files.contains_key("PLD"),
            has_flow_data: files.contains_key("BRP"),
            has_spo2_data: has_sad,
            has_events: files.contains_key("EVE"),
            brp_file: files.get("BRP").cloned(),
            pld_file: files.get("PLD").cloned(),
            sad_file: files.get("SAD").or_else(|| files.get("SA2")).cloned(),
            eve_file: files.get("EVE").cloned(),
            csl_file: files.get("CSL").cloned(),
            events: Lazy::Unloaded,
            waveforms: Lazy::Unloaded,
        }
    }

    fn load_card_settings(&self, issues: &mut Vec<ValidationIssue>) -> DeviceSettings {
        let mut tgt_files: Vec<PathBuf> = match fs::read_dir(&self.settings_path) {
            Ok(entries) => entries
                .flatten()
                .map(|e| e.path())
                .filter(|p| {
                    p.extension()
                        .map(|e| e.eq_ignore_ascii_case("tgt"))
                        .unwrap_or(false)
                })
                .collect(),
            Err(_) => Vec::new(),
        };
        tgt_files.sort();

        let Some(path) = tgt_files.into_iter().next() else {
            return DeviceSettings::default();
        };

        match parse_settings_file(&path) {
            Ok(record) => record.to_device_settings(),
            Err(err) => {
                issues.push(ValidationIssue {
                    path,
                    kind: "parse_warning",
                    message: format!("could not parse settings dump: {err}"),
                    severity: Severity::Warning,
                });
                DeviceSettings::default()
            }
        }
    }
}

/// Groups one date directory's `.edf` files by their filename timestamp.
fn group_session_files(date_dir: &Path) -> BTreeMap<NaiveDateTime, BTreeMap<String, PathBuf>> {
    let mut groups: BTreeMap<NaiveDateTime, BTreeMap<String, PathBuf>> = BTreeMap::new();

    let entries = match fs::read_dir(date_dir) {
        Ok(entries) => entries,
        Err(_) => return groups,
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let is_edf = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("edf"))
            .unwrap_or(false);
        if !is_edf {
            continue;
        }

        let stem = match path.file_stem().and_then(|s| s.to_str()) {
            Some(stem) => stem,
            None => continue,
        };

        if let Some((start, kind)) = parse_filename_timestamp(stem) {
            if FILE_TYPES.contains(&kind.as_str()) {
                groups.entry(start).or_default().insert(kind, path);
            }
        }
    }

    groups
}

fn identify_device(
    root: &Path,
    summary: Option<&SummaryLog>,
    issues: &mut Vec<ValidationIssue>,
) -> Device {
    let serial_number = summary
        .and_then(|log| log.serial_number())
        .unwrap_or_else(|| "UNKNOWN".to_string());

    let id_path = root.join("Identification.tgt");
    let firmware_version = if id_path.exists() {
        match parse_identification_file(&id_path) {
            Ok(identification) => identification.software_version,
            Err(err) => {
                issues.push(ValidationIssue {
                    path: id_path,
                    kind: "parse_warning",
                    message: format!("could not parse identification file: {err}"),
                    severity: Severity::Warning,
                });
                None
            }
        }
    } else {
        None
    };

    Device {
        serial_number,
        model_name: "AirSense 10".to_string(),
        firmware_version,
    }
}

impl Session {
    /// Respiratory events for this session, decoded from the events
    /// file on first access. A missing or undecodable file yields an
    /// empty list.
    pub fn events(&mut self) -> &[Event] {
        let source = self.eve_file.clone();
        let start = self.start_time;
        self.events.ensure_loaded(|| load_events(source.as_deref(), start))
    }

    /// Resolved waveform channels for this session: the pressure/flow
    /// file (full-resolution one preferred) plus oximetry, decoded on
    /// first access.
    pub fn waveforms(&mut self) -> &[Waveform] {
        let pressure = self.brp_file.clone().or_else(|| self.pld_file.clone());
        let oximetry = self.sad_file.clone();
        let start = self.start_time;
        self.waveforms
            .ensure_loaded(|| load_waveforms(pressure.as_deref(), oximetry.as_deref(), start))
    }

    /// Cheyne-Stokes spans and summary key/value lines from the
    /// clinical-summary file, when present.
    pub fn clinical_summary(&self) -> (Vec<Event>, BTreeMap<String, String>) {
        let Some(path) = self.csl_file.as_deref() else {
            return (Vec::new(), BTreeMap::new());
        };
        match EdfFile::open(path) {
            Ok(file) => parse_csl_annotations(&read_annotations(&file), self.start_time),
            Err(err) => {
                log::warn!("{}: {err}", path.display());
                (Vec::new(), BTreeMap::new())
            }
        }
    }
}

fn load_events(path: Option<&Path>, start_time: NaiveDateTime) -> Vec<Event> {
    let Some(path) = path else {
        return Vec::new();
    };
    match EdfFile::open(path) {
        Ok(file) => classify_events(&read_annotations(&file), start_time),
        Err(err) => {
            log::warn!("{}: {err}", path.display());
            Vec::new()
        }
    }
}

fn load_waveforms(
    pressure: Option<&Path>,
    oximetry: Option<&Path>,
    start_time: NaiveDateTime,
) -> Vec<Waveform> {
    let mut waveforms = Vec::new();

    for path in [pressure, oximetry].into_iter().flatten() {
        match EdfFile::open(path) {
            Ok(file) => waveforms.extend(resolve_channels(&file, start_time)),
            Err(err) => log::warn!("{}: {err}", path.display()),
        }
    }

    waveforms
}
