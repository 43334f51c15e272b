use std::collections::BTreeMap;

use chrono::{Duration, NaiveDateTime};

use crate::annotations::Annotation;
use crate::types::{Event, EventKind};

/// Annotation text mapped to short event codes.
///
/// Iteration order is significant: the substring fallback accepts the
/// first entry whose key occurs in the annotation text, so this must be
/// an ordered slice, never a hash map.
pub static EVENT_CODES: &[(&str, &str)] = &[
    ("Obstructive Apnea", "OA"),
    ("Obstructive", "OA"),
    ("OA", "OA"),
    ("Central Apnea", "CA"),
    ("Central", "CA"),
    ("CA", "CA"),
    ("Hypopnea", "H"),
    ("H", "H"),
    ("Apnea", "A"),
    ("RERA", "RE"),
    ("Flow Limitation", "FL"),
    ("FL", "FL"),
    ("Vibratory Snore", "VS"),
    ("VS", "VS"),
    ("Periodic Breathing", "PB"),
    ("PB", "PB"),
    ("Cheyne-Stokes", "CSR"),
    ("CSR", "CSR"),
    ("Clear Airway", "CA"),
    ("Large Leak", "LL"),
    ("LL", "LL"),
];

fn duration_from_seconds(seconds: f64) -> Duration {
    Duration::milliseconds((seconds * 1000.0).round() as i64)
}

/// Finds the event code for a piece of annotation text: exact match on
/// the trimmed text first, then first-in-table-order substring match
/// with both sides lowercased.
pub fn event_code(text: &str) -> Option<&'static str> {
    let trimmed = text.trim();

    if let Some((_, code)) = EVENT_CODES.iter().find(|(key, _)| *key == trimmed) {
        return Some(*code);
    }

    let lowered = text.to_lowercase();
    EVENT_CODES
        .iter()
        .find(|(key, _)| lowered.contains(&key.to_lowercase()))
        .map(|(_, code)| *code)
}

/// Classifies one annotation into zero or one event.
///
/// Text that maps to no known code, or to a code outside the closed
/// event-kind set, is dropped silently: free-text annotations
/// legitimately include non-clinical markers.
pub fn classify_annotation(annotation: &Annotation, session_start: NaiveDateTime) -> Option<Event> {
    let code = event_code(&annotation.text)?;
    let kind = EventKind::from_code(code)?;

    let mut data = BTreeMap::new();
    data.insert("annotation".to_string(), annotation.text.clone());

    Some(Event {
        kind,
        timestamp: session_start + duration_from_seconds(annotation.onset),
        duration: annotation.duration,
        data,
    })
}

/// Classifies a whole annotation stream, dropping everything that does
/// not map onto the closed event-kind set.
pub fn classify_events(annotations: &[Annotation], session_start: NaiveDateTime) -> Vec<Event> {
    annotations
        .iter()
        .filter_map(|a| classify_annotation(a, session_start))
        .collect()
}

/// Decodes a clinical-summary annotation stream: Cheyne-Stokes spans and
/// `key: value` summary lines.
///
/// A "start"/"begin" annotation carrying the csr/cheyne keyword opens a
/// span; a later "end" annotation closes it into a single event spanning
/// between them. A start with no subsequent end produces no event.
/// Timekeeping annotations (empty, leading `+`, leading `Recording`) are
/// ignored.
pub fn parse_csl_annotations(
    annotations: &[Annotation],
    session_start: NaiveDateTime,
) -> (Vec<Event>, BTreeMap<String, String>) {
    let mut events = Vec::new();
    let mut summary = BTreeMap::new();
    let mut csr_start: Option<f64> = None;

    for annotation in annotations {
        let text = annotation.text.as_str();
        if text.is_empty() || text.starts_with('+') || text.starts_with("Recording") {
            continue;
        }

        let lowered = text.to_lowercase();
        if lowered.contains("csr") || lowered.contains("cheyne") {
            if lowered.contains("start") || lowered.contains("begin") {
                csr_start = Some(annotation.onset);
            } else if lowered.contains("end") {
                if let Some(onset) = csr_start.take() {
                    let mut data = BTreeMap::new();
                    data.insert(
                        "annotation".to_string(),
                        "Cheyne-Stokes Respiration".to_string(),
                    );
                    events.push(Event {
                        kind: EventKind::CheyneStokes,
                        timestamp: session_start + duration_from_seconds(onset),
                        duration: annotation.onset - onset,
                        data,
                    });
                }
            }
        }

        if text.contains(':') || text.contains('=') {
            let normalized = text.replace('=', ":");
            if let Some((key, value)) = normalized.split_once(':') {
                summary.insert(key.trim().to_string(), value.trim().to_string());
            }
        }
    }

    (events, summary)
}
