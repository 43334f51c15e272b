use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::{CpapError, Result};
use crate::types::{CpapMode, DeviceSettings};

/// Settings-dump key spellings mapped to canonical setting names, as
/// they appear in the plain-text configuration files.
pub static SETTINGS_KEYS: &[(&str, &str)] = &[
    // Device identification
    ("#IMF", "software_version"),
    ("#VIR", "internal_version"),
    ("#RIR", "release_version"),
    ("#PVR", "platform_version"),
    ("#PVD", "platform_variant"),
    // Therapy mode
    ("Mode", "mode"),
    ("S.Mode", "mode"),
    // Pressure settings
    ("Press", "pressure"),
    ("S.C.Press", "pressure"),
    ("S.C.StartPress", "start_pressure"),
    ("S.AS.MaxPress", "pressure_max"),
    ("S.AS.MinPress", "pressure_min"),
    ("MaxPress", "pressure_max"),
    ("MinPress", "pressure_min"),
    // EPR settings
    ("S.EPR.ClinEnable", "epr_clinical_enable"),
    ("S.EPR.EPREnable", "epr_enable"),
    ("S.EPR.Level", "epr_level"),
    ("S.EPR.EPRType", "epr_type"),
    // Ramp settings
    ("S.RampEnable", "ramp_enable"),
    ("S.RampTime", "ramp_time"),
    ("RampTime", "ramp_time"),
    // Mask and comfort
    ("S.Mask", "mask_type"),
    ("Mask", "mask_type"),
    ("S.SmartStart", "smart_start"),
    ("SmartStart", "smart_start"),
    ("S.Tube", "tube_type"),
    ("TubeType", "tube_type"),
    ("S.ABFilter", "antibacterial_filter"),
    // Humidifier
    ("S.HumEnable", "humidifier_enable"),
    ("S.HumLevel", "humidifier_level"),
    ("HumLevel", "humidifier_level"),
    ("S.TempEnable", "temperature_enable"),
    ("S.Temp", "temperature"),
    ("S.ClimateControl", "climate_control"),
    ("ClimateControl", "climate_control"),
    // Access
    ("S.PtAccess", "patient_access"),
    ("PtAccess", "patient_access"),
    // AutoSet settings
    ("S.AS.Comfort", "autoset_comfort"),
    ("Response", "autoset_response"),
];

/// The same vendor spellings as carried by the summary log's settings
/// rows, mapped to `_raw`-suffixed canonical names. The summary log
/// stores these fields in device-internal encodings (deci-units,
/// bit-packed enumerations) that need the raw decode rules; the text
/// dumps store the same keys in different units, so the two tables are
/// deliberately kept separate per call-site.
pub static RAW_SETTINGS_KEYS: &[(&str, &str)] = &[
    ("Mode", "mode_raw"),
    ("S.Mode", "mode_raw"),
    ("Press", "pressure_raw"),
    ("S.C.Press", "pressure_raw"),
    ("S.C.StartPress", "start_pressure_raw"),
    ("S.AS.MaxPress", "pressure_max_raw"),
    ("S.AS.MinPress", "pressure_min_raw"),
    ("MaxPress", "pressure_max_raw"),
    ("MinPress", "pressure_min_raw"),
    ("S.EPR.ClinEnable", "epr_clinical_enable"),
    ("S.EPR.EPREnable", "epr_enable"),
    ("S.EPR.Level", "epr_level_raw"),
    ("S.EPR.EPRType", "epr_type_raw"),
    ("S.RampEnable", "ramp_enable"),
    ("S.RampTime", "ramp_time"),
    ("RampTime", "ramp_time"),
    ("S.Mask", "mask_type_raw"),
    ("Mask", "mask_type_raw"),
    ("S.SmartStart", "smart_start"),
    ("SmartStart", "smart_start"),
    ("S.Tube", "tube_type_raw"),
    ("TubeType", "tube_type_raw"),
    ("S.ABFilter", "antibacterial_filter"),
    ("S.HumEnable", "humidifier_enable"),
    ("S.HumLevel", "humidifier_level"),
    ("HumLevel", "humidifier_level"),
    ("S.TempEnable", "temperature_enable"),
    ("S.Temp", "temperature_raw"),
    ("S.ClimateControl", "climate_control"),
    ("ClimateControl", "climate_control"),
    ("S.PtAccess", "patient_access"),
    ("PtAccess", "patient_access"),
    ("S.AS.Comfort", "autoset_comfort"),
    ("Response", "response_raw"),
];

/// Numeric mode codes as used by the text dumps.
pub static MODE_VALUES: &[(i64, &str)] = &[
    (0, "CPAP"),
    (1, "APAP"),
    (2, "BiLevel-T"),
    (3, "BiLevel-S"),
    (4, "BiLevel-S/T"),
    (5, "BiLevel-T"),
    (6, "VPAPauto"),
    (7, "ASV"),
    (8, "ASVAuto"),
    (9, "iVAPS"),
    (10, "PAC"),
    (11, "Auto for Her"),
    (16, "Unknown"),
];

/// Mask codes as used by the text dumps.
///
/// Note the numbering disagrees with [`RAW_MASK_VALUES`]; the source
/// data is contradictory here and both tables are preserved verbatim at
/// their own call sites rather than unified.
pub static MASK_VALUES: &[(i64, &str)] = &[
    (0, "Nasal"),
    (1, "Pillows"),
    (2, "Full Face"),
    (3, "Unknown"),
];

pub static EPR_TYPE_VALUES: &[(i64, &str)] = &[(0, "Off"), (1, "Ramp Only"), (2, "Full Time")];

pub static CLIMATE_CONTROL_VALUES: &[(i64, &str)] = &[(0, "Off"), (1, "Manual"), (2, "Auto")];

/// Mode codes as stored in the summary log's settings rows.
pub static RAW_MODE_VALUES: &[(i64, &str)] = &[(0, "CPAP"), (1, "APAP")];

/// Mask codes as stored in the summary log's settings rows. Inverted
/// relative to [`MASK_VALUES`]; see that table's note.
pub static RAW_MASK_VALUES: &[(i64, &str)] = &[(0, "Full Face"), (1, "Nasal"), (2, "Pillows")];

pub static RAW_EPR_TYPE_VALUES: &[(i64, &str)] = &[(1, "Ramp Only"), (2, "Full Time")];

pub static RAW_RESPONSE_VALUES: &[(i64, &str)] = &[(0, "Standard"), (1, "Soft"), (2, "For Her")];

fn enum_name(table: &'static [(i64, &'static str)], code: i64) -> &'static str {
    table
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
        .unwrap_or("Unknown")
}

/// Classification of one raw value token, before any key-specific rule.
///
/// The precedence is load-bearing and matches the canonical fixtures:
/// hex-looking-but-not-purely-decimal tokens go base-16 first, then a
/// decimal point selects float, then base-10, then base-16 as a last
/// numeric resort. A token like `10` is therefore always decimal ten.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Int(i64),
    Float(f64),
    Hex(i64),
    Text(String),
}

impl ScalarValue {
    fn as_i64(&self) -> Option<i64> {
        match self {
            ScalarValue::Int(v) | ScalarValue::Hex(v) => Some(*v),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            ScalarValue::Int(v) | ScalarValue::Hex(v) => Some(*v as f64),
            ScalarValue::Float(v) => Some(*v),
            ScalarValue::Text(_) => None,
        }
    }

    fn truthy(&self) -> bool {
        match self {
            ScalarValue::Int(v) | ScalarValue::Hex(v) => *v != 0,
            ScalarValue::Float(v) => *v != 0.0,
            ScalarValue::Text(s) => !s.is_empty(),
        }
    }
}

/// Classifies a raw value token into its tagged variant.
pub fn classify_value(token: &str) -> ScalarValue {
    let t = token.trim();

    if let Some(rest) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        if let Ok(v) = i64::from_str_radix(rest, 16) {
            return ScalarValue::Hex(v);
        }
    }

    let all_hex = !t.is_empty() && t.chars().all(|c| c.is_ascii_hexdigit());
    let all_decimal = !t.is_empty() && t.chars().all(|c| c.is_ascii_digit());
    if all_hex && !all_decimal {
        if let Ok(v) = i64::from_str_radix(t, 16) {
            return ScalarValue::Hex(v);
        }
    }

    if t.contains('.') {
        if let Ok(v) = t.parse::<f64>() {
            return ScalarValue::Float(v);
        }
        return ScalarValue::Text(t.to_string());
    }

    if let Ok(v) = t.parse::<i64>() {
        return ScalarValue::Int(v);
    }
    if let Ok(v) = i64::from_str_radix(t, 16) {
        return ScalarValue::Hex(v);
    }

    ScalarValue::Text(t.to_string())
}

/// A decoded setting value.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl SettingValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SettingValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SettingValue::Float(v) => Some(*v),
            SettingValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            SettingValue::Text(s) => Some(s),
            _ => None,
        }
    }

    fn display_string(&self) -> String {
        match self {
            SettingValue::Bool(v) => v.to_string(),
            SettingValue::Int(v) => v.to_string(),
            SettingValue::Float(v) => v.to_string(),
            SettingValue::Text(s) => s.clone(),
        }
    }
}

fn scalar_to_setting(value: ScalarValue) -> SettingValue {
    match value {
        ScalarValue::Int(v) | ScalarValue::Hex(v) => SettingValue::Int(v),
        ScalarValue::Float(v) => SettingValue::Float(v),
        ScalarValue::Text(s) => SettingValue::Text(s),
    }
}

/// Canonical setting names mapped to decoded values, built up
/// incrementally by one decode pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsRecord {
    values: BTreeMap<String, SettingValue>,
}

impl SettingsRecord {
    pub fn get(&self, name: &str) -> Option<&SettingValue> {
        self.values.get(name)
    }

    pub fn set(&mut self, name: &str, value: SettingValue) {
        self.values.insert(name.to_string(), value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SettingValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Converts the record into the typed device-settings struct.
    pub fn to_device_settings(&self) -> DeviceSettings {
        let text = |name: &str| {
            self.get(name)
                .and_then(|v| v.as_text())
                .map(|s| s.to_string())
        };
        let float = |name: &str| self.get(name).and_then(|v| v.as_f64());
        let int = |name: &str| self.get(name).and_then(|v| v.as_i64());
        let boolean = |name: &str| self.get(name).and_then(|v| v.as_bool());

        DeviceSettings {
            mode: text("mode").as_deref().and_then(CpapMode::from_name),
            pressure: float("pressure"),
            pressure_min: float("pressure_min"),
            pressure_max: float("pressure_max"),
            ramp_start_pressure: float("start_pressure"),
            epr_enabled: boolean("epr_enable"),
            epr_level: int("epr_level"),
            epr_type: text("epr_type"),
            ramp_enabled: boolean("ramp_enable"),
            ramp_time: int("ramp_time"),
            smart_start: boolean("smart_start"),
            mask_type: text("mask_type"),
            tube_type: text("tube_type"),
            antibacterial_filter: boolean("antibacterial_filter"),
            humidifier_enabled: boolean("humidifier_enable"),
            humidifier_level: int("humidifier_level"),
            climate_control: text("climate_control"),
            temperature_enabled: boolean("temperature_enable"),
            temperature: float("temperature"),
            response: text("autoset_response"),
            patient_access_enabled: boolean("patient_access"),
        }
    }
}

/// Splits a plain-text settings dump into raw key/value pairs.
///
/// Lines are whitespace-separated two-token records; the key may carry a
/// `#` prefix (kept, the key tables know it). Blank lines and lines
/// without a value token are skipped.
pub fn parse_settings_text(text: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut split = line.splitn(2, char::is_whitespace);
        let key = match split.next() {
            Some(k) => k,
            None => continue,
        };
        let value = split.next().map(str::trim).unwrap_or("");
        if value.is_empty() {
            continue;
        }

        pairs.push((key.to_string(), value.to_string()));
    }

    pairs
}

fn lookup(table: &'static [(&'static str, &'static str)], key: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(raw, _)| *raw == key)
        .map(|(_, name)| *name)
}

/// Decodes pairs from a plain-text settings dump.
pub fn decode_text_settings<I>(pairs: I) -> SettingsRecord
where
    I: IntoIterator<Item = (String, String)>,
{
    decode_with_table(pairs, SETTINGS_KEYS)
}

/// Decodes settings rows lifted from the summary log, which carry the
/// device-internal raw encodings.
pub fn decode_raw_settings<I>(pairs: I) -> SettingsRecord
where
    I: IntoIterator<Item = (String, String)>,
{
    decode_with_table(pairs, RAW_SETTINGS_KEYS)
}

fn decode_with_table<I>(pairs: I, table: &'static [(&'static str, &'static str)]) -> SettingsRecord
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut record = SettingsRecord::default();
    let mut raw_temperature_seen = false;
    let mut explicit_temperature_flag = false;

    for (key, token) in pairs {
        // Unmapped keys pass through as their own canonical name.
        let name = lookup(table, &key)
            .map(str::to_string)
            .unwrap_or_else(|| key.clone());

        if name == "temperature_raw" {
            raw_temperature_seen = true;
        }
        if name == "temperature_enable" {
            explicit_temperature_flag = true;
        }

        apply_setting(&mut record, &name, classify_value(&token));
    }

    // Derived flags override direct assignments regardless of the order
    // the pairs arrived in.
    if let Some(SettingValue::Int(level)) = record.get("humidifier_level").cloned() {
        if level > 0 {
            record.set("humidifier_enable", SettingValue::Bool(true));
        }
    }
    if raw_temperature_seen && !explicit_temperature_flag {
        record.set("temperature_enable", SettingValue::Bool(true));
    }

    record
}

/// Applies the key-specific decode rule for one canonical name.
///
/// A value whose numeric parse failed entirely is retained as its raw
/// string rather than dropped; a single bad token never aborts a pass.
fn apply_setting(record: &mut SettingsRecord, name: &str, value: ScalarValue) {
    match name {
        // Pressure family: the summary log stores deci-units, the text
        // dumps centi-units.
        "pressure_raw" | "pressure_min_raw" | "pressure_max_raw" | "start_pressure_raw" => {
            match value.as_f64() {
                Some(v) => record.set(
                    name.trim_end_matches("_raw"),
                    SettingValue::Float(v / 10.0),
                ),
                None => record.set(name, scalar_to_setting(value)),
            }
        }
        "pressure" | "pressure_min" | "pressure_max" | "start_pressure" => match value.as_f64() {
            Some(v) => record.set(name, SettingValue::Float(v / 100.0)),
            None => record.set(name, scalar_to_setting(value)),
        },

        "epr_level_raw" => match value.as_i64() {
            Some(v) => record.set("epr_level", SettingValue::Int(v & 0x03)),
            None => record.set(name, scalar_to_setting(value)),
        },
        "epr_level" | "ramp_time" | "humidifier_level" => match value.as_i64() {
            Some(v) => record.set(name, SettingValue::Int(v)),
            None => record.set(name, scalar_to_setting(value)),
        },

        "epr_type_raw" => match value.as_i64() {
            Some(v) => record.set(
                "epr_type",
                SettingValue::Text(enum_name(RAW_EPR_TYPE_VALUES, v).to_string()),
            ),
            None => record.set(name, scalar_to_setting(value)),
        },
        "epr_type" => match value.as_i64() {
            Some(v) => record.set(
                name,
                SettingValue::Text(enum_name(EPR_TYPE_VALUES, v).to_string()),
            ),
            None => record.set(name, scalar_to_setting(value)),
        },

        "mode_raw" => match value.as_i64() {
            Some(v) => record.set(
                "mode",
                SettingValue::Text(enum_name(RAW_MODE_VALUES, v).to_string()),
            ),
            None => record.set(name, scalar_to_setting(value)),
        },
        "mode" => match value.as_i64() {
            Some(v) => record.set(
                name,
                SettingValue::Text(enum_name(MODE_VALUES, v).to_string()),
            ),
            None => record.set(name, scalar_to_setting(value)),
        },

        "response_raw" => match value.as_i64() {
            Some(v) => record.set(
                "autoset_response",
                SettingValue::Text(enum_name(RAW_RESPONSE_VALUES, v).to_string()),
            ),
            None => record.set(name, scalar_to_setting(value)),
        },

        "mask_type_raw" => match value.as_i64() {
            Some(v) => record.set(
                "mask_type",
                SettingValue::Text(enum_name(RAW_MASK_VALUES, v).to_string()),
            ),
            None => record.set(name, scalar_to_setting(value)),
        },
        "mask_type" => match value.as_i64() {
            Some(v) => record.set(
                name,
                SettingValue::Text(enum_name(MASK_VALUES, v).to_string()),
            ),
            None => record.set(name, scalar_to_setting(value)),
        },

        "tube_type_raw" => match value.as_i64() {
            Some(0) => record.set("tube_type", SettingValue::Text("SlimLine".to_string())),
            Some(_) => record.set("tube_type", SettingValue::Text("Standard".to_string())),
            None => record.set(name, scalar_to_setting(value)),
        },

        "temperature_raw" => match value.as_f64() {
            Some(v) => record.set("temperature", SettingValue::Float(v / 10.0)),
            None => record.set(name, scalar_to_setting(value)),
        },

        "climate_control" => match value.as_i64() {
            Some(v) => record.set(
                name,
                SettingValue::Text(enum_name(CLIMATE_CONTROL_VALUES, v).to_string()),
            ),
            None => record.set(name, scalar_to_setting(value)),
        },

        "epr_enable" | "epr_clinical_enable" | "ramp_enable" | "humidifier_enable"
        | "temperature_enable" | "smart_start" | "antibacterial_filter" | "patient_access"
        | "humidifier_enabled" => {
            let flag = value.truthy();
            let name = if name == "humidifier_enabled" {
                "humidifier_enable"
            } else {
                name
            };
            record.set(name, SettingValue::Bool(flag));
        }

        _ => record.set(name, scalar_to_setting(value)),
    }
}

/// Reads and decodes one plain-text settings dump.
pub fn parse_settings_file<P: AsRef<Path>>(path: P) -> Result<SettingsRecord> {
    let bytes = fs::read(&path)
        .map_err(|e| CpapError::FileNotFound(format!("{}: {}", path.as_ref().display(), e)))?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(decode_text_settings(parse_settings_text(&text)))
}

/// Device firmware fields carried by the identification dump.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceIdentification {
    pub software_version: Option<String>,
    pub internal_version: Option<String>,
    pub release_version: Option<String>,
    pub platform_version: Option<String>,
    pub platform_variant: Option<String>,
}

/// Parses `Identification.tgt` for the device firmware fields.
pub fn parse_identification_file<P: AsRef<Path>>(path: P) -> Result<DeviceIdentification> {
    let record = parse_settings_file(path)?;
    let field = |name: &str| record.get(name).map(SettingValue::display_string);

    Ok(DeviceIdentification {
        software_version: field("software_version"),
        internal_version: field("internal_version"),
        release_version: field("release_version"),
        platform_version: field("platform_version"),
        platform_variant: field("platform_variant"),
    })
}

/// Clinical safety bounds for therapy settings.
#[derive(Debug, Clone, Copy)]
pub struct ClinicalLimits {
    pub pressure_min: f64,
    pub pressure_max: f64,
    pub epr_level_max: i64,
    pub ramp_time_max: i64,
    pub humidifier_level_max: i64,
}

pub static CLINICAL_LIMITS: ClinicalLimits = ClinicalLimits {
    pressure_min: 4.0,
    pressure_max: 20.0,
    epr_level_max: 3,
    ramp_time_max: 45,
    humidifier_level_max: 8,
};

/// Thin advisory pass over a decoded settings struct: returns one
/// warning per value outside the clinical limits. Empty means nothing
/// flagged.
pub fn check_clinical_limits(settings: &DeviceSettings) -> Vec<String> {
    let limits = &CLINICAL_LIMITS;
    let mut warnings = Vec::new();

    let pressures = [
        ("pressure", settings.pressure),
        ("pressure_min", settings.pressure_min),
        ("pressure_max", settings.pressure_max),
    ];
    for (name, value) in pressures {
        if let Some(v) = value {
            if v < limits.pressure_min || v > limits.pressure_max {
                warnings.push(format!(
                    "{name} {v} cmH2O outside clinical range {}-{} cmH2O",
                    limits.pressure_min, limits.pressure_max
                ));
            }
        }
    }

    if let Some(level) = settings.epr_level {
        if level > limits.epr_level_max {
            warnings.push(format!(
                "EPR level {level} exceeds maximum {}",
                limits.epr_level_max
            ));
        }
    }

    if let Some(minutes) = settings.ramp_time {
        if minutes > limits.ramp_time_max {
            warnings.push(format!(
                "ramp time {minutes} min exceeds maximum {} min",
                limits.ramp_time_max
            ));
        }
    }

    if let Some(level) = settings.humidifier_level {
        if level > limits.humidifier_level_max {
            warnings.push(format!(
                "humidifier level {level} exceeds maximum {}",
                limits.humidifier_level_max
            ));
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn classification_precedence() {
        assert_eq!(classify_value("10"), ScalarValue::Int(10));
        assert_eq!(classify_value("1A"), ScalarValue::Hex(0x1A));
        assert_eq!(classify_value("deadbeef"), ScalarValue::Hex(0xdeadbeef));
        assert_eq!(classify_value("2.5"), ScalarValue::Float(2.5));
        assert_eq!(classify_value("0x1A"), ScalarValue::Hex(0x1A));
        assert_eq!(classify_value("-3"), ScalarValue::Int(-3));
        assert_eq!(
            classify_value("AutoSet"),
            ScalarValue::Text("AutoSet".to_string())
        );
    }

    #[test]
    fn classification_is_idempotent() {
        for token in ["10", "1A", "2.5", "word"] {
            assert_eq!(classify_value(token), classify_value(token));
        }
    }

    #[test]
    fn text_lines_split_and_skip() {
        let text = "#IMF 0149\n\nS.C.Press 900\nLoneKey\n  S.Mode  1  \n";
        let pairs = parse_settings_text(text);
        assert_eq!(
            pairs,
            vec![
                ("#IMF".to_string(), "0149".to_string()),
                ("S.C.Press".to_string(), "900".to_string()),
                ("S.Mode".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn text_pressures_are_centi_units() {
        let record = decode_text_settings(pairs(&[("S.C.Press", "900")]));
        assert_eq!(record.get("pressure"), Some(&SettingValue::Float(9.0)));
    }

    #[test]
    fn raw_pressures_are_deci_units() {
        let record = decode_raw_settings(pairs(&[("S.C.Press", "90")]));
        assert_eq!(record.get("pressure"), Some(&SettingValue::Float(9.0)));
    }

    #[test]
    fn epr_level_raw_is_masked() {
        let record = decode_raw_settings(pairs(&[("S.EPR.Level", "7")]));
        assert_eq!(record.get("epr_level"), Some(&SettingValue::Int(3)));
    }

    #[test]
    fn raw_mode_and_epr_type_decode() {
        let record = decode_raw_settings(pairs(&[("Mode", "1"), ("S.EPR.EPRType", "2")]));
        assert_eq!(
            record.get("mode"),
            Some(&SettingValue::Text("APAP".to_string()))
        );
        assert_eq!(
            record.get("epr_type"),
            Some(&SettingValue::Text("Full Time".to_string()))
        );
    }

    #[test]
    fn mask_tables_disagree_and_both_are_kept() {
        let raw = decode_raw_settings(pairs(&[("S.Mask", "0")]));
        assert_eq!(
            raw.get("mask_type"),
            Some(&SettingValue::Text("Full Face".to_string()))
        );

        let text = decode_text_settings(pairs(&[("S.Mask", "0")]));
        assert_eq!(
            text.get("mask_type"),
            Some(&SettingValue::Text("Nasal".to_string()))
        );
    }

    #[test]
    fn tube_type_raw_decodes() {
        let record = decode_raw_settings(pairs(&[("S.Tube", "0")]));
        assert_eq!(
            record.get("tube_type"),
            Some(&SettingValue::Text("SlimLine".to_string()))
        );
        let record = decode_raw_settings(pairs(&[("S.Tube", "3")]));
        assert_eq!(
            record.get("tube_type"),
            Some(&SettingValue::Text("Standard".to_string()))
        );
    }

    #[test]
    fn raw_temperature_implies_enabled() {
        let record = decode_raw_settings(pairs(&[("S.Temp", "270")]));
        assert_eq!(record.get("temperature"), Some(&SettingValue::Float(27.0)));
        assert_eq!(
            record.get("temperature_enable"),
            Some(&SettingValue::Bool(true))
        );

        // An explicit flag anywhere in the pass wins over the implication.
        let record = decode_raw_settings(pairs(&[("S.Temp", "270"), ("S.TempEnable", "0")]));
        assert_eq!(
            record.get("temperature_enable"),
            Some(&SettingValue::Bool(false))
        );
    }

    #[test]
    fn humidifier_level_overrides_explicit_disable_in_both_orders() {
        let forward = decode_text_settings(pairs(&[
            ("S.HumEnable", "0"),
            ("S.HumLevel", "5"),
        ]));
        assert_eq!(
            forward.get("humidifier_enable"),
            Some(&SettingValue::Bool(true))
        );

        let reverse = decode_text_settings(pairs(&[
            ("S.HumLevel", "5"),
            ("S.HumEnable", "0"),
        ]));
        assert_eq!(
            reverse.get("humidifier_enable"),
            Some(&SettingValue::Bool(true))
        );

        // Level zero leaves an explicit disable untouched.
        let off = decode_text_settings(pairs(&[("S.HumEnable", "0"), ("S.HumLevel", "0")]));
        assert_eq!(
            off.get("humidifier_enable"),
            Some(&SettingValue::Bool(false))
        );
    }

    #[test]
    fn decoding_the_same_pair_twice_is_stable() {
        let once = decode_text_settings(pairs(&[("S.C.Press", "900")]));
        let twice = decode_text_settings(pairs(&[("S.C.Press", "900"), ("S.C.Press", "900")]));
        assert_eq!(once, twice);
    }

    #[test]
    fn malformed_value_is_kept_as_raw_string() {
        let record = decode_text_settings(pairs(&[("S.RampTime", "soon-ish!")]));
        assert_eq!(
            record.get("ramp_time"),
            Some(&SettingValue::Text("soon-ish!".to_string()))
        );
    }

    #[test]
    fn typed_settings_struct() {
        let record = decode_text_settings(pairs(&[
            ("S.Mode", "1"),
            ("S.AS.MinPress", "500"),
            ("S.AS.MaxPress", "1520"),
            ("S.EPR.EPREnable", "1"),
            ("S.EPR.Level", "2"),
            ("S.RampTime", "20"),
            ("S.HumLevel", "4"),
        ]));
        let settings = record.to_device_settings();
        assert_eq!(settings.mode, Some(CpapMode::Apap));
        assert_eq!(settings.pressure_min, Some(5.0));
        assert_eq!(settings.pressure_max, Some(15.2));
        assert_eq!(settings.epr_enabled, Some(true));
        assert_eq!(settings.epr_level, Some(2));
        assert_eq!(settings.ramp_time, Some(20));
        assert_eq!(settings.humidifier_enabled, Some(true));
        assert_eq!(settings.humidifier_level, Some(4));
    }

    #[test]
    fn clinical_limit_advisories() {
        let mut settings = DeviceSettings::default();
        settings.pressure_max = Some(22.0);
        settings.epr_level = Some(4);
        let warnings = check_clinical_limits(&settings);
        assert_eq!(warnings.len(), 2);

        settings.pressure_max = Some(15.0);
        settings.epr_level = Some(3);
        assert!(check_clinical_limits(&settings).is_empty());
    }
}
