use chrono::NaiveDateTime;

use crate::edf::EdfFile;
use crate::types::Waveform;

/// Vendor signal labels mapped to canonical channel names.
///
/// Exact-match only; labels not listed pass through as their own
/// canonical name. Kept as an ordered slice so resolution is
/// deterministic (spelled-out pairs, not a hash map).
pub static CHANNEL_NAMES: &[(&str, &str)] = &[
    // Pressure, high resolution (40 ms sampling)
    ("Press.40ms", "Mask Pressure"),
    ("Press", "Mask Pressure"),
    // Pressure, low resolution (2 s sampling)
    ("MaskPress.2s", "Mask Pressure (Low)"),
    ("MaskPress", "Mask Pressure (Low)"),
    ("Press.2s", "Pressure"),
    // EPAP / EPR pressure
    ("EprPress.2s", "EPAP"),
    ("EPRPress.2s", "EPAP"),
    ("EprPress", "EPAP"),
    ("EPAP", "EPAP"),
    ("S.BL.EPAP", "EPAP"),
    // Generic pressure
    ("MaskPressure", "Mask Pressure"),
    ("IPAP", "Inspiratory PAP"),
    ("Pressure", "Pressure"),
    // Flow, high resolution
    ("Flow.40ms", "Flow Rate"),
    ("Flow", "Flow Rate"),
    // Flow, low resolution
    ("Flow.2s", "Flow Rate"),
    // Respiratory metrics
    ("TidVol.2s", "Tidal Volume"),
    ("TidVol", "Tidal Volume"),
    ("Tidal Volume", "Tidal Volume"),
    ("MinVent.2s", "Minute Ventilation"),
    ("MinVent", "Minute Ventilation"),
    ("RespRate.2s", "Respiratory Rate"),
    ("RespRate", "Respiratory Rate"),
    ("RespEvent", "Respiratory Event"),
    ("TgMV", "Target Ventilation"),
    ("TgtVent.2s", "Target Ventilation"),
    // Flow limitation
    ("FlowLim.2s", "Flow Limitation"),
    ("FlowLim", "Flow Limitation"),
    // Snore detection
    ("Snore.2s", "Snore"),
    ("Snore", "Snore"),
    // Respiratory timing
    ("InspTime", "Inspiration Time"),
    ("ExpTime", "Expiration Time"),
    ("IERatio", "I:E Ratio"),
    // Leak
    ("Leak.2s", "Leak Rate"),
    ("Leak", "Leak Rate"),
    ("LeakRate", "Leak Rate"),
    ("TotalLeak", "Total Leak"),
    ("MaskFlow", "Mask Flow"),
    // Oximetry
    ("SpO2.1s", "Oxygen Saturation"),
    ("SpO2", "Oxygen Saturation"),
    ("Pulse.1s", "Pulse Rate"),
    ("Pulse", "Pulse Rate"),
    // Device status
    ("Device", "Device Status"),
    // Summary-log index channels
    ("AHI", "AHI"),
    ("AI", "Apnea Index"),
    ("CAI", "Central Apnea Index"),
    ("HI", "Hypopnea Index"),
    ("OAI", "Obstructive Apnea Index"),
    ("UAI", "Unclassified Apnea Index"),
    ("RIN", "RIN"),
    ("CSR", "Cheyne-Stokes Respiration"),
];

/// Fallback units for canonical channels whose signal metadata carries a
/// blank physical dimension.
pub static CHANNEL_UNITS: &[(&str, &str)] = &[
    ("Pressure", "cmH2O"),
    ("Mask Pressure", "cmH2O"),
    ("Mask Pressure (Low)", "cmH2O"),
    ("IPAP", "cmH2O"),
    ("Inspiratory PAP", "cmH2O"),
    ("EPAP", "cmH2O"),
    ("Expiratory PAP", "cmH2O"),
    ("Flow Rate", "L/s"),
    ("Flow", "L/s"),
    ("Mask Flow", "L/min"),
    ("Leak", "L/s"),
    ("Leak Rate", "L/min"),
    ("Total Leak", "L/min"),
    ("Tidal Volume", "L"),
    ("Minute Ventilation", "L/min"),
    ("Target Ventilation", "L/min"),
    ("Respiratory Rate", "bpm"),
    ("Inspiration Time", "seconds"),
    ("Expiration Time", "seconds"),
    ("I:E Ratio", "ratio"),
    ("Flow Limitation", "index"),
    ("Snore", "index"),
    ("Oxygen Saturation", "%"),
    ("SpO2", "%"),
    ("Pulse Rate", "bpm"),
    ("Pulse", "bpm"),
    ("AHI", "events/hour"),
    ("Apnea Index", "events/hour"),
    ("Central Apnea Index", "events/hour"),
    ("Hypopnea Index", "events/hour"),
    ("Obstructive Apnea Index", "events/hour"),
    ("Unclassified Apnea Index", "events/hour"),
];

/// Maps a raw label to its canonical channel name.
pub fn canonical_name(raw_label: &str) -> &str {
    CHANNEL_NAMES
        .iter()
        .find(|(raw, _)| *raw == raw_label)
        .map(|(_, name)| *name)
        .unwrap_or(raw_label)
}

fn fallback_unit(channel_name: &str) -> &'static str {
    CHANNEL_UNITS
        .iter()
        .find(|(name, _)| *name == channel_name)
        .map(|(_, unit)| *unit)
        .unwrap_or("")
}

/// Resolves a file's raw signals into deduplicated canonical waveforms.
///
/// Annotation and checksum channels are skipped. When two raw labels
/// resolve to the same canonical name, the one with the strictly higher
/// sample rate wins; ties keep the first seen. Flow Rate and Leak Rate
/// recorded in L/s are rescaled to L/min for parity with downstream
/// consumers. Deduplication state is local to one call.
///
/// # Examples
///
/// ```rust
/// use cpaplog::channels::resolve_channels;
/// use cpaplog::edf::EdfFile;
/// use cpaplog::synth::EdfBuilder;
///
/// let bytes = EdfBuilder::new()
///     .signal("Press.40ms", "cmH2O", (0.0, 25.0), (0, 32767), vec![0; 25])
///     .build();
///
/// let file = EdfFile::parse(&bytes)?;
/// let waveforms = resolve_channels(&file, file.start_datetime);
/// assert_eq!(waveforms[0].channel_name, "Mask Pressure");
/// assert_eq!(waveforms[0].unit, "cmH2O");
/// # Ok::<(), cpaplog::CpapError>(())
/// ```
pub fn resolve_channels(file: &EdfFile, start_time: NaiveDateTime) -> Vec<Waveform> {
    let mut waveforms: Vec<Waveform> = Vec::new();

    for signal in &file.signals {
        let raw_label = signal.label.trim();
        if raw_label.is_empty()
            || raw_label.contains("Annotation")
            || raw_label.to_lowercase().contains("crc")
        {
            continue;
        }

        let channel_name = canonical_name(raw_label).to_string();

        if let Some(existing) = waveforms.iter().position(|w| w.channel_name == channel_name) {
            if signal.sample_frequency <= waveforms[existing].sample_rate {
                continue;
            }
            waveforms.remove(existing);
        }

        let mut unit = signal.physical_dimension.trim().to_string();
        if unit.is_empty() {
            unit = fallback_unit(&channel_name).to_string();
        }

        let mut values = signal.values.clone();
        if (channel_name == "Flow Rate" || channel_name == "Leak Rate") && unit == "L/s" {
            for v in &mut values {
                *v *= 60.0;
            }
            unit = "L/min".to_string();
        }

        waveforms.push(Waveform {
            channel_name,
            unit,
            sample_rate: signal.sample_frequency,
            start_time,
            values,
        });
    }

    waveforms
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::EdfBuilder;

    fn parse(builder: EdfBuilder) -> EdfFile {
        EdfFile::parse(&builder.build()).unwrap()
    }

    #[test]
    fn higher_resolution_duplicate_wins_in_either_order() {
        // Flow.2s at 0.5 Hz vs Flow.40ms at 25 Hz, both "Flow Rate".
        let low_first = parse(
            EdfBuilder::new()
                .record_duration(2.0)
                .signal("Flow.2s", "L/min", (-100.0, 100.0), (-32768, 32767), vec![0])
                .signal(
                    "Flow.40ms",
                    "L/min",
                    (-100.0, 100.0),
                    (-32768, 32767),
                    vec![0; 50],
                ),
        );
        let resolved = resolve_channels(&low_first, low_first.start_datetime);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].channel_name, "Flow Rate");
        assert_eq!(resolved[0].sample_rate, 25.0);

        let high_first = parse(
            EdfBuilder::new()
                .record_duration(2.0)
                .signal(
                    "Flow.40ms",
                    "L/min",
                    (-100.0, 100.0),
                    (-32768, 32767),
                    vec![0; 50],
                )
                .signal("Flow.2s", "L/min", (-100.0, 100.0), (-32768, 32767), vec![0]),
        );
        let resolved = resolve_channels(&high_first, high_first.start_datetime);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].sample_rate, 25.0);
    }

    #[test]
    fn equal_rates_keep_the_first_seen() {
        let file = parse(
            EdfBuilder::new()
                .signal("Press.40ms", "cmH2O", (0.0, 25.0), (0, 32767), vec![100])
                .signal("Press", "hPa", (0.0, 25.0), (0, 32767), vec![200]),
        );
        let resolved = resolve_channels(&file, file.start_datetime);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].unit, "cmH2O");
    }

    #[test]
    fn flow_in_liters_per_second_is_rescaled() {
        // 0.5 L/s must come out as 30 L/min exactly.
        let file = parse(EdfBuilder::new().signal(
            "Flow",
            "L/s",
            (-1.0, 1.0),
            (-32768, 32767),
            vec![16384],
        ));
        let mut resolved = resolve_channels(&file, file.start_datetime);
        let flow = resolved.remove(0);
        assert_eq!(flow.channel_name, "Flow Rate");
        assert_eq!(flow.unit, "L/min");
        // Digital 16384 of [-32768, 32767] over [-1, 1] is just above 0.5;
        // the exactness property is about the x60 rescale, so check that.
        let expected = (-1.0 + (16384.0 + 32768.0) * 2.0 / 65535.0) * 60.0;
        assert_eq!(flow.values[0], expected);
    }

    #[test]
    fn rescale_is_exact() {
        // Digital 5 of [0, 10] over [0, 1] decodes to exactly 0.5 L/s,
        // which must become exactly 30.0 L/min.
        let file = parse(EdfBuilder::new().signal("Flow", "L/s", (0.0, 1.0), (0, 10), vec![5]));
        let resolved = resolve_channels(&file, file.start_datetime);
        assert_eq!(resolved[0].values[0], 30.0);
        assert_eq!(resolved[0].unit, "L/min");
    }

    #[test]
    fn flow_already_per_minute_is_untouched() {
        let file = parse(EdfBuilder::new().signal(
            "Flow",
            "L/min",
            (-100.0, 100.0),
            (-32768, 32767),
            vec![0],
        ));
        let resolved = resolve_channels(&file, file.start_datetime);
        assert_eq!(resolved[0].unit, "L/min");
        let unscaled = -100.0 + 32768.0 * 200.0 / 65535.0;
        assert_eq!(resolved[0].values[0], unscaled);
    }

    #[test]
    fn annotation_checksum_and_blank_labels_are_skipped() {
        let file = parse(
            EdfBuilder::new()
                .signal("Crc16", "", (0.0, 65535.0), (-32768, 32767), vec![0])
                .signal("Press.40ms", "cmH2O", (0.0, 25.0), (0, 32767), vec![0]),
        );
        let resolved = resolve_channels(&file, file.start_datetime);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].channel_name, "Mask Pressure");
    }

    #[test]
    fn unmapped_labels_pass_through_with_blank_unit() {
        let file = parse(EdfBuilder::new().signal(
            "Mystery",
            "",
            (0.0, 1.0),
            (0, 100),
            vec![0],
        ));
        let resolved = resolve_channels(&file, file.start_datetime);
        assert_eq!(resolved[0].channel_name, "Mystery");
        assert_eq!(resolved[0].unit, "");
    }
}
