use pretty_assertions::assert_eq;

use cpaplog::annotations::read_annotations;
use cpaplog::channels::resolve_channels;
use cpaplog::edf::EdfFile;
use cpaplog::events::classify_events;
use cpaplog::synth::EdfBuilder;
use cpaplog::EventKind;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn pressure_file_with_event_annotation_decodes_end_to_end() {
    init_logging();

    // One pressure signal plus the embedded annotation channel carrying
    // a single obstructive apnea marker.
    let bytes = EdfBuilder::new()
        .signal("Press.40ms", "cmH2O", (0.0, 25.0), (0, 32767), vec![0, 16384, 32767])
        .annotation_signal(32, vec![b"+12.5\x153.0\x14Obstructive Apnea\x14".to_vec()])
        .build();

    let file = EdfFile::parse(&bytes).unwrap();
    assert_eq!(file.start_datetime.to_string(), "2024-11-26 23:40:09");

    let waveforms = resolve_channels(&file, file.start_datetime);
    assert_eq!(waveforms.len(), 1);
    let pressure = &waveforms[0];
    assert_eq!(pressure.channel_name, "Mask Pressure");
    assert_eq!(pressure.unit, "cmH2O");
    assert_eq!(pressure.values[0], 0.0);
    assert!((pressure.values[1] - 12.5).abs() < 0.001);
    assert_eq!(pressure.values[2], 25.0);

    let annotations = read_annotations(&file);
    assert_eq!(annotations.len(), 1);
    assert_eq!(annotations[0].onset, 12.5);
    assert_eq!(annotations[0].duration, 3.0);

    let events = classify_events(&annotations, file.start_datetime);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, EventKind::ObstructiveApnea);
    assert_eq!(events[0].timestamp.to_string(), "2024-11-26 23:40:21.500");
    assert_eq!(events[0].duration, 3.0);
}

#[test]
fn corrupt_annotation_record_does_not_lose_later_records() {
    init_logging();

    let bytes = EdfBuilder::new()
        .data_records(2)
        .annotation_signal(
            32,
            vec![
                b"+ab\x14garbage".to_vec(),
                b"+0\x14\x14\x00+5.0\x152.0\x14Hypopnea\x14".to_vec(),
            ],
        )
        .build();

    let file = EdfFile::parse(&bytes).unwrap();
    let annotations = read_annotations(&file);
    assert_eq!(annotations.len(), 1);
    assert_eq!(annotations[0].onset, 5.0);
    assert_eq!(annotations[0].text, "Hypopnea");
}

#[test]
fn compliant_annotation_stream_needs_no_fallback() {
    init_logging();

    let bytes = EdfBuilder::new()
        .data_records(2)
        .annotation_signal(
            40,
            vec![
                b"+0\x14\x14\x00+12.5\x153.0\x14Obstructive Apnea\x14".to_vec(),
                b"+30\x14\x14\x00+45\x1510\x14Large Leak\x14".to_vec(),
            ],
        )
        .build();

    let file = EdfFile::parse(&bytes).unwrap();
    let annotations = read_annotations(&file);
    assert_eq!(annotations.len(), 2);

    let events = classify_events(&annotations, file.start_datetime);
    assert_eq!(events[0].kind, EventKind::ObstructiveApnea);
    assert_eq!(events[1].kind, EventKind::LargeLeak);
}

#[test]
fn annotation_only_files_have_no_resolvable_channels() {
    init_logging();

    let bytes = EdfBuilder::new()
        .annotation_signal(24, vec![b"+0\x14\x14".to_vec()])
        .build();

    let file = EdfFile::parse(&bytes).unwrap();
    assert!(resolve_channels(&file, file.start_datetime).is_empty());
    assert!(read_annotations(&file).is_empty());
}

#[test]
fn duplicate_channels_resolve_to_the_higher_resolution() {
    init_logging();

    // Leak at 0.5 Hz and 25 Hz; both map to "Leak Rate" and the L/s
    // variant is rescaled to L/min on resolution.
    let bytes = EdfBuilder::new()
        .record_duration(2.0)
        .signal("Leak.2s", "L/s", (-1.0, 1.0), (-32768, 32767), vec![0])
        .signal("Leak", "L/s", (-1.0, 1.0), (-32768, 32767), vec![16384; 50])
        .build();

    let file = EdfFile::parse(&bytes).unwrap();
    let waveforms = resolve_channels(&file, file.start_datetime);
    assert_eq!(waveforms.len(), 1);
    assert_eq!(waveforms[0].sample_rate, 25.0);
    assert_eq!(waveforms[0].unit, "L/min");
    // 0.5 L/s scales to 30 L/min, modulo the digital grid.
    assert!((waveforms[0].values[0] - 30.0).abs() < 0.01);
}
