use std::fs;

use chrono::{TimeZone, Utc};
use uas_geoint::klv::{checksum_16, tag, UNIVERSAL_KEY};
use uas_geoint::{GeoIntProcessor, GeoIntRequest, TelemetryFormat, TranscriptSegment};

fn field(field_tag: u8, value: &[u8]) -> Vec<u8> {
    let mut out = vec![field_tag, value.len() as u8];
    out.extend_from_slice(value);
    out
}

fn packet(lat_deg: f64, micros: u64) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend(field(tag::PRECISION_TIMESTAMP, &micros.to_be_bytes()));
    payload.extend(field(
        tag::SENSOR_LATITUDE,
        &((lat_deg / 90.0 * i32::MAX as f64).round() as i32).to_be_bytes(),
    ));
    payload.extend(field(
        tag::SENSOR_LONGITUDE,
        &((-117.0f64 / 180.0 * i32::MAX as f64).round() as i32).to_be_bytes(),
    ));
    payload.extend(field(
        tag::SENSOR_TRUE_ALTITUDE,
        &(((1500.0f64 + 900.0) / 19_900.0 * u16::MAX as f64).round() as u16).to_be_bytes(),
    ));
    payload.extend(field(
        tag::PLATFORM_HEADING,
        &((180.0f64 / 360.0 * u16::MAX as f64).round() as u16).to_be_bytes(),
    ));
    payload.extend(field(
        tag::PLATFORM_PITCH,
        &((-18.0f64 / 20.0 * i16::MAX as f64).round() as i16).to_be_bytes(),
    ));
    payload.extend_from_slice(&[tag::CHECKSUM, 2, 0, 0]);

    let mut out = UNIVERSAL_KEY.to_vec();
    out.push(payload.len() as u8);
    out.extend_from_slice(&payload);
    let sum = checksum_16(&out[..out.len() - 2]);
    let end = out.len();
    out[end - 2..].copy_from_slice(&sum.to_be_bytes());
    out
}

fn segment(center: f64) -> TranscriptSegment {
    TranscriptSegment {
        start: center - 0.5,
        end: center + 0.5,
        text: format!("observation at {center} seconds"),
        speaker: Some("P1".into()),
    }
}

#[test]
fn one_hertz_stream_enriches_segments_with_exact_samples() {
    let _ = env_logger::builder().is_test(true).try_init();

    let media_start = Utc.with_ymd_and_hms(2024, 6, 15, 14, 0, 0).unwrap();
    let base_micros = media_start.timestamp_micros() as u64;

    // 60 s of 1 Hz telemetry with linearly increasing latitude.
    let mut stream = Vec::new();
    for i in 0..60u64 {
        stream.extend(packet(35.0 + i as f64 * 0.001, base_micros + i * 1_000_000));
    }

    let segments = [segment(10.0), segment(30.0), segment(50.0)];
    let request = GeoIntRequest {
        klv: Some(&stream),
        subtitles: None,
        segments: &segments,
        media_start_utc: Some(media_start),
    };

    let processor = GeoIntProcessor::new();
    let result = processor.process(&request).expect("telemetry is present");

    assert_eq!(result.track.format, TelemetryFormat::Klv);
    assert_eq!(result.track.records.len(), 60);
    let klv_summary = result.summary.klv.as_ref().unwrap();
    assert_eq!(klv_summary.packets_accepted, 60);
    assert_eq!(result.summary.correlation.segments_enriched, 3);
    assert_eq!(result.summary.correlation.segments_unenriched, 0);

    // Sampling aligns with segment timing, so each segment must get the
    // sample at its center second, not an interpolation.
    for (event, second) in result.track.events.iter().zip([10.0f64, 30.0, 50.0]) {
        let geoint = event.geoint.as_ref().expect("segment within telemetry span");
        let expected_lat = 35.0 + second * 0.001;
        assert!(
            (geoint.sensor.lat - expected_lat).abs() < 1e-5,
            "segment at {second}: got {}, expected {expected_lat}",
            geoint.sensor.lat
        );
    }
}

#[test]
fn export_produces_byte_identical_files_on_rerun() {
    let _ = env_logger::builder().is_test(true).try_init();

    let media_start = Utc.with_ymd_and_hms(2024, 6, 15, 14, 0, 0).unwrap();
    let base_micros = media_start.timestamp_micros() as u64;
    let mut stream = Vec::new();
    for i in 0..30u64 {
        stream.extend(packet(35.0 + i as f64 * 0.001, base_micros + i * 1_000_000));
    }
    let segments = [segment(15.0)];
    let request = GeoIntRequest {
        klv: Some(&stream),
        subtitles: None,
        segments: &segments,
        media_start_utc: Some(media_start),
    };

    let out_dir = std::env::temp_dir().join(format!("uas-geoint-e2e-{}", std::process::id()));
    let processor = GeoIntProcessor::new();

    let output = processor
        .run(&request, &out_dir)
        .expect("export should succeed")
        .expect("telemetry is present");
    let kml_first = fs::read(&output.paths.kml).unwrap();
    let html_first = fs::read(&output.paths.html).unwrap();

    let output = processor.run(&request, &out_dir).unwrap().unwrap();
    let kml_second = fs::read(&output.paths.kml).unwrap();
    let html_second = fs::read(&output.paths.html).unwrap();

    assert_eq!(kml_first, kml_second);
    assert_eq!(html_first, html_second);

    let kml_text = String::from_utf8(kml_first).unwrap();
    assert!(kml_text.contains("<name>Flight path</name>"));
    assert!(kml_text.contains("observation at 15 seconds"));

    let _ = fs::remove_dir_all(&out_dir);
}

#[test]
fn garbage_inputs_are_a_quiet_no_op() {
    let _ = env_logger::builder().is_test(true).try_init();

    let segments = [segment(5.0)];
    let request = GeoIntRequest {
        klv: Some(&[0xDE, 0xAD, 0xBE, 0xEF]),
        subtitles: Some("not a subtitle file at all"),
        segments: &segments,
        media_start_utc: None,
    };
    assert!(GeoIntProcessor::new().process(&request).is_none());
}
