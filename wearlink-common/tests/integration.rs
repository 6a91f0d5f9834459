//! Integration tests for wearlink-common library.

use wearlink_common::{LoggingConfig, Reading, SensorKind, encode, parse_config, parse_frame};

#[test]
fn test_full_frame_workflow() {
    let readings = [
        Reading::heart_rate(72.0),
        Reading::acceleration(0.12, -9.81, 0.03),
        Reading::heart_rate(151.46),
        Reading::acceleration(-0.5, 0.25, 9.75),
    ];

    let mut stream = Vec::new();
    for (i, reading) in readings.iter().enumerate() {
        stream.extend_from_slice(encode(reading, 1_699_999_999_000 + i as i64).as_bytes());
    }

    let text = String::from_utf8(stream).expect("frames are UTF-8");
    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    assert_eq!(lines.len(), readings.len());

    for (i, (line, expected)) in lines.iter().zip(readings.iter()).enumerate() {
        let (decoded, ts) = parse_frame(line.as_bytes()).expect("parse failed");
        assert_eq!(ts, 1_699_999_999_000 + i as i64);
        assert_eq!(decoded.kind(), expected.kind());
    }
}

#[test]
fn test_heart_rate_precision_is_one_decimal() {
    for bpm in [40.0, 59.95, 72.04, 99.99, 180.55] {
        let frame = encode(&Reading::heart_rate(bpm), 7);
        let (decoded, _) = parse_frame(frame.as_bytes()).unwrap();

        let Reading::HeartRate { bpm: parsed } = decoded else {
            panic!("Expected heart rate frame");
        };
        assert!(
            (parsed - bpm).abs() <= 0.05 + 1e-9,
            "{} decoded as {}",
            bpm,
            parsed
        );

        let payload = frame.as_str().trim_start_matches("HR:");
        let value = payload.split(';').next().unwrap();
        assert_eq!(value.split('.').nth(1).map(str::len), Some(1));
    }
}

#[test]
fn test_acceleration_precision_is_two_decimals() {
    let frame = encode(&Reading::acceleration(1.0, -0.0049, 123.456), 9);
    let payload = frame.as_str().trim_start_matches("ACC:");
    let values = payload.split(';').next().unwrap();

    for value in values.split(',') {
        assert_eq!(value.split('.').nth(1).map(str::len), Some(2), "{}", value);
    }
}

#[test]
fn test_frames_never_contain_embedded_newlines() {
    let readings = [
        Reading::heart_rate(f64::MAX),
        Reading::acceleration(f64::MIN, 0.0, -0.0),
    ];

    for reading in readings {
        let frame = encode(&reading, i64::MAX);
        let newlines = frame.as_bytes().iter().filter(|b| **b == b'\n').count();
        assert_eq!(newlines, 1);
        assert!(frame.as_str().ends_with('\n'));
    }
}

#[test]
fn test_frame_prefix_matches_kind() {
    for kind in SensorKind::ALL {
        let reading = match kind {
            SensorKind::HeartRate => Reading::heart_rate(60.0),
            SensorKind::Accelerometer => Reading::acceleration(0.0, 0.0, 9.81),
        };
        let frame = encode(&reading, 0);
        assert!(frame.as_str().starts_with(&format!("{}:", kind.frame_prefix())));
    }
}

#[test]
fn test_logging_config_from_json5() {
    let config: LoggingConfig = parse_config(r#"{ level: "warn" }"#).unwrap();
    assert_eq!(config.level, "warn");
}
