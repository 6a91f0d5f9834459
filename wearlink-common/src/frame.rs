//! Line-oriented wire format.
//!
//! ```text
//! HR:<bpm, 1 decimal>;<epoch millis>\n
//! ACC:<x>,<y>,<z, 2 decimals each>;<epoch millis>\n
//! ```
//!
//! Values are rounded half-up (ties away from zero) starting from their
//! shortest decimal representation, so `72.25` goes out as `72.3` and `1.005`
//! as `1.01`. The decimal separator is always `.`.

use std::fmt::Write as _;

use thiserror::Error;

use crate::reading::{Reading, SensorKind, Timestamp};

/// Errors returned when parsing a frame.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame is not newline terminated")]
    Unterminated,

    #[error("frame is not valid UTF-8")]
    Utf8,

    #[error("malformed frame: {0}")]
    Malformed(&'static str),

    #[error("unknown frame prefix '{0}'")]
    UnknownPrefix(String),

    #[error("expected {expected} values, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("invalid number '{0}'")]
    Number(String),
}

/// One encoded reading, ready to be written to a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame(String);

impl Frame {
    /// Raw bytes of the frame, including the trailing newline.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// The frame as text, including the trailing newline.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0.trim_end_matches('\n'))
    }
}

/// Encode a reading stamped with `now`.
pub fn encode(reading: &Reading, now: Timestamp) -> Frame {
    let mut line = String::with_capacity(40);
    // Writing into a String cannot fail.
    let _ = match reading {
        Reading::HeartRate { bpm } => writeln!(line, "HR:{};{}", fixed(*bpm, 1), now),
        Reading::Acceleration { x, y, z } => writeln!(
            line,
            "ACC:{},{},{};{}",
            fixed(*x, 2),
            fixed(*y, 2),
            fixed(*z, 2),
            now
        ),
    };
    Frame(line)
}

/// Format `value` with `places` decimals, rounding ties away from zero.
fn fixed(value: f64, places: usize) -> String {
    if !value.is_finite() {
        return format!("{:.*}", places, value);
    }

    // Display never uses exponent notation for f64.
    let repr = value.abs().to_string();
    let (int_part, frac_part) = repr.split_once('.').unwrap_or((repr.as_str(), ""));

    let mut digits: Vec<u8> = int_part
        .bytes()
        .chain(frac_part.bytes().chain(std::iter::repeat(b'0')).take(places))
        .collect();

    if frac_part.as_bytes().get(places).is_some_and(|d| *d >= b'5') {
        let mut i = digits.len();
        loop {
            if i == 0 {
                digits.insert(0, b'1');
                break;
            }
            i -= 1;
            if digits[i] == b'9' {
                digits[i] = b'0';
            } else {
                digits[i] += 1;
                break;
            }
        }
    }

    let split = digits.len() - places;
    let mut out = String::with_capacity(digits.len() + 2);
    if value.is_sign_negative() {
        out.push('-');
    }
    out.extend(digits[..split].iter().map(|&d| char::from(d)));
    if places > 0 {
        out.push('.');
        out.extend(digits[split..].iter().map(|&d| char::from(d)));
    }
    out
}

/// Parse one newline-terminated frame.
///
/// Values are recovered to the precision they were encoded with.
pub fn parse_frame(data: &[u8]) -> Result<(Reading, Timestamp), FrameError> {
    let line = std::str::from_utf8(data).map_err(|_| FrameError::Utf8)?;
    let line = line.strip_suffix('\n').ok_or(FrameError::Unterminated)?;

    let (prefix, rest) = line
        .split_once(':')
        .ok_or(FrameError::Malformed("missing ':' after prefix"))?;
    let (payload, timestamp) = rest
        .rsplit_once(';')
        .ok_or(FrameError::Malformed("missing ';' before timestamp"))?;

    let timestamp: Timestamp = timestamp
        .parse()
        .map_err(|_| FrameError::Number(timestamp.to_string()))?;

    let values = payload
        .split(',')
        .map(|v| v.parse::<f64>().map_err(|_| FrameError::Number(v.to_string())))
        .collect::<Result<Vec<_>, _>>()?;

    let kind = if prefix == SensorKind::HeartRate.frame_prefix() {
        SensorKind::HeartRate
    } else if prefix == SensorKind::Accelerometer.frame_prefix() {
        SensorKind::Accelerometer
    } else {
        return Err(FrameError::UnknownPrefix(prefix.to_string()));
    };

    let reading = match (kind, values.as_slice()) {
        (SensorKind::HeartRate, [bpm]) => Reading::heart_rate(*bpm),
        (SensorKind::Accelerometer, [x, y, z]) => Reading::acceleration(*x, *y, *z),
        (SensorKind::HeartRate, _) => {
            return Err(FrameError::FieldCount {
                expected: 1,
                found: values.len(),
            });
        }
        (SensorKind::Accelerometer, _) => {
            return Err(FrameError::FieldCount {
                expected: 3,
                found: values.len(),
            });
        }
    };

    Ok((reading, timestamp))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_heart_rate() {
        let frame = encode(&Reading::heart_rate(72.0), 1_699_999_999_000);
        assert_eq!(frame.as_str(), "HR:72.0;1699999999000\n");
    }

    #[test]
    fn test_encode_acceleration() {
        let frame = encode(&Reading::acceleration(0.12, -9.81, 0.03), 1_699_999_999_123);
        assert_eq!(frame.as_str(), "ACC:0.12,-9.81,0.03;1699999999123\n");
    }

    #[test]
    fn test_encode_fixed_precision() {
        let frame = encode(&Reading::heart_rate(64.0 + 1.0 / 3.0), 1);
        assert_eq!(frame.as_str(), "HR:64.3;1\n");

        let frame = encode(&Reading::acceleration(1.0, 0.004, -12.3456), 2);
        assert_eq!(frame.as_str(), "ACC:1.00,0.00,-12.35;2\n");
    }

    #[test]
    fn test_encode_rounds_ties_up() {
        let frame = encode(&Reading::heart_rate(72.25), 1);
        assert_eq!(frame.as_str(), "HR:72.3;1\n");

        let frame = encode(&Reading::acceleration(0.125, 1.005, -0.375), 1);
        assert_eq!(frame.as_str(), "ACC:0.13,1.01,-0.38;1\n");
    }

    #[test]
    fn test_encode_rounding_carries() {
        let frame = encode(&Reading::heart_rate(99.95), 3);
        assert_eq!(frame.as_str(), "HR:100.0;3\n");

        let frame = encode(&Reading::acceleration(9.995, -0.005, 0.0), 3);
        assert_eq!(frame.as_str(), "ACC:10.00,-0.01,0.00;3\n");

        assert_eq!(fixed(-0.001, 2), "-0.00");
        assert_eq!(fixed(0.0, 1), "0.0");
    }

    #[test]
    fn test_frame_display_omits_newline() {
        let frame = encode(&Reading::heart_rate(80.0), 5);
        assert_eq!(frame.to_string(), "HR:80.0;5");
        assert_eq!(frame.len(), frame.as_bytes().len());
        assert!(!frame.is_empty());
    }

    #[test]
    fn test_parse_recovers_values() {
        let frame = encode(&Reading::acceleration(0.123, -9.806, 0.031), 42);
        let (reading, ts) = parse_frame(frame.as_bytes()).unwrap();

        assert_eq!(ts, 42);
        match reading {
            Reading::Acceleration { x, y, z } => {
                assert!((x - 0.12).abs() < 1e-9);
                assert!((y + 9.81).abs() < 1e-9);
                assert!((z - 0.03).abs() < 1e-9);
            }
            other => panic!("Expected acceleration, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_frame(b"HR:72.0;1"), Err(FrameError::Unterminated));
        assert_eq!(
            parse_frame(b"GYRO:1.0;1\n"),
            Err(FrameError::UnknownPrefix("GYRO".to_string()))
        );
        assert_eq!(
            parse_frame(b"ACC:1.00,2.00;1\n"),
            Err(FrameError::FieldCount {
                expected: 3,
                found: 2
            })
        );
        assert_eq!(
            parse_frame(b"HR:fast;1\n"),
            Err(FrameError::Number("fast".to_string()))
        );
        assert!(matches!(
            parse_frame(b"HR72.0\n"),
            Err(FrameError::Malformed(_))
        ));
        assert_eq!(parse_frame(&[0xff, b'\n']), Err(FrameError::Utf8));
    }
}
