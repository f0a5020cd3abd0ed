use serde::{Deserialize, Deserializer, Serialize, de};
use time::OffsetDateTime;
use time::macros::format_description;

/// Default size threshold for size-based rotation (10 MiB).
pub const DEFAULT_MAX_SIZE: u64 = 10 * 1024 * 1024;
/// Default number of generations kept by size-based rotation.
pub const DEFAULT_MAX_FILES: usize = 5;

/// Parse a size string with an optional unit (K/M/G, case-insensitive).
/// A bare number is a byte count.
fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    let Some(last) = s.chars().last() else {
        return Err("empty size string".to_string());
    };

    let (num_str, multiplier) = if last.is_ascii_alphabetic() {
        let multiplier = match last.to_ascii_uppercase() {
            'K' => 1024,
            'M' => 1024 * 1024,
            'G' => 1024 * 1024 * 1024,
            unit => return Err(format!("invalid unit: {}, supported: K/M/G", unit)),
        };
        (&s[..s.len() - 1], multiplier)
    } else {
        (s, 1)
    };

    let num: u64 = num_str
        .trim()
        .parse()
        .map_err(|_| format!("invalid number: {}", num_str))?;

    num.checked_mul(multiplier)
        .ok_or_else(|| "size too large".to_string())
}

/// Size value that can be a number or string with units.
#[derive(Deserialize)]
#[serde(untagged)]
enum SizeValue {
    Number(u64),
    String(String),
}

impl SizeValue {
    fn to_bytes(&self) -> Result<u64, String> {
        match self {
            SizeValue::Number(n) => Ok(*n),
            SizeValue::String(s) => parse_size(s),
        }
    }
}

/// When the canonical log file is rolled over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RotationPolicy {
    /// Rotate once the file reaches `max_size` bytes, keeping `max_files`
    /// generations including the current one.
    Size { max_size: u64, max_files: usize },
    /// Rotate when the calendar day changes.
    Day,
    /// Rotate when the hour changes.
    Hour,
    /// Rotate when the minute changes.
    Minute,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self::size(DEFAULT_MAX_SIZE, DEFAULT_MAX_FILES)
    }
}

impl<'de> Deserialize<'de> for RotationPolicy {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RotationInput {
            Simple(String),
            Complex {
                #[serde(rename = "type")]
                rotation_type: String,
                max_size: Option<SizeValue>,
                max_files: Option<usize>,
            },
        }

        let (rotation_type, max_size, max_files) = match RotationInput::deserialize(deserializer)? {
            RotationInput::Simple(rotation_type) => (rotation_type, None, None),
            RotationInput::Complex {
                rotation_type,
                max_size,
                max_files,
            } => (rotation_type, max_size, max_files),
        };

        match rotation_type.as_str() {
            "size" => {
                let max_size = match max_size {
                    Some(size) => size.to_bytes().map_err(de::Error::custom)?,
                    None => DEFAULT_MAX_SIZE,
                };
                Ok(RotationPolicy::Size {
                    max_size,
                    max_files: max_files.unwrap_or(DEFAULT_MAX_FILES),
                })
            }
            "day" | "daily" => Ok(RotationPolicy::Day),
            "hour" | "hourly" => Ok(RotationPolicy::Hour),
            "minute" => Ok(RotationPolicy::Minute),
            other => Err(de::Error::custom(format!(
                "unknown rotation type: {}",
                other
            ))),
        }
    }
}

impl RotationPolicy {
    /// Create a size-based rotation policy.
    pub fn size(max_size: u64, max_files: usize) -> Self {
        Self::Size {
            max_size,
            max_files,
        }
    }

    /// Format `at` with this policy's window granularity.
    ///
    /// Two instants fall in the same window exactly when their stamps are
    /// equal. Size-based rotation has no windows and yields `None`.
    pub fn window_stamp(&self, at: OffsetDateTime) -> Result<Option<String>, time::error::Format> {
        let stamp = match self {
            Self::Size { .. } => return Ok(None),
            Self::Day => at.format(format_description!("[year][month][day]"))?,
            Self::Hour => at.format(format_description!("[year][month][day]-[hour]"))?,
            Self::Minute => at.format(format_description!("[year][month][day]-[hour][minute]"))?,
        };
        Ok(Some(stamp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("512"), Ok(512));
        assert_eq!(parse_size("3k"), Ok(3 * 1024));
        assert_eq!(parse_size("2M"), Ok(2 * 1024 * 1024));
        assert_eq!(parse_size("1g"), Ok(1024 * 1024 * 1024));
        assert!(parse_size("").is_err());
        assert!(parse_size("10X").is_err());
        assert!(parse_size("abcM").is_err());
    }

    #[test]
    fn test_rotation_policy_deserialize() {
        let policy: RotationPolicy = serde_yaml::from_str("day").unwrap();
        assert_eq!(policy, RotationPolicy::Day);

        let policy: RotationPolicy = serde_yaml::from_str("hourly").unwrap();
        assert_eq!(policy, RotationPolicy::Hour);

        let policy: RotationPolicy = serde_yaml::from_str("size").unwrap();
        assert_eq!(policy, RotationPolicy::default());

        // Bare numbers are bytes
        let yaml = r#"
type: size
max_size: 10000
max_files: 3
"#;
        let policy: RotationPolicy = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(policy, RotationPolicy::size(10000, 3));

        let yaml = r#"
type: size
max_size: "5M"
"#;
        let policy: RotationPolicy = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(policy, RotationPolicy::size(5 * 1024 * 1024, DEFAULT_MAX_FILES));

        let yaml = r#"
type: minute
"#;
        let policy: RotationPolicy = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(policy, RotationPolicy::Minute);

        assert!(serde_yaml::from_str::<RotationPolicy>("weekly").is_err());
    }

    #[test]
    fn test_rotation_policy_serialize_roundtrip() {
        let yaml = serde_yaml::to_string(&RotationPolicy::size(2048, 4)).unwrap();
        let policy: RotationPolicy = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(policy, RotationPolicy::size(2048, 4));
    }

    #[test]
    fn test_window_stamps() {
        let at = datetime!(2026-03-07 09:05:59 UTC);
        assert_eq!(RotationPolicy::Day.window_stamp(at).unwrap().unwrap(), "20260307");
        assert_eq!(
            RotationPolicy::Hour.window_stamp(at).unwrap().unwrap(),
            "20260307-09"
        );
        assert_eq!(
            RotationPolicy::Minute.window_stamp(at).unwrap().unwrap(),
            "20260307-0905"
        );
        assert_eq!(RotationPolicy::size(1, 1).window_stamp(at).unwrap(), None);
    }

    #[test]
    fn test_window_boundaries() {
        let before = datetime!(2026-03-07 09:59:59 UTC);
        let after = datetime!(2026-03-07 10:00:00 UTC);
        let stamp = |policy: RotationPolicy, at| policy.window_stamp(at).unwrap();
        assert_eq!(stamp(RotationPolicy::Day, before), stamp(RotationPolicy::Day, after));
        assert_ne!(stamp(RotationPolicy::Hour, before), stamp(RotationPolicy::Hour, after));
        assert_ne!(
            stamp(RotationPolicy::Minute, before),
            stamp(RotationPolicy::Minute, after)
        );
    }
}
