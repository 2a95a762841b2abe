//! Extensions for serde.

/// A module for serializing/deserializing a `Duration` as milliseconds.
///
/// Both integers (`5000`) and numeric strings (`"5000"`) are accepted when
/// deserializing; serialization always emits an integer.
pub mod duration_millis {
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serialize, Serializer};
    use std::fmt;
    use std::time::Duration;

    /// Serializes `value` as an integer number of milliseconds.
    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        to_millis(value).serialize(serializer)
    }

    /// Deserializes a number of milliseconds into a `Duration`.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(MillisVisitor)
    }

    pub(crate) fn to_millis(duration: &Duration) -> u64 {
        duration.as_secs() * 1000 + u64::from(duration.subsec_millis())
    }

    struct MillisVisitor;
    impl<'de> Visitor<'de> for MillisVisitor {
        type Value = Duration;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            write!(f, "a non-negative number of milliseconds")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            Ok(Duration::from_millis(v))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            if v < 0 {
                return Err(E::custom(format!("negative duration: {}", v)));
            }
            Ok(Duration::from_millis(v as u64))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            v.parse::<u64>()
                .map(Duration::from_millis)
                .map_err(E::custom)
        }
    }
}
