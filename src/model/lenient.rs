//! Forgiving field decoders for backend JSON.
//!
//! The backend is a separate system: numbers sometimes arrive as strings,
//! lists arrive as `null`, and timestamps come as epoch milliseconds or
//! RFC 3339 text. These helpers map all of that onto plain Rust values.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Any JSON value to a finite `f64`; everything unusable becomes `0.0`.
pub(crate) fn value_to_f64(value: &Value) -> f64 {
    let n = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        _ => 0.0,
    };
    if n.is_finite() {
        n
    } else {
        0.0
    }
}

fn value_to_u64(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n
            .as_u64()
            .unwrap_or_else(|| n.as_f64().map(|f| f.max(0.0) as u64).unwrap_or(0)),
        other => value_to_f64(other).max(0.0) as u64,
    }
}

/// Epoch milliseconds, numeric strings or RFC 3339 text.
pub(crate) fn value_to_datetime(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(ms) = s.parse::<i64>() {
                return Utc.timestamp_millis_opt(ms).single();
            }
            DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        }
        _ => None,
    }
}

pub(crate) fn f64_or_zero<'de, D>(d: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(value_to_f64(&Value::deserialize(d)?))
}

pub(crate) fn u64_or_zero<'de, D>(d: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(value_to_u64(&Value::deserialize(d)?))
}

pub(crate) fn u32_or_zero<'de, D>(d: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(value_to_u64(&Value::deserialize(d)?).min(u32::MAX as u64) as u32)
}

pub(crate) fn f64_list<'de, D>(d: D) -> Result<Vec<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Option::<Vec<Value>>::deserialize(d)?.unwrap_or_default();
    Ok(values.iter().map(value_to_f64).collect())
}

pub(crate) fn string_or_empty<'de, D>(d: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(d)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// `null` decodes to the type's default instead of failing.
pub(crate) fn null_as_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

pub(crate) fn datetime_or_now<'de, D>(d: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(value_to_datetime(&Value::deserialize(d)?).unwrap_or_else(Utc::now))
}

pub(crate) fn optional_datetime<'de, D>(d: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(value_to_datetime(&Value::deserialize(d)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numbers_from_strings_and_junk() {
        assert_eq!(value_to_f64(&json!("42.5")), 42.5);
        assert_eq!(value_to_f64(&json!("NaN")), 0.0);
        assert_eq!(value_to_f64(&json!(null)), 0.0);
        assert_eq!(value_to_u64(&json!(-3)), 0);
        assert_eq!(value_to_u64(&json!(1.9)), 1);
    }

    #[test]
    fn test_datetime_forms() {
        let ms = value_to_datetime(&json!(1_700_000_000_000i64)).unwrap();
        assert_eq!(ms.timestamp(), 1_700_000_000);

        let text = value_to_datetime(&json!("2024-01-01T12:00:00Z")).unwrap();
        assert_eq!(text, Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap());

        assert!(value_to_datetime(&json!("yesterday")).is_none());
    }
}
