use serde::Serialize;
use serde_json::{Map, Number, Value};
use std::net::IpAddr;

/// key every sensor packet must carry; the upsert identifier
pub const ZONE_ID: &str = "zone_id";
/// local ISO-8601 receive time, rewritten on every packet
pub const LAST_UPDATED: &str = "last_updated";
/// address of the node that sent the packet
pub const SENDER_IP: &str = "sender_ip";

/// why a datagram was dropped instead of stored
#[derive(Debug, thiserror::Error)]
pub enum Rejection {
    #[error("invalid json: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("payload is not a json object")]
    NotAnObject,
    #[error("missing zone_id")]
    MissingZoneId,
}

/// one zone's latest reading
///
/// the payload shape is up to the sensor node, only `zone_id` is required.
/// examples:
/// - {"zone_id": "A", "temp": 22}
/// - {"zone_id": 7, "soil_saturation": 0.81, "rainfall_mm": 12.5}
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SensorRecord {
    fields: Map<String, Value>,
}

impl SensorRecord {
    /// accept a decoded json value as a record
    pub fn from_value(value: Value) -> Result<Self, Rejection> {
        match value {
            Value::Object(fields) if fields.contains_key(ZONE_ID) => Ok(Self { fields }),
            Value::Object(_) => Err(Rejection::MissingZoneId),
            _ => Err(Rejection::NotAnObject),
        }
    }

    /// parse datagram text into a record
    pub fn parse(text: &str) -> Result<Self, Rejection> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    pub fn zone_id(&self) -> &Value {
        // checked at construction
        &self.fields[ZONE_ID]
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// stamp receive metadata, overwriting anything the sender put there
    pub fn stamp(&mut self, sender: IpAddr, received_at: String) {
        self.fields.insert(LAST_UPDATED.to_string(), Value::String(received_at));
        self.fields.insert(SENDER_IP.to_string(), Value::String(sender.to_string()));
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

/// true when two `zone_id` values name the same zone
///
/// numbers compare by exact value, so `1` and `1.0` are one zone while
/// `9007199254740992` and `9007199254740993` stay two. booleans count as
/// `1` / `0`. `"1"` and `1` stay distinct.
pub fn zone_ids_match(a: &Value, b: &Value) -> bool {
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => numbers_match(&x, &y),
        _ => a == b,
    }
}

fn as_number(value: &Value) -> Option<Number> {
    match value {
        Value::Number(n) => Some(n.clone()),
        Value::Bool(b) => Some(Number::from(u8::from(*b))),
        _ => None,
    }
}

fn numbers_match(x: &Number, y: &Number) -> bool {
    match (integer_digits(x), integer_digits(y)) {
        (Some(a), Some(b)) => a == b,
        (Some(int), None) => integer_equals_float(&int, y),
        (None, Some(int)) => integer_equals_float(&int, x),
        (None, None) => x.as_f64() == y.as_f64(),
    }
}

/// canonical decimal text of an integer literal, any width
fn integer_digits(n: &Number) -> Option<String> {
    let text = n.to_string();
    let digits = text.strip_prefix('-').unwrap_or(&text);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if digits.bytes().all(|b| b == b'0') {
        return Some("0".to_string());
    }
    Some(text)
}

/// exact integer == float check, no rounding of the integer side
fn integer_equals_float(int: &str, float: &Number) -> bool {
    let Some(f) = float.as_f64() else {
        return false;
    };
    if !f.is_finite() || f.fract() != 0.0 {
        return false;
    }
    match int.parse::<i128>() {
        Ok(i) if f.abs() < 1.0e38 => f as i128 == i,
        _ => int.parse::<f64>().is_ok_and(|i| i == f),
    }
}

/// zone id rendered for logs and url matching: strings without quotes
pub fn zone_label(zone_id: &Value) -> String {
    match zone_id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// current local time as ISO-8601 with microseconds and no offset
pub fn local_timestamp() -> String {
    chrono::Local::now()
        .naive_local()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_requires_object_with_zone_id() {
        assert!(matches!(SensorRecord::parse("not json"), Err(Rejection::InvalidJson(_))));
        assert!(matches!(SensorRecord::parse("[1, 2]"), Err(Rejection::NotAnObject)));
        assert!(matches!(SensorRecord::parse("\"zone_id\""), Err(Rejection::NotAnObject)));
        assert!(matches!(
            SensorRecord::parse(r#"{"temp": 22}"#),
            Err(Rejection::MissingZoneId)
        ));

        let record = SensorRecord::parse(r#"{"zone_id": "A", "temp": 22}"#).unwrap();
        assert_eq!(record.zone_id(), &json!("A"));
        assert_eq!(record.get("temp"), Some(&json!(22)));
    }

    #[test]
    fn stamp_overwrites_client_metadata_in_place() {
        let mut record = SensorRecord::parse(
            r#"{"sender_ip": "spoofed", "zone_id": 3, "last_updated": "yesterday"}"#,
        )
        .unwrap();
        record.stamp("10.0.0.9".parse().unwrap(), "2026-10-18T09:30:00.000000".to_string());

        let value = record.into_value();
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, ["sender_ip", "zone_id", "last_updated"]);
        assert_eq!(value[SENDER_IP], json!("10.0.0.9"));
        assert_eq!(value[LAST_UPDATED], json!("2026-10-18T09:30:00.000000"));
    }

    #[test]
    fn numeric_zone_ids_compare_by_value() {
        assert!(zone_ids_match(&json!(1), &json!(1.0)));
        assert!(zone_ids_match(&json!(-3), &json!(-3.0)));
        assert!(zone_ids_match(&json!("A"), &json!("A")));
        assert!(!zone_ids_match(&json!("1"), &json!(1)));
        assert!(!zone_ids_match(&json!(2), &json!(3)));
        assert!(!zone_ids_match(&json!(1), &json!(1.5)));
    }

    #[test]
    fn large_integer_zone_ids_stay_distinct() {
        let a: Value = serde_json::from_str("9007199254740992").unwrap();
        let b: Value = serde_json::from_str("9007199254740993").unwrap();
        assert!(!zone_ids_match(&a, &b));
        assert!(zone_ids_match(&b, &b.clone()));

        let huge: Value = serde_json::from_str("123456789012345678901234567890").unwrap();
        let huge_plus: Value = serde_json::from_str("123456789012345678901234567891").unwrap();
        assert!(!zone_ids_match(&huge, &huge_plus));
        assert!(zone_ids_match(&huge, &huge.clone()));

        let float: Value = serde_json::from_str("9007199254740992.0").unwrap();
        assert!(zone_ids_match(&a, &float));
        assert!(!zone_ids_match(&b, &float));
    }

    #[test]
    fn booleans_match_one_and_zero() {
        assert!(zone_ids_match(&json!(true), &json!(1)));
        assert!(zone_ids_match(&json!(false), &json!(0.0)));
        assert!(!zone_ids_match(&json!(true), &json!(0)));
        assert!(!zone_ids_match(&json!(true), &json!("true")));
    }

    #[test]
    fn timestamp_is_naive_iso8601() {
        let ts = local_timestamp();
        assert!(chrono::NaiveDateTime::parse_from_str(&ts, "%Y-%m-%dT%H:%M:%S%.f").is_ok());
        assert_eq!(ts.len(), "2026-10-18T09:30:00.000000".len());
    }

    #[test]
    fn zone_label_drops_string_quotes() {
        assert_eq!(zone_label(&json!("north-slope")), "north-slope");
        assert_eq!(zone_label(&json!(12)), "12");
    }
}
