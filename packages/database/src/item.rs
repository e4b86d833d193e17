//! Conversion between serde types and `DynamoDB` items.
//!
//! Records go through `serde_json::Value` so that the same `camelCase`
//! field names are used in the table and in the API. Numbers are stored as
//! `N` strings and read back as integers when they have no fractional part.

use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::DbError;

/// A `DynamoDB` item.
pub type Item = HashMap<String, AttributeValue>;

/// Converts a JSON value into an attribute value.
#[must_use]
pub fn to_attribute(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Array(values) => AttributeValue::L(values.iter().map(to_attribute).collect()),
        Value::Object(map) => AttributeValue::M(
            map.iter()
                .map(|(k, v)| (k.clone(), to_attribute(v)))
                .collect(),
        ),
    }
}

/// Parses a `DynamoDB` number string.
fn parse_number(n: &str) -> Result<Value, DbError> {
    if let Ok(i) = n.parse::<i64>() {
        return Ok(Value::from(i));
    }
    if let Ok(u) = n.parse::<u64>() {
        return Ok(Value::from(u));
    }
    n.parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| DbError::Conversion {
            message: format!("Invalid number attribute: {n}"),
        })
}

/// Converts an attribute value into a JSON value.
///
/// # Errors
///
/// Returns [`DbError::Conversion`] for binary attributes and malformed
/// numbers.
pub fn from_attribute(attr: &AttributeValue) -> Result<Value, DbError> {
    Ok(match attr {
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::N(n) => parse_number(n)?,
        AttributeValue::S(s) => Value::String(s.clone()),
        AttributeValue::Ss(values) => Value::Array(values.iter().cloned().map(Value::String).collect()),
        AttributeValue::Ns(values) => Value::Array(
            values
                .iter()
                .map(|n| parse_number(n))
                .collect::<Result<_, _>>()?,
        ),
        AttributeValue::L(values) => Value::Array(
            values
                .iter()
                .map(from_attribute)
                .collect::<Result<_, _>>()?,
        ),
        AttributeValue::M(map) => Value::Object(
            map.iter()
                .map(|(k, v)| Ok((k.clone(), from_attribute(v)?)))
                .collect::<Result<_, DbError>>()?,
        ),
        other => {
            return Err(DbError::Conversion {
                message: format!("Unsupported attribute type: {other:?}"),
            });
        }
    })
}

/// Serializes a record into an item.
///
/// # Errors
///
/// Returns [`DbError::Conversion`] if the value doesn't serialize to a JSON
/// object.
pub fn to_item<T: Serialize>(value: &T) -> Result<Item, DbError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map
            .iter()
            .map(|(k, v)| (k.clone(), to_attribute(v)))
            .collect()),
        other => Err(DbError::Conversion {
            message: format!("Expected an object, got {other}"),
        }),
    }
}

/// Deserializes an item into a record.
///
/// # Errors
///
/// Returns [`DbError::Conversion`] if an attribute can't be converted or
/// the item doesn't fit `T`.
pub fn from_item<T: DeserializeOwned>(item: &Item) -> Result<T, DbError> {
    let map = item
        .iter()
        .map(|(k, v)| Ok((k.clone(), from_attribute(v)?)))
        .collect::<Result<serde_json::Map<_, _>, DbError>>()?;
    serde_json::from_value(Value::Object(map)).map_err(|e| DbError::Conversion {
        message: e.to_string(),
    })
}

/// Deserializes a batch of items, skipping (and logging) malformed ones so
/// that one bad row doesn't fail a whole scan.
#[must_use]
pub fn decode_all<T: DeserializeOwned>(items: &[Item]) -> Vec<T> {
    items
        .iter()
        .filter_map(|item| match from_item(item) {
            Ok(record) => Some(record),
            Err(e) => {
                log::warn!("Skipping malformed item: {e}");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use bus_directory_bus_models::{BusRecord, BusType, Journey};

    use super::*;

    #[test]
    fn bus_record_survives_item_conversion() {
        let mut bus = BusRecord::new("NC-1234", "SuperLine", "Colombo", "Jaffna");
        bus.bus_type = BusType::Luxury;
        bus.journeys = vec![Journey::new("06:00", "12:30")];
        bus.adult_fare = Some(1200.5);
        bus.stops = vec!["Kurunegala".into(), "Vavuniya".into()];
        bus.verify_count = 4;

        let item = to_item(&bus).unwrap();
        assert_eq!(item.get("verifyCount"), Some(&AttributeValue::N("4".into())));
        assert_eq!(item.get("busType"), Some(&AttributeValue::S("luxury".into())));

        let decoded: BusRecord = from_item(&item).unwrap();
        assert_eq!(decoded, bus);
    }

    #[test]
    fn numbers_decode_as_integers_when_whole() {
        assert_eq!(
            from_attribute(&AttributeValue::N("3".into())).unwrap(),
            Value::from(3)
        );
        assert_eq!(
            from_attribute(&AttributeValue::N("2.5".into())).unwrap(),
            serde_json::json!(2.5)
        );
        assert!(from_attribute(&AttributeValue::N("abc".into())).is_err());
    }

    #[test]
    fn string_sets_decode_as_arrays() {
        assert_eq!(
            from_attribute(&AttributeValue::Ss(vec!["a".into(), "b".into()])).unwrap(),
            serde_json::json!(["a", "b"])
        );
    }

    #[test]
    fn decode_all_skips_malformed_items() {
        let good = to_item(&BusRecord::new("A-1", "Co", "A", "B")).unwrap();
        let mut bad = good.clone();
        bad.insert("verifyCount".into(), AttributeValue::S("many".into()));

        let decoded: Vec<BusRecord> = decode_all(&[good, bad]);
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].license_no, "A-1");
    }
}
