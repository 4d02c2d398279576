//! Normalizes the dialect-heavy wire payload into plain Rust values:
//! unwrapping `{value}`/`{codingScheme,value}` envelopes, accepting both
//! array- and object-form periods, and expanding `Point` arrays into
//! observations.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use settlement_domain_models::{Observation, Period, Quality};

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum PayloadError {
    #[error("field '{0}' is missing")]
    MissingField(&'static str),
    #[error("field '{0}' has an unexpected shape")]
    UnexpectedShape(&'static str),
    #[error("timestamp '{0}' is not valid RFC3339")]
    InvalidTimestamp(String),
    #[error("quality code '{0}' is not recognized")]
    UnknownQuality(String),
}

/// Unwraps a `{"value": ...}` or `{"codingScheme": ..., "value": ...}`
/// wrapper, falling back to the value itself when it is already flat.
pub fn unwrap_value(v: &Value) -> &Value {
    match v {
        Value::Object(map) if map.contains_key("value") => &map["value"],
        other => other,
    }
}

pub fn extract_str<'a>(payload: &'a Value, field: &'static str) -> Result<&'a str, PayloadError> {
    let raw = payload.get(field).ok_or(PayloadError::MissingField(field))?;
    unwrap_value(raw)
        .as_str()
        .ok_or(PayloadError::UnexpectedShape(field))
}

pub fn extract_timestamp(payload: &Value, field: &'static str) -> Result<DateTime<Utc>, PayloadError> {
    let raw = extract_str(payload, field)?;
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| PayloadError::InvalidTimestamp(raw.to_string()))
}

/// Accepts both array form (`["2026-01-01T00:00:00Z", "2026-01-02T00:00:00Z"]`)
/// and object form (`{"start": ..., "end": ...}`) for a `Period`.
pub fn extract_period(payload: &Value, field: &'static str) -> Result<Period, PayloadError> {
    let raw = payload.get(field).ok_or(PayloadError::MissingField(field))?;
    let raw = unwrap_value(raw);
    match raw {
        Value::Array(items) => {
            let start = items
                .first()
                .and_then(Value::as_str)
                .ok_or(PayloadError::UnexpectedShape(field))?;
            let end = items.get(1).and_then(Value::as_str);
            parse_period(start, end, field)
        }
        Value::Object(map) => {
            let start = map
                .get("start")
                .and_then(Value::as_str)
                .ok_or(PayloadError::UnexpectedShape(field))?;
            let end = map.get("end").and_then(Value::as_str);
            parse_period(start, end, field)
        }
        _ => Err(PayloadError::UnexpectedShape(field)),
    }
}

fn parse_period(start: &str, end: Option<&str>, field: &'static str) -> Result<Period, PayloadError> {
    let start = DateTime::parse_from_rfc3339(start)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| PayloadError::InvalidTimestamp(start.to_string()))?;
    let end = end
        .map(|raw| {
            DateTime::parse_from_rfc3339(raw)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|_| PayloadError::InvalidTimestamp(raw.to_string()))
        })
        .transpose()?;
    let _ = field;
    Ok(Period::new(start, end))
}

/// One entry of the wire `Point` array: a 1-based position, a quantity and
/// a quality code.
#[derive(Debug, Clone)]
pub struct WirePoint {
    pub position: u32,
    pub quantity: rust_decimal::Decimal,
    pub quality_code: String,
}

/// Expands `Point` entries into [`Observation`]s: `timestamp = period.start
/// + (position - 1) * resolution_step`, per §4.1.
pub fn points_to_observations(
    points: &[WirePoint],
    period_start: DateTime<Utc>,
    resolution_step: Duration,
) -> Result<Vec<Observation>, PayloadError> {
    points
        .iter()
        .map(|point| {
            let quality = Quality::from_cim_code(&point.quality_code)
                .ok_or_else(|| PayloadError::UnknownQuality(point.quality_code.clone()))?;
            let offset = resolution_step * (point.position.saturating_sub(1) as i32);
            Ok(Observation {
                timestamp: period_start + offset,
                quantity: settlement_core_money::Quantity::new(point.quantity),
                quality,
            })
        })
        .collect()
}

/// Parses the raw `points[]` JSON array into [`WirePoint`]s, unwrapping the
/// `{position, quantity: {value}, quality: {value}}` envelope shape.
pub fn parse_points(raw: &Value) -> Result<Vec<WirePoint>, PayloadError> {
    let items = raw.as_array().ok_or(PayloadError::UnexpectedShape("points"))?;
    items
        .iter()
        .map(|item| {
            let position = item
                .get("position")
                .and_then(Value::as_u64)
                .ok_or(PayloadError::UnexpectedShape("points[].position"))? as u32;
            let quantity_raw = item
                .get("quantity")
                .map(unwrap_value)
                .ok_or(PayloadError::MissingField("points[].quantity"))?;
            let quantity: rust_decimal::Decimal = match quantity_raw {
                Value::String(s) => s
                    .parse()
                    .map_err(|_| PayloadError::UnexpectedShape("points[].quantity"))?,
                Value::Number(n) => n
                    .to_string()
                    .parse()
                    .map_err(|_| PayloadError::UnexpectedShape("points[].quantity"))?,
                _ => return Err(PayloadError::UnexpectedShape("points[].quantity")),
            };
            let quality_code = item
                .get("quality")
                .map(unwrap_value)
                .and_then(Value::as_str)
                .ok_or(PayloadError::MissingField("points[].quality"))?
                .to_string();
            Ok(WirePoint { position, quantity, quality_code })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unwraps_plain_value_wrapper() {
        let v = json!({"value": "5790001330552"});
        assert_eq!(unwrap_value(&v).as_str(), Some("5790001330552"));
    }

    #[test]
    fn unwraps_coding_scheme_wrapper() {
        let v = json!({"codingScheme": "A10", "value": "5790001330552"});
        assert_eq!(unwrap_value(&v).as_str(), Some("5790001330552"));
    }

    #[test]
    fn extracts_array_form_period() {
        let payload = json!({"period": ["2026-01-01T00:00:00Z", "2026-01-02T00:00:00Z"]});
        let period = extract_period(&payload, "period").unwrap();
        assert!(period.is_closed());
    }

    #[test]
    fn extracts_object_form_period() {
        let payload = json!({"period": {"start": "2026-01-01T00:00:00Z", "end": "2026-01-02T00:00:00Z"}});
        let period = extract_period(&payload, "period").unwrap();
        assert!(period.is_closed());
    }

    #[test]
    fn expands_points_to_observations_by_position() {
        let points = vec![
            WirePoint { position: 1, quantity: "1.0".parse().unwrap(), quality_code: "A01".into() },
            WirePoint { position: 2, quantity: "1.5".parse().unwrap(), quality_code: "A02".into() },
        ];
        let start = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc);
        let observations = points_to_observations(&points, start, Duration::hours(1)).unwrap();
        assert_eq!(observations[0].timestamp, start);
        assert_eq!(observations[1].timestamp, start + Duration::hours(1));
    }
}
