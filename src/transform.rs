//! Schema-driven record transformation.
//!
//! Raw rows from the API are shaped before they are emitted: fields the
//! stream schema declares are coerced to their declared types, date-times
//! are normalized to a single UTC format, fields excluded by catalog
//! metadata are dropped, and fields the schema does not declare pass
//! through untouched.
//!
//! A handful of Harvest-specific helpers live here as well: foreign keys
//! lifted out of nested objects, expense receipts and invoice payment
//! gateways flattened to first-level fields, and date-only fields widened
//! to full timestamps.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::{Map, Number, Value};

use crate::error::{Error, Result};

/// Format for every timestamp the tap emits (microsecond precision, UTC).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// Format for the `updated_since` query parameter (whole seconds, UTC).
pub const UPDATED_SINCE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

// ============================================================================
// Date/time helpers
// ============================================================================

/// Parse a timestamp in any of the shapes Harvest uses.
///
/// Accepts RFC 3339 (with or without fractional seconds), the legacy
/// `YYYY-MM-DD HH:MM:SS` form, and bare dates, which resolve to midnight
/// UTC.
pub fn parse_datetime(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        let midnight = date.and_hms_opt(0, 0, 0)?;
        return Some(Utc.from_utc_datetime(&midnight));
    }
    None
}

/// Format a timestamp the way the tap emits them.
pub fn format_timestamp(datetime: &DateTime<Utc>) -> String {
    datetime.format(TIMESTAMP_FORMAT).to_string()
}

/// Render a bookmark as an `updated_since` query value.
///
/// Bookmarks carry fractional seconds; the API only accepts whole
/// seconds. Unparseable input is passed through unchanged.
pub fn format_updated_since(bookmark: &str) -> String {
    match parse_datetime(bookmark) {
        Some(parsed) => parsed.format(UPDATED_SINCE_FORMAT).to_string(),
        None => bookmark.to_string(),
    }
}

fn normalize_datetime(value: &str) -> String {
    match parse_datetime(value) {
        Some(parsed) => format_timestamp(&parsed),
        None => value.to_string(),
    }
}

fn is_datetime(schema: &Value) -> bool {
    schema.get("format").and_then(Value::as_str) == Some("date-time")
}

// ============================================================================
// Record transformation
// ============================================================================

/// Transform a raw record against its stream schema.
///
/// Each declared field is coerced to the first declared type that accepts
/// its value, with `"null"` tried last. Declared date-times are
/// normalized to [`TIMESTAMP_FORMAT`]. Fields in `excluded` are dropped.
/// Fields the schema does not declare are kept as-is.
pub fn transform_record(
    stream: &str,
    record: &Value,
    schema: &Value,
    excluded: &HashSet<String>,
) -> Result<Value> {
    let Some(map) = record.as_object() else {
        return Err(Error::transform(stream, "record is not a JSON object"));
    };
    let empty = Map::new();
    let properties = schema
        .get("properties")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    let mut out = Map::with_capacity(map.len());
    for (field, value) in map {
        if excluded.contains(field) {
            continue;
        }
        let shaped = match properties.get(field) {
            Some(subschema) => coerce(value, subschema).map_err(|message| {
                Error::transform(stream, format!("field '{field}': {message}"))
            })?,
            None => value.clone(),
        };
        out.insert(field.clone(), shaped);
    }
    Ok(Value::Object(out))
}

/// Drop null-valued date-time fields before transformation.
///
/// The API reports unset timestamps as explicit nulls. Removing them
/// keeps the transform from treating null as a parseable value.
pub fn remove_empty_date_times(record: &mut Value, schema: &Value) {
    let Some(map) = record.as_object_mut() else {
        return;
    };
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return;
    };
    for (field, subschema) in properties {
        if is_datetime(subschema) && matches!(map.get(field), Some(Value::Null)) {
            map.remove(field);
        }
    }
}

/// Widen date-only fields to full midnight-UTC timestamps.
///
/// Runs after transformation so fields like `issue_date` and
/// `send_reminder_on` line up with the rest of the emitted timestamps.
pub fn append_times_to_dates(record: &mut Value, date_fields: &[&str]) {
    let Some(map) = record.as_object_mut() else {
        return;
    };
    for field in date_fields {
        let Some(Value::String(raw)) = map.get(*field) else {
            continue;
        };
        if raw.is_empty() {
            continue;
        }
        if let Some(parsed) = parse_datetime(raw) {
            map.insert((*field).to_string(), Value::String(format_timestamp(&parsed)));
        }
    }
}

// ============================================================================
// Harvest field flattening
// ============================================================================

/// Lift `id` out of nested objects into `<field>_id` columns.
///
/// A missing or null nested object still produces the column, with a
/// null value, so every record carries the same set of foreign keys.
pub fn flatten_object_ids(record: &mut Value, fields: &[&str]) {
    let Some(map) = record.as_object_mut() else {
        return;
    };
    for field in fields {
        let id = map
            .get(*field)
            .and_then(|nested| nested.get("id"))
            .cloned()
            .unwrap_or(Value::Null);
        map.insert(format!("{field}_id"), id);
    }
}

const RECEIPT_FIELDS: [&str; 4] = ["url", "file_name", "file_size", "content_type"];

/// Flatten an expense's nested `receipt` object into first-level fields.
pub fn flatten_receipt(record: &mut Value) {
    let Some(map) = record.as_object_mut() else {
        return;
    };
    let receipt = map.get("receipt").cloned().unwrap_or(Value::Null);
    for field in RECEIPT_FIELDS {
        let value = receipt.get(field).cloned().unwrap_or(Value::Null);
        map.insert(format!("receipt_{field}"), value);
    }
}

/// Flatten an invoice payment's nested `payment_gateway` object.
pub fn flatten_payment_gateway(record: &mut Value) {
    let Some(map) = record.as_object_mut() else {
        return;
    };
    let gateway = map.get("payment_gateway").cloned().unwrap_or(Value::Null);
    map.insert(
        "payment_gateway_id".to_string(),
        gateway.get("id").cloned().unwrap_or(Value::Null),
    );
    map.insert(
        "payment_gateway_name".to_string(),
        gateway.get("name").cloned().unwrap_or(Value::Null),
    );
}

// ============================================================================
// Type coercion
// ============================================================================

fn coerce(value: &Value, schema: &Value) -> std::result::Result<Value, String> {
    let types = declared_types(schema);
    if types.is_empty() {
        return Ok(value.clone());
    }
    for typ in &types {
        if let Some(coerced) = coerce_as(value, typ, schema) {
            return Ok(coerced);
        }
    }
    Err(format!("value {value} does not match type {types:?}"))
}

/// Declared types in try order, with `"null"` moved to the end so a
/// nullable field only resolves to null when nothing else accepts it.
fn declared_types(schema: &Value) -> Vec<String> {
    let mut types = match schema.get("type") {
        Some(Value::String(single)) => vec![single.clone()],
        Some(Value::Array(list)) => list
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    };
    types.sort_by_key(|typ| typ == "null");
    types
}

fn coerce_as(value: &Value, typ: &str, schema: &Value) -> Option<Value> {
    if typ != "null" && is_datetime(schema) {
        return match value {
            Value::String(raw) => Some(Value::String(normalize_datetime(raw))),
            Value::Null => None,
            other => Some(Value::String(other.to_string())),
        };
    }
    match typ {
        "null" => match value {
            Value::Null => Some(Value::Null),
            Value::String(raw) if raw.is_empty() => Some(Value::Null),
            _ => None,
        },
        "object" => coerce_object(value, schema),
        "array" => coerce_array(value, schema),
        "string" => match value {
            Value::String(_) => Some(value.clone()),
            Value::Number(number) => Some(Value::String(number.to_string())),
            Value::Bool(flag) => Some(Value::String(flag.to_string())),
            _ => None,
        },
        "integer" => coerce_integer(value),
        "number" => coerce_number(value),
        "boolean" => coerce_boolean(value),
        _ => Some(value.clone()),
    }
}

/// Objects keep only their declared properties; an object schema without
/// `properties` is treated as free-form.
fn coerce_object(value: &Value, schema: &Value) -> Option<Value> {
    let map = value.as_object()?;
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Some(value.clone());
    };
    let mut out = Map::new();
    for (field, subschema) in properties {
        if let Some(nested) = map.get(field) {
            out.insert(field.clone(), coerce(nested, subschema).ok()?);
        }
    }
    Some(Value::Object(out))
}

fn coerce_array(value: &Value, schema: &Value) -> Option<Value> {
    let items = value.as_array()?;
    let item_schema = schema.get("items").unwrap_or(&Value::Null);
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        out.push(coerce(item, item_schema).ok()?);
    }
    Some(Value::Array(out))
}

fn coerce_integer(value: &Value) -> Option<Value> {
    match value {
        Value::Number(number) => {
            if let Some(integer) = number.as_i64() {
                return Some(Value::Number(integer.into()));
            }
            let float = number.as_f64()?;
            if float.fract() == 0.0 {
                Some(Value::Number((float as i64).into()))
            } else {
                None
            }
        }
        // Harvest renders some numeric fields as strings with thousands
        // separators.
        Value::String(raw) => {
            let cleaned = raw.replace(',', "");
            cleaned
                .parse::<i64>()
                .ok()
                .map(|integer| Value::Number(integer.into()))
        }
        _ => None,
    }
}

fn coerce_number(value: &Value) -> Option<Value> {
    match value {
        Value::Number(_) => Some(value.clone()),
        Value::String(raw) => {
            let cleaned = raw.replace(',', "");
            cleaned
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
        }
        _ => None,
    }
}

fn coerce_boolean(value: &Value) -> Option<Value> {
    match value {
        Value::Bool(_) => Some(value.clone()),
        Value::String(raw) if raw.eq_ignore_ascii_case("false") => Some(Value::Bool(false)),
        Value::String(raw) => Some(Value::Bool(!raw.is_empty())),
        Value::Number(number) => Some(Value::Bool(number.as_f64().is_some_and(|f| f != 0.0))),
        _ => None,
    }
}

// ============================================================================
// Tests
// ============================================================================
