//! Conversion of MySQL result rows into JSON objects.
//!
//! Values are decoded by the column's reported type name. Decoding is
//! unchecked on purpose: the driver's compatibility table is narrower than
//! what the server sends back for expressions and `SHOW` output, while the
//! wire formats below are stable.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Number, Value};
use sqlx::{mysql::MySqlRow, Column, Row, TypeInfo, ValueRef};

/// One result row keyed by column name, in column order.
pub type JsonRow = Map<String, Value>;

pub fn row_to_json(row: &MySqlRow) -> Result<JsonRow, sqlx::Error> {
    let mut object = Map::with_capacity(row.columns().len());
    for (index, column) in row.columns().iter().enumerate() {
        let value = column_value(row, index, column.type_info().name())?;
        object.insert(column.name().to_string(), value);
    }
    Ok(object)
}

/// How a column's values are decoded, chosen from its reported type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decoding {
    Signed,
    Unsigned,
    Float,
    Double,
    Decimal,
    Date,
    Time,
    DateTime,
    Timestamp,
    Json,
    Bit,
    Bytes,
}

fn decoding_for(type_name: &str) -> Decoding {
    match type_name {
        // `TINYINT(1)` is reported as BOOLEAN but may hold any TINYINT value.
        "BOOLEAN" | "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => Decoding::Signed,
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" | "YEAR" => Decoding::Unsigned,
        "FLOAT" => Decoding::Float,
        "DOUBLE" => Decoding::Double,
        "DECIMAL" => Decoding::Decimal,
        "DATE" => Decoding::Date,
        "TIME" => Decoding::Time,
        "DATETIME" => Decoding::DateTime,
        "TIMESTAMP" => Decoding::Timestamp,
        "JSON" => Decoding::Json,
        "BIT" => Decoding::Bit,
        // Character, enum/set and binary columns.
        _ => Decoding::Bytes,
    }
}

fn column_value(row: &MySqlRow, index: usize, type_name: &str) -> Result<Value, sqlx::Error> {
    if row.try_get_raw(index)?.is_null() {
        return Ok(Value::Null);
    }

    let value = match decoding_for(type_name) {
        Decoding::Signed => Value::from(row.try_get_unchecked::<i64, _>(index)?),
        Decoding::Unsigned => Value::from(row.try_get_unchecked::<u64, _>(index)?),
        Decoding::Float => float_value(f64::from(row.try_get_unchecked::<f32, _>(index)?)),
        Decoding::Double => float_value(row.try_get_unchecked::<f64, _>(index)?),
        // Kept as text so no precision is lost.
        Decoding::Decimal => Value::String(row.try_get_unchecked::<String, _>(index)?),
        Decoding::Date => temporal(row.try_get_unchecked::<NaiveDate, _>(index), |v| {
            v.format("%Y-%m-%d").to_string()
        }),
        // TIME is an interval (-838:59:59 to 838:59:59), so it is rendered
        // from the raw value rather than through a time-of-day type.
        Decoding::Time => time_value(&row.try_get_unchecked::<Vec<u8>, _>(index)?),
        Decoding::DateTime => temporal(row.try_get_unchecked::<NaiveDateTime, _>(index), |v| {
            v.format("%Y-%m-%dT%H:%M:%S%.f").to_string()
        }),
        Decoding::Timestamp => temporal(row.try_get_unchecked::<DateTime<Utc>, _>(index), |v| {
            v.to_rfc3339()
        }),
        Decoding::Json => {
            let text = row.try_get_unchecked::<String, _>(index)?;
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        }
        Decoding::Bit => Value::from(bits_to_u64(&row.try_get_unchecked::<Vec<u8>, _>(index)?)),
        Decoding::Bytes => bytes_value(row.try_get_unchecked::<Vec<u8>, _>(index)?),
    };
    Ok(value)
}

/// Renders a TIME value as `[-]H:MM:SS[.ffffff]`, hours unbounded by the
/// day. Binary rows carry `len, negative, days(4 LE), h, m, s[, micros(4 LE)]`
/// with `len` of 0, 8 or 12; text rows already hold the server's rendering.
pub fn time_value(raw: &[u8]) -> Value {
    match raw {
        [0] => Value::String("00:00:00".into()),
        [len @ (8 | 12), negative, rest @ ..] if rest.len() == usize::from(*len) - 1 => {
            let days = u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]);
            let hours = u64::from(days) * 24 + u64::from(rest[4]);
            let sign = if *negative != 0 { "-" } else { "" };
            let mut rendered = format!("{sign}{hours:02}:{:02}:{:02}", rest[5], rest[6]);
            if let [a, b, c, d] = rest[7..] {
                let micros = u32::from_le_bytes([a, b, c, d]);
                if micros != 0 {
                    rendered.push_str(&format!(".{micros:06}"));
                }
            }
            Value::String(rendered)
        }
        _ => bytes_value(raw.to_vec()),
    }
}

fn float_value(value: f64) -> Value {
    Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Zero dates have no chrono representation and become null.
fn temporal<T>(decoded: Result<T, sqlx::Error>, render: impl FnOnce(T) -> String) -> Value {
    decoded
        .map(|value| Value::String(render(value)))
        .unwrap_or(Value::Null)
}

/// Text when the bytes are UTF-8, standard base64 otherwise.
pub fn bytes_value(bytes: Vec<u8>) -> Value {
    match String::from_utf8(bytes) {
        Ok(text) => Value::String(text),
        Err(err) => Value::String(STANDARD.encode(err.into_bytes())),
    }
}

/// `BIT(n)` arrives as big-endian bytes.
pub fn bits_to_u64(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte))
}

/// First column of every row rendered as a string. `SHOW` statements name
/// their single column after the schema (`Tables_in_shop`), so callers go by
/// position rather than by name.
pub fn first_column_strings(rows: &[JsonRow]) -> Vec<String> {
    rows.iter()
        .filter_map(|row| row.values().next())
        .map(value_to_string)
        .collect()
}

pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn utf8_bytes_become_text() {
        assert_eq!(bytes_value(b"hello".to_vec()), json!("hello"));
    }

    #[test]
    fn binary_bytes_become_base64() {
        assert_eq!(bytes_value(vec![0xff, 0x00, 0x10]), json!("/wAQ"));
    }

    #[test]
    fn bit_values_are_big_endian() {
        assert_eq!(bits_to_u64(&[]), 0);
        assert_eq!(bits_to_u64(&[0x01]), 1);
        assert_eq!(bits_to_u64(&[0x01, 0x00]), 256);
    }

    #[test]
    fn boolean_columns_keep_their_integer_value() {
        assert_eq!(decoding_for("BOOLEAN"), Decoding::Signed);
        assert_eq!(decoding_for("TINYINT"), Decoding::Signed);
        assert_eq!(decoding_for("YEAR"), Decoding::Unsigned);
        assert_eq!(decoding_for("VARBINARY"), Decoding::Bytes);
    }

    #[test]
    fn time_values_beyond_a_day_are_rendered() {
        assert_eq!(time_value(&[0]), json!("00:00:00"));
        // 34 days 22:59:59 => 838:59:59
        assert_eq!(
            time_value(&[8, 0, 34, 0, 0, 0, 22, 59, 59]),
            json!("838:59:59")
        );
        assert_eq!(
            time_value(&[8, 1, 0, 0, 0, 0, 1, 2, 3]),
            json!("-01:02:03")
        );
        assert_eq!(
            time_value(&[12, 0, 1, 0, 0, 0, 2, 0, 0, 0x40, 0xe2, 0x01, 0x00]),
            json!("26:00:00.123456")
        );
        assert_eq!(time_value(b"-838:59:59"), json!("-838:59:59"));
    }

    #[test]
    fn non_finite_floats_become_null() {
        assert_eq!(float_value(f64::NAN), Value::Null);
        assert_eq!(float_value(1.5), json!(1.5));
    }

    #[test]
    fn first_column_keeps_row_order() {
        let rows: Vec<JsonRow> = vec![
            json!({"Tables_in_shop": "orders", "Table_type": "BASE TABLE"}),
            json!({"Tables_in_shop": "customers"}),
            json!({"Tables_in_shop": 42}),
        ]
        .into_iter()
        .map(|value| value.as_object().cloned().unwrap())
        .collect();
        assert_eq!(
            first_column_strings(&rows),
            vec!["orders", "customers", "42"]
        );
    }
}
