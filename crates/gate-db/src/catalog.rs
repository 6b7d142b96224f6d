//! Shaping of catalog (`SHOW ...`) output.

use serde::Serialize;
use serde_json::Value;

use crate::rows::{value_to_string, JsonRow};

/// One column as reported by `SHOW COLUMNS`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub nullable: bool,
    pub key: String,
    pub default: Option<String>,
    pub extra: String,
}

impl ColumnDescriptor {
    /// Maps a `SHOW COLUMNS` row (`Field`, `Type`, `Null`, `Key`, `Default`,
    /// `Extra`). Missing fields read as empty.
    pub fn from_show_columns(row: &JsonRow) -> Self {
        let text = |field: &str| row.get(field).map(value_to_string).unwrap_or_default();
        Self {
            name: text("Field"),
            data_type: text("Type"),
            nullable: text("Null").eq_ignore_ascii_case("YES"),
            key: text("Key"),
            default: match row.get("Default") {
                None | Some(Value::Null) => None,
                Some(value) => Some(value_to_string(value)),
            },
            extra: text("Extra"),
        }
    }
}

/// Reads the `total` column of a `COUNT(*)` result. Servers report the
/// count as a signed BIGINT; anything unexpected reads as zero.
pub fn count_from_rows(rows: &[JsonRow]) -> u64 {
    rows.first()
        .and_then(|row| row.get("total"))
        .and_then(|value| match value {
            Value::Number(number) => number.as_u64(),
            Value::String(text) => text.parse().ok(),
            _ => None,
        })
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> JsonRow {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn maps_show_columns_row() {
        let descriptor = ColumnDescriptor::from_show_columns(&row(json!({
            "Field": "id",
            "Type": "int unsigned",
            "Null": "NO",
            "Key": "PRI",
            "Default": null,
            "Extra": "auto_increment"
        })));
        assert_eq!(
            descriptor,
            ColumnDescriptor {
                name: "id".into(),
                data_type: "int unsigned".into(),
                nullable: false,
                key: "PRI".into(),
                default: None,
                extra: "auto_increment".into(),
            }
        );
    }

    #[test]
    fn nullable_column_with_default() {
        let descriptor = ColumnDescriptor::from_show_columns(&row(json!({
            "Field": "status",
            "Type": "varchar(16)",
            "Null": "YES",
            "Key": "",
            "Default": "open",
            "Extra": ""
        })));
        assert!(descriptor.nullable);
        assert_eq!(descriptor.default.as_deref(), Some("open"));

        let serialized = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(serialized["type"], "varchar(16)");
    }

    #[test]
    fn count_reads_total_column() {
        assert_eq!(count_from_rows(&[row(json!({"total": 5}))]), 5);
        assert_eq!(count_from_rows(&[row(json!({"total": "7"}))]), 7);
        assert_eq!(count_from_rows(&[]), 0);
    }
}
