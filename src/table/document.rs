//! JSON form of a [`Table`].
//!
//! ```json
//! {
//!   "name": "Cue",
//!   "settings": { "align": 32, "put_blank_string": false, ... },
//!   "fields": [ { "name": "CueId", "type": "u32" },
//!               { "name": "Volume", "type": "f32", "default": 1.0 } ],
//!   "rows": [ [0, 1.0], [1, 0.5] ]
//! }
//! ```
//!
//! Rows are positional.  Blobs are hex strings, GUIDs hyphenated strings.

use serde::{Deserialize, Serialize};

use super::field::Field;
use super::value::{FieldType, Value};
use super::writer::WriterSettings;
use super::{ConversionMode, Table, TableError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDocument {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDocument {
    pub name: String,
    #[serde(default)]
    pub settings: WriterSettings,
    #[serde(default)]
    pub mode: ConversionMode,
    pub fields: Vec<FieldDocument>,
    #[serde(default)]
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl TableDocument {
    pub fn from_table(table: &Table) -> Self {
        Self {
            name: table.name().to_owned(),
            settings: table.settings().clone(),
            mode: table.mode(),
            fields: table
                .fields()
                .iter()
                .map(|f| FieldDocument {
                    name: f.name().to_owned(),
                    field_type: f.field_type(),
                    default: f.default_value().map(Value::to_json),
                })
                .collect(),
            rows: table
                .rows()
                .iter()
                .map(|row| row.iter().map(Value::to_json).collect())
                .collect(),
        }
    }

    /// Build the table, converting every JSON value through the table's
    /// conversion mode.
    pub fn into_table(self) -> Result<Table, TableError> {
        let mut table = Table::new(self.name).with_settings(self.settings);
        table.set_mode(self.mode);

        for doc in self.fields {
            let field = match &doc.default {
                Some(json) => Field::with_default(doc.name, doc.field_type, json_value(json, doc.field_type)),
                None => Field::new(doc.name, doc.field_type),
            };
            table.add_field(field);
        }

        let types: Vec<FieldType> = table.fields().iter().map(Field::field_type).collect();
        for row in self.rows {
            if row.len() != types.len() {
                return Err(TableError::RowLength { expected: types.len(), found: row.len() });
            }
            let values: Vec<Value> = row.iter().zip(&types).map(|(json, &ty)| json_value(json, ty)).collect();
            table.add_row(values)?;
        }
        Ok(table)
    }
}

/// The typed value when the JSON decodes as `field_type`; otherwise the
/// closest untyped value, so the table's conversion mode decides.
fn json_value(json: &serde_json::Value, field_type: FieldType) -> Value {
    use serde_json::Value as J;
    if let Some(value) = Value::from_json(json, field_type) {
        return value;
    }
    match json {
        J::Bool(b) => Value::U8(*b as u8),
        J::Number(n) => match (n.as_u64(), n.as_i64()) {
            (Some(u), _) => Value::U64(u),
            (None, Some(i)) => Value::I64(i),
            _ => Value::F64(n.as_f64().unwrap_or_default()),
        },
        J::String(s) => Value::String(s.clone()),
        other => Value::String(other.to_string()),
    }
}
