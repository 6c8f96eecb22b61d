use serde::{Deserialize, Serialize};
use tracing::warn;

use super::value::{FieldType, Value};
use super::TableError;

/// How a field's value is stored in the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageMode {
    /// One slot in every row record.
    #[default]
    PerRow,
    /// One value in the schema, shared by all rows.
    Constant,
    /// No storage at all; every row reads the type's zero sentinel.
    Absent,
}

/// A column definition.  The type tag never changes once the field exists.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    name:       String,
    field_type: FieldType,
    default:    Option<Value>,
    storage:    StorageMode,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            default: None,
            storage: StorageMode::PerRow,
        }
    }

    /// A field whose default is `default` coerced to `field_type`; an
    /// unconvertible default becomes the type's zero sentinel.
    pub fn with_default(name: impl Into<String>, field_type: FieldType, default: impl Into<Value>) -> Self {
        let mut field = Self::new(name, field_type);
        field.set_default(Some(default.into()));
        field
    }

    pub(crate) fn decoded(name: String, field_type: FieldType, default: Option<Value>, storage: StorageMode) -> Self {
        Self { name, field_type, default, storage }
    }

    pub fn name(&self) -> &str { &self.name }

    pub fn field_type(&self) -> FieldType { self.field_type }

    pub fn default_value(&self) -> Option<&Value> { self.default.as_ref() }

    /// Storage the field was decoded with; [`StorageMode::PerRow`] for
    /// fields built in memory.
    pub fn storage(&self) -> StorageMode { self.storage }

    /// Default value, or the type's zero sentinel when none is set.
    pub fn effective_default(&self) -> Value {
        self.default.clone().unwrap_or_else(|| self.field_type.zero())
    }

    pub fn set_default(&mut self, default: Option<Value>) {
        self.default = default.map(|v| {
            v.convert(self.field_type).unwrap_or_else(|| self.field_type.zero())
        });
    }

    /// Convert `value` into this field's type, falling back to the field
    /// default when it is not representable.
    pub fn coerce(&self, value: Value) -> Value {
        match value.convert(self.field_type) {
            Some(v) => v,
            None => {
                warn!(
                    field = %self.name,
                    expected = %self.field_type,
                    found = %value.field_type(),
                    "value not convertible, using field default"
                );
                self.effective_default()
            }
        }
    }

    /// Convert `value` into this field's type or fail.
    pub fn try_coerce(&self, value: Value) -> Result<Value, TableError> {
        let found = value.field_type();
        value.convert(self.field_type).ok_or_else(|| TableError::TypeMismatch {
            field:    self.name.clone(),
            expected: self.field_type,
            found,
        })
    }
}
