use super::value::Value;

/// One record: a value per field, index-aligned with the owning table's
/// schema.  [`Table`](super::Table) checks arity and coerces values when a
/// row is added, and keeps `len() == fields().len()` afterwards.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    pub fn len(&self) -> usize { self.values.len() }

    pub fn is_empty(&self) -> bool { self.values.is_empty() }

    /// Value at `index`, or `None` when out of range.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn values(&self) -> &[Value] { &self.values }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.values.iter()
    }

    pub fn into_values(self) -> Vec<Value> { self.values }

    /// Replace the value at `index`.  Returns `false` when out of range.
    pub fn set(&mut self, index: usize, value: impl Into<Value>) -> bool {
        let value = value.into();
        match self.values.get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub(crate) fn insert(&mut self, index: usize, value: Value) {
        self.values.insert(index, value);
    }

    pub(crate) fn remove(&mut self, index: usize) -> Value {
        self.values.remove(index)
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Self { values }
    }
}

impl<'a> IntoIterator for &'a Row {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}
