use super::{JsonSink, Step};
use serde_json::Value;

impl JsonSink {
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }

    /// Append a finished value.
    pub fn append(&mut self, value: Value) {
        self.values.push(value);
    }

    /// Reverse the order of the appended values.
    pub fn reverse(&mut self) {
        self.values.reverse();
    }

    /// The accumulated data: null when nothing was appended, the value itself for a single
    /// append, an array otherwise.
    pub fn data(&self) -> Value {
        match self.values.len() {
            0 => Value::Null,
            1 => self.values[0].clone(),
            _ => Value::Array(self.values.clone()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Default for JsonSink {
    fn default() -> Self {
        Self::new()
    }
}

/// Graft `value` into `target` along the projection path, materializing objects and
/// null-padded arrays as needed.
pub(crate) fn insert_path(target: &mut Value, path: &[Step], value: Value) {
    match path.split_first() {
        None => *target = value,
        Some((step, rest)) => match step {
            Step::Key(key) => {
                if !target.is_object() {
                    *target = Value::Object(serde_json::Map::new());
                }
                let map = target.as_object_mut().unwrap();
                let slot = map.entry(key.clone()).or_insert(Value::Null);
                insert_path(slot, rest, value);
            }
            Step::Index(index) => {
                if !target.is_array() {
                    *target = Value::Array(Vec::new());
                }
                let array = target.as_array_mut().unwrap();
                while array.len() <= *index {
                    array.push(Value::Null);
                }
                insert_path(&mut array[*index], rest, value);
            }
        },
    }
}
