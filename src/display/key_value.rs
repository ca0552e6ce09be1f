use crate::format::format_key_name;
use serde_json::{Map, Value};

/// Labelled view of a string-keyed object, optionally editable per key.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyValueDisplay {
    title: Option<String>,
    data: Map<String, Value>,
    local: Map<String, Value>,
    editable: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyValueEntry<'a> {
    pub key: &'a str,
    pub label: String,
    pub value: &'a Value,
}

impl KeyValueDisplay {
    pub fn new(data: Map<String, Value>) -> Self {
        Self {
            title: None,
            local: data.clone(),
            data,
            editable: false,
        }
    }

    /// Objects map directly; any other value is shown under a `value` key.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(map) => Self::new(map.clone()),
            Value::Null => Self::new(Map::new()),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other.clone());
                Self::new(map)
            }
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn editable(mut self, editable: bool) -> Self {
        self.editable = editable;
        self
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn is_editable(&self) -> bool {
        self.editable
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// A lone key is drawn as its bare value, without a label.
    pub fn single_value(&self) -> Option<(&str, &Value)> {
        if self.local.len() != 1 {
            return None;
        }
        self.local.iter().next().map(|(key, value)| (key.as_str(), value))
    }

    pub fn entries(&self) -> Vec<KeyValueEntry<'_>> {
        self.local
            .iter()
            .map(|(key, value)| KeyValueEntry {
                key,
                label: format_key_name(key),
                value,
            })
            .collect()
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.local
    }

    /// Patches one key and returns the whole updated object.
    pub fn set(&mut self, key: &str, value: Value) -> &Map<String, Value> {
        self.local.insert(key.to_string(), value);
        &self.local
    }

    /// Re-seeds from new source data, dropping local edits.
    pub fn set_data(&mut self, data: Map<String, Value>) {
        self.local = data.clone();
        self.data = data;
    }

    pub fn reset(&mut self) -> &Map<String, Value> {
        self.local = self.data.clone();
        &self.local
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::{input_shape, records_value, InputShape};
    use serde_json::json;

    #[test]
    fn entries_use_prettified_labels_in_key_order() {
        let display = KeyValueDisplay::from_value(&json!({"first_name": "Ada", "zip_code": 1000}));
        let labels: Vec<String> = display.entries().into_iter().map(|e| e.label).collect();
        assert_eq!(labels, vec!["First Name", "Zip Code"]);
        assert!(display.single_value().is_none());
    }

    #[test]
    fn single_key_is_shown_as_bare_value() {
        let display = KeyValueDisplay::from_value(&json!({"ret": [1, 2, 3]}));
        assert_eq!(display.single_value(), Some(("ret", &json!([1, 2, 3]))));
    }

    #[test]
    fn scalars_and_null_are_wrapped() {
        assert!(KeyValueDisplay::from_value(&Value::Null).is_empty());
        let display = KeyValueDisplay::from_value(&json!("done"));
        assert_eq!(display.single_value(), Some(("value", &json!("done"))));
    }

    #[test]
    fn set_patches_one_key_and_returns_everything() {
        let mut display =
            KeyValueDisplay::from_value(&json!({"city": "Porto", "days": 2})).editable(true);
        let updated = display.set("days", json!(5)).clone();
        assert_eq!(Value::Object(updated), json!({"city": "Porto", "days": 5}));

        assert_eq!(
            Value::Object(display.reset().clone()),
            json!({"city": "Porto", "days": 2})
        );
    }

    #[test]
    fn nested_records_in_a_lone_key_edit_back_into_the_object() {
        let mut display =
            KeyValueDisplay::from_value(&json!({"rows": [{"sku": "a", "qty": 1}]})).editable(true);
        let (key, value) = display
            .single_value()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .expect("one key");
        let InputShape::Records(table) = input_shape(&value) else {
            panic!("rows should be editable as a table");
        };
        let mut table = table.editable(true);
        let edited = records_value(table.edit_cell(0, "qty", "3").to_vec());

        let updated = display.set(&key, edited).clone();
        assert_eq!(Value::Object(updated), json!({"rows": [{"sku": "a", "qty": 3}]}));
        assert_eq!(
            Value::Object(display.reset().clone()),
            json!({"rows": [{"sku": "a", "qty": 1}]})
        );
    }
}
