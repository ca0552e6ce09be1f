use super::value::parse_cell_input;
use serde_json::{Map, Value};

pub type Record = Map<String, Value>;

pub const DEFAULT_MAX_ROWS: usize = 10;

/// State behind a tabular view of uniform records.
///
/// Columns come from the first record. Rows past `max_rows` stay hidden until
/// the user asks for the full table. In editable mode every cell edit is typed
/// with [`parse_cell_input`] and the whole edited set is handed back.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayTable {
    title: Option<String>,
    data: Vec<Record>,
    original: Option<Vec<Record>>,
    edited: Vec<Record>,
    max_rows: usize,
    show_full: bool,
    editable: bool,
}

impl DisplayTable {
    pub fn new(data: Vec<Record>) -> Self {
        Self {
            title: None,
            edited: data.clone(),
            data,
            original: None,
            max_rows: DEFAULT_MAX_ROWS,
            show_full: false,
            editable: false,
        }
    }

    /// Builds a table from a JSON array of objects; `None` for anything else.
    pub fn from_value(value: &Value) -> Option<Self> {
        let rows = value.as_array()?;
        if rows.is_empty() {
            return None;
        }
        let records = rows
            .iter()
            .map(|row| row.as_object().cloned())
            .collect::<Option<Vec<Record>>>()?;
        Some(Self::new(records))
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows;
        self
    }

    pub fn editable(mut self, editable: bool) -> Self {
        self.editable = editable;
        self
    }

    pub fn with_original(mut self, original: Vec<Record>) -> Self {
        self.original = Some(original);
        self
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn is_editable(&self) -> bool {
        self.editable
    }

    pub fn has_original(&self) -> bool {
        self.original.is_some()
    }

    /// No rows, or a first row without keys: nothing to draw.
    pub fn is_empty(&self) -> bool {
        self.data.first().map_or(true, Map::is_empty)
    }

    pub fn columns(&self) -> Vec<&str> {
        self.data
            .first()
            .map(|first| first.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn row_count(&self) -> usize {
        self.data.len()
    }

    pub fn has_more_rows(&self) -> bool {
        self.data.len() > self.max_rows
    }

    pub fn is_expanded(&self) -> bool {
        self.show_full
    }

    pub fn toggle_label(&self) -> Option<String> {
        if !self.has_more_rows() {
            return None;
        }
        Some(if self.show_full {
            "Show Less".to_string()
        } else {
            format!("Show All ({})", self.data.len())
        })
    }

    pub fn toggle_rows(&mut self) {
        self.show_full = !self.show_full;
    }

    /// Rows currently on screen: the edited copy in editable mode, the source
    /// rows otherwise, capped unless expanded.
    pub fn visible_rows(&self) -> &[Record] {
        let rows = if self.editable {
            &self.edited
        } else {
            &self.data
        };
        if self.show_full {
            rows.as_slice()
        } else {
            &rows[..rows.len().min(self.max_rows)]
        }
    }

    pub fn edited(&self) -> &[Record] {
        &self.edited
    }

    /// Applies typed `input` to one cell and returns the full edited set.
    pub fn edit_cell(&mut self, row: usize, column: &str, input: &str) -> &[Record] {
        match self.edited.get_mut(row) {
            Some(record) => {
                record.insert(column.to_string(), parse_cell_input(input));
            }
            None => tracing::warn!(row, column, "edit for a row outside the table"),
        }
        &self.edited
    }

    /// Restores the supplied original, or the rows the table was built with.
    pub fn reset(&mut self) -> &[Record] {
        self.edited = self.original.clone().unwrap_or_else(|| self.data.clone());
        &self.edited
    }

}

pub fn records_value(records: Vec<Record>) -> Value {
    Value::Array(records.into_iter().map(Value::Object).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(count: usize) -> Vec<Record> {
        (0..count)
            .map(|index| {
                json!({"name": format!("row {index}"), "index": index})
                    .as_object()
                    .cloned()
                    .expect("fixture row is an object")
            })
            .collect()
    }

    #[test]
    fn fifteen_rows_cap_at_ten_until_expanded() {
        let mut table = DisplayTable::new(rows(15)).with_max_rows(10);
        assert_eq!(table.visible_rows().len(), 10);
        assert_eq!(table.toggle_label().as_deref(), Some("Show All (15)"));

        table.toggle_rows();
        assert_eq!(table.visible_rows().len(), 15);
        assert_eq!(table.toggle_label().as_deref(), Some("Show Less"));

        table.toggle_rows();
        assert_eq!(table.visible_rows().len(), 10);
    }

    #[test]
    fn short_tables_have_no_toggle() {
        let table = DisplayTable::new(rows(3));
        assert_eq!(table.visible_rows().len(), 3);
        assert!(table.toggle_label().is_none());
    }

    #[test]
    fn columns_follow_first_record_key_order() {
        let table = DisplayTable::from_value(&json!([{"zeta": 1, "alpha": 2}, {"zeta": 3}]))
            .expect("array of objects");
        assert_eq!(table.columns(), vec!["zeta", "alpha"]);
    }

    #[test]
    fn empty_inputs_render_nothing() {
        assert!(DisplayTable::new(Vec::new()).is_empty());
        assert!(DisplayTable::new(vec![Record::new()]).is_empty());
        assert!(DisplayTable::from_value(&json!([])).is_none());
        assert!(DisplayTable::from_value(&json!([1, 2])).is_none());
        assert!(DisplayTable::from_value(&json!({"a": 1})).is_none());
    }

    #[test]
    fn edits_are_typed_and_emit_full_record_set() {
        let mut table = DisplayTable::new(rows(2)).editable(true);
        let emitted = table.edit_cell(1, "index", "42").to_vec();
        assert_eq!(emitted.len(), 2);
        assert_eq!(emitted[1]["index"], json!(42));

        let emitted = table.edit_cell(0, "name", r#"{"a":1}"#).to_vec();
        assert_eq!(emitted[0]["name"], json!({"a": 1}));
        assert_eq!(emitted[1]["index"], json!(42));
    }

    #[test]
    fn reset_restores_original_snapshot_after_edits() {
        let original = rows(3);
        let mut table = DisplayTable::new(rows(3))
            .editable(true)
            .with_original(original.clone());
        table.edit_cell(0, "name", "changed");
        table.edit_cell(2, "index", "true");

        let restored = table.reset().to_vec();
        assert_eq!(restored, original);

        // The restored rows are a copy: editing again leaves the snapshot alone.
        table.edit_cell(0, "name", "again");
        assert_eq!(table.reset(), original.as_slice());
    }

    #[test]
    fn reset_without_original_uses_initial_rows() {
        let initial = rows(2);
        let mut table = DisplayTable::new(initial.clone()).editable(true);
        table.edit_cell(0, "index", "99");
        assert_ne!(table.edited(), initial.as_slice());
        assert_eq!(table.reset(), initial.as_slice());
    }

    #[test]
    fn editable_view_shows_edited_rows() {
        let mut table = DisplayTable::new(rows(12)).editable(true);
        table.edit_cell(0, "name", "edited");
        assert_eq!(table.visible_rows().len(), 10);
        assert_eq!(table.visible_rows()[0]["name"], json!("edited"));
    }
}
