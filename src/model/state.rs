use super::{BrowserEvent, CoderunEvent, Message};
use std::collections::HashMap;

pub trait Keyed {
    fn key(&self) -> &str;
}

impl Keyed for Message {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Keyed for CoderunEvent {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Keyed for BrowserEvent {
    fn key(&self) -> &str {
        &self.id
    }
}

/// Id-keyed rows that iterate in first-insertion order.
///
/// Upserting an existing id replaces the row in its original slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Table<T> {
    rows: Vec<T>,
    index: HashMap<String, usize>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T: Keyed> Table<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.index.get(id).map(|&slot| &self.rows[slot])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Returns `true` when the id was not present before.
    pub fn upsert(&mut self, row: T) -> bool {
        match self.index.get(row.key()) {
            Some(&slot) => {
                self.rows[slot] = row;
                false
            }
            None => {
                self.index.insert(row.key().to_string(), self.rows.len());
                self.rows.push(row);
                true
            }
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<T> {
        let slot = self.index.remove(id)?;
        let row = self.rows.remove(slot);
        for position in self.index.values_mut() {
            if *position > slot {
                *position -= 1;
            }
        }
        Some(row)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl<T: Keyed> FromIterator<T> for Table<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut table = Self::new();
        for row in iter {
            table.upsert(row);
        }
        table
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableName {
    Messages,
    CoderunEvents,
    BrowserEvents,
}

impl TableName {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Messages => "messages",
            Self::CoderunEvents => "coderun_events",
            Self::BrowserEvents => "browser_events",
        }
    }
}

/// Row-level change delivered by realtime sync.
#[derive(Debug, Clone, PartialEq)]
pub enum RowChange {
    Message(Message),
    CoderunEvent(CoderunEvent),
    BrowserEvent(BrowserEvent),
    Removed { table: TableName, id: String },
}

/// Normalized cache of one chat's messages and run events.
///
/// Entities reference each other only by id, so each table can be patched
/// without touching the others.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataState {
    pub messages: Table<Message>,
    pub coderun_events: Table<CoderunEvent>,
    pub browser_events: Table<BrowserEvent>,
}

impl DataState {
    pub fn from_rows(
        messages: Vec<Message>,
        coderun_events: Vec<CoderunEvent>,
        browser_events: Vec<BrowserEvent>,
    ) -> Self {
        Self {
            messages: messages.into_iter().collect(),
            coderun_events: coderun_events.into_iter().collect(),
            browser_events: browser_events.into_iter().collect(),
        }
    }

    /// Merges one change; the incoming row wins over whatever is cached.
    pub fn apply(&mut self, change: RowChange) {
        match change {
            RowChange::Message(message) => {
                self.messages.upsert(message);
            }
            RowChange::CoderunEvent(event) => {
                self.coderun_events.upsert(event);
            }
            RowChange::BrowserEvent(event) => {
                self.browser_events.upsert(event);
            }
            RowChange::Removed { table, id } => {
                let removed = match table {
                    TableName::Messages => self.messages.remove(&id).is_some(),
                    TableName::CoderunEvents => self.coderun_events.remove(&id).is_some(),
                    TableName::BrowserEvents => self.browser_events.remove(&id).is_some(),
                };
                if !removed {
                    tracing::debug!(table = table.as_str(), %id, "removal for unknown row");
                }
            }
        }
    }

    pub fn apply_all(&mut self, changes: impl IntoIterator<Item = RowChange>) {
        for change in changes {
            self.apply(change);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::{browser_event, text_message};

    fn ids(table: &Table<Message>) -> Vec<&str> {
        table.iter().map(Keyed::key).collect()
    }

    #[test]
    fn upsert_keeps_first_insertion_slot() {
        let mut table: Table<Message> = Table::new();
        assert!(table.upsert(text_message("a", 1)));
        assert!(table.upsert(text_message("b", 2)));
        let mut updated = text_message("a", 1);
        updated.content = "edited".to_string();
        assert!(!table.upsert(updated));

        assert_eq!(ids(&table), vec!["a", "b"]);
        assert_eq!(table.get("a").map(|m| m.content.as_str()), Some("edited"));
    }

    #[test]
    fn remove_reindexes_later_rows() {
        let mut table: Table<Message> =
            ["a", "b", "c"].iter().map(|id| text_message(id, 0)).collect();
        assert!(table.remove("a").is_some());
        assert_eq!(table.get("c").map(|m| m.id.as_str()), Some("c"));
        assert_eq!(ids(&table), vec!["b", "c"]);
        assert!(table.remove("a").is_none());
    }

    #[test]
    fn apply_merges_by_id_last_write_wins() {
        let mut state = DataState::from_rows(vec![text_message("m1", 0)], vec![], vec![]);
        let mut streamed = text_message("m1", 0);
        streamed.content = "partial answer".to_string();
        state.apply(RowChange::Message(streamed.clone()));
        streamed.content = "partial answer, now complete".to_string();
        state.apply(RowChange::Message(streamed));
        state.apply(RowChange::BrowserEvent(browser_event("b1", "m1", Some("click"))));

        assert_eq!(state.messages.len(), 1);
        assert_eq!(
            state.messages.get("m1").map(|m| m.content.as_str()),
            Some("partial answer, now complete")
        );
        assert!(state.browser_events.contains("b1"));

        state.apply(RowChange::Removed {
            table: TableName::BrowserEvents,
            id: "b1".to_string(),
        });
        assert!(state.browser_events.is_empty());
    }
}
