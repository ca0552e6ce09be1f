use super::table::render_table;
use crate::display::{
    format_value, input_shape, parse_cell_input, records_value, DisplayTable, InputShape,
    KeyValueDisplay,
};
use crate::theme::Theme;
use eframe::egui::{self, RichText};
use serde_json::{Map, Value};

/// Draws a labelled object. Returns the whole updated object after an edit.
pub fn render_key_value(
    ui: &mut egui::Ui,
    theme: &Theme,
    display: &mut KeyValueDisplay,
    max_rows: usize,
    id_salt: impl std::hash::Hash,
) -> Option<Map<String, Value>> {
    if display.is_empty() {
        return None;
    }
    let base_id = ui.make_persistent_id(id_salt);

    let mut committed = None;
    ui.horizontal(|ui| {
        if let Some(title) = display.title() {
            ui.label(RichText::new(title).strong());
        }
        if display.is_editable() {
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.small_button("Reset").clicked() {
                    ui.data_mut(|data| {
                        for key in display.values().keys() {
                            data.remove::<String>(base_id.with(key.as_str()));
                        }
                    });
                    committed = Some(display.reset().clone());
                }
            });
        }
    });

    if let Some((key, value)) = display.single_value() {
        let (key, value) = (key.to_string(), value.clone());
        let id = base_id.with(key.as_str());
        if !display.is_editable() {
            render_value(ui, theme, &value, max_rows, id);
        } else if let Some(updated) = render_input(ui, theme, &value, max_rows, id) {
            committed = Some(display.set(&key, updated).clone());
        }
        return committed;
    }

    let entries: Vec<(String, String, Value)> = display
        .entries()
        .into_iter()
        .map(|entry| (entry.key.to_string(), entry.label, entry.value.clone()))
        .collect();

    egui::Grid::new(base_id.with("grid"))
        .num_columns(2)
        .spacing(egui::vec2(theme.gap_large, 6.0))
        .show(ui, |ui| {
            for (key, label, value) in &entries {
                ui.label(RichText::new(label).color(theme.text_muted));
                let id = base_id.with(key.as_str());
                ui.vertical(|ui| {
                    if !display.is_editable() {
                        render_value(ui, theme, value, max_rows, id);
                    } else if let Some(updated) = render_input(ui, theme, value, max_rows, id) {
                        committed = Some(display.set(key, updated).clone());
                    }
                });
                ui.end_row();
            }
        });

    committed
}

/// Editable value. Returns the new value once an edit is committed.
fn render_input(
    ui: &mut egui::Ui,
    theme: &Theme,
    value: &Value,
    max_rows: usize,
    id: egui::Id,
) -> Option<Value> {
    match input_shape(value) {
        InputShape::Cell => {
            let shown = format_value(value);
            let mut text = ui
                .data_mut(|data| data.get_temp::<String>(id))
                .unwrap_or_else(|| shown.clone());
            let response =
                ui.add(egui::TextEdit::singleline(&mut text).desired_width(f32::INFINITY));
            if response.changed() {
                ui.data_mut(|data| data.insert_temp(id, text.clone()));
            }
            if !response.lost_focus() {
                return None;
            }
            ui.data_mut(|data| data.remove::<String>(id));
            (text != shown).then(|| parse_cell_input(&text))
        }
        InputShape::Records(table) => {
            let mut table = table.with_max_rows(max_rows).editable(true);
            let expanded_id = id.with("expanded");
            let expanded = ui.data_mut(|data| data.get_temp::<bool>(expanded_id).unwrap_or(false));
            if expanded {
                table.toggle_rows();
            }
            let committed = render_table(ui, theme, &mut table, id).map(records_value);
            if table.is_expanded() != expanded {
                ui.data_mut(|data| data.insert_temp(expanded_id, table.is_expanded()));
            }
            committed
        }
        InputShape::ReadOnly => {
            render_value(ui, theme, value, max_rows, id);
            None
        }
    }
}

fn is_container(value: &Value) -> bool {
    matches!(value, Value::Array(_) | Value::Object(_))
}

/// Read-only value: arrays of uniform objects become a nested table.
pub fn render_value(ui: &mut egui::Ui, theme: &Theme, value: &Value, max_rows: usize, id: egui::Id) {
    if let Some(table) = DisplayTable::from_value(value) {
        let mut table = table.with_max_rows(max_rows);
        let expanded_id = id.with("expanded");
        let expanded = ui.data_mut(|data| data.get_temp::<bool>(expanded_id).unwrap_or(false));
        if expanded {
            table.toggle_rows();
        }
        render_table(ui, theme, &mut table, id);
        if table.is_expanded() != expanded {
            ui.data_mut(|data| data.insert_temp(expanded_id, table.is_expanded()));
        }
        return;
    }
    let text = format_value(value);
    if is_container(value) {
        ui.label(RichText::new(text).monospace().color(theme.text));
    } else {
        ui.label(RichText::new(text).color(theme.text));
    }
}
