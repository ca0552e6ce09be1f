use crate::display::{format_value, DisplayTable, Record};
use crate::format::format_key_name;
use crate::theme::Theme;
use eframe::egui::{self, RichText};

/// Draws `table` and returns the full edited record set when a cell edit is
/// committed or the table is reset.
pub fn render_table(
    ui: &mut egui::Ui,
    theme: &Theme,
    table: &mut DisplayTable,
    id_salt: impl std::hash::Hash,
) -> Option<Vec<Record>> {
    if table.is_empty() {
        return None;
    }
    let base_id = ui.make_persistent_id(id_salt);
    let columns: Vec<String> = table.columns().into_iter().map(str::to_string).collect();
    let mut committed = None;

    ui.horizontal(|ui| {
        if let Some(title) = table.title() {
            ui.label(RichText::new(title).strong());
        }
        if table.is_editable() && table.has_original() {
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.small_button("Reset").clicked() {
                    committed = Some(table.reset().to_vec());
                    ui.data_mut(|data| {
                        for row in 0..table.row_count() {
                            for column in &columns {
                                data.remove::<String>(base_id.with((row, column.as_str())));
                            }
                        }
                    });
                }
            });
        }
    });

    egui::ScrollArea::horizontal()
        .id_salt(base_id.with("scroll"))
        .show(ui, |ui| {
            egui::Grid::new(base_id.with("grid"))
                .striped(true)
                .spacing(egui::vec2(theme.gap_large, 4.0))
                .show(ui, |ui| {
                    for column in &columns {
                        ui.label(
                            RichText::new(format_key_name(column))
                                .color(theme.text_muted)
                                .small()
                                .strong(),
                        );
                    }
                    ui.end_row();

                    let visible = table.visible_rows().len();
                    for row in 0..visible {
                        for column in &columns {
                            let value = table
                                .visible_rows()
                                .get(row)
                                .and_then(|record| record.get(column))
                                .map(format_value)
                                .unwrap_or_default();
                            if !table.is_editable() {
                                ui.label(RichText::new(value).monospace());
                                continue;
                            }
                            let cell_id = base_id.with((row, column.as_str()));
                            let mut text = ui
                                .data_mut(|data| data.get_temp::<String>(cell_id))
                                .unwrap_or_else(|| value.clone());
                            let response = ui.add(
                                egui::TextEdit::singleline(&mut text)
                                    .desired_width(120.0)
                                    .font(egui::TextStyle::Monospace),
                            );
                            if response.changed() {
                                ui.data_mut(|data| data.insert_temp(cell_id, text.clone()));
                            }
                            if response.lost_focus() {
                                ui.data_mut(|data| data.remove::<String>(cell_id));
                                if text != value {
                                    committed = Some(table.edit_cell(row, column, &text).to_vec());
                                }
                            }
                        }
                        ui.end_row();
                    }
                });
        });

    if let Some(label) = table.toggle_label() {
        if ui.link(label).clicked() {
            table.toggle_rows();
        }
    }

    committed
}
