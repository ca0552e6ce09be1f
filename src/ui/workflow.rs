use super::event::UiAction;
use super::key_value::{render_key_value, render_value};
use super::table::render_table;
use crate::display::{format_value, records_value, DisplayTable, KeyValueDisplay};
use crate::format::{format_function_name, shorten_prompt};
use crate::model::aggregate::{browser_events_by_function, prompt_for, workflow_steps, StepView};
use crate::model::steps::{ControlStep, FunctionStep};
use crate::model::{BrowserEvent, DataState, WorkflowStep};
use crate::theme::Theme;
use eframe::egui::{self, RichText};
use serde_json::Value;
use std::collections::HashMap;

/// Editable view of one step input.
#[derive(Debug)]
pub enum InputEditor {
    Fields(KeyValueDisplay),
    Records(DisplayTable),
}

impl InputEditor {
    /// Objects edit per key, arrays of uniform objects per cell. Anything
    /// else is shown read-only.
    fn for_input(input: &Value, max_rows: usize) -> Option<Self> {
        if input.is_object() {
            return Some(Self::Fields(
                KeyValueDisplay::from_value(input)
                    .with_title("Input")
                    .editable(true),
            ));
        }
        let table = DisplayTable::from_value(input)?;
        let original = table.edited().to_vec();
        Some(Self::Records(
            table
                .with_title("Input")
                .with_max_rows(max_rows)
                .editable(true)
                .with_original(original),
        ))
    }
}

/// Input editors of the open workflow, keyed by message id and step path.
///
/// Edits stay local to the panel. When the stored input of a step changes
/// underneath an editor, the editor is re-seeded and its edits are dropped.
#[derive(Debug, Default)]
pub struct WorkflowEditors {
    editors: HashMap<String, (Value, Option<InputEditor>)>,
}

impl WorkflowEditors {
    pub fn editor(
        &mut self,
        message_id: &str,
        path: &str,
        input: &Value,
        max_rows: usize,
    ) -> Option<&mut InputEditor> {
        let entry = self
            .editors
            .entry(format!("{message_id}/{path}"))
            .or_insert_with(|| (input.clone(), InputEditor::for_input(input, max_rows)));
        if entry.0 != *input {
            entry.0 = input.clone();
            match (&mut entry.1, input) {
                (Some(InputEditor::Fields(display)), Value::Object(map)) => {
                    display.set_data(map.clone());
                }
                (editor, input) => *editor = InputEditor::for_input(input, max_rows),
            }
        }
        entry.1.as_mut()
    }

    /// Drops editors that belong to other messages.
    pub fn retain_message(&mut self, message_id: &str) {
        let prefix = format!("{message_id}/");
        self.editors.retain(|key, _| key.starts_with(&prefix));
    }

    pub fn clear(&mut self) {
        self.editors.clear();
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.editors.len()
    }
}

pub fn render_workflow(
    ui: &mut egui::Ui,
    theme: &Theme,
    state: &DataState,
    message_id: &str,
    editors: &mut WorkflowEditors,
    max_rows: usize,
    emit: &mut dyn FnMut(UiAction),
) {
    ui.horizontal(|ui| {
        ui.heading("Workflow");
        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            if ui.small_button("x").on_hover_text("Close").clicked() {
                emit(UiAction::CloseWorkflow);
            }
            if ui.small_button("Jump to message").clicked() {
                emit(UiAction::Jump(message_id.to_string()));
            }
        });
    });
    ui.separator();

    let Some(message) = state.messages.get(message_id) else {
        ui.label(RichText::new("This message is no longer available").color(theme.text_muted));
        return;
    };
    if let Some(prompt) = prompt_for(state, message) {
        ui.label(RichText::new(shorten_prompt(&prompt.content)).color(theme.text_muted))
            .on_hover_text(prompt.content.as_str());
    }
    if let Some(error) = message.steps.error() {
        ui.label(RichText::new(error.to_string()).color(theme.danger));
    }
    let recorded = browser_events_by_function(state, message_id);
    if !recorded.is_empty() {
        egui::CollapsingHeader::new("Recorded functions")
            .id_salt(("recorded_functions", message_id))
            .show(ui, |ui| {
                for (function_name, events) in &recorded {
                    ui.label(format!(
                        "{}: {} events",
                        format_function_name(function_name),
                        events.len()
                    ));
                }
            });
    }
    let steps = workflow_steps(state, message);
    if steps.is_empty() {
        ui.label(RichText::new("This run has no steps").color(theme.text_muted));
        return;
    }

    let mut panel = StepPanel {
        theme,
        message_id,
        editors,
        max_rows,
        emit,
    };
    egui::ScrollArea::vertical()
        .id_salt(("workflow", message_id))
        .auto_shrink([false, false])
        .show(ui, |ui| {
            for (index, view) in steps.iter().enumerate() {
                panel.step(ui, view, &index.to_string());
                ui.add_space(theme.gap);
            }
        });
}

struct StepPanel<'a, 'e> {
    theme: &'a Theme,
    message_id: &'a str,
    editors: &'a mut WorkflowEditors,
    max_rows: usize,
    emit: &'a mut (dyn FnMut(UiAction) + 'e),
}

impl StepPanel<'_, '_> {
    fn step(&mut self, ui: &mut egui::Ui, view: &StepView<'_>, path: &str) {
        let frame = self.theme.step_frame(view.is_augmented());
        frame.show(ui, |ui| {
            ui.set_width(ui.available_width());
            ui.add_enabled_ui(!view.step.is_disabled(), |ui| match view.step {
                WorkflowStep::Function(step) => self.function(ui, step, &view.browser_events, path),
                WorkflowStep::Control(step) => self.control(ui, step, view, path),
            });
        });
    }

    fn function(
        &mut self,
        ui: &mut egui::Ui,
        step: &FunctionStep,
        browser_events: &[&BrowserEvent],
        path: &str,
    ) {
        let name = format_function_name(step.function_name.as_deref().unwrap_or_default());
        ui.horizontal(|ui| {
            ui.label(RichText::new(name).strong().color(self.theme.text));
            if step.disabled {
                ui.label(RichText::new("disabled").small().color(self.theme.text_muted));
            }
        });
        if let Some(description) = &step.description {
            ui.label(RichText::new(description).color(self.theme.text_muted));
        }

        if let Some(input) = step.input.as_ref().filter(|input| !input.is_null()) {
            let salt = ("input", self.message_id, path);
            let committed = match self.editors.editor(self.message_id, path, input, self.max_rows) {
                Some(InputEditor::Fields(display)) => {
                    render_key_value(ui, self.theme, display, self.max_rows, salt)
                        .map(Value::Object)
                }
                Some(InputEditor::Records(table)) => {
                    render_table(ui, self.theme, table, salt).map(records_value)
                }
                None => {
                    ui.label(RichText::new("Input").strong());
                    let id = ui.make_persistent_id(salt);
                    render_value(ui, self.theme, input, self.max_rows, id);
                    None
                }
            };
            if let Some(value) = committed {
                (self.emit)(UiAction::InputCommitted {
                    message_id: self.message_id.to_string(),
                    step: path.to_string(),
                    value,
                });
            }
        }

        if let Some(output) = step.output.as_ref().filter(|output| !output.is_null()) {
            ui.add_space(4.0);
            if output.is_object() {
                let mut display = KeyValueDisplay::from_value(output).with_title("Output");
                render_key_value(
                    ui,
                    self.theme,
                    &mut display,
                    self.max_rows,
                    ("output", self.message_id, path),
                );
            } else {
                ui.label(RichText::new("Output").strong());
                let id = ui.make_persistent_id(("output", self.message_id, path));
                render_value(ui, self.theme, output, self.max_rows, id);
            }
        }

        if !browser_events.is_empty() {
            egui::CollapsingHeader::new(format!("Browser events ({})", browser_events.len()))
                .id_salt(("step_browser_events", self.message_id, path))
                .show(ui, |ui| {
                    for event in browser_events {
                        ui.label(
                            RichText::new(event.created_at.format("%H:%M:%S").to_string())
                                .small()
                                .color(self.theme.text_muted),
                        );
                        let id = ui.make_persistent_id(("browser_event", event.id.as_str()));
                        render_value(ui, self.theme, &event.data, self.max_rows, id);
                    }
                });
        }
    }

    fn control(&mut self, ui: &mut egui::Ui, step: &ControlStep, view: &StepView<'_>, path: &str) {
        ui.horizontal(|ui| {
            ui.label(
                RichText::new(step.control_type.label())
                    .strong()
                    .color(self.theme.accent),
            );
            let value = format_value(&step.control_value);
            if !value.is_empty() {
                ui.label(RichText::new(value).monospace().color(self.theme.text));
            }
        });
        if let Some(description) = &step.control_description {
            ui.label(RichText::new(description).color(self.theme.text_muted));
        }
        ui.indent(("control", self.message_id, path), |ui| {
            for (index, child) in view.children.iter().enumerate() {
                self.step(ui, child, &format!("{path}.{index}"));
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(editor: Option<&mut InputEditor>) -> &mut KeyValueDisplay {
        match editor {
            Some(InputEditor::Fields(display)) => display,
            other => panic!("expected a field editor, got {other:?}"),
        }
    }

    #[test]
    fn editors_keep_local_edits_until_the_input_changes() {
        let mut editors = WorkflowEditors::default();
        let input = json!({"city": "Porto", "days": 3});

        fields(editors.editor("m1", "0", &input, 10)).set("city", json!("Lisbon"));
        assert_eq!(
            fields(editors.editor("m1", "0", &input, 10)).values().get("city"),
            Some(&json!("Lisbon"))
        );

        let updated = json!({"city": "Braga", "days": 3});
        let editor = fields(editors.editor("m1", "0", &updated, 10));
        assert_eq!(editor.values().get("city"), Some(&json!("Braga")));
        assert_eq!(editor.title(), Some("Input"));
        assert!(editor.is_editable());
    }

    #[test]
    fn record_inputs_get_a_resettable_table() {
        let mut editors = WorkflowEditors::default();
        let input = json!([{"name": "a", "qty": 1}, {"name": "b", "qty": 2}]);

        let Some(InputEditor::Records(table)) = editors.editor("m1", "1", &input, 1) else {
            panic!("expected a table editor");
        };
        assert!(table.is_editable());
        assert!(table.has_original());
        assert_eq!(table.toggle_label().as_deref(), Some("Show All (2)"));

        table.edit_cell(0, "qty", "5");
        assert_eq!(table.edited()[0].get("qty"), Some(&json!(5)));
        assert_eq!(table.reset()[0].get("qty"), Some(&json!(1)));
    }

    #[test]
    fn scalar_inputs_have_no_editor() {
        let mut editors = WorkflowEditors::default();
        assert!(editors.editor("m1", "0", &json!("https://example.com"), 10).is_none());
        assert!(editors.editor("m1", "1", &json!([1, 2, 3]), 10).is_none());
    }

    #[test]
    fn editors_are_scoped_by_message_and_step_path() {
        let mut editors = WorkflowEditors::default();
        let input = json!({"query": "rust"});
        editors.editor("m1", "0", &input, 10);
        editors.editor("m1", "2.0", &input, 10);
        editors.editor("m2", "0", &input, 10);
        assert_eq!(editors.len(), 3);

        editors.retain_message("m1");
        assert_eq!(editors.len(), 2);

        editors.clear();
        assert_eq!(editors.len(), 0);
    }
}
