use super::event::UiAction;
use crate::format::{format_function_name, format_url};
use crate::messages::ChatSession;
use crate::model::aggregate::{render_model, CoderunView, MessageView};
use crate::model::{Message, Role};
use crate::theme::Theme;
use eframe::egui::{self, RichText};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

const HIGHLIGHT_SECS: f64 = 1.0;
const BUBBLE_WIDTH: f32 = 0.8;

pub fn render_messages(
    ui: &mut egui::Ui,
    theme: &Theme,
    session: &ChatSession,
    scroll_to: &mut Option<String>,
    emit: &mut dyn FnMut(UiAction),
) {
    if session.is_loading() {
        ui.centered_and_justified(|ui| {
            ui.label(RichText::new("Loading messages...").color(theme.text_muted));
        });
        return;
    }

    let views = render_model(&session.state);
    let empty = session.state.messages.is_empty();
    egui::ScrollArea::vertical()
        .id_salt(("messages", session.chat_id()))
        .auto_shrink([false, false])
        .stick_to_bottom(true)
        .show(ui, |ui| {
            if empty {
                ui.add_space(theme.gap_large);
                ui.vertical_centered(|ui| {
                    ui.label(
                        RichText::new("Send a message to start the conversation")
                            .color(theme.text_muted),
                    );
                });
                return;
            }
            for view in &views {
                let message = view.message();
                let response = render_message(ui, theme, session, view, emit);
                if scroll_to.as_deref() == Some(message.id.as_str()) {
                    response.scroll_to_me(Some(egui::Align::Center));
                    *scroll_to = None;
                }
                ui.add_space(theme.gap);
            }
        });
}

fn render_message(
    ui: &mut egui::Ui,
    theme: &Theme,
    session: &ChatSession,
    view: &MessageView<'_>,
    emit: &mut dyn FnMut(UiAction),
) -> egui::Response {
    let message = view.message();
    let highlighted = content_changed_recently(ui, message);
    let align = match message.role {
        Role::User => egui::Align::Max,
        Role::Assistant => egui::Align::Min,
    };
    let max_width = ui.available_width() * BUBBLE_WIDTH;

    ui.with_layout(egui::Layout::top_down(align), |ui| {
        let mut frame = match view {
            MessageView::Text(_) | MessageView::Fallback(_) => theme.bubble_frame(message.role),
            _ => theme.card_frame(),
        };
        if highlighted {
            frame = frame.stroke(egui::Stroke::new(2.0, theme.accent));
        }
        frame.show(ui, |ui| {
            ui.set_max_width(max_width);
            ui.with_layout(egui::Layout::top_down(egui::Align::Min), |ui| {
                let text_color = match message.role {
                    Role::User => theme.text_on_accent,
                    Role::Assistant => theme.text,
                };
                if !message.content.is_empty() {
                    ui.add(egui::Label::new(RichText::new(&message.content).color(text_color)).wrap());
                }
                if message.text_is_currently_streaming {
                    ui.spinner();
                }
                match view {
                    MessageView::Text(_) | MessageView::Fallback(_) => {}
                    MessageView::CodeRun { steps, coderun, .. } => {
                        render_run_controls(ui, theme, session, message, emit);
                        if let Some(error) = message.steps.error() {
                            ui.label(
                                RichText::new(format!("Workflow could not be read: {error}"))
                                    .color(theme.danger)
                                    .small(),
                            );
                        }
                        if let Some(error) = &message.code_run_error {
                            ui.label(RichText::new(error).color(theme.danger).small());
                        }
                        if !steps.is_empty() {
                            let label = format!("Open workflow ({} steps)", steps.len());
                            if ui.button(label).clicked() {
                                emit(UiAction::OpenWorkflow(message.id.clone()));
                            }
                        }
                        render_coderun_events(ui, theme, coderun);
                    }
                    MessageView::ScreenRecording { url, .. } => {
                        if let Some(url) = url {
                            ui.separator();
                            ui.label(RichText::new("Screen Recording:").strong());
                            ui.hyperlink_to(format_url(url), *url);
                        }
                    }
                    MessageView::ConnectApp { apps, .. } => {
                        ui.separator();
                        ui.label(RichText::new("Connect your apps to continue:").strong());
                        ui.horizontal_wrapped(|ui| {
                            for app in apps.iter() {
                                ui.label(RichText::new(format_function_name(app)).color(theme.accent));
                            }
                        });
                    }
                }
            });
        });
    })
    .response
}

fn render_run_controls(
    ui: &mut egui::Ui,
    theme: &Theme,
    session: &ChatSession,
    message: &Message,
    emit: &mut dyn FnMut(UiAction),
) {
    let Some(state) = message.code_run_state else {
        return;
    };
    ui.horizontal(|ui| {
        let badge = ui.label(
            RichText::new(state.label())
                .color(theme.state_color(state))
                .small()
                .strong(),
        );
        if state.is_external() {
            badge.on_hover_text("Set by the runner");
        }
        let busy = session.controls.is_busy(&message.id);
        for &action in state.available_actions() {
            if ui
                .add_enabled(!busy, egui::Button::new(action.label()).small())
                .clicked()
            {
                emit(UiAction::RunAction {
                    message_id: message.id.clone(),
                    action,
                });
            }
        }
        if busy {
            ui.spinner();
        }
    });
}

fn render_coderun_events(ui: &mut egui::Ui, theme: &Theme, coderun: &[CoderunView<'_>]) {
    if coderun.is_empty() {
        return;
    }
    ui.separator();
    ui.label(RichText::new("Code Run Events:").strong().small());
    for view in coderun {
        let event = view.event;
        ui.indent(("coderun", event.id.as_str()), |ui| {
            let mut line = event
                .description
                .clone()
                .unwrap_or_else(|| "Code execution".to_string());
            if let Some(title) = &event.progress_title {
                line.push_str(" - ");
                line.push_str(title);
            }
            ui.label(RichText::new(line).color(theme.text_muted).small());
            if let Some(progress) = event.progress() {
                ui.add(egui::ProgressBar::new(progress).desired_height(6.0));
            }
            if view.browser_events.is_empty() {
                return;
            }
            egui::CollapsingHeader::new(
                RichText::new(format!("Browser Events ({})", view.browser_events.len())).small(),
            )
            .id_salt(("browser_events", event.id.as_str()))
            .show(ui, |ui| {
                for browser_event in &view.browser_events {
                    let pretty = serde_json::to_string_pretty(&browser_event.data)
                        .unwrap_or_else(|_| browser_event.data.to_string());
                    egui::ScrollArea::vertical()
                        .id_salt(("browser_event", browser_event.id.as_str()))
                        .max_height(96.0)
                        .show(ui, |ui| {
                            ui.label(RichText::new(pretty).monospace().small());
                        });
                }
            });
        });
    }
}

/// True for about a second after a message's content changes.
fn content_changed_recently(ui: &egui::Ui, message: &Message) -> bool {
    let mut hasher = DefaultHasher::new();
    message.content.hash(&mut hasher);
    let digest = hasher.finish();
    let id = egui::Id::new(("message_content", message.id.as_str()));
    let now = ui.input(|input| input.time);

    let changed_at = ui.data_mut(|data| {
        match data.get_temp::<(u64, f64)>(id) {
            Some((seen, at)) if seen == digest => at,
            Some(_) => {
                data.insert_temp(id, (digest, now));
                now
            }
            None => {
                data.insert_temp(id, (digest, f64::NEG_INFINITY));
                f64::NEG_INFINITY
            }
        }
    });
    let recent = now - changed_at < HIGHLIGHT_SECS;
    if recent {
        ui.ctx().request_repaint();
    }
    recent
}
