use super::event::UiAction;
use crate::chats::ChatCollection;
use crate::format::truncate_text;
use crate::theme::Theme;
use eframe::egui::{self, RichText};

const TITLE_CHARS: usize = 28;

/// Inline rename in progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameDraft {
    pub id: String,
    pub title: String,
}

pub fn render_chat_list(
    ui: &mut egui::Ui,
    theme: &Theme,
    chats: &ChatCollection,
    rename: &mut Option<RenameDraft>,
    emit: &mut dyn FnMut(UiAction),
) {
    let new_chat = egui::Button::new(RichText::new("+ New Chat").color(theme.text_on_accent))
        .fill(theme.accent_soft)
        .min_size(egui::vec2(ui.available_width(), 32.0));
    if ui.add(new_chat).clicked() {
        emit(UiAction::CreateChat);
    }
    ui.add_space(theme.gap);

    if chats.is_loading() && chats.chats().is_empty() {
        ui.label(RichText::new("Loading chats...").color(theme.text_muted));
        return;
    }
    if chats.chats().is_empty() {
        ui.label(RichText::new("No chats yet").color(theme.text_muted));
        return;
    }

    egui::ScrollArea::vertical()
        .id_salt("chat_list")
        .auto_shrink([false, false])
        .show(ui, |ui| {
            for chat in chats.chats() {
                if let Some(draft) = rename.as_mut().filter(|draft| draft.id == chat.id) {
                    let response = ui.add(
                        egui::TextEdit::singleline(&mut draft.title)
                            .desired_width(f32::INFINITY),
                    );
                    if !response.has_focus() && !response.lost_focus() {
                        response.request_focus();
                    }
                    if response.lost_focus() {
                        if ui.input(|input| input.key_pressed(egui::Key::Escape)) {
                            *rename = None;
                        } else {
                            emit(UiAction::RenameChat {
                                id: draft.id.clone(),
                                title: draft.title.clone(),
                            });
                            *rename = None;
                        }
                    }
                    continue;
                }

                let selected = chats.selected() == Some(chat.id.as_str());
                ui.horizontal(|ui| {
                    let label = truncate_text(&chat.title, TITLE_CHARS);
                    let response = ui
                        .add_sized(
                            [ui.available_width() - 28.0, 24.0],
                            egui::SelectableLabel::new(selected, label),
                        )
                        .on_hover_text("Double-click to rename");
                    if response.double_clicked() {
                        *rename = Some(RenameDraft {
                            id: chat.id.clone(),
                            title: chat.title.clone(),
                        });
                    } else if response.clicked() {
                        emit(UiAction::SelectChat(chat.id.clone()));
                    }
                    if ui
                        .small_button(RichText::new("x").color(theme.text_muted))
                        .on_hover_text("Delete chat")
                        .clicked()
                    {
                        emit(UiAction::DeleteChat(chat.id.clone()));
                    }
                });
            }
        });
}
