use crate::notify::Notifications;
use crate::theme::Theme;
use eframe::egui::{self, RichText};

const TOAST_WIDTH: f32 = 320.0;

/// Stacks the live toasts in the bottom-right corner.
pub fn render_toasts(ctx: &egui::Context, theme: &Theme, notifications: &mut Notifications) {
    if notifications.is_empty() {
        return;
    }
    let mut dismissed = Vec::new();
    egui::Area::new(egui::Id::new("toasts"))
        .anchor(egui::Align2::RIGHT_BOTTOM, egui::vec2(-theme.gap_large, -theme.gap_large))
        .order(egui::Order::Foreground)
        .show(ctx, |ui| {
            for notification in notifications.iter() {
                theme.toast_frame(notification.severity).show(ui, |ui| {
                    ui.set_width(TOAST_WIDTH);
                    ui.horizontal(|ui| {
                        ui.vertical(|ui| {
                            ui.label(RichText::new(&notification.title).strong().color(theme.text));
                            if !notification.description.is_empty() {
                                ui.add(
                                    egui::Label::new(
                                        RichText::new(&notification.description)
                                            .small()
                                            .color(theme.text_muted),
                                    )
                                    .wrap(),
                                );
                            }
                        });
                        ui.with_layout(egui::Layout::right_to_left(egui::Align::TOP), |ui| {
                            if ui.small_button("x").clicked() {
                                dismissed.push(notification.id);
                            }
                        });
                    });
                });
                ui.add_space(theme.gap);
            }
        });
    for id in dismissed {
        notifications.dismiss(id);
    }
}
