use crate::auth::LoginForm;
use crate::theme::Theme;
use eframe::egui::{self, RichText};

const FORM_WIDTH: f32 = 320.0;

/// Centered sign-in card. Returns `true` when the user submits.
pub fn render_login(ui: &mut egui::Ui, theme: &Theme, form: &mut LoginForm) -> bool {
    let mut submit = false;
    ui.vertical_centered(|ui| {
        ui.add_space(ui.available_height() * 0.2);
        theme.card_frame().show(ui, |ui| {
            ui.set_width(FORM_WIDTH);
            ui.vertical(|ui| {
                ui.heading("Sign in to Macro");
                ui.add_space(theme.gap);

                ui.label(RichText::new("Email").color(theme.text_muted));
                ui.add_enabled(
                    !form.is_submitting(),
                    egui::TextEdit::singleline(&mut form.email)
                        .hint_text("you@example.com")
                        .desired_width(f32::INFINITY),
                );
                ui.label(RichText::new("Password").color(theme.text_muted));
                let password = ui.add_enabled(
                    !form.is_submitting(),
                    egui::TextEdit::singleline(&mut form.password)
                        .password(true)
                        .desired_width(f32::INFINITY),
                );
                let entered = password.lost_focus() && ui.input(|input| input.key_pressed(egui::Key::Enter));

                if let Some(error) = form.error() {
                    ui.label(RichText::new(error).color(theme.danger));
                }
                ui.add_space(theme.gap);

                let label = if form.is_submitting() { "Signing in..." } else { "Sign in" };
                let button = egui::Button::new(RichText::new(label).color(theme.text_on_accent))
                    .fill(theme.accent_soft)
                    .min_size(egui::vec2(ui.available_width(), 32.0));
                let clicked = ui.add_enabled(!form.is_submitting(), button).clicked();
                submit = clicked || entered;
            });
        });
    });
    submit
}
