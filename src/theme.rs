use crate::model::{CodeRunState, Role};
use crate::notify::Severity;
use eframe::egui::{self, Color32, CornerRadius, FontId, Frame, Margin, Stroke, TextStyle};

#[derive(Debug, Clone)]
pub struct Theme {
    pub background: Color32,
    pub sidebar: Color32,
    pub card: Color32,
    pub card_hover: Color32,
    pub accent: Color32,
    pub accent_soft: Color32,
    pub user_bubble: Color32,
    pub assistant_bubble: Color32,
    pub success: Color32,
    pub warning: Color32,
    pub danger: Color32,
    pub text: Color32,
    pub text_muted: Color32,
    pub text_on_accent: Color32,
    pub border: Color32,
    pub augmented_tint: Color32,
    pub gap: f32,
    pub gap_large: f32,
    pub radius: u8,
    pub radius_large: u8,
    pub sidebar_width: f32,
    pub workflow_width: f32,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            background: Color32::from_rgb(0x10, 0x12, 0x17),
            sidebar: Color32::from_rgb(0x17, 0x1A, 0x21),
            card: Color32::from_rgb(0x1E, 0x23, 0x2C),
            card_hover: Color32::from_rgb(0x25, 0x2B, 0x36),
            accent: Color32::from_rgb(0x63, 0x66, 0xF1),
            accent_soft: Color32::from_rgb(0x4F, 0x46, 0xE5),
            user_bubble: Color32::from_rgb(0x4F, 0x46, 0xE5),
            assistant_bubble: Color32::from_rgb(0x1E, 0x23, 0x2C),
            success: Color32::from_rgb(0x22, 0xC5, 0x5E),
            warning: Color32::from_rgb(0xF5, 0x9E, 0x0B),
            danger: Color32::from_rgb(0xEF, 0x44, 0x44),
            text: Color32::from_rgb(0xE5, 0xE7, 0xEB),
            text_muted: Color32::from_rgb(0x9C, 0xA3, 0xAF),
            text_on_accent: Color32::WHITE,
            border: Color32::from_rgba_premultiplied(255, 255, 255, 16),
            augmented_tint: Color32::from_rgba_premultiplied(99, 102, 241, 36),
            gap: 8.0,
            gap_large: 16.0,
            radius: 8,
            radius_large: 12,
            sidebar_width: 260.0,
            workflow_width: 420.0,
        }
    }
}

impl Theme {
    pub fn apply_visuals(&self, ctx: &egui::Context) {
        let mut visuals = egui::Visuals::dark();
        visuals.panel_fill = self.background;
        visuals.window_fill = self.sidebar;
        visuals.override_text_color = Some(self.text);
        visuals.hyperlink_color = self.accent;
        visuals.selection.bg_fill = self.accent_soft;
        for widget in [
            &mut visuals.widgets.noninteractive,
            &mut visuals.widgets.inactive,
            &mut visuals.widgets.open,
        ] {
            widget.bg_fill = self.card;
            widget.weak_bg_fill = self.card;
            widget.bg_stroke = Stroke::NONE;
            widget.fg_stroke.color = self.text;
        }
        visuals.widgets.hovered.bg_fill = self.card_hover;
        visuals.widgets.hovered.weak_bg_fill = self.card_hover;
        visuals.widgets.hovered.bg_stroke = Stroke::new(1.0, self.border);
        visuals.widgets.active.bg_fill = self.accent_soft;
        visuals.widgets.active.weak_bg_fill = self.accent_soft;
        visuals.window_corner_radius = CornerRadius::same(self.radius_large);

        let mut style = (*ctx.style()).clone();
        style.visuals = visuals;
        style.spacing.item_spacing = egui::vec2(self.gap, self.gap);
        style.spacing.button_padding = egui::vec2(10.0, 6.0);
        style.text_styles.insert(TextStyle::Heading, FontId::proportional(18.0));
        style.text_styles.insert(TextStyle::Body, FontId::proportional(14.0));
        style.text_styles.insert(TextStyle::Button, FontId::proportional(14.0));
        style.text_styles.insert(TextStyle::Monospace, FontId::monospace(12.5));
        style.text_styles.insert(TextStyle::Small, FontId::proportional(11.5));
        ctx.set_style(style);
    }

    pub fn card_frame(&self) -> Frame {
        Frame::new()
            .fill(self.card)
            .inner_margin(Margin::same(12))
            .corner_radius(CornerRadius::same(self.radius_large))
            .stroke(Stroke::new(1.0, self.border))
    }

    pub fn sidebar_frame(&self) -> Frame {
        Frame::new()
            .fill(self.sidebar)
            .inner_margin(Margin::same(12))
    }

    pub fn bubble_frame(&self, role: Role) -> Frame {
        let fill = match role {
            Role::User => self.user_bubble,
            Role::Assistant => self.assistant_bubble,
        };
        Frame::new()
            .fill(fill)
            .inner_margin(Margin::symmetric(14, 10))
            .corner_radius(CornerRadius::same(self.radius_large))
    }

    pub fn step_frame(&self, augmented: bool) -> Frame {
        let fill = if augmented { self.augmented_tint } else { self.card };
        Frame::new()
            .fill(fill)
            .inner_margin(Margin::same(10))
            .corner_radius(CornerRadius::same(self.radius))
            .stroke(Stroke::new(1.0, self.border))
    }

    pub fn composer_frame(&self) -> Frame {
        Frame::new()
            .fill(self.card)
            .inner_margin(Margin::symmetric(12, 10))
            .corner_radius(CornerRadius::same(self.radius_large))
            .stroke(Stroke::new(1.0, self.border))
    }

    pub fn toast_frame(&self, severity: Severity) -> Frame {
        let (fill, stroke) = match severity {
            Severity::Info => (self.card, self.border),
            Severity::Destructive => (Color32::from_rgb(0x45, 0x14, 0x14), self.danger),
        };
        Frame::new()
            .fill(fill)
            .inner_margin(Margin::same(12))
            .corner_radius(CornerRadius::same(self.radius))
            .stroke(Stroke::new(1.0, stroke))
            .shadow(egui::epaint::Shadow {
                offset: [0, 6],
                blur: 20,
                spread: 0,
                color: Color32::from_rgba_premultiplied(0, 0, 0, 72),
            })
    }

    pub fn state_color(&self, state: CodeRunState) -> Color32 {
        match state {
            CodeRunState::Running => self.accent,
            CodeRunState::Paused | CodeRunState::WaitingForUser => self.warning,
            CodeRunState::Finished => self.success,
            CodeRunState::Aborted | CodeRunState::WindowClosed => self.danger,
            CodeRunState::Stopped => self.text_muted,
        }
    }
}
