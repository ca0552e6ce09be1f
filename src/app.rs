use crate::auth::{AuthState, Gate, LoginForm};
use crate::backend::BackendClient;
use crate::bridge::{BridgeMessage, WindowBridge};
use crate::chats::{ChatCollection, ChatOutcome, DEFAULT_CHAT_TITLE};
use crate::config::AppConfig;
use crate::event::AppEvent;
use crate::messages::ChatSession;
use crate::notify::Notifications;
use crate::route::Route;
use crate::sync::RealtimeHandle;
use crate::theme::Theme;
use crate::ui::{
    render_chat_list, render_login, render_messages, render_toasts, render_workflow, RenameDraft,
    UiAction, WorkflowEditors,
};
use eframe::egui::{self, RichText, ScrollArea};
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

/// Background results arrive without waking the UI, so the window polls.
const EVENT_POLL: Duration = Duration::from_millis(200);
const MAX_DIAGNOSTICS: usize = 500;

pub struct MacroChatApp {
    rx: Receiver<AppEvent>,
    backend: BackendClient,
    bridge: WindowBridge,
    bridge_rx: broadcast::Receiver<BridgeMessage>,
    theme: Theme,
    table_max_rows: usize,
    route: Route,
    auth: AuthState,
    login: LoginForm,
    chats: ChatCollection,
    session: Option<ChatSession>,
    realtime: Option<RealtimeHandle>,
    notifications: Notifications,
    diagnostics_log: Vec<String>,
    workflow: Option<String>,
    editors: WorkflowEditors,
    rename: Option<RenameDraft>,
    scroll_to: Option<String>,
}

impl MacroChatApp {
    pub fn new(
        rx: Receiver<AppEvent>,
        backend: BackendClient,
        bridge: WindowBridge,
        config: &AppConfig,
    ) -> Self {
        let bridge_rx = bridge.subscribe();
        backend.restore_session();
        Self {
            rx,
            backend,
            bridge,
            bridge_rx,
            theme: Theme::default(),
            table_max_rows: config.ui.table_max_rows,
            route: Route::Home,
            auth: AuthState::restoring(),
            login: LoginForm::default(),
            chats: ChatCollection::default(),
            session: None,
            realtime: None,
            notifications: Notifications::new(config.notification_ttl()),
            diagnostics_log: Vec::new(),
            workflow: None,
            editors: WorkflowEditors::default(),
            rename: None,
            scroll_to: None,
        }
    }

    pub fn apply_theme(&self, ctx: &egui::Context) {
        self.theme.apply_visuals(ctx);
    }

    fn log_diagnostic(&mut self, message: impl Into<String>) {
        let stamp = chrono::Local::now().format("%H:%M:%S");
        self.diagnostics_log.push(format!("[{stamp}] {}", message.into()));
        if self.diagnostics_log.len() > MAX_DIAGNOSTICS {
            let excess = self.diagnostics_log.len() - MAX_DIAGNOSTICS;
            self.diagnostics_log.drain(..excess);
        }
    }

    fn owner(&self) -> Option<String> {
        self.auth.user().map(|user| user.id.clone())
    }

    fn is_watching(&self, chat_id: &str) -> bool {
        self.realtime.as_ref().map(RealtimeHandle::chat_id) == Some(chat_id)
    }

    fn navigate(&mut self, route: Route) {
        if route == self.route && (route.chat_id().is_none() || self.session.is_some()) {
            return;
        }
        self.log_diagnostic(format!("navigate {route}"));
        match route.chat_id() {
            Some(chat_id) => self.open_chat(chat_id.to_string()),
            None => self.close_chat(),
        }
        self.route = route;
    }

    fn open_chat(&mut self, chat_id: String) {
        if self.session.as_ref().map(ChatSession::chat_id) == Some(chat_id.as_str()) {
            return;
        }
        self.close_workflow();
        self.scroll_to = None;
        self.realtime = Some(self.backend.watch_chat(&chat_id));
        self.backend.load_chat(&chat_id);
        self.session = Some(ChatSession::new(chat_id.clone()));
        self.chats.select(Some(chat_id));
    }

    fn close_chat(&mut self) {
        self.close_workflow();
        self.realtime = None;
        self.session = None;
        self.scroll_to = None;
        self.chats.select(None);
    }

    fn close_workflow(&mut self) {
        self.workflow = None;
        self.editors.clear();
    }

    fn drain_events(&mut self) {
        loop {
            match self.rx.try_recv() {
                Ok(event) => self.apply_event(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.log_diagnostic("event channel disconnected");
                    break;
                }
            }
        }
    }

    fn drain_bridge(&mut self) {
        loop {
            match self.bridge_rx.try_recv() {
                Ok(BridgeMessage::Jump { message_id }) => {
                    self.log_diagnostic(format!("jump to message {message_id}"));
                    let open = self
                        .session
                        .as_ref()
                        .is_some_and(|session| session.state.messages.contains(&message_id));
                    if open {
                        self.scroll_to = Some(message_id);
                    } else {
                        self.notifications
                            .info("Message not found", "It is not part of the open chat.");
                    }
                }
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    self.log_diagnostic(format!("bridge lagged, {skipped} messages skipped"));
                }
                Err(_) => break,
            }
        }
    }

    fn apply_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::SessionRestored(Ok(user)) => {
                self.auth.resolve(user.clone());
                if let Some(user) = user {
                    self.log_diagnostic(format!("session restored for {}", user.id));
                    self.chats.begin_fetch();
                    self.backend.fetch_chats(&user.id);
                }
            }
            AppEvent::SessionRestored(Err(error)) => {
                tracing::warn!(%error, "session restore failed");
                self.log_diagnostic(format!("session restore failed: {error}"));
                self.auth.resolve(None);
            }
            AppEvent::SignedIn(result) => {
                self.login.finish(&result);
                match result {
                    Ok(user) => {
                        self.log_diagnostic(format!("signed in as {}", user.id));
                        self.chats.begin_fetch();
                        self.backend.fetch_chats(&user.id);
                        let next = self.auth.after_login(user);
                        self.navigate(next);
                    }
                    Err(error) => self.log_diagnostic(format!("sign in failed: {error}")),
                }
            }
            AppEvent::SignedOut(Ok(())) => self.log_diagnostic("signed out"),
            AppEvent::SignedOut(Err(error)) => {
                self.log_diagnostic(format!("sign out failed: {error}"));
                self.notifications.error("Error signing out", &error);
            }
            AppEvent::Chats(outcome) => self.apply_chat_outcome(outcome),
            AppEvent::Messages(outcome) => match self.session.as_mut() {
                Some(session) => session.apply(outcome, &mut self.notifications),
                None => tracing::debug!("discarding message result with no open chat"),
            },
            AppEvent::Realtime { chat_id, changes } => {
                if !self.is_watching(&chat_id) {
                    tracing::debug!(chat = %chat_id, "discarding changes from a stopped poller");
                    return;
                }
                if let Some(session) = self
                    .session
                    .as_mut()
                    .filter(|session| session.chat_id() == chat_id)
                {
                    session.apply_changes(changes);
                }
            }
            AppEvent::RealtimeError { chat_id, error } => {
                if self.is_watching(&chat_id) {
                    self.log_diagnostic(format!("realtime error: {error}"));
                    self.notifications.error("Error syncing messages", &error);
                }
            }
        }
    }

    fn apply_chat_outcome(&mut self, outcome: ChatOutcome) {
        let Some(current) = self.owner() else {
            tracing::debug!("discarding chat result after sign out");
            return;
        };
        if let ChatOutcome::Fetched { owner, .. } = &outcome {
            if *owner != current {
                tracing::debug!(%owner, "discarding chat list fetched for another user");
                return;
            }
        }
        let deleted = match &outcome {
            ChatOutcome::Deleted { id, result: Ok(()) } => Some(id.clone()),
            _ => None,
        };
        let created = self.chats.apply(outcome, &mut self.notifications);
        if let Some(id) = created {
            self.navigate(Route::Chat(id));
        } else if let Some(id) = deleted {
            if self.route.chat_id() == Some(id.as_str()) {
                self.navigate(Route::Home);
            }
        }
    }

    fn handle_action(&mut self, action: UiAction) {
        tracing::debug!(action = %action.to_log_line(), "ui action");
        self.log_diagnostic(action.to_log_line());
        let owner = self.owner();
        match action {
            UiAction::SelectChat(id) => self.navigate(Route::Chat(id)),
            UiAction::CreateChat => {
                if let Some(owner) = owner {
                    self.backend.create_chat(&owner, DEFAULT_CHAT_TITLE);
                }
            }
            UiAction::DeleteChat(id) => {
                if owner.is_some() {
                    self.backend.delete_chat(&id);
                }
            }
            UiAction::RenameChat { id, title } => {
                if owner.is_some() {
                    self.backend.rename_chat(&id, &title);
                }
            }
            UiAction::SignOut => {
                self.backend.sign_out();
                self.auth.sign_out();
                self.chats.clear();
                self.login = LoginForm::default();
                self.navigate(Route::Login);
            }
            UiAction::SendPrompt => {
                let (Some(owner), Some(session)) = (owner, self.session.as_mut()) else {
                    return;
                };
                if let Some(content) = session.composer.begin_submit() {
                    self.backend.send_message(&owner, session.chat_id(), content);
                }
            }
            UiAction::RunAction { message_id, action } => {
                let Some(session) = self.session.as_mut() else {
                    return;
                };
                if let Some(target) =
                    session.request_transition(&message_id, action, &mut self.notifications)
                {
                    self.backend
                        .change_code_run_state(&message_id, action, target);
                }
            }
            UiAction::OpenWorkflow(message_id) => {
                self.editors.retain_message(&message_id);
                self.workflow = Some(message_id);
            }
            UiAction::CloseWorkflow => self.close_workflow(),
            UiAction::Jump(message_id) => self.bridge.jump(&message_id),
            UiAction::InputCommitted {
                message_id, step, ..
            } => {
                tracing::info!(message = %message_id, %step, "step input edited");
            }
        }
    }

    fn render_loading(&self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.centered_and_justified(|ui| {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label(RichText::new("Loading...").color(self.theme.text_muted));
                });
            });
        });
    }

    fn render_login_screen(&mut self, ctx: &egui::Context) {
        let mut submitted = false;
        egui::CentralPanel::default().show(ctx, |ui| {
            submitted = render_login(ui, &self.theme, &mut self.login);
        });
        if submitted {
            if let Some((email, password)) = self.login.begin_submit() {
                self.log_diagnostic(format!("signing in as {email}"));
                self.backend.sign_in(email, password);
            }
        }
    }

    fn render_top_bar(&mut self, ctx: &egui::Context, emit: &mut dyn FnMut(UiAction)) {
        let email = self
            .auth
            .user()
            .and_then(|user| user.email.clone())
            .unwrap_or_default();
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.strong("Macro");
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("Sign out").clicked() {
                        emit(UiAction::SignOut);
                    }
                    ui.label(RichText::new(email).color(self.theme.text_muted));
                });
            });
        });
    }

    fn render_sidebar(&mut self, ctx: &egui::Context, emit: &mut dyn FnMut(UiAction)) {
        egui::SidePanel::left("chat_list_panel")
            .resizable(true)
            .default_width(self.theme.sidebar_width)
            .frame(self.theme.sidebar_frame())
            .show(ctx, |ui| {
                render_chat_list(ui, &self.theme, &self.chats, &mut self.rename, emit);
            });
    }

    fn render_workflow_panel(&mut self, ctx: &egui::Context, emit: &mut dyn FnMut(UiAction)) {
        let (Some(message_id), Some(session)) = (self.workflow.as_deref(), self.session.as_ref())
        else {
            return;
        };
        egui::SidePanel::right("workflow_panel")
            .resizable(true)
            .default_width(self.theme.workflow_width)
            .show(ctx, |ui| {
                render_workflow(
                    ui,
                    &self.theme,
                    &session.state,
                    message_id,
                    &mut self.editors,
                    self.table_max_rows,
                    emit,
                );
            });
    }

    fn render_diagnostics(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("diagnostics_panel").show(ctx, |ui| {
            egui::CollapsingHeader::new("Diagnostics")
                .default_open(false)
                .show(ui, |ui| {
                    ScrollArea::vertical()
                        .id_salt("diagnostics_log")
                        .max_height(90.0)
                        .stick_to_bottom(true)
                        .show(ui, |ui| {
                            for entry in &self.diagnostics_log {
                                ui.label(RichText::new(entry).monospace().small());
                            }
                        });
                });
        });
    }

    fn render_chat(&mut self, ctx: &egui::Context, emit: &mut dyn FnMut(UiAction)) {
        egui::CentralPanel::default().show(ctx, |ui| {
            let Some(session) = self.session.as_mut() else {
                ui.centered_and_justified(|ui| {
                    ui.label(RichText::new("Select or create a chat").color(self.theme.text_muted));
                });
                return;
            };

            let title = self
                .chats
                .selected_chat()
                .map(|chat| chat.title.clone())
                .unwrap_or_default();
            ui.heading(title);
            ui.separator();

            egui::TopBottomPanel::bottom("composer")
                .frame(egui::Frame::new().inner_margin(egui::Margin::symmetric(0, 8)))
                .show_inside(ui, |ui| {
                    self.theme.composer_frame().show(ui, |ui| {
                        render_composer(ui, session, emit);
                    });
                });
            egui::CentralPanel::default()
                .frame(egui::Frame::new())
                .show_inside(ui, |ui| {
                    render_messages(ui, &self.theme, session, &mut self.scroll_to, emit);
                });
        });
    }
}

fn render_composer(ui: &mut egui::Ui, session: &mut ChatSession, emit: &mut dyn FnMut(UiAction)) {
    let sending = session.composer.is_sending();
    let hint = if sending {
        "Sending..."
    } else {
        "Ask Macro to do something..."
    };
    ui.horizontal(|ui| {
        let send_width = 72.0;
        let response = ui.add_enabled(
            !sending,
            egui::TextEdit::singleline(&mut session.composer.input)
                .desired_width(ui.available_width() - send_width)
                .hint_text(hint),
        );
        let entered = response.lost_focus() && ui.input(|input| input.key_pressed(egui::Key::Enter));
        let clicked = ui
            .add_enabled(session.composer.can_submit(), egui::Button::new("Send"))
            .clicked();
        if clicked || entered {
            emit(UiAction::SendPrompt);
        }
    });
}

impl eframe::App for MacroChatApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_events();
        self.drain_bridge();

        let now = Instant::now();
        self.notifications.expire(now);
        let wait = self
            .notifications
            .next_expiry(now)
            .map_or(EVENT_POLL, |expiry| expiry.min(EVENT_POLL));
        ctx.request_repaint_after(wait);

        let mut actions = Vec::new();
        let mut emit = |action: UiAction| actions.push(action);
        match self.auth.gate(&self.route) {
            Gate::Loading => self.render_loading(ctx),
            Gate::Redirect(route) => {
                self.navigate(route);
                self.render_loading(ctx);
                ctx.request_repaint();
            }
            Gate::Allow(Route::Login) => self.render_login_screen(ctx),
            Gate::Allow(_) => {
                self.render_top_bar(ctx, &mut emit);
                self.render_sidebar(ctx, &mut emit);
                self.render_workflow_panel(ctx, &mut emit);
                self.render_diagnostics(ctx);
                self.render_chat(ctx, &mut emit);
            }
        }
        render_toasts(ctx, &self.theme, &mut self.notifications);

        for action in actions {
            self.handle_action(action);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::{at, text_message};
    use crate::model::{Chat, RowChange};
    use crate::error::RemoteError;
    use crate::notify::Severity;
    use crate::store::{MemoryStore, Principal};
    use std::sync::{mpsc, Arc};

    fn app() -> MacroChatApp {
        let store = Arc::new(MemoryStore::new());
        let (tx, rx) = mpsc::channel();
        let backend = BackendClient::new(store.clone(), store, tx, Duration::from_secs(60))
            .expect("runtime is running");
        MacroChatApp::new(rx, backend, WindowBridge::new(), &AppConfig::default())
    }

    fn principal() -> Principal {
        Principal {
            id: "user-1".to_string(),
            email: Some("ada@example.com".to_string()),
            access_token: String::new(),
        }
    }

    fn chat(id: &str) -> Chat {
        Chat {
            id: id.to_string(),
            title: "Trip".to_string(),
            created_at: at(0),
            uid: "user-1".to_string(),
            is_example: false,
            steps: Default::default(),
            script: None,
            response_id: None,
            requires_code_rewrite: None,
            code_approved: false,
            model_cost: None,
            apps: Vec::new(),
            user_inputs: Default::default(),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn login_replays_the_requested_chat() {
        let mut app = app();
        app.apply_event(AppEvent::SessionRestored(Ok(None)));
        app.route = Route::Chat("chat-9".to_string());
        assert_eq!(app.auth.gate(&app.route), Gate::Redirect(Route::Login));
        app.navigate(Route::Login);

        app.apply_event(AppEvent::SignedIn(Ok(principal())));
        assert_eq!(app.route, Route::Chat("chat-9".to_string()));
        assert_eq!(app.chats.selected(), Some("chat-9"));
        assert_eq!(
            app.session.as_ref().map(ChatSession::chat_id),
            Some("chat-9")
        );
        assert!(app.realtime.is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn deleting_the_open_chat_goes_home() {
        let mut app = app();
        app.apply_event(AppEvent::SessionRestored(Ok(Some(principal()))));
        app.apply_event(AppEvent::Chats(ChatOutcome::Created(Ok(chat("chat-1")))));
        assert_eq!(app.route, Route::Chat("chat-1".to_string()));

        app.apply_event(AppEvent::Chats(ChatOutcome::Deleted {
            id: "chat-1".to_string(),
            result: Ok(()),
        }));
        assert_eq!(app.route, Route::Home);
        assert!(app.session.is_none());
        assert!(app.realtime.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn sign_out_clears_local_state_immediately() {
        let mut app = app();
        app.apply_event(AppEvent::SessionRestored(Ok(Some(principal()))));
        app.apply_event(AppEvent::Chats(ChatOutcome::Created(Ok(chat("chat-1")))));
        app.handle_action(UiAction::OpenWorkflow("m1".to_string()));

        app.handle_action(UiAction::SignOut);
        assert!(app.auth.user().is_none());
        assert!(app.chats.chats().is_empty());
        assert!(app.session.is_none());
        assert!(app.workflow.is_none());
        assert_eq!(app.route, Route::Login);

        app.apply_event(AppEvent::Chats(ChatOutcome::Created(Ok(chat("late")))));
        assert!(app.chats.chats().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn chat_list_fetched_for_a_previous_user_is_dropped() {
        let mut app = app();
        app.apply_event(AppEvent::SessionRestored(Ok(Some(principal()))));
        app.handle_action(UiAction::SignOut);
        let other = Principal {
            id: "user-2".to_string(),
            email: None,
            access_token: String::new(),
        };
        app.apply_event(AppEvent::SignedIn(Ok(other)));

        app.apply_event(AppEvent::Chats(ChatOutcome::Fetched {
            owner: "user-1".to_string(),
            result: Ok(vec![chat("chat-1")]),
        }));
        assert!(app.chats.chats().is_empty());
        assert!(app.chats.is_loading());

        let mut mine = chat("chat-2");
        mine.uid = "user-2".to_string();
        app.apply_event(AppEvent::Chats(ChatOutcome::Fetched {
            owner: "user-2".to_string(),
            result: Ok(vec![mine]),
        }));
        assert_eq!(app.chats.chats().len(), 1);
        assert!(!app.chats.is_loading());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn jump_scrolls_the_chat_to_the_message() {
        let mut app = app();
        let mut session = ChatSession::new("chat-1");
        session.apply_changes(vec![RowChange::Message(text_message("m7", 0))]);
        app.session = Some(session);

        app.handle_action(UiAction::Jump("m7".to_string()));
        app.drain_bridge();
        assert_eq!(app.scroll_to.as_deref(), Some("m7"));
        assert!(app.notifications.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn changes_from_a_replaced_poller_are_ignored() {
        let mut app = app();
        app.apply_event(AppEvent::SessionRestored(Ok(Some(principal()))));
        app.navigate(Route::Chat("chat-1".to_string()));
        app.navigate(Route::Chat("chat-2".to_string()));

        app.apply_event(AppEvent::RealtimeError {
            chat_id: "chat-1".to_string(),
            error: RemoteError::Transport("offline".to_string()),
        });
        assert!(app.notifications.is_empty());

        app.apply_event(AppEvent::Realtime {
            chat_id: "chat-2".to_string(),
            changes: vec![RowChange::Message(text_message("m1", 0))],
        });
        let session = app.session.as_ref().expect("chat open");
        assert_eq!(session.chat_id(), "chat-2");
        assert!(session.state.messages.contains("m1"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn jump_to_a_message_outside_the_open_chat_only_informs() {
        let mut app = app();
        app.handle_action(UiAction::Jump("m7".to_string()));
        app.drain_bridge();
        assert_eq!(app.scroll_to, None);
        let toast = app.notifications.iter().next().expect("toast");
        assert_eq!(toast.severity, Severity::Info);
        assert_eq!(toast.title, "Message not found");
    }
}
