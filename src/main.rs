mod app;
mod auth;
mod backend;
mod bridge;
mod chats;
mod config;
mod display;
mod error;
mod event;
mod format;
mod messages;
mod model;
mod notify;
mod route;
mod store;
mod sync;
mod theme;
mod ui;

use app::MacroChatApp;
use backend::BackendClient;
use bridge::WindowBridge;
use config::{default_log_path, AppConfig, BackendKind, LogConfig};
use eframe::egui;
use std::fs::{self, OpenOptions};
use std::io;
use std::sync::{mpsc, Arc, Mutex};
use store::{AuthProvider, ChatStore, MemoryStore, RestBackend, RestConfig};
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

/// A window has no console, so logs go to a file under the data directory.
fn init_logging(config: &LogConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));
    let path = default_log_path();
    if let Some(dir) = path.parent() {
        let _ = fs::create_dir_all(dir);
    }
    match OpenOptions::new().create(true).append(true).open(&path) {
        Ok(file) => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
        }
        Err(err) => {
            eprintln!("log file {} unavailable: {err}", path.display());
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(io::sink)
                .try_init();
        }
    }
}

type Backends = (Arc<dyn ChatStore>, Arc<dyn AuthProvider>);

fn build_backend(config: &AppConfig) -> Result<Backends, error::RemoteError> {
    match config.backend.kind {
        BackendKind::Rest => {
            let rest = Arc::new(RestBackend::new(RestConfig {
                url: config.backend.url.clone(),
                anon_key: config.backend.anon_key.clone(),
                timeout: config.request_timeout(),
            })?);
            let store: Arc<dyn ChatStore> = rest.clone();
            let auth: Arc<dyn AuthProvider> = rest;
            Ok((store, auth))
        }
        BackendKind::Memory => {
            tracing::info!("using the in-memory demo backend");
            let memory = Arc::new(MemoryStore::with_demo_data());
            let store: Arc<dyn ChatStore> = memory.clone();
            let auth: Arc<dyn AuthProvider> = memory;
            Ok((store, auth))
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load()?;
    init_logging(&config.log);
    for (level, note) in config.take_notes() {
        if level == tracing::Level::WARN {
            tracing::warn!("{note}");
        } else {
            tracing::info!("{note}");
        }
    }
    tracing::info!(backend = ?config.backend.kind, "starting macro-chat");

    let (store, auth) = build_backend(&config)?;
    let (tx, rx) = mpsc::channel();
    let bridge = WindowBridge::new();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("macro-chat-runtime")
        .build()?;

    let backend = runtime.block_on(async {
        BackendClient::new(store, auth, tx, config.poll_interval())
    })?;

    let mut bridge_rx = bridge.subscribe();
    runtime.spawn(async move {
        loop {
            match bridge_rx.recv().await {
                Ok(message) => tracing::debug!(message = %message.to_json(), "bridge message"),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "bridge observer lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let app = MacroChatApp::new(rx, backend, bridge, &config);
    let _runtime = runtime;

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([960.0, 600.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Macro",
        native_options,
        Box::new(move |creation_context| {
            app.apply_theme(&creation_context.egui_ctx);
            Ok(Box::new(app))
        }),
    )?;

    Ok(())
}
