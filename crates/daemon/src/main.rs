// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! vtrecd: the archival daemon binary.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use vtrec_chat::{ChatCaptureCtx, ChatManager};
use vtrec_daemon::api::{self, AppState};
use vtrec_daemon::broadcast::Broadcaster;
use vtrec_daemon::engine::{Engine, EngineCtx};
use vtrec_daemon::ipc::{IpcClient, IpcServer};
use vtrec_daemon::notifier::Notifier;
use vtrec_daemon::records::RecordsTask;
use vtrec_daemon::scheduler::Autoscheduler;
use vtrec_daemon::ws::Hub;
use vtrec_core::SystemClock;
use vtrec_daemon::{lifecycle, Config};
use vtrec_discovery::{HolodexClient, LiveIndexClient};
use vtrec_storage::Store;

fn init_logging(config: &Config) -> tracing_appender::non_blocking::WorkerGuard {
    let file_appender = tracing_appender::rolling::daily(&config.logs_dir, "vtrecd.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = tracing_subscriber::EnvFilter::try_from_env("VTREC_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .init();
    guard
}

fn fatal(message: &str) -> ! {
    eprintln!("vtrecd: {message}");
    std::process::exit(1);
}

#[tokio::main]
async fn main() {
    let config = match Config::load() {
        Ok(config) => Arc::new(config),
        Err(err) => fatal(&err.to_string()),
    };
    if let Err(err) = lifecycle::create_layout(&config) {
        fatal(&format!("cannot create base layout: {err}"));
    }
    let _log_guard = init_logging(&config);

    let role = match lifecycle::elect(&config) {
        Ok(role) => role,
        Err(err) => fatal(&format!("leader election failed: {err}")),
    };
    tracing::info!(leader = role.is_leader(), pid = std::process::id(), "vtrecd starting");

    let store = match Store::open(&config.db_path) {
        Ok(store) => Arc::new(Mutex::new(store)),
        Err(err) => fatal(&format!("cannot open job store: {err}")),
    };

    let cancel = CancellationToken::new();
    let hub = Hub::new();
    let http = match reqwest::Client::builder()
        .user_agent(vtrec_discovery::USER_AGENT)
        .build()
    {
        Ok(client) => client,
        Err(err) => fatal(&format!("cannot build HTTP client: {err}")),
    };

    // Bridge: the leader listens, followers connect and re-emit.
    let ipc_server = if role.is_leader() {
        let listener = match IpcServer::bind(&config.ipc_path) {
            Ok(listener) => listener,
            Err(err) => fatal(&format!("cannot bind IPC socket: {err}")),
        };
        let server = IpcServer::new();
        tokio::spawn(server.clone().run(listener, cancel.child_token()));
        Some(server)
    } else {
        let client = IpcClient::new(config.ipc_path.clone(), hub.clone());
        tokio::spawn(client.run(cancel.child_token()));
        None
    };
    let broadcaster = Broadcaster::new(hub.clone(), ipc_server);

    // Dataset index with hot reload; the leader also refreshes upstream.
    let dataset = match vtrec_dataset::DatasetIndex::load_dir(&config.dataset_dir) {
        Ok(index) => vtrec_dataset::shared(index),
        Err(err) => fatal(&format!("cannot load dataset: {err}")),
    };

    let holodex = Arc::new(HolodexClient::new(http.clone(), config.holodex_api_key.clone()));
    let live_index = Arc::new(LiveIndexClient::new(http.clone()));
    let notifier = Notifier::new(http.clone(), config.webhook_url.clone());

    let chat = Arc::new(ChatManager::new(
        ChatCaptureCtx {
            http: http.clone(),
            base_dir: config.base_dir.clone(),
            store: Arc::clone(&store),
            dataset: dataset.clone(),
            rclone: config.rclone_cfg(),
        },
        cancel.child_token(),
    ));

    if role.is_leader() {
        // Crash recovery: demote in-flight rows so the engine resumes
        // them, then pick up surviving chat captures.
        match lifecycle::demote_in_flight(&mut store.lock()) {
            Ok(demoted) if !demoted.is_empty() => {
                tracing::warn!(count = demoted.len(), "demoted in-flight jobs for recovery");
            }
            Ok(_) => {}
            Err(err) => tracing::error!(%err, "demotion pass failed"),
        }
        chat.resume_pending().await;

        vtrec_dataset::spawn_watcher(config.dataset_dir.clone(), dataset.clone());
        let updater = vtrec_dataset::DatasetUpdater::new(
            vtrec_dataset::UpdaterConfig::new(config.dataset_dir.clone()),
            http.clone(),
        );
        updater.spawn();

        let engine = Engine::new(
            EngineCtx {
                config: Arc::clone(&config),
                store: Arc::clone(&store),
                dataset: dataset.clone(),
                broadcaster: broadcaster.clone(),
                notifier: notifier.clone(),
                chat: Arc::clone(&chat),
                http: http.clone(),
                clock: SystemClock,
            },
            cancel.child_token(),
        );
        tokio::spawn(engine.run());

        let autoscheduler = Autoscheduler {
            config: Arc::clone(&config),
            store: Arc::clone(&store),
            holodex: Arc::clone(&holodex),
            live_index: Arc::clone(&live_index),
            broadcaster: broadcaster.clone(),
            notifier: notifier.clone(),
        };
        tokio::spawn(autoscheduler.run(cancel.child_token()));

        let records = RecordsTask { config: Arc::clone(&config) };
        tokio::spawn(records.run(cancel.child_token()));
    }

    let state = Arc::new(AppState {
        config: Arc::clone(&config),
        store,
        broadcaster,
        notifier,
        holodex,
        live_index,
        hub,
        is_leader: role.is_leader(),
    });
    let router = api::router(state);

    let listener = match tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await {
        Ok(listener) => listener,
        Err(err) => fatal(&format!("cannot bind port {}: {err}", config.port)),
    };
    tracing::info!(port = config.port, "HTTP API listening");

    let shutdown_cancel = cancel.clone();
    let serve = axum::serve(listener, router).with_graceful_shutdown(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received");
        shutdown_cancel.cancel();
    });
    if let Err(err) = serve.await {
        tracing::error!(%err, "HTTP server error");
    }

    lifecycle::shutdown(&config, &role);
}
