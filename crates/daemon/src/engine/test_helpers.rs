// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for engine tests.

use super::EngineCtx;
use crate::broadcast::Broadcaster;
use crate::env::Config;
use crate::notifier::Notifier;
use crate::ws::Hub;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use vtrec_chat::{ChatCaptureCtx, ChatManager};
use vtrec_core::{FakeClock, Packet};
use vtrec_storage::Store;

/// Epoch the fake clock starts at.
pub(crate) const TEST_EPOCH: i64 = 1_700_000_000;

/// Engine context rooted at a scratch directory, driven by a fake clock,
/// plus a probe client receiving every emitted packet. The returned
/// clock shares state with the context's copy.
pub(crate) fn test_ctx(dir: &Path) -> (EngineCtx<FakeClock>, FakeClock, mpsc::Receiver<Packet>) {
    let config = Arc::new(Config::for_base_dir(dir.to_path_buf()));
    crate::lifecycle::create_layout(&config).unwrap();

    let store = Arc::new(Mutex::new(Store::open(&config.db_path).unwrap()));
    let dataset = vtrec_dataset::shared(vtrec_dataset::DatasetIndex::default());
    let hub = Hub::new();
    let (rx, _cancel) = hub.register("probe".to_string());
    let broadcaster = Broadcaster::new(hub, None);
    let http = reqwest::Client::new();
    let chat = Arc::new(ChatManager::new(
        ChatCaptureCtx {
            http: http.clone(),
            base_dir: config.base_dir.clone(),
            store: Arc::clone(&store),
            dataset: dataset.clone(),
            rclone: config.rclone_cfg(),
        },
        CancellationToken::new(),
    ));

    let clock = FakeClock::new();
    clock.set_epoch_secs(TEST_EPOCH);

    (
        EngineCtx {
            config,
            store,
            dataset,
            broadcaster,
            notifier: Notifier::new(http.clone(), None),
            chat,
            http,
            clock: clock.clone(),
        },
        clock,
        rx,
    )
}
