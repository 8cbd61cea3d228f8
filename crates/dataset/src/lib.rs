// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! vtrec-dataset: read-only VTuber → channel-id index.
//!
//! Loads the `dataset/` JSON files into an immutable snapshot, hot-reloads
//! on file change, and periodically refreshes from the upstream dataset
//! repository when the published hash moves.

mod index;
mod updater;
mod watcher;

pub use index::{shared, DatasetError, DatasetIndex, DatasetOrg, DatasetVtuber, SharedIndex};
pub use updater::{DatasetUpdater, UpdaterConfig, UpdaterError};
pub use watcher::spawn_watcher;
