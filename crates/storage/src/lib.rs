// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! vtrec-storage: persistent job store.
//!
//! One JSON document holds the jobs table, the autoscheduler rules, and
//! the pending chat captures. The store is single-writer under the
//! leader process; followers read through the HTTP API.

mod store;

pub use store::{Store, StoreError};
