// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! vtrec-discovery: typed clients for the upstream live-listing APIs.
//!
//! Two upstreams are consumed: the Holodex REST API for YouTube streams
//! and the ihateani.me GraphQL live index for the other platforms. Both
//! normalize into [`vtrec_core::Video`].

mod graphql;
mod holodex;

pub use graphql::LiveIndexClient;
pub use holodex::HolodexClient;

use thiserror::Error;

/// User agent sent to both upstreams.
pub const USER_AGENT: &str =
    concat!("vtrec/", env!("CARGO_PKG_VERSION"), " (+https://github.com/vtrec/vtrec)");

/// Discovery errors
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream returned status {0}")]
    Status(u16),

    #[error("Malformed upstream payload: {0}")]
    Payload(String),
}
