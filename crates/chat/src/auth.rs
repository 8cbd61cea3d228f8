// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Chat API authentication: Netscape cookie parsing, the SAPISID hash,
//! and the ytcfg-derived client identification headers.

use crate::errors::ChatError;
use serde_json::Value;
use sha1::{Digest, Sha1};

/// One cookie row from a Netscape cookie file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetscapeCookie {
    pub domain: String,
    pub path: String,
    pub secure: bool,
    pub expires: i64,
    pub name: String,
    pub value: String,
}

/// Parse a Netscape cookie file. The first line must carry the Netscape
/// header; malformed rows fail the whole file.
pub fn parse_netscape_cookies(content: &str) -> Result<Vec<NetscapeCookie>, ChatError> {
    let mut lines = content.lines();
    let header = lines.next().unwrap_or_default();
    if !header.to_lowercase().starts_with("# netscape") {
        return Err(ChatError::Parse("invalid Netscape cookie file".to_string()));
    }

    let mut cookies = Vec::new();
    for line in lines {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        let [domain, _flag, path, secure, expires, name, value] = fields[..] else {
            return Err(ChatError::Parse("invalid Netscape cookie file".to_string()));
        };
        cookies.push(NetscapeCookie {
            domain: domain.to_string(),
            path: path.to_string(),
            secure: secure.eq_ignore_ascii_case("true"),
            expires: expires.parse().unwrap_or(0),
            name: name.to_string(),
            value: value.to_string(),
        });
    }
    Ok(cookies)
}

/// Time-stamped SHA-1 of the session cookie, as the chat API expects it:
/// `SAPISIDHASH <epoch>_<sha1("<epoch> <sapisid> <origin>")>`.
pub fn sapisid_hash(sapisid: &str, epoch_secs: i64) -> String {
    let mut hasher = Sha1::new();
    hasher.update(format!("{epoch_secs} {sapisid} https://www.youtube.com").as_bytes());
    format!("SAPISIDHASH {epoch_secs}_{:x}", hasher.finalize())
}

/// The datasync id is `channel_syncid||user_syncid` on a secondary
/// channel and `user_syncid||` on the primary; only the channel part is
/// wanted.
pub fn extract_account_syncid(ytcfg: &Value) -> Option<String> {
    if let Some(datasync) = ytcfg.get("DATASYNC_ID").and_then(Value::as_str) {
        let parts: Vec<&str> = datasync.split("||").collect();
        if parts.len() >= 2 && !parts[1].is_empty() {
            return Some(parts[0].to_string());
        }
    }
    ytcfg
        .get("DELEGATED_SESSION_ID")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Build the chat API headers from the embedded config plus an optional
/// SAPISID cookie value.
pub fn build_auth_headers(
    ytcfg: &Value,
    sapisid: Option<&str>,
    epoch_secs: i64,
) -> Vec<(String, String)> {
    let mut headers = vec![
        ("origin".to_string(), "https://www.youtube.com".to_string()),
        ("x-origin".to_string(), "https://www.youtube.com".to_string()),
        (
            "x-youtube-client-name".to_string(),
            ytcfg
                .get("INNERTUBE_CONTEXT_CLIENT_NAME")
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .unwrap_or_else(|| "1".to_string()),
        ),
        (
            "x-youtube-client-version".to_string(),
            ytcfg
                .get("INNERTUBE_CLIENT_VERSION")
                .and_then(Value::as_str)
                .unwrap_or("2.20240101.00.00")
                .to_string(),
        ),
    ];

    if let Some(token) = ytcfg.get("ID_TOKEN").and_then(Value::as_str) {
        headers.push(("x-youtube-identity-token".to_string(), token.to_string()));
    }

    let syncid = extract_account_syncid(ytcfg);
    if let Some(syncid) = &syncid {
        headers.push(("x-goog-pageid".to_string(), syncid.clone()));
    }

    let session_index = ytcfg
        .get("SESSION_INDEX")
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .filter(|s| !s.is_empty() && s.as_str() != "null");
    if syncid.is_some() || session_index.is_some() {
        headers.push((
            "x-goog-authuser".to_string(),
            session_index.unwrap_or_else(|| "0".to_string()),
        ));
    } else {
        headers.push(("x-goog-authuser".to_string(), "0".to_string()));
    }

    if let Some(visitor) = ytcfg
        .pointer("/INNERTUBE_CONTEXT/client/visitorData")
        .and_then(Value::as_str)
    {
        headers.push(("x-goog-visitor-id".to_string(), visitor.to_string()));
    }

    if let Some(sapisid) = sapisid {
        headers.push(("authorization".to_string(), sapisid_hash(sapisid, epoch_secs)));
    }

    headers
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
