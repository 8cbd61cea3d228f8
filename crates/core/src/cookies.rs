// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cookie file discovery shared by the recorder, extractors, and chat.

use std::path::{Path, PathBuf};

const CANDIDATES: [&str; 4] = [
    "cookies.txt",
    "cookie.txt",
    "membercookies.txt",
    "membercookie.txt",
];

/// Locate a Netscape cookie file under the base directory, if any.
pub fn find_cookies_file(base_dir: &Path) -> Option<PathBuf> {
    CANDIDATES
        .iter()
        .map(|name| base_dir.join(name))
        .find(|path| path.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_first_existing_candidate() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(find_cookies_file(dir.path()), None);

        std::fs::write(dir.path().join("membercookies.txt"), "# Netscape HTTP Cookie File\n")
            .unwrap();
        assert_eq!(
            find_cookies_file(dir.path()),
            Some(dir.path().join("membercookies.txt"))
        );

        // cookies.txt outranks membercookies.txt.
        std::fs::write(dir.path().join("cookies.txt"), "# Netscape HTTP Cookie File\n").unwrap();
        assert_eq!(find_cookies_file(dir.path()), Some(dir.path().join("cookies.txt")));
    }
}
