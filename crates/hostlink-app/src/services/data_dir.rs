// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-aware data directory resolution.

use std::path::PathBuf;

/// Environment variable that overrides the data directory outright.
pub const DATA_DIR_ENV: &str = "HOSTLINK_DATA_DIR";

/// The app data directory, created on first use.
pub fn data_dir() -> PathBuf {
    let dir = match std::env::var(DATA_DIR_ENV) {
        Ok(explicit) if !explicit.is_empty() => PathBuf::from(explicit),
        _ => base_dir().join("hostlink"),
    };
    std::fs::create_dir_all(&dir).ok();
    dir
}

/// `$XDG_DATA_HOME`, then `~/.local/share`, then the system temp dir.
fn base_dir() -> PathBuf {
    std::env::var_os("XDG_DATA_HOME")
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".local/share"))
        })
        .unwrap_or_else(std::env::temp_dir)
}

