// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Gateway settings persisted as JSON next to the app data.

use std::path::Path;

use hostlink_core::GatewayConfig;
use hostlink_core::error::Result;
use tracing::{info, warn};

const CONFIG_FILE: &str = "hostlink.json";

/// Read the saved config. `Ok(None)` when nothing has been saved yet.
pub fn load_config(data_dir: &Path) -> Result<Option<GatewayConfig>> {
    let path = data_dir.join(CONFIG_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let data = std::fs::read_to_string(&path)?;
    let config: GatewayConfig = serde_json::from_str(&data)?;
    config.validate()?;
    Ok(Some(config))
}

pub fn persist_config(data_dir: &Path, config: &GatewayConfig) -> Result<()> {
    let path = data_dir.join(CONFIG_FILE);
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, json)?;
    Ok(())
}

/// Load the saved config, writing defaults on first run. A damaged file is
/// reported and replaced by defaults for this run only.
pub fn load_or_init(data_dir: &Path) -> GatewayConfig {
    match load_config(data_dir) {
        Ok(Some(config)) => {
            info!(path = %data_dir.display(), "loaded gateway config");
            config
        }
        Ok(None) => {
            let config = GatewayConfig::default();
            if let Err(e) = persist_config(data_dir, &config) {
                warn!(error = %e, "could not save default gateway config");
            }
            config
        }
        Err(e) => {
            warn!(error = %e, "gateway config unreadable, using defaults");
            GatewayConfig::default()
        }
    }
}
