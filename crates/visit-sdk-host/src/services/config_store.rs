// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// `config.json` in the data directory.

use std::path::Path;

use tracing::{info, warn};

use visit_sdk_core::config::BridgeConfig;
use visit_sdk_core::error::{BridgeError, Result};

pub const CONFIG_FILE: &str = "config.json";

/// Read the config, if present and valid.
pub fn load_config(data_dir: &Path) -> Result<Option<BridgeConfig>> {
    let path = data_dir.join(CONFIG_FILE);
    let data = match std::fs::read_to_string(&path) {
        Ok(data) => data,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    serde_json::from_str(&data)
        .map(Some)
        .map_err(|e| BridgeError::Config(format!("{}: {e}", path.display())))
}

pub fn persist_config(data_dir: &Path, config: &BridgeConfig) -> Result<()> {
    let path = data_dir.join(CONFIG_FILE);
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, json)?;
    Ok(())
}

/// Load the config or fall back to defaults. A missing file is seeded with
/// the defaults; a broken one is left alone for the user to fix.
pub fn load_or_default(data_dir: &Path) -> BridgeConfig {
    match load_config(data_dir) {
        Ok(Some(config)) => config,
        Ok(None) => {
            let config = BridgeConfig::default();
            match persist_config(data_dir, &config) {
                Ok(()) => info!(dir = %data_dir.display(), "wrote default config"),
                Err(err) => warn!(error = %err, "could not write default config"),
            }
            config
        }
        Err(err) => {
            warn!(error = %err, "config unreadable; using defaults");
            BridgeConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use visit_sdk_core::config::PendingPolicy;

    #[test]
    fn missing_config_is_seeded() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(dir.path()).unwrap().is_none());

        let config = load_or_default(dir.path());
        assert_eq!(config, BridgeConfig::default());
        assert!(dir.path().join(CONFIG_FILE).exists());
    }

    #[test]
    fn persisted_config_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let config = BridgeConfig {
            log_tag: "bridge".into(),
            logging_enabled: false,
            pending_policy: PendingPolicy::Reject,
            ..BridgeConfig::default()
        };
        persist_config(dir.path(), &config).unwrap();
        assert_eq!(load_or_default(dir.path()), config);
    }

    #[test]
    fn corrupt_config_falls_back_without_overwriting() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(load_config(dir.path()), Err(BridgeError::Config(_))));
        assert_eq!(load_or_default(dir.path()), BridgeConfig::default());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");
    }
}
