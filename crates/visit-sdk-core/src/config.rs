// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bridge configuration.

use serde::{Deserialize, Serialize};

/// What happens when a call arrives while another call of the same
/// category is still owed a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingPolicy {
    /// The newer call takes the slot. The older caller is told its call was
    /// orphaned and will receive no reply.
    #[default]
    Supersede,
    /// The newer call is answered at once with `ALREADY_ACTIVE`; the older
    /// call keeps the slot.
    Reject,
}

/// Persistent bridge settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Method channel the controller registers on.
    pub channel_name: String,
    /// Tag attached to every call/callback log line.
    pub log_tag: String,
    /// Emit per-call log lines. Lifecycle events are always logged.
    pub logging_enabled: bool,
    /// Overlapping-call policy for pending results.
    pub pending_policy: PendingPolicy,
    /// Prefix of the `getPlatformVersion` reply.
    pub platform_label: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            channel_name: "visit_flutter_sdk".into(),
            log_tag: "mytag".into(),
            logging_enabled: true,
            pending_policy: PendingPolicy::Supersede,
            platform_label: "Android".into(),
        }
    }
}
