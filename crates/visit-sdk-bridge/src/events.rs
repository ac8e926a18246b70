// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Inbound notifications from the provider and the UI surface.
//
// Both sinks push onto the controller's queue, so whatever thread the
// provider calls back on, the event is handled on the controller task.

use std::collections::BTreeSet;

use tokio::sync::mpsc;
use tracing::debug;

use visit_sdk_core::types::ConnectionState;

use crate::controller::Command;

/// Listener callbacks of the Health Connect provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    /// Requested data is available; resolves the pending data call.
    DataReady(String),
    /// The provider hit an error. Logged only.
    Error(String),
    /// The provider needs the permission sheet shown.
    PermissionNeeded,
    /// Informational state change with a provider-specific detail string.
    ConnectionStateChanged(ConnectionState, String),
    PermissionGranted,
    PermissionDenied,
}

impl ProviderEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DataReady(_) => "data_ready",
            Self::Error(_) => "error",
            Self::PermissionNeeded => "permission_needed",
            Self::ConnectionStateChanged(..) => "connection_state_changed",
            Self::PermissionGranted => "permission_granted",
            Self::PermissionDenied => "permission_denied",
        }
    }
}

/// Handle a provider uses to report [`ProviderEvent`]s. Cheap to clone and
/// usable from any thread.
#[derive(Clone)]
pub struct EventSink {
    commands: mpsc::UnboundedSender<Command>,
}

impl EventSink {
    pub(crate) fn new(commands: mpsc::UnboundedSender<Command>) -> Self {
        Self { commands }
    }

    /// Deliver an event. Events sent after the controller stopped are dropped.
    pub fn emit(&self, event: ProviderEvent) {
        let kind = event.kind();
        if self.commands.send(Command::Provider(event)).is_err() {
            debug!(event = kind, "controller stopped; provider event dropped");
        }
    }
}

/// Handle the UI surface uses to report the outcome of a permission sheet.
#[derive(Clone)]
pub struct PermissionResultSink {
    commands: mpsc::UnboundedSender<Command>,
}

impl PermissionResultSink {
    pub(crate) fn new(commands: mpsc::UnboundedSender<Command>) -> Self {
        Self { commands }
    }

    /// Report the permissions the user granted. `None` means the sheet
    /// returned no result at all.
    pub fn deliver(&self, granted: Option<BTreeSet<String>>) {
        if self.commands.send(Command::PermissionResult(granted)).is_err() {
            debug!("controller stopped; permission result dropped");
        }
    }
}
