// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-agnostic trait definitions for the collaborators the bridge
// talks to. Real implementations live in the host application (Health
// Connect SDK, activity) or in the `android` module; `stub` and `simulated`
// cover desktop and tests.

use std::collections::BTreeSet;
use std::sync::Arc;

use visit_sdk_core::error::Result;
use visit_sdk_core::types::{ActivityQuery, ConnectionState};

use crate::events::{EventSink, PermissionResultSink};

/// Device facts available as soon as the engine attaches.
pub trait DeviceInfo: Send + Sync {
    /// OS release string (e.g. "14").
    fn os_release(&self) -> Result<String>;

    /// Battery charge in percent. Platforms report `-1` when the value is
    /// not known; callers treat anything outside 0..=100 as unavailable.
    fn battery_level(&self) -> Result<i32>;
}

/// The Health Connect integration the bridge forwards to.
///
/// Methods return immediately. Long-running work happens on the provider's
/// own workers and completes through the [`EventSink`] handed to it at
/// construction, except [`check_availability`](Self::check_availability),
/// which may block and is run on a blocking pool by the controller.
pub trait HealthConnectProvider: Send + Sync {
    /// One-time setup after construction.
    fn initialize(&self);

    /// Last known connection state, without querying the platform.
    fn connection_state(&self) -> ConnectionState;

    /// Query the platform for the current state. May block.
    fn check_availability(&self) -> ConnectionState;

    /// Permission strings the provider needs before it can read data.
    fn required_permissions(&self) -> BTreeSet<String>;

    /// Start the permission flow. Typically answers with
    /// `ProviderEvent::PermissionNeeded`.
    fn request_permission(&self);

    /// Re-read granted permissions and continue whatever flow was waiting on
    /// them. Emits `PermissionGranted` or `PermissionDenied`.
    fn check_permissions_and_run(&self, after_grant: bool);

    /// Open the Health Connect app or its store listing.
    fn open_app(&self);

    /// Fetch the daily dashboard graph. Answers with `ProviderEvent::DataReady`.
    fn fetch_daily_fitness_data(&self);

    /// Fetch activity data for one query. Answers with `ProviderEvent::DataReady`.
    fn fetch_activity_data(&self, query: &ActivityQuery);
}

/// Persisted per-user permission state.
pub trait SessionStorage: Send + Sync {
    /// Whether the user revoked fitness permissions in an earlier session.
    fn previously_revoked(&self) -> bool;

    fn set_previously_revoked(&self, revoked: bool) -> Result<()>;
}

/// Receives raw activity results forwarded by the UI surface.
pub trait ActivityResultListener: Send + Sync {
    /// Return `true` if the result was consumed.
    fn on_activity_result(&self, request_code: i32, result_code: i32) -> bool;
}

/// The host's foreground UI surface (an Android activity).
pub trait UiSurface: Send + Sync {
    /// Short name used in log lines.
    fn name(&self) -> &str;

    /// Register the launcher that shows the system permission sheet. The
    /// granted set is reported later through `results`.
    fn register_permission_launcher(&self, results: PermissionResultSink) -> Result<()>;

    /// Show the permission sheet for `permissions`.
    fn launch_permission_request(&self, permissions: &BTreeSet<String>) -> Result<()>;

    fn add_activity_result_listener(&self, listener: Arc<dyn ActivityResultListener>);
}

/// Builds the per-surface collaborators when a UI surface attaches.
pub trait ProviderFactory: Send {
    fn create_provider(
        &self,
        surface: &Arc<dyn UiSurface>,
        events: EventSink,
    ) -> Arc<dyn HealthConnectProvider>;

    fn create_session_storage(&self, surface: &Arc<dyn UiSurface>) -> Arc<dyn SessionStorage>;
}
