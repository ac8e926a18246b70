// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-surface session: the provider and storage built when a UI surface
// attaches, and the surface reference that comes and goes with
// configuration changes.

use std::sync::Arc;

use tracing::{debug, info};

use visit_sdk_core::error::{BridgeError, Result};

use crate::events::{EventSink, PermissionResultSink};
use crate::traits::{
    ActivityResultListener, HealthConnectProvider, ProviderFactory, SessionStorage, UiSurface,
};

/// Collaborators bound to one attachment of a UI surface.
pub struct BridgeSession {
    provider: Arc<dyn HealthConnectProvider>,
    storage: Arc<dyn SessionStorage>,
    surface: Option<Arc<dyn UiSurface>>,
}

impl BridgeSession {
    /// Build the session for a freshly attached surface: construct the
    /// provider, register the permission launcher and the activity-result
    /// listener.
    pub fn attach(
        surface: Arc<dyn UiSurface>,
        factory: &dyn ProviderFactory,
        events: EventSink,
        permission_results: PermissionResultSink,
        log_tag: &str,
    ) -> Result<Self> {
        surface.add_activity_result_listener(Arc::new(UnhandledResults {
            tag: log_tag.to_owned(),
        }));

        let provider = factory.create_provider(&surface, events);
        provider.initialize();
        let storage = factory.create_session_storage(&surface);

        surface.register_permission_launcher(permission_results)?;

        info!(
            tag = log_tag,
            surface = surface.name(),
            previously_revoked = storage.previously_revoked(),
            "session attached"
        );

        Ok(Self {
            provider,
            storage,
            surface: Some(surface),
        })
    }

    pub fn provider(&self) -> &Arc<dyn HealthConnectProvider> {
        &self.provider
    }

    pub fn storage(&self) -> &Arc<dyn SessionStorage> {
        &self.storage
    }

    /// The bound surface, required for anything that shows UI.
    pub fn surface(&self) -> Result<&Arc<dyn UiSurface>> {
        self.surface.as_ref().ok_or(BridgeError::NoSurface)
    }

    pub fn has_surface(&self) -> bool {
        self.surface.is_some()
    }

    /// Drop the surface reference. The provider stays.
    pub fn unbind_surface(&mut self) {
        self.surface = None;
    }

    /// Bind a surface after a configuration change. The provider is reused.
    pub fn rebind_surface(&mut self, surface: Arc<dyn UiSurface>) {
        self.surface = Some(surface);
    }
}

/// Activity-result listener that declines every result; no flow here needs
/// raw `onActivityResult` interception.
struct UnhandledResults {
    tag: String,
}

impl ActivityResultListener for UnhandledResults {
    fn on_activity_result(&self, request_code: i32, result_code: i32) -> bool {
        debug!(tag = %self.tag, request_code, result_code, "activity result not handled");
        false
    }
}
