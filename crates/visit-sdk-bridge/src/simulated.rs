// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-process Health Connect provider and UI surface.
//
// Used by the host binary on desktop and by the controller tests. The
// provider behaves like the real one at the callback level: permission
// requests come back as `PermissionNeeded`, grant checks as
// `PermissionGranted`/`PermissionDenied`, and data fetches as `DataReady`.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::json;
use tracing::debug;

use visit_sdk_core::error::{BridgeError, Result};
use visit_sdk_core::types::{ActivityQuery, ConnectionState};

use crate::events::{EventSink, PermissionResultSink, ProviderEvent};
use crate::storage::MemorySessionStorage;
use crate::traits::{
    ActivityResultListener, HealthConnectProvider, ProviderFactory, SessionStorage, UiSurface,
};

/// Health Connect read permissions the simulated provider asks for.
pub const DEFAULT_PERMISSIONS: [&str; 4] = [
    "android.permission.health.READ_STEPS",
    "android.permission.health.READ_DISTANCE",
    "android.permission.health.READ_TOTAL_CALORIES_BURNED",
    "android.permission.health.READ_SLEEP",
];

/// Permissions the "OS" currently holds for the app; shared between the
/// simulated surface (which grants) and the provider (which checks).
#[derive(Debug, Clone, Default)]
pub struct GrantStore(Arc<Mutex<BTreeSet<String>>>);

impl GrantStore {
    pub fn grant(&self, permissions: &BTreeSet<String>) {
        self.0
            .lock()
            .expect("grant lock poisoned")
            .extend(permissions.iter().cloned());
    }

    pub fn snapshot(&self) -> BTreeSet<String> {
        self.0.lock().expect("grant lock poisoned").clone()
    }
}

/// Provider operations, in the order the controller invoked them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    Initialize,
    CheckAvailability,
    RequestPermission,
    CheckPermissionsAndRun(bool),
    OpenApp,
    FetchDailyFitnessData,
    FetchActivityData(ActivityQuery),
}

pub struct SimulatedHealthConnect {
    state: Mutex<ConnectionState>,
    required: BTreeSet<String>,
    grants: GrantStore,
    sink: Mutex<Option<EventSink>>,
    calls: Mutex<Vec<ProviderCall>>,
    auto_reply: AtomicBool,
}

impl SimulatedHealthConnect {
    pub fn new(state: ConnectionState, grants: GrantStore) -> Self {
        Self {
            state: Mutex::new(state),
            required: DEFAULT_PERMISSIONS.iter().map(|p| p.to_string()).collect(),
            grants,
            sink: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            auto_reply: AtomicBool::new(true),
        }
    }

    /// Connect the provider to a controller's event queue.
    pub fn bind(&self, events: EventSink) {
        *self.sink.lock().expect("sink lock poisoned") = Some(events);
    }

    pub fn set_state(&self, state: ConnectionState) {
        *self.state.lock().expect("state lock poisoned") = state;
    }

    /// When off, data fetches are recorded but never answered.
    pub fn set_auto_reply(&self, enabled: bool) {
        self.auto_reply.store(enabled, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<ProviderCall> {
        self.calls.lock().expect("calls lock poisoned").clone()
    }

    pub fn count(&self, call: &ProviderCall) -> usize {
        self.calls
            .lock()
            .expect("calls lock poisoned")
            .iter()
            .filter(|c| *c == call)
            .count()
    }

    /// Push an event as if the real SDK had called its listener. Returns
    /// `false` if no controller is bound yet.
    pub fn emit(&self, event: ProviderEvent) -> bool {
        match self.sink.lock().expect("sink lock poisoned").as_ref() {
            Some(sink) => {
                sink.emit(event);
                true
            }
            None => {
                debug!(event = event.kind(), "simulated provider not bound; event dropped");
                false
            }
        }
    }

    fn record(&self, call: ProviderCall) {
        self.calls.lock().expect("calls lock poisoned").push(call);
    }

    fn replies(&self) -> bool {
        self.auto_reply.load(Ordering::SeqCst)
    }
}

impl HealthConnectProvider for SimulatedHealthConnect {
    fn initialize(&self) {
        self.record(ProviderCall::Initialize);
        let state = self.connection_state();
        self.emit(ProviderEvent::ConnectionStateChanged(state, "initialised".into()));
    }

    fn connection_state(&self) -> ConnectionState {
        *self.state.lock().expect("state lock poisoned")
    }

    fn check_availability(&self) -> ConnectionState {
        self.record(ProviderCall::CheckAvailability);
        self.connection_state()
    }

    fn required_permissions(&self) -> BTreeSet<String> {
        self.required.clone()
    }

    fn request_permission(&self) {
        self.record(ProviderCall::RequestPermission);
        self.emit(ProviderEvent::PermissionNeeded);
    }

    fn check_permissions_and_run(&self, after_grant: bool) {
        self.record(ProviderCall::CheckPermissionsAndRun(after_grant));
        if self.required.is_subset(&self.grants.snapshot()) {
            self.set_state(ConnectionState::Connected);
            self.emit(ProviderEvent::ConnectionStateChanged(
                ConnectionState::Connected,
                "permissions granted".into(),
            ));
            self.emit(ProviderEvent::PermissionGranted);
        } else {
            self.emit(ProviderEvent::PermissionDenied);
        }
    }

    fn open_app(&self) {
        self.record(ProviderCall::OpenApp);
    }

    fn fetch_daily_fitness_data(&self) {
        self.record(ProviderCall::FetchDailyFitnessData);
        if self.replies() {
            let payload = json!({"source": "daily", "steps": 8432, "calories": 312.5});
            self.emit(ProviderEvent::DataReady(payload.to_string()));
        }
    }

    fn fetch_activity_data(&self, query: &ActivityQuery) {
        self.record(ProviderCall::FetchActivityData(query.clone()));
        if self.replies() {
            let payload = json!({
                "type": query.kind,
                "frequency": query.frequency,
                "timestamp": query.timestamp,
                "values": [],
            });
            self.emit(ProviderEvent::DataReady(payload.to_string()));
        }
    }
}

/// How the simulated user answers the permission sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UserResponse {
    /// Leave the sheet open; answer later with [`SimulatedSurface::answer`].
    #[default]
    Hold,
    GrantAll,
    GrantNone,
    /// Back out of the sheet; the launcher reports no result.
    Dismiss,
}

pub struct SimulatedSurface {
    name: String,
    grants: GrantStore,
    response: Mutex<UserResponse>,
    launcher: Mutex<Option<PermissionResultSink>>,
    listeners: Mutex<Vec<Arc<dyn ActivityResultListener>>>,
    launches: Mutex<Vec<BTreeSet<String>>>,
}

impl SimulatedSurface {
    pub fn new(name: impl Into<String>, grants: GrantStore) -> Self {
        Self {
            name: name.into(),
            grants,
            response: Mutex::new(UserResponse::Hold),
            launcher: Mutex::new(None),
            listeners: Mutex::new(Vec::new()),
            launches: Mutex::new(Vec::new()),
        }
    }

    pub fn set_response(&self, response: UserResponse) {
        *self.response.lock().expect("response lock poisoned") = response;
    }

    /// Permission sets the sheet was opened with.
    pub fn launches(&self) -> Vec<BTreeSet<String>> {
        self.launches.lock().expect("launches lock poisoned").clone()
    }

    /// Answer a held sheet. Returns `false` if no launcher is registered.
    pub fn answer(&self, granted: Option<BTreeSet<String>>) -> bool {
        if let Some(set) = granted.as_ref() {
            self.grants.grant(set);
        }
        match self.launcher.lock().expect("launcher lock poisoned").as_ref() {
            Some(launcher) => {
                launcher.deliver(granted);
                true
            }
            None => false,
        }
    }

    /// Forward a raw activity result; `true` if any listener consumed it.
    pub fn dispatch_activity_result(&self, request_code: i32, result_code: i32) -> bool {
        self.listeners
            .lock()
            .expect("listener lock poisoned")
            .iter()
            .any(|listener| listener.on_activity_result(request_code, result_code))
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().expect("listener lock poisoned").len()
    }
}

impl UiSurface for SimulatedSurface {
    fn name(&self) -> &str {
        &self.name
    }

    fn register_permission_launcher(&self, results: PermissionResultSink) -> Result<()> {
        *self.launcher.lock().expect("launcher lock poisoned") = Some(results);
        Ok(())
    }

    fn launch_permission_request(&self, permissions: &BTreeSet<String>) -> Result<()> {
        if self.launcher.lock().expect("launcher lock poisoned").is_none() {
            return Err(BridgeError::Bridge("permission launcher not registered".into()));
        }
        self.launches
            .lock()
            .expect("launches lock poisoned")
            .push(permissions.clone());

        let response = *self.response.lock().expect("response lock poisoned");
        match response {
            UserResponse::Hold => {}
            UserResponse::GrantAll => {
                self.answer(Some(permissions.clone()));
            }
            UserResponse::GrantNone => {
                self.answer(Some(BTreeSet::new()));
            }
            UserResponse::Dismiss => {
                self.answer(None);
            }
        }
        Ok(())
    }

    fn add_activity_result_listener(&self, listener: Arc<dyn ActivityResultListener>) {
        self.listeners
            .lock()
            .expect("listener lock poisoned")
            .push(listener);
    }
}

struct SimulatedFactory {
    provider: Arc<SimulatedHealthConnect>,
    storage: Arc<MemorySessionStorage>,
    built: Arc<AtomicUsize>,
}

impl ProviderFactory for SimulatedFactory {
    fn create_provider(
        &self,
        _surface: &Arc<dyn UiSurface>,
        events: EventSink,
    ) -> Arc<dyn HealthConnectProvider> {
        self.built.fetch_add(1, Ordering::SeqCst);
        self.provider.bind(events);
        self.provider.clone()
    }

    fn create_session_storage(&self, _surface: &Arc<dyn UiSurface>) -> Arc<dyn SessionStorage> {
        self.storage.clone()
    }
}

/// A provider, a surface and storage wired to share one grant store.
pub struct SimulatedPlatform {
    pub provider: Arc<SimulatedHealthConnect>,
    pub surface: Arc<SimulatedSurface>,
    pub storage: Arc<MemorySessionStorage>,
    built: Arc<AtomicUsize>,
}

impl SimulatedPlatform {
    pub fn new(state: ConnectionState) -> Self {
        let grants = GrantStore::default();
        Self {
            provider: Arc::new(SimulatedHealthConnect::new(state, grants.clone())),
            surface: Arc::new(SimulatedSurface::new("main-activity", grants)),
            storage: Arc::new(MemorySessionStorage::new(true)),
            built: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Factory to hand to the controller. Every provider it builds is the
    /// shared [`SimulatedPlatform::provider`].
    pub fn factory(&self) -> Box<dyn ProviderFactory> {
        Box::new(SimulatedFactory {
            provider: self.provider.clone(),
            storage: self.storage.clone(),
            built: self.built.clone(),
        })
    }

    pub fn surface_handle(&self) -> Arc<dyn UiSurface> {
        self.surface.clone()
    }

    /// How many times a provider was constructed.
    pub fn providers_built(&self) -> usize {
        self.built.load(Ordering::SeqCst)
    }
}
