// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bridge controller: routes channel calls to the provider and turns provider
// callbacks back into replies.
//
// The controller is a single task that owns all mutable state. Calls,
// provider events, permission-sheet results, availability answers and
// lifecycle changes all arrive on one queue, so every pending reply is
// resolved on the controller task regardless of which thread produced the
// answer.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use visit_sdk_core::config::BridgeConfig;
use visit_sdk_core::error::{BridgeError, Result, codes};
use visit_sdk_core::types::{
    ActivityQuery, ConnectionState, Method, MethodCall, MethodResponse, PendingCategory,
    PermissionOutcome,
};

use crate::events::{EventSink, PermissionResultSink, ProviderEvent};
use crate::pending::{Hold, PendingResult, PendingTable};
use crate::session::BridgeSession;
use crate::traits::{DeviceInfo, HealthConnectProvider, ProviderFactory, UiSurface};

/// Message on the controller queue.
pub(crate) enum Command {
    Invoke {
        call: MethodCall,
        reply: PendingResult,
    },
    Provider(ProviderEvent),
    PermissionResult(Option<BTreeSet<String>>),
    StatusChecked {
        ticket: u64,
        state: ConnectionState,
    },
    AttachSurface(Option<Arc<dyn UiSurface>>),
    DetachSurface {
        reconfiguring: bool,
    },
    ReattachSurface(Arc<dyn UiSurface>),
    Snapshot(oneshot::Sender<SessionSnapshot>),
    Shutdown,
}

/// Point-in-time view of the controller, for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionSnapshot {
    /// A provider exists (a surface attached at least once).
    pub provider_ready: bool,
    /// A surface is currently bound.
    pub surface_attached: bool,
    pub general_pending: bool,
    pub status_pending: bool,
    pub data_pending: bool,
}

/// Cloneable front door to a running controller.
#[derive(Clone)]
pub struct BridgeHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl BridgeHandle {
    /// Dispatch one call and wait for its reply.
    ///
    /// Calls that wait on the provider may never complete if the provider
    /// never answers; there is no timeout here.
    pub async fn invoke(&self, call: MethodCall) -> Result<MethodResponse> {
        let (reply, waiter) = PendingResult::channel(call.method.clone());
        self.send(Command::Invoke { call, reply })?;
        waiter.wait().await
    }

    pub fn attach_surface(&self, surface: Option<Arc<dyn UiSurface>>) -> Result<()> {
        self.send(Command::AttachSurface(surface))
    }

    pub fn detach_surface(&self) -> Result<()> {
        self.send(Command::DetachSurface {
            reconfiguring: false,
        })
    }

    pub fn detach_surface_for_config_changes(&self) -> Result<()> {
        self.send(Command::DetachSurface {
            reconfiguring: true,
        })
    }

    pub fn reattach_surface_for_config_changes(&self, surface: Arc<dyn UiSurface>) -> Result<()> {
        self.send(Command::ReattachSurface(surface))
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Snapshot(tx))?;
        rx.await.map_err(|_| BridgeError::ControllerClosed)
    }

    /// Stop the controller. Calls still pending are abandoned with
    /// [`BridgeError::ControllerClosed`].
    pub fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| BridgeError::ControllerClosed)
    }
}

/// Owns the session, the pending table and the device handle.
pub struct BridgeController {
    config: BridgeConfig,
    device: Arc<dyn DeviceInfo>,
    factory: Box<dyn ProviderFactory>,
    session: Option<BridgeSession>,
    pending: PendingTable,
    commands: mpsc::UnboundedSender<Command>,
    inbox: mpsc::UnboundedReceiver<Command>,
}

impl BridgeController {
    /// Start a controller on the current tokio runtime.
    pub fn spawn(
        config: BridgeConfig,
        device: Arc<dyn DeviceInfo>,
        factory: Box<dyn ProviderFactory>,
    ) -> (BridgeHandle, JoinHandle<()>) {
        let (commands, inbox) = mpsc::unbounded_channel();
        let controller = Self {
            pending: PendingTable::new(config.pending_policy),
            config,
            device,
            factory,
            session: None,
            commands: commands.clone(),
            inbox,
        };
        let task = tokio::spawn(controller.run());
        (BridgeHandle { commands }, task)
    }

    async fn run(mut self) {
        info!(
            tag = %self.config.log_tag,
            channel = %self.config.channel_name,
            policy = ?self.pending.policy(),
            "bridge controller started"
        );

        while let Some(command) = self.inbox.recv().await {
            if !self.handle(command) {
                break;
            }
        }

        for pending in self.pending.drain() {
            pending.abandon(BridgeError::ControllerClosed);
        }
        info!(tag = %self.config.log_tag, "bridge controller stopped");
    }

    /// Returns `false` when the controller should stop.
    fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Invoke { call, reply } => self.dispatch(call, reply),
            Command::Provider(event) => self.on_provider_event(event),
            Command::PermissionResult(granted) => self.on_permission_result(granted),
            Command::StatusChecked { ticket, state } => self.on_status_checked(ticket, state),
            Command::AttachSurface(surface) => self.attach_surface(surface),
            Command::DetachSurface { reconfiguring } => self.detach_surface(reconfiguring),
            Command::ReattachSurface(surface) => self.reattach_surface(surface),
            Command::Snapshot(tx) => {
                let _ = tx.send(self.snapshot());
            }
            Command::Shutdown => return false,
        }
        true
    }

    // -- Dispatch -------------------------------------------------------------

    fn dispatch(&mut self, call: MethodCall, reply: PendingResult) {
        if self.config.logging_enabled {
            info!(
                tag = %self.config.log_tag,
                method = %call.method,
                arguments = ?call.arguments,
                "method call"
            );
        }

        let Some(method) = call.known_method() else {
            reply.not_implemented();
            return;
        };

        // Methods without a pending slot are answered from the device.
        let Some(category) = method.pending_category() else {
            match method {
                Method::GetPlatformVersion => {
                    reply.success(self.platform_version());
                }
                _ => self.battery_level(reply),
            }
            return;
        };

        let provider = match self.provider() {
            Ok(provider) => provider,
            Err(err) => {
                warn!(tag = %self.config.log_tag, %method, "called before any UI surface attached");
                reply.resolve(MethodResponse::from_error(&err));
                return;
            }
        };

        match method {
            Method::GetHealthConnectStatus => self.health_connect_status(category, provider, reply),
            Method::AskForFitnessPermission => {
                self.ask_for_fitness_permission(category, provider, reply)
            }
            Method::RequestDailyFitnessData => {
                self.request_daily_fitness_data(category, provider, reply)
            }
            Method::OpenHealthConnectApp => self.open_health_connect_app(category, provider, reply),
            Method::RequestActivityDataFromHealthConnect => {
                self.request_activity_data(category, provider, &call, reply)
            }
            Method::GetPlatformVersion | Method::GetBatteryLevel => {}
        }
    }

    fn platform_version(&self) -> String {
        let release = self.device.os_release().unwrap_or_else(|err| {
            warn!(tag = %self.config.log_tag, error = %err, "OS release unavailable");
            "unknown".into()
        });
        format!("{} {release}", self.config.platform_label)
    }

    fn battery_level(&self, reply: PendingResult) {
        match self.device.battery_level() {
            Ok(level) if (0..=100).contains(&level) => {
                reply.success(level);
            }
            Ok(level) => {
                debug!(tag = %self.config.log_tag, level, "battery sentinel reported");
                reply.error(codes::UNAVAILABLE, "Battery level not available.");
            }
            Err(err) => {
                warn!(tag = %self.config.log_tag, error = %err, "battery query failed");
                reply.error(codes::UNAVAILABLE, "Battery level not available.");
            }
        }
    }

    fn health_connect_status(
        &mut self,
        category: PendingCategory,
        provider: Arc<dyn HealthConnectProvider>,
        reply: PendingResult,
    ) {
        let Some(ticket) = self.hold(category, reply, Hold::Active) else {
            return;
        };
        let commands = self.commands.clone();
        tokio::task::spawn_blocking(move || {
            let state = provider.check_availability();
            if commands.send(Command::StatusChecked { ticket, state }).is_err() {
                debug!(ticket, "controller stopped before availability answer");
            }
        });
    }

    fn ask_for_fitness_permission(
        &mut self,
        category: PendingCategory,
        provider: Arc<dyn HealthConnectProvider>,
        reply: PendingResult,
    ) {
        // Already granted: answered without touching the slot.
        if provider.connection_state().is_connected() {
            debug!(tag = %self.config.log_tag, "askForFitnessPermission: already granted");
            reply.success(PermissionOutcome::Granted.as_str());
            return;
        }
        if self.hold(category, reply, Hold::Active).is_none() {
            return;
        }
        debug!(tag = %self.config.log_tag, "askForFitnessPermission: request permission");
        provider.request_permission();
    }

    fn request_daily_fitness_data(
        &mut self,
        category: PendingCategory,
        provider: Arc<dyn HealthConnectProvider>,
        reply: PendingResult,
    ) {
        if provider.connection_state().is_connected() {
            if self.hold(category, reply, Hold::Active).is_some() {
                provider.fetch_daily_fitness_data();
            }
        } else if self.hold(category, reply, Hold::Parked).is_some() {
            debug!(tag = %self.config.log_tag, "not connected; daily data call left pending");
        }
    }

    /// The open action never answers; the call waits on the next permission
    /// callback.
    fn open_health_connect_app(
        &mut self,
        category: PendingCategory,
        provider: Arc<dyn HealthConnectProvider>,
        reply: PendingResult,
    ) {
        if self.hold(category, reply, Hold::Parked).is_none() {
            return;
        }
        provider.open_app();
    }

    fn request_activity_data(
        &mut self,
        category: PendingCategory,
        provider: Arc<dyn HealthConnectProvider>,
        call: &MethodCall,
        reply: PendingResult,
    ) {
        let query = ActivityQuery::from_call(call);
        debug!(
            tag = %self.config.log_tag,
            kind = ?query.kind,
            frequency = ?query.frequency,
            timestamp = query.timestamp,
            "activity data requested"
        );

        if provider.connection_state().is_connected() {
            if self.hold(category, reply, Hold::Active).is_some() {
                provider.fetch_activity_data(&query);
            }
        } else if self.hold(category, reply, Hold::Parked).is_some() {
            debug!(tag = %self.config.log_tag, "permission not available, requesting again");
            provider.request_permission();
        }
    }

    // -- Provider callbacks ---------------------------------------------------

    fn on_provider_event(&mut self, event: ProviderEvent) {
        if self.config.logging_enabled {
            debug!(tag = %self.config.log_tag, event = event.kind(), "provider event");
        }

        match event {
            ProviderEvent::DataReady(payload) => {
                self.resolve(PendingCategory::Data, payload);
            }
            ProviderEvent::Error(cause) => {
                error!(tag = %self.config.log_tag, %cause, "health connect error");
            }
            ProviderEvent::PermissionNeeded => self.launch_permission_sheet(),
            ProviderEvent::ConnectionStateChanged(state, detail) => {
                debug!(tag = %self.config.log_tag, %state, %detail, "connection state changed");
                match state {
                    ConnectionState::Connected => {}
                    ConnectionState::NotSupported => {}
                    ConnectionState::NotInstalled => {}
                    ConnectionState::Installed => {}
                    ConnectionState::None => {}
                }
            }
            ProviderEvent::PermissionGranted => {
                self.resolve(PendingCategory::General, PermissionOutcome::Granted.as_str());
            }
            ProviderEvent::PermissionDenied => {
                self.resolve(PendingCategory::General, PermissionOutcome::Cancelled.as_str());
            }
        }
    }

    fn launch_permission_sheet(&self) {
        let Some(session) = self.session.as_ref() else {
            error!(tag = %self.config.log_tag, "permission requested without a session");
            return;
        };
        let surface = match session.surface() {
            Ok(surface) => surface,
            Err(err) => {
                error!(tag = %self.config.log_tag, error = %err, "cannot show permission sheet");
                return;
            }
        };
        let permissions = session.provider().required_permissions();
        if let Err(err) = surface.launch_permission_request(&permissions) {
            error!(tag = %self.config.log_tag, error = %err, "permission sheet launch failed");
        }
    }

    fn on_permission_result(&mut self, granted: Option<BTreeSet<String>>) {
        debug!(tag = %self.config.log_tag, ?granted, "permission sheet result");
        let Some(granted) = granted else {
            return;
        };
        let Some(session) = self.session.as_ref() else {
            warn!(tag = %self.config.log_tag, "permission result without a session; ignored");
            return;
        };

        let required = session.provider().required_permissions();
        match PermissionOutcome::from_grant(&granted, &required) {
            PermissionOutcome::Granted => {
                if let Err(err) = session.storage().set_previously_revoked(false) {
                    warn!(tag = %self.config.log_tag, error = %err, "could not persist revoke flag");
                }
                info!(tag = %self.config.log_tag, "permissions successfully granted");
            }
            PermissionOutcome::Cancelled => {
                info!(tag = %self.config.log_tag, "lack of required permissions");
            }
        }
        // The provider re-reads the grant either way and reports the outcome
        // through its own callbacks.
        session.provider().check_permissions_and_run(true);
    }

    fn on_status_checked(&mut self, ticket: u64, state: ConnectionState) {
        match self.pending.take_ticket(PendingCategory::Status, ticket) {
            Some(pending) => {
                pending.success(state.as_str());
            }
            None => debug!(ticket, %state, "availability answer for a call no longer pending"),
        }
    }

    // -- Lifecycle ------------------------------------------------------------

    fn attach_surface(&mut self, surface: Option<Arc<dyn UiSurface>>) {
        let Some(surface) = surface else {
            info!(tag = %self.config.log_tag, "attached without a surface; skipping initialisation");
            return;
        };

        match BridgeSession::attach(
            surface,
            self.factory.as_ref(),
            EventSink::new(self.commands.clone()),
            PermissionResultSink::new(self.commands.clone()),
            &self.config.log_tag,
        ) {
            Ok(session) => self.session = Some(session),
            Err(err) => error!(tag = %self.config.log_tag, error = %err, "surface attach failed"),
        }
    }

    fn detach_surface(&mut self, reconfiguring: bool) {
        info!(tag = %self.config.log_tag, reconfiguring, "surface detached");
        if let Some(session) = self.session.as_mut() {
            session.unbind_surface();
        }
        if self.pending.is_pending(PendingCategory::General) {
            warn!(
                tag = %self.config.log_tag,
                "permission call pending while detached; it resolves only if the provider reports back"
            );
        }
    }

    fn reattach_surface(&mut self, surface: Arc<dyn UiSurface>) {
        info!(tag = %self.config.log_tag, surface = surface.name(), "surface reattached");
        match self.session.as_mut() {
            Some(session) => session.rebind_surface(surface),
            None => warn!(tag = %self.config.log_tag, "no session to rebind; attach first"),
        }
    }

    // -- Helpers --------------------------------------------------------------

    fn provider(&self) -> Result<Arc<dyn HealthConnectProvider>> {
        self.session
            .as_ref()
            .map(|session| Arc::clone(session.provider()))
            .ok_or(BridgeError::NotAttached)
    }

    /// Put `reply` in its slot; answers it at once if the slot is busy and
    /// the policy rejects overlaps.
    fn hold(&mut self, category: PendingCategory, reply: PendingResult, hold: Hold) -> Option<u64> {
        match self.pending.store(category, reply, hold) {
            Ok(ticket) => Some(ticket),
            Err(rejected) => {
                rejected.resolve(MethodResponse::from_error(&BridgeError::AlreadyActive(category)));
                None
            }
        }
    }

    fn resolve(&mut self, category: PendingCategory, value: impl Into<Value>) {
        match self.pending.take(category) {
            Some(pending) => {
                pending.success(value);
            }
            None => debug!(tag = %self.config.log_tag, %category, "nothing pending; callback ignored"),
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            provider_ready: self.session.is_some(),
            surface_attached: self.session.as_ref().is_some_and(BridgeSession::has_surface),
            general_pending: self.pending.is_pending(PendingCategory::General),
            status_pending: self.pending.is_pending(PendingCategory::Status),
            data_pending: self.pending.is_pending(PendingCategory::Data),
        }
    }
}
