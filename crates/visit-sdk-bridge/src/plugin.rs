// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Engine-facing plugin: owns the named method channel and the controller
// behind it, and forwards surface lifecycle events.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use visit_sdk_core::config::BridgeConfig;
use visit_sdk_core::error::{BridgeError, Result};
use visit_sdk_core::types::{MethodCall, MethodResponse};

use crate::controller::{BridgeController, BridgeHandle};
use crate::traits::{DeviceInfo, ProviderFactory, UiSurface};

/// A named channel with at most one call handler. Clones share the handler.
#[derive(Clone)]
pub struct MethodChannel {
    name: String,
    handler: Option<BridgeHandle>,
}

impl MethodChannel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handler: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_method_call_handler(&mut self, handler: Option<BridgeHandle>) {
        self.handler = handler;
    }

    pub fn has_handler(&self) -> bool {
        self.handler.is_some()
    }

    /// Send a call to the registered handler and wait for its reply.
    pub async fn invoke(&self, call: MethodCall) -> Result<MethodResponse> {
        let handler = self
            .handler
            .clone()
            .ok_or_else(|| BridgeError::NoHandler(self.name.clone()))?;
        handler.invoke(call).await
    }
}

/// The plugin as the engine sees it.
pub struct VisitSdkPlugin {
    channel: MethodChannel,
    handle: BridgeHandle,
    task: Option<JoinHandle<()>>,
}

impl VisitSdkPlugin {
    /// Register on the engine: start the controller and install it as the
    /// handler of the configured channel. Must run inside a tokio runtime.
    pub fn attach_to_engine(
        config: BridgeConfig,
        device: Arc<dyn DeviceInfo>,
        factory: Box<dyn ProviderFactory>,
    ) -> Self {
        info!(tag = %config.log_tag, channel = %config.channel_name, "attached to engine");
        let mut channel = MethodChannel::new(config.channel_name.clone());
        let (handle, task) = BridgeController::spawn(config, device, factory);
        channel.set_method_call_handler(Some(handle.clone()));
        Self {
            channel,
            handle,
            task: Some(task),
        }
    }

    pub fn channel(&self) -> &MethodChannel {
        &self.channel
    }

    pub fn handle(&self) -> &BridgeHandle {
        &self.handle
    }

    /// `None` models an attach event that carried no usable surface; the
    /// provider is not built in that case.
    pub fn on_attached_to_surface(&self, surface: Option<Arc<dyn UiSurface>>) -> Result<()> {
        self.handle.attach_surface(surface)
    }

    pub fn on_detached_from_surface(&self) -> Result<()> {
        self.handle.detach_surface()
    }

    pub fn on_detached_from_surface_for_config_changes(&self) -> Result<()> {
        self.handle.detach_surface_for_config_changes()
    }

    pub fn on_reattached_to_surface_for_config_changes(
        &self,
        surface: Arc<dyn UiSurface>,
    ) -> Result<()> {
        self.handle.reattach_surface_for_config_changes(surface)
    }

    /// Unregister from the engine and stop the controller.
    pub async fn detach_from_engine(&mut self) {
        info!(channel = %self.channel.name(), "detached from engine");
        self.channel.set_method_call_handler(None);
        self.handle.shutdown();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                debug!(error = %err, "controller task ended abnormally");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use visit_sdk_core::types::ConnectionState;

    use crate::platform_device;
    use crate::simulated::{SimulatedPlatform, UserResponse};

    fn plugin(platform: &SimulatedPlatform) -> VisitSdkPlugin {
        VisitSdkPlugin::attach_to_engine(
            BridgeConfig::default(),
            platform_device(),
            platform.factory(),
        )
    }

    #[tokio::test]
    async fn registers_on_named_channel() {
        let platform = SimulatedPlatform::new(ConnectionState::Connected);
        let plugin = plugin(&platform);
        assert_eq!(plugin.channel().name(), "visit_flutter_sdk");
        assert!(plugin.channel().has_handler());

        let reply = plugin
            .channel()
            .invoke(MethodCall::new("getPlatformVersion"))
            .await
            .unwrap();
        let version = reply.value().and_then(|v| v.as_str()).unwrap();
        assert!(version.starts_with("Android "), "got {version}");
    }

    #[tokio::test]
    async fn stub_battery_is_unavailable() {
        let platform = SimulatedPlatform::new(ConnectionState::Connected);
        let plugin = plugin(&platform);
        let reply = plugin
            .channel()
            .invoke(MethodCall::new("getBatteryLevel"))
            .await
            .unwrap();
        assert_eq!(reply.error_code(), Some("UNAVAILABLE"));
    }

    #[tokio::test]
    async fn granted_sheet_round_trip() {
        let platform = SimulatedPlatform::new(ConnectionState::Installed);
        platform.surface.set_response(UserResponse::GrantAll);
        let plugin = plugin(&platform);
        plugin
            .on_attached_to_surface(Some(platform.surface_handle()))
            .unwrap();

        let reply = plugin
            .channel()
            .invoke(MethodCall::new("askForFitnessPermission"))
            .await
            .unwrap();
        assert_eq!(reply, MethodResponse::success("GRANTED"));

        // Connected now, so data flows without another sheet.
        let data = plugin
            .channel()
            .invoke(MethodCall::new("requestDailyFitnessData"))
            .await
            .unwrap();
        assert!(data.is_success());
        assert_eq!(platform.surface.launches().len(), 1);
    }

    #[tokio::test]
    async fn refused_sheet_round_trip() {
        let platform = SimulatedPlatform::new(ConnectionState::Installed);
        platform.surface.set_response(UserResponse::GrantNone);
        let plugin = plugin(&platform);
        plugin
            .on_attached_to_surface(Some(platform.surface_handle()))
            .unwrap();

        let reply = plugin
            .channel()
            .invoke(MethodCall::new("askForFitnessPermission"))
            .await
            .unwrap();
        assert_eq!(reply, MethodResponse::success("CANCELLED"));
    }

    #[tokio::test]
    async fn config_change_keeps_session() {
        let platform = SimulatedPlatform::new(ConnectionState::Connected);
        let plugin = plugin(&platform);
        plugin
            .on_attached_to_surface(Some(platform.surface_handle()))
            .unwrap();
        plugin.on_detached_from_surface_for_config_changes().unwrap();
        plugin
            .on_reattached_to_surface_for_config_changes(platform.surface_handle())
            .unwrap();

        let snapshot = plugin.handle().snapshot().await.unwrap();
        assert!(snapshot.provider_ready);
        assert!(snapshot.surface_attached);
        assert_eq!(platform.providers_built(), 1);
    }

    #[tokio::test]
    async fn detach_from_engine_clears_handler() {
        let platform = SimulatedPlatform::new(ConnectionState::Connected);
        let mut plugin = plugin(&platform);
        plugin.detach_from_engine().await;

        assert!(!plugin.channel().has_handler());
        assert!(plugin.handle().is_closed());
        let err = plugin
            .channel()
            .invoke(MethodCall::new("getPlatformVersion"))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::NoHandler(name) if name == "visit_flutter_sdk"));
    }
}
