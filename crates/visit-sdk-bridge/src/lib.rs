// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! Visit SDK: native bridge between a cross-platform caller and the
//! Android Health Connect integration.
//!
//! The [`plugin::VisitSdkPlugin`] registers a [`controller::BridgeController`]
//! on the `visit_flutter_sdk` method channel. The controller forwards calls
//! to a [`traits::HealthConnectProvider`] built when the host UI surface
//! attaches, and turns the provider's callbacks back into one reply per
//! call.

pub mod controller;
pub mod events;
pub mod pending;
pub mod plugin;
pub mod session;
pub mod simulated;
pub mod storage;
pub mod traits;

#[cfg(target_os = "android")]
pub mod android;

#[cfg(not(target_os = "android"))]
pub mod stub;

use std::sync::Arc;

pub use controller::{BridgeController, BridgeHandle, SessionSnapshot};
pub use events::{EventSink, PermissionResultSink, ProviderEvent};
pub use plugin::{MethodChannel, VisitSdkPlugin};

/// Device facts for the target operating system.
pub fn platform_device() -> Arc<dyn traits::DeviceInfo> {
    #[cfg(target_os = "android")]
    {
        // Android: `jni-rs` calls into BatteryManager and Build.VERSION.
        Arc::new(android::AndroidDevice)
    }
    #[cfg(not(target_os = "android"))]
    {
        // DESKTOP/CI: no battery or Android release to report.
        Arc::new(stub::StubDevice)
    }
}
