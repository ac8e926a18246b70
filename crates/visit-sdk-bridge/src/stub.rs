// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stub device for desktop/CI builds where the Android APIs are unavailable.
//
// The battery query reports `PlatformUnavailable`, which the controller
// turns into an `UNAVAILABLE` reply.

use visit_sdk_core::error::{BridgeError, Result};

use crate::traits::DeviceInfo;

/// Device facts on non-Android targets.
pub struct StubDevice;

impl DeviceInfo for StubDevice {
    fn os_release(&self) -> Result<String> {
        Ok(format!("{} (stub)", std::env::consts::OS))
    }

    fn battery_level(&self) -> Result<i32> {
        tracing::warn!("DeviceInfo::battery_level called on stub device");
        Err(BridgeError::PlatformUnavailable)
    }
}
