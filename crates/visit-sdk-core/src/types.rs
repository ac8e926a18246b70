// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Visit SDK method channel.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::BridgeError;

/// The fixed vocabulary of calls the bridge understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    GetPlatformVersion,
    GetBatteryLevel,
    GetHealthConnectStatus,
    AskForFitnessPermission,
    RequestDailyFitnessData,
    OpenHealthConnectApp,
    RequestActivityDataFromHealthConnect,
}

impl Method {
    pub const ALL: [Method; 7] = [
        Self::GetPlatformVersion,
        Self::GetBatteryLevel,
        Self::GetHealthConnectStatus,
        Self::AskForFitnessPermission,
        Self::RequestDailyFitnessData,
        Self::OpenHealthConnectApp,
        Self::RequestActivityDataFromHealthConnect,
    ];

    /// Wire name used on the channel.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GetPlatformVersion => "getPlatformVersion",
            Self::GetBatteryLevel => "getBatteryLevel",
            Self::GetHealthConnectStatus => "getHealthConnectStatus",
            Self::AskForFitnessPermission => "askForFitnessPermission",
            Self::RequestDailyFitnessData => "requestDailyFitnessData",
            Self::OpenHealthConnectApp => "openHealthConnectApp",
            Self::RequestActivityDataFromHealthConnect => "requestActivityDataFromHealthConnect",
        }
    }

    /// Look up a method by its wire name. Matching is exact and case-sensitive.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == name)
    }

    /// Which pending slot a call of this method occupies, if any.
    ///
    /// Synchronous methods answer inline and never hold a slot.
    pub fn pending_category(&self) -> Option<PendingCategory> {
        match self {
            Self::GetPlatformVersion | Self::GetBatteryLevel => None,
            Self::GetHealthConnectStatus => Some(PendingCategory::Status),
            Self::AskForFitnessPermission | Self::OpenHealthConnectApp => {
                Some(PendingCategory::General)
            }
            Self::RequestDailyFitnessData | Self::RequestActivityDataFromHealthConnect => {
                Some(PendingCategory::Data)
            }
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical categories of owed responses. At most one response per category
/// is tracked at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingCategory {
    /// Permission requests and the open-app side channel.
    General,
    /// Health Connect availability checks.
    Status,
    /// Fitness and activity data retrieval.
    Data,
}

impl fmt::Display for PendingCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::General => "general",
            Self::Status => "status",
            Self::Data => "data",
        })
    }
}

/// An incoming request from the cross-platform caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Map<String, Value>>,
}

impl MethodCall {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            arguments: None,
        }
    }

    /// Builder-style helper for attaching one named argument.
    pub fn with_argument(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.arguments
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn argument(&self, key: &str) -> Option<&Value> {
        self.arguments.as_ref()?.get(key)
    }

    /// String argument, `None` if missing or not a string.
    pub fn argument_str(&self, key: &str) -> Option<&str> {
        self.argument(key)?.as_str()
    }

    /// Numeric argument as an integer. Floating-point values are truncated;
    /// anything non-numeric yields `None`.
    pub fn argument_i64(&self, key: &str) -> Option<i64> {
        let value = self.argument(key)?;
        value
            .as_i64()
            .or_else(|| value.as_u64().map(|v| v.min(i64::MAX as u64) as i64))
            .or_else(|| value.as_f64().map(|v| v as i64))
    }

    /// Resolve the wire name against the known vocabulary.
    pub fn known_method(&self) -> Option<Method> {
        Method::from_name(&self.method)
    }
}

/// Reply delivered to the caller for one call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MethodResponse {
    Success {
        #[serde(default)]
        value: Value,
    },
    Error {
        code: String,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<Value>,
    },
    /// The method name is not part of the vocabulary. This is a soft reply,
    /// distinct from an operation failing.
    NotImplemented,
}

impl MethodResponse {
    pub fn success(value: impl Into<Value>) -> Self {
        Self::Success {
            value: value.into(),
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    /// Reply for a bridge-level failure, using its channel code.
    pub fn from_error(err: &BridgeError) -> Self {
        Self::error(err.channel_code(), err.to_string())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Success payload, if any.
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Success { value } => Some(value),
            _ => None,
        }
    }

    /// Error code, if this is an error reply.
    pub fn error_code(&self) -> Option<&str> {
        match self {
            Self::Error { code, .. } => Some(code),
            _ => None,
        }
    }
}

/// Readiness of the Health Connect provider.
///
/// Only the provider moves between states:
/// `NONE → NOT_INSTALLED | INSTALLED → CONNECTED`, with `NOT_SUPPORTED`
/// absorbing for devices that cannot run Health Connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    #[default]
    None,
    NotSupported,
    NotInstalled,
    Installed,
    Connected,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::NotSupported => "NOT_SUPPORTED",
            Self::NotInstalled => "NOT_INSTALLED",
            Self::Installed => "INSTALLED",
            Self::Connected => "CONNECTED",
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a fitness permission request as reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionOutcome {
    Granted,
    /// Also used when the user explicitly denies: callers only distinguish
    /// "granted" from "not granted".
    Cancelled,
}

impl PermissionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Granted => "GRANTED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// `Granted` iff every required permission appears in the granted set.
    pub fn from_grant(granted: &BTreeSet<String>, required: &BTreeSet<String>) -> Self {
        if required.is_subset(granted) {
            Self::Granted
        } else {
            Self::Cancelled
        }
    }
}

impl fmt::Display for PermissionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed arguments of `requestActivityDataFromHealthConnect`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityQuery {
    /// Activity type (e.g. "steps", "distance"); passed through unchecked.
    pub kind: Option<String>,
    /// Bucket frequency (e.g. "day", "week"); passed through unchecked.
    pub frequency: Option<String>,
    /// Epoch milliseconds; 0 when the caller omitted it.
    pub timestamp: i64,
}

impl ActivityQuery {
    pub fn from_call(call: &MethodCall) -> Self {
        Self {
            kind: call.argument_str("type").map(str::to_owned),
            frequency: call.argument_str("frequency").map(str::to_owned),
            timestamp: call.argument_i64("timestamp").unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn method_names_resolve_exactly() {
        for method in Method::ALL {
            assert_eq!(Method::from_name(method.as_str()), Some(method));
        }
        assert_eq!(Method::from_name("GetPlatformVersion"), None);
        assert_eq!(Method::from_name(""), None);
    }

    #[test]
    fn synchronous_methods_hold_no_slot() {
        assert_eq!(Method::GetPlatformVersion.pending_category(), None);
        assert_eq!(Method::GetBatteryLevel.pending_category(), None);
        assert_eq!(
            Method::OpenHealthConnectApp.pending_category(),
            Some(PendingCategory::General)
        );
        assert_eq!(
            Method::RequestDailyFitnessData.pending_category(),
            Some(PendingCategory::Data)
        );
    }

    #[test]
    fn missing_timestamp_defaults_to_zero() {
        let call = MethodCall::new("requestActivityDataFromHealthConnect")
            .with_argument("type", "steps")
            .with_argument("frequency", "day");
        let query = ActivityQuery::from_call(&call);
        assert_eq!(query.kind.as_deref(), Some("steps"));
        assert_eq!(query.frequency.as_deref(), Some("day"));
        assert_eq!(query.timestamp, 0);
    }

    #[test]
    fn non_numeric_timestamp_defaults_to_zero() {
        let call = MethodCall::new("requestActivityDataFromHealthConnect")
            .with_argument("timestamp", "1700000000000");
        assert_eq!(ActivityQuery::from_call(&call).timestamp, 0);
    }

    #[test]
    fn float_timestamp_is_truncated() {
        let call = MethodCall::new("requestActivityDataFromHealthConnect")
            .with_argument("timestamp", 1_700_000_000_123.9);
        assert_eq!(ActivityQuery::from_call(&call).timestamp, 1_700_000_000_123);
    }

    #[test]
    fn grant_requires_superset() {
        let required: BTreeSet<String> = ["steps.read", "distance.read"]
            .into_iter()
            .map(String::from)
            .collect();
        let mut granted: BTreeSet<String> = ["steps.read".to_string()].into();
        assert_eq!(
            PermissionOutcome::from_grant(&granted, &required),
            PermissionOutcome::Cancelled
        );
        granted.insert("distance.read".into());
        granted.insert("sleep.read".into());
        assert_eq!(
            PermissionOutcome::from_grant(&granted, &required),
            PermissionOutcome::Granted
        );
    }

    #[test]
    fn connection_state_renders_wire_names() {
        assert_eq!(ConnectionState::NotSupported.to_string(), "NOT_SUPPORTED");
        assert_eq!(
            serde_json::to_value(ConnectionState::NotInstalled).unwrap(),
            json!("NOT_INSTALLED")
        );
        assert_eq!(ConnectionState::default(), ConnectionState::None);
    }

    #[test]
    fn call_decodes_without_arguments() {
        let call: MethodCall = serde_json::from_value(json!({"method": "getBatteryLevel"})).unwrap();
        assert_eq!(call.known_method(), Some(Method::GetBatteryLevel));
        assert!(call.arguments.is_none());
    }

    #[test]
    fn response_serializes_with_status_tag() {
        let reply = MethodResponse::error("UNAVAILABLE", "Battery level not available.");
        assert_eq!(
            serde_json::to_value(&reply).unwrap(),
            json!({"status": "error", "code": "UNAVAILABLE", "message": "Battery level not available."})
        );
        assert_eq!(
            serde_json::to_value(MethodResponse::NotImplemented).unwrap(),
            json!({"status": "not_implemented"})
        );
    }
}
