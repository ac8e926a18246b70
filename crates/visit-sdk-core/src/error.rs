// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for the Visit SDK bridge.

use thiserror::Error;

use crate::types::PendingCategory;

/// Error codes carried in `MethodResponse::Error` replies.
pub mod codes {
    /// A capability was queried but the device cannot supply a value.
    pub const UNAVAILABLE: &str = "UNAVAILABLE";
    /// The call needs the capability provider, which is only built once a
    /// UI surface has attached.
    pub const NOT_ATTACHED: &str = "NOT_ATTACHED";
    /// Another call of the same category is still pending and the bridge is
    /// configured to reject overlapping calls.
    pub const ALREADY_ACTIVE: &str = "ALREADY_ACTIVE";
    /// Anything the caller cannot act on.
    pub const INTERNAL: &str = "INTERNAL";
}

/// Top-level error type for all bridge operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    // -- Platform --
    #[error("feature not available on this platform")]
    PlatformUnavailable,

    #[error("platform bridge error: {0}")]
    Bridge(String),

    #[error("capability unavailable: {0}")]
    Unavailable(String),

    // -- Lifecycle --
    #[error("capability provider not initialised (no UI surface has attached)")]
    NotAttached,

    #[error("no UI surface bound to launch the permission request")]
    NoSurface,

    // -- Pending results --
    #[error("a {0} call is already pending")]
    AlreadyActive(PendingCategory),

    #[error("pending call was superseded before it resolved")]
    Orphaned,

    #[error("bridge controller has shut down")]
    ControllerClosed,

    #[error("no handler registered on channel `{0}`")]
    NoHandler(String),

    // -- Configuration / persistence --
    #[error("configuration error: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BridgeError {
    /// Channel error code a caller sees when this error is turned into a reply.
    pub fn channel_code(&self) -> &'static str {
        match self {
            Self::PlatformUnavailable | Self::Bridge(_) | Self::Unavailable(_) => {
                codes::UNAVAILABLE
            }
            Self::NotAttached | Self::NoSurface => codes::NOT_ATTACHED,
            Self::AlreadyActive(_) => codes::ALREADY_ACTIVE,
            Self::Orphaned
            | Self::ControllerClosed
            | Self::NoHandler(_)
            | Self::Config(_)
            | Self::Io(_)
            | Self::Serialization(_) => codes::INTERNAL,
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BridgeError>;
