//! # Culling Error Types
//!
//! Everything that can go wrong between the oracle and the draw pass.
//!
//! Per-frame failures (`WouldBlock`, `ReadbackFailed`, `StaleReadback`) are
//! never fatal: the pipeline logs them and treats the cycle as having
//! produced nothing new.

use thiserror::Error;

use crate::oracle::Resolution;

/// Errors that can occur in the culling pipeline.
#[derive(Error, Debug)]
pub enum CullingError {
    /// A readback was mapped before its transfer completed.
    #[error("readback not ready: mapping would block")]
    WouldBlock,

    /// The device reported a failed transfer or mapping.
    #[error("readback failed: {0}")]
    ReadbackFailed(String),

    /// The readback belongs to an oracle output of another size.
    #[error("stale readback: expected {expected}, got {actual}")]
    StaleReadback {
        /// Current oracle resolution.
        expected: Resolution,
        /// Resolution the readback was issued at.
        actual: Resolution,
    },

    /// No readback with this ticket is in flight.
    #[error("unknown readback ticket {0}")]
    UnknownTicket(u64),

    /// Device-side failure outside of readback.
    #[error("device error: {0}")]
    Device(String),

    /// A configuration value is out of range.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Failed to read a config file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse a config file.
    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl CullingError {
    /// Whether the failure only costs this cycle's result.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::WouldBlock | Self::ReadbackFailed(_) | Self::StaleReadback { .. } | Self::UnknownTicket(_)
        )
    }
}

/// Result type for culling operations.
pub type CullingResult<T> = Result<T, CullingError>;
