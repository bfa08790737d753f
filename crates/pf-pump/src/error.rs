//! Error types for the pump boundary.

use thiserror::Error;

/// Errors raised when the host hands the pump invalid parameters.
///
/// The propagation graph itself never fails; these are boundary checks.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PumpError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(#[from] pf_core::PfError),

    #[error("Invalid channel number: {number}")]
    InvalidChannel { number: u8 },

    #[error("Invalid keypad digit: {digit}")]
    InvalidKey { digit: u8 },

    #[error("Event queue disconnected")]
    QueueDisconnected,
}

pub type PumpResult<T> = Result<T, PumpError>;
