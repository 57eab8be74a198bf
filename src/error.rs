//! Error types for the replicated-state synchronization core.

use crate::types::ContractInstanceId;
use crate::validate::InvalidReason;
use thiserror::Error;

/// Encoding and decoding failures at the byte boundary
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("Malformed {what}: {reason}")]
    Malformed { what: &'static str, reason: String },

    #[error("Unsupported {what} format version: {version}")]
    UnsupportedVersion { what: &'static str, version: u32 },

    #[error("Failed to encode {what}: {reason}")]
    Encode { what: &'static str, reason: String },
}

/// A delta that could not be applied. Local state is never changed when
/// this is returned; the caller should re-fetch a summary and retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejected {
    #[error("Delta references unknown component id {0}")]
    UnknownComponent(u16),

    #[error("Malformed delta: {0}")]
    Malformed(String),

    #[error("Delta produces invalid state: {0}")]
    Invalid(InvalidReason),
}

impl From<CodecError> for Rejected {
    fn from(err: CodecError) -> Self {
        Rejected::Malformed(err.to_string())
    }
}

/// Errors surfaced by the opaque contract interface
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractError {
    #[error("Invalid: {0}")]
    Invalid(InvalidReason),

    #[error("Rejected: {0}")]
    Rejected(#[from] Rejected),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
}

/// Storage-related errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("State not found for instance {0}")]
    StateNotFound(ContractInstanceId),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<sled::Error> for StorageError {
    fn from(err: sled::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

/// Synchronization coordinator errors
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Peer {peer} degraded after {attempts} attempts")]
    Degraded { peer: String, attempts: u32 },

    #[error("Unknown peer: {0}")]
    UnknownPeer(String),

    #[error("Related states required: {0:?}")]
    NeedsRelated(Vec<ContractInstanceId>),

    #[error("Contract error: {0}")]
    Contract(#[from] ContractError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
}

/// Top-level errors for configuration, CLI and embedding hosts
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Contract error: {0}")]
    Contract(#[from] ContractError),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}

impl From<CodecError> for ApiError {
    fn from(err: CodecError) -> Self {
        ApiError::Contract(ContractError::Codec(err))
    }
}
