//! CLI output: error mapping from domain errors to the CLI surface.

use crate::error::{ApiError, ContractError};

/// Map domain errors to a one-line message for stderr.
pub fn map_error(e: &ApiError) -> String {
    match e {
        ApiError::Contract(ContractError::Invalid(reason)) => format!("invalid: {}", reason),
        ApiError::Contract(ContractError::Rejected(rejected)) => format!("rejected: {}", rejected),
        other => other.to_string(),
    }
}
