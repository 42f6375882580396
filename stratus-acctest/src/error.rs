//! Acceptance test failures

use stratus_core::diagnostics::Diagnostics;
use stratus_core::parser::ParseError;

#[derive(Debug, thiserror::Error)]
pub enum AcceptanceError {
    #[error("Invalid configuration: {0}")]
    Parse(#[from] ParseError),

    #[error("Unknown resource type: {0}")]
    UnknownType(String),

    #[error("{address}: {diagnostics}")]
    Validation {
        address: String,
        diagnostics: Diagnostics,
    },

    #[error("Provider configuration failed: {0}")]
    Configure(Diagnostics),

    #[error("{address}: {message}")]
    Apply { address: String, message: String },

    #[error("{0} no longer exists after apply")]
    Vanished(String),

    #[error("After applying this step, the plan was not empty: {address} would change {}", .attributes.join(", "))]
    PlanNotEmpty {
        address: String,
        attributes: Vec<String>,
    },

    #[error("Not found: {0} in state")]
    ResourceNotFound(String),

    #[error("{address}: attribute '{key}' expected {expected:?}, got {actual:?}")]
    AttributeMismatch {
        address: String,
        key: String,
        expected: String,
        actual: Option<String>,
    },

    #[error("{address}: attribute '{key}' expected to be set")]
    AttributeNotSet { address: String, key: String },

    #[error("{address}: attribute '{key}' found when not expected: {value:?}")]
    UnexpectedAttribute {
        address: String,
        key: String,
        value: String,
    },

    #[error("{address}: imported attribute '{key}' differs: state {expected:?}, import {actual:?}")]
    ImportMismatch {
        address: String,
        key: String,
        expected: Option<String>,
        actual: Option<String>,
    },

    #[error("{address} still exists as {identifier} after destroy")]
    NotDestroyed { address: String, identifier: String },

    #[error("Invalid test step {index}: {message}")]
    InvalidStep { index: usize, message: String },
}
