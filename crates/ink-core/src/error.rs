//! # AppError
//!
//! Centralized error handling for the Inkfolio core.
//! None of these are fatal to the process: the pipeline turns them into
//! user-visible messages, the asset store logs the ones it swallows.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single failed field check, rendered as `"<field>: <reason>"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub reason: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// The primary error type for all ink-core operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (e.g., Post, GalleryAsset)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// One or more fields failed the schema or the captcha check
    #[error("validation failed: {}", join_fields(.0))]
    Validation(Vec<FieldError>),

    /// Admission window exhausted for this client
    #[error("too many requests, retry in {}s", .retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    /// The notifier refused or timed out the hand-off
    #[error("notification dispatch failed: {0}")]
    NotifyDispatch(String),

    /// Writing or removing a stored binary failed
    #[error("asset i/o error: {0}")]
    AssetIo(String),

    /// Resource already exists (e.g., duplicate post slug)
    #[error("conflict: {0}")]
    Conflict(String),

    /// The request shape is not allowed (e.g., swapping three assets)
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// A bounded collection is full
    #[error("a maximum of {limit} items is allowed in the {collection} collection")]
    CapacityExceeded { collection: String, limit: usize },

    /// Infrastructure failure (e.g., DB down)
    #[error("internal service error: {0}")]
    Internal(String),
}

fn join_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(format!("{err:#}"))
    }
}

/// A specialized Result type for Inkfolio logic.
pub type Result<T> = std::result::Result<T, AppError>;
