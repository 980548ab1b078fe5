//! Remote API error classification.
//!
//! Remote failures carry an opaque error code. Everything the rest of the
//! system needs to know about a code is decided in one place, by
//! [`classify_error_code`], instead of string comparisons scattered around
//! call sites.

use aws_sdk_ec2::error::ProvideErrorMetadata;
use std::time::Duration;
use thiserror::Error;

/// Error codes meaning the instance no longer exists on the remote system.
const NOT_FOUND_CODES: &[&str] = &[
    "InvalidInstanceID.NotFound",
    "InvalidInstanceID.Malformed",
];

/// Rate-limiting codes. The core never retries; callers layering a retry
/// policy on top can key off this class.
const TRANSIENT_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "RequestLimitExceeded",
];

/// What an opaque remote error code means for control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// The instance is gone; Read converts this into the absent signal.
    NotFound,
    /// Momentary remote condition; a caller-level retry could succeed.
    Transient,
    /// Everything else.
    Fatal,
}

/// Classify a remote error code.
pub fn classify_error_code(code: Option<&str>) -> ApiErrorKind {
    match code {
        Some(c) if NOT_FOUND_CODES.contains(&c) => ApiErrorKind::NotFound,
        Some(c) if TRANSIENT_CODES.contains(&c) => ApiErrorKind::Transient,
        _ => ApiErrorKind::Fatal,
    }
}

/// A failed call against the remote compute API.
#[derive(Debug, Clone, Error)]
#[error("{operation}: {message}")]
pub struct ApiError {
    /// Remote operation name, e.g. `"RunInstances"`.
    pub operation: &'static str,
    /// The remote error code, when the response carried one.
    pub code: Option<String>,
    pub message: String,
    pub kind: ApiErrorKind,
}

impl ApiError {
    /// Build from an SDK error, classifying its error code.
    pub fn from_sdk<E>(operation: &'static str, err: &E) -> Self
    where
        E: ProvideErrorMetadata + std::fmt::Display,
    {
        let code = err.code().map(str::to_owned);
        let message = err
            .message()
            .map(str::to_owned)
            .unwrap_or_else(|| err.to_string());
        Self {
            operation,
            kind: classify_error_code(code.as_deref()),
            code,
            message,
        }
    }

    /// A well-formed response that does not make sense, e.g. a successful
    /// create reporting zero instances.
    pub fn invalid_response(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            code: None,
            message: message.into(),
            kind: ApiErrorKind::Fatal,
        }
    }

    /// A wait that exhausted its time budget.
    pub fn timeout(operation: &'static str, after: Duration, attempts: u32) -> Self {
        Self {
            operation,
            code: None,
            message: format!("timed out after {after:?} ({attempts} attempts)"),
            kind: ApiErrorKind::Fatal,
        }
    }

    /// The caller cancelled the operation.
    pub fn cancelled(operation: &'static str) -> Self {
        Self {
            operation,
            code: None,
            message: "operation cancelled".to_string(),
            kind: ApiErrorKind::Fatal,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ApiErrorKind::NotFound
    }
}
