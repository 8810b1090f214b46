//! Error taxonomy shared by every step and both transports.
//!
//! Steps fail with a [`StepError`]. The invoker turns the first failure of an
//! invocation into an [`ErrorEnvelope`], which is what adapters map onto
//! HTTP statuses or JSON-RPC codes.

use core::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::persistence::StoreError;

// ─────────────────────────────────────────────────────────────────────────────
// ErrorCode
// ─────────────────────────────────────────────────────────────────────────────

/// Transport-agnostic failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The payload failed validation.
    Validation,
    /// The addressed item does not exist.
    NotFound,
    /// The write conflicts with existing state.
    Conflict,
    /// The caller is not authenticated.
    Unauthorized,
    /// The caller is authenticated but not allowed.
    Forbidden,
    /// Anything else. Detail never leaves the server.
    Internal,
}

impl ErrorCode {
    /// Every taxonomy code.
    pub const ALL: [ErrorCode; 6] = [
        ErrorCode::Validation,
        ErrorCode::NotFound,
        ErrorCode::Conflict,
        ErrorCode::Unauthorized,
        ErrorCode::Forbidden,
        ErrorCode::Internal,
    ];

    /// Wire name (`"NOT_FOUND"`).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Validation => "VALIDATION",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::Internal => "INTERNAL",
        }
    }

    /// Parses a wire name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|code| code.as_str() == name)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// FieldError
// ─────────────────────────────────────────────────────────────────────────────

/// One field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Dotted path to the offending field (`"name"`, `"[1].name"`).
    pub field: String,
    /// Machine-readable reason (`"required"`, `"type"`).
    pub code: String,
    /// Human-readable explanation.
    pub message: String,
}

impl FieldError {
    /// Creates a field error.
    #[must_use]
    pub fn new(
        field: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            code: code.into(),
            message: message.into(),
        }
    }

    /// Prefixes the field path, used when validating bulk items.
    #[must_use]
    pub fn prefixed(mut self, prefix: &str) -> Self {
        self.field = if self.field.is_empty() {
            prefix.to_string()
        } else {
            format!("{prefix}.{}", self.field)
        };
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// StepError
// ─────────────────────────────────────────────────────────────────────────────

/// Boxed error source kept for server-side logging.
pub type BoxError = Box<dyn core::error::Error + Send + Sync + 'static>;

/// Failure raised by a step to abort the invocation.
///
/// Typed constructors pick a taxonomy code explicitly. Anything converted
/// through [`StepError::from_error`] is treated as an uncaught failure and
/// surfaces as [`ErrorCode::Internal`].
///
/// # Example
///
/// ```
/// use switchyard_kernel::error::{ErrorCode, StepError};
///
/// let err = StepError::validation("payload failed validation")
///     .with_detail("name", "required", "name is required");
///
/// assert_eq!(err.code(), ErrorCode::Validation);
/// assert_eq!(err.details().len(), 1);
/// ```
#[derive(Debug, Error)]
#[error("{code}: {message}")]
pub struct StepError {
    code: ErrorCode,
    message: String,
    details: Vec<FieldError>,
    #[source]
    source: Option<BoxError>,
}

impl StepError {
    /// Creates an error with an explicit code.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: Vec::new(),
            source: None,
        }
    }

    /// [`ErrorCode::Validation`]
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Validation, message)
    }

    /// [`ErrorCode::NotFound`]
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// [`ErrorCode::Conflict`]
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    /// [`ErrorCode::Unauthorized`]
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    /// [`ErrorCode::Forbidden`]
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    /// [`ErrorCode::Internal`]. The message is logged, never returned.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    /// Wraps an arbitrary error as an uncaught internal failure.
    #[must_use]
    pub fn from_error<E>(error: E) -> Self
    where
        E: core::error::Error + Send + Sync + 'static,
    {
        Self {
            code: ErrorCode::Internal,
            message: error.to_string(),
            details: Vec::new(),
            source: Some(Box::new(error)),
        }
    }

    /// Appends one field detail.
    #[must_use]
    pub fn with_detail(
        mut self,
        field: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        self.details.push(FieldError::new(field, code, message));
        self
    }

    /// Appends many field details.
    #[must_use]
    pub fn with_details(mut self, details: impl IntoIterator<Item = FieldError>) -> Self {
        self.details.extend(details);
        self
    }

    /// Attaches a source error.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// The taxonomy code.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// The message as raised.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Field details, if any.
    #[must_use]
    pub fn details(&self) -> &[FieldError] {
        &self.details
    }

    /// Coerces a failure raised before the transaction boundary into the
    /// authorization family: `Unauthorized` stays, everything else becomes
    /// `Forbidden`.
    #[must_use]
    pub(crate) fn into_authorization(self) -> Self {
        match self.code {
            ErrorCode::Unauthorized | ErrorCode::Forbidden => self,
            _ => Self {
                code: ErrorCode::Forbidden,
                message: "forbidden".to_string(),
                details: Vec::new(),
                source: Some(Box::new(self)),
            },
        }
    }

    /// Renders the full chain for logs.
    #[must_use]
    pub fn detail_chain(&self) -> String {
        let mut out = self.message.clone();
        let mut source = core::error::Error::source(self);
        while let Some(err) = source {
            out.push_str(": ");
            out.push_str(&err.to_string());
            source = err.source();
        }
        out
    }
}

impl From<StoreError> for StepError {
    fn from(error: StoreError) -> Self {
        let code = match &error {
            StoreError::NotFound { .. } => ErrorCode::NotFound,
            StoreError::Conflict { .. } => ErrorCode::Conflict,
            StoreError::NoTransaction | StoreError::Backend(_) => ErrorCode::Internal,
        };
        Self {
            code,
            message: error.to_string(),
            details: Vec::new(),
            source: None,
        }
    }
}

impl From<serde_json::Error> for StepError {
    fn from(error: serde_json::Error) -> Self {
        Self::validation(format!("malformed payload: {error}"))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ErrorEnvelope
// ─────────────────────────────────────────────────────────────────────────────

/// The client-facing form of a failed invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorEnvelope {
    /// Taxonomy code.
    pub code: ErrorCode,
    /// Client-safe message. Generic for [`ErrorCode::Internal`].
    pub message: String,
    /// Resolves to the captured trace via `Kernel::trace`.
    pub correlation_id: String,
    /// Field details. Always empty for a hidden [`ErrorCode::Internal`].
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<FieldError>,
}

/// Message returned for every internal failure unless detail exposure is on.
pub const INTERNAL_MESSAGE: &str = "internal server error";

impl ErrorEnvelope {
    pub(crate) fn from_step(error: &StepError, correlation_id: &str, expose_detail: bool) -> Self {
        let (message, details) = match error.code {
            ErrorCode::Internal if !expose_detail => (INTERNAL_MESSAGE.to_string(), Vec::new()),
            ErrorCode::Internal => (error.detail_chain(), error.details.clone()),
            _ => (error.message.clone(), error.details.clone()),
        };
        Self {
            code: error.code,
            message,
            correlation_id: correlation_id.to_string(),
            details,
        }
    }

    pub(crate) fn cancelled(correlation_id: &str) -> Self {
        Self {
            code: ErrorCode::Internal,
            message: "request cancelled".to_string(),
            correlation_id: correlation_id.to_string(),
            details: Vec::new(),
        }
    }
}

impl fmt::Display for ErrorEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} (correlation id {})",
            self.code, self.message, self.correlation_id
        )
    }
}

impl core::error::Error for ErrorEnvelope {}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("socket closed")]
    struct SocketClosed;

    #[test]
    fn code_names_round_trip() {
        for code in ErrorCode::ALL {
            assert_eq!(ErrorCode::parse(code.as_str()), Some(code));
        }
        assert_eq!(ErrorCode::parse("TEAPOT"), None);
    }

    #[test]
    fn untyped_errors_become_internal() {
        let err = StepError::from_error(SocketClosed);
        assert_eq!(err.code(), ErrorCode::Internal);
        assert_eq!(err.message(), "socket closed");
    }

    #[test]
    fn internal_detail_is_hidden_from_envelope() {
        let err = StepError::from_error(SocketClosed);
        let envelope = ErrorEnvelope::from_step(&err, "cid", false);
        assert_eq!(envelope.message, INTERNAL_MESSAGE);
        assert_eq!(envelope.correlation_id, "cid");

        let exposed = ErrorEnvelope::from_step(&err, "cid", true);
        assert!(exposed.message.contains("socket closed"));
    }

    #[test]
    fn internal_field_details_stay_server_side() {
        let err = StepError::internal("pool exhausted").with_detail(
            "dsn",
            "unreachable",
            "postgres://app:hunter2@db",
        );
        let envelope = ErrorEnvelope::from_step(&err, "cid", false);
        assert!(envelope.details.is_empty());
        assert!(!serde_json::to_string(&envelope).expect("envelope should serialize").contains("hunter2"));

        let exposed = ErrorEnvelope::from_step(&err, "cid", true);
        assert_eq!(exposed.details.len(), 1);
    }

    #[test]
    fn typed_messages_pass_through() {
        let err = StepError::not_found("widget 7 not found");
        let envelope = ErrorEnvelope::from_step(&err, "cid", false);
        assert_eq!(envelope.code, ErrorCode::NotFound);
        assert_eq!(envelope.message, "widget 7 not found");
    }

    #[test]
    fn authorization_coercion_keeps_unauthorized() {
        let kept = StepError::unauthorized("missing token").into_authorization();
        assert_eq!(kept.code(), ErrorCode::Unauthorized);
        assert_eq!(kept.message(), "missing token");

        let coerced = StepError::from_error(SocketClosed).into_authorization();
        assert_eq!(coerced.code(), ErrorCode::Forbidden);
        assert_eq!(coerced.message(), "forbidden");
        assert!(coerced.detail_chain().contains("socket closed"));
    }

    #[test]
    fn store_errors_map_to_specific_codes() {
        let err: StepError = StoreError::NotFound {
            resource: "Widget".into(),
            id: "1".into(),
        }
        .into();
        assert_eq!(err.code(), ErrorCode::NotFound);

        let err: StepError = StoreError::Conflict {
            resource: "Widget".into(),
            id: "1".into(),
        }
        .into();
        assert_eq!(err.code(), ErrorCode::Conflict);

        let err: StepError = StoreError::Backend("disk full".into()).into();
        assert_eq!(err.code(), ErrorCode::Internal);
    }

    #[test]
    fn field_errors_prefix_for_bulk_items() {
        let detail = FieldError::new("name", "required", "name is required").prefixed("[1]");
        assert_eq!(detail.field, "[1].name");
    }
}
