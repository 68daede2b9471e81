//! # Errors (Feathers-style)
//!
//! Structured errors for the deck draw service.
//! Core goals:
//! - consistent status codes + class names
//! - carried through `anyhow::Error` so `?` works everywhere
//! - transport-agnostic (the HTTP crate decides how to serialize)
//! - a machine-readable reason code (`invalid_deck`, `cache_empty`, ...) in `data.reason`

use std::fmt;

use anyhow::Error as AnyError;
use serde_json::{json, Value};

/// A convenience result type for deck-core APIs.
pub type DeckResult<T> = std::result::Result<T, AnyError>;

/// Feathers-ish error class names + status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadRequest,       // 400
    NotAuthenticated, // 401
    NotFound,         // 404
    PayloadTooLarge,  // 413
    GeneralError,     // 500
    BadGateway,       // 502
}

impl ErrorKind {
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::BadRequest => 400,
            ErrorKind::NotAuthenticated => 401,
            ErrorKind::NotFound => 404,
            ErrorKind::PayloadTooLarge => 413,
            ErrorKind::GeneralError => 500,
            ErrorKind::BadGateway => 502,
        }
    }

    /// Feathers error `name` (e.g. "NotFound")
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "BadRequest",
            ErrorKind::NotAuthenticated => "NotAuthenticated",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::PayloadTooLarge => "PayloadTooLarge",
            ErrorKind::GeneralError => "GeneralError",
            ErrorKind::BadGateway => "BadGateway",
        }
    }

    /// Feathers error `className` (kebab-cased)
    pub fn class_name(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "bad-request",
            ErrorKind::NotAuthenticated => "not-authenticated",
            ErrorKind::NotFound => "not-found",
            ErrorKind::PayloadTooLarge => "payload-too-large",
            ErrorKind::GeneralError => "general-error",
            ErrorKind::BadGateway => "bad-gateway",
        }
    }
}

/// A structured error that can live inside `anyhow::Error`.
#[derive(Debug)]
pub struct DeckError {
    pub kind: ErrorKind,
    pub message: String,
    pub data: Option<Value>,
    pub errors: Option<Value>,
    pub source: Option<AnyError>,
}

impl DeckError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            data: None,
            errors: None,
            source: None,
        }
    }

    pub fn with_errors(mut self, errors: Value) -> Self {
        self.errors = Some(errors);
        self
    }

    pub fn with_source(mut self, source: AnyError) -> Self {
        self.source = Some(source);
        self
    }

    /// Attach a reason code under `data.reason`, merging with existing data.
    pub fn with_reason(mut self, reason: &str) -> Self {
        self.set_data_field("reason", Value::String(reason.to_string()));
        self
    }

    /// Attach one extra `data` field (e.g. `deck`, `limit`).
    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.set_data_field(key, value.into());
        self
    }

    fn set_data_field(&mut self, key: &str, value: Value) {
        let data = self.data.get_or_insert_with(|| json!({}));
        if let Some(map) = data.as_object_mut() {
            map.insert(key.to_string(), value);
        }
    }

    /// Reason code from `data.reason`, if any.
    pub fn reason(&self) -> Option<&str> {
        self.data
            .as_ref()
            .and_then(|d| d.get("reason"))
            .and_then(|r| r.as_str())
    }

    pub fn code(&self) -> u16 {
        self.kind.status_code()
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn class_name(&self) -> &'static str {
        self.kind.class_name()
    }

    /// Convert into `anyhow::Error`.
    pub fn into_anyhow(self) -> AnyError {
        AnyError::new(self)
    }

    /// Downcast an `anyhow::Error` to a `DeckError` if possible.
    pub fn from_anyhow(err: &AnyError) -> Option<&DeckError> {
        err.downcast_ref::<DeckError>()
    }

    /// A “safe” version suitable for returning to clients:
    /// keeps kind/message/data/errors, drops the inner `source`.
    pub fn sanitize_for_client(&self) -> DeckError {
        DeckError {
            kind: self.kind,
            message: self.message.clone(),
            data: self.data.clone(),
            errors: self.errors.clone(),
            source: None,
        }
    }

    /// Feathers-ish JSON payload.
    pub fn to_json(&self) -> Value {
        let mut base = json!({
            "name": self.name(),
            "message": self.message,
            "code": self.code(),
            "className": self.class_name(),
        });

        if let Some(d) = &self.data {
            base["data"] = d.clone();
        }
        if let Some(e) = &self.errors {
            base["errors"] = e.clone();
        }
        base
    }

    // ---- Constructors ----

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, msg)
    }
    pub fn not_authenticated(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotAuthenticated, msg)
    }
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, msg)
    }
    pub fn payload_too_large(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::PayloadTooLarge, msg)
    }
    pub fn general_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::GeneralError, msg)
    }
    pub fn bad_gateway(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadGateway, msg)
    }
}

impl fmt::Display for DeckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.name(), self.code(), self.message)
    }
}

impl std::error::Error for DeckError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Convenience helper for “bail with DeckError + reason code”.
#[macro_export]
macro_rules! bail_deck {
    ($ctor:ident, $reason:expr, $msg:expr) => {
        return Err($crate::errors::DeckError::$ctor($msg)
            .with_reason($reason)
            .into_anyhow());
    };
    ($ctor:ident, $reason:expr, $fmt:expr, $($arg:tt)*) => {
        return Err($crate::errors::DeckError::$ctor(format!($fmt, $($arg)*))
            .with_reason($reason)
            .into_anyhow());
    };
}
