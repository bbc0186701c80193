// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Error type shared by the OCI client, the reconcilers and the FlexVolume driver,
//! together with the classification rules the callers rely on to decide between
//! retrying, treating a resource as gone, or giving up.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use crate::config::FieldErrors;

pub const HTTP400_RELATED_RESOURCE_NOT_AUTHORIZED_OR_NOT_FOUND: &str =
    "RelatedResourceNotAuthorizedOrNotFound";
pub const HTTP401_NOT_AUTHENTICATED: &str = "NotAuthenticated";
pub const HTTP404_NOT_AUTHORIZED_OR_NOT_FOUND: &str = "NotAuthorizedOrNotFound";
pub const HTTP409_INCORRECT_STATE: &str = "IncorrectState";
pub const HTTP409_NOT_AUTHORIZED_OR_RESOURCE_ALREADY_EXISTS: &str =
    "NotAuthorizedOrResourceAlreadyExists";
pub const HTTP429_TOO_MANY_REQUESTS: &str = "TooManyRequests";
pub const HTTP500_INTERNAL_SERVER_ERROR: &str = "InternalServerError";

/// Status/code pairs that are worth another attempt.
const RETRYABLE_ERRORS: &[(u16, &str)] = &[
    (400, HTTP400_RELATED_RESOURCE_NOT_AUTHORIZED_OR_NOT_FOUND),
    (401, HTTP401_NOT_AUTHENTICATED),
    (404, HTTP404_NOT_AUTHORIZED_OR_NOT_FOUND),
    (409, HTTP409_INCORRECT_STATE),
    (409, HTTP409_NOT_AUTHORIZED_OR_RESOURCE_ALREADY_EXISTS),
    (429, HTTP429_TOO_MANY_REQUESTS),
    (500, HTTP500_INTERNAL_SERVER_ERROR),
];

/// An error returned by an OCI service endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceError {
    pub status_code: u16,
    pub code: String,
    pub message: String,
    pub opc_request_id: Option<String>,
}

impl ServiceError {
    pub fn new(status_code: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status_code,
            code: code.into(),
            message: message.into(),
            opc_request_id: None,
        }
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.opc_request_id = Some(id.into());
        self
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Service error:{}. {}. http status code: {}. Opc request id: {}",
            self.code,
            self.message,
            self.status_code,
            self.opc_request_id.as_deref().unwrap_or("")
        )
    }
}

impl std::error::Error for ServiceError {}

fn access_kind(is_write: &bool) -> &'static str {
    if *is_write {
        "write"
    } else {
        "read"
    }
}

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum OciError {
    #[error("not found")]
    NotFound,

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("rate limited({}) for operation: {operation}", access_kind(.is_write))]
    RateLimited { is_write: bool, operation: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(FieldErrors),

    #[error("{0}")]
    InvalidState(String),

    #[error("{0}")]
    AmbiguousResult(String),

    #[error("WorkRequest {id:?} failed: {message}")]
    WorkRequestFailed { id: String, message: String },

    #[error("no free device path available for instance {0:?}")]
    NoFreeDevicePath(String),

    #[error("context deadline exceeded")]
    DeadlineExceeded,

    #[error("{context}: {source}")]
    Context {
        context: String,
        source: Box<OciError>,
    },

    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("{0}")]
    Fatal(String),
}

pub type Result<T> = std::result::Result<T, OciError>;

impl OciError {
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn ambiguous(msg: impl Into<String>) -> Self {
        Self::AmbiguousResult(msg.into())
    }

    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::Fatal(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Wrap this error with a human readable prefix, keeping it classifiable.
    pub fn wrap(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error once all context layers are peeled off.
    pub fn root(&self) -> &OciError {
        let mut err = self;
        while let OciError::Context { source, .. } = err {
            err = source;
        }
        err
    }

    pub fn service_error(&self) -> Option<&ServiceError> {
        match self.root() {
            OciError::Service(e) => Some(e),
            _ => None,
        }
    }

    pub fn opc_request_id(&self) -> Option<&str> {
        self.service_error()
            .and_then(|e| e.opc_request_id.as_deref())
    }

    pub fn is_not_found(&self) -> bool {
        match self.root() {
            OciError::NotFound => true,
            OciError::Service(e) => e.status_code == 404,
            OciError::Kube(kube::Error::Api(resp)) => resp.code == 404,
            _ => false,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self.root() {
            OciError::DeadlineExceeded => true,
            OciError::Service(e) => RETRYABLE_ERRORS
                .iter()
                .any(|(status, code)| e.status_code == *status && e.code == *code),
            _ => false,
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.service_error().is_some_and(|e| e.status_code == 409)
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self.root(), OciError::RateLimited { .. })
    }
}

/// Reports whether the error, after unwrapping, denotes a missing resource.
pub fn is_not_found(err: &OciError) -> bool {
    err.is_not_found()
}

/// Reports whether the error is transient and the operation may be re-issued.
pub fn is_retryable(err: &OciError) -> bool {
    err.is_retryable()
}

pub fn is_conflict(err: &OciError) -> bool {
    err.is_conflict()
}

/// The error returned when a rate limiter bucket denies a call.
pub fn rate_limit_error(is_write: bool, operation: &str) -> OciError {
    OciError::RateLimited {
        is_write,
        operation: operation.to_string(),
    }
}

fn system_tag_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(".*tag namespace.*orcl-containerengine.*").ok())
        .as_ref()
}

/// True when OCI rejected a request because the OKE system tag namespace is
/// missing or not authorised for this tenancy.
pub fn is_system_tag_not_found_or_not_authorised(err: &OciError) -> bool {
    match err.service_error() {
        Some(e)
            if e.status_code == 400
                && e.code == HTTP400_RELATED_RESOURCE_NOT_AUTHORIZED_OR_NOT_FOUND =>
        {
            tracing::debug!("API error code: {}, message: {}", e.code, e.message);
            system_tag_pattern().is_some_and(|re| re.is_match(&e.message))
        }
        _ => false,
    }
}

impl From<serde_json::Error> for OciError {
    fn from(e: serde_json::Error) -> Self {
        OciError::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for OciError {
    fn from(e: serde_yaml::Error) -> Self {
        OciError::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for OciError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            OciError::DeadlineExceeded
        } else {
            OciError::Transport(e.to_string())
        }
    }
}

impl From<tokio::time::error::Elapsed> for OciError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        OciError::DeadlineExceeded
    }
}

/// Adds a context prefix to any error convertible into [`OciError`].
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> Result<T>;

    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<OciError>,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().wrap(context))
    }

    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| e.into().wrap(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_service_error(status: u16, code: &str) -> OciError {
        OciError::Service(ServiceError::new(status, code, "boom"))
    }

    #[test]
    fn test_not_found_through_wrapping() {
        let err = OciError::NotFound.wrap("inner").wrap("outer");
        assert!(is_not_found(&err));
        assert_eq!(err.to_string(), "outer: inner: not found");
    }

    #[test]
    fn test_not_found_for_service_404() {
        assert!(is_not_found(&make_service_error(404, "Whatever")));
        assert!(is_not_found(
            &make_service_error(404, HTTP404_NOT_AUTHORIZED_OR_NOT_FOUND).wrap("get instance")
        ));
    }

    #[test]
    fn test_not_found_false_for_500_and_success() {
        assert!(!is_not_found(&make_service_error(500, HTTP500_INTERNAL_SERVER_ERROR)));
        let ok: Result<()> = Ok(());
        assert!(!ok.as_ref().err().is_some_and(is_not_found));
    }

    #[test]
    fn test_retryable_table() {
        for (status, code) in RETRYABLE_ERRORS {
            assert!(
                is_retryable(&make_service_error(*status, code)),
                "{} {} should be retryable",
                status,
                code
            );
        }
        assert!(!is_retryable(&make_service_error(409, "Conflict")));
        assert!(!is_retryable(&make_service_error(404, "NotFound")));
        assert!(!is_retryable(&make_service_error(502, HTTP500_INTERNAL_SERVER_ERROR)));
        assert!(!is_retryable(&OciError::NotFound));
    }

    #[test]
    fn test_deadline_is_retryable() {
        assert!(is_retryable(&OciError::DeadlineExceeded.wrap("GetWorkRequest")));
    }

    #[test]
    fn test_rate_limit_message() {
        assert_eq!(
            rate_limit_error(false, "GetInstance").to_string(),
            "rate limited(read) for operation: GetInstance"
        );
        assert_eq!(
            rate_limit_error(true, "CreateListener").to_string(),
            "rate limited(write) for operation: CreateListener"
        );
        assert!(!is_retryable(&rate_limit_error(true, "x")));
    }

    #[test]
    fn test_conflict() {
        assert!(is_conflict(&make_service_error(409, "Conflict").wrap("attach")));
        assert!(!is_conflict(&make_service_error(400, "Conflict")));
    }

    #[test]
    fn test_system_tag_error() {
        let err = OciError::Service(ServiceError::new(
            400,
            HTTP400_RELATED_RESOURCE_NOT_AUTHORIZED_OR_NOT_FOUND,
            "The following tag namespace / key are not authorized or not found: 'orcl-containerengine'",
        ));
        assert!(is_system_tag_not_found_or_not_authorised(&err));

        let other = OciError::Service(ServiceError::new(
            400,
            HTTP400_RELATED_RESOURCE_NOT_AUTHORIZED_OR_NOT_FOUND,
            "subnet not found",
        ));
        assert!(!is_system_tag_not_found_or_not_authorised(&other));
    }

    #[test]
    fn test_work_request_failed_message() {
        let err = OciError::WorkRequestFailed {
            id: "ocid1.wr".to_string(),
            message: "M".to_string(),
        };
        assert_eq!(err.to_string(), "WorkRequest \"ocid1.wr\" failed: M");
    }

    #[test]
    fn test_opc_request_id_survives_wrapping() {
        let err = OciError::Service(ServiceError::new(500, "x", "y").with_request_id("req-1"))
            .wrap("list");
        assert_eq!(err.opc_request_id(), Some("req-1"));
    }
}
