//! Typed errors over gRPC
//!
//! The agent tags every failing status with an `x-kmctl-error` metadata
//! entry so the client can rebuild the error category without parsing the
//! message text. Ledger failures are tagged by the upgrade handler, which
//! knows the manifest was already applied.

use crate::backend::BackendError;
use crate::manifest::ManifestError;
use crate::models::ValidationError;
use crate::proto::ERROR_KIND_KEY;
use tonic::metadata::{MetadataMap, MetadataValue};
use tonic::{Code, Status};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Classification,
    Decode,
    Validation,
    Backend,
    Ledger,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not-found",
            ErrorKind::Classification => "classification",
            ErrorKind::Decode => "decode",
            ErrorKind::Validation => "validation",
            ErrorKind::Backend => "backend",
            ErrorKind::Ledger => "ledger",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "not-found" => Some(ErrorKind::NotFound),
            "classification" => Some(ErrorKind::Classification),
            "decode" => Some(ErrorKind::Decode),
            "validation" => Some(ErrorKind::Validation),
            "backend" => Some(ErrorKind::Backend),
            "ledger" => Some(ErrorKind::Ledger),
            _ => None,
        }
    }

    /// Kind carried by a status received from an agent
    pub fn of(status: &Status) -> Option<Self> {
        status
            .metadata()
            .get(ERROR_KIND_KEY)
            .and_then(|value| value.to_str().ok())
            .and_then(Self::parse)
    }
}

pub fn tagged(code: Code, kind: ErrorKind, message: impl Into<String>) -> Status {
    let mut metadata = MetadataMap::new();
    metadata.insert(ERROR_KIND_KEY, MetadataValue::from_static(kind.as_str()));
    Status::with_metadata(code, message, metadata)
}

/// Status for a failed read. A missing object is `not-found`.
pub fn from_lookup_error(err: &BackendError) -> Status {
    match err {
        BackendError::NotFound { .. } => {
            tagged(Code::NotFound, ErrorKind::NotFound, err.to_string())
        }
        other => from_backend_error(other),
    }
}

/// Status for a failed write; the object's absence stays a backend error.
pub fn from_backend_error(err: &BackendError) -> Status {
    let code = match err {
        BackendError::NotFound { .. } => Code::NotFound,
        BackendError::Conflict(_) => Code::AlreadyExists,
        BackendError::Api { .. } | BackendError::Client(_) => Code::Internal,
    };
    tagged(code, ErrorKind::Backend, err.to_string())
}

pub fn from_manifest_error(err: &ManifestError) -> Status {
    match err {
        ManifestError::Classification(_) | ManifestError::UnsupportedKind(_) => {
            tagged(Code::InvalidArgument, ErrorKind::Classification, err.to_string())
        }
        ManifestError::Decode { .. } | ManifestError::MissingName { .. } => {
            tagged(Code::InvalidArgument, ErrorKind::Decode, err.to_string())
        }
        ManifestError::Backend(backend) => from_backend_error(backend),
    }
}

pub fn from_validation_error(err: &ValidationError) -> Status {
    tagged(Code::InvalidArgument, ErrorKind::Validation, err.to_string())
}
