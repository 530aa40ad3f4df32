use thiserror::Error;

#[derive(Error, Debug)]
pub enum GlossaryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error(
        "Invalid glossary term hierarchy: {} term(s) have a parent that is missing or cyclic: {}",
        .unresolved.len(),
        .unresolved.join(", ")
    )]
    InvalidHierarchy { unresolved: Vec<String> },

    #[error("Duplicate term identifier: {0}")]
    DuplicateIdentifier(String),

    #[error("Invalid stakeholder: {0}")]
    InvalidStakeholder(String),

    #[error("Location map error at line {line}: {reason}")]
    LocationMap { line: usize, reason: String },

    #[error("Remote service error: {0}")]
    Service(#[from] ServiceError),
}

/// Failures raised by a [`crate::RemoteTermService`] implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Response did not carry a term location")]
    MissingLocation,

    #[error("Exceeded {0} redirects")]
    TooManyRedirects(usize),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Term not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, GlossaryError>;
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;
