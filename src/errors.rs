//! gNMI Target Error Hierarchy
//!
//! Defines the error types of the target, categorized by subsystem. RPC
//! handlers translate conditions into `tonic::Status` codes at the service
//! boundary; these types cover everything below that boundary.

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration loading and validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Malformed gNMI path strings
    #[error(transparent)]
    Path(#[from] PathError),

    /// Schema validation failures
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// gRPC transport layer errors
    #[error(transparent)]
    Transport(#[from] Box<tonic::transport::Error>),

    /// Startup-config file I/O failures
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The device-apply callback rejected a configuration
    #[error("config callback failed: {0}")]
    Callback(String),

    /// Shutdown signal endpoint closed
    #[error("{0}")]
    SignalSenderClosed(String),
}

/// Errors produced by the xpath parser. Messages name the offending
/// fragment so a caller can fix the request.
#[derive(Debug, thiserror::Error)]
pub enum PathError {
    /// A `[` opened a list-key region that never closed.
    #[error("missing ] in path string: {path}")]
    MissingCloseBracket { path: String },

    /// An element name is not a valid YANG identifier (RFC 6020 §6.2).
    #[error("invalid node name: {name:?}")]
    InvalidNodeName { name: String },

    /// A list name before `[...]` is not a valid YANG identifier.
    #[error("invalid List name: {name:?}, in: {elem}")]
    InvalidListName { name: String, elem: String },

    /// A `[k=v]` segment does not follow the key-value pattern.
    #[error("malformed List key-value pair string: {pair}, in: {elem}")]
    MalformedKeyValue { pair: String, elem: String },
}

/// Errors produced while validating a JSON tree against the schema.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("unknown schema node: {path}")]
    UnknownNode { path: String },

    #[error("{path}: expected a {expected} value")]
    TypeMismatch { path: String, expected: &'static str },

    #[error("{path}: list entry is missing key leaf {key:?}")]
    MissingListKey { path: String, key: &'static str },

    #[error("{path}: duplicate list entry key")]
    DuplicateListEntry { path: String },

    #[error("{path}: {value:?} is not a valid enumeration value")]
    InvalidEnumValue { path: String, value: String },

    /// JSON marshal/unmarshal failures
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

// ============== Conversion Implementations ============== //
impl From<tonic::transport::Error> for Error {
    fn from(err: tonic::transport::Error) -> Self {
        Error::Transport(Box::new(err))
    }
}
