//! Error taxonomy for the radio runtime
//!
//! Every failure the core can surface is one of a closed set of kinds, so
//! callers can match on the condition rather than parse message strings.
//! `Interrupted` is special: it is the cooperative-cancellation signal used
//! to unwind blocked threads during shutdown and is never treated as a
//! failure by the engines.

use std::path::PathBuf;
use thiserror::Error;

/// Result type used throughout the skywave library
pub type Result<T> = std::result::Result<T, RadioError>;

/// The closed set of errors surfaced by the radio runtime
#[derive(Debug, Error)]
pub enum RadioError {
    /// A component, engine, controller or file referenced by the radio
    /// description could not be located
    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    /// A shared-library path does not exist on disk
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    /// The OS-level library loader rejected the file
    #[error("failed to load library: {0}")]
    LibraryLoad(String),

    /// A required plug-in symbol is missing from a library
    #[error("library symbol not found: {0}")]
    LibrarySymbol(String),

    /// A plug-in library was built against a different host API version
    #[error("API version mismatch: host is {host}, library is {library}")]
    ApiVersionMismatch { host: String, library: String },

    /// A parameter name is not registered on the target component
    #[error("parameter not found: {0}")]
    ParameterNotFound(String),

    /// A parameter value violates its interval or allow-list constraint
    #[error("parameter out of range: {0}")]
    ParameterOutOfRange(String),

    /// A type-id mismatch on a buffer connection, parameter access or event
    /// activation
    #[error("invalid data type: {0}")]
    InvalidDataType(String),

    /// The radio description XML is malformed or contains an illegal element
    #[error("XML parsing failed: {0}")]
    XmlParsing(String),

    /// A link references a missing component, or an engine policy is violated
    #[error("graph structure error: {0}")]
    GraphStructure(String),

    /// A data set was acquired twice without an intervening release
    #[error("data buffer release error: {0}")]
    DataBufferRelease(String),

    /// An aligned allocation failed
    #[error("out of memory: {0}")]
    OutOfMemory(String),

    /// A component activated an event it never registered
    #[error("event not found: {0}")]
    EventNotFound(String),

    /// A blocking wait was interrupted by engine shutdown. Handlers catch
    /// this and exit their loops cleanly.
    #[error("wait interrupted")]
    Interrupted,
}

impl RadioError {
    /// True if this error is the cooperative-cancellation signal rather
    /// than a real failure
    pub fn is_interrupted(&self) -> bool {
        matches!(self, RadioError::Interrupted)
    }
}
