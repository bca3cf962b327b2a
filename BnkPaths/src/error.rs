//! Error types for `BnkPaths`

use std::path::PathBuf;

use thiserror::Error;

/// The error type for `BnkPaths` operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    // ==================== IO Errors ====================
    /// IO error from file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ==================== Dump Parsing Errors ====================
    /// XML parsing error.
    #[error("XML parse error: {0}")]
    XmlError(#[from] quick_xml::Error),

    /// XML attribute error.
    #[error("XML attribute error: {0}")]
    XmlAttrError(String),

    /// The dump has a closing tag without its opening tag, or ends mid-element.
    #[error("malformed bank dump {path}: {reason}")]
    MalformedDump {
        /// The dump file path.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// A dump file contains no `root` element.
    #[error("no banks found in dump: {0}")]
    EmptyDump(PathBuf),

    /// JSON parsing or serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    // ==================== Object Model Errors ====================
    /// A query that must match at most once matched several nodes.
    #[error("more than one '{query}' found under '{parent}'")]
    AmbiguousField {
        /// The searched name or type.
        query: String,
        /// The node the search started from.
        parent: String,
    },

    // ==================== Builder/Render Errors ====================
    /// A HIRC object lacks data the format guarantees, aborting its entry.
    #[error("{kind} {id}: {message}")]
    HardFailure {
        /// Short id of the owning object.
        id: u32,
        /// HIRC class name.
        kind: String,
        /// What is missing or malformed.
        message: String,
    },

    /// Music clip or transition timings that can't be expressed.
    #[error("invalid playlist timings: {0}")]
    InvalidTimings(String),

    /// Groups opened and closed out of order while rendering.
    #[error("unbalanced playlist tree: {0}")]
    UnbalancedTree(String),

    // ==================== Configuration Errors ====================
    /// No input bank could be loaded.
    #[error("no valid banks loaded")]
    NoBanks,

    /// Invalid output directory.
    #[error("invalid output directory: {0}")]
    InvalidOutDir(PathBuf),

    /// Directory traversal error.
    #[error("directory walk error: {0}")]
    WalkDirError(String),
}

impl Error {
    /// Builds a [`Error::HardFailure`] for a HIRC object.
    pub fn hard(id: u32, kind: &str, message: impl Into<String>) -> Self {
        Error::HardFailure {
            id,
            kind: kind.to_string(),
            message: message.into(),
        }
    }
}

// Add conversion from quick_xml::events::attributes::AttrError
impl From<quick_xml::events::attributes::AttrError> for Error {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Error::XmlAttrError(err.to_string())
    }
}

// Add conversion from walkdir::Error
impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Self {
        Error::WalkDirError(err.to_string())
    }
}

/// A specialized Result type for `BnkPaths` operations.
pub type Result<T> = std::result::Result<T, Error>;
