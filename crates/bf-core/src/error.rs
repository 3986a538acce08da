//! Unified error type for bookforge.
//!
//! All crates funnel their failures into [`Error`], which carries enough context
//! for the HTTP layer to derive a status code via [`Error::http_status`] and a
//! stable machine-readable kind via [`Error::code`].

/// Unified error type covering all failure modes of an audiobook job.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Request data failed validation (missing fields, mismatched counts).
    #[error("Validation error: {0}")]
    Validation(String),

    /// A chapter file could not be read or measured.
    ///
    /// `chapter` is the chapter's original display name, never an engine path.
    #[error("Failed to probe chapter file: {chapter}. {message}")]
    Probe {
        /// Original file name of the offending chapter.
        chapter: String,
        /// Human-readable error description.
        message: String,
    },

    /// The encoding engine ran but did not produce an output.
    #[error("Encode error: {message}")]
    Encode {
        /// Human-readable error description.
        message: String,
        /// Captured engine diagnostics with host paths redacted.
        diagnostics: Option<String>,
    },

    /// The output stream broke after the response had already started.
    #[error("Delivery error: {0}")]
    Delivery(String),

    /// An external tool (ffmpeg, ffprobe) is missing or could not be run.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::Validation(_) => 400,
            Error::Probe { .. } => 422,
            Error::Encode { .. } => 500,
            Error::Delivery(_) => 500,
            Error::Tool { .. } => 502,
            Error::Io { .. } => 500,
            Error::Internal(_) => 500,
        }
    }

    /// Stable identifier for the error kind, used in API payloads.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation_error",
            Error::Probe { .. } => "probe_error",
            Error::Encode { .. } => "encode_error",
            Error::Delivery(_) => "delivery_error",
            Error::Tool { .. } => "tool_error",
            Error::Io { .. } => "io_error",
            Error::Internal(_) => "internal_error",
        }
    }

    /// Optional diagnostic detail that accompanies the message.
    pub fn details(&self) -> Option<&str> {
        match self {
            Error::Encode { diagnostics, .. } => diagnostics.as_deref(),
            _ => None,
        }
    }

    /// Convenience constructor for [`Error::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    /// Convenience constructor for [`Error::Probe`].
    pub fn probe(chapter: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Probe {
            chapter: chapter.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Encode`].
    pub fn encode(message: impl Into<String>, diagnostics: Option<String>) -> Self {
        Error::Encode {
            message: message.into(),
            diagnostics,
        }
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
