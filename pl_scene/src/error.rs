//! Error types for the PixelLight scene pipeline
//!
//! Culling and draw dispatch never fail: absent state there is expressed
//! with `Option`. Errors surface from configuration and resource loading,
//! from scene-graph mutation with stale keys, and from renderer backends.

use std::fmt;

/// Result type for scene pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Scene pipeline errors
#[derive(Debug, Clone)]
pub enum Error {
    /// Backend-specific error (raised by a `Renderer` implementation)
    BackendError(String),

    /// Invalid resource (malformed scene renderer, unusable pass description, etc.)
    InvalidResource(String),

    /// Initialization failed (engine, subsystems)
    InitializationFailed(String),

    /// Configuration value out of range or inconsistent
    InvalidConfiguration(String),

    /// Named resource (scene renderer file, pass class) could not be found
    ResourceNotFound(String),

    /// Text could not be parsed (RON definitions, configuration files)
    ParseError(String),

    /// Scene node key is stale or refers to a node of the wrong kind
    InvalidSceneNode(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::InvalidConfiguration(msg) => write!(f, "Invalid configuration: {}", msg),
            Error::ResourceNotFound(msg) => write!(f, "Resource not found: {}", msg),
            Error::ParseError(msg) => write!(f, "Parse error: {}", msg),
            Error::InvalidSceneNode(msg) => write!(f, "Invalid scene node: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

// ===== ERROR MACROS =====

/// Log an ERROR and build an `Error` value
///
/// Without an explicit variant the error is a `BackendError`.
///
/// # Example
///
/// ```no_run
/// # use pl_scene::pl_err;
/// # let name = "scene.ron";
/// let err = pl_err!("plscene::Loader", ParseError, "bad file '{}'", name);
/// ```
#[macro_export]
macro_rules! pl_err {
    ($source:expr, $variant:ident, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::pl_error!($source, "{}", message);
        $crate::plscene::Error::$variant(message)
    }};
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::pl_error!($source, "{}", message);
        $crate::plscene::Error::BackendError(message)
    }};
}

/// Log an ERROR and return early with the matching `Error`
///
/// Accepts the same forms as `pl_err!`.
#[macro_export]
macro_rules! pl_bail {
    ($($arg:tt)*) => {
        return Err($crate::pl_err!($($arg)*))
    };
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
