use miette::Diagnostic;
use thiserror::Error;

/// Unified error type for all pandeps operations.
#[derive(Debug, Error, Diagnostic)]
pub enum PandepsError {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or unreadable configuration (e.g. pandeps.toml).
    #[error("Configuration error: {message}")]
    #[diagnostic(help("Check pandeps.toml and the command-line flags"))]
    Config { message: String },

    /// The requirements file is missing or unreadable.
    #[error("Requirements error: {message}")]
    #[diagnostic(help("Pass module names on the command line or create a cpanfile"))]
    Requirements { message: String },

    /// One or more dependencies could not be resolved.
    #[error("Dependency resolution failed: {message}")]
    Resolution { message: String },

    /// Network request or index download failed.
    #[error("Network error: {message}")]
    Network { message: String },

    /// Downloading or extracting a module archive failed.
    #[error("Fetch failed: {message}")]
    Fetch { message: String },

    /// One or more modules failed to install.
    #[error("Installation failed: {message}")]
    Install { message: String },

    /// Catch-all for miscellaneous errors.
    #[error("{message}")]
    Generic { message: String },
}

/// Convenience alias for `miette::Result<T>`.
pub type PandepsResult<T> = miette::Result<T>;
