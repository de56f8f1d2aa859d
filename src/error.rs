use thiserror::Error;

use crate::codegen::error::ClassGenerationError;
use crate::verify::VerifyError;

/// Result type for recswitch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Failures that stop a compilation unit outright.
///
/// Problems in the user's program are not errors in this sense: they are
/// reported as [`crate::diagnostics::Diagnostic`]s and compilation of the unit
/// continues. This enum covers I/O, bad configuration and internal
/// inconsistencies found by code generation or verification.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Code generation error: {0}")]
    CodeGen(#[from] ClassGenerationError),

    #[error("Verification failed for {class}: {source}")]
    Verify {
        class: String,
        #[source]
        source: VerifyError,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl Error {
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }
}
