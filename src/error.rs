//! Structured error handling and exit codes.

use serde::Serialize;

/// Exit codes for photosync.
///
/// - 0: Success
/// - 1: General error (configuration, unexpected failure)
/// - 3: Partial success (run finished, some files could not be indexed or transferred)
/// - 130: Interrupted by user (Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Run completed without errors.
    Success = 0,
    /// An unexpected or configuration error occurred.
    GeneralError = 1,
    /// Run completed but some files were skipped because of errors.
    PartialSuccess = 3,
    /// Run was interrupted (Ctrl+C).
    Interrupted = 130,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "PS000",
            Self::GeneralError => "PS001",
            Self::PartialSuccess => "PS003",
            Self::Interrupted => "PS130",
        }
    }

    /// Exit code for a finished run.
    #[must_use]
    pub fn for_outcome(interrupted: bool, has_errors: bool) -> Self {
        if interrupted {
            Self::Interrupted
        } else if has_errors {
            Self::PartialSuccess
        } else {
            Self::Success
        }
    }
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "PS001")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message, including its causes
    pub message: String,
    /// Whether the operation was interrupted
    pub interrupted: bool,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{err:#}"),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}
