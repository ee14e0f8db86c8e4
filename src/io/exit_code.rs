//! Exit codes for CLI operations following Unix conventions.
//!
//! # Exit Code Semantics
//!
//! - `0`: Success
//! - `1`: General error - unspecified failure
//! - `2`: Blocking error - the index and its embeddings disagree; rebuild
//! - `3-125`: Specific recoverable errors
//! - `130`: Cancelled, as after SIGINT

use crate::error::{ErrorCategory, IndexError};
use crate::storage::StorageError;

/// Standard exit codes for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Operation succeeded (code 0)
    Success = 0,

    /// Unspecified error occurred (code 1)
    GeneralError = 1,

    /// Vector/metadata alignment is broken (code 2)
    BlockingError = 2,

    /// No index has been built at the configured path (code 3)
    NotFound = 3,

    /// File I/O error (code 5)
    IoError = 5,

    /// Configuration or corpus error (code 6)
    ConfigError = 6,

    /// Index corruption detected (code 7)
    IndexCorrupted = 7,

    /// Embedding provider kept failing (code 9)
    ProviderError = 9,

    /// Build abandoned by the caller (code 130)
    Cancelled = 130,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

impl ExitCode {
    /// Convert an `IndexError` to the appropriate exit code.
    pub fn from_error(error: &IndexError) -> Self {
        if let IndexError::Storage(StorageError::NotFound { .. }) = error {
            return ExitCode::NotFound;
        }
        match error.category() {
            ErrorCategory::Configuration => ExitCode::ConfigError,
            ErrorCategory::Provider => ExitCode::ProviderError,
            ErrorCategory::Alignment => ExitCode::BlockingError,
            ErrorCategory::Corruption => ExitCode::IndexCorrupted,
            ErrorCategory::Io => ExitCode::IoError,
            ErrorCategory::Cancelled => ExitCode::Cancelled,
        }
    }

    /// Blocking errors should halt automation pipelines.
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        matches!(self, ExitCode::BlockingError)
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, ExitCode::Success)
    }

    /// Get a human-readable description of the exit code.
    pub fn description(&self) -> &str {
        match self {
            ExitCode::Success => "Success",
            ExitCode::GeneralError => "General error",
            ExitCode::BlockingError => "Blocking error - index must be rebuilt",
            ExitCode::NotFound => "Index not found",
            ExitCode::IoError => "I/O error",
            ExitCode::ConfigError => "Configuration error",
            ExitCode::IndexCorrupted => "Index corrupted",
            ExitCode::ProviderError => "Embedding provider error",
            ExitCode::Cancelled => "Cancelled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::ProviderError;
    use std::path::PathBuf;

    #[test]
    fn test_exit_code_values() {
        assert_eq!(ExitCode::Success as u8, 0);
        assert_eq!(ExitCode::BlockingError as u8, 2);
        assert_eq!(ExitCode::ConfigError as u8, 6);
        assert_eq!(ExitCode::Cancelled as u8, 130);
    }

    #[test]
    fn test_from_error_follows_category() {
        let missing = IndexError::from(StorageError::NotFound {
            path: PathBuf::from(".insight/index"),
        });
        assert_eq!(ExitCode::from_error(&missing), ExitCode::NotFound);

        let corrupted = IndexError::from(StorageError::Corrupted {
            path: PathBuf::from("vectors.1.bin"),
            reason: "checksum mismatch".to_string(),
        });
        assert_eq!(ExitCode::from_error(&corrupted), ExitCode::IndexCorrupted);

        let provider = IndexError::Provider {
            batch: 3,
            attempts: 4,
            source: ProviderError::Disconnected,
        };
        assert_eq!(ExitCode::from_error(&provider), ExitCode::ProviderError);

        let misaligned = IndexError::Misaligned {
            vectors: 1,
            records: 2,
        };
        assert!(ExitCode::from_error(&misaligned).is_blocking());
    }

    #[test]
    fn test_is_success() {
        assert!(ExitCode::Success.is_success());
        assert!(!ExitCode::NotFound.is_success());
        assert!(!ExitCode::GeneralError.is_success());
    }
}
