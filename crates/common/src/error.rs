//! Error taxonomy shared across crates.

use std::fmt;

use thiserror::Error;

use crate::protocol::ErrorCode;

/// Which facade operation failed. Used only to phrase the generic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Encrypt,
    Decrypt,
    Calibrate,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Encrypt => "encryption",
            Operation::Decrypt => "decryption",
            Operation::Calibrate => "calibration",
        })
    }
}

/// Input rejected before any work is dispatched. User-correctable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is empty or whitespace only.
    #[error("{0} must not be empty")]
    Empty(&'static str),

    /// A field exceeds its size limit.
    #[error("{field} is {len} long; the limit is {max}")]
    TooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },
}

/// Top-level error returned by the orchestration facade.
///
/// Failures deliberately carry no detail beyond the opaque [`ErrorCode`], so
/// callers cannot tell a wrong secret from a damaged ciphertext or header.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Rejected before dispatch.
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),

    /// The worker reported a failure, timed out, or was unreachable.
    #[error("{op} failed")]
    Failed { op: Operation, code: ErrorCode },
}

impl ServiceError {
    /// The opaque failure code, if the operation reached the worker stage.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            ServiceError::Validation(_) => None,
            ServiceError::Failed { code, .. } => Some(*code),
        }
    }

    /// Process exit status the CLI uses for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            ServiceError::Validation(_) => 2,
            ServiceError::Failed { .. } => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        assert_eq!(
            ServiceError::Validation(ValidationError::Empty("plaintext")).exit_code(),
            2
        );
        let failed = ServiceError::Failed {
            op: Operation::Decrypt,
            code: ErrorCode::WorkerTimeout,
        };
        assert_eq!(failed.exit_code(), 1);
        assert_eq!(failed.code(), Some(ErrorCode::WorkerTimeout));
    }

    #[test]
    fn failure_display_is_generic() {
        for code in [
            ErrorCode::DecryptFailed,
            ErrorCode::InternalError,
            ErrorCode::WorkerTimeout,
        ] {
            let e = ServiceError::Failed {
                op: Operation::Decrypt,
                code,
            };
            assert_eq!(e.to_string(), "decryption failed");
        }
    }

    #[test]
    fn validation_display_includes_field() {
        let e = ServiceError::from(ValidationError::Empty("secret A"));
        assert!(e.to_string().contains("secret A must not be empty"));
    }

    #[test]
    fn too_long_names_the_field() {
        let e = ValidationError::TooLong {
            field: "envelope",
            len: 10,
            max: 5,
        };
        assert_eq!(e.to_string(), "envelope is 10 long; the limit is 5");
    }
}
