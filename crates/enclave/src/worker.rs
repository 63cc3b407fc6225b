//! [`Worker`]: executes channel commands inside the isolated context.
//!
//! # Security invariants
//!
//! - Secret text is converted to [`SecretBytes`] on arrival and wiped when
//!   the command finishes, whether it succeeded, failed or panicked.
//! - Every decrypt failure becomes [`ErrorCode::DecryptFailed`]; every other
//!   failure becomes [`ErrorCode::InternalError`]. Error detail, secrets,
//!   plaintext and AAD are never logged or returned.

use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use common::protocol::{Command, Request, Response};
use common::ErrorCode;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::crypto::{calibrate::calibrate, open_payload, seal_payload};
use crate::secret::SecretBytes;

/// Stateless command executor. Cheap to clone; all per-call state (salts,
/// IVs, keys) is local to the call.
#[derive(Debug, Clone, Default)]
pub struct Worker;

impl Worker {
    pub fn new() -> Self {
        Self
    }

    /// Run one request to completion and produce its correlated response.
    pub fn handle(&self, request: Request) -> Response {
        let Request { id, command } = request;
        let cmd = command.name();
        let started = Instant::now();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| execute(command)));
        let response = match outcome {
            Ok(Ok(result)) => Response::success(id, result),
            Ok(Err(code)) => Response::failure(id, code),
            Err(_) => {
                error!(id, cmd, "worker panicked while handling request");
                Response::failure(id, ErrorCode::InternalError)
            }
        };

        debug!(
            id,
            cmd,
            ok = response.ok,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "request handled"
        );
        response
    }

    /// Parse and run one raw JSON request line.
    ///
    /// A line that does not parse as a known command is answered with
    /// [`ErrorCode::UnknownCmd`] under whatever `id` can be recovered (0 if
    /// none).
    pub fn handle_line(&self, line: &str) -> Response {
        match serde_json::from_str::<Request>(line) {
            Ok(request) => self.handle(request),
            Err(_) => {
                let id = serde_json::from_str::<IdOnly>(line)
                    .map(|r| r.id)
                    .unwrap_or_default();
                warn!(id, "unrecognised request");
                Response::failure(id, ErrorCode::UnknownCmd)
            }
        }
    }
}

#[derive(Deserialize)]
struct IdOnly {
    #[serde(default)]
    id: u64,
}

fn execute(command: Command) -> Result<Value, ErrorCode> {
    match command {
        Command::Calibrate { target_ms, hash } => {
            let iterations = calibrate(Duration::from_millis(target_ms), hash);
            Ok(Value::from(iterations))
        }
        Command::Encrypt {
            plaintext,
            secret_a,
            secret_b,
            params,
            aad,
        } => {
            let secret_a = SecretBytes::from_secret(secret_a);
            let secret_b = SecretBytes::from_secret(secret_b);
            seal_payload(
                plaintext.expose().as_bytes(),
                &secret_a,
                &secret_b,
                &params,
                aad.as_bytes(),
            )
            .map(Value::from)
            .map_err(|_| ErrorCode::InternalError)
        }
        Command::Decrypt {
            payload,
            secret_a,
            secret_b,
            params,
            aad,
        } => {
            let secret_a = SecretBytes::from_secret(secret_a);
            let secret_b = SecretBytes::from_secret(secret_b);
            open_payload(&payload, &secret_a, &secret_b, &params, aad.as_bytes())
                .map(Value::from)
                .map_err(|_| ErrorCode::DecryptFailed)
        }
    }
}
