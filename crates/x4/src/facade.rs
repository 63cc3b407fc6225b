//! [`Facade`]: the single entry point for encrypting, decrypting and
//! calibrating.
//!
//! The facade validates input, builds or parses the envelope header, and
//! dispatches the expensive work through the [`IsolationChannel`]. It never
//! derives keys or holds secret bytes itself.

use common::header::{self, Envelope};
use common::limits::{MAX_ENVELOPE_BYTES, MAX_HEADER_BYTES, MAX_SECRET_CHARS};
use common::protocol::Command;
use common::{DerivationParams, ErrorCode, HashAlg, Operation, Secret, ServiceError, ValidationError};
use serde_json::Value;
use tokio::process::Child;
use tracing::{debug, info};

use crate::channel::IsolationChannel;
use crate::config::Config;
use crate::transport;

pub use common::limits::MAX_PLAINTEXT_CHARS;

/// Orchestration front end over one worker.
pub struct Facade {
    channel: IsolationChannel,
    /// Keeps a process-mode worker alive for as long as the facade.
    _worker: Option<Child>,
}

impl Facade {
    /// Start the configured worker and connect to it.
    ///
    /// Must be called inside a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker cannot be started.
    pub fn connect(cfg: &Config) -> anyhow::Result<Self> {
        let link = transport::connect(cfg)?;
        let channel = IsolationChannel::new(link.requests, link.responses, cfg.request_timeout());
        Ok(Self {
            channel,
            _worker: link.child,
        })
    }

    /// Wrap an already-wired channel.
    pub fn with_channel(channel: IsolationChannel) -> Self {
        Self {
            channel,
            _worker: None,
        }
    }

    /// Seal `plaintext` under `secret_a` and `secret_b` and return the
    /// envelope text.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Validation`] for empty or oversize input (nothing is
    /// dispatched), otherwise [`ServiceError::Failed`] with an opaque code.
    pub async fn encrypt(
        &self,
        plaintext: impl Into<Secret>,
        secret_a: impl Into<Secret>,
        secret_b: impl Into<Secret>,
        params: DerivationParams,
    ) -> Result<String, ServiceError> {
        let plaintext = plaintext.into();
        let secret_a = secret_a.into();
        let secret_b = secret_b.into();

        require("plaintext", &plaintext, MAX_PLAINTEXT_CHARS)?;
        require("secret A", &secret_a, MAX_SECRET_CHARS)?;
        require("secret B", &secret_b, MAX_SECRET_CHARS)?;

        let aad = header::build(&params);
        let result = self
            .call(
                Operation::Encrypt,
                Command::Encrypt {
                    plaintext,
                    secret_a,
                    secret_b,
                    params,
                    aad,
                },
            )
            .await?;

        let payload = into_string(Operation::Encrypt, result)?;
        info!(
            iterations = params.iterations(),
            hash = %params.hash(),
            "envelope sealed"
        );
        Ok(Envelope::new(params, payload).to_string())
    }

    /// Open an envelope (or a legacy header-less payload) and return the
    /// plaintext.
    ///
    /// Surrounding whitespace is ignored. A text without a current-version
    /// header is treated as a legacy payload sealed with the default params.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Validation`] for empty input or input longer than any
    /// envelope [`Facade::encrypt`] can produce, otherwise
    /// [`ServiceError::Failed`]. Wrong secrets, a damaged payload and an
    /// edited header are indistinguishable.
    pub async fn decrypt(
        &self,
        input: &str,
        secret_a: impl Into<Secret>,
        secret_b: impl Into<Secret>,
    ) -> Result<String, ServiceError> {
        let input = input.trim();
        let secret_a = secret_a.into();
        let secret_b = secret_b.into();

        if input.is_empty() {
            return Err(ValidationError::Empty("input").into());
        }
        if input.len() > MAX_ENVELOPE_BYTES {
            return Err(ValidationError::TooLong {
                field: "input",
                len: input.len(),
                max: MAX_ENVELOPE_BYTES,
            }
            .into());
        }
        require("secret A", &secret_a, MAX_SECRET_CHARS)?;
        require("secret B", &secret_b, MAX_SECRET_CHARS)?;

        let (payload, params, aad) = match header::parse(input).filter(|h| h.is_current()) {
            Some(parsed) => (parsed.payload, parsed.params, parsed.aad()),
            None => {
                let params = DerivationParams::default();
                debug!("no current header; using legacy defaults");
                (input, params, header::build(&params))
            }
        };

        // Nothing outside these bounds can authenticate; fail without a
        // round trip so every dispatched request fits one frame.
        if aad.len() > MAX_HEADER_BYTES || !is_payload_text(payload) {
            debug!("input cannot be an envelope");
            return Err(ServiceError::Failed {
                op: Operation::Decrypt,
                code: ErrorCode::DecryptFailed,
            });
        }

        let result = self
            .call(
                Operation::Decrypt,
                Command::Decrypt {
                    payload: payload.to_owned(),
                    secret_a,
                    secret_b,
                    params,
                    aad,
                },
            )
            .await?;
        into_string(Operation::Decrypt, result)
    }

    /// Measure local PBKDF2 cost and return an iteration count that takes
    /// roughly `target_ms` per derivation.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Failed`] if the worker cannot complete the run.
    pub async fn calibrate(&self, target_ms: u64, hash: HashAlg) -> Result<u32, ServiceError> {
        let result = self
            .call(Operation::Calibrate, Command::Calibrate { target_ms, hash })
            .await?;
        let iterations = result.as_u64().ok_or(ServiceError::Failed {
            op: Operation::Calibrate,
            code: ErrorCode::InternalError,
        })?;
        let iterations = DerivationParams::new(iterations, hash).iterations();
        info!(target_ms, hash = %hash, iterations, "calibration finished");
        Ok(iterations)
    }

    /// Params of a recognisable current-version header at the start of
    /// `input`, if any.
    pub fn detect(input: &str) -> Option<DerivationParams> {
        header::parse(input.trim())
            .filter(|h| h.is_current())
            .map(|h| h.params)
    }

    async fn call(&self, op: Operation, command: Command) -> Result<Value, ServiceError> {
        self.channel
            .call(command)
            .await
            .map_err(|code| ServiceError::Failed { op, code })
    }
}

fn require(field: &'static str, value: &Secret, max: usize) -> Result<(), ValidationError> {
    if value.is_blank() {
        return Err(ValidationError::Empty(field));
    }
    let len = value.char_len();
    if len > max {
        return Err(ValidationError::TooLong { field, len, max });
    }
    Ok(())
}

/// Base64url alphabet plus padding.
fn is_payload_text(payload: &str) -> bool {
    payload
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'='))
}

fn into_string(op: Operation, value: Value) -> Result<String, ServiceError> {
    match value {
        Value::String(s) => Ok(s),
        _ => Err(ServiceError::Failed {
            op,
            code: ErrorCode::InternalError,
        }),
    }
}
