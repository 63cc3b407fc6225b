//! Messages exchanged with the isolated worker.
//!
//! Every request carries a caller-chosen correlation `id`; the worker echoes
//! it on the single response it produces. Both sides serialise these types as
//! JSON, one message per line when the worker runs as a separate process.
//!
//! ```text
//! -> {"id":7,"cmd":"calibrate","targetMs":300,"hash":"SHA-256"}
//! <- {"id":7,"ok":true,"result":337500}
//! <- {"id":8,"ok":false,"err":"decrypt-failed"}
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::params::{DerivationParams, HashAlg};
use crate::secret::Secret;

/// A correlated request for the worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: u64,
    #[serde(flatten)]
    pub command: Command,
}

/// The three commands the worker understands.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "lowercase")]
pub enum Command {
    /// Measure local PBKDF2 cost and pick an iteration count.
    #[serde(rename_all = "camelCase")]
    Calibrate { target_ms: u64, hash: HashAlg },

    /// Seal `plaintext` under four layers; result is the base64url payload.
    #[serde(rename_all = "camelCase")]
    Encrypt {
        plaintext: Secret,
        secret_a: Secret,
        secret_b: Secret,
        params: DerivationParams,
        aad: String,
    },

    /// Open a base64url payload; result is the plaintext string.
    #[serde(rename_all = "camelCase")]
    Decrypt {
        payload: String,
        secret_a: Secret,
        secret_b: Secret,
        params: DerivationParams,
        aad: String,
    },
}

impl Command {
    /// Wire name, safe to log.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Calibrate { .. } => "calibrate",
            Command::Encrypt { .. } => "encrypt",
            Command::Decrypt { .. } => "decrypt",
        }
    }
}

/// Opaque failure codes. No other error detail ever crosses the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCode {
    /// Authentication failed somewhere in the layer chain, or the payload was
    /// malformed.
    DecryptFailed,
    /// The worker failed unexpectedly.
    InternalError,
    /// The worker did not recognise the request.
    UnknownCmd,
    /// No response arrived within the request timeout.
    WorkerTimeout,
    /// The worker could not be reached.
    WorkerUnavailable,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::DecryptFailed => "decrypt-failed",
            ErrorCode::InternalError => "internal-error",
            ErrorCode::UnknownCmd => "unknown-cmd",
            ErrorCode::WorkerTimeout => "worker-timeout",
            ErrorCode::WorkerUnavailable => "worker-unavailable",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The worker's answer to one [`Request`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: u64,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err: Option<ErrorCode>,
}

impl Response {
    pub fn success(id: u64, result: impl Into<Value>) -> Self {
        Self {
            id,
            ok: true,
            result: Some(result.into()),
            err: None,
        }
    }

    pub fn failure(id: u64, code: ErrorCode) -> Self {
        Self {
            id,
            ok: false,
            result: None,
            err: Some(code),
        }
    }

    /// Collapse into a `Result`. A failure without a code is reported as
    /// [`ErrorCode::InternalError`].
    pub fn into_result(self) -> Result<Value, ErrorCode> {
        if self.ok {
            Ok(self.result.unwrap_or(Value::Null))
        } else {
            Err(self.err.unwrap_or(ErrorCode::InternalError))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn calibrate_request_wire_shape() {
        let req = Request {
            id: 7,
            command: Command::Calibrate {
                target_ms: 300,
                hash: HashAlg::Sha256,
            },
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(
            v,
            json!({"id": 7, "cmd": "calibrate", "targetMs": 300, "hash": "SHA-256"})
        );
    }

    #[test]
    fn encrypt_request_round_trip() {
        let req = Request {
            id: 1,
            command: Command::Encrypt {
                plaintext: "hello".into(),
                secret_a: "alpha".into(),
                secret_b: "beta".into(),
                params: DerivationParams::new(150_000, HashAlg::Sha512),
                aad: "hdr||".into(),
            },
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains(r#""secretA":"alpha""#));
        let decoded: Request = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.id, 1);
        match decoded.command {
            Command::Encrypt { secret_b, params, aad, .. } => {
                assert_eq!(secret_b.expose(), "beta");
                assert_eq!(params.iterations(), 150_000);
                assert_eq!(aad, "hdr||");
            }
            other => panic!("unexpected command {}", other.name()),
        }
    }

    #[test]
    fn unknown_cmd_fails_to_parse() {
        let err = serde_json::from_str::<Request>(r#"{"id":3,"cmd":"shred"}"#);
        assert!(err.is_err());
    }

    #[test]
    fn error_codes_are_kebab_case() {
        let r = Response::failure(9, ErrorCode::WorkerUnavailable);
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v, json!({"id": 9, "ok": false, "err": "worker-unavailable"}));
        assert_eq!(ErrorCode::DecryptFailed.to_string(), "decrypt-failed");
    }

    #[test]
    fn into_result() {
        assert_eq!(
            Response::success(1, "x").into_result().unwrap(),
            Value::from("x")
        );
        assert_eq!(
            Response::failure(1, ErrorCode::DecryptFailed).into_result(),
            Err(ErrorCode::DecryptFailed)
        );
        let bare = Response {
            id: 1,
            ok: false,
            result: None,
            err: None,
        };
        assert_eq!(bare.into_result(), Err(ErrorCode::InternalError));
    }
}
