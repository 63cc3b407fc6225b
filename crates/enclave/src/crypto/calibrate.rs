//! Pick a PBKDF2 iteration count that costs roughly a target wall-clock time
//! on this machine.

use std::time::{Duration, Instant};

use aes_gcm::aead::{rand_core::RngCore, OsRng};
use common::{
    params::{clamp_iterations, MAX_ITERATIONS},
    DerivationParams, HashAlg,
};
use tracing::debug;

use super::kdf::{derive_bits, KEY_LEN, SALT_LEN};

/// First iteration count tried.
pub const CALIBRATION_FLOOR: u32 = 150_000;

/// Fixed, non-secret password used for timing trials.
const CALIBRATION_INPUT: &[u8] = b"x4-cal";

/// A trial "hits" once it takes at least 9/10 of the target.
const HIT_NUMERATOR: u32 = 9;
const HIT_DENOMINATOR: u32 = 10;

/// Calibrate against real PBKDF2 with `hash`.
pub fn calibrate(target: Duration, hash: HashAlg) -> u32 {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let mut out = [0u8; KEY_LEN];

    calibrate_with(target, |iterations| {
        let params = DerivationParams::new(u64::from(iterations), hash);
        let started = Instant::now();
        derive_bits(CALIBRATION_INPUT, &salt, &params, &mut out);
        started.elapsed()
    })
}

/// Search driver, generic over the timing trial.
///
/// Starts at [`CALIBRATION_FLOOR`] and grows by x1.5 (floored) until a trial
/// reaches 90% of `target`. If growth would pass [`MAX_ITERATIONS`] first,
/// the ceiling is returned. The result is always clamped into range.
pub fn calibrate_with<F>(target: Duration, mut trial: F) -> u32
where
    F: FnMut(u32) -> Duration,
{
    let threshold = target / HIT_DENOMINATOR * HIT_NUMERATOR;
    let mut iterations = u64::from(CALIBRATION_FLOOR);

    while iterations <= u64::from(MAX_ITERATIONS) {
        // Bounded by MAX_ITERATIONS above, so the cast is lossless.
        let elapsed = trial(iterations as u32);
        debug!(
            iterations,
            elapsed_ms = elapsed.as_millis() as u64,
            "calibration trial"
        );
        if elapsed >= threshold {
            break;
        }
        iterations = iterations * 3 / 2;
    }

    clamp_iterations(iterations)
}
