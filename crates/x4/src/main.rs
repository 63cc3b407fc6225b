//! `x4` binary entry point.
//!
//! Startup sequence:
//! 1. Parse the command line.
//! 2. Load and validate [`Config`] from environment variables.
//! 3. Initialise structured JSON logging (stderr).
//! 4. Start the worker and connect the [`Facade`] to it.
//! 5. Run the requested command, reading the message or envelope from stdin.

mod cli;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use common::params::DEFAULT_ITERATIONS;
use common::{DerivationParams, Secret, ServiceError};
use tokio::io::AsyncReadExt;
use tracing::info;
use x4::config::Config;
use x4::{telemetry, Facade};
use zeroize::Zeroizing;

use crate::cli::{CalibrateArgs, Cli, Commands, EncryptArgs, SecretArgs};

#[tokio::main]
async fn main() -> ExitCode {
    // -----------------------------------------------------------------------
    // 1. Command line
    // -----------------------------------------------------------------------
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR: {e}");
            let status = e
                .downcast_ref::<ServiceError>()
                .map_or(1, ServiceError::exit_code);
            ExitCode::from(u8::try_from(status).unwrap_or(1))
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    // -----------------------------------------------------------------------
    // 2. Configuration
    // -----------------------------------------------------------------------
    let cfg = Config::from_env().map_err(|e| {
        eprintln!("ERROR: x4 configuration invalid: {e}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 3. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init(&cfg.log_level)?;

    // -----------------------------------------------------------------------
    // 4-5. Worker and command (`detect` never needs a worker)
    // -----------------------------------------------------------------------
    match cli.command {
        Commands::Detect => detect().await,
        Commands::Encrypt(args) => encrypt(&connect(&cfg)?, &cfg, args).await,
        Commands::Decrypt(args) => decrypt(&connect(&cfg)?, args).await,
        Commands::Calibrate(args) => calibrate(&connect(&cfg)?, &cfg, args).await,
    }
}

fn connect(cfg: &Config) -> Result<Facade> {
    let facade = Facade::connect(cfg)?;
    info!(mode = ?cfg.worker_mode, "x4 ready");
    Ok(facade)
}

async fn encrypt(facade: &Facade, cfg: &Config, args: EncryptArgs) -> Result<()> {
    let iterations = if args.calibrate {
        u64::from(facade.calibrate(cfg.calibration_target_ms, args.hash).await?)
    } else {
        args.iterations.unwrap_or(u64::from(DEFAULT_ITERATIONS))
    };
    let params = DerivationParams::new(iterations, args.hash);

    let mut message = read_stdin().await?;
    strip_line_ending(&mut message);
    let plaintext = Secret::from(std::mem::take(&mut *message));

    let SecretArgs { secret_a, secret_b } = args.secrets;
    let envelope = facade
        .encrypt(plaintext, Secret::from(secret_a), Secret::from(secret_b), params)
        .await?;
    println!("{envelope}");
    Ok(())
}

async fn decrypt(facade: &Facade, args: SecretArgs) -> Result<()> {
    let input = read_stdin().await?;
    let SecretArgs { secret_a, secret_b } = args;
    let plaintext = Zeroizing::new(
        facade
            .decrypt(&input, Secret::from(secret_a), Secret::from(secret_b))
            .await?,
    );
    println!("{}", plaintext.as_str());
    Ok(())
}

async fn calibrate(facade: &Facade, cfg: &Config, args: CalibrateArgs) -> Result<()> {
    let target_ms = args.target_ms.unwrap_or(cfg.calibration_target_ms);
    let iterations = facade.calibrate(target_ms, args.hash).await?;
    println!("{iterations}");
    Ok(())
}

async fn detect() -> Result<()> {
    let input = read_stdin().await?;
    match Facade::detect(&input) {
        Some(params) => println!("pbkdf2 i={} h={}", params.iterations(), params.hash()),
        None => println!("no header; legacy defaults apply"),
    }
    Ok(())
}

async fn read_stdin() -> Result<Zeroizing<String>> {
    let mut buf = Zeroizing::new(String::new());
    tokio::io::stdin()
        .read_to_string(&mut buf)
        .await
        .context("failed to read stdin")?;
    Ok(buf)
}

/// Drop a single trailing `\n` or `\r\n` left by shells and editors.
fn strip_line_ending(text: &mut String) {
    if text.ends_with('\n') {
        text.pop();
        if text.ends_with('\r') {
            text.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_one_line_ending_only() {
        let mut s = String::from("hello\r\n\n");
        strip_line_ending(&mut s);
        assert_eq!(s, "hello\r\n");
        strip_line_ending(&mut s);
        assert_eq!(s, "hello");
        strip_line_ending(&mut s);
        assert_eq!(s, "hello");
    }
}
