use clap::{Args, Parser, Subcommand};
use common::HashAlg;

/// x4 - two-secret, four-layer text envelope encryption
#[derive(Parser)]
#[command(name = "x4")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Encrypt the message read from stdin into an envelope
    Encrypt(EncryptArgs),

    /// Decrypt the envelope read from stdin
    Decrypt(SecretArgs),

    /// Measure PBKDF2 cost on this machine and print an iteration count
    Calibrate(CalibrateArgs),

    /// Print the derivation params of the envelope read from stdin
    Detect,
}

/// The two secrets. Prefer the environment over flags so that values stay
/// out of shell history and process listings.
#[derive(Args)]
pub struct SecretArgs {
    /// First secret (layers 1 and 2)
    #[arg(long = "secret-a", env = "X4_SECRET_A", hide_env_values = true)]
    pub secret_a: String,

    /// Second secret (layers 3 and 4)
    #[arg(long = "secret-b", env = "X4_SECRET_B", hide_env_values = true)]
    pub secret_b: String,
}

/// Arguments for the `encrypt` command
#[derive(Args)]
pub struct EncryptArgs {
    #[command(flatten)]
    pub secrets: SecretArgs,

    /// PBKDF2 iteration count (clamped to 120000..=1200000; default 600000)
    #[arg(long, conflicts_with = "calibrate")]
    pub iterations: Option<u64>,

    /// Calibrate the iteration count to X4_CALIBRATION_TARGET_MS first
    #[arg(long)]
    pub calibrate: bool,

    /// PBKDF2 hash
    #[arg(long, default_value_t = HashAlg::Sha256)]
    pub hash: HashAlg,
}

/// Arguments for the `calibrate` command
#[derive(Args)]
pub struct CalibrateArgs {
    /// Latency target in milliseconds (default X4_CALIBRATION_TARGET_MS)
    #[arg(long)]
    pub target_ms: Option<u64>,

    /// PBKDF2 hash
    #[arg(long, default_value_t = HashAlg::Sha256)]
    pub hash: HashAlg,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn encrypt_flags_parse() {
        let cli = Cli::try_parse_from([
            "x4",
            "encrypt",
            "--secret-a",
            "alpha",
            "--secret-b",
            "beta",
            "--iterations",
            "150000",
            "--hash",
            "SHA-512",
        ])
        .unwrap();
        let Commands::Encrypt(args) = cli.command else {
            panic!("expected encrypt");
        };
        assert_eq!(args.iterations, Some(150_000));
        assert_eq!(args.hash, HashAlg::Sha512);
        assert!(!args.calibrate);
    }

    #[test]
    fn iterations_conflict_with_calibrate() {
        let parsed = Cli::try_parse_from([
            "x4",
            "encrypt",
            "--secret-a",
            "a",
            "--secret-b",
            "b",
            "--iterations",
            "150000",
            "--calibrate",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn unknown_hash_is_rejected() {
        let parsed = Cli::try_parse_from(["x4", "calibrate", "--hash", "MD5"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn detect_takes_no_secrets() {
        let cli = Cli::try_parse_from(["x4", "detect"]).unwrap();
        assert!(matches!(cli.command, Commands::Detect));
        assert!(Cli::try_parse_from(["x4", "detect", "--secret-a", "a"]).is_err());
    }
}
