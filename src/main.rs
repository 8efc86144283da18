use anyhow::Result;
use bcrypt_tool::{
    Cost, FallbackPolicy, FallbackRandom, RandomQuality, RandomSource, Version, check_password,
    gen_salt_with_version, hash_with_salt,
};
use clap::Parser;
use clap::error::ErrorKind;
use std::ffi::OsString;
use std::process::ExitCode;
use tracing::debug;
use zeroize::Zeroizing;
mod auth;

const TAG: &str = "bcrypt";

fn parse_rounds(s: &str) -> Result<Cost, String> {
    s.parse::<Cost>().map_err(|e| e.to_string())
}

fn parse_variant(s: &str) -> Result<Version, String> {
    let tag = s.trim_matches('$');
    match Version::from_tag(tag) {
        Some(version) if version.is_producible() && version != Version::Two => Ok(version),
        _ => Err(format!("unsupported variant '{s}', expected 2a, 2b or 2y")),
    }
}

#[derive(Debug, Parser)]
#[command(name = "bcrypt")]
#[command(
    version,
    about = "Hash a password with bcrypt, or check a password against a bcrypt hash."
)]
struct Cli {
    /// Log rounds to use when generating the salt (4-30)
    #[arg(short, long, value_name = "ROUNDS", env = "BCRYPT_ROUNDS", default_value_t = Cost::DEFAULT, value_parser = parse_rounds)]
    rounds: Cost,

    /// When checking passwords, do not print the result
    #[arg(short, long, default_value_t = false)]
    quiet: bool,

    /// Version tag of generated hashes
    #[arg(long, value_name = "VARIANT", env = "BCRYPT_VARIANT", default_value = "2a", value_parser = parse_variant)]
    variant: Version,

    /// Fail instead of falling back to a weaker random generator
    #[arg(long, default_value_t = false)]
    strict_random: bool,

    /// Password to hash or check, or "-" to read it from BCRYPT_PASSWORD, stdin or the terminal
    password: OsString,

    /// Hash to check the password against
    hash: Option<String>,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            let rendered = e.to_string();
            let message = rendered.lines().next().unwrap_or_default();
            eprintln!("ERROR[{TAG}]: {}", message.trim_start_matches("error: "));
            return ExitCode::FAILURE;
        }
    };

    // Logs go to stderr; stdout only carries the hash or the check result.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("ERROR[{TAG}]: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Shown on stderr whatever the log filter, when the salt came from a weak source.
fn random_warning(rng: &impl RandomSource) -> Option<&'static str> {
    match rng.quality() {
        RandomQuality::Strong => None,
        RandomQuality::WeakRandomFallback => {
            Some("no strong secure random source found, salt generated with a weaker generator")
        }
    }
}

/// Returns whether the invocation succeeded: always for hashing, on match
/// for checking.
fn run(cli: Cli) -> Result<bool> {
    let password = if cli.password == "-" {
        auth::read_password()?
    } else {
        Zeroizing::new(auth::os_bytes(cli.password)?)
    };

    match cli.hash {
        None => {
            let policy = if cli.strict_random {
                FallbackPolicy::Deny
            } else {
                FallbackPolicy::Allow
            };
            let mut rng = FallbackRandom::system(policy);
            let salt = gen_salt_with_version(cli.variant, cli.rounds, &mut rng)?;
            debug!(quality = ?rng.quality(), cost = %cli.rounds, "generated salt");
            if let Some(warning) = random_warning(&rng) {
                eprintln!("WARNING[{TAG}]: {warning}");
            }

            println!("{}", hash_with_salt(&password, &salt)?);
            Ok(true)
        }
        Some(hash) => {
            let ok = check_password(&*password, &hash)?;
            debug!(ok, "checked password");
            if !cli.quiet {
                println!("{}", if ok { "OK" } else { "FAIL" });
            }
            Ok(ok)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bcrypt_tool::{BcryptError, OsRandom, WeakRandom};

    struct Broken;

    impl RandomSource for Broken {
        fn fill_random_bytes(&mut self, _buf: &mut [u8]) -> bcrypt_tool::Result<()> {
            Err(BcryptError::RandomUnavailable("no entropy".into()))
        }
    }

    #[test]
    fn weak_salt_source_is_reported() {
        assert_eq!(random_warning(&OsRandom), None);
        assert!(random_warning(&WeakRandom::new()).is_some());

        let mut rng = FallbackRandom::new(Broken, FallbackPolicy::Allow);
        assert_eq!(random_warning(&rng), None);
        gen_salt_with_version(Version::TwoA, Cost::MIN, &mut rng).unwrap();
        assert!(random_warning(&rng).unwrap().contains("weaker generator"));
    }

    #[test]
    fn strict_random_refuses_fallback() {
        let mut rng = FallbackRandom::new(Broken, FallbackPolicy::Deny);
        assert!(gen_salt_with_version(Version::TwoA, Cost::MIN, &mut rng).is_err());
        assert_eq!(random_warning(&rng), None);
    }
}
