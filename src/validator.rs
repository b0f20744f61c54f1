use std::io::Write;

use aws_config::SdkConfig;
use tracing::{debug, error};

use crate::config::EnvConfig;
use crate::environment;
use crate::error::Result;
use crate::identity::check_identity;
use crate::strategy::CredentialStrategy;
use crate::sts::SecurityTokens;

/// Writes the full report to `out`: the IRSA environment, then one identity
/// check per strategy, in order.
///
/// Returns the first setup or request failure. The environment section never
/// fails the run.
pub async fn run<W, C, T>(
    out: &mut W,
    env: &EnvConfig,
    strategies: &[&dyn CredentialStrategy],
    connect: C,
) -> Result<()>
where
    W: Write,
    C: Fn(&SdkConfig) -> T,
    T: SecurityTokens,
{
    writeln!(out, "AWS Identity Validator")?;
    writeln!(out, "===========================")?;

    let snapshot = environment::inspect(env);
    debug!(?snapshot, "inspected IRSA environment");
    write!(out, "\n{snapshot}")?;

    for strategy in strategies {
        writeln!(out, "\n[{}]", strategy.heading())?;
        out.flush()?;

        let report = check_identity(*strategy, env, &connect).await?;
        write!(out, "{report}")?;
    }

    out.flush()?;
    Ok(())
}

/// Turns the outcome of [`run`] into the process exit status, writing the
/// error to `out` when there is one.
pub fn conclude<W: Write>(out: &mut W, result: Result<()>) -> u8 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            error!(error = %err, "identity validation failed");
            if let Err(write_err) = writeln!(out, "{err}").and_then(|()| out.flush()) {
                error!(error = %write_err, "failed to write the failure to stdout");
            }
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use aws_credential_types::provider::error::CredentialsError;
    use std::io;

    struct Closed;

    impl Write for Closed {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "stdout closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn setup_failure() -> Error {
        Error::Setup {
            strategy: "legacy credential chain",
            source: Box::new(CredentialsError::not_loaded("no providers in chain")),
        }
    }

    #[test]
    fn success_exits_zero() {
        let mut out = Vec::new();
        assert_eq!(conclude(&mut out, Ok(())), 0);
        assert!(out.is_empty());
    }

    #[test]
    fn failure_is_printed_and_exits_nonzero() {
        let mut out = Vec::new();

        assert_eq!(conclude(&mut out, Err(setup_failure())), 1);
        let printed = String::from_utf8(out).unwrap();
        assert!(printed
            .starts_with("Failed to resolve credentials with the legacy credential chain"));
        assert!(printed.ends_with('\n'));
    }

    #[test]
    fn unwritable_output_still_exits_nonzero() {
        assert_eq!(conclude(&mut Closed, Err(setup_failure())), 1);
    }
}
