//! Inspection of the IRSA (IAM Roles for Service Accounts) environment.

use std::fmt;
use std::path::PathBuf;

use tracing::debug;

use crate::config::EnvConfig;

pub const WEB_IDENTITY_TOKEN_FILE: &str = "AWS_WEB_IDENTITY_TOKEN_FILE";
pub const ROLE_ARN: &str = "AWS_ROLE_ARN";

/// What the environment says about IRSA, captured once at startup.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CredentialEnvironmentSnapshot {
    pub token_file_path: Option<PathBuf>,
    pub token_file_exists: bool,
    pub token_file_size_bytes: Option<u64>,
    pub token_file_error: Option<String>,
    pub role_arn: Option<String>,
}

/// Reads the IRSA variables from `env` and stats the token file.
///
/// Missing values are represented in the snapshot, never returned as errors. The
/// filesystem is only touched when the token file variable is set.
pub fn inspect(env: &EnvConfig) -> CredentialEnvironmentSnapshot {
    let mut snapshot = CredentialEnvironmentSnapshot {
        token_file_path: env.get(WEB_IDENTITY_TOKEN_FILE).map(PathBuf::from),
        role_arn: env.get(ROLE_ARN).map(str::to_owned),
        ..Default::default()
    };

    if let Some(path) = &snapshot.token_file_path {
        match std::fs::metadata(path) {
            Ok(metadata) => {
                snapshot.token_file_exists = true;
                snapshot.token_file_size_bytes = Some(metadata.len());
            }
            Err(err) => {
                debug!(path = %path.display(), error = %err, "token file stat failed");
                snapshot.token_file_error = Some(format!("stat {}: {}", path.display(), err));
            }
        }
    }

    snapshot
}

impl fmt::Display for CredentialEnvironmentSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[IRSA Environment Check]")?;

        match &self.token_file_path {
            Some(path) => {
                writeln!(f, "✓ {WEB_IDENTITY_TOKEN_FILE} env var is set: {}", path.display())?;
                if self.token_file_exists {
                    writeln!(f, "✓ Token file exists")?;
                    if let Some(size) = self.token_file_size_bytes {
                        writeln!(f, "✓ Token file size: {size} bytes")?;
                    }
                } else if let Some(err) = &self.token_file_error {
                    writeln!(f, "✗ Token file issue: {err}")?;
                }
            }
            None => writeln!(
                f,
                "✗ {WEB_IDENTITY_TOKEN_FILE} env var not set - IRSA not configured"
            )?,
        }

        match &self.role_arn {
            Some(arn) => writeln!(f, "✓ {ROLE_ARN} env var is set: {arn}"),
            None => writeln!(f, "✗ {ROLE_ARN} env var not set - IRSA not configured"),
        }
    }
}
