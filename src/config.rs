//! Process configuration: the environment snapshot and command line flags.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use clap::Parser;

/// Validate that this workload can authenticate to AWS with ambient credentials.
#[derive(Debug, Parser)]
#[command(name = "aws-identity-validator", version, about)]
pub struct Cli {
    /// Region for the STS requests, overriding the ambient region
    #[arg(long, value_name = "REGION")]
    pub region: Option<String>,

    /// Log debug details to stderr (RUST_LOG takes precedence)
    #[arg(short, long)]
    pub verbose: bool,
}

/// An immutable snapshot of the process environment.
///
/// Everything in this crate reads variables through an `EnvConfig` instead of
/// `std::env`, so tests can inject synthetic environments.
#[derive(Clone, Default)]
pub struct EnvConfig {
    vars: HashMap<String, String>,
}

impl EnvConfig {
    pub fn from_process() -> Self {
        std::env::vars().collect()
    }

    /// Returns the value of `key`, treating an empty value as unset.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    pub fn vars(&self) -> &HashMap<String, String> {
        &self.vars
    }

    pub fn home_dir(&self) -> Option<PathBuf> {
        self.get("HOME").map(PathBuf::from).or_else(dirs::home_dir)
    }
}

impl<K, V> FromIterator<(K, V)> for EnvConfig
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

// The environment routinely holds AWS_SECRET_ACCESS_KEY, so only names are shown.
impl fmt::Debug for EnvConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.vars.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("EnvConfig").field("vars", &names).finish()
    }
}
