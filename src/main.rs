use std::process::ExitCode;

use aws_types::region::Region;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use aws_identity_validator::config::{Cli, EnvConfig};
use aws_identity_validator::strategy::{CredentialStrategy, DefaultChain, LegacyChain};
use aws_identity_validator::sts::Sts;
use aws_identity_validator::validator;

#[tokio::main(flavor = "current_thread")]
pub async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let env = EnvConfig::from_process();
    let region = cli.region.map(Region::new);
    let legacy = LegacyChain::new(region.clone());
    let default = DefaultChain::new(region);
    let strategies: [&dyn CredentialStrategy; 2] = [&legacy, &default];

    let mut stdout = std::io::stdout();
    let result = validator::run(&mut stdout, &env, &strategies, Sts::from_conf).await;
    ExitCode::from(validator::conclude(&mut stdout, result))
}
