use async_trait::async_trait;
use aws_config::default_provider::credentials::DefaultCredentialsChain;
use aws_config::BehaviorVersion;
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_types::region::Region;
use tracing::debug;

use super::{resolve_region, CredentialStrategy, ProviderTrail, ResolvedCredentials, Traced};
use crate::config::EnvConfig;
use crate::error::BoxError;

/// The SDK's own default chain, used as an opaque unit.
#[derive(Debug, Default)]
pub struct DefaultChain {
    region: Option<Region>,
}

impl DefaultChain {
    pub fn new(region: Option<Region>) -> Self {
        Self { region }
    }
}

#[async_trait]
impl CredentialStrategy for DefaultChain {
    fn name(&self) -> &'static str {
        "default credential chain"
    }

    fn heading(&self) -> &'static str {
        "Default credential chain"
    }

    async fn resolve(&self, _env: &EnvConfig) -> Result<ResolvedCredentials, BoxError> {
        let trail = ProviderTrail::default();
        let region = resolve_region(self.region.as_ref()).await;
        debug!(region = %region, "loading default chain configuration");

        let chain = DefaultCredentialsChain::builder()
            .region(region.clone())
            .build()
            .await;
        let provider =
            SharedCredentialsProvider::new(Traced::new("DefaultCredentialsChain", chain, &trail));

        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(region)
            .credentials_provider(provider.clone())
            .load()
            .await;

        Ok(ResolvedCredentials {
            config,
            provider,
            trail,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::test_env::isolated;
    use aws_credential_types::provider::ProvideCredentials;

    #[tokio::test]
    async fn resolves_environment_keys_with_region_override() {
        let home = tempfile::tempdir().unwrap();
        let vars = isolated(
            home.path(),
            &[
                ("AWS_ACCESS_KEY_ID", "AKIDEXAMPLE"),
                ("AWS_SECRET_ACCESS_KEY", "wJalrXUtnFEMI/K7MDENG"),
                ("AWS_REGION", "us-east-2"),
            ],
        );

        temp_env::async_with_vars(vars, async {
            let chain = DefaultChain::new(Some(Region::new("eu-central-1")));
            let resolved = chain.resolve(&EnvConfig::from_process()).await.unwrap();

            assert_eq!(resolved.config.region(), Some(&Region::new("eu-central-1")));
            let credentials = resolved.provider.provide_credentials().await.unwrap();
            assert_eq!(credentials.access_key_id(), "AKIDEXAMPLE");
            assert_eq!(resolved.trail.last(), Some("DefaultCredentialsChain"));
        })
        .await;
    }

    #[tokio::test]
    async fn ambient_region_is_used_without_override() {
        let home = tempfile::tempdir().unwrap();
        let vars = isolated(home.path(), &[("AWS_REGION", "ap-northeast-1")]);

        temp_env::async_with_vars(vars, async {
            let resolved = DefaultChain::default()
                .resolve(&EnvConfig::from_process())
                .await
                .unwrap();

            assert_eq!(resolved.config.region(), Some(&Region::new("ap-northeast-1")));
        })
        .await;
    }
}
