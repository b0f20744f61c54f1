use async_trait::async_trait;
use aws_config::ecs::EcsCredentialsProvider;
use aws_config::environment::credentials::EnvironmentVariableCredentialsProvider;
use aws_config::imds::credentials::ImdsCredentialsProvider;
use aws_config::meta::credentials::CredentialsProviderChain;
use aws_config::profile::ProfileFileCredentialsProvider;
use aws_config::provider_config::ProviderConfig;
use aws_config::web_identity_token::WebIdentityTokenCredentialsProvider;
use aws_config::BehaviorVersion;
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_types::region::Region;
use tracing::debug;

use super::{resolve_region, CredentialStrategy, ProviderTrail, ResolvedCredentials, Traced};
use crate::config::EnvConfig;
use crate::error::BoxError;
use crate::sso::SsoProvider;

/// A hand-assembled provider chain, one link per credential source.
///
/// Order: environment, web identity token, cached SSO token, shared profile,
/// ECS container endpoint, EC2 instance metadata. Web identity is tried before
/// any profile, as the v1 SDKs do when IRSA variables are present.
#[derive(Debug, Default)]
pub struct LegacyChain {
    region: Option<Region>,
}

impl LegacyChain {
    pub fn new(region: Option<Region>) -> Self {
        Self { region }
    }

    fn chain(
        env: &EnvConfig,
        region: &Region,
        trail: &ProviderTrail,
    ) -> CredentialsProviderChain {
        // Links that call STS or SSO need the region to resolve an endpoint.
        let provider_config = ProviderConfig::default().with_region(Some(region.clone()));

        CredentialsProviderChain::first_try(
            "EnvironmentVariables",
            Traced::new(
                "EnvironmentVariables",
                EnvironmentVariableCredentialsProvider::new(),
                trail,
            ),
        )
        .or_else(
            "WebIdentityToken",
            Traced::new(
                "WebIdentityToken",
                WebIdentityTokenCredentialsProvider::builder()
                    .configure(&provider_config)
                    .build(),
                trail,
            ),
        )
        .or_else(
            "SsoCachedToken",
            Traced::new("SsoCachedToken", SsoProvider::new(env.clone()), trail),
        )
        .or_else(
            "SharedProfile",
            Traced::new(
                "SharedProfile",
                ProfileFileCredentialsProvider::builder()
                    .configure(&provider_config)
                    .build(),
                trail,
            ),
        )
        .or_else(
            "EcsContainer",
            Traced::new(
                "EcsContainer",
                EcsCredentialsProvider::builder()
                    .configure(&provider_config)
                    .build(),
                trail,
            ),
        )
        .or_else(
            "Ec2InstanceMetadata",
            Traced::new(
                "Ec2InstanceMetadata",
                ImdsCredentialsProvider::builder()
                    .configure(&provider_config)
                    .build(),
                trail,
            ),
        )
    }
}

#[async_trait]
impl CredentialStrategy for LegacyChain {
    fn name(&self) -> &'static str {
        "legacy credential chain"
    }

    fn heading(&self) -> &'static str {
        "Legacy credential chain"
    }

    async fn resolve(&self, env: &EnvConfig) -> Result<ResolvedCredentials, BoxError> {
        let trail = ProviderTrail::default();
        let region = resolve_region(self.region.as_ref()).await;
        let provider = SharedCredentialsProvider::new(Self::chain(env, &region, &trail));
        debug!(region = %region, "loading legacy chain configuration");

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
