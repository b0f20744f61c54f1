//! Pluggable credential-resolution strategies.
//!
//! A strategy turns the ambient environment into an [`SdkConfig`] plus the
//! credentials provider behind it. Identity checks are written once against
//! [`CredentialStrategy`] and run with each concrete chain.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use aws_config::meta::region::ProvideRegion;
use aws_config::SdkConfig;
use aws_credential_types::provider::{future, ProvideCredentials, SharedCredentialsProvider};
use aws_types::region::Region;
use tracing::{debug, warn};

use crate::config::EnvConfig;
use crate::error::BoxError;

mod default;
mod legacy;

pub use default::DefaultChain;
pub use legacy::LegacyChain;

/// STS is a global service; its global endpoint lives in us-east-1.
pub const FALLBACK_REGION: &str = "us-east-1";

#[async_trait]
pub trait CredentialStrategy: Send + Sync {
    /// Lowercase name used in sentences, e.g. "legacy credential chain".
    fn name(&self) -> &'static str;

    /// Section heading for the report.
    fn heading(&self) -> &'static str;

    async fn resolve(&self, env: &EnvConfig) -> Result<ResolvedCredentials, BoxError>;
}

/// The output of a strategy: a client configuration and the provider it signs with.
pub struct ResolvedCredentials {
    pub config: SdkConfig,
    pub provider: SharedCredentialsProvider,
    pub trail: ProviderTrail,
}

/// Remembers which chain link last supplied credentials.
#[derive(Clone, Debug, Default)]
pub struct ProviderTrail(Arc<Mutex<Option<&'static str>>>);

impl ProviderTrail {
    fn record(&self, name: &'static str) {
        if let Ok(mut last) = self.0.lock() {
            *last = Some(name);
        }
    }

    pub fn last(&self) -> Option<&'static str> {
        self.0.lock().ok().and_then(|last| *last)
    }
}

/// A credentials provider that records its name on the trail when it succeeds.
#[derive(Debug)]
pub struct Traced<P> {
    name: &'static str,
    inner: P,
    trail: ProviderTrail,
}

impl<P> Traced<P> {
    pub fn new(name: &'static str, inner: P, trail: &ProviderTrail) -> Self {
        Self {
            name,
            inner,
            trail: trail.clone(),
        }
    }
}

impl<P: ProvideCredentials> ProvideCredentials for Traced<P> {
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a,
    {
        future::ProvideCredentials::new(async move {
            let credentials = self.inner.provide_credentials().await?;
            debug!(provider = self.name, "credentials provided");
            self.trail.record(self.name);
            Ok(credentials)
        })
    }
}

/// Picks the region for the STS client: explicit override, then the SDK's
/// default region chain, then [`FALLBACK_REGION`].
pub(crate) async fn resolve_region(region_override: Option<&Region>) -> Region {
    if let Some(region) = region_override {
        return region.clone();
    }

    match aws_config::default_provider::region::default_provider()
        .region()
        .await
    {
        Some(region) => region,
        None => {
            warn!(
                fallback = FALLBACK_REGION,
                "no region configured, using the STS global endpoint region"
            );
            Region::from_static(FALLBACK_REGION)
        }
    }
}
