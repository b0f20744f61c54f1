use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_sts::Client as StsClient;

use crate::error::BoxError;
use crate::identity::CallerIdentity;

/// The identity endpoint, kept behind a trait so checks can run without a network.
#[async_trait]
pub trait SecurityTokens: Send + Sync {
    async fn get_caller_identity(&self) -> Result<CallerIdentity, BoxError>;
}

pub struct Sts(StsClient);

impl Sts {
    pub fn new(client: StsClient) -> Self {
        Self(client)
    }

    pub fn from_conf(config: &SdkConfig) -> Self {
        Self::new(StsClient::new(config))
    }
}

#[async_trait]
impl SecurityTokens for Sts {
    async fn get_caller_identity(&self) -> Result<CallerIdentity, BoxError> {
        let output = self.0.get_caller_identity().send().await?;

        Ok(CallerIdentity {
            account_id: output.account().unwrap_or_default().to_owned(),
            user_id: output.user_id().unwrap_or_default().to_owned(),
            arn: output.arn().unwrap_or_default().to_owned(),
        })
    }
}
