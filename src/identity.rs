//! The identity check shared by every credential strategy.

use std::fmt;
use std::time::SystemTime;

use aws_config::SdkConfig;
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_credential_types::Credentials;
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{debug, info, warn};

use crate::config::EnvConfig;
use crate::error::{BoxError, Error, MetadataError, Result};
use crate::strategy::{CredentialStrategy, ResolvedCredentials};
use crate::sts::SecurityTokens;

/// Who the credentials belong to, as reported by `sts:GetCallerIdentity`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallerIdentity {
    pub account_id: String,
    pub user_id: String,
    pub arn: String,
}

/// Which provider supplied the credentials. Never holds the secret key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderMetadata {
    pub provider_name: String,
    pub access_key_id: String,
    pub has_session_token: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct IdentityReport {
    pub strategy: &'static str,
    pub identity: CallerIdentity,
    pub provider: std::result::Result<ProviderMetadata, MetadataError>,
}

/// Resolves credentials with `strategy`, confirms them against the identity
/// endpoint built by `connect`, then describes the provider.
///
/// Credentials are resolved once, before `connect` is called, so a strategy that
/// cannot produce credentials never reaches the network. The identity request
/// is signed with exactly those credentials and the report describes them.
pub async fn check_identity<S, C, T>(
    strategy: &S,
    env: &EnvConfig,
    connect: C,
) -> Result<IdentityReport>
where
    S: CredentialStrategy + ?Sized,
    C: FnOnce(&SdkConfig) -> T,
    T: SecurityTokens,
{
    let name = strategy.name();
    let setup = |source: BoxError| Error::Setup {
        strategy: name,
        source,
    };

    let resolved = strategy.resolve(env).await.map_err(setup)?;
    let credentials = resolved
        .provider
        .provide_credentials()
        .await
        .map_err(|err| setup(err.into()))?;
    debug!(
        strategy = name,
        provider = resolved.trail.last().unwrap_or("unknown"),
        "credentials resolved"
    );

    let config = resolved
        .config
        .to_builder()
        .credentials_provider(SharedCredentialsProvider::new(credentials.clone()))
        .build();
    let tokens = connect(&config);
    let identity = tokens
        .get_caller_identity()
        .await
        .map_err(|source| Error::Request {
            strategy: name,
            source,
        })?;
    info!(
        strategy = name,
        account = %identity.account_id,
        arn = %identity.arn,
        "identity confirmed"
    );

    let provider = describe_provider(&resolved, credentials).await;
    if let Err(err) = &provider {
        warn!(strategy = name, error = %err, "credential details unavailable");
    }

    Ok(IdentityReport {
        strategy: name,
        identity,
        provider,
    })
}

/// Describes the credentials used for the check, refreshing them from the
/// provider only when they have already expired.
async fn describe_provider(
    resolved: &ResolvedCredentials,
    credentials: Credentials,
) -> std::result::Result<ProviderMetadata, MetadataError> {
    let credentials = match credentials.expiry() {
        Some(expiry) if expiry <= SystemTime::now() => {
            resolved.provider.provide_credentials().await?
        }
        _ => credentials,
    };

    Ok(ProviderMetadata {
        provider_name: resolved.trail.last().unwrap_or("unknown").to_owned(),
        access_key_id: credentials.access_key_id().to_owned(),
        has_session_token: credentials.session_token().is_some(),
        expires_at: credentials.expiry().map(DateTime::<Utc>::from),
    })
}

impl fmt::Display for IdentityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "✔  Successfully authenticated with the {}", self.strategy)?;
        writeln!(f, "Account ID: {}", self.identity.account_id)?;
        writeln!(f, "User ID: {}", self.identity.user_id)?;
        writeln!(f, "ARN: {}", self.identity.arn)?;

        match &self.provider {
            Ok(provider) => {
                writeln!(f, "Provider: {}", provider.provider_name)?;
                writeln!(f, "Access Key ID: {}", provider.access_key_id)?;
                if provider.has_session_token {
                    writeln!(f, "Using temporary credentials (has session token)")?;
                }
                if let Some(expires_at) = provider.expires_at {
                    writeln!(
                        f,
                        "Credentials expire at: {}",
                        expires_at.to_rfc3339_opts(SecondsFormat::Secs, true)
                    )?;
                }
                Ok(())
            }
            Err(err) => writeln!(f, "Failed to get credential details: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{ProviderTrail, Traced};
    use async_trait::async_trait;
    use aws_credential_types::provider::error::CredentialsError;
    use aws_credential_types::provider::future;
    use aws_types::region::Region;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    const SECRET: &str = "wJalrXUtnFEMI/K7MDENG/bPxRfiCYEXAMPLEKEY";

    /// Succeeds the first `budget` times, then reports no credentials.
    #[derive(Debug)]
    struct Flaky {
        budget: AtomicUsize,
        expiry: Option<SystemTime>,
        calls: Arc<AtomicUsize>,
    }

    impl ProvideCredentials for Flaky {
        fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
        where
            Self: 'a,
        {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let remaining = self.budget.load(Ordering::SeqCst);
            if remaining == 0 {
                return future::ProvideCredentials::ready(Err(CredentialsError::not_loaded(
                    "credentials went away",
                )));
            }
            self.budget.store(remaining - 1, Ordering::SeqCst);
            future::ProvideCredentials::ready(Ok(Credentials::new(
                "ASIAEXAMPLE",
                SECRET,
                Some("session".to_owned()),
                self.expiry,
                "test",
            )))
        }
    }

    /// Resolves to whatever provider `F` builds.
    struct Fixed<F>(F);

    #[async_trait]
    impl<F, P> CredentialStrategy for Fixed<F>
    where
        F: Fn() -> P + Send + Sync,
        P: ProvideCredentials + 'static,
    {
        fn name(&self) -> &'static str {
            "test chain"
        }

        fn heading(&self) -> &'static str {
            "Test chain"
        }

        async fn resolve(
            &self,
            _env: &EnvConfig,
        ) -> std::result::Result<ResolvedCredentials, BoxError> {
            let trail = ProviderTrail::default();
            let provider =
                SharedCredentialsProvider::new(Traced::new("Static", (self.0)(), &trail));
            let config = SdkConfig::builder()
                .credentials_provider(provider.clone())
                .region(Region::from_static("us-east-1"))
                .build();
            Ok(ResolvedCredentials {
                config,
                provider,
                trail,
            })
        }
    }

    #[derive(Clone, Default)]
    struct MockSts {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl SecurityTokens for MockSts {
        async fn get_caller_identity(&self) -> std::result::Result<CallerIdentity, BoxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err("InvalidClientTokenId: the security token is invalid".into());
            }
            Ok(CallerIdentity {
                account_id: "123456789012".to_owned(),
                user_id: "AIDAEXAMPLEUSERID".to_owned(),
                arn: "arn:aws:iam::123456789012:user/test".to_owned(),
            })
        }
    }

    fn static_credentials() -> Credentials {
        Credentials::new("AKIAEXAMPLE", SECRET, None, None, "test")
    }

    fn flaky(
        budget: usize,
        expiry: Option<SystemTime>,
        calls: &Arc<AtomicUsize>,
    ) -> impl Fn() -> Flaky + Send + Sync {
        let calls = calls.clone();
        move || Flaky {
            budget: AtomicUsize::new(budget),
            expiry,
            calls: calls.clone(),
        }
    }

    #[tokio::test]
    async fn reports_identity_and_provider() {
        let sts = MockSts::default();
        let report = check_identity(&Fixed(static_credentials), &EnvConfig::default(), |_| {
            sts.clone()
        })
        .await
        .unwrap();

        assert_eq!(report.identity.account_id, "123456789012");
        let provider = report.provider.as_ref().unwrap();
        assert_eq!(provider.provider_name, "Static");
        assert_eq!(provider.access_key_id, "AKIAEXAMPLE");
        assert!(!provider.has_session_token);

        let output = report.to_string();
        assert!(output.contains("✔  Successfully authenticated with the test chain"));
        assert!(output.contains("Account ID: 123456789012\n"));
        assert!(output.contains("User ID: AIDAEXAMPLEUSERID\n"));
        assert!(output.contains("ARN: arn:aws:iam::123456789012:user/test\n"));
        assert!(output.contains("Provider: Static\n"));
        assert!(output.contains("Access Key ID: AKIAEXAMPLE\n"));
        assert!(!output.contains("temporary credentials"));
        assert!(!output.contains(SECRET));
        assert!(!format!("{report:?}").contains(SECRET));
    }

    #[tokio::test]
    async fn setup_failure_skips_request() {
        let sts = MockSts::default();
        let calls = sts.calls.clone();

        let strategy = Fixed(flaky(0, None, &Arc::default()));
        let err = check_identity(&strategy, &EnvConfig::default(), |_| sts)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Setup { strategy: "test chain", .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn request_failure_is_fatal() {
        let sts = MockSts {
            fail: true,
            ..Default::default()
        };

        let err = check_identity(&Fixed(static_credentials), &EnvConfig::default(), |_| sts)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Request { .. }));
        assert!(err.to_string().contains("InvalidClientTokenId"));
    }

    #[tokio::test]
    async fn credentials_resolved_once_per_check() {
        let calls = Arc::new(AtomicUsize::new(0));
        let expiry = SystemTime::now() + Duration::from_secs(3600);
        let strategy = Fixed(flaky(10, Some(expiry), &calls));

        let report = check_identity(&strategy, &EnvConfig::default(), |config| {
            assert!(config.credentials_provider().is_some());
            MockSts::default()
        })
        .await
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let provider = report.provider.unwrap();
        assert_eq!(provider.access_key_id, "ASIAEXAMPLE");
        assert_eq!(provider.expires_at, Some(DateTime::<Utc>::from(expiry)));
    }

    #[tokio::test]
    async fn metadata_failure_keeps_identity() {
        // Expired by the time they are described, and nothing left to refresh from.
        let calls = Arc::new(AtomicUsize::new(0));
        let expiry = SystemTime::now() - Duration::from_secs(60);
        let strategy = Fixed(flaky(1, Some(expiry), &calls));

        let report = check_identity(&strategy, &EnvConfig::default(), |_| MockSts::default())
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(report.provider.is_err());
        let output = report.to_string();
        assert!(output.contains("ARN: arn:aws:iam::123456789012:user/test"));
        assert!(output.contains("Failed to get credential details: "));
        assert!(!output.contains("Access Key ID"));
    }

    #[tokio::test]
    async fn temporary_credentials_are_flagged() {
        let strategy = Fixed(flaky(1, None, &Arc::default()));
        let report = check_identity(&strategy, &EnvConfig::default(), |_| MockSts::default())
            .await
            .unwrap();

        let output = report.to_string();
        assert!(output.contains("Access Key ID: ASIAEXAMPLE\n"));
        assert!(output.contains("Using temporary credentials (has session token)\n"));
        assert!(!output.contains(SECRET));
        assert!(!output.contains("session\n"));
    }

    #[test]
    fn expiry_is_printed() {
        let expires_at = DateTime::parse_from_rfc3339("2026-10-19T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let report = IdentityReport {
            strategy: "test chain",
            identity: CallerIdentity::default(),
            provider: Ok(ProviderMetadata {
                provider_name: "WebIdentityToken".to_owned(),
                access_key_id: "ASIAEXAMPLE".to_owned(),
                has_session_token: true,
                expires_at: Some(expires_at),
            }),
        };

        assert!(report
            .to_string()
            .contains("Credentials expire at: 2026-10-19T12:00:00Z\n"));
    }
}
