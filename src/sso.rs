use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use aws_config::profile::profile_file::ProfileFiles;
use aws_config::BehaviorVersion;
use aws_credential_types::provider::{self, error::CredentialsError, future, ProvideCredentials};
use aws_credential_types::Credentials;
use aws_types::os_shim_internal::{Env, Fs};
use aws_types::region::Region;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sha1::{Digest, Sha1};
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::EnvConfig;

#[derive(Debug, thiserror::Error)]
pub enum SsoProviderError {
    #[error("SSO response is missing required field: {0}")]
    RequiredFieldMissing(&'static str),
}

#[derive(Default)]
struct SsoProviderState {
    sso_config: Option<SsoConfig>,
    cached_token: Option<CachedSsoToken>,
}

/// Credentials from the token that `aws sso login` leaves in `~/.aws/sso/cache`.
#[derive(Clone)]
pub struct SsoProvider {
    env: EnvConfig,
    state: Arc<Mutex<SsoProviderState>>,
}

impl SsoProvider {
    pub fn new(env: EnvConfig) -> Self {
        Self {
            env,
            state: Default::default(),
        }
    }

    async fn load(&self) -> provider::Result {
        let mut state = self.state.lock().await;

        let sso_config = match &state.sso_config {
            Some(sso_config) => sso_config.clone(),
            None => {
                let sso_config = load_sso_config(&self.env).await?;
                state.sso_config = Some(sso_config.clone());
                sso_config
            }
        };

        if state
            .cached_token
            .as_ref()
            .is_some_and(|token| token.expires_at <= Utc::now())
        {
            state.cached_token = None;
        }

        let token = match &state.cached_token {
            Some(token) => token.clone(),
            None => {
                let cache_dir = self.env.home_dir().map(|home| cache_location(&home)).ok_or_else(
                    || CredentialsError::not_loaded("no home directory to find the SSO cache in"),
                )?;
                let token = load_token_file(&cache_dir, &sso_config.sso_start_url)
                    .await
                    .ok_or_else(|| {
                        CredentialsError::not_loaded("no valid SSO token in the cache")
                    })?;
                state.cached_token = Some(token.clone());
                token
            }
        };

        debug!(
            account = %sso_config.sso_account_id,
            role = %sso_config.sso_role_name,
            "requesting SSO role credentials"
        );

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .no_credentials()
            .region(Region::new(sso_config.sso_region.clone()))
            .load()
            .await;
        let client = aws_sdk_sso::Client::new(&sdk_config);

        let output = client
            .get_role_credentials()
            .account_id(&sso_config.sso_account_id)
            .role_name(&sso_config.sso_role_name)
            .access_token(&token.access_token)
            .send()
            .await
            .map_err(CredentialsError::provider_error)?;

        let role_credentials = output
            .role_credentials()
            .ok_or_else(|| CredentialsError::not_loaded("SSO returned no role credentials"))?;

        let required = |value: Option<&str>, field: &'static str| {
            value.map(str::to_owned).ok_or_else(|| {
                CredentialsError::unhandled(SsoProviderError::RequiredFieldMissing(field))
            })
        };

        Ok(Credentials::new(
            required(role_credentials.access_key_id(), "access_key_id")?,
            required(role_credentials.secret_access_key(), "secret_access_key")?,
            Some(required(role_credentials.session_token(), "session_token")?),
            Some(expiration_time(role_credentials.expiration())),
            "Sso",
        ))
    }
}

impl std::fmt::Debug for SsoProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SsoProvider").finish()
    }
}

impl ProvideCredentials for SsoProvider {
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a,
    {
        future::ProvideCredentials::new(self.load())
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CachedSsoToken {
    access_token: String,
    expires_at: DateTime<Utc>,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    start_url: Option<String>,
}

#[derive(Clone, Debug)]
struct SsoConfig {
    sso_account_id: String,
    sso_role_name: String,
    sso_region: String,
    sso_start_url: String,
}

async fn load_sso_config(env: &EnvConfig) -> Result<SsoConfig, CredentialsError> {
    let fs = Fs::real();
    let env = Env::from(env.vars().clone());

    let profile_set = aws_config::profile::load(&fs, &env, &ProfileFiles::default(), None)
        .await
        .map_err(CredentialsError::not_loaded)?;

    if profile_set.is_empty() {
        return Err(CredentialsError::not_loaded("no profiles are configured"));
    }

    let setting = |key: &'static str| {
        profile_set
            .get(key)
            .map(str::to_owned)
            .ok_or_else(|| CredentialsError::not_loaded(format!("profile has no {key}")))
    };

    Ok(SsoConfig {
        sso_account_id: setting("sso_account_id")?,
        sso_role_name: setting("sso_role_name")?,
        sso_region: setting("sso_region")?,
        sso_start_url: setting("sso_start_url")?,
    })
}

async fn load_token_file(cache_dir: &Path, start_url: &str) -> Option<CachedSsoToken> {
    let filename = cache_dir.join(cache_filename(start_url));

    let contents = tokio::fs::read_to_string(&filename).await.ok()?;
    let token = serde_json::from_str::<CachedSsoToken>(&contents)
        .map_err(|err| {
            debug!(file = %filename.display(), error = %err, "unreadable SSO cache entry")
        })
        .ok()?;

    if token.access_token.is_empty() || token.expires_at <= Utc::now() {
        debug!(file = %filename.display(), "SSO token is empty or expired");
        return None;
    }

    if let Some(cached_start_url) = &token.start_url {
        if cached_start_url != start_url {
            return None;
        }
    }

    debug!(region = ?token.region, "using cached SSO token");
    Some(token)
}

fn cache_location(home: &Path) -> PathBuf {
    [home, Path::new(".aws"), Path::new("sso"), Path::new("cache")]
        .into_iter()
        .collect()
}

fn cache_filename(start_url: &str) -> String {
    hex::encode(Sha1::digest(start_url.as_bytes())) + ".json"
}

// GetRoleCredentials reports expiration in epoch milliseconds.
fn expiration_time(expiration_millis: i64) -> SystemTime {
    UNIX_EPOCH + Duration::from_millis(expiration_millis.max(0) as u64)
}
