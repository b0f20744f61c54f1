use aws_credential_types::provider::error::CredentialsError;
use aws_sdk_sts::error::DisplayErrorContext;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Fatal failures of an identity check.
#[derive(Debug, Error)]
pub enum Error {
    /// The credential chain could not produce credentials.
    #[error("Failed to resolve credentials with the {strategy}: {}", context(.source))]
    Setup {
        strategy: &'static str,
        #[source]
        source: BoxError,
    },

    /// `GetCallerIdentity` itself failed.
    #[error("Failed to get caller identity with the {strategy}: {}", context(.source))]
    Request {
        strategy: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("Failed to write report: {0}")]
    Output(#[from] std::io::Error),
}

/// Provider details could not be read after a successful identity check.
#[derive(Debug, Error)]
#[error("{}", DisplayErrorContext(.0))]
pub struct MetadataError(#[from] pub CredentialsError);

pub type Result<T> = std::result::Result<T, Error>;

fn context(source: &BoxError) -> String {
    DisplayErrorContext(source.as_ref()).to_string()
}
