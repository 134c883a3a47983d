//! S3 credential discovery
//!
//! Sources are tried in a fixed order and the first usable one wins:
//!
//! 1. static credentials in the address query
//! 2. `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` / `AWS_SESSION_TOKEN`
//! 3. the shared credentials profile (`AWS_PROFILE` or `default`)
//! 4. the instance metadata service
//!
//! Steps 2 and 3 are answered by the `aws-config` providers. Resolution is
//! evaluated per call and never cached.

use std::fmt;

use aws_config::environment::EnvironmentVariableCredentialsProvider;
use aws_config::profile::ProfileFileCredentialsProvider;
use aws_credential_types::provider::ProvideCredentials;

#[derive(Clone, PartialEq, Eq)]
pub struct StaticCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Where the credentials for one request came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    Query(StaticCredentials),
    Environment(StaticCredentials),
    SharedProfile(StaticCredentials),
    /// Nothing static was found; the client asks the metadata service.
    InstanceMetadata { endpoint: String },
}

impl CredentialSource {
    pub fn static_credentials(&self) -> Option<&StaticCredentials> {
        match self {
            CredentialSource::Query(c)
            | CredentialSource::Environment(c)
            | CredentialSource::SharedProfile(c) => Some(c),
            CredentialSource::InstanceMetadata { .. } => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CredentialSource::Query(_) => "query",
            CredentialSource::Environment(_) => "environment",
            CredentialSource::SharedProfile(_) => "shared_profile",
            CredentialSource::InstanceMetadata { .. } => "instance_metadata",
        }
    }
}

/// Pick the credential source for one request from what each step produced.
pub fn resolve_credentials(
    query: Option<StaticCredentials>,
    environment: Option<StaticCredentials>,
    shared_profile: Option<StaticCredentials>,
    metadata_url: &str,
) -> CredentialSource {
    if let Some(creds) = query {
        return CredentialSource::Query(creds);
    }
    if let Some(creds) = environment {
        return CredentialSource::Environment(creds);
    }
    if let Some(creds) = shared_profile {
        return CredentialSource::SharedProfile(creds);
    }
    CredentialSource::InstanceMetadata {
        endpoint: metadata_url.to_string(),
    }
}

/// Run the chain against the process environment and shared profile files.
///
/// Later steps are only consulted when the earlier ones came up empty.
pub async fn discover_credentials(
    query: Option<StaticCredentials>,
    metadata_url: &str,
) -> CredentialSource {
    if query.is_some() {
        return resolve_credentials(query, None, None, metadata_url);
    }

    let environment = load_static(&EnvironmentVariableCredentialsProvider::new()).await;
    if environment.is_some() {
        return resolve_credentials(None, environment, None, metadata_url);
    }

    let profile = ProfileFileCredentialsProvider::builder().build();
    let shared_profile = load_static(&profile).await;
    resolve_credentials(None, None, shared_profile, metadata_url)
}

/// Static keys from `provider`, or `None` when it has nothing to offer.
pub async fn load_static<P>(provider: &P) -> Option<StaticCredentials>
where
    P: ProvideCredentials,
{
    match provider.provide_credentials().await {
        Ok(creds) => Some(StaticCredentials {
            access_key_id: creds.access_key_id().to_string(),
            secret_access_key: creds.secret_access_key().to_string(),
            session_token: creds.session_token().map(str::to_string),
        }),
        Err(e) => {
            tracing::debug!(error = %e, "Credential provider had nothing to offer");
            None
        }
    }
}
