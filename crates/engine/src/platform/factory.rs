//! Builds platform clients from credentials.

use std::sync::Arc;

use marketsync_core::{
    CredentialError, PlatformConnection, PlatformCredentials, PlatformType, RawCredentials,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use super::{MomoClient, PlatformAdapter, ShopeeClient, ShoplineClient};
use crate::config::{PlatformEndpoint, SyncConfig};
use crate::http::{HttpTransport, RateLimiter, ReqwestTransport, RequestExecutor, TransportError};

/// Source of platform clients for the sync service.
///
/// The service asks for one client per connection per run; implementations
/// must fail before any network call if the connection's credentials are
/// incomplete.
pub trait ClientFactory: Send + Sync {
    /// Build a client for `connection` whose requests stop when `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns `CredentialError` if the stored credentials are incomplete or
    /// the platform has no client.
    fn client_for(
        &self,
        connection: &PlatformConnection,
        cancel: &CancellationToken,
    ) -> Result<Arc<dyn PlatformAdapter>, CredentialError>;
}

/// Creates a [`PlatformAdapter`] for validated credentials.
///
/// Every client gets its own [`RateLimiter`] sized from the platform's
/// [`PlatformEndpoint`], and they all share one HTTP transport.
pub struct PlatformClientFactory {
    transport: Arc<dyn HttpTransport>,
    config: SyncConfig,
}

impl PlatformClientFactory {
    #[must_use]
    pub fn new(transport: Arc<dyn HttpTransport>, config: SyncConfig) -> Self {
        Self { transport, config }
    }

    /// Factory backed by a `reqwest` client using `config.http_timeout`.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if the HTTP client cannot be built.
    pub fn from_config(config: SyncConfig) -> Result<Self, TransportError> {
        let transport = ReqwestTransport::new(config.http_timeout)?;
        Ok(Self::new(Arc::new(transport), config))
    }

    #[must_use]
    pub const fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Build a client for `credentials`.
    ///
    /// # Errors
    ///
    /// Returns `CredentialError::MissingFields` if a required field is blank.
    pub fn create(
        &self,
        credentials: PlatformCredentials,
    ) -> Result<Arc<dyn PlatformAdapter>, CredentialError> {
        self.create_with_cancellation(credentials, CancellationToken::new())
    }

    /// Build a client whose requests are aborted when `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns `CredentialError::MissingFields` if a required field is blank.
    #[instrument(skip_all, fields(platform = %credentials.platform()))]
    pub fn create_with_cancellation(
        &self,
        credentials: PlatformCredentials,
        cancel: CancellationToken,
    ) -> Result<Arc<dyn PlatformAdapter>, CredentialError> {
        credentials.validate()?;

        let client: Arc<dyn PlatformAdapter> = match credentials {
            PlatformCredentials::Shopee(c) => {
                let endpoint = &self.config.shopee;
                Arc::new(ShopeeClient::new(
                    c,
                    endpoint.base_url.clone(),
                    self.executor(PlatformType::Shopee, endpoint, cancel),
                ))
            }
            PlatformCredentials::Momo(c) => {
                let endpoint = &self.config.momo;
                Arc::new(MomoClient::new(
                    c,
                    endpoint.base_url.clone(),
                    self.executor(PlatformType::Momo, endpoint, cancel),
                ))
            }
            PlatformCredentials::Shopline(c) => {
                let endpoint = &self.config.shopline;
                Arc::new(ShoplineClient::new(
                    c,
                    endpoint.base_url.clone(),
                    self.executor(PlatformType::Shopline, endpoint, cancel),
                ))
            }
        };

        debug!("Platform client created");
        Ok(client)
    }

    /// Validate a loose credential bag and build a client for it.
    ///
    /// # Errors
    ///
    /// Returns `CredentialError` naming the platform's missing fields, or
    /// the platform itself if it has no client.
    pub fn create_from_raw(
        &self,
        raw: RawCredentials,
    ) -> Result<Arc<dyn PlatformAdapter>, CredentialError> {
        self.create(PlatformCredentials::try_from(raw)?)
    }

    fn executor(
        &self,
        platform: PlatformType,
        endpoint: &PlatformEndpoint,
        cancel: CancellationToken,
    ) -> RequestExecutor {
        RequestExecutor::new(
            platform,
            Arc::clone(&self.transport),
            RateLimiter::new(endpoint.rate_limit),
            self.config.retry,
        )
        .with_cancellation(cancel)
    }
}

impl ClientFactory for PlatformClientFactory {
    fn client_for(
        &self,
        connection: &PlatformConnection,
        cancel: &CancellationToken,
    ) -> Result<Arc<dyn PlatformAdapter>, CredentialError> {
        let credentials = PlatformCredentials::try_from(RawCredentials::from_connection(connection))?;
        self.create_with_cancellation(credentials, cancel.clone())
    }
}

impl std::fmt::Debug for PlatformClientFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformClientFactory")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Check that `credentials` can talk to their platform.
///
/// Never fails: incomplete credentials, rejected credentials and network
/// errors all come back as `(false, Some(reason))`.
pub async fn test_platform_connection(
    factory: &PlatformClientFactory,
    credentials: RawCredentials,
) -> (bool, Option<String>) {
    let client = match factory.create_from_raw(credentials) {
        Ok(client) => client,
        Err(err) => return (false, Some(err.to_string())),
    };

    match client.test_connection().await {
        Ok(true) => (true, None),
        Ok(false) => (
            false,
            Some(format!("{} rejected the credentials", client.platform())),
        ),
        Err(err) => {
            warn!(platform = %client.platform(), error = %err, "Connection test failed");
            (false, Some(err.to_string()))
        }
    }
}
