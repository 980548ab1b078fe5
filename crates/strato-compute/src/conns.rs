//! Connection context and the per-service client cache.
//!
//! One [`CloudClient`] is built per session from [`ConnectionSettings`] and
//! shared by every reconciliation running against that endpoint. Service
//! clients are materialized lazily through [`ServiceCache`], which guarantees
//! at most one construction per service no matter how many reconciliations
//! race on first use.

use crate::instance::ComputeClient;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_ec2::config::Credentials;
use aws_smithy_runtime::client::http::hyper_014::HyperClientBuilder;
use std::fmt;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::debug;

/// Connection parameters for one remote compute deployment.
#[derive(Clone)]
pub struct ConnectionSettings {
    /// Compute API endpoint URL, e.g. `https://compute.internal:8773`.
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    /// Accept any server certificate. Self-hosted deployments frequently run
    /// the API behind a certificate no public root signs.
    pub insecure_skip_tls: bool,
}

impl fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("region", &self.region)
            .field("insecure_skip_tls", &self.insecure_skip_tls)
            .finish()
    }
}

/// Failure to build the connection context. Fatal to the session; never
/// retried.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("invalid compute endpoint {endpoint:?}: {source}")]
    InvalidEndpoint {
        endpoint: String,
        #[source]
        source: url::ParseError,
    },
    #[error("compute endpoint {endpoint:?} must use http or https")]
    UnsupportedScheme { endpoint: String },
}

/// Lazily-initialized holder for a per-service client.
///
/// Readers take the shared lock; the first caller to find the slot empty
/// upgrades to the exclusive lock and re-checks before constructing, so two
/// callers that both observed "absent" cannot both construct.
pub struct ServiceCache<T> {
    slot: RwLock<Option<T>>,
}

impl<T: Clone> ServiceCache<T> {
    pub fn new() -> Self {
        Self {
            slot: RwLock::new(None),
        }
    }

    /// Return the cached value, constructing it with `build` on first use.
    pub fn get_or_init(&self, build: impl FnOnce() -> T) -> T {
        if let Some(existing) = self.slot.read().unwrap().as_ref() {
            return existing.clone();
        }
        let mut slot = self.slot.write().unwrap();
        if let Some(existing) = slot.as_ref() {
            return existing.clone();
        }
        let value = build();
        *slot = Some(value.clone());
        value
    }
}

impl<T: Clone> Default for ServiceCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

struct ClientInner {
    config: SdkConfig,
    endpoint: String,
    compute: ServiceCache<aws_sdk_ec2::Client>,
}

/// Authenticated connection context for one compute deployment.
///
/// Cheap to clone; all clones share the same SDK config and service cache.
/// Service clients live for the process lifetime once built.
#[derive(Clone)]
pub struct CloudClient {
    inner: Arc<ClientInner>,
}

impl CloudClient {
    /// Build the connection context: static credentials, the custom
    /// endpoint, and optionally a TLS layer that skips certificate
    /// verification.
    pub async fn connect(settings: ConnectionSettings) -> Result<Self, ConnectError> {
        let parsed =
            url::Url::parse(&settings.endpoint).map_err(|source| ConnectError::InvalidEndpoint {
                endpoint: settings.endpoint.clone(),
                source,
            })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConnectError::UnsupportedScheme {
                endpoint: settings.endpoint.clone(),
            });
        }

        let credentials = Credentials::new(
            settings.access_key.clone(),
            settings.secret_key.clone(),
            None,
            None,
            "strato-settings",
        );

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .endpoint_url(settings.endpoint.clone())
            .region(Region::new(settings.region.clone()))
            .credentials_provider(credentials);

        if settings.insecure_skip_tls {
            // TLS layer that accepts any server certificate.
            let tls = rustls::ClientConfig::builder()
                .with_safe_defaults()
                .with_custom_certificate_verifier(Arc::new(DisabledCertVerification))
                .with_no_client_auth();
            let connector = hyper_rustls::HttpsConnectorBuilder::new()
                .with_tls_config(tls)
                .https_or_http()
                .enable_http1()
                .build();
            loader = loader.http_client(HyperClientBuilder::new().build(connector));
        }

        let config = loader.load().await;
        debug!(
            endpoint = %settings.endpoint,
            region = %settings.region,
            insecure_skip_tls = settings.insecure_skip_tls,
            "compute connection context ready"
        );

        Ok(Self {
            inner: Arc::new(ClientInner {
                config,
                endpoint: settings.endpoint,
                compute: ServiceCache::new(),
            }),
        })
    }

    /// The underlying SDK config, for direct client construction.
    pub fn sdk_config(&self) -> &SdkConfig {
        &self.inner.config
    }

    /// The cached compute-service client. The first call constructs it; every
    /// later call, from any clone on any thread, hands back the same client.
    pub fn compute(&self) -> ComputeClient {
        let client = self
            .inner
            .compute
            .get_or_init(|| aws_sdk_ec2::Client::new(&self.inner.config));
        ComputeClient::new(client)
    }
}

impl fmt::Debug for CloudClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudClient")
            .field("endpoint", &self.inner.endpoint)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
struct DisabledCertVerification;

impl rustls::client::ServerCertVerifier for DisabledCertVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::Certificate,
        _intermediates: &[rustls::Certificate],
        _server_name: &rustls::ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: std::time::SystemTime,
    ) -> Result<rustls::client::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::ServerCertVerified::assertion())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;

    fn settings(endpoint: &str) -> ConnectionSettings {
        ConnectionSettings {
            endpoint: endpoint.to_string(),
            access_key: "AK".to_string(),
            secret_key: "SK".to_string(),
            region: "default".to_string(),
            insecure_skip_tls: false,
        }
    }

    #[test]
    fn cache_constructs_once_under_contention() {
        let cache = ServiceCache::<Arc<u32>>::new();
        let constructions = AtomicUsize::new(0);
        let callers = 16;
        let barrier = Barrier::new(callers);

        let handles: Vec<Arc<u32>> = std::thread::scope(|scope| {
            let mut joins = Vec::new();
            for _ in 0..callers {
                joins.push(scope.spawn(|| {
                    barrier.wait();
                    cache.get_or_init(|| {
                        constructions.fetch_add(1, Ordering::SeqCst);
                        Arc::new(7)
                    })
                }));
            }
            joins.into_iter().map(|j| j.join().unwrap()).collect()
        });

        assert_eq!(constructions.load(Ordering::SeqCst), 1);
        for handle in &handles {
            assert!(Arc::ptr_eq(handle, &handles[0]));
        }
    }

    #[test]
    fn cache_fast_path_skips_constructor() {
        let cache = ServiceCache::new();
        let first = cache.get_or_init(|| Arc::new(1));
        let second = cache.get_or_init(|| unreachable!("already initialized"));
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn connect_rejects_malformed_endpoint() {
        let err = CloudClient::connect(settings("not a url"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectError::InvalidEndpoint { .. }));
    }

    #[tokio::test]
    async fn connect_rejects_non_http_scheme() {
        let err = CloudClient::connect(settings("ftp://compute.internal"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectError::UnsupportedScheme { .. }));
    }

    #[tokio::test]
    async fn connect_records_endpoint_and_region() {
        let client = CloudClient::connect(settings("http://compute.internal:8773"))
            .await
            .unwrap();
        assert_eq!(
            client.sdk_config().endpoint_url(),
            Some("http://compute.internal:8773")
        );
        assert_eq!(
            client.sdk_config().region().map(|r| r.as_ref()),
            Some("default")
        );
        // Clones share the compute cache.
        let _ = client.clone().compute();
        let _ = client.compute();
    }

    #[test]
    fn settings_debug_redacts_secret_key() {
        let rendered = format!("{:?}", settings("http://compute.internal"));
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("SK"));
    }
}
