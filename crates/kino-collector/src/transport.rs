//! Backend transport

use crate::config::CollectorConfig;
use crate::error::{Error, Result};
use crate::licensing::{LicenseRequest, LicenseResponse};
use crate::sample::Sample;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// Timeout of regular backend requests
pub const REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Timeout of the last sample sent while the page unloads
pub const UNLOAD_TIMEOUT_MS: u64 = 1_000;

/// Delivery of samples and license checks to the analytics backend
#[async_trait]
pub trait Transport: Send + Sync {
    async fn check_license(&self, request: &LicenseRequest) -> Result<LicenseResponse>;

    async fn send_sample(&self, sample: &Sample) -> Result<()>;

    /// Send the last sample of a page. Implementations with a fire-and-forget
    /// channel should use it here.
    async fn send_unload_sample(&self, sample: &Sample) -> Result<()> {
        self.send_sample(sample).await
    }
}

/// JSON-over-HTTP transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    analytics_url: Url,
    licensing_url: Url,
}

impl HttpTransport {
    pub fn new(config: &CollectorConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(REQUEST_TIMEOUT_MS))
            .user_agent(concat!("kino-collector/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            analytics_url: config.analytics_url()?,
            licensing_url: config.licensing_url()?,
        })
    }

    pub fn analytics_url(&self) -> &Url {
        &self.analytics_url
    }

    pub fn licensing_url(&self) -> &Url {
        &self.licensing_url
    }

    async fn post_sample(&self, sample: &Sample, timeout: Option<Duration>) -> Result<()> {
        let mut request = self.client.post(self.analytics_url.clone()).json(sample);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::BackendStatus {
                status: status.as_u16(),
            });
        }
        debug!(sequence = sample.sequence_number, "Sample delivered");
        Ok(())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self, request), fields(domain = %request.domain))]
    async fn check_license(&self, request: &LicenseRequest) -> Result<LicenseResponse> {
        let response = self
            .client
            .post(self.licensing_url.clone())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::BackendStatus {
                status: status.as_u16(),
            });
        }

        Ok(response.json().await?)
    }

    async fn send_sample(&self, sample: &Sample) -> Result<()> {
        self.post_sample(sample, None).await
    }

    async fn send_unload_sample(&self, sample: &Sample) -> Result<()> {
        self.post_sample(sample, Some(Duration::from_millis(UNLOAD_TIMEOUT_MS)))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_from_config() {
        let mut config = CollectorConfig::new("key", "example.com");
        config.backend_url = Url::parse("http://localhost:8080/").unwrap();
        let transport = HttpTransport::new(&config).unwrap();

        assert_eq!(transport.analytics_url().as_str(), "http://localhost:8080/analytics");
        assert_eq!(transport.licensing_url().as_str(), "http://localhost:8080/licensing");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_transport_error() {
        let mut config = CollectorConfig::new("key", "example.com");
        // Port 9 (discard) is closed on test machines.
        config.backend_url = Url::parse("http://127.0.0.1:9/").unwrap();
        let transport = HttpTransport::new(&config).unwrap();

        let err = transport
            .check_license(&LicenseRequest::new("key", "example.com"))
            .await
            .unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(err.error_code(), "NETWORK");
    }
}
