//! REST client for the control daemon.

use podwire_common::config::PluginConfig;
use podwire_common::error::{PodwireError, Result};
use podwire_common::types::{EndpointId, PodIdentity};
use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};

use super::models::{
    Allocation, AllocationResponse, ConfigResponse, DaemonConfig, EndpointDescriptor,
};
use super::{DaemonApi, RemovalClass, RemovalError};

/// Blocking HTTP client rooted at the daemon API base URL.
#[derive(Debug, Clone)]
pub struct HttpDaemonClient {
    client: Client,
    base_url: String,
}

impl HttpDaemonClient {
    /// Builds a client and checks that the daemon answers.
    ///
    /// # Errors
    ///
    /// Returns `PodwireError::DaemonUnavailable` if the client cannot be
    /// built or the health probe fails.
    pub fn connect(config: &PluginConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| unavailable(format!("unable to build HTTP client: {e}")))?;
        let this = Self {
            client,
            base_url: config.daemon_url.clone(),
        };

        let url = this.url("healthz");
        let response = this
            .client
            .get(&url)
            .send()
            .map_err(|e| unavailable(format!("unable to connect to daemon at {url}: {e}")))?;
        if !response.status().is_success() {
            return Err(unavailable(format!(
                "daemon health check returned HTTP {}",
                response.status()
            )));
        }
        tracing::debug!(url = %this.base_url, "connected to daemon");
        Ok(this)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }
}

impl DaemonApi for HttpDaemonClient {
    fn get_config(&self) -> Result<DaemonConfig> {
        let response = self
            .client
            .get(self.url("config"))
            .send()
            .map_err(|e| unavailable(format!("unable to retrieve configuration: {e}")))?;
        let response = ensure_success(response, unavailable)?;
        let body: ConfigResponse = response
            .json()
            .map_err(|e| unavailable(format!("unreadable configuration: {e}")))?;
        body.status
            .ok_or_else(|| unavailable("did not receive configuration from daemon"))
    }

    fn allocate_address(&self, pod: &PodIdentity) -> Result<Allocation> {
        let owner = pod.owner();
        let response = self
            .client
            .post(self.url("ipam"))
            .query(&[("owner", owner.as_str())])
            .send()
            .map_err(|e| allocation(format!("address allocation request failed: {e}")))?;
        let response = ensure_success(response, allocation)?;
        let body: AllocationResponse = response
            .json()
            .map_err(|e| allocation(format!("unreadable allocation response: {e}")))?;
        let address = body
            .address
            .ok_or_else(|| allocation("invalid allocation response, missing addressing"))?;
        tracing::debug!(%owner, ipv4 = %address.ipv4, ipv6 = %address.ipv6, "allocated addresses");
        Ok(Allocation {
            address,
            host_addressing: body.host_addressing.unwrap_or_default(),
        })
    }

    fn release_address(&self, ip: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.url(&format!("ipam/{ip}")))
            .send()
            .map_err(|e| allocation(format!("address release request failed: {e}")))?;
        let _response = ensure_success(response, allocation)?;
        Ok(())
    }

    fn register_endpoint(&self, id: &EndpointId, descriptor: &EndpointDescriptor) -> Result<()> {
        let response = self
            .client
            .put(self.url(&format!("endpoint/{id}")))
            .json(descriptor)
            .send()
            .map_err(|e| registration(format!("endpoint request failed: {e}")))?;
        let _response = ensure_success(response, registration)?;
        Ok(())
    }

    fn remove_endpoint(&self, id: &EndpointId) -> std::result::Result<(), RemovalError> {
        let response = self
            .client
            .delete(self.url(&format!("endpoint/{id}")))
            .send()
            .map_err(|e| RemovalError::recoverable(format!("endpoint removal request failed: {e}")))?;
        let status = response.status();
        match classify_removal(status) {
            None => Ok(()),
            Some(classification) => Err(RemovalError {
                classification,
                message: format!("endpoint {id} removal returned HTTP {status}: {}", body_text(response)),
            }),
        }
    }
}

/// Classifies the status of a `DELETE /endpoint` answer.
///
/// Returns `None` for a clean removal.
#[must_use]
pub fn classify_removal(status: StatusCode) -> Option<RemovalClass> {
    match status {
        StatusCode::PARTIAL_CONTENT
        | StatusCode::BAD_REQUEST
        | StatusCode::NOT_FOUND => Some(RemovalClass::Terminal),
        StatusCode::TOO_MANY_REQUESTS => Some(RemovalClass::Recoverable),
        s if s.is_success() => None,
        s if s.is_client_error() => Some(RemovalClass::Terminal),
        _ => Some(RemovalClass::Recoverable),
    }
}

fn ensure_success(response: Response, err: fn(String) -> PodwireError) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    Err(err(format!("daemon returned HTTP {status}: {}", body_text(response))))
}

fn body_text(response: Response) -> String {
    response
        .text()
        .map(|t| t.trim().to_string())
        .unwrap_or_default()
}

fn unavailable(message: impl Into<String>) -> PodwireError {
    PodwireError::DaemonUnavailable {
        message: message.into(),
    }
}

fn allocation(message: impl Into<String>) -> PodwireError {
    PodwireError::Allocation {
        message: message.into(),
    }
}

fn registration(message: impl Into<String>) -> PodwireError {
    PodwireError::Registration {
        message: message.into(),
    }
}
