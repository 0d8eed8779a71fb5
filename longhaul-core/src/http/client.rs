//! HTTP client implementation using reqwest

use reqwest::header::HeaderMap;
use reqwest::{Client, ClientBuilder, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::error::map_transport_error;
use super::RequestOptions;
use crate::config::ConnectionConfig;
use crate::providers::ClientError;

/// Maximum response size (generated clips are returned inline by some providers)
const MAX_RESPONSE_SIZE: usize = 64 * 1024 * 1024;

/// Default user agent
const USER_AGENT: &str = concat!("longhaul/", env!("CARGO_PKG_VERSION"));

/// Shared HTTP client with connection pooling
#[derive(Clone)]
pub struct HttpClient {
    /// The underlying reqwest client
    client: Arc<Client>,

    /// Maximum response size to prevent OOM
    max_response_size: usize,
}

/// Status, headers and body of a non-success response
#[derive(Debug)]
pub struct FailedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Option<String>,
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> Result<Self, ClientError> {
        Self::with_config(Duration::from_secs(10), Duration::from_secs(60), 10)
    }

    /// Create a new HTTP client with custom configuration
    pub fn with_config(
        connect_timeout: Duration,
        request_timeout: Duration,
        max_idle_per_host: usize,
    ) -> Result<Self, ClientError> {
        let client = ClientBuilder::new()
            .pool_max_idle_per_host(max_idle_per_host)
            .pool_idle_timeout(Duration::from_secs(90))
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .user_agent(USER_AGENT)
            .gzip(true)
            .build()
            .map_err(|e| ClientError::Custom {
                code: "HTTP_CLIENT".to_string(),
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client: Arc::new(client),
            max_response_size: MAX_RESPONSE_SIZE,
        })
    }

    /// Create a client from the connection section of the configuration
    pub fn from_connection(connection: &ConnectionConfig) -> Result<Self, ClientError> {
        let mut http = Self::with_config(
            Duration::from_millis(connection.connect_timeout_ms),
            Duration::from_millis(connection.request_timeout_ms),
            connection.max_idle_per_host,
        )?;
        http.max_response_size = connection.max_response_bytes;
        Ok(http)
    }

    /// Start building a request
    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client.request(method, url)
    }

    /// Send a request, attaching correlation headers
    ///
    /// Only transport failures are errors here; callers inspect the status
    /// themselves so that each provider can classify its own codes.
    pub async fn send(
        &self,
        provider: &str,
        builder: RequestBuilder,
        options: &RequestOptions,
    ) -> Result<Response, ClientError> {
        let request_id = options.request_id;

        info!(
            "{} call to {} [operation: {}, request_id: {}]",
            options.call_kind,
            provider,
            options.operation_label(),
            request_id
        );

        let mut builder = builder
            .timeout(options.timeout)
            .header("X-Request-ID", request_id.to_string());

        if let Some(ref key) = options.idempotency_key {
            builder = builder.header("Idempotency-Key", key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                warn!("Request timeout for {} [request_id: {}]", provider, request_id);
            } else {
                error!(
                    "Request error for {} [request_id: {}]: {}",
                    provider, request_id, e
                );
            }
            map_transport_error(&e, request_id)
        })?;

        debug!(
            "Response status: {} [request_id: {}]",
            response.status(),
            request_id
        );

        Ok(response)
    }

    /// Drain a non-success response for error mapping
    pub async fn failure(&self, provider: &str, response: Response, options: &RequestOptions) -> FailedResponse {
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await.ok();

        warn!(
            "{} call to {} failed with status {} [operation: {}, request_id: {}]",
            options.call_kind,
            provider,
            status,
            options.operation_label(),
            options.request_id
        );

        FailedResponse {
            status,
            headers,
            body,
        }
    }

    /// Read and parse a JSON body
    pub async fn read_json<T: DeserializeOwned>(
        &self,
        provider: &str,
        response: Response,
        options: &RequestOptions,
    ) -> Result<T, ClientError> {
        let bytes = self.read_bytes(response, options).await?;

        serde_json::from_slice(&bytes).map_err(|e| {
            error!(
                "Failed to parse response from {} [request_id: {}]: {}",
                provider, options.request_id, e
            );
            ClientError::parse(format!(
                "Invalid response format: {} [request_id: {}]",
                e, options.request_id
            ))
        })
    }

    /// Read a raw body, enforcing the size limit
    pub async fn read_bytes(
        &self,
        response: Response,
        options: &RequestOptions,
    ) -> Result<Vec<u8>, ClientError> {
        self.check_content_length(&response, options)?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| map_transport_error(&e, options.request_id))?;

        if bytes.len() > self.max_response_size {
            return Err(self.too_large(bytes.len() as u64, options));
        }

        Ok(bytes.to_vec())
    }

    /// Check response size to prevent OOM
    fn check_content_length(
        &self,
        response: &Response,
        options: &RequestOptions,
    ) -> Result<(), ClientError> {
        match response.content_length() {
            Some(length) if length as usize > self.max_response_size => {
                Err(self.too_large(length, options))
            }
            _ => Ok(()),
        }
    }

    fn too_large(&self, size: u64, options: &RequestOptions) -> ClientError {
        ClientError::Custom {
            code: "RESPONSE_TOO_LARGE".to_string(),
            message: format!(
                "Response size {} exceeds maximum {} [request_id: {}]",
                size, self.max_response_size, options.request_id
            ),
        }
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("max_response_size", &self.max_response_size)
            .finish_non_exhaustive()
    }
}
