use crate::{
    error::{ConfigurationError, TransportError},
    headers::{parse_header, HeaderStore},
    jsonrpc::{normalize_params, Request, Response},
};
use keel_primitives::constants::transport::{RETRY_COUNT, RETRY_DELAY_MS};
use reqwest::{header::HeaderMap, Client, Url};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tracing::{trace, warn};

/// Upstream endpoint settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndpointConfig {
    pub url: String,
    /// Retries after the first attempt (transport failures only)
    pub retry_count: u32,
    pub retry_delay: Duration,
    /// Static headers sent with every request
    pub headers: Vec<(String, String)>,
}

impl EndpointConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            retry_count: RETRY_COUNT,
            retry_delay: Duration::from_millis(RETRY_DELAY_MS),
            headers: Vec::new(),
        }
    }

    pub fn retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    pub fn retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// JSON-RPC over HTTP with per-endpoint retry policy
#[derive(Clone, Debug)]
pub struct HttpEndpoint {
    url: Url,
    client: Client,
    headers: HeaderMap,
    dynamic_headers: HeaderStore,
    retry_count: u32,
    retry_delay: Duration,
    id: Arc<AtomicU64>,
}

impl HttpEndpoint {
    pub fn new(config: EndpointConfig, dynamic_headers: HeaderStore) -> Result<Self, ConfigurationError> {
        let url = Url::parse(&config.url).map_err(|e| ConfigurationError::InvalidUrl {
            url: config.url.clone(),
            inner: e.to_string(),
        })?;

        let mut headers = HeaderMap::new();
        for (name, value) in config.headers.iter() {
            let (name, value) = parse_header(name, value)?;
            headers.insert(name, value);
        }

        let client = Client::builder()
            .build()
            .map_err(|e| ConfigurationError::Client { inner: e.to_string() })?;

        Ok(Self {
            url,
            client,
            headers,
            dynamic_headers,
            retry_count: config.retry_count,
            retry_delay: config.retry_delay,
            id: Arc::new(AtomicU64::new(1)),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Sends a JSON-RPC request, retrying transport failures up to `retry_count` times
    pub async fn request<T, R>(&self, method: &str, params: T) -> Result<R, TransportError>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        let params = normalize_params(serde_json::to_value(params)?);
        let mut attempt = 0;

        loop {
            let id = self.id.fetch_add(1, Ordering::SeqCst);
            let request = Request::new(id, method, &params);

            match self.send(&request).await {
                Ok(result) => return Ok(serde_json::from_value(result)?),
                Err(err) if err.is_retryable() && attempt < self.retry_count => {
                    attempt += 1;
                    warn!(
                        "Request {method} to {} failed ({err}), retrying ({attempt}/{})",
                        self.url, self.retry_count
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn send<T: Serialize>(
        &self,
        request: &Request<'_, T>,
    ) -> Result<serde_json::Value, TransportError> {
        // dynamic headers override static ones of the same name
        let mut headers = self.headers.clone();
        headers.extend(self.dynamic_headers.snapshot());

        let body = serde_json::to_vec(request)?;
        trace!("Sending {} to {}: {}", request.method, self.url, String::from_utf8_lossy(&body));

        let response = self
            .client
            .post(self.url.clone())
            .headers(headers)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        trace!("Response from {} ({status}): {}", self.url, String::from_utf8_lossy(&body));

        if !status.is_success() {
            // upstreams may send JSON-RPC errors with a 4xx or 5xx status
            return match serde_json::from_slice::<Response>(&body) {
                Ok(Response { error: Some(err), .. }) => Err(TransportError::JsonRpc(err)),
                _ => Err(TransportError::Http {
                    status: status.as_u16(),
                    body: String::from_utf8_lossy(&body).into_owned(),
                }),
            };
        }

        let response: Response = serde_json::from_slice(&body)?;
        Ok(response.into_result()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_config_defaults() {
        let config = EndpointConfig::new("http://localhost:3000");
        assert_eq!(config.retry_count, RETRY_COUNT);
        assert_eq!(config.retry_delay, Duration::from_millis(RETRY_DELAY_MS));
        assert!(config.headers.is_empty());
    }

    #[test]
    fn invalid_endpoint_config() {
        assert!(matches!(
            HttpEndpoint::new(EndpointConfig::new("not a url"), HeaderStore::new()),
            Err(ConfigurationError::InvalidUrl { .. })
        ));
        assert!(matches!(
            HttpEndpoint::new(
                EndpointConfig::new("http://localhost:3000").header("bad header", "x"),
                HeaderStore::new()
            ),
            Err(ConfigurationError::InvalidHeader { .. })
        ));
    }
}
