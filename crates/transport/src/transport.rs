use crate::{
    endpoint::{EndpointConfig, HttpEndpoint},
    error::{ConfigurationError, TransportError},
    headers::HeaderStore,
    router::RequestRouter,
};
use async_trait::async_trait;
use ethers::providers::{JsonRpcClient, Provider};
use keel_primitives::constants::{
    rpc_methods::{BUNDLER_AND_PAYMASTER, CHAIN_AGNOSTIC},
    transport::POLL_INTERVAL_MS,
};
use serde::{de::DeserializeOwned, Serialize};
use std::{fmt::Debug, sync::Arc, time::Duration};
use tracing::trace;

/// ethers JSON-RPC client that dispatches each call to the endpoint its method is routed to
#[derive(Clone, Debug)]
pub struct RoutedTransport {
    router: Arc<RequestRouter<HttpEndpoint>>,
    headers: HeaderStore,
}

impl RoutedTransport {
    pub fn new(router: RequestRouter<HttpEndpoint>, headers: HeaderStore) -> Self {
        Self { router: Arc::new(router), headers }
    }

    pub fn builder() -> TransportBuilder {
        TransportBuilder::default()
    }

    pub fn router(&self) -> &RequestRouter<HttpEndpoint> {
        &self.router
    }

    /// Handle to the headers sent with every request
    pub fn headers(&self) -> HeaderStore {
        self.headers.clone()
    }

    /// Wraps the transport in an ethers provider
    pub fn into_provider(self) -> Provider<Self> {
        Provider::new(self).interval(Duration::from_millis(POLL_INTERVAL_MS))
    }
}

#[async_trait]
impl JsonRpcClient for RoutedTransport {
    type Error = TransportError;

    async fn request<T, R>(&self, method: &str, params: T) -> Result<R, Self::Error>
    where
        T: Debug + Serialize + Send + Sync,
        R: DeserializeOwned + Send,
    {
        let endpoint = self.router.resolve(method);
        trace!("Routing {method} to {}", endpoint.url());
        endpoint.request(method, params).await
    }
}

/// Builder of [RoutedTransport]
///
/// Routes are consulted in this order: custom routes, bundler/paymaster, chain-agnostic, then
/// the node endpoint as fallback.
#[derive(Clone, Debug, Default)]
pub struct TransportBuilder {
    routes: Vec<(Vec<String>, EndpointConfig)>,
    bundler: Option<EndpointConfig>,
    chain_agnostic: Option<EndpointConfig>,
    node: Option<EndpointConfig>,
    headers: HeaderStore,
}

impl TransportBuilder {
    /// Custom route consulted before the built-in ones
    pub fn route<I, S>(mut self, methods: I, endpoint: EndpointConfig) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.routes.push((methods.into_iter().map(Into::into).collect(), endpoint));
        self
    }

    /// Endpoint serving bundler, paymaster and simulation methods
    pub fn bundler(mut self, endpoint: EndpointConfig) -> Self {
        self.bundler = Some(endpoint);
        self
    }

    /// Endpoint serving chain-agnostic wallet methods
    pub fn chain_agnostic(mut self, endpoint: EndpointConfig) -> Self {
        self.chain_agnostic = Some(endpoint);
        self
    }

    /// Node endpoint, fallback for every method no route claims
    pub fn node(mut self, endpoint: EndpointConfig) -> Self {
        self.node = Some(endpoint);
        self
    }

    /// Injects a shared header store (one is created otherwise)
    pub fn headers(mut self, headers: HeaderStore) -> Self {
        self.headers = headers;
        self
    }

    pub fn build(self) -> Result<RoutedTransport, ConfigurationError> {
        let headers = self.headers;
        let endpoint = |config: EndpointConfig| HttpEndpoint::new(config, headers.clone());

        let mut builder = RequestRouter::builder();
        for (methods, config) in self.routes {
            builder = builder.route(methods, endpoint(config)?);
        }
        if let Some(config) = self.bundler {
            builder = builder.route(BUNDLER_AND_PAYMASTER, endpoint(config)?);
        }
        if let Some(config) = self.chain_agnostic {
            builder = builder.route(CHAIN_AGNOSTIC, endpoint(config)?);
        }
        if let Some(config) = self.node {
            builder = builder.fallback(endpoint(config)?);
        }

        Ok(RoutedTransport::new(builder.build()?, headers))
    }
}
