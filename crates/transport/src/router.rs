//! Method-name based request routing

use crate::error::ConfigurationError;
use keel_primitives::constants::rpc_methods::{BUNDLER_AND_PAYMASTER, CHAIN_AGNOSTIC};
use std::collections::HashSet;

/// Set of methods served by one endpoint
#[derive(Clone, Debug)]
pub struct Route<E> {
    methods: HashSet<String>,
    endpoint: E,
}

impl<E> Route<E> {
    pub fn new<I, S>(methods: I, endpoint: E) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { methods: methods.into_iter().map(Into::into).collect(), endpoint }
    }

    pub fn serves(&self, method: &str) -> bool {
        self.methods.contains(method)
    }

    pub fn endpoint(&self) -> &E {
        &self.endpoint
    }
}

/// Routes JSON-RPC methods to endpoints
///
/// Routes are scanned in the order they were added and the first route claiming the method
/// wins. Methods no route claims go to the fallback. Overlapping routes are allowed; the later
/// claim is simply never reached.
#[derive(Clone, Debug)]
pub struct RequestRouter<E> {
    routes: Vec<Route<E>>,
    fallback: E,
}

impl<E> RequestRouter<E> {
    pub fn builder() -> RouterBuilder<E> {
        RouterBuilder::default()
    }

    /// Two-tier split: bundler and paymaster methods to `tier1`, chain-agnostic wallet methods
    /// to `tier2`, everything else to `fallback`
    pub fn split(tier1: E, tier2: E, fallback: E) -> Self {
        Self {
            routes: vec![Route::new(BUNDLER_AND_PAYMASTER, tier1), Route::new(CHAIN_AGNOSTIC, tier2)],
            fallback,
        }
    }

    /// Endpoint that serves `method`
    pub fn resolve(&self, method: &str) -> &E {
        self.routes
            .iter()
            .find(|route| route.serves(method))
            .map(Route::endpoint)
            .unwrap_or(&self.fallback)
    }

    pub fn routes(&self) -> &[Route<E>] {
        &self.routes
    }

    pub fn fallback(&self) -> &E {
        &self.fallback
    }
}

/// Builder of [RequestRouter]
#[derive(Debug)]
pub struct RouterBuilder<E> {
    routes: Vec<Route<E>>,
    fallback: Option<E>,
}

impl<E> Default for RouterBuilder<E> {
    fn default() -> Self {
        Self { routes: Vec::new(), fallback: None }
    }
}

impl<E> RouterBuilder<E> {
    /// Appends a route; earlier routes take precedence
    pub fn route<I, S>(mut self, methods: I, endpoint: E) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.routes.push(Route::new(methods, endpoint));
        self
    }

    /// Appends a tier of routes, consulted after every route added before it
    pub fn tier(mut self, routes: impl IntoIterator<Item = Route<E>>) -> Self {
        self.routes.extend(routes);
        self
    }

    pub fn fallback(mut self, endpoint: E) -> Self {
        self.fallback = Some(endpoint);
        self
    }

    pub fn build(self) -> Result<RequestRouter<E>, ConfigurationError> {
        let fallback = self.fallback.ok_or(ConfigurationError::MissingFallback)?;
        Ok(RequestRouter { routes: self.routes, fallback })
    }
}
