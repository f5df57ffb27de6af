//! JSON-RPC transport for account abstraction clients
//!
//! A [RoutedTransport] sends every call to the upstream its method is routed to: bundler and
//! paymaster methods to the bundler endpoint, chain-agnostic wallet methods to their own
//! endpoint and everything else to the node.

mod endpoint;
mod error;
mod headers;
mod jsonrpc;
mod router;
mod transport;

pub use endpoint::{EndpointConfig, HttpEndpoint};
pub use error::{ConfigurationError, TransportError};
pub use headers::HeaderStore;
pub use router::{RequestRouter, Route, RouterBuilder};
pub use transport::{RoutedTransport, TransportBuilder};
