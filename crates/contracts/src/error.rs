use ethers::{
    prelude::ContractError,
    providers::{Middleware, MiddlewareError, ProviderError},
};
use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

lazy_static! {
    static ref AA_CODE: Regex = Regex::new(r"\b(AA[0-9]{2})\b").expect("Regex rules valid");
}

/// Failure of an `eth_call` against the EntryPoint or account contracts
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContractCallError {
    #[error("provider error: {inner}")]
    Provider { inner: String },

    #[error("abi error: {inner}")]
    ABI { inner: String },

    /// Return data did not match the binding
    #[error("decode error: {inner}")]
    Decode { inner: String },

    /// Call reverted
    #[error("execution reverted: {inner}")]
    Reverted {
        /// Revert data or reason
        inner: String,
    },

    /// v0.6 SimpleAccount batches carry no per-call value
    #[error("executeBatch on a v0.6 account cannot transfer value")]
    BatchValueUnsupported,

    #[error("other error: {inner}")]
    Other { inner: String },
}

impl ContractCallError {
    pub fn from_provider_error(err: &ProviderError) -> Self {
        match err {
            ProviderError::JsonRpcClientError(err) => match err.as_error_response() {
                Some(err) => Self::Provider { inner: format!("json-rpc error: {err}") },
                None => Self::Provider { inner: format!("json-rpc client error: {err}") },
            },
            ProviderError::HTTPError(err) => Self::Provider { inner: format!("HTTP error: {err}") },
            _ => Self::Provider { inner: format!("unknown provider error: {err:?}") },
        }
    }

    pub fn from_middleware_error<M: Middleware>(err: M::Error) -> Self {
        if let Some(err) = err.as_error_response() {
            return Self::Provider { inner: format!("json-rpc error: {err}") };
        }

        if let Some(err) = err.as_provider_error() {
            return Self::from_provider_error(err);
        }

        Self::Provider { inner: format!("middleware error: {err:?}") }
    }

    pub fn from_contract_error<M: Middleware>(err: ContractError<M>) -> Self {
        match err {
            ContractError::DecodingError(e) => Self::Decode { inner: e.to_string() },
            ContractError::AbiError(e) => Self::ABI { inner: e.to_string() },
            ContractError::MiddlewareError { e } => Self::from_middleware_error::<M>(e),
            ContractError::ProviderError { e } => Self::from_provider_error(&e),
            ContractError::Revert(data) => Self::Reverted { inner: data.to_string() },
            _ => Self::Other { inner: err.to_string() },
        }
    }
}

/// Extracts the EntryPoint validation code (`AA10` .. `AA99`) from an error message
pub fn entry_point_error_code(message: &str) -> Option<String> {
    AA_CODE.captures(message).map(|caps| caps[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_aa_code() {
        assert_eq!(
            entry_point_error_code("FailedOp(0, \"AA21 didn't pay prefund\")"),
            Some("AA21".into())
        );
        assert_eq!(entry_point_error_code("AA95 out of gas"), Some("AA95".into()));
        assert_eq!(entry_point_error_code("execution reverted"), None);
        assert_eq!(entry_point_error_code("AAA21"), None);
    }
}
