use ethers::providers::{ProviderError, RpcError};
use keel_contracts::{entry_point_error_code, ContractCallError};
use keel_primitives::{UserOperationError, UserOperationHash, WalletError};
use keel_transport::ConfigurationError;
use thiserror::Error;

/// Errors aborting a user operation build (nothing is submitted once one is raised)
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// Invalid client or policy configuration
    #[error("configuration error: {inner}")]
    Configuration { inner: String },

    /// No smart account bound to the client
    #[error("no smart account connected to the client")]
    AccountNotFound,

    /// Paymaster refused to sponsor the user operation
    #[error("sponsorship declined (policy {policy_id:?}, code {code}): {message}")]
    SponsorshipDeclined { policy_id: Option<String>, code: i64, message: String },

    /// Simulation reported a failure (upstream message kept verbatim)
    #[error("simulation failed: {message}")]
    Simulation { message: String },

    /// Base fee or priority fee could not be determined
    #[error("fee estimation failed: {inner}")]
    FeeEstimation { inner: String },

    /// Bundler rejected the user operation during gas estimation
    #[error("gas estimation failed (code {code}): {message}")]
    GasEstimation {
        code: i64,
        message: String,
        /// EntryPoint validation code (e.g. `AA21`) when the message carries one
        entry_point_code: Option<String>,
    },

    /// A gas or fee field was never filled in, or a field does not fit the EntryPoint's layout
    #[error(transparent)]
    IncompleteUserOperation(#[from] UserOperationError),

    /// Calls cannot be encoded
    #[error("invalid intent: {inner}")]
    InvalidIntent { inner: String },

    /// v0.6 SimpleAccount batches carry no per-call value
    #[error("batch with value is not supported by this account")]
    BatchValueUnsupported,

    /// Signer failure
    #[error("signing failed: {inner}")]
    Signing { inner: String },

    /// Transport or upstream failure
    #[error("provider error: {inner}")]
    Provider { inner: String },

    /// Contract call failure
    #[error("contract error: {inner}")]
    Contract { inner: String },

    /// Receipt did not show up within the polling budget
    #[error("no receipt for user operation {hash} after {attempts} attempts")]
    ReceiptTimeout { hash: UserOperationHash, attempts: u32 },
}

impl PipelineError {
    /// Gas estimation failure from a bundler error
    pub fn from_gas_estimation_error(err: ProviderError) -> Self {
        match err.as_error_response() {
            Some(response) => Self::GasEstimation {
                code: response.code,
                message: response.message.clone(),
                entry_point_code: entry_point_error_code(&response.message),
            },
            None => err.into(),
        }
    }
}

impl From<ProviderError> for PipelineError {
    fn from(err: ProviderError) -> Self {
        Self::Provider { inner: err.to_string() }
    }
}

impl From<ContractCallError> for PipelineError {
    fn from(err: ContractCallError) -> Self {
        match err {
            ContractCallError::BatchValueUnsupported => Self::BatchValueUnsupported,
            other => Self::Contract { inner: other.to_string() },
        }
    }
}

impl From<WalletError> for PipelineError {
    fn from(err: WalletError) -> Self {
        Self::Signing { inner: err.to_string() }
    }
}

impl From<ConfigurationError> for PipelineError {
    fn from(err: ConfigurationError) -> Self {
        Self::Configuration { inner: err.to_string() }
    }
}
