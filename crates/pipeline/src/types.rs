use crate::error::PipelineError;
use ethers::types::{Address, Bytes, U256};
use keel_primitives::UserOperation;
use serde::{Deserialize, Serialize};

const BASIS_POINTS: u64 = 10_000;

/// Scales `value` by `multiplier` in basis points
pub fn apply_multiplier(value: U256, multiplier: f64) -> Result<U256, PipelineError> {
    if !multiplier.is_finite() || multiplier < 0.0 {
        return Err(PipelineError::Configuration {
            inner: format!("invalid multiplier {multiplier}"),
        });
    }
    let bps = (multiplier * BASIS_POINTS as f64).round() as u64;
    Ok(value.saturating_mul(U256::from(bps)) / U256::from(BASIS_POINTS))
}

/// A single call executed by the smart account
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Call {
    pub target: Address,
    #[serde(default)]
    pub value: U256,
    #[serde(default)]
    pub data: Bytes,
}

impl Call {
    pub fn new(target: Address, value: U256, data: Bytes) -> Self {
        Self { target, value, data }
    }
}

/// What the user operation should execute
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UserOperationIntent {
    /// Encoded with `execute`
    Single(Call),
    /// Encoded with `executeBatch`, even with a single element
    Batch(Vec<Call>),
}

impl From<Call> for UserOperationIntent {
    fn from(call: Call) -> Self {
        Self::Single(call)
    }
}

impl From<Vec<Call>> for UserOperationIntent {
    fn from(calls: Vec<Call>) -> Self {
        Self::Batch(calls)
    }
}

/// Override of a gas limit
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GasOverride {
    /// Used as is
    Absolute(U256),
    /// Scales the upstream estimate
    Multiplier(f64),
}

impl GasOverride {
    pub fn apply(&self, estimate: U256) -> Result<U256, PipelineError> {
        match self {
            Self::Absolute(value) => Ok(*value),
            Self::Multiplier(multiplier) => apply_multiplier(estimate, *multiplier),
        }
    }

    pub fn absolute(&self) -> Option<U256> {
        match self {
            Self::Absolute(value) => Some(*value),
            Self::Multiplier(_) => None,
        }
    }
}

/// Per-call values taking precedence over every stage
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UserOperationOverrides {
    /// 192-bit nonce key passed to `getNonce`
    pub nonce_key: Option<U256>,
    pub nonce: Option<U256>,
    pub max_fee_per_gas: Option<U256>,
    pub max_priority_fee_per_gas: Option<U256>,
    pub call_gas_limit: Option<GasOverride>,
    pub verification_gas_limit: Option<GasOverride>,
    pub pre_verification_gas: Option<GasOverride>,
    /// Skips sponsorship entirely
    pub paymaster_and_data: Option<Bytes>,
}

impl UserOperationOverrides {
    /// True when every gas limit is fixed and estimation can be skipped
    pub fn has_absolute_gas_limits(&self) -> bool {
        [&self.call_gas_limit, &self.verification_gas_limit, &self.pre_verification_gas]
            .iter()
            .all(|o| o.and_then(|o| o.absolute()).is_some())
    }
}

/// Signed user operation and the optional simulation preview computed for it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuiltUserOperation {
    pub user_operation: UserOperation,
    pub simulation: Option<crate::middleware::SimulationPreview>,
}
