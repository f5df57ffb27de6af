//! Stages transforming a partial user operation into a complete one

use crate::{bundler::BundlerClient, error::PipelineError, types::UserOperationOverrides};
use async_trait::async_trait;
use ethers::{providers::Middleware, types::Bytes};
use keel_primitives::{EntryPoint, UserOperationRequest};
use std::sync::Arc;

mod fee;
mod gas;
mod paymaster;
mod simulation;

pub use fee::FeeEstimator;
pub use gas::GasEstimator;
pub use paymaster::{PaymasterMiddleware, PaymasterResponse};
pub use simulation::{AssetChange, SimulationPreview, Simulator};

/// Everything a stage may consult besides the user operation itself
pub struct MiddlewareContext<'a, M: Middleware + 'static> {
    pub bundler: &'a BundlerClient<M>,
    pub entry_point: EntryPoint,
    pub chain_id: u64,
    pub overrides: &'a UserOperationOverrides,
    pub dummy_signature: Bytes,
}

impl<'a, M: Middleware + 'static> MiddlewareContext<'a, M> {
    pub fn eth_client(&self) -> &Arc<M> {
        self.bundler.eth_client()
    }
}

/// A pipeline stage: takes the user operation so far and returns the next version of it
#[async_trait]
pub trait UserOperationMiddleware<M: Middleware + 'static>: Send + Sync {
    async fn process(
        &self,
        uo: UserOperationRequest,
        ctx: &MiddlewareContext<'_, M>,
    ) -> Result<UserOperationRequest, PipelineError>;
}

/// Fee overrides win over whatever a stage produced
pub(crate) fn apply_fee_overrides(
    mut uo: UserOperationRequest,
    overrides: &UserOperationOverrides,
) -> UserOperationRequest {
    if let Some(max_fee_per_gas) = overrides.max_fee_per_gas {
        uo.max_fee_per_gas = Some(max_fee_per_gas);
    }
    if let Some(max_priority_fee_per_gas) = overrides.max_priority_fee_per_gas {
        uo.max_priority_fee_per_gas = Some(max_priority_fee_per_gas);
    }
    uo
}

/// Absolute gas overrides win over whatever a stage produced
pub(crate) fn apply_gas_overrides(
    mut uo: UserOperationRequest,
    overrides: &UserOperationOverrides,
) -> UserOperationRequest {
    if let Some(value) = overrides.call_gas_limit.and_then(|o| o.absolute()) {
        uo.call_gas_limit = Some(value);
    }
    if let Some(value) = overrides.verification_gas_limit.and_then(|o| o.absolute()) {
        uo.verification_gas_limit = Some(value);
    }
    if let Some(value) = overrides.pre_verification_gas.and_then(|o| o.absolute()) {
        uo.pre_verification_gas = Some(value);
    }
    uo
}

/// Caller-supplied stage whose output is still subject to the per-call overrides
pub(crate) struct Overridden<M: Middleware + 'static> {
    inner: Arc<dyn UserOperationMiddleware<M>>,
    apply: fn(UserOperationRequest, &UserOperationOverrides) -> UserOperationRequest,
}

impl<M: Middleware + 'static> Overridden<M> {
    pub(crate) fn fees(inner: Arc<dyn UserOperationMiddleware<M>>) -> Self {
        Self { inner, apply: apply_fee_overrides }
    }

    pub(crate) fn gas(inner: Arc<dyn UserOperationMiddleware<M>>) -> Self {
        Self { inner, apply: apply_gas_overrides }
    }
}

#[async_trait]
impl<M: Middleware + 'static> UserOperationMiddleware<M> for Overridden<M> {
    async fn process(
        &self,
        uo: UserOperationRequest,
        ctx: &MiddlewareContext<'_, M>,
    ) -> Result<UserOperationRequest, PipelineError> {
        let uo = self.inner.process(uo, ctx).await?;
        Ok((self.apply)(uo, ctx.overrides))
    }
}
