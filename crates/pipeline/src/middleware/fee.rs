use super::{MiddlewareContext, UserOperationMiddleware};
use crate::{
    config::{FeePolicy, FeeRule},
    error::PipelineError,
    types::apply_multiplier,
};
use async_trait::async_trait;
use ethers::{
    providers::Middleware,
    types::{BlockNumber, U256},
};
use keel_primitives::UserOperationRequest;
use tracing::debug;

/// Fills `maxFeePerGas` and `maxPriorityFeePerGas` from the latest base fee and the bundler's
/// priority fee oracle
#[derive(Clone, Debug, Default)]
pub struct FeeEstimator {
    policy: FeePolicy,
}

impl FeeEstimator {
    pub fn new(policy: FeePolicy) -> Self {
        Self { policy }
    }

    pub fn priority_fee(&self, oracle: U256) -> Result<U256, PipelineError> {
        match self.policy.max_priority_fee_per_gas {
            FeeRule::Fixed(value) => Ok(value),
            FeeRule::Multiplier(multiplier) => apply_multiplier(oracle, multiplier),
            FeeRule::Upstream => Ok(oracle),
        }
    }

    pub fn max_fee(&self, base_fee: U256, priority_fee: U256) -> Result<U256, PipelineError> {
        match self.policy.max_fee_per_gas {
            FeeRule::Fixed(value) => Ok(value),
            FeeRule::Multiplier(multiplier) => {
                Ok(apply_multiplier(base_fee, multiplier)?.saturating_add(priority_fee))
            }
            FeeRule::Upstream => Ok(base_fee.saturating_add(priority_fee)),
        }
    }

    async fn base_fee<M: Middleware + 'static>(
        ctx: &MiddlewareContext<'_, M>,
    ) -> Result<U256, PipelineError> {
        let block = ctx
            .eth_client()
            .get_block(BlockNumber::Latest)
            .await
            .map_err(|err| PipelineError::FeeEstimation { inner: err.to_string() })?
            .ok_or(PipelineError::FeeEstimation { inner: "No block found".into() })?;
        block.base_fee_per_gas.ok_or(PipelineError::FeeEstimation { inner: "No base fee".into() })
    }

    async fn oracle_priority_fee<M: Middleware + 'static>(
        ctx: &MiddlewareContext<'_, M>,
    ) -> Result<U256, PipelineError> {
        ctx.bundler
            .max_priority_fee_per_gas()
            .await
            .map_err(|err| PipelineError::FeeEstimation { inner: err.to_string() })
    }
}

#[async_trait]
impl<M: Middleware + 'static> UserOperationMiddleware<M> for FeeEstimator {
    async fn process(
        &self,
        mut uo: UserOperationRequest,
        ctx: &MiddlewareContext<'_, M>,
    ) -> Result<UserOperationRequest, PipelineError> {
        let overrides = ctx.overrides;
        if let (Some(max_fee), Some(priority_fee)) =
            (overrides.max_fee_per_gas, overrides.max_priority_fee_per_gas)
        {
            uo.max_fee_per_gas = Some(max_fee);
            uo.max_priority_fee_per_gas = Some(priority_fee);
            return Ok(uo);
        }

        let (base_fee, oracle) =
            tokio::try_join!(Self::base_fee(ctx), Self::oracle_priority_fee(ctx))?;

        let priority_fee = match overrides.max_priority_fee_per_gas {
            Some(priority_fee) => priority_fee,
            None => self.priority_fee(oracle)?,
        };
        let max_fee = match overrides.max_fee_per_gas {
            Some(max_fee) => max_fee,
            None => self.max_fee(base_fee, priority_fee)?,
        };
        debug!("Fees: base {base_fee}, oracle {oracle}, max fee {max_fee}, priority fee {priority_fee}");

        uo.max_fee_per_gas = Some(max_fee);
        uo.max_priority_fee_per_gas = Some(priority_fee);
        Ok(uo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimator(max_fee: FeeRule, priority_fee: FeeRule) -> FeeEstimator {
        FeeEstimator::new(FeePolicy { max_fee_per_gas: max_fee, max_priority_fee_per_gas: priority_fee })
    }

    #[test]
    fn upstream_rules() {
        let fee = estimator(FeeRule::Upstream, FeeRule::Upstream);
        let priority = fee.priority_fee(2.into()).unwrap();
        assert_eq!(priority, U256::from(2));
        assert_eq!(fee.max_fee(60.into(), priority).unwrap(), U256::from(62));
    }

    #[test]
    fn multiplier_rules() {
        let fee = estimator(FeeRule::Multiplier(1.5), FeeRule::Multiplier(2.0));
        let priority = fee.priority_fee(3.into()).unwrap();
        assert_eq!(priority, U256::from(6));
        assert_eq!(fee.max_fee(60.into(), priority).unwrap(), U256::from(96));
    }

    #[test]
    fn fixed_rules() {
        let fee = estimator(FeeRule::Fixed(1_000.into()), FeeRule::Fixed(7.into()));
        assert_eq!(fee.priority_fee(3.into()).unwrap(), U256::from(7));
        assert_eq!(fee.max_fee(60.into(), 7.into()).unwrap(), U256::from(1_000));
    }
}
