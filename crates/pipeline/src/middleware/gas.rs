use super::{apply_gas_overrides, MiddlewareContext, UserOperationMiddleware};
use crate::{
    error::PipelineError,
    types::{GasOverride, UserOperationOverrides},
};
use async_trait::async_trait;
use ethers::{providers::Middleware, types::U256};
use keel_primitives::{
    pack_paymaster_data, unpack_paymaster_data, EntryPointVersion, UserOperationGasEstimation,
    UserOperationRequest,
};
use tracing::debug;

/// Fills the gas limits from `eth_estimateUserOperationGas`, honouring gas overrides
#[derive(Clone, Copy, Debug, Default)]
pub struct GasEstimator;

impl GasEstimator {
    /// Merges an estimate into the user operation; overrides take precedence
    pub fn apply_estimate(
        mut uo: UserOperationRequest,
        estimate: &UserOperationGasEstimation,
        version: EntryPointVersion,
        overrides: &UserOperationOverrides,
    ) -> Result<UserOperationRequest, PipelineError> {
        let pick = |o: Option<GasOverride>, estimate: U256| match o {
            Some(o) => o.apply(estimate),
            None => Ok(estimate),
        };

        uo.call_gas_limit = Some(pick(overrides.call_gas_limit, estimate.call_gas_limit)?);
        uo.verification_gas_limit =
            Some(pick(overrides.verification_gas_limit, estimate.verification_gas_limit)?);
        uo.pre_verification_gas =
            Some(pick(overrides.pre_verification_gas, estimate.pre_verification_gas)?);

        // v0.7 carries the paymaster limits inside paymasterAndData
        if version == EntryPointVersion::V07 {
            if let Some((paymaster, verification_gas_limit, post_op_gas_limit, data)) =
                unpack_paymaster_data(&uo.paymaster_and_data)?
            {
                uo.paymaster_and_data = pack_paymaster_data(
                    paymaster,
                    estimate.paymaster_verification_gas_limit.unwrap_or(verification_gas_limit),
                    estimate.paymaster_post_op_gas_limit.unwrap_or(post_op_gas_limit),
                    &data,
                )?
                .into();
            }
        }

        Ok(uo)
    }
}

#[async_trait]
impl<M: Middleware + 'static> UserOperationMiddleware<M> for GasEstimator {
    async fn process(
        &self,
        mut uo: UserOperationRequest,
        ctx: &MiddlewareContext<'_, M>,
    ) -> Result<UserOperationRequest, PipelineError> {
        if ctx.overrides.has_absolute_gas_limits() {
            debug!("Gas limits fully overridden, skipping estimation");
            return Ok(apply_gas_overrides(uo, ctx.overrides));
        }

        if uo.signature.is_none() {
            uo.signature = Some(ctx.dummy_signature.clone());
        }

        let estimate = ctx
            .bundler
            .estimate_user_operation_gas(&uo, &ctx.entry_point)
            .await
            .map_err(PipelineError::from_gas_estimation_error)?;
        debug!("Gas estimate: {estimate:?}");

        Self::apply_estimate(uo, &estimate, ctx.entry_point.version, ctx.overrides)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::{Address, Bytes};

    fn estimate() -> UserOperationGasEstimation {
        UserOperationGasEstimation {
            pre_verification_gas: 44_056.into(),
            verification_gas_limit: 60_624.into(),
            call_gas_limit: 33_100.into(),
            paymaster_verification_gas_limit: Some(100_000.into()),
            paymaster_post_op_gas_limit: Some(50_000.into()),
        }
    }

    #[test]
    fn overrides_win_over_estimate() {
        let overrides = UserOperationOverrides {
            call_gas_limit: Some(GasOverride::Absolute(1.into())),
            verification_gas_limit: Some(GasOverride::Multiplier(2.0)),
            ..Default::default()
        };
        let uo = GasEstimator::apply_estimate(
            UserOperationRequest::default(),
            &estimate(),
            EntryPointVersion::V06,
            &overrides,
        )
        .unwrap();

        assert_eq!(uo.call_gas_limit, Some(1.into()));
        assert_eq!(uo.verification_gas_limit, Some(121_248.into()));
        assert_eq!(uo.pre_verification_gas, Some(44_056.into()));
    }

    #[test]
    fn v07_paymaster_limits_are_packed() {
        let paymaster = Address::repeat_byte(0x33);
        let data = Bytes::from(vec![0xde, 0xad]);
        let uo = UserOperationRequest {
            paymaster_and_data: pack_paymaster_data(paymaster, 1.into(), 1.into(), &data)
                .unwrap()
                .into(),
            ..Default::default()
        };

        let uo = GasEstimator::apply_estimate(
            uo,
            &estimate(),
            EntryPointVersion::V07,
            &UserOperationOverrides::default(),
        )
        .unwrap();
        assert_eq!(
            unpack_paymaster_data(&uo.paymaster_and_data).unwrap(),
            Some((paymaster, 100_000.into(), 50_000.into(), data))
        );
    }

    #[test]
    fn v06_paymaster_and_data_untouched() {
        let uo = UserOperationRequest {
            paymaster_and_data: Bytes::from(vec![0x33; 24]),
            ..Default::default()
        };
        let uo = GasEstimator::apply_estimate(
            uo,
            &estimate(),
            EntryPointVersion::V06,
            &UserOperationOverrides::default(),
        )
        .unwrap();
        assert_eq!(uo.paymaster_and_data, Bytes::from(vec![0x33; 24]));
    }
}
