use super::{
    apply_fee_overrides, apply_gas_overrides, GasEstimator, MiddlewareContext, Overridden,
    UserOperationMiddleware,
};
use crate::{
    config::{Erc20Context, SponsorshipMode, SponsorshipPolicy},
    error::PipelineError,
    types::{GasOverride, UserOperationOverrides},
};
use async_trait::async_trait;
use ethers::{
    providers::{Middleware, ProviderError, RpcError},
    types::{Address, Bytes, U256},
};
use keel_primitives::{
    constants::rpc_methods::{
        ALCHEMY_REQUEST_GAS_AND_PAYMASTER_AND_DATA, PM_GET_PAYMASTER_DATA,
        PM_GET_PAYMASTER_STUB_DATA, PM_SPONSOR_USER_OPERATION,
    },
    pack_paymaster_data, unpack_paymaster_data, EntryPointVersion, UserOperationRequest,
    UserOperationWire,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Paymaster fields (and, depending on the method, gas limits and fees) returned by a paymaster
///
/// v0.6 services answer with `paymasterAndData`, v0.7 services with the unpacked fields.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PaymasterResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paymaster_and_data: Option<Bytes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paymaster: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paymaster_data: Option<Bytes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paymaster_verification_gas_limit: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paymaster_post_op_gas_limit: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_gas_limit: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_gas_limit: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_verification_gas: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_fee_per_gas: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_priority_fee_per_gas: Option<U256>,
    /// Stub data that needs no second round trip
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_final: Option<bool>,
}

impl PaymasterResponse {
    /// Writes the returned fields into the user operation
    ///
    /// Fails when the paymaster's v0.7 fields do not pack into `paymasterAndData`.
    pub fn apply(
        &self,
        mut uo: UserOperationRequest,
        version: EntryPointVersion,
    ) -> Result<UserOperationRequest, PipelineError> {
        match (version, &self.paymaster_and_data, self.paymaster) {
            (_, Some(paymaster_and_data), _) => uo.paymaster_and_data = paymaster_and_data.clone(),
            (EntryPointVersion::V07, None, Some(paymaster)) => {
                let (verification_gas_limit, post_op_gas_limit) =
                    match unpack_paymaster_data(&uo.paymaster_and_data)? {
                        Some((_, verification, post_op, _)) => (verification, post_op),
                        None => (U256::zero(), U256::zero()),
                    };
                uo.paymaster_and_data = pack_paymaster_data(
                    paymaster,
                    self.paymaster_verification_gas_limit.unwrap_or(verification_gas_limit),
                    self.paymaster_post_op_gas_limit.unwrap_or(post_op_gas_limit),
                    &self.paymaster_data.clone().unwrap_or_default(),
                )?
                .into();
            }
            _ => {}
        }

        let fields = [
            (&mut uo.call_gas_limit, self.call_gas_limit),
            (&mut uo.verification_gas_limit, self.verification_gas_limit),
            (&mut uo.pre_verification_gas, self.pre_verification_gas),
            (&mut uo.max_fee_per_gas, self.max_fee_per_gas),
            (&mut uo.max_priority_fee_per_gas, self.max_priority_fee_per_gas),
        ];
        for (field, value) in fields {
            if value.is_some() {
                *field = value;
            }
        }

        Ok(uo)
    }
}

/// Context object forwarded to the paymaster service
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PaymasterContext<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    policy_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    erc20: Option<&'a Erc20Context>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum OverrideValue {
    Absolute(U256),
    Multiplier { multiplier: f64 },
}

impl From<GasOverride> for OverrideValue {
    fn from(value: GasOverride) -> Self {
        match value {
            GasOverride::Absolute(value) => Self::Absolute(value),
            GasOverride::Multiplier(multiplier) => Self::Multiplier { multiplier },
        }
    }
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct CombinedOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_fee_per_gas: Option<OverrideValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_priority_fee_per_gas: Option<OverrideValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    call_gas_limit: Option<OverrideValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    verification_gas_limit: Option<OverrideValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pre_verification_gas: Option<OverrideValue>,
}

impl CombinedOverrides {
    fn from_overrides(overrides: &UserOperationOverrides) -> Option<Self> {
        let combined = Self {
            max_fee_per_gas: overrides.max_fee_per_gas.map(OverrideValue::Absolute),
            max_priority_fee_per_gas: overrides.max_priority_fee_per_gas.map(OverrideValue::Absolute),
            call_gas_limit: overrides.call_gas_limit.map(Into::into),
            verification_gas_limit: overrides.verification_gas_limit.map(Into::into),
            pre_verification_gas: overrides.pre_verification_gas.map(Into::into),
        };
        let empty = combined.max_fee_per_gas.is_none() &&
            combined.max_priority_fee_per_gas.is_none() &&
            combined.call_gas_limit.is_none() &&
            combined.verification_gas_limit.is_none() &&
            combined.pre_verification_gas.is_none();
        (!empty).then_some(combined)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CombinedRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    policy_id: Option<&'a str>,
    entry_point: Address,
    dummy_signature: &'a Bytes,
    user_operation: UserOperationWire,
    #[serde(skip_serializing_if = "Option::is_none")]
    erc20_context: Option<&'a Erc20Context>,
    #[serde(skip_serializing_if = "Option::is_none")]
    overrides: Option<CombinedOverrides>,
}

/// Negotiates sponsorship (and gas) with a paymaster service, trying each candidate policy in
/// turn
pub struct PaymasterMiddleware<M: Middleware + 'static> {
    policy: SponsorshipPolicy,
    gas_estimator: Arc<dyn UserOperationMiddleware<M>>,
    caller_estimator: bool,
}

impl<M: Middleware + 'static> PaymasterMiddleware<M> {
    /// `gas_estimator` replaces `eth_estimateUserOperationGas` when set
    pub fn new(
        policy: SponsorshipPolicy,
        gas_estimator: Option<Arc<dyn UserOperationMiddleware<M>>>,
    ) -> Self {
        match gas_estimator {
            Some(estimator) => Self {
                policy,
                gas_estimator: Arc::new(Overridden::gas(estimator)),
                caller_estimator: true,
            },
            None => Self { policy, gas_estimator: Arc::new(GasEstimator), caller_estimator: false },
        }
    }

    fn context<'a>(&'a self, policy_id: Option<&'a str>) -> PaymasterContext<'a> {
        PaymasterContext { policy_id, erc20: self.policy.erc20.as_ref() }
    }

    /// Paymaster error objects are declines, anything else is a transport failure
    fn classify(err: ProviderError, policy_id: Option<&str>) -> PipelineError {
        match err.as_error_response() {
            Some(response) => PipelineError::SponsorshipDeclined {
                policy_id: policy_id.map(str::to_string),
                code: response.code,
                message: response.message.clone(),
            },
            None => err.into(),
        }
    }

    async fn request(
        &self,
        method: &str,
        uo: &UserOperationRequest,
        policy_id: Option<&str>,
        ctx: &MiddlewareContext<'_, M>,
    ) -> Result<PaymasterResponse, PipelineError> {
        let wire = UserOperationWire::from_request(uo, ctx.entry_point.version)?;
        let context = self.context(policy_id);
        let entry_point = ctx.entry_point.address;

        let response: Result<PaymasterResponse, ProviderError> = if method ==
            PM_SPONSOR_USER_OPERATION
        {
            ctx.bundler.request(method, (wire, entry_point, context)).await
        } else {
            let chain_id = format!("{:#x}", ctx.chain_id);
            ctx.bundler.request(method, (wire, entry_point, chain_id, context)).await
        };

        response.map_err(|err| Self::classify(err, policy_id))
    }

    async fn two_phase(
        &self,
        uo: UserOperationRequest,
        policy_id: Option<&str>,
        ctx: &MiddlewareContext<'_, M>,
    ) -> Result<UserOperationRequest, PipelineError> {
        let version = ctx.entry_point.version;

        let stub = self.request(PM_GET_PAYMASTER_STUB_DATA, &uo, policy_id, ctx).await?;
        let uo = stub.apply(uo, version)?;
        let uo = self.gas_estimator.process(uo, ctx).await?;

        if stub.is_final == Some(true) {
            debug!("Paymaster stub data is final");
            return Ok(uo);
        }

        let data = self.request(PM_GET_PAYMASTER_DATA, &uo, policy_id, ctx).await?;
        data.apply(uo, version)
    }

    async fn combined(
        &self,
        uo: UserOperationRequest,
        policy_id: Option<&str>,
        ctx: &MiddlewareContext<'_, M>,
    ) -> Result<UserOperationRequest, PipelineError> {
        let request = CombinedRequest {
            policy_id,
            entry_point: ctx.entry_point.address,
            dummy_signature: &ctx.dummy_signature,
            user_operation: UserOperationWire::from_request(&uo, ctx.entry_point.version)?,
            erc20_context: self.policy.erc20.as_ref(),
            overrides: CombinedOverrides::from_overrides(ctx.overrides),
        };

        let response: PaymasterResponse = ctx
            .bundler
            .request(ALCHEMY_REQUEST_GAS_AND_PAYMASTER_AND_DATA, [request])
            .await
            .map_err(|err| Self::classify(err, policy_id))?;

        self.merge(response.apply(uo, ctx.entry_point.version)?, ctx).await
    }

    async fn legacy(
        &self,
        uo: UserOperationRequest,
        policy_id: Option<&str>,
        ctx: &MiddlewareContext<'_, M>,
    ) -> Result<UserOperationRequest, PipelineError> {
        let response = self.request(PM_SPONSOR_USER_OPERATION, &uo, policy_id, ctx).await?;
        self.merge(response.apply(uo, ctx.entry_point.version)?, ctx).await
    }

    /// Overrides and a caller-supplied estimator win over the paymaster's values
    async fn merge(
        &self,
        uo: UserOperationRequest,
        ctx: &MiddlewareContext<'_, M>,
    ) -> Result<UserOperationRequest, PipelineError> {
        let uo = apply_fee_overrides(apply_gas_overrides(uo, ctx.overrides), ctx.overrides);
        if self.caller_estimator {
            return self.gas_estimator.process(uo, ctx).await;
        }
        Ok(uo)
    }

    async fn sponsor(
        &self,
        uo: UserOperationRequest,
        policy_id: Option<&str>,
        ctx: &MiddlewareContext<'_, M>,
    ) -> Result<UserOperationRequest, PipelineError> {
        match self.policy.mode {
            SponsorshipMode::TwoPhase => self.two_phase(uo, policy_id, ctx).await,
            SponsorshipMode::Combined => self.combined(uo, policy_id, ctx).await,
            SponsorshipMode::Legacy => self.legacy(uo, policy_id, ctx).await,
        }
    }
}

#[async_trait]
impl<M: Middleware + 'static> UserOperationMiddleware<M> for PaymasterMiddleware<M> {
    async fn process(
        &self,
        uo: UserOperationRequest,
        ctx: &MiddlewareContext<'_, M>,
    ) -> Result<UserOperationRequest, PipelineError> {
        let candidates = if self.policy.policy_ids.is_empty() {
            vec![None]
        } else {
            self.policy.policy_ids.iter().map(|id| Some(id.as_str())).collect()
        };

        let mut declined = None;
        for policy_id in candidates {
            match self.sponsor(uo.clone(), policy_id, ctx).await {
                Ok(uo) => {
                    info!("User operation sponsored ({:?}, policy {policy_id:?})", self.policy.mode);
                    return Ok(uo);
                }
                Err(err @ PipelineError::SponsorshipDeclined { .. }) => {
                    debug!("Sponsorship declined: {err}");
                    declined = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(declined.unwrap_or(PipelineError::Configuration {
            inner: "no sponsorship policy to try".into(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn v07_response_is_packed() {
        let response: PaymasterResponse = serde_json::from_value(json!({
            "paymaster": "0x3333333333333333333333333333333333333333",
            "paymasterData": "0xdeadbeef",
            "paymasterVerificationGasLimit": "0x186a0",
            "paymasterPostOpGasLimit": "0xc350",
        }))
        .unwrap();

        let uo = response.apply(UserOperationRequest::default(), EntryPointVersion::V07).unwrap();
        assert_eq!(
            unpack_paymaster_data(&uo.paymaster_and_data).unwrap(),
            Some((
                Address::repeat_byte(0x33),
                100_000.into(),
                50_000.into(),
                Bytes::from(vec![0xde, 0xad, 0xbe, 0xef])
            ))
        );
        assert_eq!(uo.call_gas_limit, None);
    }

    #[test]
    fn v06_response_sets_paymaster_and_data_and_gas() {
        let response: PaymasterResponse = serde_json::from_value(json!({
            "paymasterAndData": "0x3333333333333333333333333333333333333333beef",
            "callGasLimit": "0x10",
            "maxFeePerGas": "0x20",
        }))
        .unwrap();

        let uo = UserOperationRequest {
            call_gas_limit: Some(1.into()),
            verification_gas_limit: Some(2.into()),
            ..Default::default()
        };
        let uo = response.apply(uo, EntryPointVersion::V06).unwrap();
        assert_eq!(uo.paymaster_and_data.len(), 22);
        assert_eq!(uo.call_gas_limit, Some(16.into()));
        assert_eq!(uo.verification_gas_limit, Some(2.into()));
        assert_eq!(uo.max_fee_per_gas, Some(32.into()));
    }

    #[test]
    fn context_shape() {
        let erc20 = Erc20Context {
            token_address: Address::repeat_byte(0x11),
            max_token_amount: Some(5.into()),
        };
        let context = PaymasterContext { policy_id: Some("policy-a"), erc20: Some(&erc20) };
        assert_eq!(
            serde_json::to_value(context).unwrap(),
            json!({
                "policyId": "policy-a",
                "erc20": {
                    "tokenAddress": "0x1111111111111111111111111111111111111111",
                    "maxTokenAmount": "0x5"
                }
            })
        );

        let context = PaymasterContext { policy_id: None, erc20: None };
        assert_eq!(serde_json::to_value(context).unwrap(), json!({}));
    }

    #[test]
    fn combined_overrides() {
        assert!(CombinedOverrides::from_overrides(&UserOperationOverrides::default()).is_none());

        let overrides = UserOperationOverrides {
            max_fee_per_gas: Some(100.into()),
            call_gas_limit: Some(GasOverride::Multiplier(1.5)),
            ..Default::default()
        };
        let combined = CombinedOverrides::from_overrides(&overrides).unwrap();
        assert_eq!(
            serde_json::to_value(combined).unwrap(),
            json!({"maxFeePerGas": "0x64", "callGasLimit": {"multiplier": 1.5}})
        );
    }

    #[test]
    fn v07_response_with_wide_gas_limit_is_rejected() {
        let response = PaymasterResponse {
            paymaster: Some(Address::repeat_byte(0x33)),
            paymaster_post_op_gas_limit: Some(U256::MAX),
            ..Default::default()
        };
        assert!(matches!(
            response.apply(UserOperationRequest::default(), EntryPointVersion::V07),
            Err(PipelineError::IncompleteUserOperation(_))
        ));
    }
}
