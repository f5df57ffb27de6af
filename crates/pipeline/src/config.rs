use crate::{error::PipelineError, middleware::UserOperationMiddleware};
use ethers::{
    providers::Middleware,
    types::{Address, U256},
};
use futures::future::BoxFuture;
use keel_primitives::{
    constants::receipt::{MAX_ATTEMPTS, POLL_INTERVAL_MS},
    UserOperationRequest,
};
use serde::Serialize;
use std::{fmt, future::Future, sync::Arc, time::Duration};

/// How a single fee field is derived from the upstream values
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum FeeRule {
    Fixed(U256),
    Multiplier(f64),
    #[default]
    Upstream,
}

/// Fee rules applied once per build
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FeePolicy {
    pub max_fee_per_gas: FeeRule,
    pub max_priority_fee_per_gas: FeeRule,
}

/// Paymaster negotiation flavour
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SponsorshipMode {
    /// `pm_getPaymasterStubData`, gas estimation, `pm_getPaymasterData`
    #[default]
    TwoPhase,
    /// `alchemy_requestGasAndPaymasterAndData` in one round trip
    Combined,
    /// `pm_sponsorUserOperation`
    Legacy,
}

/// Gas paid in an ERC-20 token instead of sponsored outright
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Erc20Context {
    pub token_address: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_token_amount: Option<U256>,
}

/// Paymaster policies to try, in order
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SponsorshipPolicy {
    pub policy_ids: Vec<String>,
    pub erc20: Option<Erc20Context>,
    pub mode: SponsorshipMode,
}

impl SponsorshipPolicy {
    pub fn new<I, S>(policy_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { policy_ids: policy_ids.into_iter().map(Into::into).collect(), ..Default::default() }
    }

    pub fn mode(mut self, mode: SponsorshipMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn erc20(mut self, erc20: Erc20Context) -> Self {
        self.erc20 = Some(erc20);
        self
    }
}

/// Receipt polling budget of `wait_for_user_operation_receipt`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReceiptPollingConfig {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for ReceiptPollingConfig {
    fn default() -> Self {
        Self { interval: Duration::from_millis(POLL_INTERVAL_MS), max_attempts: MAX_ATTEMPTS }
    }
}

/// Last-chance transformation of the user operation before it is completed and signed
pub type CustomMiddleware = Arc<
    dyn Fn(UserOperationRequest) -> BoxFuture<'static, Result<UserOperationRequest, PipelineError>>
        + Send
        + Sync,
>;

/// Configuration of [SmartAccountClient](crate::SmartAccountClient)
pub struct PipelineConfig<M: Middleware + 'static> {
    pub fee_policy: FeePolicy,
    pub sponsorship: Option<SponsorshipPolicy>,
    pub simulate: bool,
    pub custom_middleware: Option<CustomMiddleware>,
    /// Replaces the block and oracle based fee lookup
    pub fee_estimator: Option<Arc<dyn UserOperationMiddleware<M>>>,
    /// Replaces `eth_estimateUserOperationGas`
    pub gas_estimator: Option<Arc<dyn UserOperationMiddleware<M>>>,
    pub receipt_polling: ReceiptPollingConfig,
}

impl<M: Middleware + 'static> Default for PipelineConfig<M> {
    fn default() -> Self {
        Self {
            fee_policy: FeePolicy::default(),
            sponsorship: None,
            simulate: false,
            custom_middleware: None,
            fee_estimator: None,
            gas_estimator: None,
            receipt_polling: ReceiptPollingConfig::default(),
        }
    }
}

impl<M: Middleware + 'static> fmt::Debug for PipelineConfig<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("fee_policy", &self.fee_policy)
            .field("sponsorship", &self.sponsorship)
            .field("simulate", &self.simulate)
            .field("custom_middleware", &self.custom_middleware.is_some())
            .field("fee_estimator", &self.fee_estimator.is_some())
            .field("gas_estimator", &self.gas_estimator.is_some())
            .field("receipt_polling", &self.receipt_polling)
            .finish()
    }
}

impl<M: Middleware + 'static> PipelineConfig<M> {
    pub fn fee_policy(mut self, fee_policy: FeePolicy) -> Self {
        self.fee_policy = fee_policy;
        self
    }

    pub fn sponsorship(mut self, sponsorship: SponsorshipPolicy) -> Self {
        self.sponsorship = Some(sponsorship);
        self
    }

    pub fn simulate(mut self, simulate: bool) -> Self {
        self.simulate = simulate;
        self
    }

    pub fn custom_middleware<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(UserOperationRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<UserOperationRequest, PipelineError>> + Send + 'static,
    {
        self.custom_middleware = Some(Arc::new(move |uo| Box::pin(f(uo))));
        self
    }

    pub fn fee_estimator(mut self, estimator: Arc<dyn UserOperationMiddleware<M>>) -> Self {
        self.fee_estimator = Some(estimator);
        self
    }

    pub fn gas_estimator(mut self, estimator: Arc<dyn UserOperationMiddleware<M>>) -> Self {
        self.gas_estimator = Some(estimator);
        self
    }

    pub fn receipt_polling(mut self, receipt_polling: ReceiptPollingConfig) -> Self {
        self.receipt_polling = receipt_polling;
        self
    }
}
