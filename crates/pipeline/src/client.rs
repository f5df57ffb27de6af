use crate::{
    account::SmartAccount,
    bundler::BundlerClient,
    config::PipelineConfig,
    error::PipelineError,
    middleware::{
        FeeEstimator, GasEstimator, MiddlewareContext, Overridden, PaymasterMiddleware, Simulator,
        UserOperationMiddleware,
    },
    signer::UserOperationSigner,
    types::{BuiltUserOperation, UserOperationIntent, UserOperationOverrides},
};
use ethers::{
    providers::{Middleware, Provider},
    types::{Address, U256},
};
use keel_contracts::EntryPointContract;
use keel_primitives::{
    unpack_paymaster_data, EntryPointVersion, UserOperation, UserOperationByHash,
    UserOperationHash, UserOperationReceipt, UserOperationRequest, UserOperationSigned,
};
use keel_transport::{HeaderStore, RoutedTransport};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Builds, signs and submits user operations for a smart account
///
/// Every build runs the same fixed sequence: skeleton (sender, nonce, init code, call data),
/// fees, gas and sponsorship, custom middleware, completion, optional simulation, hashing and
/// signing. Any failure aborts the build and nothing is submitted.
pub struct SmartAccountClient<M: Middleware + 'static> {
    bundler: BundlerClient<M>,
    account: Option<Arc<dyn SmartAccount>>,
    signer: Arc<dyn UserOperationSigner>,
    config: PipelineConfig<M>,
    fee_stage: Arc<dyn UserOperationMiddleware<M>>,
    gas_stage: Arc<dyn UserOperationMiddleware<M>>,
    paymaster_stage: Option<PaymasterMiddleware<M>>,
    chain_id: u64,
    headers: HeaderStore,
}

impl<M: Middleware + 'static> SmartAccountClient<M> {
    /// Creates the client and reads the chain id from the node
    pub async fn new(
        eth_client: Arc<M>,
        signer: Arc<dyn UserOperationSigner>,
        config: PipelineConfig<M>,
    ) -> Result<Self, PipelineError> {
        let chain_id = eth_client
            .get_chainid()
            .await
            .map_err(|err| PipelineError::Provider { inner: err.to_string() })?
            .as_u64();

        let fee_stage: Arc<dyn UserOperationMiddleware<M>> = match &config.fee_estimator {
            Some(estimator) => Arc::new(Overridden::fees(estimator.clone())),
            None => Arc::new(FeeEstimator::new(config.fee_policy)),
        };
        let gas_stage: Arc<dyn UserOperationMiddleware<M>> = match &config.gas_estimator {
            Some(estimator) => Arc::new(Overridden::gas(estimator.clone())),
            None => Arc::new(GasEstimator),
        };
        let paymaster_stage = config
            .sponsorship
            .clone()
            .map(|policy| PaymasterMiddleware::new(policy, config.gas_estimator.clone()));

        Ok(Self {
            bundler: BundlerClient::new(eth_client),
            account: None,
            signer,
            config,
            fee_stage,
            gas_stage,
            paymaster_stage,
            chain_id,
            headers: HeaderStore::new(),
        })
    }

    pub fn with_account(mut self, account: Arc<dyn SmartAccount>) -> Self {
        self.account = Some(account);
        self
    }

    /// Shares a header store with the transport the client talks through
    pub fn with_headers(mut self, headers: HeaderStore) -> Self {
        self.headers = headers;
        self
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Headers sent with every subsequent request
    pub fn headers(&self) -> &HeaderStore {
        &self.headers
    }

    pub fn account(&self) -> Option<&Arc<dyn SmartAccount>> {
        self.account.as_ref()
    }

    pub fn config(&self) -> &PipelineConfig<M> {
        &self.config
    }

    fn bound_account(&self) -> Result<&Arc<dyn SmartAccount>, PipelineError> {
        self.account.as_ref().ok_or(PipelineError::AccountNotFound)
    }

    /// Runs the full pipeline and returns the signed user operation without submitting it
    pub async fn build_user_operation(
        &self,
        intent: impl Into<UserOperationIntent>,
        overrides: UserOperationOverrides,
    ) -> Result<BuiltUserOperation, PipelineError> {
        let account = self.bound_account()?;
        let entry_point = account.entry_point();
        let intent = intent.into();

        let ctx = MiddlewareContext {
            bundler: &self.bundler,
            entry_point,
            chain_id: self.chain_id,
            overrides: &overrides,
            dummy_signature: account.dummy_signature(),
        };

        let sender = account.address().await?;
        let nonce = match overrides.nonce {
            Some(nonce) => nonce,
            None => account.get_nonce(overrides.nonce_key.unwrap_or_default()).await?,
        };
        let init_code =
            if account.is_deployed().await? { Default::default() } else { account.init_code().await? };
        let call_data = match &intent {
            UserOperationIntent::Single(call) => account.encode_execute(call)?,
            UserOperationIntent::Batch(calls) if calls.is_empty() => {
                return Err(PipelineError::InvalidIntent { inner: "empty batch".into() })
            }
            UserOperationIntent::Batch(calls) => account.encode_batch_execute(calls)?,
        };
        debug!("Skeleton: sender {sender:?}, nonce {nonce}, init code {} bytes", init_code.len());

        let uo = UserOperationRequest {
            sender,
            nonce,
            init_code,
            call_data,
            signature: Some(ctx.dummy_signature.clone()),
            ..Default::default()
        };

        let uo = self.fee_stage.process(uo, &ctx).await?;

        let uo = match (&overrides.paymaster_and_data, &self.paymaster_stage) {
            (Some(paymaster_and_data), _) => {
                debug!("Using paymasterAndData override {paymaster_and_data}");
                if entry_point.version == EntryPointVersion::V07 {
                    unpack_paymaster_data(paymaster_and_data)?;
                }
                let uo = UserOperationRequest { paymaster_and_data: paymaster_and_data.clone(), ..uo };
                self.gas_stage.process(uo, &ctx).await?
            }
            (None, Some(paymaster)) => paymaster.process(uo, &ctx).await?,
            (None, None) => self.gas_stage.process(uo, &ctx).await?,
        };

        let uo = match &self.config.custom_middleware {
            Some(custom) => custom(uo).await?,
            None => uo,
        };

        let uo = UserOperationSigned::try_from(uo)?;
        let hash = uo.hash(&entry_point, self.chain_id)?;

        let simulation = if self.config.simulate {
            Some(Simulator.simulate(&uo, &ctx).await?)
        } else {
            None
        };

        let signature = self.signer.sign_user_operation_hash(&hash).await?;
        let user_operation =
            UserOperation::new(uo.signature(signature), &entry_point, self.chain_id)?;
        debug!("Built user operation {hash}");

        Ok(BuiltUserOperation { user_operation, simulation })
    }

    /// Builds, signs and submits a user operation
    pub async fn send_user_operation(
        &self,
        intent: impl Into<UserOperationIntent>,
        overrides: UserOperationOverrides,
    ) -> Result<UserOperationHash, PipelineError> {
        let built = self.build_user_operation(intent, overrides).await?;
        self.send_signed_user_operation(&built.user_operation).await
    }

    pub async fn send_signed_user_operation(
        &self,
        uo: &UserOperation,
    ) -> Result<UserOperationHash, PipelineError> {
        let hash = self.bundler.send_user_operation(uo).await?;
        if hash != uo.hash() {
            warn!("Bundler returned hash {hash}, computed {}", uo.hash());
        }
        info!("Sent user operation {hash} from {:?}", uo.sender);
        Ok(hash)
    }

    pub async fn get_user_operation_receipt(
        &self,
        hash: &UserOperationHash,
    ) -> Result<Option<UserOperationReceipt>, PipelineError> {
        Ok(self.bundler.get_user_operation_receipt(hash).await?)
    }

    pub async fn get_user_operation_by_hash(
        &self,
        hash: &UserOperationHash,
    ) -> Result<Option<UserOperationByHash>, PipelineError> {
        Ok(self.bundler.get_user_operation_by_hash(hash).await?)
    }

    /// Polls for the receipt until it shows up or the polling budget is spent
    pub async fn wait_for_user_operation_receipt(
        &self,
        hash: &UserOperationHash,
    ) -> Result<UserOperationReceipt, PipelineError> {
        let polling = self.config.receipt_polling;
        for attempt in 1..=polling.max_attempts {
            if let Some(receipt) = self.get_user_operation_receipt(hash).await? {
                info!("User operation {hash} included in {:?}", receipt.tx_receipt.transaction_hash);
                return Ok(receipt);
            }
            debug!("No receipt for {hash} yet (attempt {attempt}/{})", polling.max_attempts);
            if attempt < polling.max_attempts {
                tokio::time::sleep(polling.interval).await;
            }
        }
        Err(PipelineError::ReceiptTimeout { hash: *hash, attempts: polling.max_attempts })
    }

    pub async fn supported_entry_points(&self) -> Result<Vec<Address>, PipelineError> {
        Ok(self.bundler.supported_entry_points().await?)
    }

    /// Fails unless the bundler lists the account's EntryPoint
    pub async fn check_entry_point_supported(&self) -> Result<(), PipelineError> {
        let entry_point = self.bound_account()?.entry_point();
        let supported = self.supported_entry_points().await?;
        if supported.contains(&entry_point.address) {
            Ok(())
        } else {
            Err(PipelineError::Configuration {
                inner: format!(
                    "EntryPoint {:?} ({}) is not supported by the bundler",
                    entry_point.address, entry_point.version
                ),
            })
        }
    }

    /// Deposit the EntryPoint holds for the account
    pub async fn get_deposit(&self) -> Result<U256, PipelineError> {
        let account = self.bound_account()?;
        let entry_point =
            EntryPointContract::new(self.bundler.eth_client().clone(), account.entry_point());
        Ok(entry_point.balance_of(account.address().await?).await?)
    }
}

impl SmartAccountClient<Provider<RoutedTransport>> {
    /// Client talking through a routed transport, sharing its header store
    pub async fn connect(
        transport: RoutedTransport,
        signer: Arc<dyn UserOperationSigner>,
        config: PipelineConfig<Provider<RoutedTransport>>,
    ) -> Result<Self, PipelineError> {
        let headers = transport.headers();
        let client = Self::new(Arc::new(transport.into_provider()), signer, config).await?;
        Ok(client.with_headers(headers))
    }
}
