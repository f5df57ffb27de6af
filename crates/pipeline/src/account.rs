use crate::{error::PipelineError, types::Call};
use async_trait::async_trait;
use ethers::{
    providers::Middleware,
    types::{Address, Bytes, U256},
};
use keel_contracts::{
    simple_account::{encode_execute, encode_execute_batch},
    EntryPointContract, SimpleAccountFactory,
};
use keel_primitives::{constants::simple_account::DUMMY_SIGNATURE, EntryPoint};
use std::{str::FromStr, sync::Arc};
use tokio::sync::OnceCell;

/// Smart contract account the pipeline builds user operations for
#[async_trait]
pub trait SmartAccount: Send + Sync {
    /// EntryPoint the account is bound to; selects hashing and wire layout
    fn entry_point(&self) -> EntryPoint;

    async fn address(&self) -> Result<Address, PipelineError>;

    async fn get_nonce(&self, key: U256) -> Result<U256, PipelineError>;

    async fn is_deployed(&self) -> Result<bool, PipelineError>;

    /// Factory call deploying the account
    async fn init_code(&self) -> Result<Bytes, PipelineError>;

    fn encode_execute(&self, call: &Call) -> Result<Bytes, PipelineError>;

    fn encode_batch_execute(&self, calls: &[Call]) -> Result<Bytes, PipelineError>;

    /// Signature shaped like a real one, used during estimation
    fn dummy_signature(&self) -> Bytes;
}

/// Reference SimpleAccount owned by a single ECDSA key
pub struct SimpleAccount<M: Middleware + 'static> {
    eth_client: Arc<M>,
    entry_point: EntryPointContract<M>,
    factory: SimpleAccountFactory<M>,
    owner: Address,
    salt: U256,
    address: OnceCell<Address>,
}

impl<M: Middleware + 'static> SimpleAccount<M> {
    pub fn new(
        eth_client: Arc<M>,
        entry_point: EntryPoint,
        factory: Address,
        owner: Address,
        salt: U256,
    ) -> Self {
        Self {
            entry_point: EntryPointContract::new(eth_client.clone(), entry_point),
            factory: SimpleAccountFactory::new(eth_client.clone(), factory),
            eth_client,
            owner,
            salt,
            address: OnceCell::new(),
        }
    }

    /// Skips the counterfactual address lookup
    pub fn with_address(self, address: Address) -> Self {
        Self { address: OnceCell::new_with(Some(address)), ..self }
    }

    pub fn owner(&self) -> Address {
        self.owner
    }
}

#[async_trait]
impl<M: Middleware + 'static> SmartAccount for SimpleAccount<M> {
    fn entry_point(&self) -> EntryPoint {
        EntryPoint::new(self.entry_point.address(), self.entry_point.version())
    }

    async fn address(&self) -> Result<Address, PipelineError> {
        let address = self
            .address
            .get_or_try_init(|| async {
                self.factory.get_address(self.owner, self.salt).await.map_err(PipelineError::from)
            })
            .await?;
        Ok(*address)
    }

    async fn get_nonce(&self, key: U256) -> Result<U256, PipelineError> {
        let sender = self.address().await?;
        Ok(self.entry_point.get_nonce(sender, key).await?)
    }

    async fn is_deployed(&self) -> Result<bool, PipelineError> {
        let sender = self.address().await?;
        let code = self
            .eth_client
            .get_code(sender, None)
            .await
            .map_err(|err| PipelineError::Provider { inner: err.to_string() })?;
        Ok(!code.is_empty())
    }

    async fn init_code(&self) -> Result<Bytes, PipelineError> {
        Ok(self.factory.init_code(self.owner, self.salt))
    }

    fn encode_execute(&self, call: &Call) -> Result<Bytes, PipelineError> {
        Ok(encode_execute(call.target, call.value, call.data.clone()))
    }

    fn encode_batch_execute(&self, calls: &[Call]) -> Result<Bytes, PipelineError> {
        let calls =
            calls.iter().map(|c| (c.target, c.value, c.data.clone())).collect::<Vec<_>>();
        Ok(encode_execute_batch(self.entry_point.version(), &calls)?)
    }

    fn dummy_signature(&self) -> Bytes {
        Bytes::from_str(DUMMY_SIGNATURE).unwrap_or_default()
    }
}
