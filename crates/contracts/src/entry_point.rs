use crate::{error::ContractCallError, gen::EntryPointAPI};
use ethers::{
    providers::Middleware,
    types::{Address, U256},
};
use keel_primitives::{EntryPoint, EntryPointVersion};
use std::sync::Arc;

/// Read-only view of an EntryPoint deployment
#[derive(Clone)]
pub struct EntryPointContract<M: Middleware + 'static> {
    entry_point: EntryPoint,
    entry_point_api: EntryPointAPI<M>,
}

impl<M: Middleware + 'static> EntryPointContract<M> {
    pub fn new(eth_client: Arc<M>, entry_point: EntryPoint) -> Self {
        let entry_point_api = EntryPointAPI::new(entry_point.address, eth_client);
        Self { entry_point, entry_point_api }
    }

    pub fn address(&self) -> Address {
        self.entry_point.address
    }

    pub fn version(&self) -> EntryPointVersion {
        self.entry_point.version
    }

    /// Next nonce of `sender` in the 192-bit nonce space `key`
    pub async fn get_nonce(&self, sender: Address, key: U256) -> Result<U256, ContractCallError> {
        self.entry_point_api
            .get_nonce(sender, key)
            .call()
            .await
            .map_err(ContractCallError::from_contract_error)
    }

    /// Deposit of `account` held by the EntryPoint for gas prefunding
    pub async fn balance_of(&self, account: Address) -> Result<U256, ContractCallError> {
        self.entry_point_api
            .balance_of(account)
            .call()
            .await
            .map_err(ContractCallError::from_contract_error)
    }
}
