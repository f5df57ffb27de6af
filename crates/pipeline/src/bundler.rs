//! Typed calls to bundler endpoints over the node provider's transport

use ethers::{
    providers::{Middleware, ProviderError},
    types::{Address, U256},
};
use keel_primitives::{
    constants::rpc_methods::{
        ETH_ESTIMATE_USER_OPERATION_GAS, ETH_GET_USER_OPERATION_BY_HASH,
        ETH_GET_USER_OPERATION_RECEIPT, ETH_SEND_USER_OPERATION, ETH_SUPPORTED_ENTRY_POINTS,
        RUNDLER_MAX_PRIORITY_FEE_PER_GAS,
    },
    EntryPoint, UserOperation, UserOperationByHash, UserOperationGasEstimation,
    UserOperationError, UserOperationHash, UserOperationReceipt, UserOperationRequest,
    UserOperationWire,
};
use serde::{de::DeserializeOwned, Serialize};
use std::{fmt::Debug, sync::Arc};
use tracing::trace;

fn invalid(err: UserOperationError) -> ProviderError {
    ProviderError::CustomError(err.to_string())
}

#[derive(Clone, Debug)]
pub struct BundlerClient<M: Middleware + 'static> {
    eth_client: Arc<M>,
}

impl<M: Middleware + 'static> BundlerClient<M> {
    pub fn new(eth_client: Arc<M>) -> Self {
        Self { eth_client }
    }

    pub fn eth_client(&self) -> &Arc<M> {
        &self.eth_client
    }

    /// Raw call, dispatched by the transport's router
    pub async fn request<T, R>(&self, method: &str, params: T) -> Result<R, ProviderError>
    where
        T: Debug + Serialize + Send + Sync,
        R: Serialize + DeserializeOwned + Debug + Send,
    {
        trace!("Bundler request {method}: {params:?}");
        self.eth_client.provider().request(method, params).await
    }

    pub async fn estimate_user_operation_gas(
        &self,
        uo: &UserOperationRequest,
        entry_point: &EntryPoint,
    ) -> Result<UserOperationGasEstimation, ProviderError> {
        let wire = UserOperationWire::from_request(uo, entry_point.version).map_err(invalid)?;
        self.request(ETH_ESTIMATE_USER_OPERATION_GAS, (wire, entry_point.address)).await
    }

    pub async fn send_user_operation(
        &self,
        uo: &UserOperation,
    ) -> Result<UserOperationHash, ProviderError> {
        let wire = uo.to_wire().map_err(invalid)?;
        self.request(ETH_SEND_USER_OPERATION, (wire, uo.entry_point().address)).await
    }

    pub async fn get_user_operation_receipt(
        &self,
        hash: &UserOperationHash,
    ) -> Result<Option<UserOperationReceipt>, ProviderError> {
        self.request(ETH_GET_USER_OPERATION_RECEIPT, [hash]).await
    }

    pub async fn get_user_operation_by_hash(
        &self,
        hash: &UserOperationHash,
    ) -> Result<Option<UserOperationByHash>, ProviderError> {
        self.request(ETH_GET_USER_OPERATION_BY_HASH, [hash]).await
    }

    pub async fn supported_entry_points(&self) -> Result<Vec<Address>, ProviderError> {
        self.request(ETH_SUPPORTED_ENTRY_POINTS, ()).await
    }

    /// Priority fee suggested by the bundler's oracle
    pub async fn max_priority_fee_per_gas(&self) -> Result<U256, ProviderError> {
        self.request(RUNDLER_MAX_PRIORITY_FEE_PER_GAS, ()).await
    }
}
