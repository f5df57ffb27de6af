use super::MiddlewareContext;
use crate::error::PipelineError;
use ethers::{
    providers::{Middleware, RpcError},
    types::{Address, U256},
};
use keel_primitives::{
    constants::rpc_methods::ALCHEMY_SIMULATE_USER_OPERATION_ASSET_CHANGES, UserOperationSigned,
    UserOperationWire,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Predicted balance change of one asset
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetChange {
    /// `NATIVE`, `ERC20`, `ERC721` or `ERC1155`
    pub asset_type: String,
    /// `TRANSFER` or `APPROVE`
    pub change_type: String,
    pub from: Address,
    pub to: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_amount: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_id: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u32>,
}

/// Asset changes the user operation would cause if included now
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationPreview {
    pub changes: Vec<AssetChange>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct SimulationFailure {
    message: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct SimulationResponse {
    #[serde(default)]
    changes: Vec<AssetChange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<SimulationFailure>,
}

/// Asks the bundler for the asset changes of a complete user operation
#[derive(Clone, Copy, Debug, Default)]
pub struct Simulator;

impl Simulator {
    pub async fn simulate<M: Middleware + 'static>(
        &self,
        uo: &UserOperationSigned,
        ctx: &MiddlewareContext<'_, M>,
    ) -> Result<SimulationPreview, PipelineError> {
        let wire = UserOperationWire::from_signed(uo, ctx.entry_point.version)?;
        let response: SimulationResponse = ctx
            .bundler
            .request(ALCHEMY_SIMULATE_USER_OPERATION_ASSET_CHANGES, (wire, ctx.entry_point.address))
            .await
            .map_err(|err| match err.as_error_response() {
                Some(response) => PipelineError::Simulation { message: response.message.clone() },
                None => err.into(),
            })?;

        if let Some(failure) = response.error {
            return Err(PipelineError::Simulation { message: failure.message });
        }

        debug!("Simulation: {} asset changes", response.changes.len());
        Ok(SimulationPreview { changes: response.changes })
    }
}
