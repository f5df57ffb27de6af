use crate::error::PipelineError;
use async_trait::async_trait;
use ethers::types::Bytes;
use keel_primitives::{UserOperationHash, Wallet};

/// Produces the account signature over a user operation hash
#[async_trait]
pub trait UserOperationSigner: Send + Sync {
    async fn sign_user_operation_hash(
        &self,
        hash: &UserOperationHash,
    ) -> Result<Bytes, PipelineError>;
}

#[async_trait]
impl UserOperationSigner for Wallet {
    async fn sign_user_operation_hash(
        &self,
        hash: &UserOperationHash,
    ) -> Result<Bytes, PipelineError> {
        Ok(Wallet::sign_user_operation_hash(self, hash).await?)
    }
}
