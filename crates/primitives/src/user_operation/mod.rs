//! User operation types and the EntryPoint-version aware hasher

mod hash;
mod request;
mod wire;

use crate::{
    entry_point::{EntryPoint, EntryPointVersion},
    error::UserOperationError,
    utils::{as_checksum_addr, get_address, pack_uint128, to_uint128, unpack_paymaster_data},
};
use derive_more::{AsRef, Deref};
use ethers::{
    abi::AbiEncode,
    contract::{EthAbiCodec, EthAbiType},
    types::{Address, Bytes, Log, TransactionReceipt, H256, U256, U64},
    utils::keccak256,
};
pub use hash::UserOperationHash;
pub use request::UserOperationRequest;
use serde::{Deserialize, Serialize};
use std::ops::Deref;
pub use wire::UserOperationWire;

/// Consuming `field(value) -> Self` setters
macro_rules! setters {
    ($($field:ident: $ty:ty),* $(,)?) => {
        $(
            pub fn $field(mut self, $field: $ty) -> Self {
                self.$field = $field;
                self
            }
        )*
    };
}

/// Signed user operation together with its hash
///
/// Fields are private: a finished user operation is only read, never patched. Any correction
/// means building a new [UserOperationSigned] and hashing it again.
#[derive(AsRef, Deref, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperation {
    hash: UserOperationHash,

    #[deref]
    #[as_ref]
    user_operation: UserOperationSigned,

    entry_point: EntryPoint,
}

impl UserOperation {
    /// Hashes `user_operation` for the given entry point and chain and seals it
    pub fn new(
        user_operation: UserOperationSigned,
        entry_point: &EntryPoint,
        chain_id: u64,
    ) -> Result<Self, UserOperationError> {
        let hash = user_operation.hash(entry_point, chain_id)?;
        Ok(Self { hash, user_operation, entry_point: *entry_point })
    }

    pub fn hash(&self) -> UserOperationHash {
        self.hash
    }

    pub fn entry_point(&self) -> &EntryPoint {
        &self.entry_point
    }

    pub fn user_operation(&self) -> &UserOperationSigned {
        &self.user_operation
    }

    /// Wire representation for the entry point's version
    pub fn to_wire(&self) -> Result<UserOperationWire, UserOperationError> {
        UserOperationWire::from_signed(&self.user_operation, self.entry_point.version)
    }
}

impl From<UserOperation> for UserOperationSigned {
    fn from(value: UserOperation) -> Self {
        value.user_operation
    }
}

/// User operation with every field filled in
///
/// For EntryPoint v0.7 `init_code` carries `factory ++ factoryData` and `paymaster_and_data`
/// carries `paymaster ++ uint128 verificationGasLimit ++ uint128 postOpGasLimit ++ data`.
#[derive(Default, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperationSigned {
    /// Sender of the user operation
    #[serde(serialize_with = "as_checksum_addr")]
    pub sender: Address,

    /// Nonce (anti replay protection)
    pub nonce: U256,

    /// Init code for the account (needed if account not yet deployed and needs to be created)
    pub init_code: Bytes,

    /// The data that is passed to the sender during the main execution call
    pub call_data: Bytes,

    /// The amount of gas to allocate for the main execution call
    pub call_gas_limit: U256,

    /// The amount of gas to allocate for the verification step
    pub verification_gas_limit: U256,

    /// The amount of gas to pay bundler to compensate for the pre-verification execution and
    /// calldata
    pub pre_verification_gas: U256,

    /// Maximum fee per gas (similar to EIP-1559)
    pub max_fee_per_gas: U256,

    /// Maximum priority fee per gas (similar to EIP-1559)
    pub max_priority_fee_per_gas: U256,

    /// Address of paymaster sponsoring the user operation, followed by extra data to send to the
    /// paymaster (can be empty)
    pub paymaster_and_data: Bytes,

    /// Data passed to the account along with the nonce during the verification step
    pub signature: Bytes,
}

/// v0.6 user operation without signature (helper for packing user operation)
#[derive(EthAbiCodec, EthAbiType)]
struct UserOperationNoSignature {
    pub sender: Address,
    pub nonce: U256,
    pub init_code: H256,
    pub call_data: H256,
    pub call_gas_limit: U256,
    pub verification_gas_limit: U256,
    pub pre_verification_gas: U256,
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
    pub paymaster_and_data: H256,
}

impl From<&UserOperationSigned> for UserOperationNoSignature {
    fn from(value: &UserOperationSigned) -> Self {
        Self {
            sender: value.sender,
            nonce: value.nonce,
            init_code: keccak256(value.init_code.deref()).into(),
            call_data: keccak256(value.call_data.deref()).into(),
            call_gas_limit: value.call_gas_limit,
            verification_gas_limit: value.verification_gas_limit,
            pre_verification_gas: value.pre_verification_gas,
            max_fee_per_gas: value.max_fee_per_gas,
            max_priority_fee_per_gas: value.max_priority_fee_per_gas,
            paymaster_and_data: keccak256(value.paymaster_and_data.deref()).into(),
        }
    }
}

/// v0.7 packed user operation without signature (gas limits and fees squeezed into two words)
#[derive(EthAbiCodec, EthAbiType)]
struct PackedUserOperationNoSignature {
    pub sender: Address,
    pub nonce: U256,
    pub init_code: H256,
    pub call_data: H256,
    pub account_gas_limits: H256,
    pub pre_verification_gas: U256,
    pub gas_fees: H256,
    pub paymaster_and_data: H256,
}

impl TryFrom<&UserOperationSigned> for PackedUserOperationNoSignature {
    type Error = UserOperationError;

    /// Fails if a packed field is wider than 128 bits or `paymasterAndData` is truncated, since
    /// the bundler could not reproduce the hash from the unpacked wire fields
    fn try_from(value: &UserOperationSigned) -> Result<Self, Self::Error> {
        unpack_paymaster_data(&value.paymaster_and_data)?;
        let account_gas_limits = pack_uint128(
            to_uint128(value.verification_gas_limit, "verificationGasLimit")?,
            to_uint128(value.call_gas_limit, "callGasLimit")?,
        );
        let gas_fees = pack_uint128(
            to_uint128(value.max_priority_fee_per_gas, "maxPriorityFeePerGas")?,
            to_uint128(value.max_fee_per_gas, "maxFeePerGas")?,
        );

        Ok(Self {
            sender: value.sender,
            nonce: value.nonce,
            init_code: keccak256(value.init_code.deref()).into(),
            call_data: keccak256(value.call_data.deref()).into(),
            account_gas_limits: account_gas_limits.into(),
            pre_verification_gas: value.pre_verification_gas,
            gas_fees: gas_fees.into(),
            paymaster_and_data: keccak256(value.paymaster_and_data.deref()).into(),
        })
    }
}

impl UserOperationSigned {
    /// Packs the user operation without signature to bytes (used for calculating the hash)
    pub fn pack_without_signature(
        &self,
        version: EntryPointVersion,
    ) -> Result<Bytes, UserOperationError> {
        Ok(match version {
            EntryPointVersion::V06 => UserOperationNoSignature::from(self).encode().into(),
            EntryPointVersion::V07 => PackedUserOperationNoSignature::try_from(self)?.encode().into(),
        })
    }

    /// Calculates the hash of the user operation
    ///
    /// `keccak256(abi.encode(keccak256(packed), entryPoint, chainId))`, where the packing
    /// depends on the entry point version.
    pub fn hash(
        &self,
        entry_point: &EntryPoint,
        chain_id: u64,
    ) -> Result<UserOperationHash, UserOperationError> {
        let packed = self.pack_without_signature(entry_point.version)?;
        Ok(H256::from_slice(
            keccak256(
                [
                    keccak256(packed.deref()).to_vec(),
                    entry_point.address.encode(),
                    U256::from(chain_id).encode(),
                ]
                .concat(),
            )
            .as_slice(),
        )
        .into())
    }

    setters! {
        sender: Address,
        nonce: U256,
        init_code: Bytes,
        call_data: Bytes,
        call_gas_limit: U256,
        verification_gas_limit: U256,
        pre_verification_gas: U256,
        max_fee_per_gas: U256,
        max_priority_fee_per_gas: U256,
        paymaster_and_data: Bytes,
        signature: Bytes,
    }

    /// Factory deploying the sender, if the user operation carries init code
    pub fn factory(&self) -> Option<Address> {
        get_address(&self.init_code)
    }

    /// Paymaster sponsoring the user operation, if any
    pub fn paymaster(&self) -> Option<Address> {
        get_address(&self.paymaster_and_data)
    }
}

/// Outcome of an included user operation (`eth_getUserOperationReceipt`)
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperationReceipt {
    #[serde(rename = "userOpHash")]
    pub user_operation_hash: UserOperationHash,
    #[serde(serialize_with = "as_checksum_addr")]
    pub sender: Address,
    pub nonce: U256,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster: Option<Address>,
    pub actual_gas_cost: U256,
    pub actual_gas_used: U256,
    pub success: bool,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub logs: Vec<Log>,
    #[serde(rename = "receipt")]
    pub tx_receipt: TransactionReceipt,
}

/// User operation with its inclusion details (`eth_getUserOperationByHash`)
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperationByHash {
    pub user_operation: UserOperationWire,
    #[serde(serialize_with = "as_checksum_addr")]
    pub entry_point: Address,
    pub transaction_hash: H256,
    pub block_hash: H256,
    pub block_number: U64,
}

/// Gas limits suggested by the bundler (`eth_estimateUserOperationGas`)
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperationGasEstimation {
    pub pre_verification_gas: U256,
    pub verification_gas_limit: U256,
    pub call_gas_limit: U256,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster_verification_gas_limit: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster_post_op_gas_limit: Option<U256>,
}
