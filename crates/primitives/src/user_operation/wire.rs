//! JSON-RPC representation of user operations
//!
//! Bundlers and paymasters expect the flat v0.6 layout for EntryPoint v0.6 and the unpacked
//! v0.7 layout (`factory`, `paymaster`, ...) for EntryPoint v0.7. Internally both are carried by
//! [UserOperationRequest](super::UserOperationRequest) with the v0.7 parts packed.

use super::{UserOperationRequest, UserOperationSigned};
use crate::{
    entry_point::EntryPointVersion,
    error::UserOperationError,
    utils::{
        as_checksum_addr, as_checksum_addr_opt, pack_factory_data, pack_paymaster_data,
        unpack_factory_data, unpack_paymaster_data,
    },
};
use ethers::types::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

/// User operation as sent to (and returned by) bundler and paymaster endpoints
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperationWire {
    #[serde(serialize_with = "as_checksum_addr")]
    pub sender: Address,
    #[serde(default)]
    pub nonce: U256,

    // v0.6
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_code: Option<Bytes>,

    // v0.7
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "as_checksum_addr_opt"
    )]
    pub factory: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factory_data: Option<Bytes>,

    #[serde(default)]
    pub call_data: Bytes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_gas_limit: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_gas_limit: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_verification_gas: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fee_per_gas: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_priority_fee_per_gas: Option<U256>,

    // v0.6
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster_and_data: Option<Bytes>,

    // v0.7
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "as_checksum_addr_opt"
    )]
    pub paymaster: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster_verification_gas_limit: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster_post_op_gas_limit: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster_data: Option<Bytes>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<Bytes>,
}

impl UserOperationWire {
    /// Fails for v0.7 when `paymasterAndData` cannot be split into its unpacked fields
    pub fn from_request(
        uo: &UserOperationRequest,
        version: EntryPointVersion,
    ) -> Result<Self, UserOperationError> {
        let mut wire = Self {
            sender: uo.sender,
            nonce: uo.nonce,
            call_data: uo.call_data.clone(),
            call_gas_limit: uo.call_gas_limit,
            verification_gas_limit: uo.verification_gas_limit,
            pre_verification_gas: uo.pre_verification_gas,
            max_fee_per_gas: uo.max_fee_per_gas,
            max_priority_fee_per_gas: uo.max_priority_fee_per_gas,
            signature: uo.signature.clone(),
            ..Default::default()
        };

        match version {
            EntryPointVersion::V06 => {
                wire.init_code = Some(uo.init_code.clone());
                wire.paymaster_and_data = Some(uo.paymaster_and_data.clone());
            }
            EntryPointVersion::V07 => {
                if let Some((factory, factory_data)) = unpack_factory_data(&uo.init_code) {
                    wire.factory = Some(factory);
                    wire.factory_data = Some(factory_data);
                }
                if let Some((paymaster, verification_gas_limit, post_op_gas_limit, data)) =
                    unpack_paymaster_data(&uo.paymaster_and_data)?
                {
                    wire.paymaster = Some(paymaster);
                    wire.paymaster_verification_gas_limit = Some(verification_gas_limit);
                    wire.paymaster_post_op_gas_limit = Some(post_op_gas_limit);
                    wire.paymaster_data = Some(data);
                }
            }
        }

        Ok(wire)
    }

    pub fn from_signed(
        uo: &UserOperationSigned,
        version: EntryPointVersion,
    ) -> Result<Self, UserOperationError> {
        Self::from_request(&UserOperationRequest::from(uo.clone()), version)
    }

    /// Folds the v0.7 fields back into `initCode` and `paymasterAndData`
    pub fn into_request(self) -> Result<UserOperationRequest, UserOperationError> {
        let init_code = match (self.init_code, self.factory) {
            (Some(init_code), _) => init_code,
            (None, Some(factory)) => {
                pack_factory_data(factory, &self.factory_data.unwrap_or_default()).into()
            }
            (None, None) => Bytes::default(),
        };

        let paymaster_and_data = match (self.paymaster_and_data, self.paymaster) {
            (Some(paymaster_and_data), _) => paymaster_and_data,
            (None, Some(paymaster)) => pack_paymaster_data(
                paymaster,
                self.paymaster_verification_gas_limit.unwrap_or_default(),
                self.paymaster_post_op_gas_limit.unwrap_or_default(),
                &self.paymaster_data.unwrap_or_default(),
            )?
            .into(),
            (None, None) => Bytes::default(),
        };

        Ok(UserOperationRequest {
            sender: self.sender,
            nonce: self.nonce,
            init_code,
            call_data: self.call_data,
            call_gas_limit: self.call_gas_limit,
            verification_gas_limit: self.verification_gas_limit,
            pre_verification_gas: self.pre_verification_gas,
            max_fee_per_gas: self.max_fee_per_gas,
            max_priority_fee_per_gas: self.max_priority_fee_per_gas,
            paymaster_and_data,
            signature: self.signature,
        })
    }
}
