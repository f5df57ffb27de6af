//! User operation request (optional fields)

use super::UserOperationSigned;
use crate::{error::UserOperationError, utils::as_checksum_addr};
use ethers::types::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

/// User operation under construction
///
/// Gas and fee fields stay `None` until a pipeline stage (or the caller) fills them in.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperationRequest {
    #[serde(default = "Address::zero", serialize_with = "as_checksum_addr")]
    pub sender: Address,
    #[serde(default)]
    pub nonce: U256,
    #[serde(default)]
    pub init_code: Bytes,
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
    #[serde(default)]
    pub paymaster_and_data: Bytes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<Bytes>,
}

impl TryFrom<UserOperationRequest> for UserOperationSigned {
    type Error = UserOperationError;

    /// Every gas and fee field must be set; a missing signature becomes empty bytes.
    fn try_from(user_operation: UserOperationRequest) -> Result<Self, Self::Error> {
        fn required(value: Option<U256>, field: &'static str) -> Result<U256, UserOperationError> {
            value.ok_or(UserOperationError::MissingField { field })
        }

        Ok(Self {
            sender: user_operation.sender,
            nonce: user_operation.nonce,
            init_code: user_operation.init_code,
            call_data: user_operation.call_data,
            call_gas_limit: required(user_operation.call_gas_limit, "callGasLimit")?,
            verification_gas_limit: required(
                user_operation.verification_gas_limit,
                "verificationGasLimit",
            )?,
            pre_verification_gas: required(
                user_operation.pre_verification_gas,
                "preVerificationGas",
            )?,
            max_fee_per_gas: required(user_operation.max_fee_per_gas, "maxFeePerGas")?,
            max_priority_fee_per_gas: required(
                user_operation.max_priority_fee_per_gas,
                "maxPriorityFeePerGas",
            )?,
            paymaster_and_data: user_operation.paymaster_and_data,
            signature: user_operation.signature.unwrap_or_default(),
        })
    }
}

impl From<UserOperationSigned> for UserOperationRequest {
    fn from(user_operation: UserOperationSigned) -> Self {
        Self {
            sender: user_operation.sender,
            nonce: user_operation.nonce,
            init_code: user_operation.init_code,
            call_data: user_operation.call_data,
            call_gas_limit: Some(user_operation.call_gas_limit),
            verification_gas_limit: Some(user_operation.verification_gas_limit),
            pre_verification_gas: Some(user_operation.pre_verification_gas),
            max_fee_per_gas: Some(user_operation.max_fee_per_gas),
            max_priority_fee_per_gas: Some(user_operation.max_priority_fee_per_gas),
            paymaster_and_data: user_operation.paymaster_and_data,
            signature: Some(user_operation.signature),
        }
    }
}

impl UserOperationRequest {
    /// Gas and fee fields that are still unset, in wire order
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            (self.call_gas_limit.is_none(), "callGasLimit"),
            (self.verification_gas_limit.is_none(), "verificationGasLimit"),
            (self.pre_verification_gas.is_none(), "preVerificationGas"),
            (self.max_fee_per_gas.is_none(), "maxFeePerGas"),
            (self.max_priority_fee_per_gas.is_none(), "maxPriorityFeePerGas"),
        ]
        .into_iter()
        .filter_map(|(missing, field)| missing.then_some(field))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> UserOperationRequest {
        UserOperationRequest {
            sender: Address::repeat_byte(0xaa),
            nonce: 3.into(),
            call_data: "0xb61d27f6".parse().unwrap(),
            call_gas_limit: Some(10.into()),
            verification_gas_limit: Some(20.into()),
            pre_verification_gas: Some(30.into()),
            max_fee_per_gas: Some(40.into()),
            max_priority_fee_per_gas: Some(5.into()),
            ..Default::default()
        }
    }

    #[test]
    fn complete_request_converts() {
        let uo = UserOperationSigned::try_from(complete()).unwrap();
        assert_eq!(uo.call_gas_limit, 10.into());
        assert_eq!(uo.max_priority_fee_per_gas, 5.into());
        assert!(uo.signature.is_empty());
        assert_eq!(UserOperationRequest::from(uo.clone()).signature, Some(Bytes::default()));
    }

    #[test]
    fn missing_gas_field_is_rejected() {
        let mut req = complete();
        req.pre_verification_gas = None;
        assert_eq!(req.missing_fields(), vec!["preVerificationGas"]);
        assert_eq!(
            UserOperationSigned::try_from(req).unwrap_err(),
            UserOperationError::MissingField { field: "preVerificationGas" }
        );
    }

    #[test]
    fn unset_fields_are_not_serialized() {
        let value = serde_json::to_value(UserOperationRequest::default()).unwrap();
        let obj = value.as_object().unwrap();
        assert!(obj.contains_key("sender"));
        assert!(obj.contains_key("callData"));
        assert!(!obj.contains_key("callGasLimit"));
        assert!(!obj.contains_key("signature"));
    }
}
