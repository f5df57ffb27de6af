//! Call data and init code of the reference SimpleAccount and its factory

use crate::{
    error::ContractCallError,
    gen::{
        simple_account_factory_api, simple_account_v06api, simple_account_v07api,
        SimpleAccountFactoryAPI,
    },
};
use ethers::{
    abi::AbiEncode,
    providers::Middleware,
    types::{Address, Bytes, U256},
};
use keel_primitives::EntryPointVersion;
use std::sync::Arc;

/// `execute(dest, value, func)` (same selector on v0.6 and v0.7 accounts)
pub fn encode_execute(dest: Address, value: U256, func: Bytes) -> Bytes {
    simple_account_v06api::ExecuteCall { dest, value, func }.encode().into()
}

/// `executeBatch` in the layout of the account's EntryPoint version
///
/// v0.6 accounts take `(address[], bytes[])` and cannot forward value, so any non-zero value is
/// rejected. v0.7 accounts take `(address[], uint256[], bytes[])`.
pub fn encode_execute_batch(
    version: EntryPointVersion,
    calls: &[(Address, U256, Bytes)],
) -> Result<Bytes, ContractCallError> {
    let dest = calls.iter().map(|(dest, _, _)| *dest).collect::<Vec<_>>();
    let func = calls.iter().map(|(_, _, func)| func.clone()).collect::<Vec<_>>();

    match version {
        EntryPointVersion::V06 => {
            if calls.iter().any(|(_, value, _)| !value.is_zero()) {
                return Err(ContractCallError::BatchValueUnsupported);
            }
            Ok(simple_account_v06api::ExecuteBatchCall { dest, func }.encode().into())
        }
        EntryPointVersion::V07 => {
            let value = calls.iter().map(|(_, value, _)| *value).collect::<Vec<_>>();
            Ok(simple_account_v07api::ExecuteBatchCall { dest, value, func }.encode().into())
        }
    }
}

/// `factory ++ createAccount(owner, salt)`
pub fn encode_init_code(factory: Address, owner: Address, salt: U256) -> Bytes {
    [
        factory.as_bytes().to_vec(),
        simple_account_factory_api::CreateAccountCall { owner, salt }.encode(),
    ]
    .concat()
    .into()
}

/// SimpleAccountFactory deployment
#[derive(Clone)]
pub struct SimpleAccountFactory<M: Middleware + 'static> {
    address: Address,
    factory_api: SimpleAccountFactoryAPI<M>,
}

impl<M: Middleware + 'static> SimpleAccountFactory<M> {
    pub fn new(eth_client: Arc<M>, address: Address) -> Self {
        Self { address, factory_api: SimpleAccountFactoryAPI::new(address, eth_client) }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Counterfactual address of the account owned by `owner` with `salt`
    pub async fn get_address(&self, owner: Address, salt: U256) -> Result<Address, ContractCallError> {
        self.factory_api
            .get_address(owner, salt)
            .call()
            .await
            .map_err(ContractCallError::from_contract_error)
    }

    pub fn init_code(&self, owner: Address, salt: U256) -> Bytes {
        encode_init_code(self.address, owner, salt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(byte: u8, value: u64) -> (Address, U256, Bytes) {
        (Address::repeat_byte(byte), value.into(), Bytes::from(vec![byte; 4]))
    }

    #[test]
    fn execute_matches_known_encoding() {
        let data = encode_execute(
            "0x9c5754De1443984659E1b3a8d1931D83475ba29C".parse().unwrap(),
            100_000_000_000_000_u64.into(),
            Bytes::default(),
        );
        assert_eq!(data, "0xb61d27f60000000000000000000000009c5754de1443984659e1b3a8d1931d83475ba29c00000000000000000000000000000000000000000000000000005af3107a400000000000000000000000000000000000000000000000000000000000000000600000000000000000000000000000000000000000000000000000000000000000".parse::<Bytes>().unwrap());
    }

    #[test]
    fn batch_selectors() {
        let calls = vec![call(0xaa, 0), call(0xbb, 0)];
        let v06 = encode_execute_batch(EntryPointVersion::V06, &calls).unwrap();
        assert_eq!(&v06[0..4], &[0x18, 0xdf, 0xb3, 0xc7]);
        let v07 = encode_execute_batch(EntryPointVersion::V07, &calls).unwrap();
        assert_eq!(&v07[0..4], &[0x47, 0xe1, 0xda, 0x2a]);

        let concatenated = [
            encode_execute(calls[0].0, calls[0].1, calls[0].2.clone()).to_vec(),
            encode_execute(calls[1].0, calls[1].1, calls[1].2.clone()).to_vec(),
        ]
        .concat();
        assert_ne!(v06.to_vec(), concatenated);
    }

    #[test]
    fn v06_batch_rejects_value() {
        let calls = vec![call(0xaa, 1)];
        assert_eq!(
            encode_execute_batch(EntryPointVersion::V06, &calls),
            Err(ContractCallError::BatchValueUnsupported)
        );
        assert!(encode_execute_batch(EntryPointVersion::V07, &calls).is_ok());
    }

    #[test]
    fn init_code_layout() {
        let init_code = encode_init_code(
            "0x9406Cc6185a346906296840746125a0E44976454".parse().unwrap(),
            "0xce0fefa6f7979c4c9b5373e0f5105b7259092c6d".parse().unwrap(),
            U256::zero(),
        );
        assert_eq!(init_code, "0x9406cc6185a346906296840746125a0e449764545fbfb9cf000000000000000000000000ce0fefa6f7979c4c9b5373e0f5105b7259092c6d0000000000000000000000000000000000000000000000000000000000000000".parse::<Bytes>().unwrap());
    }
}
