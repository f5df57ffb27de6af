//! Checksum serializers and the byte layouts EntryPoint v0.7 packs fields into

use crate::error::UserOperationError;
use ethers::{
    types::{Address, Bytes, U256},
    utils::to_checksum,
};

const ADDRESS_LEN: usize = 20;
const UINT128_LEN: usize = 16;

/// Serializes an address in its EIP-55 checksum form
pub fn as_checksum_addr<S>(val: &Address, s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    s.serialize_str(&to_checksum(val, None))
}

pub fn as_checksum_addr_opt<S>(val: &Option<Address>, s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match val {
        Some(addr) => as_checksum_addr(addr, s),
        None => s.serialize_none(),
    }
}

/// Address in the leading 20 bytes, if there are that many
pub fn get_address(buf: &[u8]) -> Option<Address> {
    buf.get(..ADDRESS_LEN).map(Address::from_slice)
}

/// Splits v0.7 `paymasterAndData` into paymaster, verification gas limit, post-op gas limit and
/// paymaster data
///
/// Empty input has no paymaster. A bare 20-byte address yields zero gas limits and empty data.
/// Anything shorter than the 52-byte header is rejected.
pub fn unpack_paymaster_data(
    buf: &[u8],
) -> Result<Option<(Address, U256, U256, Bytes)>, UserOperationError> {
    if buf.is_empty() {
        return Ok(None);
    }
    let Some(paymaster) = get_address(buf) else {
        return Err(UserOperationError::MalformedPaymasterAndData { len: buf.len() });
    };
    let rest = &buf[ADDRESS_LEN..];
    if rest.is_empty() {
        return Ok(Some((paymaster, U256::zero(), U256::zero(), Bytes::default())));
    }
    match rest.get(..2 * UINT128_LEN) {
        Some(limits) => {
            let (verification, post_op) = unpack_uint128(limits);
            let data = Bytes::from(rest[2 * UINT128_LEN..].to_vec());
            Ok(Some((paymaster, verification, post_op, data)))
        }
        None => Err(UserOperationError::MalformedPaymasterAndData { len: buf.len() }),
    }
}

/// `paymaster ‖ uint128 verification gas ‖ uint128 post-op gas ‖ data`; empty for the zero
/// address
pub fn pack_paymaster_data(
    addr: Address,
    paymaster_verification_gas_limit: U256,
    paymaster_post_op_gas_limit: U256,
    paymaster_data: &Bytes,
) -> Result<Vec<u8>, UserOperationError> {
    if addr.is_zero() {
        return Ok(Vec::new());
    }
    let limits = pack_uint128(
        to_uint128(paymaster_verification_gas_limit, "paymasterVerificationGasLimit")?,
        to_uint128(paymaster_post_op_gas_limit, "paymasterPostOpGasLimit")?,
    );
    Ok(addr.as_bytes().iter().chain(limits.iter()).chain(paymaster_data.iter()).copied().collect())
}

/// `factory ‖ factoryData`; empty for the zero address
pub fn pack_factory_data(factory: Address, factory_data: &Bytes) -> Vec<u8> {
    if factory.is_zero() {
        return Vec::new();
    }
    factory.as_bytes().iter().chain(factory_data.iter()).copied().collect()
}

pub fn unpack_factory_data(init_code: &[u8]) -> Option<(Address, Bytes)> {
    get_address(init_code).map(|factory| (factory, Bytes::from(init_code[ADDRESS_LEN..].to_vec())))
}

/// `value` as a uint128, failing with the name of `field` when it is wider
pub fn to_uint128(value: U256, field: &'static str) -> Result<u128, UserOperationError> {
    if value.bits() > 128 {
        return Err(UserOperationError::Uint128Overflow { field });
    }
    Ok(value.as_u128())
}

/// Two big-endian uint128 in one word
pub fn pack_uint128(high: u128, low: u128) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[..UINT128_LEN].copy_from_slice(&high.to_be_bytes());
    word[UINT128_LEN..].copy_from_slice(&low.to_be_bytes());
    word
}

/// Inverse of [pack_uint128]; `buf` must hold at least 32 bytes
pub fn unpack_uint128(buf: &[u8]) -> (U256, U256) {
    let (high, low) = buf[..2 * UINT128_LEN].split_at(UINT128_LEN);
    (U256::from_big_endian(high), U256::from_big_endian(low))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uint128_pair_layout() {
        let packed = pack_uint128(100, 200);
        assert_eq!(packed[15], 100);
        assert_eq!(packed[31], 200);
        assert_eq!(unpack_uint128(&packed), (U256::from(100), U256::from(200)));

        assert_eq!(to_uint128(U256::from(u128::MAX), "callGasLimit"), Ok(u128::MAX));
        assert_eq!(
            to_uint128((U256::one() << 128usize) + U256::from(7), "callGasLimit"),
            Err(UserOperationError::Uint128Overflow { field: "callGasLimit" })
        );
    }

    #[test]
    fn init_code_layout() {
        let factory = Address::repeat_byte(0x95);
        let data: Bytes = "0x12345678".parse().unwrap();

        let packed = pack_factory_data(factory, &data);
        assert_eq!(packed.len(), 24);
        assert_eq!(unpack_factory_data(&packed), Some((factory, data.clone())));

        assert!(unpack_factory_data(&[]).is_none());
        assert!(pack_factory_data(Address::zero(), &data).is_empty());
    }

    #[test]
    fn paymaster_data_layout() {
        let paymaster = Address::repeat_byte(0x33);
        let data: Bytes = "0xdead".parse().unwrap();
        let packed = pack_paymaster_data(paymaster, 100_000.into(), 50_000.into(), &data).unwrap();
        assert_eq!(packed.len(), 20 + 32 + 2);
        assert_eq!(
            unpack_paymaster_data(&packed),
            Ok(Some((paymaster, 100_000.into(), 50_000.into(), data.clone())))
        );
        assert_eq!(
            unpack_paymaster_data(paymaster.as_bytes()),
            Ok(Some((paymaster, U256::zero(), U256::zero(), Bytes::default())))
        );
        assert_eq!(unpack_paymaster_data(&[]), Ok(None));
        assert!(pack_paymaster_data(Address::zero(), 1.into(), 1.into(), &data).unwrap().is_empty());
    }

    #[test]
    fn truncated_paymaster_data_is_rejected() {
        assert_eq!(
            unpack_paymaster_data(&[1, 2, 3]),
            Err(UserOperationError::MalformedPaymasterAndData { len: 3 })
        );
        let mut truncated = vec![0x33; 20];
        truncated.extend_from_slice(&[0, 0, 0, 1]);
        assert_eq!(
            unpack_paymaster_data(&truncated),
            Err(UserOperationError::MalformedPaymasterAndData { len: 24 })
        );
    }

    #[test]
    fn wide_paymaster_gas_limit_is_rejected() {
        assert_eq!(
            pack_paymaster_data(Address::repeat_byte(0x33), U256::MAX, 1.into(), &Bytes::default()),
            Err(UserOperationError::Uint128Overflow { field: "paymasterVerificationGasLimit" })
        );
    }
}
