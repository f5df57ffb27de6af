//! Account abstraction (ERC-4337) primitive types
//!
//! This crate contains the user operation types, the EntryPoint-version aware hasher, wire
//! formats spoken by bundlers and paymasters, and the local wallet used for signing.

pub mod constants;
mod entry_point;
mod error;
mod user_operation;
mod utils;
mod wallet;

pub use entry_point::{EntryPoint, EntryPointVersion};
pub use error::{UserOperationError, WalletError};
pub use user_operation::{
    UserOperation, UserOperationByHash, UserOperationGasEstimation, UserOperationHash,
    UserOperationReceipt, UserOperationRequest, UserOperationSigned, UserOperationWire,
};
pub use utils::{
    get_address, pack_factory_data, pack_paymaster_data, pack_uint128, to_uint128,
    unpack_factory_data, unpack_paymaster_data, unpack_uint128,
};
pub use wallet::Wallet;
