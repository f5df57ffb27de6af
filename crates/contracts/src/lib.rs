//! Account abstraction (ERC-4337) smart contract interfaces

pub mod entry_point;
mod error;
mod gen;
pub mod simple_account;

pub use entry_point::EntryPointContract;
pub use error::{entry_point_error_code, ContractCallError};
pub use gen::{EntryPointAPI, SimpleAccountFactoryAPI, SimpleAccountV06API, SimpleAccountV07API};
pub use simple_account::SimpleAccountFactory;
