//! EntryPoint identity (address and version)

use crate::constants::entry_point::{ADDRESS_V06, ADDRESS_V07};
use ethers::types::Address;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// EntryPoint versions with distinct user operation layouts
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum EntryPointVersion {
    #[default]
    #[strum(to_string = "v0.6", serialize = "0.6", serialize = "0.6.0")]
    #[serde(rename = "v0.6")]
    V06,
    #[strum(to_string = "v0.7", serialize = "0.7", serialize = "0.7.0")]
    #[serde(rename = "v0.7")]
    V07,
}

impl EntryPointVersion {
    /// Canonical deployment address of this version
    pub fn canonical_address(&self) -> Address {
        match self {
            Self::V06 => ADDRESS_V06.parse().unwrap_or_default(),
            Self::V07 => ADDRESS_V07.parse().unwrap_or_default(),
        }
    }
}

/// EntryPoint contract a smart account is bound to
///
/// The version selects the hashing and wire layout of every user operation sent through it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryPoint {
    pub address: Address,
    pub version: EntryPointVersion,
}

impl EntryPoint {
    pub fn new(address: Address, version: EntryPointVersion) -> Self {
        Self { address, version }
    }

    /// EntryPoint v0.6 at its canonical address
    pub fn v06() -> Self {
        Self::new(EntryPointVersion::V06.canonical_address(), EntryPointVersion::V06)
    }

    /// EntryPoint v0.7 at its canonical address
    pub fn v07() -> Self {
        Self::new(EntryPointVersion::V07.canonical_address(), EntryPointVersion::V07)
    }
}

impl Default for EntryPoint {
    fn default() -> Self {
        Self::v06()
    }
}
