//! Account abstraction (ERC-4337)-related constants

/// Entry point smart contracts
pub mod entry_point {
    /// Address of the v0.6 entry point smart contract
    pub const ADDRESS_V06: &str = "0x5FF137D4b0FDCD49DcA30c7CF57E578a026d2789";
    /// Version of the v0.6 entry point smart contract
    pub const VERSION_V06: &str = "0.6.0";
    /// Address of the v0.7 entry point smart contract
    pub const ADDRESS_V07: &str = "0x0000000071727De22E5E9d8BAf0edAc6f37da032";
    /// Version of the v0.7 entry point smart contract
    pub const VERSION_V07: &str = "0.7.0";
}

/// Reference SimpleAccount deployments
pub mod simple_account {
    /// SimpleAccountFactory paired with the v0.6 entry point
    pub const FACTORY_V06: &str = "0x9406Cc6185a346906296840746125a0E44976454";
    /// SimpleAccountFactory paired with the v0.7 entry point
    pub const FACTORY_V07: &str = "0x91E60e0613810449d098b0b5Ec8b51A0FE8c8985";
    /// ECDSA-shaped signature that passes length checks during gas estimation
    pub const DUMMY_SIGNATURE: &str = "0xfffffffffffffffffffffffffffffff0000000000000000000000000000000007aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa1c";
}

/// JSON-RPC method names
pub mod rpc_methods {
    // bundler
    pub const ETH_SEND_USER_OPERATION: &str = "eth_sendUserOperation";
    pub const ETH_ESTIMATE_USER_OPERATION_GAS: &str = "eth_estimateUserOperationGas";
    pub const ETH_GET_USER_OPERATION_RECEIPT: &str = "eth_getUserOperationReceipt";
    pub const ETH_GET_USER_OPERATION_BY_HASH: &str = "eth_getUserOperationByHash";
    pub const ETH_SUPPORTED_ENTRY_POINTS: &str = "eth_supportedEntryPoints";
    pub const RUNDLER_MAX_PRIORITY_FEE_PER_GAS: &str = "rundler_maxPriorityFeePerGas";

    // paymaster
    pub const PM_GET_PAYMASTER_STUB_DATA: &str = "pm_getPaymasterStubData";
    pub const PM_GET_PAYMASTER_DATA: &str = "pm_getPaymasterData";
    pub const PM_SPONSOR_USER_OPERATION: &str = "pm_sponsorUserOperation";
    pub const ALCHEMY_REQUEST_GAS_AND_PAYMASTER_AND_DATA: &str =
        "alchemy_requestGasAndPaymasterAndData";

    // simulation
    pub const ALCHEMY_SIMULATE_USER_OPERATION_ASSET_CHANGES: &str =
        "alchemy_simulateUserOperationAssetChanges";

    // chain-agnostic wallet api
    pub const WALLET_PREPARE_CALLS: &str = "wallet_prepareCalls";
    pub const WALLET_SEND_PREPARED_CALLS: &str = "wallet_sendPreparedCalls";
    pub const WALLET_REQUEST_ACCOUNT: &str = "wallet_requestAccount";
    pub const WALLET_CREATE_ACCOUNT: &str = "wallet_createAccount";
    pub const WALLET_LIST_ACCOUNTS: &str = "wallet_listAccounts";
    pub const WALLET_CREATE_SESSION: &str = "wallet_createSession";
    pub const WALLET_GET_CALLS_STATUS: &str = "wallet_getCallsStatus";

    /// Methods served by the bundler and paymaster service
    pub const BUNDLER_AND_PAYMASTER: [&str; 11] = [
        ETH_SEND_USER_OPERATION,
        ETH_ESTIMATE_USER_OPERATION_GAS,
        ETH_GET_USER_OPERATION_RECEIPT,
        ETH_GET_USER_OPERATION_BY_HASH,
        ETH_SUPPORTED_ENTRY_POINTS,
        RUNDLER_MAX_PRIORITY_FEE_PER_GAS,
        PM_GET_PAYMASTER_STUB_DATA,
        PM_GET_PAYMASTER_DATA,
        PM_SPONSOR_USER_OPERATION,
        ALCHEMY_REQUEST_GAS_AND_PAYMASTER_AND_DATA,
        ALCHEMY_SIMULATE_USER_OPERATION_ASSET_CHANGES,
    ];

    /// Methods whose routing does not depend on the target chain's node
    pub const CHAIN_AGNOSTIC: [&str; 7] = [
        WALLET_PREPARE_CALLS,
        WALLET_SEND_PREPARED_CALLS,
        WALLET_REQUEST_ACCOUNT,
        WALLET_CREATE_ACCOUNT,
        WALLET_LIST_ACCOUNTS,
        WALLET_CREATE_SESSION,
        WALLET_GET_CALLS_STATUS,
    ];
}

/// Transport defaults
pub mod transport {
    /// Number of retries after the first failed attempt
    pub const RETRY_COUNT: u32 = 3;
    /// Delay between attempts (in milliseconds)
    pub const RETRY_DELAY_MS: u64 = 250;
    /// Polling interval of the ethers provider (in milliseconds)
    pub const POLL_INTERVAL_MS: u64 = 500;
}

/// User operation receipt polling defaults
pub mod receipt {
    /// Delay between `eth_getUserOperationReceipt` calls (in milliseconds)
    pub const POLL_INTERVAL_MS: u64 = 2_000;
    /// Maximum number of receipt lookups
    pub const MAX_ATTEMPTS: u32 = 30;
}

/// Supported chains
pub mod supported_chains {
    use alloy_chains::NamedChain;

    pub const CHAINS: [NamedChain; 12] = [
        NamedChain::Dev,
        NamedChain::Mainnet,
        NamedChain::Sepolia,
        NamedChain::Holesky,
        NamedChain::Optimism,
        NamedChain::OptimismSepolia,
        NamedChain::Arbitrum,
        NamedChain::ArbitrumSepolia,
        NamedChain::Base,
        NamedChain::BaseSepolia,
        NamedChain::Polygon,
        NamedChain::PolygonMumbai,
    ];
}
