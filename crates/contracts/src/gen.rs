use ethers::contract::abigen;

abigen!(
    EntryPointAPI,
    r#"[
        function getNonce(address sender, uint192 key) external view returns (uint256 nonce)
        function balanceOf(address account) external view returns (uint256)
    ]"#
);

abigen!(
    SimpleAccountV06API,
    r#"[
        function execute(address dest, uint256 value, bytes calldata func) external
        function executeBatch(address[] calldata dest, bytes[] calldata func) external
    ]"#
);

abigen!(
    SimpleAccountV07API,
    r#"[
        function execute(address dest, uint256 value, bytes calldata func) external
        function executeBatch(address[] calldata dest, uint256[] calldata value, bytes[] calldata func) external
    ]"#
);

abigen!(
    SimpleAccountFactoryAPI,
    r#"[
        function createAccount(address owner, uint256 salt) external returns (address)
        function getAddress(address owner, uint256 salt) external view returns (address)
    ]"#
);
