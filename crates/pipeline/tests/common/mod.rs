#![allow(dead_code)]

use ethers::{
    abi::{encode, Token},
    types::{Address, U256},
};
use keel_primitives::{EntryPoint, UserOperationSigned, UserOperationWire};
pub use keel_test_utils::{handler, rpc_error, Handler, MockUpstream};
use serde_json::{json, Value};

pub const CHAIN_ID: u64 = 11_155_111;
pub const PHRASE: &str = "test test test test test test test test test test test junk";
pub const SENDER: &str = "0x9c5754De1443984659E1b3a8d1931D83475ba29C";
pub const BASE_FEE: u64 = 60;
pub const PRIORITY_FEE: u64 = 2;

pub fn sender() -> Address {
    SENDER.parse().unwrap()
}

fn word(token: Token) -> Value {
    json!(format!("0x{}", hex_string(&encode(&[token]))))
}

fn hex_string(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn call_data(params: &Value) -> String {
    let tx = &params[0];
    tx.get("data").or_else(|| tx.get("input")).and_then(Value::as_str).unwrap_or_default().to_string()
}

pub fn block() -> Value {
    let zero_hash = format!("0x{}", "00".repeat(32));
    json!({
        "hash": format!("0x{}", "11".repeat(32)),
        "parentHash": zero_hash,
        "sha3Uncles": zero_hash,
        "miner": "0x0000000000000000000000000000000000000000",
        "stateRoot": zero_hash,
        "transactionsRoot": zero_hash,
        "receiptsRoot": zero_hash,
        "number": "0x10",
        "gasUsed": "0x0",
        "gasLimit": "0x1c9c380",
        "extraData": "0x",
        "logsBloom": format!("0x{}", "00".repeat(256)),
        "timestamp": "0x6553f100",
        "difficulty": "0x0",
        "totalDifficulty": "0x0",
        "sealFields": [],
        "uncles": [],
        "transactions": [],
        "size": "0x220",
        "mixHash": zero_hash,
        "nonce": "0x0000000000000000",
        "baseFeePerGas": format!("{:#x}", BASE_FEE),
    })
}

pub fn receipt(user_operation_hash: &str) -> Value {
    let zero_hash = format!("0x{}", "00".repeat(32));
    json!({
        "userOpHash": user_operation_hash,
        "sender": SENDER,
        "nonce": "0x1",
        "actualGasCost": "0x1c6bf52634000",
        "actualGasUsed": "0x1d4c0",
        "success": true,
        "logs": [],
        "receipt": {
            "transactionHash": format!("0x{}", "22".repeat(32)),
            "transactionIndex": "0x0",
            "blockHash": zero_hash,
            "blockNumber": "0x10",
            "from": "0x0000000000000000000000000000000000000001",
            "to": "0x5ff137d4b0fdcd49dca30c7cf57e578a026d2789",
            "cumulativeGasUsed": "0x1d4c0",
            "gasUsed": "0x1d4c0",
            "contractAddress": null,
            "logs": [],
            "status": "0x1",
            "logsBloom": format!("0x{}", "00".repeat(256)),
            "type": "0x2",
            "effectiveGasPrice": "0x3e"
        }
    })
}

/// Node serving the account lookups; `deployed` decides what `eth_getCode` returns
pub async fn node(deployed: bool) -> MockUpstream {
    MockUpstream::builder()
        .method("eth_chainId", |_| Ok(json!(format!("{CHAIN_ID:#x}"))))
        .method("eth_getCode", move |_| Ok(json!(if deployed { "0x6080604052" } else { "0x" })))
        .method("eth_getBlockByNumber", |_| Ok(block()))
        .method("eth_call", |params| {
            let data = call_data(&params);
            if data.starts_with("0x8cb84e18") {
                Ok(word(Token::Address(sender())))
            } else if data.starts_with("0x35567e1a") {
                Ok(word(Token::Uint(U256::one())))
            } else if data.starts_with("0x70a08231") {
                Ok(word(Token::Uint(U256::from(1_000_000u64))))
            } else {
                Err(rpc_error(-32000, "execution reverted"))
            }
        })
        .start()
        .await
}

/// Hash the bundler would compute for the first param of `eth_sendUserOperation`
pub fn wire_hash(params: &Value, entry_point: &EntryPoint) -> Value {
    let wire: UserOperationWire = serde_json::from_value(params[0].clone()).unwrap();
    let uo = UserOperationSigned::try_from(wire.into_request().unwrap()).unwrap();
    json!(uo.hash(entry_point, CHAIN_ID).unwrap())
}

pub fn gas_estimate() -> Value {
    json!({
        "preVerificationGas": "0xac18",
        "verificationGasLimit": "0xecd0",
        "callGasLimit": "0x814c",
    })
}

/// Bundler with fee oracle, gas estimation and submission; `extra` adds or replaces methods
pub async fn bundler(extra: Vec<(&'static str, Handler)>) -> MockUpstream {
    bundler_for(EntryPoint::v06(), extra).await
}

/// Bundler hashing submitted user operations for `entry_point`
pub async fn bundler_for(
    entry_point: EntryPoint,
    extra: Vec<(&'static str, Handler)>,
) -> MockUpstream {
    let mut builder = MockUpstream::builder()
        .method("rundler_maxPriorityFeePerGas", |_| Ok(json!(format!("{PRIORITY_FEE:#x}"))))
        .method("eth_estimateUserOperationGas", |_| Ok(gas_estimate()))
        .method("eth_sendUserOperation", move |params| Ok(wire_hash(&params, &entry_point)))
        .method("eth_supportedEntryPoints", |_| {
            Ok(json!(["0x5FF137D4b0FDCD49DcA30c7CF57E578a026d2789"]))
        });
    for (name, handler) in extra {
        builder = builder.method(name, handler);
    }
    builder.start().await
}
