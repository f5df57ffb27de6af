use crate::utils::{
    parse_address, parse_bytes, parse_duration, parse_entry_point_version, parse_header,
    parse_multiplier, parse_sponsorship_mode, parse_u256,
};
use clap::Parser;
use ethers::types::{Address, Bytes, U256};
use expanded_pathbuf::ExpandedPathBuf;
use keel_pipeline::{
    Call, Erc20Context, FeePolicy, FeeRule, GasOverride, SponsorshipMode, SponsorshipPolicy,
    UserOperationIntent, UserOperationOverrides,
};
use keel_primitives::{
    constants::{
        simple_account::{FACTORY_V06, FACTORY_V07},
        transport::RETRY_COUNT,
    },
    EntryPoint, EntryPointVersion,
};
use keel_transport::{ConfigurationError, EndpointConfig, HeaderStore, RoutedTransport};
use std::time::Duration;

/// Upstream endpoints and retry policy
#[derive(Debug, Clone, Parser, PartialEq)]
pub struct TransportArgs {
    /// Node RPC URL, serving every method no other endpoint claims
    #[clap(long, default_value = "http://127.0.0.1:8545")]
    pub node_url: String,

    /// Bundler (and paymaster) RPC URL
    ///
    /// Defaults to the node URL.
    #[clap(long)]
    pub bundler_url: Option<String>,

    /// Endpoint serving the chain-agnostic wallet methods
    #[clap(long)]
    pub chain_agnostic_url: Option<String>,

    /// Header sent with every request, as `name:value` (repeatable)
    #[clap(long = "header", value_parser=parse_header)]
    pub headers: Vec<(String, String)>,

    /// Retries after a failed attempt (connection errors, 429 and 5xx responses)
    #[clap(long, default_value_t = RETRY_COUNT)]
    pub retry_count: u32,

    /// Delay between attempts (in milliseconds)
    #[clap(long, value_parser=parse_duration)]
    pub retry_delay: Option<Duration>,
}

impl TransportArgs {
    fn endpoint(&self, url: &str) -> EndpointConfig {
        let endpoint = EndpointConfig::new(url).retry_count(self.retry_count);
        match self.retry_delay {
            Some(delay) => endpoint.retry_delay(delay),
            None => endpoint,
        }
    }

    pub fn to_transport(&self) -> Result<RoutedTransport, ConfigurationError> {
        let headers = HeaderStore::new();
        for (name, value) in &self.headers {
            headers.set(name, value)?;
        }

        let mut builder = RoutedTransport::builder()
            .headers(headers)
            .node(self.endpoint(&self.node_url))
            .bundler(self.endpoint(self.bundler_url.as_deref().unwrap_or(&self.node_url)));
        if let Some(url) = &self.chain_agnostic_url {
            builder = builder.chain_agnostic(self.endpoint(url));
        }
        builder.build()
    }
}

/// EntryPoint the user operation is bound to
#[derive(Debug, Clone, Parser, PartialEq)]
pub struct EntryPointArgs {
    /// EntryPoint version (v0.6 or v0.7)
    #[clap(long, default_value = "v0.6", value_parser=parse_entry_point_version)]
    pub entry_point_version: EntryPointVersion,

    /// EntryPoint address, if not deployed at the canonical address of its version
    #[clap(long, value_parser=parse_address)]
    pub entry_point: Option<Address>,
}

impl EntryPointArgs {
    pub fn entry_point(&self) -> EntryPoint {
        EntryPoint::new(
            self.entry_point.unwrap_or_else(|| self.entry_point_version.canonical_address()),
            self.entry_point_version,
        )
    }
}

/// SimpleAccount owned by the key derived from a mnemonic
#[derive(Debug, Clone, Parser)]
pub struct AccountArgs {
    /// Path to the file with the owner's mnemonic phrase
    #[clap(long)]
    pub mnemonic_file: ExpandedPathBuf,

    #[clap(flatten)]
    pub entry_point: EntryPointArgs,

    /// SimpleAccountFactory address
    ///
    /// Defaults to the reference factory of the EntryPoint version.
    #[clap(long, value_parser=parse_address)]
    pub factory: Option<Address>,

    /// Salt of the counterfactual account address
    #[clap(long, default_value = "0", value_parser=parse_u256)]
    pub salt: U256,

    /// Account address, skipping the factory lookup
    #[clap(long, value_parser=parse_address)]
    pub sender: Option<Address>,
}

impl AccountArgs {
    pub fn factory(&self) -> Result<Address, String> {
        match self.factory {
            Some(factory) => Ok(factory),
            None => parse_address(match self.entry_point.entry_point_version {
                EntryPointVersion::V06 => FACTORY_V06,
                EntryPointVersion::V07 => FACTORY_V07,
            }),
        }
    }
}

/// Fee policy, gas overrides and nonce
#[derive(Debug, Clone, Parser, PartialEq)]
pub struct FeeArgs {
    /// Fixed max fee per gas (wei), skipping fee estimation for this field
    #[clap(long, value_parser=parse_u256)]
    pub max_fee_per_gas: Option<U256>,

    /// Fixed max priority fee per gas (wei)
    #[clap(long, value_parser=parse_u256)]
    pub max_priority_fee_per_gas: Option<U256>,

    /// Multiplier applied to the latest base fee
    #[clap(long, value_parser=parse_multiplier, conflicts_with = "max_fee_per_gas")]
    pub base_fee_multiplier: Option<f64>,

    /// Multiplier applied to the bundler's priority fee
    #[clap(long, value_parser=parse_multiplier, conflicts_with = "max_priority_fee_per_gas")]
    pub priority_fee_multiplier: Option<f64>,

    #[clap(long, value_parser=parse_u256)]
    pub call_gas_limit: Option<U256>,

    #[clap(long, value_parser=parse_u256)]
    pub verification_gas_limit: Option<U256>,

    #[clap(long, value_parser=parse_u256)]
    pub pre_verification_gas: Option<U256>,

    /// Multiplier applied to the estimated call gas limit
    #[clap(long, value_parser=parse_multiplier, conflicts_with = "call_gas_limit")]
    pub call_gas_multiplier: Option<f64>,

    /// Multiplier applied to the estimated verification gas limit
    #[clap(long, value_parser=parse_multiplier, conflicts_with = "verification_gas_limit")]
    pub verification_gas_multiplier: Option<f64>,

    /// Multiplier applied to the estimated pre-verification gas
    #[clap(long, value_parser=parse_multiplier, conflicts_with = "pre_verification_gas")]
    pub pre_verification_gas_multiplier: Option<f64>,

    /// Nonce key (the upper 192 bits of the nonce)
    #[clap(long, value_parser=parse_u256)]
    pub nonce_key: Option<U256>,

    /// Explicit nonce, skipping the EntryPoint lookup
    #[clap(long, value_parser=parse_u256, conflicts_with = "nonce_key")]
    pub nonce: Option<U256>,
}

fn gas_override(absolute: Option<U256>, multiplier: Option<f64>) -> Option<GasOverride> {
    absolute.map(GasOverride::Absolute).or(multiplier.map(GasOverride::Multiplier))
}

impl FeeArgs {
    pub fn fee_policy(&self) -> FeePolicy {
        let rule = |multiplier: Option<f64>| multiplier.map_or(FeeRule::Upstream, FeeRule::Multiplier);
        FeePolicy {
            max_fee_per_gas: rule(self.base_fee_multiplier),
            max_priority_fee_per_gas: rule(self.priority_fee_multiplier),
        }
    }

    pub fn overrides(&self) -> UserOperationOverrides {
        UserOperationOverrides {
            nonce_key: self.nonce_key,
            nonce: self.nonce,
            max_fee_per_gas: self.max_fee_per_gas,
            max_priority_fee_per_gas: self.max_priority_fee_per_gas,
            call_gas_limit: gas_override(self.call_gas_limit, self.call_gas_multiplier),
            verification_gas_limit: gas_override(
                self.verification_gas_limit,
                self.verification_gas_multiplier,
            ),
            pre_verification_gas: gas_override(
                self.pre_verification_gas,
                self.pre_verification_gas_multiplier,
            ),
            paymaster_and_data: None,
        }
    }
}

/// Gas sponsorship
#[derive(Debug, Clone, Parser, PartialEq)]
pub struct PaymasterArgs {
    /// Paymaster policy id, tried in the order given (repeatable)
    #[clap(long = "policy-id")]
    pub policy_ids: Vec<String>,

    /// Ask the paymaster for sponsorship without a policy id
    #[clap(long)]
    pub sponsor: bool,

    /// Paymaster negotiation: two-phase, combined or legacy
    #[clap(long, default_value = "two-phase", value_parser=parse_sponsorship_mode)]
    pub sponsorship_mode: SponsorshipMode,

    /// ERC-20 token paying for gas
    #[clap(long, value_parser=parse_address)]
    pub erc20_token: Option<Address>,

    /// Upper bound of the token amount the paymaster may charge
    #[clap(long, value_parser=parse_u256, requires = "erc20_token")]
    pub erc20_max_amount: Option<U256>,

    /// Raw paymasterAndData, bypassing sponsorship
    #[clap(long, value_parser=parse_bytes, conflicts_with_all = ["policy_ids", "sponsor", "erc20_token"])]
    pub paymaster_and_data: Option<Bytes>,
}

impl PaymasterArgs {
    pub fn sponsorship(&self) -> Option<SponsorshipPolicy> {
        if self.policy_ids.is_empty() && !self.sponsor && self.erc20_token.is_none() {
            return None;
        }

        let policy = SponsorshipPolicy::new(self.policy_ids.clone()).mode(self.sponsorship_mode);
        Some(match self.erc20_token {
            Some(token_address) => policy
                .erc20(Erc20Context { token_address, max_token_amount: self.erc20_max_amount }),
            None => policy,
        })
    }
}

/// Calls executed by the smart account
#[derive(Debug, Clone, Parser, PartialEq)]
pub struct CallArgs {
    /// Call target (repeatable; more than one makes a batch)
    #[clap(long = "to", required = true, value_parser=parse_address)]
    pub targets: Vec<Address>,

    /// Wei sent with each call, in target order
    #[clap(long = "value", value_parser=parse_u256)]
    pub values: Vec<U256>,

    /// Call data of each call, in target order
    #[clap(long = "data", value_parser=parse_bytes)]
    pub data: Vec<Bytes>,
}

impl CallArgs {
    pub fn intent(&self) -> Result<UserOperationIntent, String> {
        let n = self.targets.len();
        if !self.values.is_empty() && self.values.len() != n {
            return Err(format!("Expected {n} values, got {}", self.values.len()));
        }
        if !self.data.is_empty() && self.data.len() != n {
            return Err(format!("Expected {n} call data, got {}", self.data.len()));
        }

        let mut calls: Vec<Call> = self
            .targets
            .iter()
            .enumerate()
            .map(|(i, target)| {
                Call::new(
                    *target,
                    self.values.get(i).copied().unwrap_or_default(),
                    self.data.get(i).cloned().unwrap_or_default(),
                )
            })
            .collect();

        Ok(match calls.len() {
            1 => UserOperationIntent::Single(calls.remove(0)),
            _ => UserOperationIntent::Batch(calls),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{path::PathBuf, str::FromStr};

    const TARGET: &str = "0x000000000000000000000000000000000000aaaa";

    fn address(s: &str) -> Address {
        Address::from_str(s).unwrap()
    }

    #[test]
    fn transport_args() {
        let args = vec![
            "transportargs",
            "--node-url",
            "http://node.local",
            "--bundler-url",
            "http://bundler.local",
            "--header",
            "x-api-key:secret",
            "--retry-count",
            "5",
            "--retry-delay",
            "100",
        ];
        assert_eq!(
            TransportArgs {
                node_url: "http://node.local".into(),
                bundler_url: Some("http://bundler.local".into()),
                chain_agnostic_url: None,
                headers: vec![("x-api-key".into(), "secret".into())],
                retry_count: 5,
                retry_delay: Some(Duration::from_millis(100)),
            },
            TransportArgs::try_parse_from(args).unwrap()
        );
    }

    #[test]
    fn transport_defaults_to_local_node() {
        let args = TransportArgs::try_parse_from(vec!["transportargs"]).unwrap();
        assert_eq!(args.node_url, "http://127.0.0.1:8545");
        assert_eq!(args.retry_count, RETRY_COUNT);

        let transport = args.to_transport().unwrap();
        assert_eq!(transport.router().fallback().url().as_str(), "http://127.0.0.1:8545/");
    }

    #[test]
    fn invalid_header_is_rejected() {
        assert!(TransportArgs::try_parse_from(vec!["transportargs", "--header", "nope"]).is_err());
    }

    #[test]
    fn account_args() {
        let args = vec![
            "accountargs",
            "--mnemonic-file",
            "/tmp/keel/mnemonic",
            "--entry-point-version",
            "v0.7",
            "--salt",
            "0x2a",
        ];
        let parsed = AccountArgs::try_parse_from(args).unwrap();
        assert_eq!(parsed.mnemonic_file.to_path_buf(), PathBuf::from("/tmp/keel/mnemonic"));
        assert_eq!(
            parsed.entry_point,
            EntryPointArgs { entry_point_version: EntryPointVersion::V07, entry_point: None }
        );
        assert_eq!(parsed.factory, None);
        assert_eq!(parsed.salt, U256::from(42));
        assert_eq!(parsed.sender, None);
        assert_eq!(parsed.entry_point.entry_point(), EntryPoint::v07());
        assert_eq!(parsed.factory().unwrap(), address(FACTORY_V07));
    }

    #[test]
    fn entry_point_override() {
        let args = EntryPointArgs::try_parse_from(vec![
            "entrypointargs",
            "--entry-point",
            TARGET,
        ])
        .unwrap();
        assert_eq!(args.entry_point_version, EntryPointVersion::V06);
        assert_eq!(args.entry_point().address, address(TARGET));
    }

    #[test]
    fn fee_args() {
        let args = FeeArgs::try_parse_from(vec![
            "feeargs",
            "--max-priority-fee-per-gas",
            "3",
            "--base-fee-multiplier",
            "1.5",
            "--call-gas-limit",
            "100000",
            "--verification-gas-multiplier",
            "1.2",
            "--nonce-key",
            "7",
        ])
        .unwrap();

        assert_eq!(
            args.fee_policy(),
            FeePolicy {
                max_fee_per_gas: FeeRule::Multiplier(1.5),
                max_priority_fee_per_gas: FeeRule::Upstream,
            }
        );

        let overrides = args.overrides();
        assert_eq!(overrides.max_priority_fee_per_gas, Some(U256::from(3)));
        assert_eq!(overrides.max_fee_per_gas, None);
        assert_eq!(overrides.call_gas_limit, Some(GasOverride::Absolute(U256::from(100_000))));
        assert_eq!(overrides.verification_gas_limit, Some(GasOverride::Multiplier(1.2)));
        assert_eq!(overrides.pre_verification_gas, None);
        assert_eq!(overrides.nonce_key, Some(U256::from(7)));
    }

    #[test]
    fn conflicting_fee_args() {
        assert!(FeeArgs::try_parse_from(vec![
            "feeargs",
            "--max-fee-per-gas",
            "10",
            "--base-fee-multiplier",
            "1.1",
        ])
        .is_err());
        assert!(FeeArgs::try_parse_from(vec!["feeargs", "--call-gas-multiplier", "-2"]).is_err());
    }

    #[test]
    fn no_sponsorship_by_default() {
        let args = PaymasterArgs::try_parse_from(vec!["paymasterargs"]).unwrap();
        assert_eq!(args.sponsorship(), None);
    }

    #[test]
    fn sponsorship_policies() {
        let args = PaymasterArgs::try_parse_from(vec![
            "paymasterargs",
            "--policy-id",
            "first",
            "--policy-id",
            "second",
            "--sponsorship-mode",
            "combined",
            "--erc20-token",
            TARGET,
        ])
        .unwrap();

        let policy = args.sponsorship().unwrap();
        assert_eq!(policy.policy_ids, vec!["first".to_string(), "second".to_string()]);
        assert_eq!(policy.mode, SponsorshipMode::Combined);
        assert_eq!(
            policy.erc20,
            Some(Erc20Context { token_address: address(TARGET), max_token_amount: None })
        );

        let args = PaymasterArgs::try_parse_from(vec!["paymasterargs", "--sponsor"]).unwrap();
        assert_eq!(args.sponsorship(), Some(SponsorshipPolicy::default()));
    }

    #[test]
    fn paymaster_and_data_excludes_sponsorship() {
        assert!(PaymasterArgs::try_parse_from(vec![
            "paymasterargs",
            "--paymaster-and-data",
            "0x1234",
            "--sponsor",
        ])
        .is_err());
    }

    #[test]
    fn single_call() {
        let args = CallArgs::try_parse_from(vec![
            "callargs",
            "--to",
            TARGET,
            "--value",
            "1000",
            "--data",
            "0xdeadbeef",
        ])
        .unwrap();
        assert_eq!(
            args.intent().unwrap(),
            UserOperationIntent::Single(Call::new(
                address(TARGET),
                U256::from(1000),
                Bytes::from(vec![0xde, 0xad, 0xbe, 0xef])
            ))
        );
    }

    #[test]
    fn batch_of_calls() {
        let args =
            CallArgs::try_parse_from(vec!["callargs", "--to", TARGET, "--to", TARGET]).unwrap();
        match args.intent().unwrap() {
            UserOperationIntent::Batch(calls) => {
                assert_eq!(calls.len(), 2);
                assert!(calls.iter().all(|call| call.value.is_zero() && call.data.is_empty()));
            }
            intent => panic!("expected a batch, got {intent:?}"),
        }

        let args =
            CallArgs::try_parse_from(vec!["callargs", "--to", TARGET, "--to", TARGET, "--value", "1"])
                .unwrap();
        assert!(args.intent().is_err());
    }

    #[test]
    fn call_target_is_required() {
        assert!(CallArgs::try_parse_from(vec!["callargs"]).is_err());
    }
}
