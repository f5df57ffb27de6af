use crate::{
    cli::args::{AccountArgs, CallArgs, EntryPointArgs, FeeArgs, PaymasterArgs, TransportArgs},
    utils::{parse_chain, parse_user_operation_hash},
};
use clap::Parser;
use ethers::providers::{Middleware, Provider};
use expanded_pathbuf::ExpandedPathBuf;
use keel_pipeline::{BundlerClient, PipelineConfig, SimpleAccount, SmartAccountClient};
use keel_primitives::{UserOperationHash, UserOperationSigned, UserOperationWire, Wallet};
use keel_transport::RoutedTransport;
use std::sync::Arc;
use tracing::info;

type KeelProvider = Provider<RoutedTransport>;

/// Connects to the upstreams and binds the SimpleAccount owned by the mnemonic's key
async fn account_client(
    transport: &TransportArgs,
    account: &AccountArgs,
    config: PipelineConfig<KeelProvider>,
) -> eyre::Result<SmartAccountClient<KeelProvider>> {
    let transport = transport.to_transport()?;
    let headers = transport.headers();
    let eth_client = Arc::new(transport.into_provider());
    let chain_id = eth_client.get_chainid().await?.as_u64();

    let wallet = Wallet::from_file(account.mnemonic_file.clone(), chain_id)?;
    let factory = account.factory().map_err(|err| eyre::eyre!(err))?;
    let simple_account = SimpleAccount::new(
        eth_client.clone(),
        account.entry_point.entry_point(),
        factory,
        wallet.address(),
        account.salt,
    );
    let simple_account = match account.sender {
        Some(sender) => simple_account.with_address(sender),
        None => simple_account,
    };
    info!("Owner of the smart account: {:?}", wallet.address());

    let client = SmartAccountClient::new(eth_client, Arc::new(wallet), config)
        .await?
        .with_headers(headers)
        .with_account(Arc::new(simple_account));
    Ok(client)
}

fn bundler_client(transport: &TransportArgs) -> eyre::Result<BundlerClient<KeelProvider>> {
    Ok(BundlerClient::new(Arc::new(transport.to_transport()?.into_provider())))
}

fn print_json<T: serde::Serialize>(value: &T) -> eyre::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Send command
#[derive(Debug, Parser)]
pub struct SendCommand {
    #[clap(flatten)]
    pub transport: TransportArgs,

    #[clap(flatten)]
    pub account: AccountArgs,

    #[clap(flatten)]
    pub fee: FeeArgs,

    #[clap(flatten)]
    pub paymaster: PaymasterArgs,

    #[clap(flatten)]
    pub call: CallArgs,

    /// Simulate the user operation's asset changes before sending it
    #[clap(long)]
    pub simulate: bool,

    /// Build and sign the user operation and print it without sending
    #[clap(long)]
    pub dry_run: bool,

    /// Wait for the user operation to be included
    #[clap(long)]
    pub wait: bool,
}

impl SendCommand {
    /// Execute the command
    pub async fn execute(self) -> eyre::Result<()> {
        let intent = self.call.intent().map_err(|err| eyre::eyre!(err))?;
        let mut overrides = self.fee.overrides();
        overrides.paymaster_and_data = self.paymaster.paymaster_and_data.clone();

        let mut config = PipelineConfig::default()
            .fee_policy(self.fee.fee_policy())
            .simulate(self.simulate);
        if let Some(sponsorship) = self.paymaster.sponsorship() {
            config = config.sponsorship(sponsorship);
        }

        let client = account_client(&self.transport, &self.account, config).await?;
        client.check_entry_point_supported().await?;

        let built = client.build_user_operation(intent, overrides).await?;
        if let Some(preview) = &built.simulation {
            print_json(preview)?;
        }
        if self.dry_run {
            return print_json(&built.user_operation.to_wire()?);
        }

        let hash = client.send_signed_user_operation(&built.user_operation).await?;
        println!("{hash}");

        if self.wait {
            let receipt = client.wait_for_user_operation_receipt(&hash).await?;
            print_json(&receipt)?;
        }

        Ok(())
    }
}

/// Hash command
#[derive(Debug, Parser)]
pub struct HashCommand {
    /// Path to the user operation in its JSON-RPC form
    #[clap(long)]
    pub file: ExpandedPathBuf,

    #[clap(flatten)]
    pub entry_point: EntryPointArgs,

    /// Chain id or name of the chain the user operation targets
    #[clap(long, value_parser=parse_chain)]
    pub chain: u64,
}

impl HashCommand {
    fn hash(&self) -> eyre::Result<UserOperationHash> {
        let json = std::fs::read_to_string(self.file.to_path_buf())?;
        let wire: UserOperationWire = serde_json::from_str(&json)?;
        let uo = UserOperationSigned::try_from(wire.into_request()?)?;
        Ok(uo.hash(&self.entry_point.entry_point(), self.chain)?)
    }

    /// Execute the command
    pub fn execute(self) -> eyre::Result<()> {
        println!("{}", self.hash()?);
        Ok(())
    }
}

/// Receipt command
#[derive(Debug, Parser)]
pub struct ReceiptCommand {
    #[clap(flatten)]
    pub transport: TransportArgs,

    /// User operation hash
    #[clap(long, value_parser=parse_user_operation_hash)]
    pub hash: UserOperationHash,
}

impl ReceiptCommand {
    /// Execute the command
    pub async fn execute(self) -> eyre::Result<()> {
        match bundler_client(&self.transport)?.get_user_operation_receipt(&self.hash).await? {
            Some(receipt) => print_json(&receipt),
            None => {
                println!("No receipt for user operation {}", self.hash);
                Ok(())
            }
        }
    }
}

/// User operation command
#[derive(Debug, Parser)]
pub struct UserOperationCommand {
    #[clap(flatten)]
    pub transport: TransportArgs,

    /// User operation hash
    #[clap(long, value_parser=parse_user_operation_hash)]
    pub hash: UserOperationHash,
}

impl UserOperationCommand {
    /// Execute the command
    pub async fn execute(self) -> eyre::Result<()> {
        match bundler_client(&self.transport)?.get_user_operation_by_hash(&self.hash).await? {
            Some(uo) => print_json(&uo),
            None => {
                println!("User operation {} not found", self.hash);
                Ok(())
            }
        }
    }
}

/// EntryPoints command
#[derive(Debug, Parser)]
pub struct EntryPointsCommand {
    #[clap(flatten)]
    pub transport: TransportArgs,
}

impl EntryPointsCommand {
    /// Execute the command
    pub async fn execute(self) -> eyre::Result<()> {
        for entry_point in bundler_client(&self.transport)?.supported_entry_points().await? {
            println!("{entry_point:?}");
        }
        Ok(())
    }
}

/// Deposit command
#[derive(Debug, Parser)]
pub struct DepositCommand {
    #[clap(flatten)]
    pub transport: TransportArgs,

    #[clap(flatten)]
    pub account: AccountArgs,
}

impl DepositCommand {
    /// Execute the command
    pub async fn execute(self) -> eyre::Result<()> {
        let client =
            account_client(&self.transport, &self.account, PipelineConfig::default()).await?;
        println!("{}", client.get_deposit().await?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::U256;
    use keel_primitives::EntryPoint;
    use std::io::Write;

    #[test]
    fn send_command_args() {
        let command = SendCommand::try_parse_from(vec![
            "send",
            "--mnemonic-file",
            "/tmp/keel/mnemonic",
            "--bundler-url",
            "http://bundler.local",
            "--to",
            "0x000000000000000000000000000000000000aaaa",
            "--policy-id",
            "policy",
            "--simulate",
            "--wait",
        ])
        .unwrap();

        assert!(command.simulate);
        assert!(command.wait);
        assert!(!command.dry_run);
        assert_eq!(command.transport.bundler_url.as_deref(), Some("http://bundler.local"));
        assert!(command.paymaster.sponsorship().is_some());
    }

    #[test]
    fn hash_command_reads_json_user_operation() {
        let uo = UserOperationSigned::default()
            .sender("0x9c5754De1443984659E1b3a8d1931D83475ba29C".parse().unwrap())
            .nonce(U256::from(1))
            .call_gas_limit(U256::from(33_100))
            .verification_gas_limit(U256::from(60_624))
            .pre_verification_gas(U256::from(44_056))
            .max_fee_per_gas(U256::from(1_695_000_030_u64))
            .max_priority_fee_per_gas(U256::from(1_695_000_000_u64));
        let wire = UserOperationWire::from_signed(&uo, EntryPoint::v06().version).unwrap();

        let path = std::env::temp_dir().join(format!("keel-hash-{}.json", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(serde_json::to_string(&wire).unwrap().as_bytes()).unwrap();

        let command = HashCommand::try_parse_from(vec![
            "hash",
            "--file",
            path.to_str().unwrap(),
            "--chain",
            "sepolia",
        ])
        .unwrap();
        assert_eq!(command.chain, 11_155_111);
        assert_eq!(command.entry_point.entry_point(), EntryPoint::v06());
        assert_eq!(command.hash().unwrap(), uo.hash(&EntryPoint::v06(), 11_155_111).unwrap());

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn receipt_command_requires_valid_hash() {
        assert!(ReceiptCommand::try_parse_from(vec!["receipt", "--hash", "0x1234"]).is_err());
        let hash = format!("0x{}", "ab".repeat(32));
        let command =
            ReceiptCommand::try_parse_from(vec!["receipt", "--hash", hash.as_str()]).unwrap();
        assert_eq!(command.hash, hash.parse::<UserOperationHash>().unwrap());
    }
}
