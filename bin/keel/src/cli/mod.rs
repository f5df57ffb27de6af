use clap::{value_parser, Parser, Subcommand};

pub mod args;
pub mod commands;

/// The main Keel CLI interface
#[derive(Debug, Parser)]
#[command(author, version, about = "Keel", long_about = None)]
pub struct Cli {
    /// The command to execute
    #[clap(subcommand)]
    command: Commands,

    /// The verbosity level
    #[clap(long, short, global = true, default_value_t = 2, value_parser = value_parser!(u8).range(..=4))]
    verbosity: u8,
}

impl Cli {
    /// Get the log level based on the verbosity level
    pub fn get_log_level(&self) -> String {
        match self.verbosity {
            0 => "error",
            1 => "warn",
            2 => "info",
            3 => "debug",
            _ => "trace",
        }
        .into()
    }
}

/// Commands to be executed
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Build, sign and send a user operation from the smart account
    #[command(name = "send")]
    Send(Box<commands::SendCommand>),

    /// Compute the hash of a user operation read from a JSON file
    #[command(name = "hash")]
    Hash(commands::HashCommand),

    /// Look up the receipt of a user operation
    #[command(name = "receipt")]
    Receipt(commands::ReceiptCommand),

    /// Look up a user operation by its hash
    #[command(name = "user-operation")]
    UserOperation(commands::UserOperationCommand),

    /// List the EntryPoints supported by the bundler
    #[command(name = "entry-points")]
    EntryPoints(commands::EntryPointsCommand),

    /// Show the smart account's deposit in the EntryPoint
    #[command(name = "deposit")]
    Deposit(commands::DepositCommand),
}

pub fn run() -> eyre::Result<()> {
    let cli = Cli::parse();

    let rust_log = match std::env::var("RUST_LOG") {
        Ok(val) => format!("{val},keel={}", cli.get_log_level()),
        Err(_) => format!("keel={}", cli.get_log_level()),
    };
    std::env::set_var("RUST_LOG", rust_log);
    tracing_subscriber::fmt::init();

    let rt = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;

    rt.block_on(async move {
        match cli.command {
            Commands::Send(command) => command.execute().await,
            Commands::Hash(command) => command.execute(),
            Commands::Receipt(command) => command.execute().await,
            Commands::UserOperation(command) => command.execute().await,
            Commands::EntryPoints(command) => command.execute().await,
            Commands::Deposit(command) => command.execute().await,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_log_level() {
        let cli = Cli::try_parse_from(vec!["keel", "-v", "4", "entry-points"]).unwrap();
        assert_eq!(cli.get_log_level(), "trace");

        let cli = Cli::try_parse_from(vec!["keel", "entry-points"]).unwrap();
        assert_eq!(cli.get_log_level(), "info");

        assert!(Cli::try_parse_from(vec!["keel", "-v", "5", "entry-points"]).is_err());
    }
}
