//! claw — the clawrrency command line.
//!
//! Usage:
//!   claw create-wallet --name <name> [--description <text>]
//!   claw list-wallets
//!   claw balance --public-key <hex>
//!   claw transfer --from <hex> --to <hex> --amount <shells>
//!   claw history --public-key <hex> [--limit <n>]
//!   claw register --public-key <hex> --stake <shells> [--attestation <hex>]
//!   claw reputation --public-key <hex>
//!
//! Exit code 0 on success, 1 on any error; errors go to stderr prefixed ✗.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use claw_core::types::PublicKey;
use claw_sdk::{Sdk, SdkConfig};

// ── CLI definition ───────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "claw", version, about = "clawrrency — shells for autonomous agents")]
struct Args {
    /// Data directory holding ledger, identity and skill state.
    #[arg(long, global = true, default_value = "~/.clawrrency")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a new wallet (keypair + ledger account).
    CreateWallet {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },

    /// List all wallets in the registry.
    ListWallets,

    /// Print an account's spendable balance.
    Balance {
        #[arg(long)]
        public_key: String,
    },

    /// Transfer shells between two accounts.
    Transfer {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: u64,
    },

    /// Print an account's transactions, newest first.
    History {
        #[arg(long)]
        public_key: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Register a bot by locking stake; mints the registration reward.
    Register {
        #[arg(long)]
        public_key: String,
        #[arg(long)]
        stake: u64,
        /// Attester public key (halves the stake requirement if reputable).
        #[arg(long)]
        attestation: Option<String>,
    },

    /// Print a bot's reputation score.
    Reputation {
        #[arg(long)]
        public_key: String,
    },
}

// ── Main ─────────────────────────────────────────────────────────────────────

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".parse().expect("static filter parses")),
        )
        .init();

    let args = Args::parse();
    if let Err(e) = run(args) {
        eprintln!("✗ {e:#}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let data_dir = expand_tilde(&args.data_dir);
    let now_ms = chrono::Utc::now().timestamp_millis() as u64;
    let mut sdk =
        Sdk::initialize(SdkConfig::new(data_dir), now_ms).context("initializing sdk")?;

    match args.command {
        Command::CreateWallet { name, description } => {
            let public_key = sdk.create_wallet(&name, &description, now_ms)?;
            println!("{public_key}");
        }

        Command::ListWallets => {
            let identity = sdk.identity.lock().expect("single-process lock");
            for bot in identity.list_bots() {
                println!("{}  {}  reputation {:.1}", bot.public_key, bot.name, bot.reputation);
            }
        }

        Command::Balance { public_key } => {
            let pk = PublicKey::from_hex(&public_key)?;
            println!("{}", sdk.balance(&pk)?);
        }

        Command::Transfer { from, to, amount } => {
            let from = PublicKey::from_hex(&from)?;
            let to = PublicKey::from_hex(&to)?;
            let digest = sdk.transfer(&from, &to, amount, now_ms)?;
            println!("{digest}");
        }

        Command::History { public_key, limit } => {
            let pk = PublicKey::from_hex(&public_key)?;
            for record in sdk.history(&pk, limit)? {
                let tx = &record.transaction;
                println!(
                    "{}  {:?}  {} shells  height {}",
                    record.applied_at, tx.tx_type, tx.amount, record.block_height
                );
            }
        }

        Command::Register { public_key, stake, attestation } => {
            let pk = PublicKey::from_hex(&public_key)?;
            let attester = attestation.as_deref().map(PublicKey::from_hex).transpose()?;
            let reward = sdk.register_bot(&pk, stake, attester, now_ms)?;
            println!("registered; minted {reward} shells");
        }

        Command::Reputation { public_key } => {
            let pk = PublicKey::from_hex(&public_key)?;
            println!("{:.2}", sdk.reputation(&pk)?);
        }
    }
    Ok(())
}

fn expand_tilde(path: &PathBuf) -> PathBuf {
    let s = path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    path.clone()
}
