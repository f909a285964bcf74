use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::consts::{AddressFormat, DEFAULT_EXPLORER_URL, Network, NetworkParams, network_params};
use crate::explorer::cache::default_cache_path;
use crate::schemas::{AccountId, Balance, BlockHash};

fn parse_network(s: &str) -> std::result::Result<Network, String> {
    match s.to_ascii_lowercase().as_str() {
        "polkadot" => Ok(Network::Polkadot),
        "kusama" => Ok(Network::Kusama),
        _ => Err("invalid value for --network: expected 'polkadot' or 'kusama'".into()),
    }
}

fn parse_address_format(s: &str) -> std::result::Result<AddressFormat, String> {
    match s.to_ascii_lowercase().as_str() {
        "multi" | "multiaddress" => Ok(AddressFormat::MultiAddress),
        "indices" => Ok(AddressFormat::Indices),
        "id" | "accountid" => Ok(AddressFormat::AccountId),
        _ => Err("invalid address format: expected 'multi', 'indices' or 'id'".into()),
    }
}

fn parse_account(s: &str) -> std::result::Result<AccountId, String> {
    s.parse().map_err(|e| format!("{e}"))
}

fn parse_block_hash(s: &str) -> std::result::Result<BlockHash, String> {
    s.parse().map_err(|e| format!("{e}"))
}

#[derive(Parser, Debug, Clone)]
#[command(version, about = "Find and refund council bonds slashed by elections-phragmen", long_about = None)]
pub struct CliArgs {
    /// HTTP JSON-RPC endpoint of an archive node
    #[arg(long, global = true, default_value = "http://127.0.0.1:9933")]
    pub rpc_url: String,

    /// 'polkadot' or 'kusama'
    #[arg(short, long, global = true, value_parser = parse_network, default_value = "polkadot")]
    pub network: Network,

    /// Upper bound on in-flight storage requests
    #[arg(long, global = true, default_value_t = 16)]
    pub max_concurrency: usize,

    /// Override the runtime's candidacy bond (Planck)
    #[arg(long, global = true)]
    pub candidacy_bond: Option<Balance>,

    /// Override the runtime's voting bond (Planck)
    #[arg(long, global = true)]
    pub voting_bond: Option<Balance>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Discover NewTerm blocks through the explorer and write the elections cache
    FindElections {
        #[arg(long, default_value = DEFAULT_EXPLORER_URL)]
        explorer_url: String,

        /// Defaults to elections.<chain>.json
        #[arg(long)]
        cache: Option<PathBuf>,
    },

    /// Reconcile every cached election and build the refund batch
    Refund {
        #[arg(long)]
        cache: Option<PathBuf>,

        /// Print the reserved/free split per account
        #[arg(long)]
        detailed: bool,

        /// Where the preimage file goes
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,

        /// LookupSource encoding of the target runtime: 'multi', 'indices' or 'id'
        #[arg(long, value_parser = parse_address_format)]
        address_format: Option<AddressFormat>,

        /// Block used for roles, identities and the detailed report; defaults to finalized head
        #[arg(long, value_parser = parse_block_hash)]
        at: Option<BlockHash>,

        /// Ask the node for the weight and fee of noting the preimage; nothing is signed or sent
        #[arg(long)]
        dry_run: bool,
    },

    /// Check module deposits against on-chain reserved balances
    Reserved {
        /// SS58 or hex accounts; every account in System.Account when empty
        #[arg(value_parser = parse_account)]
        accounts: Vec<AccountId>,

        #[arg(long, value_parser = parse_block_hash)]
        at: Option<BlockHash>,
    },
}

impl CliArgs {
    pub fn network_params(&self) -> NetworkParams {
        let mut params = network_params(self.network);
        if let Some(bond) = self.candidacy_bond {
            params.candidacy_bond = bond;
        }
        if let Some(bond) = self.voting_bond {
            params.voting_bond = bond;
        }
        params
    }

    pub fn cache_path(&self, explicit: Option<&PathBuf>) -> PathBuf {
        explicit.cloned().unwrap_or_else(|| default_cache_path(self.network.name()))
    }
}

fn check_http_url(what: &str, url: &str) -> Result<()> {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        anyhow::bail!("{what} must be an http(s) URL: {url}");
    }
    Ok(())
}

pub fn validate(args: &CliArgs) -> Result<()> {
    check_http_url("--rpc-url", &args.rpc_url)?;
    if args.max_concurrency == 0 {
        anyhow::bail!("max_concurrency must be greater than 0");
    }

    match &args.command {
        Command::FindElections { explorer_url, .. } => {
            check_http_url("--explorer-url", explorer_url)?;
        }
        Command::Refund { cache, out_dir, .. } => {
            let cache = args.cache_path(cache.as_ref());
            if !cache.is_file() {
                anyhow::bail!("Elections cache does not exist: {}", cache.display());
            }
            let out = Path::new(out_dir);
            if !out.is_dir() {
                anyhow::bail!("Output path is not a dir: {}", out.display());
            }
        }
        Command::Reserved { .. } => {}
    }
    Ok(())
}

pub fn get_config() -> Result<CliArgs> {
    let args = CliArgs::parse();
    validate(&args)?;
    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(argv.iter().copied()).expect("parse")
    }

    #[test]
    fn bond_overrides_apply() {
        let args = parse(&["slashscan", "--network", "kusama", "--candidacy-bond", "7", "reserved"]);
        let params = args.network_params();
        assert_eq!(params.candidacy_bond, 7);
        assert_eq!(params.voting_bond, network_params(Network::Kusama).voting_bond);
        assert_eq!(args.cache_path(None), PathBuf::from("elections.kusama.json"));
    }

    #[test]
    fn reserved_accepts_hex_accounts() {
        let who = format!("0x{}", hex::encode([5u8; 32]));
        let args = parse(&["slashscan", "reserved", &who]);
        match args.command {
            Command::Reserved { accounts, at } => {
                assert_eq!(accounts, vec![AccountId([5; 32])]);
                assert!(at.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn validation_rejects_bad_input() {
        let args = parse(&["slashscan", "--rpc-url", "ws://node:9944", "reserved"]);
        assert!(validate(&args).is_err());

        let args = parse(&["slashscan", "--max-concurrency", "0", "reserved"]);
        assert!(validate(&args).is_err());

        let args = parse(&["slashscan", "refund", "--cache", "/definitely/not/here.json"]);
        assert!(validate(&args).is_err());

        assert!(CliArgs::try_parse_from(["slashscan", "--network", "westend", "reserved"]).is_err());
    }

    #[test]
    fn refund_dry_run_is_opt_in() {
        match parse(&["slashscan", "refund"]).command {
            Command::Refund { dry_run, detailed, .. } => {
                assert!(!dry_run);
                assert!(!detailed);
            }
            other => panic!("unexpected command {other:?}"),
        }
        match parse(&["slashscan", "refund", "--dry-run"]).command {
            Command::Refund { dry_run, .. } => assert!(dry_run),
            other => panic!("unexpected command {other:?}"),
        }
    }
}
