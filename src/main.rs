use std::io::{self, Write};

use anyhow::{Context, Result};
use tokio::runtime::Runtime;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use slashscan::{
    chain::{ChainSource, rpc::RpcChainSource},
    config::{Command, get_config},
    explorer::{PolkascanClient, cache},
    reconcile::{calculate_refund, check_reserved},
    report::{
        build_refund_batch,
        csv::{detailed_rows, simple_rows, write_detailed, write_simple},
        note_preimage_extrinsic, write_preimage,
    },
    utils::amounts::format_token,
};

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).try_init();
}

fn main() -> Result<()> {
    init_logging();

    // 1) Parse and validate before touching the network.
    let cfg = get_config()?;
    let params = cfg.network_params();
    let chain = params.network.name();

    // 2) One runtime hosts every HTTP client; sync call sites block on its handle.
    let runtime = Runtime::new().context("failed to build Tokio runtime")?;
    let source =
        RpcChainSource::new(&cfg.rpc_url, Some(runtime.handle().clone()), cfg.max_concurrency);

    match &cfg.command {
        Command::FindElections { explorer_url, cache: cache_path } => {
            let path = cfg.cache_path(cache_path.as_ref());
            let explorer = PolkascanClient::new(explorer_url, chain, Some(runtime.handle().clone()));
            let elections = explorer.find_elections(params.society_candidate_deposit)?;
            cache::save(&path, &elections, params.ss58_prefix)?;
            info!("[main] wrote {} elections to {}", elections.len(), path.display());
        }

        Command::Refund { cache: cache_path, detailed, out_dir, address_format, at, dry_run } => {
            let path = cfg.cache_path(cache_path.as_ref());
            let elections = cache::load(&path)?;
            info!("[main] loaded {} elections from {}", elections.len(), path.display());

            let (ledger, reports) = calculate_refund(&source, &elections)?;
            info!(
                "[main] {} transitions reconciled, {} accounts owed {}",
                reports.len(),
                ledger.len(),
                format_token(ledger.total(), params.decimals, params.symbol)
            );

            let at = match at {
                Some(h) => *h,
                None => source.finalized_head()?,
            };
            let mut out = io::stdout().lock();
            if *detailed {
                let rows = detailed_rows(&source, &ledger, at, &params)?;
                write_detailed(&mut out, &rows)?;
            } else {
                let rows = simple_rows(&source, &ledger, at, &params)?;
                write_simple(&mut out, &rows)?;
            }
            out.flush().context("failed to flush stdout")?;

            if ledger.is_empty() {
                info!("[main] nothing to refund");
                return Ok(());
            }
            let batch =
                build_refund_batch(&ledger, &params, address_format.unwrap_or(params.address_format));
            info!("[main] preimage: {}", batch.preimage_hex());
            info!("[main] hash: {}", batch.hash_hex());
            info!(
                "[main] sum: {} over {} transfers",
                format_token(batch.sum, params.decimals, params.symbol),
                batch.transfers
            );
            let file = write_preimage(out_dir, chain, &batch)?;
            info!("[main] preimage written to {}", file.display());

            if *dry_run {
                let xt = note_preimage_extrinsic(&batch, &params);
                match source.query_fee_info(&xt, at) {
                    Ok(fee) => match fee.fee() {
                        Ok(planck) => info!(
                            "[main] note_preimage: weight {}, class {}, fee {}",
                            fee.weight,
                            fee.class,
                            format_token(planck, params.decimals, params.symbol)
                        ),
                        Err(e) => warn!("[main] note_preimage fee unreadable: {e:#}"),
                    },
                    Err(e) => warn!("[main] note_preimage dry-run failed: {e:#}"),
                }
            }
        }

        Command::Reserved { accounts, at } => {
            let at = match at {
                Some(h) => *h,
                None => source.finalized_head()?,
            };
            let whos = if accounts.is_empty() {
                source.accounts(at).context("failed to list System.Account")?
            } else {
                accounts.clone()
            };
            info!("[main] checking {} accounts at {at}", whos.len());
            let (_, summary) = check_reserved(&source, &whos, at, &params)?;
            println!("good,bad");
            println!("{},{}", summary.good, summary.bad);
        }
    }

    Ok(())
}
