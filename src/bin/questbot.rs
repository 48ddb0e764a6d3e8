use std::path::Path;
use std::time::Duration;

use alloy::primitives::Address;
use anyhow::{Context, Result};
use clap::Parser;
use reqwest::Url;
use tracing::{info, warn};

use questbot::chain::ChainSubmitter;
use questbot::config::{ACCOUNTS_PATH, AccountsConfig, AppConfig, CONFIG_PATH};
use questbot::cooldown::{COOLDOWN_PATH, CooldownStore};
use questbot::orchestrator::{self, CycleStatus};
use questbot::reporter::{self, SummaryRow};
use questbot::session::{Account, Session};

/// Pause between consecutive accounts, regardless of outcome. Keeps request
/// rates uncorrelated across accounts on the upstream's side.
const INTER_ACCOUNT_DELAY: Duration = Duration::from_secs(2);

#[derive(Parser)]
#[command(
    name = "questbot",
    about = "Daily quest automation for wallet-controlled accounts"
)]
struct Args {}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let _args = Args::parse();

    let config = AppConfig::load(Path::new(CONFIG_PATH))?;
    let accounts_file = AccountsConfig::load(Path::new(ACCOUNTS_PATH))?;
    let accounts: Vec<Account> = accounts_file
        .accounts
        .iter()
        .map(Account::from_entry)
        .collect::<Result<_>>()
        .context("failed to load accounts")?;

    let rpc_url: Url = config
        .chain
        .rpc_url
        .parse()
        .with_context(|| format!("invalid RPC URL {}", config.chain.rpc_url))?;
    let contract: Address = config
        .chain
        .contract_address
        .parse()
        .with_context(|| format!("invalid contract address {}", config.chain.contract_address))?;

    let mut store = CooldownStore::open(COOLDOWN_PATH);
    let interval_ms = config.settings.loop_interval_ms;
    let interval = Duration::from_millis(interval_ms);

    info!(
        "Starting questbot — {} account(s), api={}, contract={contract}, interval={}s",
        accounts.len(),
        config.api.base_url,
        interval.as_secs(),
    );
    info!("Entering run loop. Press Ctrl+C to stop.");

    loop {
        let rows = run_pass(
            &accounts,
            &config,
            &rpc_url,
            contract,
            interval_ms,
            &mut store,
        )
        .await;
        reporter::print_summary(&rows);

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }

    Ok(())
}

/// One pass over the account list, strictly sequential. Cooldowns gate each
/// account; every account contributes exactly one summary row.
async fn run_pass(
    accounts: &[Account],
    config: &AppConfig,
    rpc_url: &Url,
    contract: Address,
    interval_ms: u64,
    store: &mut CooldownStore,
) -> Vec<SummaryRow> {
    let mut rows = Vec::with_capacity(accounts.len());

    for (idx, account) in accounts.iter().enumerate() {
        let now = chrono::Utc::now().timestamp_millis() as u64;
        let next_eligible = store.get(&account.identity());

        if next_eligible > now {
            info!(
                "[{}] on cooldown for another {}s",
                account.label(),
                (next_eligible - now) / 1000
            );
            rows.push(SummaryRow {
                label: account.label(),
                score: None,
                status: CycleStatus::SkippedCooldown.label(),
                next_run_ms: next_eligible,
            });
        } else {
            rows.push(run_account(account, config, rpc_url, contract, interval_ms, store).await);
        }

        if idx + 1 < accounts.len() {
            tokio::time::sleep(INTER_ACCOUNT_DELAY).await;
        }
    }

    rows
}

/// Run one account's cycle and, on success, advance its cooldown. Failures
/// never cross the account boundary — they become the row's status.
async fn run_account(
    account: &Account,
    config: &AppConfig,
    rpc_url: &Url,
    contract: Address,
    interval_ms: u64,
    store: &mut CooldownStore,
) -> SummaryRow {
    let mut session = match Session::new(account, &config.api) {
        Ok(session) => session,
        Err(e) => {
            warn!("[{}] session setup failed: {e}", account.label());
            return SummaryRow {
                label: account.label(),
                score: None,
                status: CycleStatus::Failed("Session Setup Failed".to_string()).label(),
                next_run_ms: 0,
            };
        }
    };

    let chain = ChainSubmitter::new(rpc_url.clone(), contract, account.signer.clone());
    let outcome = orchestrator::run_cycle(&mut session, &chain).await;

    let mut next_run_ms = 0;
    if outcome.status.is_success() {
        let now = chrono::Utc::now().timestamp_millis() as u64;
        next_run_ms = now + interval_ms;
        if let Err(e) = store.set(&account.identity(), next_run_ms) {
            warn!("[{}] failed to persist cooldown: {e}", account.label());
        }
    }

    SummaryRow {
        label: account.label(),
        score: outcome.score,
        status: outcome.status.label(),
        next_run_ms,
    }
}
