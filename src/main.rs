use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;
use csv::{ReaderBuilder, Trim};
use tokio::task::JoinSet;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

mod bank;

use bank::{
    Account, Command, CommandType, CoordinatorConfig, InMemoryAccountStore, LogNotifier,
    TransferCoordinator,
};

/// Replays account creations and transfers from a CSV file and prints the final balances.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input CSV with columns `type,account,counterparty,amount`
    input: PathBuf,

    /// Give up on a transfer after waiting this long for an account lock
    #[arg(long)]
    lock_timeout_ms: Option<u64>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Runs a batch of transfers concurrently and waits for all of them.
async fn run_transfers(coordinator: &Arc<TransferCoordinator>, batch: Vec<Command>) {
    let mut tasks = JoinSet::new();
    for command in batch {
        let coordinator = Arc::clone(coordinator);
        tasks.spawn(async move {
            let Some(to) = command.get_counterparty() else {
                warn!(account = command.get_account(), "transfer without counterparty skipped");
                return;
            };
            if let Err(err) = coordinator
                .transfer_money(command.get_account(), to, command.get_amount())
                .await
            {
                warn!(
                    code = err.code(),
                    status = err.http_status(),
                    "Error processing transfer: {err}"
                );
            }
        });
    }
    while let Some(result) = tasks.join_next().await {
        if let Err(err) = result {
            error!("Transfer task failed: {err}");
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(&args.log_level);

    let config = CoordinatorConfig {
        lock_timeout: args.lock_timeout_ms.map(Duration::from_millis),
    };
    let coordinator = Arc::new(
        TransferCoordinator::new(Arc::new(InMemoryAccountStore::new()), config)
            .with_notifier(Arc::new(LogNotifier)),
    );

    let mut reader = match ReaderBuilder::new().trim(Trim::All).from_path(&args.input) {
        Ok(reader) => reader,
        Err(err) => {
            error!("Failed to read {}: {err}", args.input.display());
            std::process::exit(1);
        }
    };

    // Consecutive transfers run concurrently; an account creation waits for them to finish.
    let mut batch = Vec::new();
    for row in reader.deserialize::<Command>() {
        let command = match row {
            Ok(command) => command,
            Err(err) => {
                warn!("Skipping malformed row: {err}");
                continue;
            }
        };
        match command.get_type() {
            CommandType::Transfer => batch.push(command),
            CommandType::Create => {
                run_transfers(&coordinator, std::mem::take(&mut batch)).await;
                let account = Account::new(command.get_account(), command.get_amount());
                if let Err(err) = coordinator.create_account(account) {
                    warn!(
                        code = err.code(),
                        status = err.http_status(),
                        "Error creating account: {err}"
                    );
                }
            }
        }
    }
    run_transfers(&coordinator, batch).await;

    let mut writer = csv::Writer::from_writer(std::io::stdout());
    for account in coordinator.accounts() {
        if let Err(err) = writer.serialize(account) {
            error!("Error writing account: {err}");
        }
    }
    if let Err(err) = writer.flush() {
        error!("Error flushing output: {err}");
    }
}
