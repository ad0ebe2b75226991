use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use dapp_core::{DappController, RenderState, ViewModel};
use eth_rpc::{RpcClient, RpcWalletProvider, RpcWhitelistContract};
use shared::domain::{Address, ChainId};

mod config;

#[derive(Parser, Debug)]
#[command(about = "Command-line front end for the address whitelist contract")]
struct Args {
    /// Path to the settings file.
    #[arg(long, default_value = "dapp.toml")]
    config: PathBuf,
    #[arg(long)]
    rpc_url: Option<String>,
    #[arg(long)]
    chain_id: Option<u64>,
    #[arg(long)]
    contract_address: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect the wallet and show the current whitelist view.
    Status,
    /// Connect and submit the join transaction if eligible.
    Join,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();

    let mut settings = config::load_settings(&args.config);
    if let Some(v) = args.rpc_url {
        settings.rpc_url = v;
    }
    if let Some(v) = args.chain_id {
        settings.chain_id = v;
    }
    if let Some(v) = args.contract_address {
        settings.contract_address = v;
    }

    if settings.contract_address.is_empty() {
        bail!(
            "contract address not configured; set contract_address in dapp.toml \
             or pass --contract-address"
        );
    }
    let contract_address: Address = settings
        .contract_address
        .parse()
        .context("invalid contract address")?;

    let rpc = RpcClient::new(settings.rpc_url.clone());
    let controller = DappController::new_with_confirmation_timeout(
        Arc::new(RpcWalletProvider::new(Arc::clone(&rpc))),
        Arc::new(RpcWhitelistContract::new(Arc::clone(&rpc), contract_address)),
        ChainId(settings.chain_id),
        Duration::from_secs(settings.confirmation_timeout_seconds),
    );

    controller.connect().await?;
    // One-shot invocation, so read deterministically instead of relying on
    // the connect-time fire-and-forget refreshes.
    controller.refresh_whitelist_status().await;
    controller.refresh_whitelist_count().await;

    match args.command {
        Command::Status => {}
        Command::Join => {
            let view = controller.view_model().await;
            match view.render_state {
                RenderState::PromptJoin => controller.join_whitelist().await?,
                RenderState::AlreadyJoined => println!("already joined; nothing to do"),
                RenderState::JoinPending => println!("a join transaction is already pending"),
                RenderState::PromptConnect => unreachable!("wallet connected above"),
            }
        }
    }

    render(&controller.view_model().await);
    Ok(())
}

fn render(view: &ViewModel) {
    println!("== Whitelist dApp ==");
    match view.render_state {
        RenderState::PromptConnect => println!("connect a wallet to continue"),
        RenderState::PromptJoin => {
            println!("this address has not joined yet; run `join` to claim a spot");
        }
        RenderState::JoinPending => {
            println!("join transaction submitted; waiting for confirmation");
        }
        RenderState::AlreadyJoined => println!("thanks for joining the whitelist!"),
    }
    println!("{} addresses have already joined", view.whitelist_count);
    if let Some(address) = view.connected_address {
        println!("connected as {address}");
    }
    if let Some(err) = &view.last_call_error {
        println!("note: last contract read failed: {err}");
    }
    println!("-- early access for whitelisted addresses --");
}
