//! CLI for sealed-bid auctions.
//!
//! This binary provides commands for:
//! - Querying block height and auction state
//! - Running eligibility checks
//! - Building program call payloads for an external wallet
//! - Managing locally stored bid secrets
//! - Importing, listing and watching auctions

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::info;

use auction_client::builder::{
    record_microcredits, select_payment_record, DEFAULT_COMMIT_DURATION, DEFAULT_REVEAL_DURATION,
};
use auction_client::cache::cached_phase;
use auction_client::engine::{next_auction_id, now_ms};
use auction_client::format::{
    format_block_duration, format_countdown, format_credits, parse_credits_to_micro,
    truncate_address, MICROCREDITS_PER_CREDIT,
};
use auction_client::phase::phase_of;
use auction_client::{
    blocks_remaining, check_refund_eligibility, check_reveal_eligibility,
    check_settle_eligibility, spawn_auction_poller, AuctionCache, AuctionClient, BidOpening,
    ChainReader, ClientConfig, CreateAuctionParams, HttpChainReader, KeyValueStore,
    OperationBuilder, PlaceBidParams, SecretStore, SettleParams, ShieldCreditsParams, SledStore,
    WalletError, WalletExecutor,
};
use auction_types::{
    Address, AuctionId, AuctionRecord, AuctionStatus, BidSecret, FieldElement, OperationPayload,
    TransactionId,
};

#[derive(Parser)]
#[command(name = "auction-cli")]
#[command(about = "CLI for commit-reveal sealed-bid auctions")]
struct Cli {
    /// Ledger explorer API base URL
    #[arg(long, env = "AUCTION_API_URL")]
    api_url: Option<String>,

    /// Network name
    #[arg(long, env = "AUCTION_NETWORK")]
    network: Option<String>,

    /// Auction program id
    #[arg(long, env = "AUCTION_PROGRAM_ID")]
    program_id: Option<String>,

    /// Directory for bid secrets and the auction cache
    #[arg(long, env = "AUCTION_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the latest block height
    Height,

    /// Show an auction's on-chain state and phase
    Auction {
        /// Auction ID
        auction_id: AuctionId,
    },

    /// Run a pre-flight eligibility check
    Check {
        #[command(subcommand)]
        check: CheckCommand,
    },

    /// Build a program call payload and print it as JSON
    Build {
        #[command(subcommand)]
        operation: BuildCommand,
    },

    /// Manage locally stored bid secrets
    Secrets {
        #[command(subcommand)]
        action: SecretsCommand,
    },

    /// Store a bid secret after the wallet accepted a place_bid payload
    RecordBid {
        #[arg(long)]
        auction_id: AuctionId,

        /// Bid amount in credits
        #[arg(long, value_parser = parse_credits_to_micro)]
        amount: u64,

        #[arg(long)]
        salt: FieldElement,

        /// Deposit in credits; defaults to the bid amount
        #[arg(long, value_parser = parse_credits_to_micro)]
        deposit: Option<u64>,
    },

    /// Add an auction created elsewhere to the local cache
    Import {
        /// Auction ID
        auction_id: AuctionId,
    },

    /// List cached auctions
    List {
        /// Reconcile with the chain first
        #[arg(long)]
        refresh: bool,

        #[arg(long, value_enum)]
        status: Option<StatusArg>,

        /// Only auctions created by this address
        #[arg(long)]
        creator: Option<Address>,
    },

    /// Follow an auction's phase until interrupted
    Watch {
        /// Auction ID
        auction_id: AuctionId,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum StatusArg {
    Created,
    Active,
    Ended,
    Cancelled,
}

impl From<StatusArg> for AuctionStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Created => AuctionStatus::Created,
            StatusArg::Active => AuctionStatus::Active,
            StatusArg::Ended => AuctionStatus::Ended,
            StatusArg::Cancelled => AuctionStatus::Cancelled,
        }
    }
}

#[derive(Subcommand)]
enum CheckCommand {
    Reveal { auction_id: AuctionId },
    Settle { auction_id: AuctionId },
    Refund {
        auction_id: AuctionId,

        /// Address that would claim the refund
        #[arg(long)]
        caller: Address,
    },
}

#[derive(Subcommand)]
enum BuildCommand {
    /// create_auction
    Create {
        /// Auction ID; generated when omitted
        #[arg(long)]
        auction_id: Option<AuctionId>,

        #[arg(long)]
        item_id: Option<FieldElement>,

        /// Minimum bid in credits
        #[arg(long, default_value = "0.001", value_parser = parse_credits_to_micro)]
        min_bid: u64,

        /// Commit phase length (blocks)
        #[arg(long, default_value_t = DEFAULT_COMMIT_DURATION)]
        commit_duration: u32,

        /// Reveal phase length (blocks)
        #[arg(long, default_value_t = DEFAULT_REVEAL_DURATION)]
        reveal_duration: u32,
    },

    /// place_bid; prints the salt to record once submitted
    Bid {
        #[arg(long)]
        auction_id: AuctionId,

        /// Bid amount in credits
        #[arg(long, value_parser = parse_credits_to_micro)]
        amount: u64,

        /// Deposit in credits; defaults to the bid amount
        #[arg(long, value_parser = parse_credits_to_micro)]
        deposit: Option<u64>,

        /// Private credits record to pay the deposit with; repeat to let the
        /// first one large enough be picked
        #[arg(long = "record")]
        records: Vec<String>,
    },

    /// reveal_bid from the stored secret
    Reveal { auction_id: AuctionId },

    /// settle_auction with the chain's highest bid
    Settle { auction_id: AuctionId },

    /// cancel_auction
    Cancel { auction_id: AuctionId },

    /// claim_refund from the stored secret
    Refund {
        auction_id: AuctionId,

        /// Address that will submit the claim
        #[arg(long)]
        caller: Address,
    },

    /// credits.aleo transfer_public_to_private
    Shield {
        #[arg(long)]
        recipient: Address,

        /// Amount in credits
        #[arg(long, value_parser = parse_credits_to_micro)]
        amount: u64,
    },
}

#[derive(Subcommand)]
enum SecretsCommand {
    List,
    Show { auction_id: AuctionId },
    /// Delete a secret. The bid can no longer be revealed or refunded from here.
    Forget { auction_id: AuctionId },
}

/// Wallet stand-in: this binary builds payloads but never signs them.
struct OfflineWallet;

#[async_trait]
impl WalletExecutor for OfflineWallet {
    async fn execute(&self, _payload: &OperationPayload) -> Result<TransactionId, WalletError> {
        Err(WalletError::Unavailable(
            "auction-cli does not sign transactions; submit the payload with a wallet".to_string(),
        ))
    }
}

type CliClient = AuctionClient<HttpChainReader, OfflineWallet, SledStore>;

fn load_config(cli: &Cli) -> ClientConfig {
    let mut cfg = ClientConfig::from_env();
    if let Some(api_url) = &cli.api_url {
        cfg.api_url = api_url.clone();
    }
    if let Some(network) = &cli.network {
        cfg.network = network.clone();
    }
    if let Some(program_id) = &cli.program_id {
        cfg.program_id = program_id.clone();
    }
    if let Some(data_dir) = &cli.data_dir {
        cfg.data_dir = data_dir.clone();
    }
    cfg
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn auction_cmd(reader: &HttpChainReader, cfg: &ClientConfig, id: &AuctionId) -> Result<()> {
    let (height, auction, highest, bids) = tokio::join!(
        reader.current_block_height(),
        reader.auction_struct(id),
        reader.highest_bid(id),
        reader.bid_count(id)
    );
    let height = height?;
    let Some(auction) = auction? else {
        println!("Auction {} not found on-chain (it may not be confirmed yet)", id);
        return Ok(());
    };

    let phase = phase_of(&auction, Some(height));
    println!("Auction {}:", id.digits());
    println!("  Status: {:?}", auction.status);
    println!("  Phase: {}", phase.label());
    if let Some(auctioneer) = &auction.auctioneer {
        println!("  Auctioneer: {}", truncate_address(auctioneer.as_str(), 6));
    }
    if let Some(min_bid) = auction.min_bid {
        println!("  Min Bid: {}", format_credits(min_bid));
    }
    println!("  Commit Deadline: {}", auction.commit_deadline);
    println!("  Reveal Deadline: {}", auction.reveal_deadline);
    println!("  Block Height: {}", height);
    if let Some(left) = blocks_remaining(
        phase,
        height,
        Some(auction.commit_deadline),
        Some(auction.reveal_deadline),
    ) {
        println!(
            "  Phase Ends In: {} ({} blocks)",
            format_countdown(left, cfg.block_time_secs),
            left
        );
    }
    println!("  Bids: {}", bids?);
    println!("  Highest Bid: {}", format_credits(highest?));
    if let Some(winner) = &auction.winner {
        println!("  Winner: {}", winner);
    }
    if let Some(amount) = auction.winning_bid {
        println!("  Winning Bid: {}", format_credits(amount));
    }
    Ok(())
}

/// `1500000` -> `1.5`, as accepted by the amount flags.
fn credits_arg(microcredits: u64) -> String {
    let whole = microcredits / MICROCREDITS_PER_CREDIT;
    let frac = microcredits % MICROCREDITS_PER_CREDIT;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{frac:06}");
    format!("{whole}.{}", frac.trim_end_matches('0'))
}

fn stored_secret<S: KeyValueStore>(secrets: &SecretStore<S>, id: &AuctionId) -> Result<BidSecret> {
    secrets.get(id)?.ok_or_else(|| {
        anyhow!(
            "no bid secret for auction {} on this machine; reveal and refund must be done from the client that placed the bid",
            id.digits()
        )
    })
}

async fn build_payload<R, S>(
    operation: BuildCommand,
    builder: &OperationBuilder,
    reader: &R,
    secrets: &SecretStore<S>,
) -> Result<OperationPayload>
where
    R: ChainReader + ?Sized,
    S: KeyValueStore,
{
    let payload = match operation {
        BuildCommand::Create {
            auction_id,
            item_id,
            min_bid,
            commit_duration,
            reveal_duration,
        } => {
            let auction_id = auction_id.unwrap_or_else(next_auction_id);
            info!(auction_id = %auction_id, "building create_auction");
            eprintln!(
                "Commit phase ~{}, reveal phase ~{}",
                format_block_duration(commit_duration),
                format_block_duration(reveal_duration)
            );
            builder.build_create_auction(&CreateAuctionParams {
                auction_id,
                item_id,
                min_bid,
                commit_duration,
                reveal_duration,
            })?
        }
        BuildCommand::Bid {
            auction_id,
            amount,
            deposit,
            records,
        } => {
            let payment_record = pick_payment_record(&records, deposit.unwrap_or(amount))?;
            let payload = builder.build_place_bid(&PlaceBidParams {
                deposit,
                payment_record,
                ..PlaceBidParams::new(auction_id, amount)
            })?;
            if let Some(meta) = &payload.metadata {
                eprintln!(
                    "After the wallet accepts this bid, store its secret:\n  auction-cli record-bid --auction-id {} --amount {} --salt {} --deposit {}",
                    meta.auction_id.digits(),
                    credits_arg(meta.bid_amount),
                    meta.salt,
                    credits_arg(meta.deposit)
                );
            }
            payload
        }
        BuildCommand::Reveal { auction_id } => {
            let secret = stored_secret(secrets, &auction_id)?;
            let check = check_reveal_eligibility(reader, &auction_id).await;
            if let Some(reason) = check.reason {
                bail!("reveal not possible: {reason}");
            }
            builder.build_reveal_bid(&BidOpening::from_secret(&secret))?
        }
        BuildCommand::Settle { auction_id } => {
            let check = check_settle_eligibility(reader, &auction_id).await;
            if let Some(reason) = check.reason {
                bail!("settlement not possible: {reason}");
            }
            let auction = reader
                .auction_struct(&auction_id)
                .await?
                .ok_or_else(|| anyhow!("auction {} not found", auction_id.digits()))?;
            let highest = reader
                .highest_bid(&auction_id)
                .await
                .context("highest bid unavailable; refusing to build settlement")?;
            if highest == 0 {
                bail!("auction {} has no recorded highest bid", auction_id.digits());
            }
            let auctioneer = auction
                .auctioneer
                .ok_or_else(|| anyhow!("auction {} has no auctioneer", auction_id.digits()))?;
            builder.build_settle_auction(&SettleParams {
                auction_id,
                auctioneer,
                winning_amount: highest,
            })
        }
        BuildCommand::Cancel { auction_id } => builder.build_cancel_auction(&auction_id),
        BuildCommand::Refund { auction_id, caller } => {
            let secret = stored_secret(secrets, &auction_id)?;
            let check = check_refund_eligibility(reader, &auction_id, &caller).await;
            if let Some(reason) = check.reason {
                bail!("refund not possible: {reason}");
            }
            builder.build_claim_refund(&BidOpening::from_secret(&secret))?
        }
        BuildCommand::Shield { recipient, amount } => {
            builder.build_shield_credits(&ShieldCreditsParams { recipient, amount })?
        }
    };
    Ok(payload)
}

/// With no records the wallet picks one itself.
fn pick_payment_record(records: &[String], deposit: u64) -> Result<Option<String>> {
    if records.is_empty() {
        return Ok(None);
    }
    if let Some(record) = select_payment_record(records.iter().map(String::as_str), deposit) {
        return Ok(Some(record.to_string()));
    }
    let largest = records.iter().filter_map(|r| record_microcredits(r)).max();
    match largest {
        Some(held) => bail!(
            "no record covers the {} deposit (largest holds {})",
            format_credits(deposit),
            format_credits(held)
        ),
        None => bail!("none of the supplied records is a credits record"),
    }
}

fn select_records(
    cache: &AuctionCache,
    status: Option<AuctionStatus>,
    creator: Option<&Address>,
) -> Vec<AuctionRecord> {
    match (status, creator) {
        (Some(status), Some(creator)) => cache
            .by_status(status)
            .into_iter()
            .filter(|r| r.auctioneer.as_ref() == Some(creator))
            .collect(),
        (Some(status), None) => cache.by_status(status),
        (None, Some(creator)) => cache.by_creator(creator),
        (None, None) => cache.list(),
    }
}

fn secrets_cmd<S: KeyValueStore>(action: SecretsCommand, secrets: &SecretStore<S>) -> Result<()> {
    match action {
        SecretsCommand::List => {
            let ids = secrets.auction_ids()?;
            if ids.is_empty() {
                println!("No bid secrets stored");
            }
            for id in ids {
                if let Some(secret) = secrets.get(&id)? {
                    println!(
                        "  [{}] bid {} deposit {}{}",
                        id.digits(),
                        format_credits(secret.bid_amount),
                        format_credits(secret.deposit),
                        if secret.revealed { " (revealed)" } else { "" }
                    );
                }
            }
        }
        SecretsCommand::Show { auction_id } => {
            print_json(&stored_secret(secrets, &auction_id)?)?;
        }
        SecretsCommand::Forget { auction_id } => {
            secrets.delete(&auction_id)?;
            println!("Forgot bid secret for auction {}", auction_id.digits());
        }
    }
    Ok(())
}

async fn list_cmd(
    client: &CliClient,
    refresh: bool,
    status: Option<AuctionStatus>,
    creator: Option<&Address>,
) -> Result<()> {
    if refresh {
        let updated = client.refresh_all().await;
        info!(updated, "cache refreshed");
    }
    let height = client.reader().current_block_height().await.ok();
    let records = select_records(client.cache(), status, creator);
    if records.is_empty() {
        println!("No auctions cached");
        return Ok(());
    }
    println!("Auctions:");
    for r in records {
        println!(
            "  [{}] {} - {} bids, min {}, by {}{}",
            r.short_id(),
            cached_phase(&r, height).label(),
            r.bid_count,
            format_credits(r.min_bid),
            r.auctioneer
                .as_ref()
                .map_or_else(|| "unknown".to_string(), |a| truncate_address(a.as_str(), 6)),
            if r.imported { " (imported)" } else { "" }
        );
    }
    Ok(())
}

async fn watch_cmd(reader: Arc<HttpChainReader>, cfg: &ClientConfig, id: AuctionId) -> Result<()> {
    let handle = spawn_auction_poller(reader, id.clone(), cfg.poll_interval());
    let mut updates = handle.subscribe();
    println!("Watching auction {} (Ctrl-C to stop)", id.digits());

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                if let Some(s) = snapshot {
                    let left = s.auction.as_ref().and_then(|a| {
                        blocks_remaining(s.phase, s.block_height, Some(a.commit_deadline), Some(a.reveal_deadline))
                    });
                    match left {
                        Some(left) => println!(
                            "block {}: {} ({} left)",
                            s.block_height,
                            s.phase.label(),
                            format_countdown(left, cfg.block_time_secs)
                        ),
                        None => println!("block {}: {}", s.block_height, s.phase.label()),
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("auction_cli=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli);
    let reader = Arc::new(HttpChainReader::new(&cfg)?);
    let builder = OperationBuilder::from_config(&cfg);

    match cli.command {
        Commands::Height => {
            println!("{}", reader.current_block_height().await?);
        }

        Commands::Auction { auction_id } => {
            auction_cmd(&reader, &cfg, &auction_id).await?;
        }

        Commands::Check { check } => {
            let result = match check {
                CheckCommand::Reveal { auction_id } => {
                    check_reveal_eligibility(&*reader, &auction_id).await
                }
                CheckCommand::Settle { auction_id } => {
                    check_settle_eligibility(&*reader, &auction_id).await
                }
                CheckCommand::Refund { auction_id, caller } => {
                    check_refund_eligibility(&*reader, &auction_id, &caller).await
                }
            };
            print_json(&result)?;
        }

        Commands::Build { operation } => {
            let store = Arc::new(SledStore::open(&cfg.data_dir)?);
            let secrets = SecretStore::new(store);
            print_json(&build_payload(operation, &builder, &*reader, &secrets).await?)?;
        }

        Commands::Secrets { action } => {
            let store = Arc::new(SledStore::open(&cfg.data_dir)?);
            secrets_cmd(action, &SecretStore::new(store))?;
        }

        Commands::RecordBid {
            auction_id,
            amount,
            salt,
            deposit,
        } => {
            let store = Arc::new(SledStore::open(&cfg.data_dir)?);
            let secrets = SecretStore::new(store);
            let secret = BidSecret::new(
                auction_id.clone(),
                amount,
                salt,
                deposit.unwrap_or(amount),
                now_ms(),
            );
            secrets.put(&auction_id, &secret)?;
            println!("Stored bid secret for auction {}", auction_id.digits());
        }

        Commands::Import { auction_id } => {
            let store = Arc::new(SledStore::open(&cfg.data_dir)?);
            let client: CliClient = AuctionClient::new(reader, OfflineWallet, store, builder)?;
            let record = client.import_auction(&auction_id).await?;
            println!(
                "Imported auction {} ({:?}, {} bids)",
                record.id.digits(),
                record.status,
                record.bid_count
            );
        }

        Commands::List {
            refresh,
            status,
            creator,
        } => {
            let store = Arc::new(SledStore::open(&cfg.data_dir)?);
            let client: CliClient = AuctionClient::new(reader, OfflineWallet, store, builder)?;
            list_cmd(&client, refresh, status.map(Into::into), creator.as_ref()).await?;
        }

        Commands::Watch { auction_id } => {
            watch_cmd(reader, &cfg, auction_id).await?;
        }
    }

    Ok(())
}
