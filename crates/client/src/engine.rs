//! Auction workflows.
//!
//! Every state-changing operation follows the same sequence:
//!
//! 1. claim the auction's in-flight slot,
//! 2. build the payload,
//! 3. check eligibility against the chain (reveal, settle, refund),
//! 4. hand the payload to the wallet,
//! 5. only after the wallet accepted it, update the secret store and cache.
//!
//! Nothing local is written for a payload the wallet refused.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{error, info, warn};

use auction_crypto::{generate_auction_id, generate_salt};
use auction_types::{
    Address, AuctionId, AuctionRecord, AuctionStatus, BidSecret, OperationPayload, Phase,
    TransactionId,
};

use crate::builder::{
    BidOpening, CreateAuctionParams, OperationBuilder, PlaceBidParams, SettleParams,
    ShieldCreditsParams,
};
use crate::cache::AuctionCache;
use crate::eligibility::{
    check_refund_eligibility, check_reveal_eligibility, check_settle_eligibility,
};
use crate::error::{BuildError, ClientError, ClientResult};
use crate::format::is_real_transaction;
use crate::inflight::{InFlight, InFlightToken};
use crate::phase::phase_of;
use crate::query::ChainReader;
use crate::secrets::{KeyValueStore, SecretStore};
use crate::wallet::WalletExecutor;

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Fresh auction id for `create_auction`.
pub fn next_auction_id() -> AuctionId {
    generate_auction_id(now_ms(), &mut rand::thread_rng())
}

pub struct AuctionClient<R, W, S> {
    reader: Arc<R>,
    wallet: W,
    store: Arc<S>,
    secrets: SecretStore<Arc<S>>,
    cache: AuctionCache,
    builder: OperationBuilder,
    inflight: InFlight,
    account: Option<Address>,
}

impl<R, W, S> AuctionClient<R, W, S>
where
    R: ChainReader,
    W: WalletExecutor,
    S: KeyValueStore,
{
    /// Build a client; the auction cache is loaded from `store`.
    pub fn new(
        reader: Arc<R>,
        wallet: W,
        store: Arc<S>,
        builder: OperationBuilder,
    ) -> ClientResult<Self> {
        let cache = AuctionCache::load(&*store)?;
        Ok(Self {
            reader,
            wallet,
            secrets: SecretStore::new(Arc::clone(&store)),
            store,
            cache,
            builder,
            inflight: InFlight::new(),
            account: None,
        })
    }

    /// Address recorded as auctioneer of auctions created here.
    pub fn with_account(mut self, account: Address) -> Self {
        self.account = Some(account);
        self
    }

    pub fn reader(&self) -> Arc<R> {
        Arc::clone(&self.reader)
    }

    pub fn cache(&self) -> &AuctionCache {
        &self.cache
    }

    pub fn secrets(&self) -> &SecretStore<Arc<S>> {
        &self.secrets
    }

    pub fn builder(&self) -> &OperationBuilder {
        &self.builder
    }

    fn begin(&self, key: String) -> ClientResult<InFlightToken> {
        self.inflight
            .try_begin(key.clone())
            .ok_or(ClientError::Busy(key))
    }

    fn begin_auction(&self, id: &AuctionId) -> ClientResult<InFlightToken> {
        self.begin(id.digits().to_string())
    }

    async fn submit(&self, payload: &OperationPayload) -> ClientResult<TransactionId> {
        let tx = self.wallet.execute(payload).await.map_err(|e| {
            warn!(function = %payload.function_name, error = %e, "wallet rejected payload");
            e
        })?;
        if !is_real_transaction(&tx.0) {
            warn!(function = %payload.function_name, tx = %tx, "wallet returned a non-ledger transaction id");
        }
        info!(function = %payload.function_name, tx = %tx, "payload accepted");
        Ok(tx)
    }

    fn persist_cache(&self) {
        if let Err(e) = self.cache.save(&*self.store) {
            warn!(error = %e, "failed to persist auction cache");
        }
    }

    pub async fn create_auction(
        &self,
        params: CreateAuctionParams,
    ) -> ClientResult<(TransactionId, AuctionRecord)> {
        let _token = self.begin_auction(&params.auction_id)?;
        let payload = self.builder.build_create_auction(&params)?;
        let tx = self.submit(&payload).await?;

        let record = AuctionRecord {
            id: params.auction_id.clone(),
            item_id: params.item_id.unwrap_or_else(|| params.auction_id.clone()),
            auctioneer: self.account.clone(),
            min_bid: params.min_bid,
            commit_duration: Some(params.commit_duration),
            reveal_duration: Some(params.reveal_duration),
            commit_deadline: None,
            reveal_deadline: None,
            status: AuctionStatus::Active,
            bid_count: 0,
            winner: None,
            winning_bid: None,
            program_version: self.builder.program_id().to_string(),
            imported: false,
            created_at: now_ms(),
        };
        self.cache.add(record.clone());
        self.persist_cache();
        Ok((tx, record))
    }

    /// Place a sealed bid and store its opening once the wallet accepts it.
    pub async fn place_bid(
        &self,
        mut params: PlaceBidParams,
    ) -> ClientResult<(TransactionId, BidSecret)> {
        let id = params.auction_id.clone();
        let _token = self.begin_auction(&id)?;

        if self.secrets.get(&id)?.is_some() {
            return Err(ClientError::AlreadyBid(id));
        }
        self.check_accepting_bids(&id, params.bid_amount).await?;

        let salt = match params.salt.take() {
            Some(salt) => salt,
            None => generate_salt().map_err(BuildError::from)?,
        };
        params.salt = Some(salt.clone());
        let payload = self.builder.build_place_bid(&params)?;

        let deposit = params.deposit.unwrap_or(params.bid_amount);
        let tx = self.submit(&payload).await?;

        let secret = BidSecret::new(id.clone(), params.bid_amount, salt, deposit, now_ms());
        if let Err(source) = self.secrets.put(&id, &secret) {
            error!(auction_id = %id, tx = %tx, error = %source, "bid submitted but secret not stored");
            return Err(ClientError::SecretNotPersisted {
                tx,
                secret: Box::new(secret),
                source,
            });
        }
        if self.cache.record_bid(&id) {
            self.persist_cache();
        }
        info!(auction_id = %id, tx = %tx, "bid placed");
        Ok((tx, secret))
    }

    /// Fee-saving pre-check; a failed read lets the bid through.
    async fn check_accepting_bids(&self, id: &AuctionId, bid_amount: u64) -> ClientResult<()> {
        let (height, auction) = tokio::join!(
            self.reader.current_block_height(),
            self.reader.auction_struct(id)
        );
        let (height, auction) = match (height, auction) {
            (Ok(height), Ok(auction)) => (height, auction),
            (Err(e), _) | (_, Err(e)) => {
                warn!(auction_id = %id, error = %e, "chain read failed, skipping bid pre-check");
                return Ok(());
            }
        };
        let auction = auction.ok_or_else(|| ClientError::NotFound(id.clone()))?;

        let phase = phase_of(&auction, Some(height));
        if !phase.accepts_bids() {
            return Err(ClientError::NotAcceptingBids {
                auction_id: id.clone(),
                phase: phase.label(),
            });
        }
        if let Some(min_bid) = auction.min_bid {
            if bid_amount < min_bid {
                return Err(ClientError::BelowMinimum {
                    bid: bid_amount,
                    min_bid,
                });
            }
        }
        Ok(())
    }

    pub async fn reveal_bid(&self, id: &AuctionId) -> ClientResult<TransactionId> {
        let _token = self.begin_auction(id)?;
        let secret = self
            .secrets
            .get(id)?
            .ok_or_else(|| ClientError::SecretNotFound(id.clone()))?;
        let payload = self
            .builder
            .build_reveal_bid(&BidOpening::from_secret(&secret))?;

        check_reveal_eligibility(&*self.reader, id)
            .await
            .into_result()
            .map_err(ClientError::Ineligible)?;

        let tx = self.submit(&payload).await?;
        self.secrets.mark_revealed(id)?;
        info!(auction_id = %id, tx = %tx, "bid revealed");
        Ok(tx)
    }

    /// Settle with the current highest bid. Returns the winning amount.
    pub async fn settle_auction(&self, id: &AuctionId) -> ClientResult<(TransactionId, u64)> {
        let _token = self.begin_auction(id)?;

        check_settle_eligibility(&*self.reader, id)
            .await
            .into_result()
            .map_err(ClientError::Ineligible)?;

        // Payload data must be authoritative: no fallback on read failure.
        let (auction, highest) =
            tokio::join!(self.reader.auction_struct(id), self.reader.highest_bid(id));
        let auction = auction?.ok_or_else(|| ClientError::NotFound(id.clone()))?;
        let highest = highest?;
        if highest == 0 {
            return Err(ClientError::NoHighestBid(id.clone()));
        }
        let auctioneer = auction
            .auctioneer
            .or_else(|| self.cache.get(id).and_then(|r| r.auctioneer))
            .ok_or_else(|| ClientError::MissingAuctioneer(id.clone()))?;

        let payload = self.builder.build_settle_auction(&SettleParams {
            auction_id: id.clone(),
            auctioneer,
            winning_amount: highest,
        });
        let tx = self.submit(&payload).await?;

        if self.cache.update(id, |r| {
            r.status = AuctionStatus::Ended;
            r.winning_bid = Some(highest);
        }) {
            self.persist_cache();
        }
        info!(auction_id = %id, tx = %tx, winning_amount = highest, "auction settled");
        Ok((tx, highest))
    }

    pub async fn cancel_auction(&self, id: &AuctionId) -> ClientResult<TransactionId> {
        let _token = self.begin_auction(id)?;
        let payload = self.builder.build_cancel_auction(id);
        let tx = self.submit(&payload).await?;

        if self.cache.update(id, |r| r.status = AuctionStatus::Cancelled) {
            self.persist_cache();
        }
        info!(auction_id = %id, tx = %tx, "auction cancelled");
        Ok(tx)
    }

    /// Reclaim the deposit of a losing bid. The local secret is removed once
    /// the wallet accepted the claim.
    pub async fn claim_refund(
        &self,
        id: &AuctionId,
        caller: &Address,
    ) -> ClientResult<TransactionId> {
        let _token = self.begin_auction(id)?;
        let secret = self
            .secrets
            .get(id)?
            .ok_or_else(|| ClientError::SecretNotFound(id.clone()))?;
        let payload = self
            .builder
            .build_claim_refund(&BidOpening::from_secret(&secret))?;

        check_refund_eligibility(&*self.reader, id, caller)
            .await
            .into_result()
            .map_err(ClientError::Ineligible)?;

        let tx = self.submit(&payload).await?;
        self.secrets.delete(id)?;
        info!(auction_id = %id, tx = %tx, "refund claimed");
        Ok(tx)
    }

    pub async fn shield_credits(&self, params: ShieldCreditsParams) -> ClientResult<TransactionId> {
        let _token = self.begin(format!("shield:{}", params.recipient))?;
        let payload = self.builder.build_shield_credits(&params)?;
        self.submit(&payload).await
    }

    /// Add an auction created elsewhere to the cache.
    pub async fn import_auction(&self, id: &AuctionId) -> ClientResult<AuctionRecord> {
        if self.cache.contains(id) {
            return Err(ClientError::AlreadyImported(id.clone()));
        }
        let (auction, bid_count) =
            tokio::join!(self.reader.auction_struct(id), self.reader.bid_count(id));
        let auction = auction?.ok_or_else(|| ClientError::NotFound(id.clone()))?;
        let bid_count = bid_count.unwrap_or_else(|e| {
            warn!(auction_id = %id, error = %e, "bid count unavailable");
            0
        });

        let record = AuctionRecord::from_chain(
            id.clone(),
            &auction,
            bid_count,
            self.builder.program_id(),
            now_ms(),
        );
        if !self.cache.add(record.clone()) {
            return Err(ClientError::AlreadyImported(id.clone()));
        }
        self.persist_cache();
        info!(auction_id = %id, status = ?record.status, "auction imported");
        Ok(record)
    }

    /// Reconcile one cached auction with the chain. `None` if the chain does
    /// not know it (yet); the cached entry is left untouched.
    pub async fn refresh_auction(&self, id: &AuctionId) -> ClientResult<Option<AuctionRecord>> {
        let (auction, bid_count) =
            tokio::join!(self.reader.auction_struct(id), self.reader.bid_count(id));
        let Some(auction) = auction? else {
            return Ok(None);
        };
        let bid_count = bid_count?;

        if self.cache.reconcile(id, &auction, bid_count) {
            self.persist_cache();
        }
        Ok(self.cache.get(id))
    }

    /// Refresh every non-terminal cached auction. Failures are logged and
    /// skipped. Returns the number of auctions updated.
    pub async fn refresh_all(&self) -> usize {
        let pending: Vec<_> = self
            .cache
            .list()
            .into_iter()
            .filter(|r| !matches!(r.status, AuctionStatus::Ended | AuctionStatus::Cancelled))
            .map(|r| r.id)
            .collect();

        let mut updated = 0;
        for id in pending {
            match self.refresh_auction(&id).await {
                Ok(Some(_)) => updated += 1,
                Ok(None) => {}
                Err(e) => warn!(auction_id = %id, error = %e, "refresh failed"),
            }
        }
        updated
    }

    /// Live phase from chain data.
    pub async fn phase_of(&self, id: &AuctionId) -> ClientResult<Phase> {
        let (height, auction) = tokio::join!(
            self.reader.current_block_height(),
            self.reader.auction_struct(id)
        );
        let auction = auction?.ok_or_else(|| ClientError::NotFound(id.clone()))?;
        Ok(phase_of(&auction, Some(height?)))
    }
}
