//! End-to-end tests for the sealed-bid auction client.
//!
//! These tests drive several clients against one shared mock ledger:
//! 1. Auction creation
//! 2. Sealed bids from independent bidders
//! 3. Reveals once the commit phase closes
//! 4. Settlement with the highest bid
//! 5. Refunds for losing bidders

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use auction_client::{
        AuctionClient, ClientError, CreateAuctionParams, Ineligible, MemoryStore, MockChain,
        MockWallet, OperationBuilder, PlaceBidParams, SecretStore, SledStore,
    };
    use auction_crypto::generate_salt;
    use auction_types::{Address, AuctionId, AuctionStatus};

    type Client<S> = AuctionClient<MockChain, Arc<MockWallet>, S>;

    const COMMIT_DEADLINE: u32 = 100;
    const REVEAL_DEADLINE: u32 = 200;

    fn addr(fill: char) -> Address {
        format!("aleo1{}", fill.to_string().repeat(58))
            .parse()
            .unwrap()
    }

    fn client_with<S>(chain: &Arc<MockChain>, store: Arc<S>) -> (Client<S>, Arc<MockWallet>)
    where
        S: auction_client::KeyValueStore,
    {
        let wallet = Arc::new(MockWallet::new());
        let client = AuctionClient::new(
            Arc::clone(chain),
            Arc::clone(&wallet),
            store,
            OperationBuilder::default(),
        )
        .unwrap();
        (client, wallet)
    }

    fn client(chain: &Arc<MockChain>) -> (Client<MemoryStore>, Arc<MockWallet>) {
        client_with(chain, Arc::new(MemoryStore::new()))
    }

    /// Test the complete auction flow with one auctioneer and two bidders.
    #[tokio::test]
    async fn test_full_auction_flow() {
        let chain = Arc::new(MockChain::with_height(10));
        let id = AuctionId::from(42u64);
        let (auctioneer_addr, alice_addr, bob_addr) = (addr('q'), addr('p'), addr('z'));

        // Create
        let (auctioneer, auctioneer_wallet) = client(&chain);
        let auctioneer = auctioneer.with_account(auctioneer_addr.clone());
        let (_, record) = auctioneer
            .create_auction(CreateAuctionParams {
                auction_id: id.clone(),
                item_id: None,
                min_bid: 1_000,
                commit_duration: 90,
                reveal_duration: 100,
            })
            .await
            .unwrap();
        assert_eq!(record.auctioneer, Some(auctioneer_addr.clone()));
        assert_eq!(
            auctioneer_wallet.last().unwrap().function_name,
            "create_auction"
        );

        // The ledger confirms the auction.
        chain.open_auction(
            id.clone(),
            Some(auctioneer_addr.clone()),
            COMMIT_DEADLINE,
            REVEAL_DEADLINE,
        );

        // Bid
        let (alice, _) = client(&chain);
        let (bob, bob_wallet) = client(&chain);
        let (_, alice_secret) = alice
            .place_bid(PlaceBidParams::new(id.clone(), 5_000))
            .await
            .unwrap();
        let (_, bob_secret) = bob
            .place_bid(PlaceBidParams {
                deposit: Some(10_000),
                ..PlaceBidParams::new(id.clone(), 8_000)
            })
            .await
            .unwrap();
        assert_ne!(alice_secret.salt, bob_secret.salt);
        assert_eq!(bob_wallet.last().unwrap().inputs[3], "10000u64");

        // Reveal is refused while bids are still sealed.
        let err = alice.reveal_bid(&id).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Ineligible(Ineligible::CommitPhaseOpen { blocks: 91 })
        ));

        chain.set_height(150);
        alice.reveal_bid(&id).await.unwrap();
        bob.reveal_bid(&id).await.unwrap();
        chain.set_highest_bid(id.clone(), 8_000);
        assert!(bob.secrets().get(&id).unwrap().unwrap().revealed);

        // Settle
        let err = auctioneer.settle_auction(&id).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Ineligible(Ineligible::RevealNotOver { blocks: 51 })
        ));

        chain.set_height(REVEAL_DEADLINE + 1);
        let (_, winning) = auctioneer.settle_auction(&id).await.unwrap();
        assert_eq!(winning, 8_000);
        let settle = auctioneer_wallet.last().unwrap();
        assert_eq!(settle.function_name, "settle_auction");
        assert_eq!(settle.inputs[1], auctioneer_addr.to_string());
        assert_eq!(settle.inputs[2], "8000u64");
        assert_eq!(
            auctioneer.cache().get(&id).unwrap().status,
            AuctionStatus::Ended
        );

        chain.settle(&id, Some(bob_addr.clone()), 8_000);

        // Refund
        let err = bob.claim_refund(&id, &bob_addr).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Ineligible(Ineligible::WinnerCannotRefund)
        ));
        assert!(bob.secrets().get(&id).unwrap().is_some());

        alice.claim_refund(&id, &alice_addr).await.unwrap();
        assert!(alice.secrets().get(&id).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cancelled_auction() {
        let chain = Arc::new(MockChain::with_height(10));
        let id = AuctionId::from(9u64);
        chain.open_auction(id.clone(), Some(addr('q')), COMMIT_DEADLINE, REVEAL_DEADLINE);

        let (auctioneer, _) = client(&chain);
        auctioneer.import_auction(&id).await.unwrap();
        auctioneer.cancel_auction(&id).await.unwrap();
        assert_eq!(
            auctioneer.cache().get(&id).unwrap().status,
            AuctionStatus::Cancelled
        );

        chain.set_status(&id, AuctionStatus::Cancelled);
        let (bidder, wallet) = client(&chain);
        let err = bidder
            .place_bid(PlaceBidParams::new(id.clone(), 2_000))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::NotAcceptingBids { .. }));
        assert!(wallet.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_reveal_requires_local_secret() {
        let chain = Arc::new(MockChain::with_height(150));
        let id = AuctionId::from(3u64);
        chain.open_auction(id.clone(), None, COMMIT_DEADLINE, REVEAL_DEADLINE);

        // A different machine never saw the bid.
        let (other, wallet) = client(&chain);
        let err = other.reveal_bid(&id).await.unwrap_err();
        assert!(matches!(err, ClientError::SecretNotFound(_)));
        assert!(wallet.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_reveal_fails_open_when_chain_unreachable() {
        let chain = Arc::new(MockChain::with_height(50));
        let id = AuctionId::from(5u64);
        chain.open_auction(id.clone(), None, COMMIT_DEADLINE, REVEAL_DEADLINE);

        let (bidder, wallet) = client(&chain);
        bidder
            .place_bid(PlaceBidParams::new(id.clone(), 1_500))
            .await
            .unwrap();

        chain.set_height(150);
        chain.fail_reads(true);
        bidder.reveal_bid(&id).await.unwrap();
        assert_eq!(wallet.last().unwrap().function_name, "reveal_bid");
    }

    #[tokio::test]
    async fn test_settle_refuses_without_highest_bid() {
        let chain = Arc::new(MockChain::with_height(REVEAL_DEADLINE + 5));
        let id = AuctionId::from(11u64);
        chain.open_auction(id.clone(), Some(addr('q')), COMMIT_DEADLINE, REVEAL_DEADLINE);

        let (auctioneer, wallet) = client(&chain);
        let err = auctioneer.settle_auction(&id).await.unwrap_err();
        assert!(matches!(err, ClientError::NoHighestBid(_)));

        chain.set_highest_bid(id.clone(), 4_000);
        chain.fail_highest_bid(true);
        let err = auctioneer.settle_auction(&id).await.unwrap_err();
        assert!(matches!(err, ClientError::Chain(_)));
        assert!(wallet.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_secret_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let chain = Arc::new(MockChain::with_height(20));
        let id = AuctionId::from(77u64);
        chain.open_auction(id.clone(), None, COMMIT_DEADLINE, REVEAL_DEADLINE);

        let secret = {
            let store = Arc::new(SledStore::open(dir.path()).unwrap());
            let (bidder, _) = client_with(&chain, store);
            bidder.import_auction(&id).await.unwrap();
            let (_, secret) = bidder
                .place_bid(PlaceBidParams::new(id.clone(), 3_000))
                .await
                .unwrap();
            secret
        };

        let store = Arc::new(SledStore::open(dir.path()).unwrap());
        let (bidder, wallet) = client_with(&chain, store);
        assert_eq!(bidder.secrets().get(&id).unwrap(), Some(secret.clone()));
        assert_eq!(bidder.cache().get(&id).unwrap().bid_count, 1);

        chain.set_height(120);
        bidder.reveal_bid(&id).await.unwrap();
        let reveal = wallet.last().unwrap();
        assert_eq!(reveal.inputs[2], secret.salt.literal());
    }

    #[test]
    fn test_externally_recorded_bid() {
        // A bid submitted through another tool is recorded with its salt.
        let secrets = SecretStore::new(MemoryStore::new());
        let id = AuctionId::from(8u64);
        let salt = generate_salt().unwrap();
        let secret =
            auction_types::BidSecret::new(id.clone(), 2_500, salt.clone(), 2_500, 1_700_000_000_000);
        secrets.put(&id, &secret).unwrap();

        let stored = secrets.get(&id).unwrap().unwrap();
        assert_eq!(stored.salt, salt);
        let json = serde_json::to_value(&stored).unwrap();
        assert_eq!(json["bid_amount"], 2_500);
    }
}
