//! Integration tests for the composed DeCleanup network
//!
//! These tests drive the network only through transactions, following a
//! user from PoI approval through NFT mint, upgrades, referral and claim.

use dcu_core::prelude::*;
use dcu_node::{Account, ContractId, DcuAmount, Network, NetworkConfig, NodeError, Transaction, TxOutput};
use std::sync::Arc;

fn acct(label: &str) -> Account {
    Account(Address::from_label(label))
}

fn whole(n: u64) -> DcuAmount {
    DcuAmount(dcu(n))
}

mod lifecycle_tests {
    use super::*;

    #[test]
    fn test_poi_to_claim() {
        let clock = ManualClock::new(1_000);
        let net = Network::new(NetworkConfig::default(), Arc::new(clock.clone())).unwrap();
        let owner = net.owner();
        let oracle = net.oracle();
        let verifier = Address::from_label("verifier");
        let alice = Address::from_label("alice");
        let bob = Address::from_label("bob");

        let receipt = net.apply(&owner, Transaction::Mint { to: acct("verifier"), amount: whole(1_000) });
        assert!(receipt.success);
        assert!(net
            .apply(&verifier, Transaction::Approve { spender: ContractId::Staking, amount: whole(1_000) })
            .success);
        assert!(net.apply(&verifier, Transaction::StakeVerifier { amount: whole(1_000) }).success);

        let receipt = net.apply(
            &verifier,
            Transaction::SubmitVerification {
                poi_id: 1,
                status: VerificationStatus::Approved,
                reason: "before/after photos match".into(),
            },
        );
        assert!(receipt.success);
        assert_eq!(receipt.events.len(), 1);

        let receipt = net.apply(&oracle, Transaction::SyncPoi { poi_id: 1, user: acct("alice") });
        assert_eq!(receipt.output, Some(TxOutput::Approved(true)));

        assert!(net
            .apply(&owner, Transaction::RegisterReferral { invitee: acct("alice"), referrer: acct("bob") })
            .success);

        let receipt = net.apply(&alice, Transaction::SafeMint);
        assert_eq!(receipt.output, Some(TxOutput::TokenId(1)));
        let names: Vec<&str> = receipt.events.iter().map(|r| r.event.name()).collect();
        assert_eq!(
            names,
            vec!["NftMintRecorded", "ImpactProductClaimReward", "ReferralReward", "NftMinted"]
        );

        let receipt = net.apply(&alice, Transaction::UpgradeNft { token_id: 1 });
        assert_eq!(receipt.output, Some(TxOutput::Level(2)));

        let summary = net.summary(&alice);
        assert_eq!(summary.rewards.current_balance, dcu(20));
        assert_eq!(summary.claimed_levels, vec![1, 2]);
        assert!(summary.eligibility.reward_eligible);
        assert_eq!(net.rewards().balance_of(&bob), dcu(1));

        assert!(net.apply(&alice, Transaction::ClaimRewards { amount: whole(20) }).success);
        assert_eq!(net.token().balance_of(&alice), dcu(20));

        // the same approval synced again is not a new verification
        clock.advance(6 * SECONDS_PER_DAY);
        let receipt = net.apply(&oracle, Transaction::SyncPoi { poi_id: 1, user: acct("alice") });
        assert_eq!(receipt.output, Some(TxOutput::Approved(true)));
        assert!(receipt.events.is_empty());
        assert_eq!(net.rewards().balance_of(&alice), 0);

        // a fresh approval within the window earns the streak bonus
        assert!(net
            .apply(
                &verifier,
                Transaction::SubmitVerification {
                    poi_id: 3,
                    status: VerificationStatus::Approved,
                    reason: "second cleanup".into(),
                },
            )
            .success);
        assert!(net.apply(&oracle, Transaction::SyncPoi { poi_id: 3, user: acct("alice") }).success);
        assert_eq!(net.rewards().balance_of(&alice), dcu(3));
    }

    #[test]
    fn test_sync_requires_oracle() {
        let net = Network::new(NetworkConfig::default(), Arc::new(ManualClock::new(0))).unwrap();
        let mallory = Address::from_label("mallory");
        net.registry().add_verifier(&net.owner(), &mallory).unwrap();
        assert!(net
            .apply(
                &mallory,
                Transaction::SubmitVerification {
                    poi_id: 2,
                    status: VerificationStatus::Approved,
                    reason: String::new(),
                },
            )
            .success);

        let receipt = net.apply(&mallory, Transaction::SyncPoi { poi_id: 2, user: acct("mallory") });
        assert!(!receipt.success);
        assert!(!net.rewards().is_poi_verified(&mallory));
    }

    #[test]
    fn test_submission_to_ledger_claim() {
        let mut config = NetworkConfig::default();
        config.accounting.whitelist = vec!["carol".into()];
        let net = Network::new(config, Arc::new(ManualClock::new(0))).unwrap();
        let owner = net.owner();
        let carol = Address::from_label("carol");

        let receipt = net.apply(&carol, Transaction::CreateSubmission { data_uri: "ipfs://river".into() });
        assert_eq!(receipt.output, Some(TxOutput::SubmissionId(1)));
        assert!(net.apply(&owner, Transaction::ApproveSubmission { id: 1 }).success);
        assert!(!net.apply(&owner, Transaction::RejectSubmission { id: 1 }).success);

        assert!(net.apply(&carol, Transaction::ClaimTokens { amount: whole(10) }).success);
        assert_eq!(net.token().balance_of(&carol), dcu(10));
        assert_eq!(net.ledger().claimable_balance(&carol), 0);
    }
}

mod config_tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dcu.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[network]\nname = \"testnet\"\n\n[rewards]\nreferral = 2\n\n[staking]\nminimum_stake = 500\n"
        )
        .unwrap();

        let config = NetworkConfig::load(Some(path.as_path())).unwrap();
        assert_eq!(config.network.name, "testnet");
        assert_eq!(config.rewards.referral, 2);
        assert_eq!(config.staking.minimum_stake, 500);

        let net = Network::new(config, Arc::new(ManualClock::new(0))).unwrap();
        assert_eq!(net.rewards().reward_amounts().referral, dcu(2));
        assert_eq!(net.staking().params().minimum_stake, dcu(500));
    }

    #[test]
    fn test_invalid_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[submission]\ndefault_reward = 5000\n").unwrap();
        assert!(matches!(
            NetworkConfig::load(Some(path.as_path())),
            Err(NodeError::InvalidConfig(_))
        ));

        let missing = dir.path().join("missing.toml");
        assert!(matches!(NetworkConfig::load(Some(missing.as_path())), Err(NodeError::Config(_))));
    }
}
