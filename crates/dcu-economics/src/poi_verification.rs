//! # PoI Verification Manager
//!
//! Authorized verifiers record one approve/reject decision per Proof of
//! Impact id. The log per id is append-only. There is no quorum: a single
//! approval marks the id approved, and later rejections do not retract it.

use crate::verifier_registry::VerifierDirectory;
use dcu_core::prelude::*;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// One verifier decision
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoiVerification {
    pub verifier: Address,
    pub status: VerificationStatus,
    pub timestamp: Timestamp,
    pub reason: String,
}

#[derive(Default)]
struct PoiState {
    logs: HashMap<u64, Vec<PoiVerification>>,
    voted: HashSet<(u64, Address)>,
    by_verifier: HashMap<Address, Vec<u64>>,
}

/// PoI verification manager contract
pub struct PoiVerificationManager {
    address: Address,
    access: AccessControl,
    registry: RwLock<Arc<dyn VerifierDirectory>>,
    clock: SharedClock,
    events: SharedEventLog,
    state: RwLock<PoiState>,
}

impl PoiVerificationManager {
    pub fn new(
        address: Address,
        owner: Address,
        registry: Arc<dyn VerifierDirectory>,
        clock: SharedClock,
        events: SharedEventLog,
    ) -> Self {
        Self {
            address,
            access: AccessControl::new(owner).with_events(events.clone(), address),
            registry: RwLock::new(registry),
            clock,
            events,
            state: RwLock::new(PoiState::default()),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    /// Record the caller's decision on `poi_id`
    pub fn submit_verification(
        &self,
        caller: &Address,
        poi_id: u64,
        status: VerificationStatus,
        reason: impl Into<String>,
    ) -> Result<()> {
        if poi_id == 0 {
            return Err(DcuError::InvalidPoiId(poi_id));
        }
        if status == VerificationStatus::Pending {
            return Err(DcuError::InvalidStatus);
        }
        if !self.registry.read().is_verifier(caller)? {
            tracing::warn!(caller = %caller, poi_id, "verification from non-verifier rejected");
            return Err(DcuError::NotAuthorizedVerifier(*caller));
        }

        let entry = PoiVerification {
            verifier: *caller,
            status,
            timestamp: self.clock.now(),
            reason: reason.into(),
        };

        {
            let mut state = self.state.write();
            if !state.voted.insert((poi_id, *caller)) {
                return Err(DcuError::AlreadyVerified { poi_id, verifier: *caller });
            }
            state.logs.entry(poi_id).or_default().push(entry.clone());
            state.by_verifier.entry(*caller).or_default().push(poi_id);
        }

        tracing::info!(poi_id, verifier = %caller, ?status, "verification submitted");
        self.events.emit(
            self.address,
            Event::VerificationSubmitted {
                poi_id,
                verifier: entry.verifier,
                status: entry.status,
                timestamp: entry.timestamp,
                reason: entry.reason,
            },
        );
        Ok(())
    }

    /// Point the manager at another verifier registry (owner-only)
    pub fn set_registry(&self, caller: &Address, registry: Arc<dyn VerifierDirectory>) -> Result<()> {
        self.access.ensure_owner(caller)?;
        if registry.address().is_zero() {
            return Err(DcuError::InvalidAddress);
        }
        *self.registry.write() = registry;
        Ok(())
    }

    // === Views ===

    /// Full decision log for `poi_id`, oldest first
    pub fn verifications(&self, poi_id: u64) -> Vec<PoiVerification> {
        self.state.read().logs.get(&poi_id).cloned().unwrap_or_default()
    }

    /// Most recent decision; fails with `InvalidPoiId` when there is none
    pub fn latest_verification(&self, poi_id: u64) -> Result<PoiVerification> {
        self.state
            .read()
            .logs
            .get(&poi_id)
            .and_then(|log| log.last().cloned())
            .ok_or(DcuError::InvalidPoiId(poi_id))
    }

    /// True once any verifier has approved `poi_id`
    pub fn is_poi_approved(&self, poi_id: u64) -> bool {
        self.state
            .read()
            .logs
            .get(&poi_id)
            .map(|log| log.iter().any(|v| v.status == VerificationStatus::Approved))
            .unwrap_or(false)
    }

    pub fn verification_count(&self, poi_id: u64) -> usize {
        self.state.read().logs.get(&poi_id).map(Vec::len).unwrap_or(0)
    }

    pub fn has_verified(&self, poi_id: u64, verifier: &Address) -> bool {
        self.state.read().voted.contains(&(poi_id, *verifier))
    }

    /// Ids `verifier` has voted on, in submission order
    pub fn verifications_by(&self, verifier: &Address) -> Vec<u64> {
        self.state.read().by_verifier.get(verifier).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AllowList {
        members: HashSet<Address>,
    }

    impl VerifierDirectory for AllowList {
        fn address(&self) -> Address {
            Address::from_label("registry")
        }
        fn is_verifier(&self, account: &Address) -> Result<bool> {
            if account.is_zero() {
                return Err(DcuError::InvalidAddress);
            }
            Ok(self.members.contains(account))
        }
    }

    struct Fixture {
        manager: PoiVerificationManager,
        clock: ManualClock,
        v1: Address,
        v2: Address,
        v3: Address,
        outsider: Address,
    }

    fn setup() -> Fixture {
        let clock = ManualClock::new(500);
        let events = Arc::new(EventLog::new(Arc::new(clock.clone())));
        let v1 = Address::from_label("verifier-1");
        let v2 = Address::from_label("verifier-2");
        let v3 = Address::from_label("verifier-3");
        let registry = Arc::new(AllowList { members: [v1, v2, v3].into_iter().collect() });
        let manager = PoiVerificationManager::new(
            Address::from_label("poi-manager"),
            Address::from_label("owner"),
            registry,
            Arc::new(clock.clone()),
            events,
        );
        Fixture {
            manager,
            clock,
            v1,
            v2,
            v3,
            outsider: Address::from_label("outsider"),
        }
    }

    #[test]
    fn test_input_validation() {
        let f = setup();
        assert_eq!(
            f.manager.submit_verification(&f.v1, 0, VerificationStatus::Approved, ""),
            Err(DcuError::InvalidPoiId(0))
        );
        assert_eq!(
            f.manager.submit_verification(&f.v1, 1, VerificationStatus::Pending, ""),
            Err(DcuError::InvalidStatus)
        );
        assert_eq!(
            f.manager.submit_verification(&f.outsider, 1, VerificationStatus::Approved, ""),
            Err(DcuError::NotAuthorizedVerifier(f.outsider))
        );
        assert_eq!(f.manager.verification_count(1), 0);
    }

    #[test]
    fn test_one_vote_per_verifier() {
        let f = setup();
        f.manager
            .submit_verification(&f.v1, 7, VerificationStatus::Approved, "looks clean")
            .unwrap();
        assert_eq!(
            f.manager.submit_verification(&f.v1, 7, VerificationStatus::Rejected, "changed mind"),
            Err(DcuError::AlreadyVerified { poi_id: 7, verifier: f.v1 })
        );

        f.clock.advance(60);
        f.manager
            .submit_verification(&f.v2, 7, VerificationStatus::Rejected, "blurry photo")
            .unwrap();

        let log = f.manager.verifications(7);
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].timestamp, 500);
        assert_eq!(log[1].verifier, f.v2);
        assert_eq!(f.manager.latest_verification(7).unwrap().reason, "blurry photo");
        assert!(f.manager.has_verified(7, &f.v1));
        assert_eq!(f.manager.verifications_by(&f.v2), vec![7]);
    }

    #[test]
    fn test_any_approval_wins() {
        let f = setup();
        f.manager.submit_verification(&f.v1, 3, VerificationStatus::Rejected, "").unwrap();
        assert!(!f.manager.is_poi_approved(3));

        f.manager.submit_verification(&f.v2, 3, VerificationStatus::Approved, "").unwrap();
        f.manager.submit_verification(&f.v3, 3, VerificationStatus::Rejected, "").unwrap();
        assert!(f.manager.is_poi_approved(3));
        assert_eq!(
            f.manager.latest_verification(3).unwrap().status,
            VerificationStatus::Rejected
        );
    }

    #[test]
    fn test_latest_on_empty_log() {
        let f = setup();
        assert_eq!(f.manager.latest_verification(9), Err(DcuError::InvalidPoiId(9)));
        assert!(f.manager.verifications(9).is_empty());
        assert!(!f.manager.is_poi_approved(9));
    }
}
