//! # Submissions
//!
//! Users submit a data URI describing a cleanup; an admin approves or
//! rejects it. Each submission transitions once:
//!
//! ```text
//! Pending ──approve──► Approved   (credits claimable reward once)
//!    └─────reject───► Rejected
//! ```

use crate::accounting::DcuAccounting;
use crate::constants::{DEFAULT_SUBMISSION_REWARD, MAX_REWARD_AMOUNT};
use dcu_core::prelude::*;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

/// A user submission
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub id: u64,
    pub submitter: Address,
    pub data_uri: String,
    pub status: SubmissionStatus,
    pub created_at: Timestamp,
    pub reviewed_at: Option<Timestamp>,
    /// Amount credited on approval
    pub reward: Amount,
    pub rewarded: bool,
}

struct SubmissionState {
    submissions: BTreeMap<u64, Submission>,
    by_submitter: HashMap<Address, Vec<u64>>,
    next_id: u64,
    default_reward: Amount,
}

impl SubmissionState {
    fn pending(&mut self, id: u64) -> Result<&mut Submission> {
        let submission = self.submissions.get_mut(&id).ok_or(DcuError::SubmissionNotFound(id))?;
        match submission.status {
            SubmissionStatus::Pending => Ok(submission),
            SubmissionStatus::Approved => Err(DcuError::AlreadyApproved(id)),
            SubmissionStatus::Rejected => Err(DcuError::AlreadyRejected(id)),
        }
    }
}

/// Submission registry contract
pub struct SubmissionRegistry {
    address: Address,
    access: AccessControl,
    ledger: Arc<DcuAccounting>,
    clock: SharedClock,
    events: SharedEventLog,
    state: RwLock<SubmissionState>,
}

impl SubmissionRegistry {
    pub fn new(
        address: Address,
        owner: Address,
        ledger: Arc<DcuAccounting>,
        clock: SharedClock,
        events: SharedEventLog,
    ) -> Self {
        Self {
            address,
            access: AccessControl::new(owner).with_events(events.clone(), address),
            ledger,
            clock,
            events,
            state: RwLock::new(SubmissionState {
                submissions: BTreeMap::new(),
                by_submitter: HashMap::new(),
                next_id: 1,
                default_reward: DEFAULT_SUBMISSION_REWARD,
            }),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    pub fn create_submission(&self, caller: &Address, data_uri: impl Into<String>) -> Result<u64> {
        let data_uri = data_uri.into();
        if data_uri.trim().is_empty() {
            return Err(DcuError::EmptyDataUri);
        }
        let now = self.clock.now();

        let id = {
            let mut state = self.state.write();
            let id = state.next_id;
            state.next_id += 1;
            state.submissions.insert(
                id,
                Submission {
                    id,
                    submitter: *caller,
                    data_uri: data_uri.clone(),
                    status: SubmissionStatus::Pending,
                    created_at: now,
                    reviewed_at: None,
                    reward: 0,
                    rewarded: false,
                },
            );
            state.by_submitter.entry(*caller).or_default().push(id);
            id
        };

        tracing::info!(id, submitter = %caller, "submission created");
        self.events.emit(
            self.address,
            Event::SubmissionCreated { id, submitter: *caller, data_uri },
        );
        Ok(id)
    }

    /// Approve a pending submission (owner or admin) and credit the
    /// submitter's claimable balance on the ledger
    pub fn approve_submission(&self, caller: &Address, id: u64) -> Result<Amount> {
        self.access.ensure_owner_or_role(caller, Role::Admin)?;
        let now = self.clock.now();

        let (submitter, reward) = {
            let mut state = self.state.write();
            let default_reward = state.default_reward;
            let submission = state.pending(id)?;
            let reward = if submission.rewarded { 0 } else { default_reward };
            submission.status = SubmissionStatus::Approved;
            submission.reviewed_at = Some(now);
            submission.reward = reward;
            submission.rewarded = true;
            (submission.submitter, reward)
        };

        if reward > 0 {
            if let Err(err) = self.ledger.add_claimable_balance(&self.address, &submitter, reward) {
                if let Some(submission) = self.state.write().submissions.get_mut(&id) {
                    submission.status = SubmissionStatus::Pending;
                    submission.reviewed_at = None;
                    submission.reward = 0;
                    submission.rewarded = false;
                }
                tracing::warn!(id, error = %err, "submission approval reverted");
                return Err(err);
            }
        }

        tracing::info!(id, submitter = %submitter, reward, "submission approved");
        self.events.emit(
            self.address,
            Event::SubmissionApproved { id, submitter, reward },
        );
        Ok(reward)
    }

    /// Reject a pending submission (owner or admin); never credits
    pub fn reject_submission(&self, caller: &Address, id: u64) -> Result<()> {
        self.access.ensure_owner_or_role(caller, Role::Admin)?;
        let now = self.clock.now();

        let submitter = {
            let mut state = self.state.write();
            let submission = state.pending(id)?;
            submission.status = SubmissionStatus::Rejected;
            submission.reviewed_at = Some(now);
            submission.submitter
        };

        tracing::info!(id, submitter = %submitter, "submission rejected");
        self.events.emit(self.address, Event::SubmissionRejected { id, submitter });
        Ok(())
    }

    /// Reward credited on future approvals (owner-only)
    pub fn set_default_reward(&self, caller: &Address, amount: Amount) -> Result<()> {
        self.access.ensure_owner(caller)?;
        if amount > MAX_REWARD_AMOUNT {
            return Err(DcuError::RewardAmountTooHigh { amount, max: MAX_REWARD_AMOUNT });
        }
        self.state.write().default_reward = amount;
        self.events.emit(self.address, Event::DefaultRewardUpdated { amount });
        Ok(())
    }

    // === Views ===

    pub fn get_submission(&self, id: u64) -> Result<Submission> {
        self.state
            .read()
            .submissions
            .get(&id)
            .cloned()
            .ok_or(DcuError::SubmissionNotFound(id))
    }

    pub fn submissions_by(&self, submitter: &Address) -> Vec<u64> {
        self.state.read().by_submitter.get(submitter).cloned().unwrap_or_default()
    }

    /// Ids still awaiting review, ascending
    pub fn pending_submissions(&self) -> Vec<u64> {
        self.state
            .read()
            .submissions
            .values()
            .filter(|s| s.status == SubmissionStatus::Pending)
            .map(|s| s.id)
            .collect()
    }

    pub fn submission_count(&self) -> usize {
        self.state.read().submissions.len()
    }

    pub fn default_reward(&self) -> Amount {
        self.state.read().default_reward
    }
}
