//! Flat multi-approver model used by expenses without an approval sequence.
//!
//! Every approval-capable user except the submitter receives an independent,
//! unordered slot. The rule is unanimity with veto.

use super::expense::{ExpenseId, ExpenseStatus};
use super::identity::{Identity, UserId};
use super::{ApprovalStatus, Decision, TargetId};
use crate::error::{ApprovalError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacySlot {
    pub id: TargetId,
    pub expense: ExpenseId,
    pub approver: UserId,
    pub status: ApprovalStatus,
    pub comment: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl LegacySlot {
    pub fn new(expense: ExpenseId, approver: UserId, created_at: DateTime<Utc>) -> Self {
        Self {
            id: TargetId::new(),
            expense,
            approver,
            status: ApprovalStatus::Pending,
            comment: None,
            decided_at: None,
            created_at,
        }
    }

    /// Applies a decision to a pending slot bound to the deciding user.
    pub fn decide(&mut self, decision: &Decision) -> Result<()> {
        if self.approver != decision.actor {
            return Err(ApprovalError::Forbidden {
                actor: decision.actor.clone(),
                target: self.id,
            });
        }
        if self.status != ApprovalStatus::Pending {
            return Err(ApprovalError::AlreadyProcessed(self.id));
        }
        self.status = decision.action.outcome();
        self.comment = decision.comment.clone();
        self.decided_at = Some(decision.decided_at);
        Ok(())
    }
}

/// Creates one slot per approval-capable identity, skipping the submitter.
///
/// Duplicate identities collapse into a single slot.
pub fn fan_out(
    expense: ExpenseId,
    submitter: &UserId,
    eligible: &[Identity],
    created_at: DateTime<Utc>,
) -> Vec<LegacySlot> {
    let mut seen = HashSet::new();
    eligible
        .iter()
        .filter(|identity| identity.can_approve() && &identity.id != submitter)
        .filter(|identity| seen.insert(identity.id.clone()))
        .map(|identity| LegacySlot::new(expense, identity.id.clone(), created_at))
        .collect()
}

/// Applies `decision` to slot `id` within the full slot set of one expense.
///
/// Once the set resolves to a terminal status, a veto or the last approval,
/// the remaining slots accept no further decisions.
pub fn decide<'a>(
    slots: &'a mut [LegacySlot],
    id: TargetId,
    decision: &Decision,
) -> Result<&'a LegacySlot> {
    let settled = resolve(slots).is_terminal();
    let slot = slots
        .iter_mut()
        .find(|s| s.id == id)
        .ok_or_else(|| ApprovalError::not_found("approval slot", id))?;
    if settled && slot.approver == decision.actor {
        return Err(ApprovalError::AlreadyProcessed(id));
    }
    slot.decide(decision)?;
    Ok(&*slot)
}

/// Unanimity with veto. An empty slot set never approves.
pub fn resolve(slots: &[LegacySlot]) -> ExpenseStatus {
    if slots.is_empty() {
        return ExpenseStatus::Pending;
    }
    if slots.iter().any(|s| s.status == ApprovalStatus::Rejected) {
        ExpenseStatus::Rejected
    } else if slots.iter().all(|s| s.status != ApprovalStatus::Pending) {
        ExpenseStatus::Approved
    } else {
        ExpenseStatus::Pending
    }
}
