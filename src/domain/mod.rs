//! Domain layer: approval records, the pure resolution rules, and the storage
//! ports the application layer depends on.

pub mod expense;
pub mod identity;
pub mod legacy;
pub mod ports;
pub mod sequence;
pub mod status;

use chrono::{DateTime, Utc};
use identity::UserId;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier shared by legacy slots and sequence steps.
///
/// Both live in one id space so that a caller can act on a worklist item
/// without knowing which approval model produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(Uuid);

impl TargetId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TargetId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Which approval model owns an expense. Exactly one per expense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ApprovalModel {
    Legacy,
    Sequence,
}

impl fmt::Display for ApprovalModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApprovalModel::Legacy => write!(f, "LEGACY"),
            ApprovalModel::Sequence => write!(f, "SEQUENCE"),
        }
    }
}

/// State of a single slot or step. Slots never become `Skipped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ApprovalStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Approve,
    Reject,
}

impl Action {
    pub fn outcome(self) -> ApprovalStatus {
        match self {
            Action::Approve => ApprovalStatus::Approved,
            Action::Reject => ApprovalStatus::Rejected,
        }
    }
}

/// One approver's decision on one slot or step.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub actor: UserId,
    pub action: Action,
    pub comment: Option<String>,
    pub decided_at: DateTime<Utc>,
}

impl Decision {
    pub fn new(actor: UserId, action: Action, comment: Option<String>) -> Self {
        Self {
            actor,
            action,
            comment,
            decided_at: Utc::now(),
        }
    }
}
