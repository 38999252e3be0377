use super::ApprovalModel;
use super::identity::UserId;
use super::sequence::SequenceId;
use crate::error::ApprovalError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpenseId(pub u32);

impl fmt::Display for ExpenseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Represents the positive monetary amount claimed by an expense.
///
/// Currency and display formatting belong to the surrounding application;
/// the engine only guarantees the amount is strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, ApprovalError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(ApprovalError::Validation(
                "Amount must be positive".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = ApprovalError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExpenseStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Processing,
}

impl ExpenseStatus {
    /// Approved and rejected expenses accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, ExpenseStatus::Approved | ExpenseStatus::Rejected)
    }
}

impl fmt::Display for ExpenseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpenseStatus::Pending => write!(f, "PENDING"),
            ExpenseStatus::Approved => write!(f, "APPROVED"),
            ExpenseStatus::Rejected => write!(f, "REJECTED"),
            ExpenseStatus::Processing => write!(f, "PROCESSING"),
        }
    }
}

/// The subject of approval.
///
/// `status` and `rejection_reason` are written only by the status resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: ExpenseId,
    pub amount: Amount,
    pub submitter: UserId,
    pub status: ExpenseStatus,
    pub model: ApprovalModel,
    pub sequence: Option<SequenceId>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Expense {
    pub fn new(
        id: ExpenseId,
        submitter: UserId,
        amount: Amount,
        sequence: Option<SequenceId>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let model = if sequence.is_some() {
            ApprovalModel::Sequence
        } else {
            ApprovalModel::Legacy
        };
        Self {
            id,
            amount,
            submitter,
            status: ExpenseStatus::Pending,
            model,
            sequence,
            rejection_reason: None,
            created_at,
        }
    }

    pub fn view(&self) -> ExpenseView {
        ExpenseView {
            expense: self.id,
            status: self.status,
            rejection_reason: self.rejection_reason.clone(),
        }
    }
}

/// Read-only projection returned by `status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseView {
    pub expense: ExpenseId,
    pub status: ExpenseStatus,
    pub rejection_reason: Option<String>,
}
