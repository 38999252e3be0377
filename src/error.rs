use crate::domain::expense::ExpenseId;
use crate::domain::identity::UserId;
use crate::domain::TargetId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApprovalError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },
    #[error("{actor} is not allowed to act on approval {target}")]
    Forbidden { actor: UserId, target: TargetId },
    #[error("Approval {0} has already been processed")]
    AlreadyProcessed(TargetId),
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("{0} is not an eligible approver")]
    InvalidApprover(UserId),
    #[error("Expense {0} has already been submitted")]
    DuplicateExpense(ExpenseId),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("Storage error: {0}")]
    Storage(#[from] rocksdb::Error),
    #[error("Internal error: {0}")]
    Internal(Box<dyn std::error::Error + Send + Sync>),
}

impl ApprovalError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ApprovalError>;
