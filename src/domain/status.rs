//! Pure aggregation of slot/step outcomes into an expense status.

use super::expense::ExpenseStatus;
use super::legacy::{self, LegacySlot};
use super::sequence::ApprovalRun;
use super::{ApprovalModel, ApprovalStatus};
use chrono::{DateTime, Utc};

/// The persisted outcomes of whichever model owns an expense.
#[derive(Debug, Clone, PartialEq)]
pub enum ApprovalOutcomes {
    Legacy(Vec<LegacySlot>),
    Sequence(ApprovalRun),
}

impl ApprovalOutcomes {
    pub fn model(&self) -> ApprovalModel {
        match self {
            ApprovalOutcomes::Legacy(_) => ApprovalModel::Legacy,
            ApprovalOutcomes::Sequence(_) => ApprovalModel::Sequence,
        }
    }

    pub fn resolve(&self) -> ExpenseStatus {
        match self {
            ApprovalOutcomes::Legacy(slots) => legacy::resolve(slots),
            ApprovalOutcomes::Sequence(run) => run.resolve(),
        }
    }

    /// Comment of the earliest recorded rejection, if it carried one.
    pub fn rejection_comment(&self) -> Option<String> {
        let rejections: Vec<(Option<DateTime<Utc>>, &Option<String>)> = match self {
            ApprovalOutcomes::Legacy(slots) => slots
                .iter()
                .filter(|s| s.status == ApprovalStatus::Rejected)
                .map(|s| (s.decided_at, &s.comment))
                .collect(),
            ApprovalOutcomes::Sequence(run) => run
                .steps
                .iter()
                .filter(|s| s.status == ApprovalStatus::Rejected)
                .map(|s| (s.decided_at, &s.comment))
                .collect(),
        };
        rejections
            .into_iter()
            .min_by_key(|(decided_at, _)| *decided_at)
            .and_then(|(_, comment)| comment.clone())
    }
}

/// Returns the status to persist, or `None` when nothing should be written.
///
/// Terminal statuses are sticky: a recomputation never moves an approved or
/// rejected expense anywhere else.
pub fn next_status(current: ExpenseStatus, computed: ExpenseStatus) -> Option<ExpenseStatus> {
    if current.is_terminal() || current == computed {
        None
    } else {
        Some(computed)
    }
}
