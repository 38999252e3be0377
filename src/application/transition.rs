use super::resolver::StatusResolver;
use crate::domain::expense::{ExpenseId, ExpenseStatus};
use crate::domain::identity::UserId;
use crate::domain::ports::{ExpenseStore, SequenceStore, SlotStore};
use crate::domain::{Action, ApprovalModel, ApprovalStatus, Decision, TargetId};
use crate::error::{ApprovalError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

/// State of the slot or step an action was applied to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetState {
    pub id: TargetId,
    pub model: ApprovalModel,
    pub expense: ExpenseId,
    pub status: ApprovalStatus,
    pub comment: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
}

/// Result of a successful `act`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActOutcome {
    pub expense_status: ExpenseStatus,
    pub target: TargetState,
}

/// The only mutator of slot and step state.
pub struct StepTransitionService<'a> {
    expenses: &'a dyn ExpenseStore,
    slots: &'a dyn SlotStore,
    sequences: &'a dyn SequenceStore,
}

impl<'a> StepTransitionService<'a> {
    pub fn new(
        expenses: &'a dyn ExpenseStore,
        slots: &'a dyn SlotStore,
        sequences: &'a dyn SequenceStore,
    ) -> Self {
        Self {
            expenses,
            slots,
            sequences,
        }
    }

    /// Validates and applies one decision, then re-resolves the owning expense.
    ///
    /// The PENDING check and the write happen inside one conditional update
    /// in the store; losing that race surfaces as `AlreadyProcessed`.
    pub async fn act(
        &self,
        caller: &UserId,
        target: TargetId,
        action: Action,
        comment: Option<String>,
    ) -> Result<ActOutcome> {
        info!(approval = %target, actor = %caller, action = ?action, "Applying approval action");

        let (model, expense, approver) = self.locate(target).await?;
        if &approver != caller {
            return Err(ApprovalError::Forbidden {
                actor: caller.clone(),
                target,
            });
        }
        self.ensure_open(expense, target).await?;

        let decision = Decision::new(caller.clone(), action, comment);
        let state = match model {
            ApprovalModel::Legacy => {
                let slot = self.slots.decide(target, &decision).await;
                let slot = log_lost_race(slot, target)?;
                TargetState {
                    id: slot.id,
                    model,
                    expense: slot.expense,
                    status: slot.status,
                    comment: slot.comment,
                    decided_at: slot.decided_at,
                }
            }
            ApprovalModel::Sequence => {
                let run = self.sequences.decide_step(target, &decision).await;
                let run = log_lost_race(run, target)?;
                let step = run
                    .step(target)
                    .ok_or_else(|| ApprovalError::not_found("approval step", target))?;
                TargetState {
                    id: step.id,
                    model,
                    expense: step.expense,
                    status: step.status,
                    comment: step.comment.clone(),
                    decided_at: step.decided_at,
                }
            }
        };

        let rejection_comment = match action {
            Action::Reject => decision.comment.as_deref(),
            Action::Approve => None,
        };
        let expense_status = StatusResolver::new(self.expenses, self.slots, self.sequences)
            .resolve(expense, rejection_comment)
            .await?;

        Ok(ActOutcome {
            expense_status,
            target: state,
        })
    }

    /// Finds which model owns `target`, returning its expense and bound approver.
    async fn locate(&self, target: TargetId) -> Result<(ApprovalModel, ExpenseId, UserId)> {
        if let Some(slot) = self.slots.get(target).await? {
            return Ok((ApprovalModel::Legacy, slot.expense, slot.approver));
        }
        let run = self
            .sequences
            .run_containing(target)
            .await?
            .ok_or_else(|| ApprovalError::not_found("approval target", target))?;
        let step = run
            .step(target)
            .ok_or_else(|| ApprovalError::not_found("approval target", target))?;
        Ok((ApprovalModel::Sequence, run.expense, step.approver.clone()))
    }

    /// Terminal expenses accept no further decisions.
    async fn ensure_open(&self, expense: ExpenseId, target: TargetId) -> Result<()> {
        let current = self
            .expenses
            .get(expense)
            .await?
            .ok_or_else(|| ApprovalError::not_found("expense", expense))?;
        if current.status.is_terminal() {
            return Err(ApprovalError::AlreadyProcessed(target));
        }
        Ok(())
    }
}

fn log_lost_race<T>(result: Result<T>, target: TargetId) -> Result<T> {
    if let Err(ApprovalError::AlreadyProcessed(_)) = &result {
        debug!(approval = %target, "Conditional update rejected, target no longer pending");
    }
    result
}
