use crate::domain::ApprovalModel;
use crate::domain::expense::{Expense, ExpenseId, ExpenseStatus};
use crate::domain::ports::{ExpenseStore, SequenceStore, SlotStore};
use crate::domain::status::{self, ApprovalOutcomes};
use crate::error::{ApprovalError, Result};
use tracing::{debug, info};

/// The single writer of `Expense::status`.
///
/// Always reads committed slot/step state, so it must run after the
/// triggering transition has been stored.
pub struct StatusResolver<'a> {
    expenses: &'a dyn ExpenseStore,
    slots: &'a dyn SlotStore,
    sequences: &'a dyn SequenceStore,
}

impl<'a> StatusResolver<'a> {
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

    /// Loads the outcomes of whichever model owns `expense`.
    pub async fn outcomes(&self, expense: &Expense) -> Result<ApprovalOutcomes> {
        match expense.model {
            ApprovalModel::Legacy => Ok(ApprovalOutcomes::Legacy(
                self.slots.for_expense(expense.id).await?,
            )),
            ApprovalModel::Sequence => {
                let run = self
                    .sequences
                    .run_for_expense(expense.id)
                    .await?
                    .ok_or_else(|| ApprovalError::not_found("approval run for expense", expense.id))?;
                Ok(ApprovalOutcomes::Sequence(run))
            }
        }
    }

    /// Recomputes and persists the status of `id`, returning the stored status.
    ///
    /// `rejection_comment` is the comment of the decision that triggered this
    /// resolution, if that decision was a rejection.
    pub async fn resolve(
        &self,
        id: ExpenseId,
        rejection_comment: Option<&str>,
    ) -> Result<ExpenseStatus> {
        loop {
            let expense = self
                .expenses
                .get(id)
                .await?
                .ok_or_else(|| ApprovalError::not_found("expense", id))?;
            let outcomes = self.outcomes(&expense).await?;

            let Some(next) = status::next_status(expense.status, outcomes.resolve()) else {
                return Ok(expense.status);
            };

            // Another actor's rejection may win the race, so fall back to the
            // comment persisted with it.
            let reason = match next {
                ExpenseStatus::Rejected => rejection_comment
                    .map(str::to_owned)
                    .or_else(|| outcomes.rejection_comment()),
                _ => None,
            };
            if self
                .expenses
                .update_status(id, expense.status, next, reason)
                .await?
            {
                info!(expense = %id, from = %expense.status, to = %next, "Expense status updated");
                return Ok(next);
            }
            // Status moved under us; start over from the committed state.
            debug!(expense = %id, "Concurrent status write detected, re-resolving");
        }
    }
}
