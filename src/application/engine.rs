use super::feed::{ApprovalFeed, PendingItem};
use super::transition::{ActOutcome, StepTransitionService};
use crate::domain::expense::{Amount, Expense, ExpenseId, ExpenseView};
use crate::domain::identity::{Identity, UserId};
use crate::domain::legacy;
use crate::domain::ports::{ExpenseStoreBox, SequenceStoreBox, SlotStoreBox};
use crate::domain::sequence::{ApprovalRun, RunAssignment, SequenceId, SequenceTemplate};
use crate::domain::{Action, ApprovalModel, TargetId};
use crate::error::{ApprovalError, Result};
use crate::infrastructure::in_memory::{
    InMemoryExpenseStore, InMemorySequenceStore, InMemorySlotStore,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};

/// Engine-wide validation rules decided at integration time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct EngineConfig {
    /// Refuse sequences that list the submitter among their approvers.
    #[serde(default)]
    pub exclude_submitter_from_sequences: bool,
}

/// Everything the submission flow hands over when an expense is created.
#[derive(Debug, Clone)]
pub struct Submission {
    pub expense: ExpenseId,
    pub submitter: UserId,
    pub amount: Amount,
    /// Candidate approvers with their roles; the engine filters them.
    pub eligible: Vec<Identity>,
    pub sequence: Option<SequenceId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmitOutcome {
    pub model: ApprovalModel,
    /// Slots or steps created for the expense.
    pub targets: Vec<TargetId>,
}

/// The entry point of the approval engine.
///
/// `ApprovalEngine` owns the storage backends and exposes the four external
/// operations. Caller identity is always an explicit argument. All methods
/// take `&self`, so one engine can be shared across tasks behind an `Arc`.
pub struct ApprovalEngine {
    expense_store: ExpenseStoreBox,
    slot_store: SlotStoreBox,
    sequence_store: SequenceStoreBox,
    config: EngineConfig,
}

impl ApprovalEngine {
    /// Creates a new `ApprovalEngine` instance.
    ///
    /// # Arguments
    ///
    /// * `expense_store` - The store for expenses and their status.
    /// * `slot_store` - The store for legacy approval slots.
    /// * `sequence_store` - The store for sequence templates and runs.
    pub fn new(
        expense_store: ExpenseStoreBox,
        slot_store: SlotStoreBox,
        sequence_store: SequenceStoreBox,
    ) -> Self {
        Self {
            expense_store,
            slot_store,
            sequence_store,
            config: EngineConfig::default(),
        }
    }

    /// Creates an engine backed entirely by in-memory stores.
    pub fn in_memory() -> Self {
        Self::new(
            Box::new(InMemoryExpenseStore::new()),
            Box::new(InMemorySlotStore::new()),
            Box::new(InMemorySequenceStore::new()),
        )
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Stores or replaces a sequence template. Runs already instantiated keep
    /// their own copy of the steps.
    pub async fn register_template(&self, template: SequenceTemplate) -> Result<()> {
        info!(sequence = %template.id, name = %template.name, "Registering approval sequence");
        self.sequence_store.put_template(template).await
    }

    pub async fn templates(&self) -> Result<Vec<SequenceTemplate>> {
        self.sequence_store.templates().await
    }

    /// Retires a template. New submissions referencing it fail validation;
    /// runs already in progress are untouched.
    pub async fn deactivate_template(&self, id: SequenceId) -> Result<()> {
        let template = self
            .sequence_store
            .get_template(id)
            .await?
            .ok_or_else(|| ApprovalError::not_found("approval sequence", id))?;
        info!(sequence = %id, "Deactivating approval sequence");
        self.sequence_store.put_template(template.active(false)).await
    }

    /// Registers a new expense and creates its approval slots or run.
    pub async fn submit(&self, submission: Submission) -> Result<SubmitOutcome> {
        let Submission {
            expense: id,
            submitter,
            amount,
            eligible,
            sequence,
        } = submission;
        let now = Utc::now();

        info!(expense = %id, submitter = %submitter, sequence = ?sequence, "Submitting expense");

        match sequence {
            Some(sequence_id) => {
                let template = self
                    .sequence_store
                    .get_template(sequence_id)
                    .await?
                    .ok_or_else(|| ApprovalError::not_found("approval sequence", sequence_id))?;
                let run = ApprovalRun::instantiate(
                    &template,
                    RunAssignment {
                        expense: id,
                        submitter: &submitter,
                        eligible: &eligible,
                        exclude_submitter: self.config.exclude_submitter_from_sequences,
                        created_at: now,
                    },
                )?;
                let targets = run.steps.iter().map(|s| s.id).collect();

                self.expense_store
                    .insert(Expense::new(id, submitter, amount, Some(sequence_id), now))
                    .await?;
                self.sequence_store.insert_run(run).await?;

                Ok(SubmitOutcome {
                    model: ApprovalModel::Sequence,
                    targets,
                })
            }
            None => {
                let slots = legacy::fan_out(id, &submitter, &eligible, now);
                let targets: Vec<TargetId> = slots.iter().map(|s| s.id).collect();

                self.expense_store
                    .insert(Expense::new(id, submitter, amount, None, now))
                    .await?;
                if slots.is_empty() {
                    warn!(expense = %id, "No eligible approvers; expense will stay pending");
                } else {
                    self.slot_store.insert_all(slots).await?;
                }

                Ok(SubmitOutcome {
                    model: ApprovalModel::Legacy,
                    targets,
                })
            }
        }
    }

    /// The caller's worklist across both approval models.
    pub async fn list_pending(&self, caller: &UserId) -> Result<Vec<PendingItem>> {
        self.feed().pending_for(caller).await
    }

    /// Applies an approve/reject action. The only state-changing operation.
    pub async fn act(
        &self,
        caller: &UserId,
        target: TargetId,
        action: Action,
        comment: Option<String>,
    ) -> Result<ActOutcome> {
        StepTransitionService::new(
            self.expense_store.as_ref(),
            self.slot_store.as_ref(),
            self.sequence_store.as_ref(),
        )
        .act(caller, target, action, comment)
        .await
    }

    pub async fn status(&self, expense: ExpenseId) -> Result<ExpenseView> {
        self.expense_store
            .get(expense)
            .await?
            .map(|e| e.view())
            .ok_or_else(|| ApprovalError::not_found("expense", expense))
    }

    /// Every expense view, ordered by expense id.
    pub async fn expenses(&self) -> Result<Vec<ExpenseView>> {
        let mut views: Vec<ExpenseView> = self
            .expense_store
            .get_all()
            .await?
            .iter()
            .map(Expense::view)
            .collect();
        views.sort_by_key(|v| v.expense);
        Ok(views)
    }

    fn feed(&self) -> ApprovalFeed<'_> {
        ApprovalFeed::new(
            self.expense_store.as_ref(),
            self.slot_store.as_ref(),
            self.sequence_store.as_ref(),
        )
    }
}
