use super::expense::{Expense, ExpenseId, ExpenseStatus};
use super::identity::UserId;
use super::legacy::LegacySlot;
use super::sequence::{ApprovalRun, ApprovalStep, SequenceId, SequenceTemplate};
use super::{Decision, TargetId};
use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait ExpenseStore: Send + Sync {
    /// Inserts a new expense, failing with `DuplicateExpense` if the id is taken.
    async fn insert(&self, expense: Expense) -> Result<()>;
    async fn get(&self, id: ExpenseId) -> Result<Option<Expense>>;
    async fn get_all(&self) -> Result<Vec<Expense>>;
    /// Writes the status column only if it still holds `expected`.
    ///
    /// Returns `false` when another writer got there first.
    async fn update_status(
        &self,
        id: ExpenseId,
        expected: ExpenseStatus,
        status: ExpenseStatus,
        rejection_reason: Option<String>,
    ) -> Result<bool>;
}

#[async_trait]
pub trait SlotStore: Send + Sync {
    async fn insert_all(&self, slots: Vec<LegacySlot>) -> Result<()>;
    async fn get(&self, id: TargetId) -> Result<Option<LegacySlot>>;
    async fn for_expense(&self, expense: ExpenseId) -> Result<Vec<LegacySlot>>;
    async fn pending_for(&self, approver: &UserId) -> Result<Vec<LegacySlot>>;
    /// Applies `decision` to the slot as one atomic check-and-set.
    async fn decide(&self, id: TargetId, decision: &Decision) -> Result<LegacySlot>;
}

#[async_trait]
pub trait SequenceStore: Send + Sync {
    async fn put_template(&self, template: SequenceTemplate) -> Result<()>;
    async fn get_template(&self, id: SequenceId) -> Result<Option<SequenceTemplate>>;
    /// Every stored template, ordered by id.
    async fn templates(&self) -> Result<Vec<SequenceTemplate>>;
    async fn insert_run(&self, run: ApprovalRun) -> Result<()>;
    async fn run_for_expense(&self, expense: ExpenseId) -> Result<Option<ApprovalRun>>;
    async fn run_containing(&self, step: TargetId) -> Result<Option<ApprovalRun>>;
    async fn pending_steps_for(&self, approver: &UserId) -> Result<Vec<ApprovalStep>>;
    /// Applies `decision` to one step of a run as one atomic check-and-set,
    /// returning the run as committed.
    async fn decide_step(&self, step: TargetId, decision: &Decision) -> Result<ApprovalRun>;
}

pub type ExpenseStoreBox = Box<dyn ExpenseStore>;
pub type SlotStoreBox = Box<dyn SlotStore>;
pub type SequenceStoreBox = Box<dyn SequenceStore>;
