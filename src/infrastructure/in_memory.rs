use crate::domain::expense::{Expense, ExpenseId, ExpenseStatus};
use crate::domain::identity::UserId;
use crate::domain::legacy::{self, LegacySlot};
use crate::domain::ports::{ExpenseStore, SequenceStore, SlotStore};
use crate::domain::sequence::{ApprovalRun, ApprovalStep, SequenceId, SequenceTemplate};
use crate::domain::{ApprovalStatus, Decision, TargetId};
use crate::error::{ApprovalError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory store for expenses.
///
/// Uses `Arc<RwLock<HashMap<ExpenseId, Expense>>>` to allow shared concurrent access.
/// The conditional status write happens under the write lock.
#[derive(Default, Clone)]
pub struct InMemoryExpenseStore {
    expenses: Arc<RwLock<HashMap<ExpenseId, Expense>>>,
}

impl InMemoryExpenseStore {
    /// Creates a new, empty in-memory expense store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExpenseStore for InMemoryExpenseStore {
    async fn insert(&self, expense: Expense) -> Result<()> {
        let mut expenses = self.expenses.write().await;
        if expenses.contains_key(&expense.id) {
            return Err(ApprovalError::DuplicateExpense(expense.id));
        }
        expenses.insert(expense.id, expense);
        Ok(())
    }

    async fn get(&self, id: ExpenseId) -> Result<Option<Expense>> {
        let expenses = self.expenses.read().await;
        Ok(expenses.get(&id).cloned())
    }

    async fn get_all(&self) -> Result<Vec<Expense>> {
        let expenses = self.expenses.read().await;
        let mut all: Vec<Expense> = expenses.values().cloned().collect();
        all.sort_by_key(|e| e.id);
        Ok(all)
    }

    async fn update_status(
        &self,
        id: ExpenseId,
        expected: ExpenseStatus,
        status: ExpenseStatus,
        rejection_reason: Option<String>,
    ) -> Result<bool> {
        let mut expenses = self.expenses.write().await;
        let expense = expenses
            .get_mut(&id)
            .ok_or_else(|| ApprovalError::not_found("expense", id))?;
        if expense.status != expected {
            return Ok(false);
        }
        expense.status = status;
        if rejection_reason.is_some() {
            expense.rejection_reason = rejection_reason;
        }
        Ok(true)
    }
}

/// A thread-safe in-memory store for legacy approval slots.
#[derive(Default, Clone)]
pub struct InMemorySlotStore {
    slots: Arc<RwLock<HashMap<TargetId, LegacySlot>>>,
}

impl InMemorySlotStore {
    /// Creates a new, empty in-memory slot store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SlotStore for InMemorySlotStore {
    async fn insert_all(&self, new_slots: Vec<LegacySlot>) -> Result<()> {
        let mut slots = self.slots.write().await;
        for slot in new_slots {
            slots.insert(slot.id, slot);
        }
        Ok(())
    }

    async fn get(&self, id: TargetId) -> Result<Option<LegacySlot>> {
        let slots = self.slots.read().await;
        Ok(slots.get(&id).cloned())
    }

    async fn for_expense(&self, expense: ExpenseId) -> Result<Vec<LegacySlot>> {
        let slots = self.slots.read().await;
        Ok(slots
            .values()
            .filter(|s| s.expense == expense)
            .cloned()
            .collect())
    }

    async fn pending_for(&self, approver: &UserId) -> Result<Vec<LegacySlot>> {
        let slots = self.slots.read().await;
        Ok(slots
            .values()
            .filter(|s| &s.approver == approver && s.status == ApprovalStatus::Pending)
            .cloned()
            .collect())
    }

    async fn decide(&self, id: TargetId, decision: &Decision) -> Result<LegacySlot> {
        let mut slots = self.slots.write().await;
        let expense = slots
            .get(&id)
            .ok_or_else(|| ApprovalError::not_found("approval slot", id))?
            .expense;
        // Siblings are read under the same guard so a veto can't slip past.
        let mut siblings: Vec<LegacySlot> = slots
            .values()
            .filter(|s| s.expense == expense)
            .cloned()
            .collect();
        let decided = legacy::decide(&mut siblings, id, decision)?.clone();
        slots.insert(id, decided.clone());
        Ok(decided)
    }
}

#[derive(Default)]
struct SequenceTables {
    templates: HashMap<SequenceId, SequenceTemplate>,
    runs: HashMap<ExpenseId, ApprovalRun>,
    step_index: HashMap<TargetId, ExpenseId>,
}

/// A thread-safe in-memory store for sequence templates and their runs.
///
/// Templates, runs and the step index share one lock so that a step decision
/// sees the whole run it belongs to.
#[derive(Default, Clone)]
pub struct InMemorySequenceStore {
    tables: Arc<RwLock<SequenceTables>>,
}

impl InMemorySequenceStore {
    /// Creates a new, empty in-memory sequence store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SequenceStore for InMemorySequenceStore {
    async fn put_template(&self, template: SequenceTemplate) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.templates.insert(template.id, template);
        Ok(())
    }

    async fn get_template(&self, id: SequenceId) -> Result<Option<SequenceTemplate>> {
        let tables = self.tables.read().await;
        Ok(tables.templates.get(&id).cloned())
    }

    async fn templates(&self) -> Result<Vec<SequenceTemplate>> {
        let tables = self.tables.read().await;
        let mut all: Vec<SequenceTemplate> = tables.templates.values().cloned().collect();
        all.sort_by_key(|t| t.id);
        Ok(all)
    }

    async fn insert_run(&self, run: ApprovalRun) -> Result<()> {
        let mut tables = self.tables.write().await;
        for step in &run.steps {
            tables.step_index.insert(step.id, run.expense);
        }
        tables.runs.insert(run.expense, run);
        Ok(())
    }

    async fn run_for_expense(&self, expense: ExpenseId) -> Result<Option<ApprovalRun>> {
        let tables = self.tables.read().await;
        Ok(tables.runs.get(&expense).cloned())
    }

    async fn run_containing(&self, step: TargetId) -> Result<Option<ApprovalRun>> {
        let tables = self.tables.read().await;
        Ok(tables
            .step_index
            .get(&step)
            .and_then(|expense| tables.runs.get(expense))
            .cloned())
    }

    async fn pending_steps_for(&self, approver: &UserId) -> Result<Vec<ApprovalStep>> {
        let tables = self.tables.read().await;
        Ok(tables
            .runs
            .values()
            .filter(|run| !run.is_closed())
            .flat_map(|run| run.steps.iter())
            .filter(|s| &s.approver == approver && s.status == ApprovalStatus::Pending)
            .cloned()
            .collect())
    }

    async fn decide_step(&self, step: TargetId, decision: &Decision) -> Result<ApprovalRun> {
        let mut tables = self.tables.write().await;
        let expense = *tables
            .step_index
            .get(&step)
            .ok_or_else(|| ApprovalError::not_found("approval step", step))?;
        let run = tables
            .runs
            .get_mut(&expense)
            .ok_or_else(|| ApprovalError::not_found("approval run for expense", expense))?;
        run.decide(step, decision)?;
        Ok(run.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Action;
    use crate::domain::expense::Amount;
    use crate::domain::identity::{Identity, Role};
    use crate::domain::sequence::RunAssignment;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn expense(id: u32) -> Expense {
        Expense::new(
            ExpenseId(id),
            "alice".into(),
            Amount::new(dec!(25.0)).unwrap(),
            None,
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_in_memory_expense_store() {
        let store = InMemoryExpenseStore::new();
        store.insert(expense(1)).await.unwrap();

        let retrieved = store.get(ExpenseId(1)).await.unwrap().unwrap();
        assert_eq!(retrieved.status, ExpenseStatus::Pending);
        assert!(store.get(ExpenseId(2)).await.unwrap().is_none());

        let duplicate = store.insert(expense(1)).await;
        assert!(matches!(duplicate, Err(ApprovalError::DuplicateExpense(_))));
    }

    #[tokio::test]
    async fn test_conditional_status_update() {
        let store = InMemoryExpenseStore::new();
        store.insert(expense(1)).await.unwrap();

        let won = store
            .update_status(
                ExpenseId(1),
                ExpenseStatus::Pending,
                ExpenseStatus::Rejected,
                Some("duplicate claim".into()),
            )
            .await
            .unwrap();
        assert!(won);

        let lost = store
            .update_status(
                ExpenseId(1),
                ExpenseStatus::Pending,
                ExpenseStatus::Approved,
                None,
            )
            .await
            .unwrap();
        assert!(!lost);

        let stored = store.get(ExpenseId(1)).await.unwrap().unwrap();
        assert_eq!(stored.status, ExpenseStatus::Rejected);
        assert_eq!(stored.rejection_reason.as_deref(), Some("duplicate claim"));
    }

    #[tokio::test]
    async fn test_in_memory_slot_store_decide_once() {
        let store = InMemorySlotStore::new();
        let slot = LegacySlot::new(ExpenseId(1), "bob".into(), Utc::now());
        let id = slot.id;
        store.insert_all(vec![slot]).await.unwrap();

        assert_eq!(store.pending_for(&"bob".into()).await.unwrap().len(), 1);

        let decision = Decision::new("bob".into(), Action::Approve, None);
        let decided = store.decide(id, &decision).await.unwrap();
        assert_eq!(decided.status, ApprovalStatus::Approved);

        let again = store.decide(id, &decision).await;
        assert!(matches!(again, Err(ApprovalError::AlreadyProcessed(_))));
        assert!(store.pending_for(&"bob".into()).await.unwrap().is_empty());

        let missing = store.decide(TargetId::new(), &decision).await;
        assert!(matches!(missing, Err(ApprovalError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_in_memory_slot_store_refuses_after_veto() {
        let store = InMemorySlotStore::new();
        let bob = LegacySlot::new(ExpenseId(1), "bob".into(), Utc::now());
        let carol = LegacySlot::new(ExpenseId(1), "carol".into(), Utc::now());
        let other = LegacySlot::new(ExpenseId(2), "carol".into(), Utc::now());
        let (bob_id, carol_id, other_id) = (bob.id, carol.id, other.id);
        store.insert_all(vec![bob, carol, other]).await.unwrap();

        let veto = Decision::new("bob".into(), Action::Reject, Some("no receipt".into()));
        store.decide(bob_id, &veto).await.unwrap();

        let approve = Decision::new("carol".into(), Action::Approve, None);
        let late = store.decide(carol_id, &approve).await;
        assert!(matches!(late, Err(ApprovalError::AlreadyProcessed(_))));
        let carol = store.get(carol_id).await.unwrap().unwrap();
        assert_eq!(carol.status, ApprovalStatus::Pending);

        // Another expense's slots are unaffected.
        let decided = store.decide(other_id, &approve).await.unwrap();
        assert_eq!(decided.status, ApprovalStatus::Approved);
    }

    #[tokio::test]
    async fn test_in_memory_sequence_store_indexes_steps() {
        let store = InMemorySequenceStore::new();
        let template =
            SequenceTemplate::new(SequenceId(1), "Finance", 50, vec!["bob".into(), "carol".into()]);
        store.put_template(template.clone()).await.unwrap();

        let eligible = vec![
            Identity::new("bob", Role::Manager),
            Identity::new("carol", Role::Admin),
        ];
        let run = ApprovalRun::instantiate(
            &template,
            RunAssignment {
                expense: ExpenseId(4),
                submitter: &"alice".into(),
                eligible: &eligible,
                exclude_submitter: false,
                created_at: Utc::now(),
            },
        )
        .unwrap();
        let step = run.steps[0].id;
        store.insert_run(run).await.unwrap();

        let found = store.run_containing(step).await.unwrap().unwrap();
        assert_eq!(found.expense, ExpenseId(4));

        let decision = Decision::new("bob".into(), Action::Approve, None);
        let committed = store.decide_step(step, &decision).await.unwrap();
        assert_eq!(committed.approved_count(), 1);

        // 50% of two steps is met by one approval, so the run is settled.
        assert!(committed.is_closed());
        assert!(store.pending_steps_for(&"carol".into()).await.unwrap().is_empty());
        assert!(store.pending_steps_for(&"bob".into()).await.unwrap().is_empty());

        let carol = run_step(&committed, "carol");
        let late = store
            .decide_step(carol, &Decision::new("carol".into(), Action::Reject, None))
            .await;
        assert!(matches!(late, Err(ApprovalError::AlreadyProcessed(_))));
        let stored = store.run_for_expense(ExpenseId(4)).await.unwrap().unwrap();
        assert_eq!(stored.step(carol).unwrap().status, ApprovalStatus::Pending);
    }

    fn run_step(run: &ApprovalRun, approver: &str) -> TargetId {
        run.steps
            .iter()
            .find(|s| s.approver.as_str() == approver)
            .unwrap()
            .id
    }
}
