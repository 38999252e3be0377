use crate::domain::expense::{Expense, ExpenseId, ExpenseStatus};
use crate::domain::identity::UserId;
use crate::domain::legacy::{self, LegacySlot};
use crate::domain::ports::{ExpenseStore, SequenceStore, SlotStore};
use crate::domain::sequence::{ApprovalRun, ApprovalStep, SequenceId, SequenceTemplate};
use crate::domain::{ApprovalStatus, Decision, TargetId};
use crate::error::{ApprovalError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for storing expenses.
pub const CF_EXPENSES: &str = "expenses";
/// Column Family for storing legacy approval slots.
pub const CF_SLOTS: &str = "slots";
/// Column Family for storing approval runs, keyed by expense.
pub const CF_RUNS: &str = "runs";
/// Column Family for storing sequence templates.
pub const CF_TEMPLATES: &str = "templates";

/// A persistent store implementation using RocksDB.
///
/// Handles storage for every approval record kind using separate Column
/// Families, with values encoded as JSON. RocksDB has no conditional put, so
/// every read-check-write goes through `write_lock`.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that all approval column families exist.
    ///
    /// # Arguments
    ///
    /// * `path` - The filesystem path where the database will be stored.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let families = [CF_EXPENSES, CF_SLOTS, CF_RUNS, CF_TEMPLATES]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, families)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            ApprovalError::Internal(Box::new(std::io::Error::other(format!(
                "{name} column family not found"
            ))))
        })
    }

    fn read<T: DeserializeOwned>(&self, family: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(family)?;
        match self.db.get_cf(cf, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn write<T: Serialize>(&self, family: &str, key: &[u8], value: &T) -> Result<()> {
        let cf = self.cf(family)?;
        let bytes = serde_json::to_vec(value)?;
        self.db.put_cf(cf, key, bytes)?;
        Ok(())
    }

    fn scan<T: DeserializeOwned>(&self, family: &str) -> Result<Vec<T>> {
        let cf = self.cf(family)?;
        let mut values = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            values.push(serde_json::from_slice(&value)?);
        }
        Ok(values)
    }

    fn find_run_containing(&self, step: TargetId) -> Result<Option<ApprovalRun>> {
        let runs: Vec<ApprovalRun> = self.scan(CF_RUNS)?;
        Ok(runs.into_iter().find(|run| run.step(step).is_some()))
    }
}

fn expense_key(id: ExpenseId) -> [u8; 4] {
    id.0.to_be_bytes()
}

#[async_trait]
impl ExpenseStore for RocksDBStore {
    async fn insert(&self, expense: Expense) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let key = expense_key(expense.id);
        if self.read::<Expense>(CF_EXPENSES, &key)?.is_some() {
            return Err(ApprovalError::DuplicateExpense(expense.id));
        }
        self.write(CF_EXPENSES, &key, &expense)
    }

    async fn get(&self, id: ExpenseId) -> Result<Option<Expense>> {
        self.read(CF_EXPENSES, &expense_key(id))
    }

    async fn get_all(&self) -> Result<Vec<Expense>> {
        // Big-endian keys keep the iteration ordered by expense id.
        self.scan(CF_EXPENSES)
    }

    async fn update_status(
        &self,
        id: ExpenseId,
        expected: ExpenseStatus,
        status: ExpenseStatus,
        rejection_reason: Option<String>,
    ) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let key = expense_key(id);
        let mut expense: Expense = self
            .read(CF_EXPENSES, &key)?
            .ok_or_else(|| ApprovalError::not_found("expense", id))?;
        if expense.status != expected {
            return Ok(false);
        }
        expense.status = status;
        if rejection_reason.is_some() {
            expense.rejection_reason = rejection_reason;
        }
        self.write(CF_EXPENSES, &key, &expense)?;
        Ok(true)
    }
}

#[async_trait]
impl SlotStore for RocksDBStore {
    async fn insert_all(&self, slots: Vec<LegacySlot>) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        for slot in &slots {
            self.write(CF_SLOTS, slot.id.as_uuid().as_bytes(), slot)?;
        }
        Ok(())
    }

    async fn get(&self, id: TargetId) -> Result<Option<LegacySlot>> {
        self.read(CF_SLOTS, id.as_uuid().as_bytes())
    }

    async fn for_expense(&self, expense: ExpenseId) -> Result<Vec<LegacySlot>> {
        let slots: Vec<LegacySlot> = self.scan(CF_SLOTS)?;
        Ok(slots.into_iter().filter(|s| s.expense == expense).collect())
    }

    async fn pending_for(&self, approver: &UserId) -> Result<Vec<LegacySlot>> {
        let slots: Vec<LegacySlot> = self.scan(CF_SLOTS)?;
        Ok(slots
            .into_iter()
            .filter(|s| &s.approver == approver && s.status == ApprovalStatus::Pending)
            .collect())
    }

    async fn decide(&self, id: TargetId, decision: &Decision) -> Result<LegacySlot> {
        let _guard = self.write_lock.lock().await;
        let key = id.as_uuid().as_bytes();
        let slot: LegacySlot = self
            .read(CF_SLOTS, key)?
            .ok_or_else(|| ApprovalError::not_found("approval slot", id))?;
        let mut siblings: Vec<LegacySlot> = self
            .scan::<LegacySlot>(CF_SLOTS)?
            .into_iter()
            .filter(|s| s.expense == slot.expense)
            .collect();
        let decided = legacy::decide(&mut siblings, id, decision)?.clone();
        self.write(CF_SLOTS, key, &decided)?;
        Ok(decided)
    }
}

#[async_trait]
impl SequenceStore for RocksDBStore {
    async fn put_template(&self, template: SequenceTemplate) -> Result<()> {
        self.write(CF_TEMPLATES, &template.id.0.to_be_bytes(), &template)
    }

    async fn get_template(&self, id: SequenceId) -> Result<Option<SequenceTemplate>> {
        self.read(CF_TEMPLATES, &id.0.to_be_bytes())
    }

    async fn templates(&self) -> Result<Vec<SequenceTemplate>> {
        self.scan(CF_TEMPLATES)
    }

    async fn insert_run(&self, run: ApprovalRun) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.write(CF_RUNS, &expense_key(run.expense), &run)
    }

    async fn run_for_expense(&self, expense: ExpenseId) -> Result<Option<ApprovalRun>> {
        self.read(CF_RUNS, &expense_key(expense))
    }

    async fn run_containing(&self, step: TargetId) -> Result<Option<ApprovalRun>> {
        self.find_run_containing(step)
    }

    async fn pending_steps_for(&self, approver: &UserId) -> Result<Vec<ApprovalStep>> {
        let runs: Vec<ApprovalRun> = self.scan(CF_RUNS)?;
        Ok(runs
            .into_iter()
            .filter(|run| !run.is_closed())
            .flat_map(|run| run.steps)
            .filter(|s| &s.approver == approver && s.status == ApprovalStatus::Pending)
            .collect())
    }

    async fn decide_step(&self, step: TargetId, decision: &Decision) -> Result<ApprovalRun> {
        let _guard = self.write_lock.lock().await;
        let mut run = self
            .find_run_containing(step)?
            .ok_or_else(|| ApprovalError::not_found("approval step", step))?;
        run.decide(step, decision)?;
        self.write(CF_RUNS, &expense_key(run.expense), &run)?;
        Ok(run)
    }
}
