use crate::domain::expense::ExpenseId;
use crate::domain::identity::UserId;
use crate::domain::ports::{ExpenseStore, SequenceStore, SlotStore};
use crate::domain::{ApprovalModel, TargetId};
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::HashMap;

/// One actionable worklist entry, tagged with the model that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingItem {
    pub id: TargetId,
    pub model: ApprovalModel,
    pub expense: ExpenseId,
    pub created_at: DateTime<Utc>,
}

/// Read-side merge of legacy slots and sequence steps for one approver.
pub struct ApprovalFeed<'a> {
    expenses: &'a dyn ExpenseStore,
    slots: &'a dyn SlotStore,
    sequences: &'a dyn SequenceStore,
}

impl<'a> ApprovalFeed<'a> {
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

    /// Pending items bound to `caller`, most recent first.
    ///
    /// Items whose expense is already terminal are dropped, matching what
    /// `act` accepts.
    pub async fn pending_for(&self, caller: &UserId) -> Result<Vec<PendingItem>> {
        let legacy = self
            .slots
            .pending_for(caller)
            .await?
            .into_iter()
            .map(|slot| PendingItem {
                id: slot.id,
                model: ApprovalModel::Legacy,
                expense: slot.expense,
                created_at: slot.created_at,
            });
        let sequenced = self
            .sequences
            .pending_steps_for(caller)
            .await?
            .into_iter()
            .map(|step| PendingItem {
                id: step.id,
                model: ApprovalModel::Sequence,
                expense: step.expense,
                created_at: step.created_at,
            });
        let candidates: Vec<PendingItem> = legacy.chain(sequenced).collect();

        let mut open: HashMap<ExpenseId, bool> = HashMap::new();
        let mut items = Vec::with_capacity(candidates.len());
        for item in candidates {
            let is_open = match open.get(&item.expense) {
                Some(is_open) => *is_open,
                None => {
                    let is_open = self
                        .expenses
                        .get(item.expense)
                        .await?
                        .is_some_and(|e| !e.status.is_terminal());
                    open.insert(item.expense, is_open);
                    is_open
                }
            };
            if is_open {
                items.push(item);
            }
        }

        items.sort_by_key(|item| Reverse((item.created_at, item.id)));
        Ok(items)
    }
}
