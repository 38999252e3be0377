#![allow(dead_code)]

use expense_approvals::application::engine::{ApprovalEngine, Submission};
use expense_approvals::domain::expense::{Amount, ExpenseId};
use expense_approvals::domain::identity::{Identity, Role, UserId};
use expense_approvals::domain::sequence::{SequenceId, SequenceTemplate};
use expense_approvals::infrastructure::in_memory::{
    InMemoryExpenseStore, InMemorySequenceStore, InMemorySlotStore,
};
use rust_decimal_macros::dec;

/// In-memory stores shared with the engine, for tests that inspect or tamper
/// with persisted state directly.
#[derive(Clone, Default)]
pub struct Stores {
    pub expenses: InMemoryExpenseStore,
    pub slots: InMemorySlotStore,
    pub sequences: InMemorySequenceStore,
}

impl Stores {
    pub fn engine(&self) -> ApprovalEngine {
        ApprovalEngine::new(
            Box::new(self.expenses.clone()),
            Box::new(self.slots.clone()),
            Box::new(self.sequences.clone()),
        )
    }
}

pub fn user(id: &str) -> UserId {
    UserId::from(id)
}

/// One employee submitter plus four approval-capable users.
pub fn directory() -> Vec<Identity> {
    vec![
        Identity::new("erin", Role::Employee),
        Identity::new("mona", Role::Manager),
        Identity::new("mark", Role::Manager),
        Identity::new("mia", Role::Manager),
        Identity::new("ada", Role::Admin),
    ]
}

pub fn submission(expense: u32, sequence: Option<u32>) -> Submission {
    Submission {
        expense: ExpenseId(expense),
        submitter: user("erin"),
        amount: Amount::new(dec!(250.00)).unwrap(),
        eligible: directory(),
        sequence: sequence.map(SequenceId),
    }
}

pub fn four_step_template(id: u32, percentage: u16) -> SequenceTemplate {
    SequenceTemplate::new(
        SequenceId(id),
        "Four managers",
        percentage,
        vec![user("mona"), user("mark"), user("mia"), user("ada")],
    )
}
