use chrono::Utc;
use expense_approvals::domain::expense::{Amount, Expense, ExpenseId};
use expense_approvals::domain::identity::UserId;
use expense_approvals::domain::legacy::LegacySlot;
use expense_approvals::domain::ports::{ExpenseStoreBox, SequenceStoreBox, SlotStoreBox};
use expense_approvals::domain::sequence::{SequenceId, SequenceTemplate};
use expense_approvals::infrastructure::in_memory::{
    InMemoryExpenseStore, InMemorySequenceStore, InMemorySlotStore,
};
use rust_decimal_macros::dec;

#[tokio::test]
async fn test_stores_as_trait_objects() {
    let expense_store: ExpenseStoreBox = Box::new(InMemoryExpenseStore::new());
    let slot_store: SlotStoreBox = Box::new(InMemorySlotStore::new());
    let sequence_store: SequenceStoreBox = Box::new(InMemorySequenceStore::new());

    let now = Utc::now();
    let expense = Expense::new(
        ExpenseId(1),
        UserId::from("erin"),
        Amount::new(dec!(99.90)).unwrap(),
        None,
        now,
    );
    let slot = LegacySlot::new(ExpenseId(1), UserId::from("mona"), now);
    let slot_id = slot.id;
    let template = SequenceTemplate::new(SequenceId(7), "Finance", 100, vec![UserId::from("ada")]);

    // Verify Send + Sync by spawning tasks
    let es_handle = tokio::spawn(async move {
        expense_store.insert(expense).await.unwrap();
        expense_store.get(ExpenseId(1)).await.unwrap().unwrap()
    });

    let ss_handle = tokio::spawn(async move {
        slot_store.insert_all(vec![slot]).await.unwrap();
        slot_store.get(slot_id).await.unwrap().unwrap()
    });

    let qs_handle = tokio::spawn(async move {
        sequence_store.put_template(template).await.unwrap();
        sequence_store.get_template(SequenceId(7)).await.unwrap().unwrap()
    });

    let retrieved_expense = es_handle.await.unwrap();
    assert_eq!(retrieved_expense.id, ExpenseId(1));

    let retrieved_slot = ss_handle.await.unwrap();
    assert_eq!(retrieved_slot.approver, UserId::from("mona"));

    let retrieved_template = qs_handle.await.unwrap();
    assert_eq!(retrieved_template.steps.len(), 1);
}
