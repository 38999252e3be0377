use super::config::Directory;
use super::csv::command_reader::{Command, CommandType};
use crate::application::engine::{ApprovalEngine, Submission};
use crate::domain::Action;
use crate::domain::expense::{Amount, ExpenseId};
use crate::domain::identity::UserId;
use crate::domain::sequence::SequenceId;
use crate::error::{ApprovalError, Result};

/// Applies command-file rows to an engine on behalf of the named users.
pub struct CommandRunner<'a> {
    engine: &'a ApprovalEngine,
    directory: &'a Directory,
}

impl<'a> CommandRunner<'a> {
    pub fn new(engine: &'a ApprovalEngine, directory: &'a Directory) -> Self {
        Self { engine, directory }
    }

    pub async fn apply(&self, command: Command) -> Result<()> {
        let user = UserId::new(command.user);
        let expense = ExpenseId(command.expense);
        match command.r#type {
            CommandType::Submit => {
                let amount = command.amount.ok_or_else(|| {
                    ApprovalError::Validation("Submit missing amount".to_string())
                })?;
                self.engine
                    .submit(Submission {
                        expense,
                        submitter: user,
                        amount: Amount::new(amount)?,
                        eligible: self.directory.users.clone(),
                        sequence: command.sequence.map(SequenceId),
                    })
                    .await?;
            }
            CommandType::Approve => self.act(user, expense, Action::Approve, command.comment).await?,
            CommandType::Reject => self.act(user, expense, Action::Reject, command.comment).await?,
        }
        Ok(())
    }

    /// Acts on the caller's worklist item for `expense`.
    async fn act(
        &self,
        user: UserId,
        expense: ExpenseId,
        action: Action,
        comment: Option<String>,
    ) -> Result<()> {
        let item = self
            .engine
            .list_pending(&user)
            .await?
            .into_iter()
            .find(|item| item.expense == expense)
            .ok_or_else(|| {
                ApprovalError::not_found("pending approval", format!("{expense} for {user}"))
            })?;
        self.engine.act(&user, item.id, action, comment).await?;
        Ok(())
    }
}
