//! Approval sequences: reusable templates and the per-expense runs
//! instantiated from them.
//!
//! A template is immutable configuration. Every assignment of a template to
//! an expense copies its step list into an independent [`ApprovalRun`], so
//! step state is never shared between expenses.

use super::expense::{ExpenseId, ExpenseStatus};
use super::identity::{Identity, UserId};
use super::{ApprovalStatus, Decision, TargetId};
use crate::error::{ApprovalError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SequenceId(pub u32);

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateStep {
    pub approver: UserId,
    /// 1-based position within the template.
    pub order: u32,
}

/// A named, reusable approval workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceTemplate {
    pub id: SequenceId,
    pub name: String,
    pub description: Option<String>,
    pub min_approval_percentage: u16,
    pub active: bool,
    /// When set, a step is actionable only once every lower-order step is approved.
    pub enforce_sequential_order: bool,
    pub steps: Vec<TemplateStep>,
}

impl SequenceTemplate {
    /// Builds an active, parallel template whose steps follow `approvers` in order.
    pub fn new(
        id: SequenceId,
        name: impl Into<String>,
        min_approval_percentage: u16,
        approvers: Vec<UserId>,
    ) -> Self {
        let steps = approvers
            .into_iter()
            .zip(1..)
            .map(|(approver, order)| TemplateStep { approver, order })
            .collect();
        Self {
            id,
            name: name.into(),
            description: None,
            min_approval_percentage,
            active: true,
            enforce_sequential_order: false,
            steps,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn sequential(mut self, enforce: bool) -> Self {
        self.enforce_sequential_order = enforce;
        self
    }

    pub fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Checks that runs may be instantiated from this template.
    pub fn validate(&self) -> Result<()> {
        if !self.active {
            return Err(ApprovalError::InvalidConfiguration(format!(
                "sequence {} is inactive",
                self.id
            )));
        }
        if !(1..=100).contains(&self.min_approval_percentage) {
            return Err(ApprovalError::InvalidConfiguration(format!(
                "sequence {} minimum approval percentage {} is outside 1..=100",
                self.id, self.min_approval_percentage
            )));
        }
        if self.steps.is_empty() {
            return Err(ApprovalError::InvalidConfiguration(format!(
                "sequence {} has no steps",
                self.id
            )));
        }

        let mut orders: Vec<u32> = self.steps.iter().map(|s| s.order).collect();
        orders.sort_unstable();
        if orders.iter().zip(1..).any(|(order, expected)| *order != expected) {
            return Err(ApprovalError::InvalidConfiguration(format!(
                "sequence {} step orders must be unique and contiguous from 1",
                self.id
            )));
        }

        let mut approvers = HashSet::new();
        if let Some(step) = self.steps.iter().find(|s| !approvers.insert(&s.approver)) {
            return Err(ApprovalError::InvalidConfiguration(format!(
                "sequence {} lists {} more than once",
                self.id, step.approver
            )));
        }
        Ok(())
    }
}

/// One approver's position within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalStep {
    pub id: TargetId,
    pub run: RunId,
    pub expense: ExpenseId,
    pub approver: UserId,
    pub order: u32,
    pub status: ApprovalStatus,
    pub comment: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A private, per-expense copy of a template's steps.
///
/// The threshold and ordering flag are copied too, so editing the template
/// later never affects a run already in progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRun {
    pub id: RunId,
    pub expense: ExpenseId,
    pub template: SequenceId,
    pub min_approval_percentage: u16,
    pub enforce_sequential_order: bool,
    pub steps: Vec<ApprovalStep>,
    pub created_at: DateTime<Utc>,
}

/// Inputs needed to bind a template to one expense.
#[derive(Debug, Clone, Copy)]
pub struct RunAssignment<'a> {
    pub expense: ExpenseId,
    pub submitter: &'a UserId,
    pub eligible: &'a [Identity],
    pub exclude_submitter: bool,
    pub created_at: DateTime<Utc>,
}

impl ApprovalRun {
    pub fn instantiate(template: &SequenceTemplate, assignment: RunAssignment<'_>) -> Result<Self> {
        template.validate()?;

        for step in &template.steps {
            let capable = assignment
                .eligible
                .iter()
                .any(|identity| identity.id == step.approver && identity.can_approve());
            if !capable {
                return Err(ApprovalError::InvalidApprover(step.approver.clone()));
            }
            if assignment.exclude_submitter && &step.approver == assignment.submitter {
                return Err(ApprovalError::InvalidApprover(step.approver.clone()));
            }
        }

        let run = RunId::new();
        let mut steps: Vec<ApprovalStep> = template
            .steps
            .iter()
            .map(|step| ApprovalStep {
                id: TargetId::new(),
                run,
                expense: assignment.expense,
                approver: step.approver.clone(),
                order: step.order,
                status: ApprovalStatus::Pending,
                comment: None,
                decided_at: None,
                created_at: assignment.created_at,
            })
            .collect();
        steps.sort_by_key(|s| s.order);

        Ok(Self {
            id: run,
            expense: assignment.expense,
            template: template.id,
            min_approval_percentage: template.min_approval_percentage,
            enforce_sequential_order: template.enforce_sequential_order,
            steps,
            created_at: assignment.created_at,
        })
    }

    /// Current number of counted steps. Skipped steps are excluded.
    pub fn total_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.status != ApprovalStatus::Skipped)
            .count()
    }

    /// `ceil(min_approval_percentage / 100 * total_steps)`, in integer arithmetic.
    pub fn required_approvals(&self) -> usize {
        let percentage = usize::from(self.min_approval_percentage);
        (percentage * self.total_steps()).div_ceil(100)
    }

    pub fn approved_count(&self) -> usize {
        self.count(ApprovalStatus::Approved)
    }

    /// A run whose committed steps already settle the outcome, either way,
    /// accepts no further decisions.
    pub fn is_closed(&self) -> bool {
        self.resolve().is_terminal()
    }

    pub fn resolve(&self) -> ExpenseStatus {
        if self.count(ApprovalStatus::Rejected) > 0 {
            ExpenseStatus::Rejected
        } else if self.total_steps() > 0 && self.approved_count() >= self.required_approvals() {
            ExpenseStatus::Approved
        } else {
            ExpenseStatus::Pending
        }
    }

    pub fn step(&self, id: TargetId) -> Option<&ApprovalStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Applies a decision to one step, enforcing every per-step precondition.
    pub fn decide(&mut self, id: TargetId, decision: &Decision) -> Result<&ApprovalStep> {
        let closed = self.is_closed();
        let sequential = self.enforce_sequential_order;
        let index = self
            .steps
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| ApprovalError::not_found("approval step", id))?;

        let step = &self.steps[index];
        if step.approver != decision.actor {
            return Err(ApprovalError::Forbidden {
                actor: decision.actor.clone(),
                target: id,
            });
        }
        if step.status != ApprovalStatus::Pending || closed {
            return Err(ApprovalError::AlreadyProcessed(id));
        }
        if sequential {
            let blocked = self.steps.iter().any(|other| {
                other.order < step.order
                    && !matches!(
                        other.status,
                        ApprovalStatus::Approved | ApprovalStatus::Skipped
                    )
            });
            if blocked {
                return Err(ApprovalError::Forbidden {
                    actor: decision.actor.clone(),
                    target: id,
                });
            }
        }

        let step = &mut self.steps[index];
        step.status = decision.action.outcome();
        step.comment = decision.comment.clone();
        step.decided_at = Some(decision.decided_at);
        Ok(&*step)
    }

    fn count(&self, status: ApprovalStatus) -> usize {
        self.steps.iter().filter(|s| s.status == status).count()
    }
}
