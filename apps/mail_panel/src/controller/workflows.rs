//! Multi-step workflows modelled as an ordered step list with a per-step outcome.
//!
//! Steps are not transactional. A failure leaves earlier steps committed and
//! marks every later step as skipped; nothing is rolled back or retried.

use client_core::StoreError;
use shared::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Workflow {
    LinkEmail,
    CreateBox,
}

impl Workflow {
    pub fn steps(self) -> &'static [WorkflowStep] {
        match self {
            Workflow::LinkEmail => &[WorkflowStep::LinkEmail, WorkflowStep::RecordActivity],
            Workflow::CreateBox => &[
                WorkflowStep::CreateBox,
                WorkflowStep::LinkEmail,
                WorkflowStep::RecordActivity,
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowStep {
    CreateBox,
    LinkEmail,
    RecordActivity,
}

#[derive(Debug, Clone)]
pub enum StepStatus {
    Pending,
    Completed,
    Failed(ApiError),
    Skipped,
}

impl StepStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, StepStatus::Completed)
    }
}

#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub step: WorkflowStep,
    pub status: StepStatus,
}

#[derive(Debug, Clone)]
pub struct WorkflowReport {
    pub workflow: Workflow,
    pub steps: Vec<StepOutcome>,
    /// Set when input validation rejected the workflow before any step ran.
    pub rejected: Option<ApiError>,
}

impl WorkflowReport {
    pub fn planned(workflow: Workflow) -> Self {
        Self {
            workflow,
            steps: workflow
                .steps()
                .iter()
                .map(|&step| StepOutcome {
                    step,
                    status: StepStatus::Pending,
                })
                .collect(),
            rejected: None,
        }
    }

    pub fn rejected(workflow: Workflow, err: ApiError) -> Self {
        let mut report = Self::planned(workflow);
        for outcome in &mut report.steps {
            outcome.status = StepStatus::Skipped;
        }
        report.rejected = Some(err);
        report
    }

    pub fn complete(&mut self, step: WorkflowStep) {
        if let Some(outcome) = self.steps.iter_mut().find(|o| o.step == step) {
            outcome.status = StepStatus::Completed;
        }
    }

    /// Marks `step` failed and every still-pending step skipped.
    pub fn fail(&mut self, step: WorkflowStep, err: &StoreError) {
        for outcome in &mut self.steps {
            if outcome.step == step {
                outcome.status = StepStatus::Failed(ApiError::from(err));
            } else if matches!(outcome.status, StepStatus::Pending) {
                outcome.status = StepStatus::Skipped;
            }
        }
    }

    pub fn status_of(&self, step: WorkflowStep) -> Option<&StepStatus> {
        self.steps
            .iter()
            .find(|outcome| outcome.step == step)
            .map(|outcome| &outcome.status)
    }

    pub fn is_complete(&self) -> bool {
        self.rejected.is_none() && self.steps.iter().all(|o| o.status.is_completed())
    }

    pub fn failed_step(&self) -> Option<(WorkflowStep, &ApiError)> {
        self.steps.iter().find_map(|outcome| match &outcome.status {
            StepStatus::Failed(err) => Some((outcome.step, err)),
            _ => None,
        })
    }

    pub fn has_completed(&self, step: WorkflowStep) -> bool {
        self.status_of(step).is_some_and(StepStatus::is_completed)
    }
}
