//! Controller layer: session state, reducer transitions, workflows, and command orchestration.

pub mod events;
pub mod orchestration;
pub mod reducer;
pub mod workflows;

use client_core::{ListStore, StoreError};
use shared::{
    domain::{ActivityType, BoxId, EmailDescriptor, PipelineId},
    error::{ApiError, ApiException},
};
use tracing::{debug, info, warn};

use events::{Notice, NoticeQueue, UiError, UiErrorContext};
use reducer::{reduce, BoxDetail, CreateFormEdit, SessionState, StateChange, Tab};
use workflows::{Workflow, WorkflowReport, WorkflowStep};

pub const DEFAULT_RECENT_ACTIVITY_LIMIT: usize = 20;

const NO_EMAIL_MESSAGE: &str = "No email is open in the mail host";

/// Owns the session state and runs each panel action to completion against the store.
pub struct PanelController<S: ListStore> {
    store: S,
    state: SessionState,
    notices: NoticeQueue,
    recent_activity_limit: usize,
}

impl<S: ListStore> PanelController<S> {
    pub fn new(store: S) -> Self {
        Self::with_recent_activity_limit(store, DEFAULT_RECENT_ACTIVITY_LIMIT)
    }

    pub fn with_recent_activity_limit(store: S, recent_activity_limit: usize) -> Self {
        Self {
            store,
            state: SessionState::default(),
            notices: NoticeQueue::default(),
            recent_activity_limit,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.notices.drain()
    }

    fn apply(&mut self, change: StateChange) {
        let state = std::mem::take(&mut self.state);
        self.state = reduce(state, change);
    }

    fn report_failure(&mut self, context: UiErrorContext, err: &StoreError, notify: bool) {
        let ui_error = UiError::from_store(context, err);
        warn!(context = ?ui_error.context(), code = ?ui_error.code(), "{}", ui_error.message());
        if notify {
            self.notices.push(ui_error.to_notice());
        }
    }

    /// Initial load: email header, linked boxes, pipelines (with boxes and
    /// stages of the first one) and the activity feed.
    pub async fn start(&mut self, email: Option<EmailDescriptor>) {
        self.apply(StateChange::EmailLoaded(email));
        self.refresh_linked_boxes().await;
        self.load_pipelines().await;
        self.load_recent_activity().await;
        info!(
            pipelines = self.state.pipelines.len(),
            linked = self.state.linked_boxes.len(),
            "panel initialized"
        );
    }

    pub async fn refresh(&mut self) {
        self.load_pipelines().await;
        self.load_recent_activity().await;
        self.refresh_linked_boxes().await;
    }

    pub async fn load_pipelines(&mut self) {
        match self.store.list_pipelines().await {
            Ok(pipelines) => {
                self.apply(StateChange::PipelinesLoaded(pipelines));
                if let Some(pipeline_id) = self.state.current_pipeline {
                    self.load_boxes(pipeline_id).await;
                    self.load_stages(pipeline_id).await;
                }
            }
            Err(err) => self.report_failure(UiErrorContext::LoadPipelines, &err, true),
        }
    }

    /// Selecting a pipeline reloads its boxes and stages.
    pub async fn select_pipeline(&mut self, pipeline_id: PipelineId) {
        debug!(pipeline_id = pipeline_id.0, "pipeline selected");
        self.apply(StateChange::PipelineSelected(pipeline_id));
        self.load_boxes(pipeline_id).await;
        self.load_stages(pipeline_id).await;
    }

    async fn load_boxes(&mut self, pipeline_id: PipelineId) {
        self.apply(StateChange::BoxesLoading);
        match self.store.list_boxes(pipeline_id).await {
            Ok(boxes) => self.apply(StateChange::BoxesLoaded(boxes)),
            Err(err) => {
                self.apply(StateChange::BoxesFailed);
                self.report_failure(UiErrorContext::LoadBoxes, &err, true);
            }
        }
    }

    pub async fn load_stages(&mut self, pipeline_id: PipelineId) {
        match self.store.list_stages(pipeline_id).await {
            Ok(stages) => self.apply(StateChange::StagesLoaded {
                pipeline_id,
                stages,
            }),
            Err(err) => self.report_failure(UiErrorContext::LoadStages, &err, false),
        }
    }

    pub async fn refresh_linked_boxes(&mut self) {
        let Some(message_id) = self
            .state
            .current_email
            .as_ref()
            .map(|email| email.message_id.clone())
        else {
            return;
        };
        match self.store.find_boxes_by_email_message_id(&message_id).await {
            Ok(boxes) => self.apply(StateChange::LinkedBoxesLoaded(boxes)),
            Err(err) => self.report_failure(UiErrorContext::LinkedBoxes, &err, false),
        }
    }

    pub async fn load_recent_activity(&mut self) {
        match self.store.recent_activities(self.recent_activity_limit).await {
            Ok(activities) => self.apply(StateChange::RecentActivityLoaded(activities)),
            Err(err) => self.report_failure(UiErrorContext::LoadActivity, &err, false),
        }
    }

    pub fn switch_tab(&mut self, tab: Tab) {
        self.apply(StateChange::TabSwitched(tab));
    }

    pub fn select_box(&mut self, box_id: BoxId) {
        self.apply(StateChange::BoxSelected(box_id));
    }

    pub async fn view_box(&mut self, box_id: BoxId) {
        let detail = async {
            let record = self.store.get_box(box_id).await?;
            let activities = self.store.list_activities_for_box(box_id).await?;
            let emails = self.store.list_email_links_for_box(box_id).await?;
            Ok::<_, StoreError>(BoxDetail {
                record,
                activities,
                emails,
            })
        }
        .await;
        match detail {
            Ok(detail) => self.apply(StateChange::BoxDetailLoaded(detail)),
            Err(err) => self.report_failure(UiErrorContext::BoxDetail, &err, true),
        }
    }

    pub fn close_box_detail(&mut self) {
        self.apply(StateChange::BoxDetailClosed);
    }

    pub fn open_link_modal(&mut self) {
        self.apply(StateChange::LinkModalOpened);
    }

    /// Reloads only the link dialog's box selector; the main box list is untouched.
    pub async fn change_link_pipeline(&mut self, pipeline_id: PipelineId) {
        self.apply(StateChange::LinkModalPipelineChanged(pipeline_id));
        match self.store.list_boxes(pipeline_id).await {
            Ok(boxes) => self.apply(StateChange::LinkModalBoxesLoaded(boxes)),
            Err(err) => self.report_failure(UiErrorContext::LoadBoxes, &err, true),
        }
    }

    pub fn choose_link_box(&mut self, box_id: Option<BoxId>) {
        self.apply(StateChange::LinkModalBoxSelected(box_id));
    }

    pub fn close_link_modal(&mut self) {
        self.apply(StateChange::LinkModalClosed);
    }

    /// Links the open email to the box chosen in the link dialog, then records
    /// an `Email` activity.
    pub async fn confirm_link(&mut self) -> WorkflowReport {
        let Some(box_id) = self
            .state
            .link_modal
            .selected_box
            .filter(|id| id.is_valid() && self.state.link_modal.open)
        else {
            return self.reject(
                Workflow::LinkEmail,
                ApiException::validation("Please select a box"),
            );
        };
        let Some(email) = self.state.current_email.clone() else {
            return self.reject(Workflow::LinkEmail, ApiException::validation(NO_EMAIL_MESSAGE));
        };

        let mut report = WorkflowReport::planned(Workflow::LinkEmail);
        match self.store.link_email(&email, box_id).await {
            Ok(link) => {
                debug!(link_id = link.id.0, box_id = box_id.0, "email linked");
                report.complete(WorkflowStep::LinkEmail);
            }
            Err(err) => {
                report.fail(WorkflowStep::LinkEmail, &err);
                self.report_failure(UiErrorContext::LinkEmail, &err, true);
                return report;
            }
        }

        let text = format!("Email linked: {}", email.subject);
        match self
            .store
            .create_activity(box_id, ActivityType::Email, &text)
            .await
        {
            Ok(_) => {
                report.complete(WorkflowStep::RecordActivity);
                self.notices
                    .push(Notice::success("Email linked to box successfully!"));
                self.close_link_modal();
            }
            Err(err) => {
                report.fail(WorkflowStep::RecordActivity, &err);
                self.report_failure(UiErrorContext::LinkEmail, &err, false);
                self.notices.push(Notice::error(
                    "Email linked to box, but recording the activity failed",
                ));
            }
        }

        self.refresh_linked_boxes().await;
        self.load_recent_activity().await;
        report
    }

    /// Opens the create dialog pre-filled from the open email and the current
    /// pipeline, and loads that pipeline's stages.
    pub async fn open_create_modal(&mut self) {
        self.apply(StateChange::CreateModalOpened);
        if let Some(pipeline_id) = self.state.create_modal.form.pipeline_id {
            self.load_stages(pipeline_id).await;
        }
    }

    pub async fn edit_create_form(&mut self, edit: CreateFormEdit) {
        let reload = match &edit {
            CreateFormEdit::Pipeline(pipeline_id) => Some(*pipeline_id),
            _ => None,
        };
        self.apply(StateChange::CreateFormEdited(edit));
        if let Some(pipeline_id) = reload {
            self.load_stages(pipeline_id).await;
        }
    }

    pub fn close_create_modal(&mut self) {
        self.apply(StateChange::CreateModalClosed);
    }

    /// Creates a box from the create dialog, links the open email to it and
    /// records a `Created` activity. Steps run in order and stop at the first
    /// failure; completed steps stay committed.
    pub async fn confirm_create(&mut self) -> WorkflowReport {
        let Some(email) = self.state.current_email.clone() else {
            return self.reject(Workflow::CreateBox, ApiException::validation(NO_EMAIL_MESSAGE));
        };
        let new_box = match self.state.create_modal.form.to_new_box(&email) {
            Ok(new_box) => new_box,
            Err(err) => return self.reject(Workflow::CreateBox, err),
        };
        let pipeline_id = new_box.pipeline_id;

        let mut report = WorkflowReport::planned(Workflow::CreateBox);
        let created = match self.store.create_box(new_box).await {
            Ok(created) => {
                report.complete(WorkflowStep::CreateBox);
                created
            }
            Err(err) => {
                report.fail(WorkflowStep::CreateBox, &err);
                self.report_failure(UiErrorContext::CreateBox, &err, true);
                return report;
            }
        };

        let outcome = async {
            self.store
                .link_email(&email, created.id)
                .await
                .map_err(|err| (WorkflowStep::LinkEmail, err))?;
            let text = format!("Box created from email: {}", email.subject);
            self.store
                .create_activity(created.id, ActivityType::Created, &text)
                .await
                .map_err(|err| (WorkflowStep::RecordActivity, err))?;
            Ok::<_, (WorkflowStep, StoreError)>(())
        }
        .await;

        match outcome {
            Ok(()) => {
                report.complete(WorkflowStep::LinkEmail);
                report.complete(WorkflowStep::RecordActivity);
                info!(box_id = created.id.0, "box created from email");
                self.notices.push(Notice::success("Box created successfully!"));
                self.close_create_modal();
            }
            Err((step, err)) => {
                if step == WorkflowStep::RecordActivity {
                    report.complete(WorkflowStep::LinkEmail);
                }
                report.fail(step, &err);
                self.report_failure(UiErrorContext::CreateBox, &err, false);
                self.notices
                    .push(Notice::error(if report.has_completed(WorkflowStep::LinkEmail) {
                        "Box created and email linked, but recording the activity failed"
                    } else {
                        "Box created, but linking the email failed"
                    }));
            }
        }

        if let Some(pipeline_id) = pipeline_id {
            if self.state.current_pipeline == Some(pipeline_id) {
                self.load_boxes(pipeline_id).await;
            }
        }
        self.refresh_linked_boxes().await;
        self.load_recent_activity().await;
        report
    }

    fn reject(&mut self, workflow: Workflow, err: ApiException) -> WorkflowReport {
        let err = ApiError::from(err);
        let context = match workflow {
            Workflow::LinkEmail => UiErrorContext::LinkEmail,
            Workflow::CreateBox => UiErrorContext::CreateBox,
        };
        self.notices.push(UiError::from_api(context, &err).to_notice());
        WorkflowReport::rejected(workflow, err)
    }
}

#[cfg(test)]
#[path = "../tests/controller_tests.rs"]
mod tests;
