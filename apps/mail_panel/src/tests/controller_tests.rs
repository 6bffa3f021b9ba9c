use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use client_core::{validate_new_box, ListStore, StoreError, StoreResult};
use shared::domain::{
    Activity, ActivityId, ActivityType, BoxId, BoxRecord, BoxUpdate, EmailDescriptor, EmailLink,
    EmailLinkId, NewBox, Pipeline, PipelineId, Stage, StageId,
};

use super::{
    events::NoticeKind,
    reducer::{BoxListView, CreateFormEdit, Tab},
    workflows::{StepStatus, Workflow, WorkflowStep},
    PanelController,
};

#[derive(Default)]
struct FakeData {
    pipelines: Vec<Pipeline>,
    stages: Vec<Stage>,
    boxes: Vec<BoxRecord>,
    links: Vec<EmailLink>,
    activities: Vec<Activity>,
    next_id: i64,
    calls: HashMap<&'static str, usize>,
    failing: HashSet<&'static str>,
}

/// In-memory list store that counts calls per operation.
#[derive(Default)]
struct FakeStore {
    data: Mutex<FakeData>,
}

impl FakeStore {
    fn seeded() -> Self {
        let store = FakeStore::default();
        {
            let mut data = store.data.lock().expect("lock");
            data.next_id = 100;
            data.pipelines = vec![Pipeline {
                id: PipelineId(1),
                title: "Sales".into(),
                description: String::new(),
            }];
            data.stages = vec![
                stage(11, "Lead", 1, 1),
                stage(12, "Proposal", 2, 1),
            ];
            data.boxes = vec![sample_box(42, "Acme renewal", 1, 11)];
        }
        store
    }

    fn fail(&self, operation: &'static str) {
        self.data.lock().expect("lock").failing.insert(operation);
    }

    fn calls(&self, operation: &str) -> usize {
        self.data
            .lock()
            .expect("lock")
            .calls
            .get(operation)
            .copied()
            .unwrap_or(0)
    }

    fn total_calls(&self) -> usize {
        self.data.lock().expect("lock").calls.values().sum()
    }

    fn begin(&self, operation: &'static str) -> StoreResult<std::sync::MutexGuard<'_, FakeData>> {
        let mut data = self.data.lock().expect("lock");
        *data.calls.entry(operation).or_default() += 1;
        if data.failing.contains(operation) {
            return Err(StoreError::Status {
                operation,
                status: 500,
                body: String::new(),
            });
        }
        Ok(data)
    }
}

fn allocate(data: &mut FakeData) -> i64 {
    data.next_id += 1;
    data.next_id
}

fn stage(id: i64, title: &str, order: i64, pipeline: i64) -> Stage {
    Stage {
        id: StageId(id),
        title: title.into(),
        order,
        pipeline_id: PipelineId(pipeline),
    }
}

fn sample_box(id: i64, title: &str, pipeline: i64, stage: i64) -> BoxRecord {
    BoxRecord {
        id: BoxId(id),
        title: title.into(),
        pipeline_id: PipelineId(pipeline),
        stage_id: StageId(stage),
        value: Some(1200.0),
        contact_email: "buyer@acme.test".into(),
        contact_name: "Ann Buyer".into(),
        notes: String::new(),
        created_at: None,
        modified_at: None,
    }
}

fn email() -> EmailDescriptor {
    EmailDescriptor {
        subject: "Q3 renewal".into(),
        message_id: "<abc@mail.test>".into(),
        from: "buyer@acme.test".into(),
        from_name: "Ann Buyer".into(),
        to: "sales@us.test".into(),
        date: Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap(),
    }
}

#[async_trait]
impl ListStore for FakeStore {
    async fn list_pipelines(&self) -> StoreResult<Vec<Pipeline>> {
        Ok(self.begin("list_pipelines")?.pipelines.clone())
    }

    async fn create_pipeline(&self, title: &str, description: &str) -> StoreResult<Pipeline> {
        let mut data = self.begin("create_pipeline")?;
        let pipeline = Pipeline {
            id: PipelineId(allocate(&mut data)),
            title: title.into(),
            description: description.into(),
        };
        data.pipelines.push(pipeline.clone());
        Ok(pipeline)
    }

    async fn list_stages(&self, pipeline_id: PipelineId) -> StoreResult<Vec<Stage>> {
        let data = self.begin("list_stages")?;
        Ok(data
            .stages
            .iter()
            .filter(|s| s.pipeline_id == pipeline_id)
            .cloned()
            .collect())
    }

    async fn create_stage(
        &self,
        pipeline_id: PipelineId,
        title: &str,
        order: i64,
    ) -> StoreResult<Stage> {
        let mut data = self.begin("create_stage")?;
        let created = stage(allocate(&mut data), title, order, pipeline_id.0);
        data.stages.push(created.clone());
        Ok(created)
    }

    async fn list_boxes(&self, pipeline_id: PipelineId) -> StoreResult<Vec<BoxRecord>> {
        let data = self.begin("list_boxes")?;
        Ok(data
            .boxes
            .iter()
            .filter(|b| b.pipeline_id == pipeline_id)
            .cloned()
            .collect())
    }

    async fn get_box(&self, box_id: BoxId) -> StoreResult<BoxRecord> {
        let data = self.begin("get_box")?;
        data.boxes
            .iter()
            .find(|b| b.id == box_id)
            .cloned()
            .ok_or(StoreError::NotFound {
                list: "CRM_Boxes".into(),
                id: box_id.0,
            })
    }

    async fn create_box(&self, fields: NewBox) -> StoreResult<BoxRecord> {
        let (pipeline_id, stage_id, value) = validate_new_box(&fields)?;
        let mut data = self.begin("create_box")?;
        let record = BoxRecord {
            id: BoxId(allocate(&mut data)),
            title: fields.title,
            pipeline_id,
            stage_id,
            value: Some(value),
            contact_email: fields.contact_email,
            contact_name: fields.contact_name,
            notes: fields.notes,
            created_at: None,
            modified_at: None,
        };
        data.boxes.insert(0, record.clone());
        Ok(record)
    }

    async fn update_box(&self, box_id: BoxId, update: BoxUpdate) -> StoreResult<()> {
        let mut data = self.begin("update_box")?;
        let record = data
            .boxes
            .iter_mut()
            .find(|b| b.id == box_id)
            .ok_or(StoreError::NotFound {
                list: "CRM_Boxes".into(),
                id: box_id.0,
            })?;
        if let Some(title) = update.title {
            record.title = title;
        }
        if let Some(stage_id) = update.stage_id {
            record.stage_id = stage_id;
        }
        Ok(())
    }

    async fn link_email(&self, email: &EmailDescriptor, box_id: BoxId) -> StoreResult<EmailLink> {
        let mut data = self.begin("link_email")?;
        let link = EmailLink {
            id: EmailLinkId(allocate(&mut data)),
            subject: email.subject.clone(),
            from: email.from.clone(),
            to: email.to.clone(),
            date: Some(email.date),
            message_id: email.message_id.clone(),
            box_id,
        };
        data.links.push(link.clone());
        Ok(link)
    }

    async fn list_email_links_for_box(&self, box_id: BoxId) -> StoreResult<Vec<EmailLink>> {
        let data = self.begin("list_email_links_for_box")?;
        Ok(data
            .links
            .iter()
            .filter(|l| l.box_id == box_id)
            .cloned()
            .collect())
    }

    async fn find_boxes_by_email_message_id(
        &self,
        message_id: &str,
    ) -> StoreResult<Vec<BoxRecord>> {
        let data = self.begin("find_boxes_by_email_message_id")?;
        let mut seen = HashSet::new();
        Ok(data
            .links
            .iter()
            .filter(|l| l.message_id == message_id && seen.insert(l.box_id))
            .filter_map(|l| data.boxes.iter().find(|b| b.id == l.box_id).cloned())
            .collect())
    }

    async fn list_activities_for_box(&self, box_id: BoxId) -> StoreResult<Vec<Activity>> {
        let data = self.begin("list_activities_for_box")?;
        Ok(data
            .activities
            .iter()
            .rev()
            .filter(|a| a.box_id == box_id)
            .cloned()
            .collect())
    }

    async fn recent_activities(&self, limit: usize) -> StoreResult<Vec<Activity>> {
        let data = self.begin("recent_activities")?;
        Ok(data.activities.iter().rev().take(limit).cloned().collect())
    }

    async fn create_activity(
        &self,
        box_id: BoxId,
        kind: ActivityType,
        text: &str,
    ) -> StoreResult<Activity> {
        let mut data = self.begin("create_activity")?;
        let activity = Activity {
            id: ActivityId(allocate(&mut data)),
            kind,
            text: text.into(),
            box_id,
            author: Some("Test User".into()),
            created_at: None,
        };
        data.activities.push(activity.clone());
        Ok(activity)
    }
}

async fn started() -> PanelController<FakeStore> {
    let mut controller = PanelController::new(FakeStore::seeded());
    controller.start(Some(email())).await;
    controller
}

#[tokio::test]
async fn start_selects_first_pipeline_and_loads_its_boxes_and_stages() {
    let controller = started().await;
    let state = controller.state();

    assert_eq!(state.current_pipeline, Some(PipelineId(1)));
    assert_eq!(state.box_list, BoxListView::Populated);
    assert_eq!(state.boxes[0].id, BoxId(42));
    assert_eq!(state.stages_for(PipelineId(1)).len(), 2);
    assert_eq!(controller.store().calls("list_boxes"), 1);
    assert_eq!(controller.store().calls("list_stages"), 1);
    assert_eq!(controller.store().calls("recent_activities"), 1);
    assert_eq!(controller.store().calls("find_boxes_by_email_message_id"), 1);
}

#[tokio::test]
async fn selecting_pipeline_reloads_boxes_and_stages_for_it() {
    let mut controller = started().await;
    controller.select_pipeline(PipelineId(1)).await;

    let state = controller.state();
    assert_eq!(state.current_pipeline, Some(PipelineId(1)));
    assert_eq!(controller.store().calls("list_boxes"), 2);
    assert_eq!(controller.store().calls("list_stages"), 2);
    assert_eq!(state.stage_title(PipelineId(1), StageId(11)), Some("Lead"));
}

#[tokio::test]
async fn box_list_is_empty_for_pipeline_without_boxes() {
    let mut controller = started().await;
    controller.select_pipeline(PipelineId(9)).await;
    assert_eq!(controller.state().box_list, BoxListView::Empty);
}

#[tokio::test]
async fn box_list_errors_and_notifies_when_load_fails() {
    let store = FakeStore::seeded();
    store.fail("list_boxes");
    let mut controller = PanelController::new(store);
    controller.start(Some(email())).await;

    assert_eq!(controller.state().box_list, BoxListView::Errored);
    let notices = controller.take_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].kind, NoticeKind::Error);
    assert_eq!(notices[0].message, "Failed to load boxes.");
}

#[tokio::test]
async fn stage_and_activity_failures_are_not_notified() {
    let store = FakeStore::seeded();
    store.fail("list_stages");
    store.fail("recent_activities");
    let mut controller = PanelController::new(store);
    controller.start(Some(email())).await;

    assert!(controller.take_notices().is_empty());
    assert_eq!(controller.state().box_list, BoxListView::Populated);
}

#[tokio::test]
async fn pipeline_failure_shows_connection_notice() {
    let store = FakeStore::seeded();
    store.fail("list_pipelines");
    let mut controller = PanelController::new(store);
    controller.start(Some(email())).await;

    let notices = controller.take_notices();
    assert_eq!(
        notices[0].message,
        "Failed to load pipelines. Please check your list store connection."
    );
    assert_eq!(controller.state().current_pipeline, None);
}

#[tokio::test]
async fn confirm_link_without_box_is_rejected_before_any_call() {
    let mut controller = started().await;
    let before = controller.store().total_calls();
    controller.open_link_modal();

    let report = controller.confirm_link().await;

    assert!(report.rejected.is_some());
    assert_eq!(controller.store().total_calls(), before);
    assert_eq!(controller.take_notices()[0].message, "Please select a box");
}

#[tokio::test]
async fn confirm_link_records_activity_and_refreshes_linked_boxes() {
    let mut controller = started().await;
    controller.open_link_modal();
    controller.choose_link_box(Some(BoxId(42)));

    let report = controller.confirm_link().await;

    assert!(report.is_complete());
    let state = controller.state();
    assert!(!state.link_modal.open);
    assert_eq!(state.linked_boxes.len(), 1);
    assert_eq!(state.linked_boxes[0].id, BoxId(42));
    assert_eq!(state.recent_activity[0].kind, ActivityType::Email);
    assert_eq!(state.recent_activity[0].text, "Email linked: Q3 renewal");
    let notices = controller.take_notices();
    assert_eq!(notices[0].kind, NoticeKind::Success);
    assert_eq!(notices[0].message, "Email linked to box successfully!");
}

#[tokio::test]
async fn linking_twice_still_lists_box_once() {
    let mut controller = started().await;
    for _ in 0..2 {
        controller.open_link_modal();
        controller.choose_link_box(Some(BoxId(42)));
        controller.confirm_link().await;
    }
    assert_eq!(controller.state().linked_boxes.len(), 1);
}

#[tokio::test]
async fn link_kept_when_activity_fails() {
    let mut controller = started().await;
    controller.store().fail("create_activity");
    controller.open_link_modal();
    controller.choose_link_box(Some(BoxId(42)));

    let report = controller.confirm_link().await;

    assert!(report.has_completed(WorkflowStep::LinkEmail));
    assert!(matches!(
        report.status_of(WorkflowStep::RecordActivity),
        Some(StepStatus::Failed(_))
    ));
    assert_eq!(controller.state().linked_boxes.len(), 1);
    assert!(controller.state().link_modal.open);
    assert_eq!(
        controller.take_notices()[0].message,
        "Email linked to box, but recording the activity failed"
    );
}

#[tokio::test]
async fn link_failure_skips_activity() {
    let mut controller = started().await;
    controller.store().fail("link_email");
    controller.open_link_modal();
    controller.choose_link_box(Some(BoxId(42)));

    let report = controller.confirm_link().await;

    assert_eq!(report.failed_step().map(|(step, _)| step), Some(WorkflowStep::LinkEmail));
    assert!(matches!(
        report.status_of(WorkflowStep::RecordActivity),
        Some(StepStatus::Skipped)
    ));
    assert_eq!(controller.store().calls("create_activity"), 0);
    assert_eq!(controller.take_notices()[0].message, "Failed to link email to box");
}

#[tokio::test]
async fn create_modal_prefills_from_email_and_pipeline() {
    let mut controller = started().await;
    controller.open_create_modal().await;

    let form = &controller.state().create_modal.form;
    assert!(controller.state().create_modal.open);
    assert_eq!(form.title, "Q3 renewal");
    assert_eq!(form.pipeline_id, Some(PipelineId(1)));
    assert_eq!(form.stage_id, Some(StageId(11)));
}

#[tokio::test]
async fn closing_create_modal_clears_every_field() {
    let mut controller = started().await;
    controller.open_create_modal().await;
    controller
        .edit_create_form(CreateFormEdit::Notes("call back".into()))
        .await;
    controller
        .edit_create_form(CreateFormEdit::Value("500".into()))
        .await;
    controller.close_create_modal();

    let modal = &controller.state().create_modal;
    assert!(!modal.open);
    assert!(modal.form.title.is_empty());
    assert!(modal.form.notes.is_empty());
    assert!(modal.form.value.is_empty());
    assert_eq!(modal.form.pipeline_id, None);
}

#[tokio::test]
async fn create_with_empty_title_makes_no_calls() {
    let mut controller = started().await;
    controller.open_create_modal().await;
    controller
        .edit_create_form(CreateFormEdit::Title("   ".into()))
        .await;
    let before = controller.store().total_calls();

    let report = controller.confirm_create().await;

    assert_eq!(report.workflow, Workflow::CreateBox);
    assert!(report.rejected.is_some());
    assert_eq!(controller.store().total_calls(), before);
    assert_eq!(
        controller.take_notices()[0].message,
        "Please fill in all required fields"
    );
}

#[tokio::test]
async fn create_with_negative_value_is_rejected() {
    let mut controller = started().await;
    controller.open_create_modal().await;
    controller
        .edit_create_form(CreateFormEdit::Value("-5".into()))
        .await;

    let report = controller.confirm_create().await;

    assert!(report.rejected.is_some());
    assert_eq!(controller.store().calls("create_box"), 0);
}

#[tokio::test]
async fn create_runs_all_steps_and_reloads_views() {
    let mut controller = started().await;
    controller.open_create_modal().await;
    controller
        .edit_create_form(CreateFormEdit::Value("$1,500".into()))
        .await;

    let report = controller.confirm_create().await;

    assert!(report.is_complete());
    let state = controller.state();
    assert!(!state.create_modal.open);
    assert_eq!(state.boxes.len(), 2);
    assert_eq!(state.boxes[0].title, "Q3 renewal");
    assert_eq!(state.boxes[0].value, Some(1500.0));
    assert_eq!(state.boxes[0].contact_email, "buyer@acme.test");
    assert_eq!(state.linked_boxes.len(), 1);
    assert_eq!(state.recent_activity[0].kind, ActivityType::Created);
    assert_eq!(state.recent_activity[0].text, "Box created from email: Q3 renewal");
    assert_eq!(controller.take_notices()[0].message, "Box created successfully!");
}

#[tokio::test]
async fn create_keeps_box_when_link_fails() {
    let mut controller = started().await;
    controller.store().fail("link_email");
    controller.open_create_modal().await;

    let report = controller.confirm_create().await;

    assert!(report.has_completed(WorkflowStep::CreateBox));
    assert_eq!(report.failed_step().map(|(step, _)| step), Some(WorkflowStep::LinkEmail));
    assert!(matches!(
        report.status_of(WorkflowStep::RecordActivity),
        Some(StepStatus::Skipped)
    ));
    assert_eq!(controller.state().boxes.len(), 2);
    assert_eq!(controller.store().calls("create_activity"), 0);
    assert_eq!(
        controller.take_notices()[0].message,
        "Box created, but linking the email failed"
    );
}

#[tokio::test]
async fn create_reports_activity_failure_after_link() {
    let mut controller = started().await;
    controller.store().fail("create_activity");
    controller.open_create_modal().await;

    let report = controller.confirm_create().await;

    assert!(report.has_completed(WorkflowStep::CreateBox));
    assert!(report.has_completed(WorkflowStep::LinkEmail));
    assert_eq!(
        report.failed_step().map(|(step, _)| step),
        Some(WorkflowStep::RecordActivity)
    );
    assert_eq!(controller.state().linked_boxes.len(), 1);
}

#[tokio::test]
async fn workflows_require_an_open_email() {
    let mut controller = PanelController::new(FakeStore::seeded());
    controller.start(None).await;
    controller.open_link_modal();
    controller.choose_link_box(Some(BoxId(42)));

    let report = controller.confirm_link().await;

    assert!(report.rejected.is_some());
    assert_eq!(controller.store().calls("link_email"), 0);
    assert_eq!(controller.store().calls("find_boxes_by_email_message_id"), 0);
}

#[tokio::test]
async fn changing_create_pipeline_rebuilds_stage_choice() {
    let mut controller = started().await;
    controller
        .store()
        .create_stage(PipelineId(2), "Intro", 1)
        .await
        .expect("stage");
    controller.open_create_modal().await;

    controller
        .edit_create_form(CreateFormEdit::Pipeline(PipelineId(2)))
        .await;

    let form = &controller.state().create_modal.form;
    assert_eq!(form.pipeline_id, Some(PipelineId(2)));
    assert_eq!(form.stage_id, Some(StageId(101)));
}

#[tokio::test]
async fn link_modal_pipeline_change_leaves_main_list_alone() {
    let mut controller = started().await;
    controller.open_link_modal();
    controller.change_link_pipeline(PipelineId(7)).await;

    let state = controller.state();
    assert_eq!(state.link_modal.pipeline_id, Some(PipelineId(7)));
    assert!(state.link_modal.boxes.is_empty());
    assert_eq!(state.boxes.len(), 1);
    assert_eq!(state.current_pipeline, Some(PipelineId(1)));
}

#[tokio::test]
async fn view_box_loads_history_and_links() {
    let mut controller = started().await;
    controller.open_link_modal();
    controller.choose_link_box(Some(BoxId(42)));
    controller.confirm_link().await;

    controller.view_box(BoxId(42)).await;

    let detail = controller.state().box_detail.as_ref().expect("detail");
    assert_eq!(detail.record.title, "Acme renewal");
    assert_eq!(detail.activities.len(), 1);
    assert_eq!(detail.emails.len(), 1);
    controller.close_box_detail();
    assert!(controller.state().box_detail.is_none());
}

#[tokio::test]
async fn view_missing_box_notifies_not_found() {
    let mut controller = started().await;
    controller.view_box(BoxId(999)).await;

    assert!(controller.state().box_detail.is_none());
    assert_eq!(
        controller.take_notices()[0].message,
        "Failed to load box details. The record no longer exists."
    );
}

#[tokio::test]
async fn refresh_returns_to_first_pipeline() {
    let mut controller = started().await;
    controller
        .store()
        .create_pipeline("Support", "")
        .await
        .expect("pipeline");
    controller.select_pipeline(PipelineId(101)).await;
    controller.switch_tab(Tab::Boxes);
    let box_loads = controller.store().calls("list_boxes");

    controller.refresh().await;

    let state = controller.state();
    assert_eq!(state.current_pipeline, Some(PipelineId(1)));
    assert_eq!(state.active_tab, Tab::Boxes);
    assert_eq!(state.pipelines.len(), 2);
    assert_eq!(state.boxes[0].id, BoxId(42));
    assert_eq!(controller.store().calls("list_boxes"), box_loads + 1);
}

#[tokio::test]
async fn box_choice_needs_open_link_dialog() {
    let mut controller = started().await;
    controller.choose_link_box(Some(BoxId(42)));
    assert_eq!(controller.state().link_modal.selected_box, None);

    let report = controller.confirm_link().await;

    assert!(report.rejected.is_some());
    assert_eq!(controller.store().calls("link_email"), 0);
    assert_eq!(controller.take_notices()[0].message, "Please select a box");
}
