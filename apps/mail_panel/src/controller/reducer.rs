//! Session state and the pure transitions applied to it.

use std::collections::HashMap;

use shared::{
    domain::{
        Activity, BoxId, BoxRecord, EmailDescriptor, EmailLink, NewBox, Pipeline, PipelineId,
        Stage, StageId,
    },
    error::ApiException,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Email,
    Boxes,
    Activity,
}

impl Tab {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "email" => Some(Tab::Email),
            "boxes" => Some(Tab::Boxes),
            "activity" => Some(Tab::Activity),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tab::Email => "email",
            Tab::Boxes => "boxes",
            Tab::Activity => "activity",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoxListView {
    #[default]
    Idle,
    Loading,
    Populated,
    Empty,
    Errored,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LinkBoxModal {
    pub open: bool,
    pub pipeline_id: Option<PipelineId>,
    pub boxes: Vec<BoxRecord>,
    pub selected_box: Option<BoxId>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CreateBoxForm {
    pub title: String,
    pub pipeline_id: Option<PipelineId>,
    pub stage_id: Option<StageId>,
    /// Raw text of the value input.
    pub value: String,
    pub notes: String,
}

impl CreateBoxForm {
    /// Builds the create request; contact fields come from the open email.
    pub fn to_new_box(&self, email: &EmailDescriptor) -> Result<NewBox, ApiException> {
        let title = self.title.trim();
        let pipeline_id = self.pipeline_id.filter(|id| id.is_valid());
        let stage_id = self.stage_id.filter(|id| id.is_valid());
        if title.is_empty() || pipeline_id.is_none() || stage_id.is_none() {
            return Err(ApiException::validation(
                "Please fill in all required fields",
            ));
        }

        let raw_value = self.value.trim();
        let value = if raw_value.is_empty() {
            None
        } else {
            match raw_value.trim_start_matches('$').replace(',', "").parse::<f64>() {
                Ok(parsed) if parsed.is_finite() && parsed >= 0.0 => Some(parsed),
                _ => {
                    return Err(ApiException::validation(
                        "Box value must be a non-negative number",
                    ))
                }
            }
        };

        Ok(NewBox {
            title: title.to_string(),
            pipeline_id,
            stage_id,
            value,
            contact_email: email.from.clone(),
            contact_name: email.from_name.clone(),
            notes: self.notes.trim().to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CreateBoxModal {
    pub open: bool,
    pub form: CreateBoxForm,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoxDetail {
    pub record: BoxRecord,
    pub activities: Vec<Activity>,
    pub emails: Vec<EmailLink>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionState {
    pub current_email: Option<EmailDescriptor>,
    pub current_pipeline: Option<PipelineId>,
    pub pipelines: Vec<Pipeline>,
    pub stages_by_pipeline: HashMap<PipelineId, Vec<Stage>>,
    pub boxes: Vec<BoxRecord>,
    pub box_list: BoxListView,
    pub selected_box: Option<BoxId>,
    pub linked_boxes: Vec<BoxRecord>,
    pub recent_activity: Vec<Activity>,
    pub active_tab: Tab,
    pub link_modal: LinkBoxModal,
    pub create_modal: CreateBoxModal,
    pub box_detail: Option<BoxDetail>,
}

impl SessionState {
    pub fn stages_for(&self, pipeline_id: PipelineId) -> &[Stage] {
        self.stages_by_pipeline
            .get(&pipeline_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn stage_title(&self, pipeline_id: PipelineId, stage_id: StageId) -> Option<&str> {
        self.stages_for(pipeline_id)
            .iter()
            .find(|stage| stage.id == stage_id)
            .map(|stage| stage.title.as_str())
    }

    fn first_stage(&self, pipeline_id: PipelineId) -> Option<StageId> {
        self.stages_for(pipeline_id).first().map(|stage| stage.id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CreateFormEdit {
    Title(String),
    Pipeline(PipelineId),
    Stage(StageId),
    Value(String),
    Notes(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum StateChange {
    EmailLoaded(Option<EmailDescriptor>),
    PipelinesLoaded(Vec<Pipeline>),
    PipelineSelected(PipelineId),
    BoxesLoading,
    BoxesLoaded(Vec<BoxRecord>),
    BoxesFailed,
    BoxSelected(BoxId),
    StagesLoaded {
        pipeline_id: PipelineId,
        stages: Vec<Stage>,
    },
    LinkedBoxesLoaded(Vec<BoxRecord>),
    RecentActivityLoaded(Vec<Activity>),
    TabSwitched(Tab),
    LinkModalOpened,
    LinkModalPipelineChanged(PipelineId),
    LinkModalBoxesLoaded(Vec<BoxRecord>),
    LinkModalBoxSelected(Option<BoxId>),
    LinkModalClosed,
    CreateModalOpened,
    CreateFormEdited(CreateFormEdit),
    CreateModalClosed,
    BoxDetailLoaded(BoxDetail),
    BoxDetailClosed,
}

pub fn reduce(mut state: SessionState, change: StateChange) -> SessionState {
    match change {
        StateChange::EmailLoaded(email) => {
            state.current_email = email;
            state.linked_boxes.clear();
        }
        StateChange::PipelinesLoaded(pipelines) => {
            // Every reload starts again from the first pipeline.
            state.current_pipeline = pipelines.first().map(|p| p.id);
            state.selected_box = None;
            state.pipelines = pipelines;
        }
        StateChange::PipelineSelected(pipeline_id) => {
            state.current_pipeline = Some(pipeline_id);
            state.selected_box = None;
        }
        StateChange::BoxesLoading => {
            state.box_list = BoxListView::Loading;
        }
        StateChange::BoxesLoaded(boxes) => {
            state.box_list = if boxes.is_empty() {
                BoxListView::Empty
            } else {
                BoxListView::Populated
            };
            if state
                .selected_box
                .is_some_and(|selected| !boxes.iter().any(|b| b.id == selected))
            {
                state.selected_box = None;
            }
            if !state.link_modal.open || state.link_modal.pipeline_id == state.current_pipeline {
                state.link_modal.boxes = boxes.clone();
                state.link_modal.selected_box = None;
            }
            state.boxes = boxes;
        }
        StateChange::BoxesFailed => {
            state.box_list = BoxListView::Errored;
            state.boxes.clear();
            state.selected_box = None;
        }
        StateChange::BoxSelected(box_id) => {
            state.selected_box = Some(box_id);
        }
        StateChange::StagesLoaded {
            pipeline_id,
            stages,
        } => {
            state.stages_by_pipeline.insert(pipeline_id, stages);
            let form = &state.create_modal.form;
            if form.pipeline_id == Some(pipeline_id) {
                let still_listed = form
                    .stage_id
                    .is_some_and(|stage| state.stage_title(pipeline_id, stage).is_some());
                if !still_listed {
                    state.create_modal.form.stage_id = state.first_stage(pipeline_id);
                }
            }
        }
        StateChange::LinkedBoxesLoaded(boxes) => {
            state.linked_boxes = boxes;
        }
        StateChange::RecentActivityLoaded(activities) => {
            state.recent_activity = activities;
        }
        StateChange::TabSwitched(tab) => {
            state.active_tab = tab;
        }
        StateChange::LinkModalOpened => {
            state.link_modal = LinkBoxModal {
                open: true,
                pipeline_id: state.current_pipeline,
                boxes: state.boxes.clone(),
                selected_box: None,
            };
        }
        StateChange::LinkModalPipelineChanged(pipeline_id) => {
            state.link_modal.pipeline_id = Some(pipeline_id);
            state.link_modal.boxes.clear();
            state.link_modal.selected_box = None;
        }
        StateChange::LinkModalBoxesLoaded(boxes) => {
            state.link_modal.boxes = boxes;
            state.link_modal.selected_box = None;
        }
        StateChange::LinkModalBoxSelected(box_id) => {
            if state.link_modal.open {
                state.link_modal.selected_box = box_id;
            }
        }
        StateChange::LinkModalClosed => {
            state.link_modal.open = false;
            state.link_modal.selected_box = None;
        }
        StateChange::CreateModalOpened => {
            let pipeline_id = state.current_pipeline;
            state.create_modal = CreateBoxModal {
                open: true,
                form: CreateBoxForm {
                    title: state
                        .current_email
                        .as_ref()
                        .map(|email| email.subject.clone())
                        .unwrap_or_default(),
                    pipeline_id,
                    stage_id: pipeline_id.and_then(|id| state.first_stage(id)),
                    value: String::new(),
                    notes: String::new(),
                },
            };
        }
        StateChange::CreateFormEdited(edit) => match edit {
            CreateFormEdit::Title(title) => state.create_modal.form.title = title,
            CreateFormEdit::Pipeline(pipeline_id) => {
                // The stage list is rebuilt for the new pipeline.
                state.create_modal.form.pipeline_id = Some(pipeline_id);
                state.create_modal.form.stage_id = state.first_stage(pipeline_id);
            }
            CreateFormEdit::Stage(stage_id) => state.create_modal.form.stage_id = Some(stage_id),
            CreateFormEdit::Value(value) => state.create_modal.form.value = value,
            CreateFormEdit::Notes(notes) => state.create_modal.form.notes = notes,
        },
        StateChange::CreateModalClosed => {
            state.create_modal = CreateBoxModal::default();
        }
        StateChange::BoxDetailLoaded(detail) => {
            state.selected_box = Some(detail.record.id);
            state.box_detail = Some(detail);
        }
        StateChange::BoxDetailClosed => {
            state.box_detail = None;
        }
    }
    state
}
