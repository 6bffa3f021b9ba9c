//! Backend commands queued from the UI to the backend worker.

use shared::domain::{BoxId, PipelineId, StageId};

use crate::controller::reducer::{CreateFormEdit, Tab};

#[derive(Debug, Clone, PartialEq)]
pub enum PanelCommand {
    Render,
    Refresh,
    SwitchTab(Tab),
    SelectPipeline(PipelineId),
    SelectBox(BoxId),
    ViewBox(BoxId),
    CloseBoxDetail,
    OpenLinkModal,
    LinkPipeline(PipelineId),
    LinkChooseBox(Option<BoxId>),
    ConfirmLink,
    CancelLink,
    OpenCreateModal,
    EditCreate(CreateFormEdit),
    ConfirmCreate,
    CancelCreate,
    Shutdown,
}

pub const USAGE: &str = "\
commands:
  show                       render the panel
  refresh                    reload pipelines, activity and linked boxes
  tab <email|boxes|activity> switch tab
  pipeline <id>              select a pipeline
  select <box id>            highlight a box in the list
  box <id> | box close       open or close box details
  link open|cancel|confirm   link dialog
  link pipeline <id>         pick the link dialog pipeline
  link box <id>              pick the box to link (0 clears)
  create open|cancel|confirm create dialog
  create title <text>        edit a create dialog field
  create pipeline <id>
  create stage <id>
  create value <amount>
  create notes <text>
  quit";

fn parse_id(raw: Option<&str>, what: &str) -> Result<i64, String> {
    let raw = raw.ok_or_else(|| format!("missing {what} id"))?;
    raw.trim()
        .parse::<i64>()
        .map_err(|_| format!("invalid {what} id: {raw}"))
}

impl PanelCommand {
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let (head, rest) = match line.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (line, ""),
        };
        let (sub, arg) = match rest.split_once(char::is_whitespace) {
            Some((sub, arg)) => (sub, Some(arg.trim())),
            None if rest.is_empty() => ("", None),
            None => (rest, None),
        };

        match head.to_ascii_lowercase().as_str() {
            "show" | "render" => Ok(PanelCommand::Render),
            "refresh" => Ok(PanelCommand::Refresh),
            "quit" | "exit" => Ok(PanelCommand::Shutdown),
            "tab" => Tab::parse(rest)
                .map(PanelCommand::SwitchTab)
                .ok_or_else(|| format!("unknown tab: {rest}")),
            "pipeline" => parse_id(Some(rest), "pipeline").map(|id| PanelCommand::SelectPipeline(PipelineId(id))),
            "select" => parse_id(Some(rest), "box").map(|id| PanelCommand::SelectBox(BoxId(id))),
            "box" if rest.eq_ignore_ascii_case("close") => Ok(PanelCommand::CloseBoxDetail),
            "box" => parse_id(Some(rest), "box").map(|id| PanelCommand::ViewBox(BoxId(id))),
            "link" => match sub {
                "open" => Ok(PanelCommand::OpenLinkModal),
                "cancel" => Ok(PanelCommand::CancelLink),
                "confirm" => Ok(PanelCommand::ConfirmLink),
                "pipeline" => parse_id(arg, "pipeline")
                    .map(|id| PanelCommand::LinkPipeline(PipelineId(id))),
                "box" => parse_id(arg, "box").map(|id| {
                    PanelCommand::LinkChooseBox(Some(BoxId(id)).filter(|b| b.is_valid()))
                }),
                other => Err(format!("unknown link action: {other}")),
            },
            "create" => match sub {
                "open" => Ok(PanelCommand::OpenCreateModal),
                "cancel" => Ok(PanelCommand::CancelCreate),
                "confirm" => Ok(PanelCommand::ConfirmCreate),
                "title" => Ok(PanelCommand::EditCreate(CreateFormEdit::Title(
                    arg.unwrap_or_default().to_string(),
                ))),
                "pipeline" => parse_id(arg, "pipeline").map(|id| {
                    PanelCommand::EditCreate(CreateFormEdit::Pipeline(PipelineId(id)))
                }),
                "stage" => parse_id(arg, "stage")
                    .map(|id| PanelCommand::EditCreate(CreateFormEdit::Stage(StageId(id)))),
                "value" => Ok(PanelCommand::EditCreate(CreateFormEdit::Value(
                    arg.unwrap_or_default().to_string(),
                ))),
                "notes" => Ok(PanelCommand::EditCreate(CreateFormEdit::Notes(
                    arg.unwrap_or_default().to_string(),
                ))),
                other => Err(format!("unknown create action: {other}")),
            },
            "" => Err("empty command".to_string()),
            other => Err(format!("unknown command: {other}")),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PanelCommand::Render => "render",
            PanelCommand::Refresh => "refresh",
            PanelCommand::SwitchTab(_) => "switch_tab",
            PanelCommand::SelectPipeline(_) => "select_pipeline",
            PanelCommand::SelectBox(_) => "select_box",
            PanelCommand::ViewBox(_) => "view_box",
            PanelCommand::CloseBoxDetail => "close_box_detail",
            PanelCommand::OpenLinkModal => "open_link_modal",
            PanelCommand::LinkPipeline(_) => "link_pipeline",
            PanelCommand::LinkChooseBox(_) => "link_choose_box",
            PanelCommand::ConfirmLink => "confirm_link",
            PanelCommand::CancelLink => "cancel_link",
            PanelCommand::OpenCreateModal => "open_create_modal",
            PanelCommand::EditCreate(_) => "edit_create",
            PanelCommand::ConfirmCreate => "confirm_create",
            PanelCommand::CancelCreate => "cancel_create",
            PanelCommand::Shutdown => "shutdown",
        }
    }
}

#[cfg(test)]
#[path = "../tests/commands_tests.rs"]
mod tests;
