//! Runtime bridge: a worker thread that owns the controller and drains the command queue.

use std::thread;

use client_core::ListStore;
use crossbeam_channel::{Receiver, Sender};
use shared::domain::EmailDescriptor;

use crate::backend_bridge::commands::PanelCommand;
use crate::controller::{
    events::{Notice, PanelEvent},
    workflows::WorkflowReport,
    PanelController,
};
use crate::ui::render::render_panel;

/// Runs one command to completion. Workflow commands return their step report.
pub async fn execute<S: ListStore>(
    controller: &mut PanelController<S>,
    cmd: PanelCommand,
) -> Option<WorkflowReport> {
    match cmd {
        PanelCommand::Render | PanelCommand::Shutdown => {}
        PanelCommand::Refresh => controller.refresh().await,
        PanelCommand::SwitchTab(tab) => controller.switch_tab(tab),
        PanelCommand::SelectPipeline(pipeline_id) => controller.select_pipeline(pipeline_id).await,
        PanelCommand::SelectBox(box_id) => controller.select_box(box_id),
        PanelCommand::ViewBox(box_id) => controller.view_box(box_id).await,
        PanelCommand::CloseBoxDetail => controller.close_box_detail(),
        PanelCommand::OpenLinkModal => controller.open_link_modal(),
        PanelCommand::LinkPipeline(pipeline_id) => {
            controller.change_link_pipeline(pipeline_id).await
        }
        PanelCommand::LinkChooseBox(box_id) => controller.choose_link_box(box_id),
        PanelCommand::ConfirmLink => return Some(controller.confirm_link().await),
        PanelCommand::CancelLink => controller.close_link_modal(),
        PanelCommand::OpenCreateModal => controller.open_create_modal().await,
        PanelCommand::EditCreate(edit) => controller.edit_create_form(edit).await,
        PanelCommand::ConfirmCreate => return Some(controller.confirm_create().await),
        PanelCommand::CancelCreate => controller.close_create_modal(),
    }
    None
}

fn publish<S: ListStore>(
    controller: &mut PanelController<S>,
    report: Option<WorkflowReport>,
    ui_tx: &Sender<PanelEvent>,
) -> bool {
    let mut events: Vec<PanelEvent> = controller
        .take_notices()
        .into_iter()
        .map(PanelEvent::Notice)
        .collect();
    events.extend(report.map(PanelEvent::Workflow));
    events.push(PanelEvent::Rendered(render_panel(controller.state())));
    events.into_iter().all(|event| ui_tx.send(event).is_ok())
}

/// Spawns the backend worker. It loads the panel for `email`, then takes one
/// command at a time until `Shutdown` or until the command queue closes.
pub fn launch<S>(
    mut controller: PanelController<S>,
    email: Option<EmailDescriptor>,
    cmd_rx: Receiver<PanelCommand>,
    ui_tx: Sender<PanelEvent>,
) -> std::io::Result<thread::JoinHandle<()>>
where
    S: ListStore + 'static,
{
    thread::Builder::new()
        .name("panel-backend".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(err) => {
                    tracing::error!("failed to build backend runtime: {err}");
                    let _ = ui_tx.send(PanelEvent::Notice(Notice::error(format!(
                        "backend worker startup failure: {err}"
                    ))));
                    let _ = ui_tx.send(PanelEvent::Stopped);
                    return;
                }
            };

            runtime.block_on(async move {
                controller.start(email).await;
                if !publish(&mut controller, None, &ui_tx) {
                    return;
                }

                while let Ok(cmd) = cmd_rx.recv() {
                    tracing::debug!(command = cmd.name(), "backend processing command");
                    if matches!(cmd, PanelCommand::Shutdown) {
                        break;
                    }
                    let report = execute(&mut controller, cmd).await;
                    if !publish(&mut controller, report, &ui_tx) {
                        tracing::warn!("ui event receiver dropped; stopping backend worker");
                        return;
                    }
                }
                let _ = ui_tx.send(PanelEvent::Stopped);
            });
        })
}
