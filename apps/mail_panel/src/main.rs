use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
    time::Instant,
};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use client_core::ListStoreClient;
use crossbeam_channel::bounded;
use shared::domain::EmailDescriptor;
use tracing_subscriber::EnvFilter;

mod backend_bridge;
mod config;
mod controller;
mod mailbox;
mod ui;

use backend_bridge::commands::{PanelCommand, USAGE};
use controller::{events::PanelEvent, orchestration::dispatch_panel_command, PanelController};
use mailbox::{load_email, FileMailbox};
use ui::{notices::NoticeBoard, render};

const COMMAND_QUEUE_CAPACITY: usize = 16;
const EVENT_QUEUE_CAPACITY: usize = 64;

#[derive(Parser, Debug)]
#[command(name = "mail-panel", about = "CRM box panel for the open email")]
struct Args {
    /// Config file; `mail_panel.toml` in the working directory is read when present.
    #[arg(long)]
    config: Option<PathBuf>,
    /// List store site url, overriding config and environment.
    #[arg(long)]
    site_url: Option<String>,
    /// JSON file holding the open mail item.
    #[arg(long)]
    email: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load everything once and print the panel HTML.
    Show,
    /// Interactive session driven by stdin commands.
    Repl,
    /// Print the list schema the panel expects.
    Schema,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = config::load_settings(args.config.as_deref())?;
    if let Some(site_url) = args.site_url {
        settings.site_url = site_url;
    }

    if matches!(args.command, Command::Schema) {
        let client = ListStoreClient::new(
            settings.site_url().unwrap_or_else(|_| "http://localhost".into()),
            settings.lists.clone(),
        )?;
        println!("{}", serde_json::to_string_pretty(&client.describe_schema())?);
        return Ok(());
    }

    let client = ListStoreClient::new(settings.site_url()?, settings.lists.clone())
        .context("failed to configure list store client")?;
    tracing::info!(site_url = client.site_url(), "list store configured");
    let email = match &args.email {
        Some(path) => load_email(&FileMailbox::new(path), Utc::now())?,
        None => None,
    };
    let controller =
        PanelController::with_recent_activity_limit(client, settings.recent_activity_limit);

    match args.command {
        Command::Show => show(controller, email),
        Command::Repl => repl(controller, email),
        Command::Schema => Ok(()),
    }
}

fn show(mut controller: PanelController<ListStoreClient>, email: Option<EmailDescriptor>) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build runtime")?;
    runtime.block_on(controller.start(email));

    let notices = controller.take_notices();
    if !notices.is_empty() {
        eprintln!("{}", render::render_notices(&notices));
    }
    println!("{}", render::render_panel(controller.state()));
    Ok(())
}

fn repl(controller: PanelController<ListStoreClient>, email: Option<EmailDescriptor>) -> Result<()> {
    let (cmd_tx, cmd_rx) = bounded::<PanelCommand>(COMMAND_QUEUE_CAPACITY);
    let (ui_tx, ui_rx) = bounded::<PanelEvent>(EVENT_QUEUE_CAPACITY);
    let worker = backend_bridge::runtime::launch(controller, email, cmd_rx, ui_tx)
        .context("failed to spawn backend worker")?;

    let mut board = NoticeBoard::default();
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let mut status = String::new();

    loop {
        // Drain until the panel for the last command has been rendered.
        let mut stopped = true;
        for event in ui_rx.iter() {
            match event {
                PanelEvent::Notice(notice) => board.post(notice, Instant::now()),
                PanelEvent::Workflow(report) => tracing::info!(
                    workflow = ?report.workflow,
                    complete = report.is_complete(),
                    failed = ?report.failed_step().map(|(step, _)| step),
                    "workflow finished"
                ),
                PanelEvent::Rendered(html) => {
                    let notices = render::render_notices(board.visible(Instant::now()));
                    println!("{notices}{html}");
                    stopped = false;
                    break;
                }
                PanelEvent::Stopped => break,
            }
        }
        if stopped {
            break;
        }

        print!("> ");
        io::stdout().flush().ok();
        let Some(line) = lines.next().transpose()? else {
            dispatch_panel_command(&cmd_tx, PanelCommand::Shutdown, &mut status);
            break;
        };
        let line = line.trim();
        if line.is_empty() || line.eq_ignore_ascii_case("help") {
            if !line.is_empty() {
                println!("{USAGE}");
            }
            dispatch_panel_command(&cmd_tx, PanelCommand::Render, &mut status);
            continue;
        }
        match PanelCommand::parse(line) {
            Ok(cmd) => {
                let shutdown = matches!(cmd, PanelCommand::Shutdown);
                if !dispatch_panel_command(&cmd_tx, cmd, &mut status) {
                    eprintln!("{status}");
                    break;
                }
                if shutdown {
                    break;
                }
            }
            Err(err) => {
                eprintln!("{err}; type `help` for commands");
                dispatch_panel_command(&cmd_tx, PanelCommand::Render, &mut status);
            }
        }
    }

    drop(cmd_tx);
    worker
        .join()
        .map_err(|_| anyhow::anyhow!("backend worker panicked"))?;
    Ok(())
}
