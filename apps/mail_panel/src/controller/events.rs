//! Notices, backend-to-UI events, and error classification for the panel controller.

use std::{collections::VecDeque, time::Duration};

use client_core::StoreError;
use shared::error::{ApiError, ErrorCode};

use crate::controller::workflows::WorkflowReport;

pub const ERROR_NOTICE_TTL: Duration = Duration::from_secs(5);
pub const SUCCESS_NOTICE_TTL: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Error,
    Success,
}

/// Transient message for the notice area. Rendering and expiry belong to the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    pub ttl: Duration,
}

impl Notice {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            message: message.into(),
            ttl: ERROR_NOTICE_TTL,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            message: message.into(),
            ttl: SUCCESS_NOTICE_TTL,
        }
    }
}

#[derive(Debug, Default)]
pub struct NoticeQueue {
    pending: VecDeque<Notice>,
}

impl NoticeQueue {
    pub fn push(&mut self, notice: Notice) {
        self.pending.push_back(notice);
    }

    pub fn drain(&mut self) -> Vec<Notice> {
        self.pending.drain(..).collect()
    }
}

pub enum PanelEvent {
    Notice(Notice),
    Workflow(WorkflowReport),
    Rendered(String),
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorContext {
    LoadPipelines,
    LoadBoxes,
    LoadStages,
    LoadActivity,
    LinkedBoxes,
    BoxDetail,
    LinkEmail,
    CreateBox,
}

impl UiErrorContext {
    fn headline(self) -> &'static str {
        match self {
            UiErrorContext::LoadPipelines => {
                "Failed to load pipelines. Please check your list store connection."
            }
            UiErrorContext::LoadBoxes => "Failed to load boxes.",
            UiErrorContext::LoadStages => "Failed to load stages.",
            UiErrorContext::LoadActivity => "Failed to load recent activity.",
            UiErrorContext::LinkedBoxes => "Failed to check linked boxes.",
            UiErrorContext::BoxDetail => "Failed to load box details.",
            UiErrorContext::LinkEmail => "Failed to link email to box",
            UiErrorContext::CreateBox => "Failed to create box",
        }
    }
}

#[derive(Debug, Clone)]
pub struct UiError {
    code: ErrorCode,
    context: UiErrorContext,
    message: String,
}

impl UiError {
    pub fn from_store(context: UiErrorContext, err: &StoreError) -> Self {
        Self {
            code: err.code(),
            context,
            message: err.to_string(),
        }
    }

    pub fn from_api(context: UiErrorContext, err: &ApiError) -> Self {
        Self {
            code: err.code,
            context,
            message: err.message.clone(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn context(&self) -> UiErrorContext {
        self.context
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Validation problems are shown verbatim; everything else gets the fixed
    /// per-context headline.
    pub fn user_message(&self) -> String {
        match self.code {
            ErrorCode::ValidationFailure => self.message.clone(),
            ErrorCode::NotFound => format!("{} The record no longer exists.", self.context.headline()),
            ErrorCode::TransportFailure | ErrorCode::EnvelopeMalformed => {
                self.context.headline().to_string()
            }
        }
    }

    pub fn to_notice(&self) -> Notice {
        Notice::error(self.user_message())
    }
}
