//! HTML rendering of the panel regions from session state.
//!
//! Every piece of text that came from the list store or the mail host goes
//! through [`escape_html`] before it is interpolated.

use std::fmt::Write as _;

use chrono::{DateTime, Local, Utc};
use shared::domain::{
    Activity, BoxRecord, EmailDescriptor, EmailLink, Pipeline, PipelineId, Stage, StageId,
};

use crate::controller::{
    events::{Notice, NoticeKind},
    reducer::{BoxListView, CreateBoxModal, LinkBoxModal, SessionState, Tab},
};

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// `$1,234.5` style: thousands grouped, at most three fraction digits, trailing
/// zeros dropped.
pub fn format_currency(value: f64) -> String {
    let scaled = (value.abs() * 1000.0).round() as u64;
    let (whole, fraction) = (scaled / 1000, scaled % 1000);

    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && scaled > 0 { "-" } else { "" };
    if fraction == 0 {
        format!("{sign}${grouped}")
    } else {
        let fraction = format!("{fraction:03}");
        format!("{sign}${grouped}.{}", fraction.trim_end_matches('0'))
    }
}

fn box_value_label(record: &BoxRecord) -> String {
    match record.value {
        Some(value) if value > 0.0 => format_currency(value),
        _ => "No value".to_string(),
    }
}

fn local_datetime(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

fn local_date(at: Option<DateTime<Utc>>) -> String {
    at.map(|at| at.with_timezone(&Local).format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

fn empty_state(icon: &str, text: &str) -> String {
    format!(
        "<div class=\"empty-state\"><div class=\"empty-state-icon\">{icon}</div><p>{}</p></div>",
        escape_html(text)
    )
}

pub fn render_email_header(email: Option<&EmailDescriptor>) -> String {
    let Some(email) = email else {
        return "<div class=\"email-header\"><p>No email selected</p></div>".to_string();
    };
    let subject = if email.subject.trim().is_empty() {
        "No Subject"
    } else {
        email.subject.as_str()
    };
    format!(
        "<div class=\"email-header\"><div class=\"email-subject\">{}</div>\
         <div class=\"email-from\">{} &lt;{}&gt;</div>\
         <div class=\"email-date\">{}</div></div>",
        escape_html(subject),
        escape_html(&email.from_name),
        escape_html(&email.from),
        local_datetime(email.date),
    )
}

fn option(value: i64, label: &str, selected: bool) -> String {
    format!(
        "<option value=\"{value}\"{}>{}</option>",
        if selected { " selected" } else { "" },
        escape_html(label)
    )
}

pub fn render_pipeline_options(
    pipelines: &[Pipeline],
    selected: Option<PipelineId>,
) -> String {
    pipelines
        .iter()
        .map(|p| option(p.id.0, &p.title, Some(p.id) == selected))
        .collect()
}

pub fn render_stage_options(stages: &[Stage], selected: Option<StageId>) -> String {
    stages
        .iter()
        .map(|s| option(s.id.0, &s.title, Some(s.id) == selected))
        .collect()
}

/// Main box list for the current pipeline, one state per [`BoxListView`].
pub fn render_box_list(state: &SessionState) -> String {
    match state.box_list {
        BoxListView::Idle => String::new(),
        BoxListView::Loading => "<li class=\"loading\">Loading boxes...</li>".to_string(),
        BoxListView::Empty => empty_state("📦", "No boxes in this pipeline"),
        BoxListView::Errored => empty_state("⚠", "Failed to load boxes."),
        BoxListView::Populated => {
            let mut html = String::new();
            for record in &state.boxes {
                let stage = state
                    .stage_title(record.pipeline_id, record.stage_id)
                    .unwrap_or("Unknown Stage");
                let contact = if record.contact_name.is_empty() {
                    String::new()
                } else {
                    format!("{} | ", escape_html(&record.contact_name))
                };
                let selected = if state.selected_box == Some(record.id) {
                    " selected"
                } else {
                    ""
                };
                let _ = write!(
                    html,
                    "<li class=\"box-item{selected}\" data-box-id=\"{}\">\
                     <div class=\"box-name\">{} <span class=\"stage-badge\">{}</span></div>\
                     <div class=\"box-meta\">{contact}{} | Updated: {}</div></li>",
                    record.id,
                    escape_html(&record.title),
                    escape_html(stage),
                    box_value_label(record),
                    local_date(record.modified_at),
                );
            }
            html
        }
    }
}

pub fn render_linked_boxes(boxes: &[BoxRecord]) -> String {
    if boxes.is_empty() {
        return empty_state("📦", "No boxes linked to this email");
    }
    let mut html = String::from("<ul class=\"box-list\">");
    for record in boxes {
        let value = match record.value {
            Some(value) if value > 0.0 => format!(" | Value: {}", format_currency(value)),
            _ => String::new(),
        };
        let _ = write!(
            html,
            "<li class=\"box-item\" data-box-id=\"{}\"><div class=\"box-name\">{}</div>\
             <div class=\"box-meta\">Pipeline: {} | Stage: {}{value}</div></li>",
            record.id,
            escape_html(&record.title),
            record.pipeline_id,
            record.stage_id,
        );
    }
    html.push_str("</ul>");
    html
}

fn activity_item(activity: &Activity) -> String {
    let when = activity
        .created_at
        .map(local_datetime)
        .unwrap_or_default();
    format!(
        "<div class=\"activity-item\"><div class=\"activity-date\">{when}</div>\
         <div class=\"activity-text\"><strong>{}</strong> {}: {}</div></div>",
        escape_html(activity.author.as_deref().unwrap_or("Unknown")),
        escape_html(activity.kind.as_wire()),
        escape_html(&activity.text),
    )
}

pub fn render_activity_feed(activities: &[Activity]) -> String {
    if activities.is_empty() {
        return empty_state("📊", "No recent activity");
    }
    activities.iter().map(activity_item).collect()
}

pub fn render_link_modal(modal: &LinkBoxModal, pipelines: &[Pipeline]) -> String {
    if !modal.open {
        return String::new();
    }
    let mut boxes = String::from("<option value=\"\">Select box...</option>");
    for record in &modal.boxes {
        boxes.push_str(&option(
            record.id.0,
            &record.title,
            modal.selected_box == Some(record.id),
        ));
    }
    format!(
        "<div class=\"modal\" id=\"linkModal\">\
         <select id=\"linkPipelineSelect\">{}</select>\
         <select id=\"linkBoxSelect\">{boxes}</select></div>",
        render_pipeline_options(pipelines, modal.pipeline_id),
    )
}

pub fn render_create_modal(modal: &CreateBoxModal, state: &SessionState) -> String {
    if !modal.open {
        return String::new();
    }
    let form = &modal.form;
    let stages = form
        .pipeline_id
        .map(|id| render_stage_options(state.stages_for(id), form.stage_id))
        .unwrap_or_default();
    format!(
        "<div class=\"modal\" id=\"createModal\">\
         <input id=\"boxTitle\" value=\"{}\">\
         <select id=\"boxPipeline\">{}</select>\
         <select id=\"boxStage\">{stages}</select>\
         <input id=\"boxValue\" value=\"{}\">\
         <textarea id=\"boxNotes\">{}</textarea></div>",
        escape_html(&form.title),
        render_pipeline_options(&state.pipelines, form.pipeline_id),
        escape_html(&form.value),
        escape_html(&form.notes),
    )
}

fn email_link_item(link: &EmailLink) -> String {
    format!(
        "<li class=\"email-item\"><div class=\"email-subject\">{}</div>\
         <div class=\"email-meta\">{} | {}</div></li>",
        escape_html(&link.subject),
        escape_html(&link.from),
        local_date(link.date),
    )
}

pub fn render_box_detail(state: &SessionState) -> String {
    let Some(detail) = &state.box_detail else {
        return String::new();
    };
    let record = &detail.record;
    let stage = state
        .stage_title(record.pipeline_id, record.stage_id)
        .unwrap_or("Unknown Stage");
    let contact = match (record.contact_name.is_empty(), record.contact_email.is_empty()) {
        (true, true) => String::new(),
        (false, true) => escape_html(&record.contact_name),
        (true, false) => escape_html(&record.contact_email),
        (false, false) => format!(
            "{} &lt;{}&gt;",
            escape_html(&record.contact_name),
            escape_html(&record.contact_email)
        ),
    };
    let emails: String = if detail.emails.is_empty() {
        empty_state("✉", "No emails linked to this box")
    } else {
        format!(
            "<ul class=\"email-list\">{}</ul>",
            detail.emails.iter().map(email_link_item).collect::<String>()
        )
    };
    format!(
        "<div class=\"box-detail\" data-box-id=\"{}\"><h2>{}</h2>\
         <div class=\"box-meta\"><span class=\"stage-badge\">{}</span> | {} | {contact}</div>\
         <div class=\"box-notes\">{}</div>{emails}<div class=\"activity-list\">{}</div></div>",
        record.id,
        escape_html(&record.title),
        escape_html(stage),
        box_value_label(record),
        escape_html(&record.notes),
        render_activity_feed(&detail.activities),
    )
}

pub fn render_notices<'a>(notices: impl IntoIterator<Item = &'a Notice>) -> String {
    notices
        .into_iter()
        .map(|notice| {
            let class = match notice.kind {
                NoticeKind::Error => "error-message",
                NoticeKind::Success => "success-message",
            };
            format!("<div class=\"{class}\">{}</div>", escape_html(&notice.message))
        })
        .collect()
}

/// Whole panel: header, the active tab's regions, then any open dialog or detail view.
pub fn render_panel(state: &SessionState) -> String {
    let mut html = String::from("<div class=\"panel\">");
    html.push_str(&render_email_header(state.current_email.as_ref()));
    let _ = write!(
        html,
        "<nav class=\"tabs\" data-active=\"{}\"></nav>",
        state.active_tab.as_str()
    );
    match state.active_tab {
        Tab::Email => {
            let _ = write!(
                html,
                "<section id=\"linkedBoxesList\">{}</section>",
                render_linked_boxes(&state.linked_boxes)
            );
        }
        Tab::Boxes => {
            let _ = write!(
                html,
                "<select id=\"pipelineSelect\">{}</select><ul id=\"boxesList\">{}</ul>",
                render_pipeline_options(&state.pipelines, state.current_pipeline),
                render_box_list(state)
            );
        }
        Tab::Activity => {
            let _ = write!(
                html,
                "<section id=\"activityList\">{}</section>",
                render_activity_feed(&state.recent_activity)
            );
        }
    }
    html.push_str(&render_link_modal(&state.link_modal, &state.pipelines));
    html.push_str(&render_create_modal(&state.create_modal, state));
    html.push_str(&render_box_detail(state));
    html.push_str("</div>");
    html
}

#[cfg(test)]
#[path = "../tests/render_tests.rs"]
mod tests;
