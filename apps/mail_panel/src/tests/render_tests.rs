use chrono::{TimeZone, Utc};
use shared::domain::{
    Activity, ActivityId, ActivityType, BoxId, BoxRecord, EmailDescriptor, Pipeline, PipelineId,
    Stage, StageId,
};

use super::*;
use crate::controller::reducer::{reduce, StateChange};

fn record(title: &str, value: Option<f64>) -> BoxRecord {
    BoxRecord {
        id: BoxId(7),
        title: title.into(),
        pipeline_id: PipelineId(1),
        stage_id: StageId(11),
        value,
        contact_email: "buyer@acme.test".into(),
        contact_name: "O'Brien & Co".into(),
        notes: String::new(),
        created_at: None,
        modified_at: None,
    }
}

fn state_with_boxes(boxes: Vec<BoxRecord>) -> SessionState {
    let state = reduce(
        SessionState::default(),
        StateChange::StagesLoaded {
            pipeline_id: PipelineId(1),
            stages: vec![Stage {
                id: StageId(11),
                title: "Lead".into(),
                order: 1,
                pipeline_id: PipelineId(1),
            }],
        },
    );
    reduce(state, StateChange::BoxesLoaded(boxes))
}

#[test]
fn escapes_markup_characters() {
    assert_eq!(
        escape_html(r#"<a href="x">'&'</a>"#),
        "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;"
    );
}

#[test]
fn box_title_with_script_is_escaped() {
    let state = state_with_boxes(vec![record("<script>alert(1)</script>", None)]);
    let html = render_box_list(&state);

    assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
    assert!(!html.contains("<script>"));
    assert!(html.contains("O&#39;Brien &amp; Co | "));
}

#[test]
fn formats_currency_with_grouping() {
    assert_eq!(format_currency(1234.5), "$1,234.5");
    assert_eq!(format_currency(1_000_000.0), "$1,000,000");
    assert_eq!(format_currency(999.0), "$999");
    assert_eq!(format_currency(12.125), "$12.125");
}

#[test]
fn box_list_shows_stage_badge_and_value() {
    let mut unknown_stage = record("Beta", Some(0.0));
    unknown_stage.stage_id = StageId(99);
    let state = state_with_boxes(vec![record("Alpha", Some(2500.0)), unknown_stage]);
    let html = render_box_list(&state);

    assert!(html.contains("<span class=\"stage-badge\">Lead</span>"));
    assert!(html.contains("$2,500"));
    assert!(html.contains("Unknown Stage"));
    assert!(html.contains("No value"));
}

#[test]
fn box_list_states_render_placeholders() {
    let loading = reduce(SessionState::default(), StateChange::BoxesLoading);
    assert!(render_box_list(&loading).contains("Loading boxes..."));

    let empty = state_with_boxes(Vec::new());
    assert!(render_box_list(&empty).contains("No boxes in this pipeline"));

    let failed = reduce(SessionState::default(), StateChange::BoxesFailed);
    assert!(render_box_list(&failed).contains("Failed to load boxes."));
}

#[test]
fn linked_boxes_omit_zero_value() {
    let html = render_linked_boxes(&[record("Alpha", Some(0.0))]);
    assert!(html.contains("Pipeline: 1 | Stage: 11</div>"));
    assert!(!html.contains("Value:"));

    let html = render_linked_boxes(&[record("Alpha", Some(10.0))]);
    assert!(html.contains(" | Value: $10"));

    assert!(render_linked_boxes(&[]).contains("No boxes linked to this email"));
}

#[test]
fn email_header_falls_back_to_no_subject() {
    let email = EmailDescriptor {
        subject: "  ".into(),
        message_id: "<m1>".into(),
        from: "ann@acme.test".into(),
        from_name: "Ann <Sales>".into(),
        to: String::new(),
        date: Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap(),
    };
    let html = render_email_header(Some(&email));

    assert!(html.contains("No Subject"));
    assert!(html.contains("Ann &lt;Sales&gt; &lt;ann@acme.test&gt;"));
}

#[test]
fn activity_feed_escapes_text_and_defaults_author() {
    let activity = Activity {
        id: ActivityId(1),
        kind: ActivityType::StageChange,
        text: "<b>moved</b>".into(),
        box_id: BoxId(7),
        author: None,
        created_at: None,
    };
    let html = render_activity_feed(&[activity]);

    assert!(html.contains("<strong>Unknown</strong> Stage Change: &lt;b&gt;moved&lt;/b&gt;"));
    assert!(render_activity_feed(&[]).contains("No recent activity"));
}

#[test]
fn pipeline_options_mark_selection() {
    let pipelines = vec![
        Pipeline {
            id: PipelineId(1),
            title: "Sales".into(),
            description: String::new(),
        },
        Pipeline {
            id: PipelineId(2),
            title: "R&D".into(),
            description: String::new(),
        },
    ];
    let html = render_pipeline_options(&pipelines, Some(PipelineId(1)));

    assert!(html.contains("<option value=\"1\" selected>Sales</option>"));
    assert!(html.contains("<option value=\"2\">R&amp;D</option>"));
}

#[test]
fn notices_render_by_kind() {
    let notices = [Notice::error("<oops>"), Notice::success("done")];
    let html = render_notices(&notices);

    assert!(html.contains("<div class=\"error-message\">&lt;oops&gt;</div>"));
    assert!(html.contains("<div class=\"success-message\">done</div>"));
}
