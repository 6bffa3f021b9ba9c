//! Wire shapes of the list-store REST API: verbose JSON envelopes, list rows
//! and the write payloads posted back to the lists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::domain::{
    Activity, ActivityId, ActivityType, BoxId, BoxRecord, EmailLink, EmailLinkId, Pipeline,
    PipelineId, Stage, StageId,
};

/// Maximum length of the `Title` column on every list.
pub const TITLE_MAX_CHARS: usize = 255;

pub const PIPELINE_FIELDS: &[&str] = &["ID", "Title", "Description", "Created", "Modified"];
pub const STAGE_FIELDS: &[&str] = &["ID", "Title", "StageOrder", "PipelineId"];
pub const BOX_FIELDS: &[&str] = &[
    "ID",
    "Title",
    "PipelineId",
    "StageId",
    "BoxValue",
    "ContactEmail",
    "ContactName",
    "Notes",
    "Created",
    "Modified",
];
pub const EMAIL_FIELDS: &[&str] = &[
    "ID",
    "Title",
    "EmailSubject",
    "EmailFrom",
    "EmailTo",
    "EmailDate",
    "EmailMessageId",
    "BoxId",
    "Created",
];
pub const EMAIL_BOX_REF_FIELDS: &[&str] = &["ID", "BoxId"];
pub const ACTIVITY_FIELDS: &[&str] = &[
    "ID",
    "Title",
    "ActivityType",
    "ActivityText",
    "BoxId",
    "Created",
    "Author/Title",
];

/// Cuts `text` to the list title limit on a character boundary.
pub fn truncate_title(text: &str) -> String {
    text.chars().take(TITLE_MAX_CHARS).collect()
}

/// `{"d": ...}` wrapper around every verbose response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub d: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection<T> {
    pub results: Vec<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContextInfo {
    pub get_context_web_information: WebInformation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WebInformation {
    pub form_digest_value: String,
    #[serde(default)]
    pub form_digest_timeout_seconds: Option<i64>,
}

/// Number columns come back as floats, integers or strings depending on the
/// list configuration.
fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok().map(|f| f.round() as i64),
        _ => None,
    })
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PipelineRow {
    #[serde(rename = "ID")]
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl PipelineRow {
    pub fn into_domain(self) -> Pipeline {
        Pipeline {
            id: PipelineId(self.id),
            title: self.title.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StageRow {
    #[serde(rename = "ID")]
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub stage_order: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub pipeline_id: Option<i64>,
}

impl StageRow {
    pub fn into_domain(self) -> Stage {
        Stage {
            id: StageId(self.id),
            title: self.title.unwrap_or_default(),
            order: self.stage_order.unwrap_or_default(),
            pipeline_id: PipelineId(self.pipeline_id.unwrap_or_default()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BoxRow {
    #[serde(rename = "ID")]
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub pipeline_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub stage_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub box_value: Option<f64>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub contact_name: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub modified: Option<DateTime<Utc>>,
}

impl BoxRow {
    pub fn into_domain(self) -> BoxRecord {
        BoxRecord {
            id: BoxId(self.id),
            title: self.title.unwrap_or_default(),
            pipeline_id: PipelineId(self.pipeline_id.unwrap_or_default()),
            stage_id: StageId(self.stage_id.unwrap_or_default()),
            value: self.box_value,
            contact_email: self.contact_email.unwrap_or_default(),
            contact_name: self.contact_name.unwrap_or_default(),
            notes: self.notes.unwrap_or_default(),
            created_at: self.created,
            modified_at: self.modified,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EmailRow {
    #[serde(rename = "ID")]
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub email_subject: Option<String>,
    #[serde(default)]
    pub email_from: Option<String>,
    #[serde(default)]
    pub email_to: Option<String>,
    #[serde(default)]
    pub email_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub email_message_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub box_id: Option<i64>,
}

impl EmailRow {
    pub fn into_domain(self) -> EmailLink {
        // Rows fetched with a narrow $select only carry ID and BoxId; fall back
        // to the truncated title when the full subject was not selected.
        let subject = self.email_subject.or(self.title).unwrap_or_default();
        EmailLink {
            id: EmailLinkId(self.id),
            subject,
            from: self.email_from.unwrap_or_default(),
            to: self.email_to.unwrap_or_default(),
            date: self.email_date,
            message_id: self.email_message_id.unwrap_or_default(),
            box_id: BoxId(self.box_id.unwrap_or_default()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AuthorRef {
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ActivityRow {
    #[serde(rename = "ID")]
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub activity_type: Option<String>,
    #[serde(default)]
    pub activity_text: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub box_id: Option<i64>,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub author: Option<AuthorRef>,
}

impl ActivityRow {
    /// Unrecognized activity types are read as notes.
    pub fn into_domain(self) -> Activity {
        let kind = self
            .activity_type
            .as_deref()
            .and_then(ActivityType::from_wire)
            .unwrap_or(ActivityType::Note);
        Activity {
            id: ActivityId(self.id),
            kind,
            text: self.activity_text.or(self.title).unwrap_or_default(),
            box_id: BoxId(self.box_id.unwrap_or_default()),
            author: self.author.and_then(|author| author.title),
            created_at: self.created,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemMetadata {
    #[serde(rename = "type")]
    pub kind: String,
}

impl ItemMetadata {
    /// Entity type name the list store expects for items of `list`.
    pub fn for_list(list: &str) -> Self {
        let compact: String = list.chars().filter(|c| !c.is_whitespace()).collect();
        Self {
            kind: format!("SP.Data.{compact}ListItem"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct NewPipelinePayload {
    #[serde(rename = "__metadata")]
    pub metadata: ItemMetadata,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct NewStagePayload {
    #[serde(rename = "__metadata")]
    pub metadata: ItemMetadata,
    pub title: String,
    pub pipeline_id: i64,
    pub stage_order: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct NewBoxPayload {
    #[serde(rename = "__metadata")]
    pub metadata: ItemMetadata,
    pub title: String,
    pub pipeline_id: i64,
    pub stage_id: i64,
    pub box_value: f64,
    pub contact_email: String,
    pub contact_name: String,
    pub notes: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BoxMergePayload {
    #[serde(rename = "__metadata")]
    pub metadata: ItemMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub box_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct NewEmailLinkPayload {
    #[serde(rename = "__metadata")]
    pub metadata: ItemMetadata,
    pub title: String,
    pub email_subject: String,
    pub email_from: String,
    pub email_to: String,
    pub email_date: DateTime<Utc>,
    pub email_message_id: String,
    pub box_id: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct NewActivityPayload {
    #[serde(rename = "__metadata")]
    pub metadata: ItemMetadata,
    pub title: String,
    pub activity_type: String,
    pub activity_text: String,
    pub box_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColumnKind {
    SingleLineText,
    MultiLineText,
    Number,
    Currency,
    DateTime,
    Choice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub kind: ColumnKind,
}

const fn column(name: &'static str, kind: ColumnKind) -> ColumnSpec {
    ColumnSpec { name, kind }
}

pub const PIPELINE_COLUMNS: &[ColumnSpec] = &[
    column("Title", ColumnKind::SingleLineText),
    column("Description", ColumnKind::MultiLineText),
];

pub const STAGE_COLUMNS: &[ColumnSpec] = &[
    column("Title", ColumnKind::SingleLineText),
    column("PipelineId", ColumnKind::Number),
    column("StageOrder", ColumnKind::Number),
];

pub const BOX_COLUMNS: &[ColumnSpec] = &[
    column("Title", ColumnKind::SingleLineText),
    column("PipelineId", ColumnKind::Number),
    column("StageId", ColumnKind::Number),
    column("BoxValue", ColumnKind::Currency),
    column("ContactEmail", ColumnKind::SingleLineText),
    column("ContactName", ColumnKind::SingleLineText),
    column("Notes", ColumnKind::MultiLineText),
];

pub const EMAIL_COLUMNS: &[ColumnSpec] = &[
    column("Title", ColumnKind::SingleLineText),
    column("EmailSubject", ColumnKind::MultiLineText),
    column("EmailFrom", ColumnKind::SingleLineText),
    column("EmailTo", ColumnKind::MultiLineText),
    column("EmailDate", ColumnKind::DateTime),
    column("EmailMessageId", ColumnKind::SingleLineText),
    column("BoxId", ColumnKind::Number),
];

pub const ACTIVITY_COLUMNS: &[ColumnSpec] = &[
    column("Title", ColumnKind::SingleLineText),
    column("ActivityType", ColumnKind::Choice),
    column("ActivityText", ColumnKind::MultiLineText),
    column("BoxId", ColumnKind::Number),
];

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
