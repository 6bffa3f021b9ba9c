use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl $name {
            /// List-store item ids start at 1; zero or negative means "nothing selected".
            pub fn is_valid(self) -> bool {
                self.0 > 0
            }
        }
    };
}

id_newtype!(PipelineId);
id_newtype!(StageId);
id_newtype!(BoxId);
id_newtype!(EmailLinkId);
id_newtype!(ActivityId);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: PipelineId,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    pub id: StageId,
    pub title: String,
    pub order: i64,
    pub pipeline_id: PipelineId,
}

/// A deal tracked through the stages of one pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxRecord {
    pub id: BoxId,
    pub title: String,
    pub pipeline_id: PipelineId,
    pub stage_id: StageId,
    pub value: Option<f64>,
    pub contact_email: String,
    pub contact_name: String,
    pub notes: String,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
}

impl BoxRecord {
    pub fn value_or_zero(&self) -> f64 {
        self.value.unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailLink {
    pub id: EmailLinkId,
    pub subject: String,
    pub from: String,
    pub to: String,
    pub date: Option<DateTime<Utc>>,
    pub message_id: String,
    pub box_id: BoxId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivityType {
    Email,
    Note,
    #[serde(rename = "Stage Change")]
    StageChange,
    Created,
    Updated,
}

impl ActivityType {
    pub const ALL: [ActivityType; 5] = [
        ActivityType::Email,
        ActivityType::Note,
        ActivityType::StageChange,
        ActivityType::Created,
        ActivityType::Updated,
    ];

    /// Choice value stored in the activities list.
    pub fn as_wire(self) -> &'static str {
        match self {
            ActivityType::Email => "Email",
            ActivityType::Note => "Note",
            ActivityType::StageChange => "Stage Change",
            ActivityType::Created => "Created",
            ActivityType::Updated => "Updated",
        }
    }

    pub fn from_wire(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL.into_iter().find(|kind| {
            kind.as_wire().eq_ignore_ascii_case(value)
                || (*kind == ActivityType::StageChange && value.eq_ignore_ascii_case("StageChange"))
        })
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: ActivityId,
    pub kind: ActivityType,
    pub text: String,
    pub box_id: BoxId,
    pub author: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Metadata of the message currently open in the mail host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailDescriptor {
    pub subject: String,
    pub message_id: String,
    pub from: String,
    pub from_name: String,
    pub to: String,
    pub date: DateTime<Utc>,
}

/// Fields accepted when creating a box. `value` falls back to zero.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewBox {
    pub title: String,
    pub pipeline_id: Option<PipelineId>,
    pub stage_id: Option<StageId>,
    pub value: Option<f64>,
    pub contact_email: String,
    pub contact_name: String,
    pub notes: String,
}

/// Partial update: only `Some` fields are written.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoxUpdate {
    pub title: Option<String>,
    pub stage_id: Option<StageId>,
    pub value: Option<f64>,
    pub contact_email: Option<String>,
    pub contact_name: Option<String>,
    pub notes: Option<String>,
}

impl BoxUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.stage_id.is_none()
            && self.value.is_none()
            && self.contact_email.is_none()
            && self.contact_name.is_none()
            && self.notes.is_none()
    }
}
