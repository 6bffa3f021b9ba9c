//! Adapter from the mail host's item shape to an [`EmailDescriptor`].

use std::path::PathBuf;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use shared::domain::EmailDescriptor;

const UNKNOWN_SENDER: &str = "Unknown";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailAddressDetails {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email_address: Option<String>,
}

/// Active message as exposed by the mail host.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailItem {
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub internet_message_id: Option<String>,
    #[serde(default)]
    pub item_id: Option<String>,
    #[serde(default)]
    pub from: Option<EmailAddressDetails>,
    #[serde(default)]
    pub to: Vec<EmailAddressDetails>,
    #[serde(default)]
    pub date_time_created: Option<DateTime<Utc>>,
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

impl MailItem {
    pub fn to_descriptor(&self, now: DateTime<Utc>) -> EmailDescriptor {
        let message_id = non_empty(self.internet_message_id.as_ref())
            .or_else(|| non_empty(self.item_id.as_ref()))
            .unwrap_or_default()
            .to_string();
        let from = self.from.as_ref();
        EmailDescriptor {
            subject: self.subject.clone().unwrap_or_default(),
            message_id,
            from: from
                .and_then(|f| non_empty(f.email_address.as_ref()))
                .unwrap_or(UNKNOWN_SENDER)
                .to_string(),
            from_name: from
                .and_then(|f| non_empty(f.display_name.as_ref()))
                .unwrap_or(UNKNOWN_SENDER)
                .to_string(),
            to: self
                .to
                .iter()
                .filter_map(|r| non_empty(r.email_address.as_ref()))
                .collect::<Vec<_>>()
                .join(", "),
            date: self.date_time_created.unwrap_or(now),
        }
    }
}

/// Source of the currently open message, if any.
pub trait MailboxHost {
    fn current_item(&self) -> anyhow::Result<Option<MailItem>>;
}

/// Reads the open message from a JSON file shaped like the host item.
#[derive(Debug, Clone)]
pub struct FileMailbox {
    path: PathBuf,
}

impl FileMailbox {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl MailboxHost for FileMailbox {
    fn current_item(&self) -> anyhow::Result<Option<MailItem>> {
        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read mail item {}", self.path.display()))?;
        let item = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse mail item {}", self.path.display()))?;
        Ok(Some(item))
    }
}

pub fn load_email(
    host: &dyn MailboxHost,
    now: DateTime<Utc>,
) -> anyhow::Result<Option<EmailDescriptor>> {
    let item = host.current_item()?;
    if item.is_none() {
        tracing::warn!("no mail item is open; the email tab stays empty");
    }
    Ok(item.map(|item| item.to_descriptor(now)))
}

#[cfg(test)]
#[path = "tests/mailbox_tests.rs"]
mod tests;
