use std::collections::HashSet;

use async_trait::async_trait;
use reqwest::{
    header::{ACCEPT, CONTENT_TYPE, IF_MATCH},
    Client, Response, StatusCode,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use shared::{
    domain::{
        Activity, ActivityType, BoxId, BoxRecord, BoxUpdate, EmailDescriptor, EmailLink, NewBox,
        Pipeline, PipelineId, Stage, StageId,
    },
    protocol::{
        truncate_title, ActivityRow, BoxMergePayload, BoxRow, Collection, ColumnSpec, ContextInfo,
        EmailRow, Envelope, ItemMetadata, NewActivityPayload, NewBoxPayload, NewEmailLinkPayload,
        NewPipelinePayload, NewStagePayload, PipelineRow, StageRow, ACTIVITY_COLUMNS,
        ACTIVITY_FIELDS, BOX_COLUMNS, BOX_FIELDS, EMAIL_BOX_REF_FIELDS, EMAIL_COLUMNS,
        EMAIL_FIELDS, PIPELINE_COLUMNS, PIPELINE_FIELDS, STAGE_COLUMNS, STAGE_FIELDS,
        TITLE_MAX_CHARS,
    },
};
use tracing::{debug, info, warn};
use url::Url;

pub mod error;
pub mod query;

pub use error::{StoreError, StoreResult};
use query::{Filter, ItemQuery, OrderBy};

const VERBOSE_JSON: &str = "application/json;odata=verbose";
const DIGEST_HEADER: &str = "X-RequestDigest";
const METHOD_OVERRIDE_HEADER: &str = "X-HTTP-Method";

/// Titles of the five lists backing the CRM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListNames {
    pub pipelines: String,
    pub boxes: String,
    pub emails: String,
    pub activities: String,
    pub stages: String,
}

impl Default for ListNames {
    fn default() -> Self {
        Self {
            pipelines: "CRM_Pipelines".into(),
            boxes: "CRM_Boxes".into(),
            emails: "CRM_Emails".into(),
            activities: "CRM_Activities".into(),
            stages: "CRM_Stages".into(),
        }
    }
}

/// Provisioning description of one list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListSchema {
    pub list: String,
    pub columns: &'static [ColumnSpec],
    pub choices: Vec<&'static str>,
}

/// Typed CRM operations over the list store.
#[async_trait]
pub trait ListStore: Send + Sync {
    /// Pipelines ordered by title.
    async fn list_pipelines(&self) -> StoreResult<Vec<Pipeline>>;
    async fn create_pipeline(&self, title: &str, description: &str) -> StoreResult<Pipeline>;
    /// Stages of one pipeline, ascending by order.
    async fn list_stages(&self, pipeline_id: PipelineId) -> StoreResult<Vec<Stage>>;
    async fn create_stage(
        &self,
        pipeline_id: PipelineId,
        title: &str,
        order: i64,
    ) -> StoreResult<Stage>;
    /// Boxes of one pipeline, most recently modified first.
    async fn list_boxes(&self, pipeline_id: PipelineId) -> StoreResult<Vec<BoxRecord>>;
    async fn get_box(&self, box_id: BoxId) -> StoreResult<BoxRecord>;
    async fn create_box(&self, fields: NewBox) -> StoreResult<BoxRecord>;
    /// Writes only the `Some` fields of `update`.
    async fn update_box(&self, box_id: BoxId, update: BoxUpdate) -> StoreResult<()>;
    async fn link_email(&self, email: &EmailDescriptor, box_id: BoxId) -> StoreResult<EmailLink>;
    async fn list_email_links_for_box(&self, box_id: BoxId) -> StoreResult<Vec<EmailLink>>;
    /// Distinct boxes linked to a message. A box that fails to load is skipped.
    async fn find_boxes_by_email_message_id(&self, message_id: &str)
        -> StoreResult<Vec<BoxRecord>>;
    /// Activity history of one box, newest first.
    async fn list_activities_for_box(&self, box_id: BoxId) -> StoreResult<Vec<Activity>>;
    /// Newest activities across all boxes, at most `limit` entries.
    async fn recent_activities(&self, limit: usize) -> StoreResult<Vec<Activity>>;
    async fn create_activity(
        &self,
        box_id: BoxId,
        kind: ActivityType,
        text: &str,
    ) -> StoreResult<Activity>;
}

/// Checks the create-box fields and resolves the defaults.
pub fn validate_new_box(fields: &NewBox) -> StoreResult<(PipelineId, StageId, f64)> {
    check_title("box", &fields.title)?;
    let pipeline_id = fields
        .pipeline_id
        .filter(|id| id.is_valid())
        .ok_or_else(|| StoreError::validation("a pipeline must be selected"))?;
    let stage_id = fields
        .stage_id
        .filter(|id| id.is_valid())
        .ok_or_else(|| StoreError::validation("a stage must be selected"))?;
    let value = fields.value.unwrap_or(0.0);
    if !value.is_finite() || value < 0.0 {
        return Err(StoreError::validation(
            "box value must be a non-negative number",
        ));
    }
    Ok((pipeline_id, stage_id, value))
}

/// Titles are stored as given; blank or over-long titles are rejected.
fn check_title(kind: &str, title: &str) -> StoreResult<()> {
    if title.trim().is_empty() {
        return Err(StoreError::validation(format!("{kind} title must not be empty")));
    }
    if title.chars().count() > TITLE_MAX_CHARS {
        return Err(StoreError::validation(format!(
            "{kind} title must be at most {TITLE_MAX_CHARS} characters"
        )));
    }
    Ok(())
}

fn require_box_id(box_id: BoxId) -> StoreResult<()> {
    if box_id.is_valid() {
        Ok(())
    } else {
        Err(StoreError::validation(format!("invalid box id {box_id}")))
    }
}

#[derive(Clone)]
pub struct ListStoreClient {
    http: Client,
    site_url: String,
    lists: ListNames,
}

impl ListStoreClient {
    pub fn new(site_url: impl Into<String>, lists: ListNames) -> StoreResult<Self> {
        Self::with_http_client(Client::new(), site_url, lists)
    }

    pub fn with_http_client(
        http: Client,
        site_url: impl Into<String>,
        lists: ListNames,
    ) -> StoreResult<Self> {
        let site_url = site_url.into().trim().trim_end_matches('/').to_string();
        Url::parse(&site_url)
            .map_err(|e| StoreError::validation(format!("invalid site url {site_url:?}: {e}")))?;
        Ok(Self {
            http,
            site_url,
            lists,
        })
    }

    pub fn site_url(&self) -> &str {
        &self.site_url
    }

    pub fn lists(&self) -> &ListNames {
        &self.lists
    }

    pub fn describe_schema(&self) -> Vec<ListSchema> {
        vec![
            ListSchema {
                list: self.lists.pipelines.clone(),
                columns: PIPELINE_COLUMNS,
                choices: Vec::new(),
            },
            ListSchema {
                list: self.lists.stages.clone(),
                columns: STAGE_COLUMNS,
                choices: Vec::new(),
            },
            ListSchema {
                list: self.lists.boxes.clone(),
                columns: BOX_COLUMNS,
                choices: Vec::new(),
            },
            ListSchema {
                list: self.lists.emails.clone(),
                columns: EMAIL_COLUMNS,
                choices: Vec::new(),
            },
            ListSchema {
                list: self.lists.activities.clone(),
                columns: ACTIVITY_COLUMNS,
                choices: ActivityType::ALL.iter().map(|kind| kind.as_wire()).collect(),
            },
        ]
    }

    fn items_url(&self, list: &str) -> String {
        format!(
            "{}/_api/web/lists/getByTitle('{}')/items",
            self.site_url,
            list.replace('\'', "''")
        )
    }

    fn item_url(&self, list: &str, id: i64) -> String {
        format!("{}({id})", self.items_url(list))
    }

    /// Fetches a fresh form digest. Never cached: every write asks again.
    async fn request_digest(&self) -> StoreResult<String> {
        const OPERATION: &str = "request_digest";
        let response = self
            .http
            .post(format!("{}/_api/contextinfo", self.site_url))
            .header(ACCEPT, VERBOSE_JSON)
            .body("")
            .send()
            .await
            .map_err(|e| StoreError::transport(OPERATION, e))?;
        let info: ContextInfo = read_envelope(OPERATION, response).await?;
        Ok(info.get_context_web_information.form_digest_value)
    }

    async fn get_rows<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        list: &str,
        query: &ItemQuery,
    ) -> StoreResult<Vec<T>> {
        debug!(operation, list, "list-store read");
        let response = self
            .http
            .get(self.items_url(list))
            .query(&query.to_pairs())
            .header(ACCEPT, VERBOSE_JSON)
            .send()
            .await
            .map_err(|e| StoreError::transport(operation, e))?;
        let collection: Collection<T> = read_envelope(operation, response).await?;
        Ok(collection.results)
    }

    /// `Ok(None)` when the item does not exist.
    async fn get_row<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        list: &str,
        id: i64,
        query: &ItemQuery,
    ) -> StoreResult<Option<T>> {
        debug!(operation, list, id, "list-store read");
        let response = self
            .http
            .get(self.item_url(list, id))
            .query(&query.to_pairs())
            .header(ACCEPT, VERBOSE_JSON)
            .send()
            .await
            .map_err(|e| StoreError::transport(operation, e))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        read_envelope(operation, response).await.map(Some)
    }

    async fn post_item<P: Serialize + Sync, T: DeserializeOwned>(
        &self,
        operation: &'static str,
        list: &str,
        payload: &P,
    ) -> StoreResult<T> {
        let digest = self.request_digest().await?;
        info!(operation, list, "list-store write");
        let response = self
            .http
            .post(self.items_url(list))
            .header(ACCEPT, VERBOSE_JSON)
            .header(CONTENT_TYPE, VERBOSE_JSON)
            .header(DIGEST_HEADER, digest)
            .json(payload)
            .send()
            .await
            .map_err(|e| StoreError::transport(operation, e))?;
        read_envelope(operation, response).await
    }

    async fn merge_item<P: Serialize + Sync>(
        &self,
        operation: &'static str,
        list: &str,
        id: i64,
        payload: &P,
    ) -> StoreResult<()> {
        let digest = self.request_digest().await?;
        info!(operation, list, id, "list-store merge");
        let response = self
            .http
            .post(self.item_url(list, id))
            .header(ACCEPT, VERBOSE_JSON)
            .header(CONTENT_TYPE, VERBOSE_JSON)
            .header(DIGEST_HEADER, digest)
            .header(IF_MATCH, "*")
            .header(METHOD_OVERRIDE_HEADER, "MERGE")
            .json(payload)
            .send()
            .await
            .map_err(|e| StoreError::transport(operation, e))?;
        ensure_success(operation, response).await.map(|_| ())
    }

    async fn fetch_activities(
        &self,
        operation: &'static str,
        filter: Option<Filter>,
    ) -> StoreResult<Vec<Activity>> {
        let mut query = ItemQuery::new()
            .select(ACTIVITY_FIELDS)
            .expand("Author")
            .order_by(OrderBy::desc("Created"));
        if let Some(filter) = filter {
            query = query.filter(filter);
        }
        let rows: Vec<ActivityRow> = self
            .get_rows(operation, &self.lists.activities, &query)
            .await?;
        let mut activities: Vec<Activity> = rows
            .into_iter()
            .map(|row| {
                if let Some(raw) = row.activity_type.as_deref() {
                    if ActivityType::from_wire(raw).is_none() {
                        warn!(activity_id = row.id, activity_type = raw, "unknown activity type");
                    }
                }
                row.into_domain()
            })
            .collect();
        activities.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(activities)
    }
}

async fn ensure_success(operation: &'static str, response: Response) -> StoreResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    warn!(operation, status = status.as_u16(), "list-store request rejected");
    Err(StoreError::Status {
        operation,
        status: status.as_u16(),
        body,
    })
}

async fn read_envelope<T: DeserializeOwned>(
    operation: &'static str,
    response: Response,
) -> StoreResult<T> {
    let response = ensure_success(operation, response).await?;
    let bytes = response
        .bytes()
        .await
        .map_err(|e| StoreError::transport(operation, e))?;
    let envelope: Envelope<T> =
        serde_json::from_slice(&bytes).map_err(|e| StoreError::malformed(operation, e))?;
    Ok(envelope.d)
}

#[async_trait]
impl ListStore for ListStoreClient {
    async fn list_pipelines(&self) -> StoreResult<Vec<Pipeline>> {
        let query = ItemQuery::new()
            .select(PIPELINE_FIELDS)
            .order_by(OrderBy::asc("Title"));
        let rows: Vec<PipelineRow> = self
            .get_rows("list_pipelines", &self.lists.pipelines, &query)
            .await?;
        Ok(rows.into_iter().map(PipelineRow::into_domain).collect())
    }

    async fn create_pipeline(&self, title: &str, description: &str) -> StoreResult<Pipeline> {
        check_title("pipeline", title)?;
        let payload = NewPipelinePayload {
            metadata: ItemMetadata::for_list(&self.lists.pipelines),
            title: title.to_string(),
            description: description.to_string(),
        };
        let row: PipelineRow = self
            .post_item("create_pipeline", &self.lists.pipelines, &payload)
            .await?;
        Ok(row.into_domain())
    }

    async fn list_stages(&self, pipeline_id: PipelineId) -> StoreResult<Vec<Stage>> {
        let query = ItemQuery::new()
            .select(STAGE_FIELDS)
            .filter(Filter::eq("PipelineId", pipeline_id))
            .order_by(OrderBy::asc("StageOrder"));
        let rows: Vec<StageRow> = self
            .get_rows("list_stages", &self.lists.stages, &query)
            .await?;
        let mut stages: Vec<Stage> = rows.into_iter().map(StageRow::into_domain).collect();
        stages.sort_by_key(|stage| stage.order);
        Ok(stages)
    }

    async fn create_stage(
        &self,
        pipeline_id: PipelineId,
        title: &str,
        order: i64,
    ) -> StoreResult<Stage> {
        if !pipeline_id.is_valid() {
            return Err(StoreError::validation(format!(
                "invalid pipeline id {pipeline_id}"
            )));
        }
        check_title("stage", title)?;
        let payload = NewStagePayload {
            metadata: ItemMetadata::for_list(&self.lists.stages),
            title: title.to_string(),
            pipeline_id: pipeline_id.0,
            stage_order: order,
        };
        let row: StageRow = self
            .post_item("create_stage", &self.lists.stages, &payload)
            .await?;
        Ok(row.into_domain())
    }

    async fn list_boxes(&self, pipeline_id: PipelineId) -> StoreResult<Vec<BoxRecord>> {
        let query = ItemQuery::new()
            .select(BOX_FIELDS)
            .filter(Filter::eq("PipelineId", pipeline_id))
            .order_by(OrderBy::desc("Modified"));
        let rows: Vec<BoxRow> = self
            .get_rows("list_boxes", &self.lists.boxes, &query)
            .await?;
        let mut boxes: Vec<BoxRecord> = rows.into_iter().map(BoxRow::into_domain).collect();
        boxes.sort_by(|a, b| b.modified_at.cmp(&a.modified_at));
        Ok(boxes)
    }

    async fn get_box(&self, box_id: BoxId) -> StoreResult<BoxRecord> {
        require_box_id(box_id)?;
        let query = ItemQuery::new().select(BOX_FIELDS);
        let row: Option<BoxRow> = self
            .get_row("get_box", &self.lists.boxes, box_id.0, &query)
            .await?;
        row.map(BoxRow::into_domain)
            .ok_or_else(|| StoreError::NotFound {
                list: self.lists.boxes.clone(),
                id: box_id.0,
            })
    }

    async fn create_box(&self, fields: NewBox) -> StoreResult<BoxRecord> {
        let (pipeline_id, stage_id, value) = validate_new_box(&fields)?;
        let payload = NewBoxPayload {
            metadata: ItemMetadata::for_list(&self.lists.boxes),
            title: fields.title,
            pipeline_id: pipeline_id.0,
            stage_id: stage_id.0,
            box_value: value,
            contact_email: fields.contact_email,
            contact_name: fields.contact_name,
            notes: fields.notes,
        };
        let row: BoxRow = self
            .post_item("create_box", &self.lists.boxes, &payload)
            .await?;
        let created = row.into_domain();
        info!(box_id = created.id.0, pipeline_id = pipeline_id.0, "box created");
        Ok(created)
    }

    async fn update_box(&self, box_id: BoxId, update: BoxUpdate) -> StoreResult<()> {
        require_box_id(box_id)?;
        if let Some(title) = &update.title {
            check_title("box", title)?;
        }
        if let Some(value) = update.value {
            if !value.is_finite() || value < 0.0 {
                return Err(StoreError::validation(
                    "box value must be a non-negative number",
                ));
            }
        }
        if update.is_empty() {
            debug!(box_id = box_id.0, "empty box update skipped");
            return Ok(());
        }
        let payload = BoxMergePayload {
            metadata: ItemMetadata::for_list(&self.lists.boxes),
            title: update.title,
            stage_id: update.stage_id.map(|id| id.0),
            box_value: update.value,
            contact_email: update.contact_email,
            contact_name: update.contact_name,
            notes: update.notes,
        };
        self.merge_item("update_box", &self.lists.boxes, box_id.0, &payload)
            .await
    }

    async fn link_email(&self, email: &EmailDescriptor, box_id: BoxId) -> StoreResult<EmailLink> {
        require_box_id(box_id)?;
        let payload = NewEmailLinkPayload {
            metadata: ItemMetadata::for_list(&self.lists.emails),
            title: truncate_title(&email.subject),
            email_subject: email.subject.clone(),
            email_from: email.from.clone(),
            email_to: email.to.clone(),
            email_date: email.date,
            email_message_id: email.message_id.clone(),
            box_id: box_id.0,
        };
        let row: EmailRow = self
            .post_item("link_email", &self.lists.emails, &payload)
            .await?;
        Ok(row.into_domain())
    }

    async fn list_email_links_for_box(&self, box_id: BoxId) -> StoreResult<Vec<EmailLink>> {
        require_box_id(box_id)?;
        let query = ItemQuery::new()
            .select(EMAIL_FIELDS)
            .filter(Filter::eq("BoxId", box_id))
            .order_by(OrderBy::desc("EmailDate"));
        let rows: Vec<EmailRow> = self
            .get_rows("list_email_links_for_box", &self.lists.emails, &query)
            .await?;
        let mut links: Vec<EmailLink> = rows.into_iter().map(EmailRow::into_domain).collect();
        links.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(links)
    }

    async fn find_boxes_by_email_message_id(
        &self,
        message_id: &str,
    ) -> StoreResult<Vec<BoxRecord>> {
        if message_id.is_empty() {
            return Ok(Vec::new());
        }
        let query = ItemQuery::new()
            .select(EMAIL_BOX_REF_FIELDS)
            .filter(Filter::eq("EmailMessageId", message_id));
        let rows: Vec<EmailRow> = self
            .get_rows(
                "find_boxes_by_email_message_id",
                &self.lists.emails,
                &query,
            )
            .await?;

        let mut seen = HashSet::new();
        let box_ids: Vec<BoxId> = rows
            .into_iter()
            .filter_map(|row| row.box_id.map(BoxId))
            .filter(|id| seen.insert(*id))
            .collect();

        let mut boxes = Vec::with_capacity(box_ids.len());
        for box_id in box_ids {
            match self.get_box(box_id).await {
                Ok(record) => boxes.push(record),
                Err(err) => warn!(box_id = box_id.0, "skipping linked box: {err}"),
            }
        }
        Ok(boxes)
    }

    async fn list_activities_for_box(&self, box_id: BoxId) -> StoreResult<Vec<Activity>> {
        require_box_id(box_id)?;
        self.fetch_activities("list_activities_for_box", Some(Filter::eq("BoxId", box_id)))
            .await
    }

    async fn recent_activities(&self, limit: usize) -> StoreResult<Vec<Activity>> {
        let mut activities = self.fetch_activities("recent_activities", None).await?;
        activities.truncate(limit);
        Ok(activities)
    }

    async fn create_activity(
        &self,
        box_id: BoxId,
        kind: ActivityType,
        text: &str,
    ) -> StoreResult<Activity> {
        require_box_id(box_id)?;
        let payload = NewActivityPayload {
            metadata: ItemMetadata::for_list(&self.lists.activities),
            title: truncate_title(text),
            activity_type: kind.as_wire().to_string(),
            activity_text: text.to_string(),
            box_id: box_id.0,
        };
        let row: ActivityRow = self
            .post_item("create_activity", &self.lists.activities, &payload)
            .await?;
        Ok(row.into_domain())
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
