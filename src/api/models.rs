//! Wire payloads and the validated domain records built from them.
//!
//! Server JSON is first read into loose `Raw*` structs, then converted with
//! `TryFrom` so that nothing half-formed reaches view state.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

use crate::api::error::{ApiError, ApiResult};

/// `{code, message, data}` wrapper used by every endpoint.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    pub code: u16,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportStatus {
    Pending,
    UnderReview,
    Resolved,
    Escalated,
    Rejected,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "pending",
            ReportStatus::UnderReview => "underReview",
            ReportStatus::Resolved => "resolved",
            ReportStatus::Escalated => "escalated",
            ReportStatus::Rejected => "rejected",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "Pending",
            ReportStatus::UnderReview => "Under review",
            ReportStatus::Resolved => "Resolved",
            ReportStatus::Escalated => "Escalated",
            ReportStatus::Rejected => "Rejected",
        }
    }

    /// Composing and deleting are only open while a report is pending.
    pub fn is_open(&self) -> bool {
        matches!(self, ReportStatus::Pending)
    }
}

impl FromStr for ReportStatus {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReportStatus::Pending),
            "underReview" | "under_review" => Ok(ReportStatus::UnderReview),
            "resolved" => Ok(ReportStatus::Resolved),
            "escalated" => Ok(ReportStatus::Escalated),
            "rejected" => Ok(ReportStatus::Rejected),
            other => Err(ApiError::invalid_payload(format!("unknown report status `{other}`"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Text,
    Image,
    File,
    Voice,
    Unknown,
}

impl MessageKind {
    fn parse(raw: Option<&str>) -> Self {
        match raw {
            None | Some("text") => MessageKind::Text,
            Some("image") => MessageKind::Image,
            Some("file") => MessageKind::File,
            Some("voice") => MessageKind::Voice,
            Some(_) => MessageKind::Unknown,
        }
    }
}

/// A user or admin embedded in another record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    pub id: String,
    pub name: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: String,
    pub sender_id: String,
    pub sender_name: Option<String>,
    pub sender_role: Option<String>,
    pub text: String,
    pub kind: MessageKind,
    pub attachments: Vec<String>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Only live text messages are shown in the conversation.
    pub fn is_displayable(&self) -> bool {
        !self.is_deleted && self.kind == MessageKind::Text
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub current_page: u32,
    pub total_pages: u32,
}

#[derive(Debug, Clone)]
pub struct MessagePage {
    pub items: Vec<Message>,
    pub meta: PageMeta,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub id: String,
    pub status: ReportStatus,
    pub booking_id: Option<String>,
    pub reporter: Option<Party>,
    pub subject: Option<String>,
    pub conversation_id: Option<String>,
}

impl Report {
    pub fn title(&self) -> String {
        match self.subject.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => format!("Report {}", self.id),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub admin: Party,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMessage {
    id: Option<Value>,
    #[serde(rename = "_id")]
    object_id: Option<Value>,
    sender_id: Option<Value>,
    sender: Option<Value>,
    message: Option<String>,
    text: Option<String>,
    message_type: Option<String>,
    attachments: Option<Vec<String>>,
    is_deleted: Option<bool>,
    created_at: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReport {
    id: Option<Value>,
    #[serde(rename = "_id")]
    object_id: Option<Value>,
    status: Option<String>,
    booking_id: Option<Value>,
    booking: Option<Value>,
    reporter: Option<Value>,
    subject: Option<String>,
    title: Option<String>,
    reason: Option<String>,
    conversation_id: Option<Value>,
    conversation: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSession {
    token: Option<String>,
    access_token: Option<String>,
    admin: Option<Value>,
    user: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct LoginBody<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageBody<'a> {
    pub message: &'a str,
    pub message_type: &'static str,
    pub attachments: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditMessageBody<'a> {
    pub message: &'a str,
    pub message_type: &'static str,
}

/// Ids arrive as strings or numbers depending on the backing store.
fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Payloads may carry `id`, `_id` or both; the first usable one wins.
fn record_id(id: Option<&Value>, object_id: Option<&Value>) -> Option<String> {
    id.and_then(id_string).or_else(|| object_id.and_then(id_string))
}

/// Accepts a bare id or an embedded object carrying `id`/`_id`.
fn ref_id(value: &Value) -> Option<String> {
    id_string(value).or_else(|| {
        value
            .get("id")
            .or_else(|| value.get("_id"))
            .and_then(id_string)
    })
}

fn party(value: &Value) -> Option<Party> {
    let id = ref_id(value)?;
    let name = value
        .get("name")
        .or_else(|| value.get("fullName"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| {
            let first = value.get("firstName").and_then(Value::as_str)?;
            let last = value.get("lastName").and_then(Value::as_str).unwrap_or("");
            Some(format!("{first} {last}").trim().to_string())
        });
    let role = value.get("role").and_then(Value::as_str).map(str::to_string);
    Some(Party { id, name, role })
}

fn timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|d| d.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}

impl TryFrom<RawMessage> for Message {
    type Error = ApiError;

    fn try_from(raw: RawMessage) -> ApiResult<Self> {
        let id = record_id(raw.id.as_ref(), raw.object_id.as_ref())
            .ok_or_else(|| ApiError::invalid_payload("message without id"))?;
        let sender = raw.sender.as_ref().and_then(party);
        let sender_id = raw
            .sender_id
            .as_ref()
            .and_then(ref_id)
            .or_else(|| sender.as_ref().map(|s| s.id.clone()))
            .ok_or_else(|| ApiError::invalid_payload(format!("message {id} without sender")))?;
        let created_at = raw
            .created_at
            .as_ref()
            .and_then(timestamp)
            .ok_or_else(|| ApiError::invalid_payload(format!("message {id} without valid createdAt")))?;
        let text = raw.message.or(raw.text).unwrap_or_default();

        Ok(Message {
            id,
            sender_id,
            sender_name: sender.as_ref().and_then(|s| s.name.clone()),
            sender_role: sender.and_then(|s| s.role),
            text,
            kind: MessageKind::parse(raw.message_type.as_deref()),
            attachments: raw.attachments.unwrap_or_default(),
            is_deleted: raw.is_deleted.unwrap_or_default(),
            created_at,
        })
    }
}

impl TryFrom<RawReport> for Report {
    type Error = ApiError;

    fn try_from(raw: RawReport) -> ApiResult<Self> {
        let id = record_id(raw.id.as_ref(), raw.object_id.as_ref())
            .ok_or_else(|| ApiError::invalid_payload("report without id"))?;
        let status = raw
            .status
            .as_deref()
            .ok_or_else(|| ApiError::invalid_payload(format!("report {id} without status")))?
            .parse::<ReportStatus>()?;
        let booking_id = raw
            .booking_id
            .as_ref()
            .or(raw.booking.as_ref())
            .and_then(ref_id);
        let conversation_id = raw
            .conversation_id
            .as_ref()
            .or(raw.conversation.as_ref())
            .and_then(ref_id);

        Ok(Report {
            id,
            status,
            booking_id,
            reporter: raw.reporter.as_ref().and_then(party),
            subject: raw.subject.or(raw.title).or(raw.reason),
            conversation_id,
        })
    }
}

fn require_data(data: Option<Value>) -> ApiResult<Value> {
    data.ok_or_else(|| ApiError::invalid_payload("response without data"))
}

pub fn parse_message(data: Option<Value>) -> ApiResult<Message> {
    let raw: RawMessage = serde_json::from_value(require_data(data)?)?;
    Message::try_from(raw)
}

pub fn parse_report(data: Option<Value>) -> ApiResult<Report> {
    let raw: RawReport = serde_json::from_value(require_data(data)?)?;
    Report::try_from(raw)
}

pub fn parse_session(data: Option<Value>) -> ApiResult<Session> {
    let raw: RawSession = serde_json::from_value(require_data(data)?)?;
    let token = raw
        .token
        .filter(|t| !t.is_empty())
        .or(raw.access_token.filter(|t| !t.is_empty()))
        .ok_or_else(|| ApiError::invalid_payload("login response without token"))?;
    let admin = raw
        .admin
        .as_ref()
        .and_then(party)
        .or_else(|| raw.user.as_ref().and_then(party))
        .ok_or_else(|| ApiError::invalid_payload("login response without admin profile"))?;
    Ok(Session { token, admin })
}

/// Malformed items are dropped with a warning rather than failing the page.
pub fn parse_message_page(data: Option<Value>) -> ApiResult<MessagePage> {
    let data = require_data(data)?;
    let meta: PageMeta = serde_json::from_value(
        data.get("meta")
            .cloned()
            .ok_or_else(|| ApiError::invalid_payload("message page without meta"))?,
    )?;
    let items = data
        .get("items")
        .and_then(Value::as_array)
        .ok_or_else(|| ApiError::invalid_payload("message page without items"))?;

    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let parsed = serde_json::from_value::<RawMessage>(item.clone())
            .map_err(ApiError::from)
            .and_then(Message::try_from);
        match parsed {
            Ok(msg) => out.push(msg),
            Err(e) => log::warn!("Dropping malformed message record: {e}"),
        }
    }
    Ok(MessagePage { items: out, meta })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_mirrors_text_field_and_embedded_sender() {
        let msg = parse_message(Some(json!({
            "_id": "m1",
            "sender": { "_id": "u7", "fullName": "Ada Obi", "role": "pathfinder" },
            "text": "Parcel arrived damaged",
            "messageType": "text",
            "isDeleted": false,
            "createdAt": "2024-01-01T10:00:00Z"
        })))
        .unwrap();
        assert_eq!(msg.id, "m1");
        assert_eq!(msg.sender_id, "u7");
        assert_eq!(msg.sender_name.as_deref(), Some("Ada Obi"));
        assert_eq!(msg.sender_role.as_deref(), Some("pathfinder"));
        assert_eq!(msg.text, "Parcel arrived damaged");
        assert!(msg.is_displayable());
    }

    #[test]
    fn message_without_created_at_is_rejected() {
        let err = parse_message(Some(json!({ "id": "m1", "senderId": "u1", "message": "hi" })))
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidPayload(_)));
    }

    #[test]
    fn non_text_and_deleted_messages_are_not_displayable() {
        let voice = parse_message(Some(json!({
            "id": 4, "senderId": 9, "messageType": "voice",
            "attachments": ["https://cdn/x.ogg"], "createdAt": 1704103200000i64
        })))
        .unwrap();
        assert_eq!(voice.kind, MessageKind::Voice);
        assert_eq!(voice.id, "4");
        assert!(!voice.is_displayable());

        let deleted = parse_message(Some(json!({
            "id": "m2", "senderId": "u1", "message": "gone", "isDeleted": true,
            "createdAt": "2024-01-01T10:00:00+01:00"
        })))
        .unwrap();
        assert!(!deleted.is_displayable());
    }

    #[test]
    fn page_keeps_valid_items_and_reads_meta() {
        let page = parse_message_page(Some(json!({
            "items": [
                { "id": "a", "senderId": "u1", "message": "one", "messageType": "text", "createdAt": "2024-01-02T09:00:00Z" },
                { "id": "b", "message": "no sender", "createdAt": "2024-01-01T09:00:00Z" }
            ],
            "meta": { "total": 120, "perPage": 50, "currentPage": 1, "totalPages": 3 }
        })))
        .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, "a");
        assert_eq!(page.meta, PageMeta { current_page: 1, total_pages: 3 });
    }

    #[test]
    fn message_with_both_id_keys_is_accepted() {
        let msg = parse_message(Some(json!({
            "_id": "m1", "id": "m1", "senderId": "u1", "message": "hi",
            "messageType": "text", "createdAt": "2024-01-01T10:00:00Z"
        })))
        .unwrap();
        assert_eq!(msg.id, "m1");

        let page = parse_message_page(Some(json!({
            "items": [{
                "_id": "m2", "id": "m2", "senderId": "u1", "message": "kept",
                "createdAt": "2024-01-01T11:00:00Z"
            }],
            "meta": { "currentPage": 1, "totalPages": 1 }
        })))
        .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].text, "kept");
    }

    #[test]
    fn null_attachments_and_delete_flag_read_as_defaults() {
        let msg = parse_message(Some(json!({
            "id": "m1", "senderId": "u1", "message": "hi", "messageType": "text",
            "attachments": null, "isDeleted": null, "createdAt": "2024-01-01T10:00:00Z"
        })))
        .unwrap();
        assert!(msg.attachments.is_empty());
        assert!(!msg.is_deleted);
        assert!(msg.is_displayable());
    }

    #[test]
    fn report_and_session_tolerate_repeated_keys() {
        let report = parse_report(Some(json!({
            "_id": "r1", "id": "r1", "status": "pending",
            "title": "Damaged parcel", "reason": "damage"
        })))
        .unwrap();
        assert_eq!(report.id, "r1");
        assert_eq!(report.subject.as_deref(), Some("Damaged parcel"));

        let session = parse_session(Some(json!({
            "token": "tok", "accessToken": "tok",
            "admin": { "_id": "a1", "id": "a1", "name": "Ops" },
            "user": { "id": "a1" }
        })))
        .unwrap();
        assert_eq!(session.token, "tok");
        assert_eq!(session.admin.name.as_deref(), Some("Ops"));
    }

    #[test]
    fn page_without_meta_is_invalid() {
        let err = parse_message_page(Some(json!({ "items": [] }))).unwrap_err();
        assert!(matches!(err, ApiError::InvalidPayload(_)));
    }

    #[test]
    fn report_reads_nested_conversation_and_status() {
        let report = parse_report(Some(json!({
            "_id": "r1",
            "status": "underReview",
            "booking": { "_id": "b5" },
            "reporter": { "id": "u2", "firstName": "Kemi", "lastName": "Ade" },
            "reason": "Late delivery",
            "conversation": { "id": "c9" }
        })))
        .unwrap();
        assert_eq!(report.status, ReportStatus::UnderReview);
        assert!(!report.status.is_open());
        assert_eq!(report.booking_id.as_deref(), Some("b5"));
        assert_eq!(report.conversation_id.as_deref(), Some("c9"));
        assert_eq!(report.reporter.unwrap().name.as_deref(), Some("Kemi Ade"));
        assert_eq!(report.subject.as_deref(), Some("Late delivery"));
    }

    #[test]
    fn report_with_unknown_status_is_rejected() {
        let err = parse_report(Some(json!({ "id": "r1", "status": "archived" }))).unwrap_err();
        assert!(matches!(err, ApiError::InvalidPayload(_)));
    }

    #[test]
    fn report_title_falls_back_to_id() {
        let report = parse_report(Some(json!({ "id": "r1", "status": "pending", "subject": "  " })))
            .unwrap();
        assert_eq!(report.title(), "Report r1");
        assert!(report.conversation_id.is_none());
    }

    #[test]
    fn session_accepts_aliases() {
        let session = parse_session(Some(json!({
            "accessToken": "tok",
            "user": { "id": "a1", "name": "Ops Admin", "role": "superAdmin" }
        })))
        .unwrap();
        assert_eq!(session.token, "tok");
        assert_eq!(session.admin.id, "a1");

        assert!(parse_session(Some(json!({ "token": "", "admin": { "id": "a1" } }))).is_err());
    }

    #[test]
    fn send_body_uses_wire_names() {
        let body = serde_json::to_value(SendMessageBody {
            message: "hello",
            message_type: "text",
            attachments: Vec::new(),
        })
        .unwrap();
        assert_eq!(body, json!({ "message": "hello", "messageType": "text", "attachments": [] }));
    }
}
