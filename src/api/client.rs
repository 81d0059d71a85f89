use reqwest::{Client as HttpClient, RequestBuilder, StatusCode};
use serde_json::Value;
use std::time::Duration;
use url::Url;

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{
    self, EditMessageBody, Envelope, LoginBody, Message, MessagePage, Report, SendMessageBody,
    Session,
};

pub const PAGE_SIZE: u32 = 50;

const CODE_OK: u16 = 200;
const CODE_CREATED: u16 = 201;

/// Where to talk to and as whom. Built once from settings and handed to
/// [`ApiClient::new`]; a fresh one is built after every login.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: Url,
    pub token: Option<String>,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: &str, token: Option<String>) -> ApiResult<Self> {
        let base_url = Url::parse(&crate::utils::normalize_url(base_url))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self {
            base_url,
            token: token.filter(|t| !t.is_empty()),
            timeout: Duration::from_secs(30),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Appends percent-encoded path segments to the base URL.
    pub fn endpoint(&self, segments: &[&str]) -> ApiResult<Url> {
        let mut url = self.base_url.clone();
        url.set_query(None);
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn messages_url(&self, report_id: &str, conversation_id: &str) -> ApiResult<Url> {
        self.endpoint(&[
            "v1",
            "admin",
            "reports",
            report_id,
            "conversation",
            conversation_id,
            "messages",
        ])
    }

    fn message_url(&self, report_id: &str, conversation_id: &str, message_id: &str) -> ApiResult<Url> {
        self.endpoint(&[
            "v1",
            "admin",
            "reports",
            report_id,
            "conversation",
            conversation_id,
            "message",
            message_id,
        ])
    }
}

pub struct ApiClient {
    http: HttpClient,
    config: ClientConfig,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> ApiResult<Self> {
        let http = HttpClient::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    fn with_auth(&self, req: RequestBuilder) -> RequestBuilder {
        match self.config.token.as_deref() {
            Some(t) => req.bearer_auth(t),
            None => req,
        }
    }

    async fn send(&self, req: RequestBuilder) -> ApiResult<Envelope> {
        let resp = self.with_auth(req).send().await?;
        let status = resp.status();
        let body = resp.bytes().await?;
        read_envelope(status, &body)
    }

    /// Exchanges admin credentials for a bearer token and profile.
    pub async fn login(&self, email: &str, password: &str) -> ApiResult<Session> {
        let url = self.config.endpoint(&["v1", "admin", "auth", "login"])?;
        let body = LoginBody { email, password };
        let env = self.send(self.http.post(url).json(&body)).await?;
        models::parse_session(expect_code(env, CODE_OK)?)
    }

    pub async fn report(&self, report_id: &str) -> ApiResult<Report> {
        let url = self.config.endpoint(&["v1", "admin", "reports", report_id])?;
        let env = self.send(self.http.get(url)).await?;
        models::parse_report(expect_code(env, CODE_OK)?)
    }

    /// One page of a report conversation, newest message first.
    pub async fn conversation_messages(
        &self,
        report_id: &str,
        conversation_id: &str,
        page: u32,
        limit: u32,
    ) -> ApiResult<MessagePage> {
        let mut url = self.config.messages_url(report_id, conversation_id)?;
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("limit", &limit.to_string());
        let env = self.send(self.http.get(url)).await?;
        models::parse_message_page(expect_code(env, CODE_OK)?)
    }

    pub async fn send_message(
        &self,
        report_id: &str,
        conversation_id: &str,
        text: &str,
    ) -> ApiResult<Message> {
        let url = self.config.messages_url(report_id, conversation_id)?;
        let body = SendMessageBody {
            message: text,
            message_type: "text",
            attachments: Vec::new(),
        };
        let env = self.send(self.http.post(url).json(&body)).await?;
        models::parse_message(expect_code(env, CODE_CREATED)?)
    }

    pub async fn edit_message(
        &self,
        report_id: &str,
        conversation_id: &str,
        message_id: &str,
        text: &str,
    ) -> ApiResult<Message> {
        let url = self.config.message_url(report_id, conversation_id, message_id)?;
        let body = EditMessageBody {
            message: text,
            message_type: "text",
        };
        let env = self.send(self.http.put(url).json(&body)).await?;
        models::parse_message(expect_code(env, CODE_OK)?)
    }

    pub async fn delete_message(
        &self,
        report_id: &str,
        conversation_id: &str,
        message_id: &str,
    ) -> ApiResult<()> {
        let url = self.config.message_url(report_id, conversation_id, message_id)?;
        let env = self.send(self.http.delete(url)).await?;
        expect_code(env, CODE_OK).map(|_| ())
    }
}

fn server_message(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<Value>(body)
        .ok()?
        .get("message")?
        .as_str()
        .map(str::to_string)
}

/// Maps the HTTP status and body onto the envelope or a typed error.
fn read_envelope(status: StatusCode, body: &[u8]) -> ApiResult<Envelope> {
    if status == StatusCode::UNAUTHORIZED {
        return Err(ApiError::Unauthorized);
    }
    if !status.is_success() {
        return Err(ApiError::Status {
            status,
            message: server_message(body),
        });
    }
    Ok(serde_json::from_slice(body)?)
}

fn expect_code(env: Envelope, expected: u16) -> ApiResult<Option<Value>> {
    if env.code == StatusCode::UNAUTHORIZED.as_u16() {
        return Err(ApiError::Unauthorized);
    }
    if env.code != expected {
        return Err(ApiError::UnexpectedCode {
            expected,
            got: env.code,
            message: env.message,
        });
    }
    Ok(env.data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(base: &str) -> ClientConfig {
        ClientConfig::new(base, Some("tok".into())).unwrap()
    }

    #[test]
    fn endpoint_keeps_base_path_and_encodes_segments() {
        let cfg = config("https://api.example.com/api/");
        let url = cfg.messages_url("r 1", "c/2").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.example.com/api/v1/admin/reports/r%201/conversation/c%2F2/messages"
        );
    }

    #[test]
    fn message_url_targets_single_message() {
        let cfg = config("api.example.com");
        let url = cfg.message_url("r1", "c1", "m1").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.example.com/v1/admin/reports/r1/conversation/c1/message/m1"
        );
    }

    #[test]
    fn empty_token_is_treated_as_signed_out() {
        let cfg = ClientConfig::new("https://x.test", Some(String::new())).unwrap();
        assert!(cfg.token.is_none());
    }

    #[test]
    fn unauthorized_status_is_typed() {
        let err = read_envelope(StatusCode::UNAUTHORIZED, b"{}").unwrap_err();
        assert!(err.is_unauthorized());
    }

    #[test]
    fn error_status_carries_server_message() {
        let body = json!({ "code": 403, "message": "Report is closed" }).to_string();
        match read_envelope(StatusCode::FORBIDDEN, body.as_bytes()) {
            Err(ApiError::Status { status, message }) => {
                assert_eq!(status, StatusCode::FORBIDDEN);
                assert_eq!(message.as_deref(), Some("Report is closed"));
            }
            other => panic!("unexpected: {other:?}"),
        }
        match read_envelope(StatusCode::BAD_GATEWAY, b"<html>") {
            Err(ApiError::Status { message, .. }) => assert!(message.is_none()),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn send_requires_created_code() {
        let body = json!({ "code": 200, "message": "ok", "data": {} }).to_string();
        let env = read_envelope(StatusCode::OK, body.as_bytes()).unwrap();
        let err = expect_code(env, CODE_CREATED).unwrap_err();
        assert!(matches!(err, ApiError::UnexpectedCode { expected: 201, got: 200, .. }));
    }

    #[test]
    fn envelope_unauthorized_code_is_typed() {
        let body = json!({ "code": 401, "message": "jwt expired" }).to_string();
        let env = read_envelope(StatusCode::OK, body.as_bytes()).unwrap();
        assert!(expect_code(env, CODE_OK).unwrap_err().is_unauthorized());
    }

    #[test]
    fn matching_code_yields_data() {
        let body = json!({ "code": 201, "data": { "id": "m1" } }).to_string();
        let env = read_envelope(StatusCode::CREATED, body.as_bytes()).unwrap();
        assert_eq!(expect_code(env, CODE_CREATED).unwrap(), Some(json!({ "id": "m1" })));
    }
}
