//! Webhook request handling.
//!
//! One request moves through decode, render and send. Only an empty or
//! malformed body and a failed send end it early; a template that fails
//! halfway still sends whatever it produced.

use std::borrow::Cow;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use tracing::{Instrument, Span, error, field, info, info_span, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::payload::Payload;
use crate::sender::MessageSender;
use crate::template::{Template, TemplateResult};

/// Name the message template is compiled under.
pub const TEMPLATE_NAME: &str = "message";

/// Body of the 400 response for a request without a payload.
pub const EMPTY_BODY: &str = "Please send a request body";

/// Body of the 500 response when the message could not be delivered.
pub const SEND_FAILED: &str = "internal error";

/// Form field (and query parameter) carrying the JSON payload.
const PAYLOAD_FIELD: &str = "payload";

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Process-wide state shared by every request. Read-only after startup.
pub struct AppState {
    /// Destination chat.
    pub chat_id: i64,
    /// Compiled message template.
    pub template: Template,
    /// Outbound client.
    pub sender: Arc<dyn MessageSender>,
}

impl AppState {
    /// Compile the configured template and bundle it with `sender`.
    ///
    /// # Errors
    ///
    /// Returns the parse error if the template does not compile.
    pub fn new(config: &Config, sender: Arc<dyn MessageSender>) -> TemplateResult<Self> {
        Ok(Self {
            chat_id: config.chat_id,
            template: Template::parse(TEMPLATE_NAME, &config.template)?,
            sender,
        })
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("chat_id", &self.chat_id)
            .field("template", &self.template.name())
            .finish_non_exhaustive()
    }
}

/// Relay one webhook delivery to Telegram.
pub async fn handle_webhook(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let span = info_span!(
        "webhook",
        request_id = %Uuid::new_v4(),
        method = %method,
        events = field::Empty
    );

    relay(&state, &headers, uri.query(), &body)
        .instrument(span)
        .await
        .into_response()
}

async fn relay(
    state: &AppState,
    headers: &HeaderMap,
    query: Option<&str>,
    body: &[u8],
) -> (StatusCode, String) {
    let data = extract_payload_text(headers, query, body);
    if data.is_empty() {
        warn!("request without body");
        return (StatusCode::BAD_REQUEST, EMPTY_BODY.to_string());
    }

    let payload = match Payload::from_json(&data) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "malformed payload");
            return (StatusCode::BAD_REQUEST, e.to_string());
        },
    };
    Span::current().record("events", payload.events.len());

    let rendered = state.template.render(&payload.to_value());
    if let Some(e) = &rendered.error {
        warn!(error = %e, "template failed, sending partial text");
    }

    if let Err(e) = state.sender.send_text(state.chat_id, &rendered.text).await {
        error!(error = %e, chat_id = state.chat_id, "failed to deliver message");
        return (StatusCode::INTERNAL_SERVER_ERROR, SEND_FAILED.to_string());
    }

    info!(chat_id = state.chat_id, "alert relayed");
    (StatusCode::OK, payload.describe())
}

/// Pull the JSON payload out of a request.
///
/// Form-encoded bodies carry it in the `payload` field; any other body is
/// taken as the JSON itself. If that yields nothing, a `payload` query
/// parameter is used. An empty result means no payload was sent.
#[must_use]
pub fn extract_payload_text(headers: &HeaderMap, query: Option<&str>, body: &[u8]) -> String {
    let body = String::from_utf8_lossy(body);
    let from_body = if is_form(headers) {
        form_value(&body, PAYLOAD_FIELD).unwrap_or_default()
    } else {
        body.into_owned()
    };

    if !from_body.is_empty() {
        return from_body;
    }
    query
        .and_then(|q| form_value(q, PAYLOAD_FIELD))
        .unwrap_or_default()
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(FORM_CONTENT_TYPE))
}

/// First value of `key` in an `application/x-www-form-urlencoded` string.
fn form_value(encoded: &str, key: &str) -> Option<String> {
    encoded
        .split('&')
        .filter(|pair| !pair.is_empty())
        .find_map(|pair| {
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            if decode_component(name)? == key {
                decode_component(value)
            } else {
                None
            }
        })
}

fn decode_component(raw: &str) -> Option<String> {
    urlencoding::decode(&raw.replace('+', " "))
        .ok()
        .map(Cow::into_owned)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn form_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded; charset=utf-8"),
        );
        headers
    }

    #[test]
    fn form_body_payload_field() {
        let body = b"foo=bar&payload=%7B%22Events%22%3A%5B%5D%7D&payload=second";
        let text = extract_payload_text(&form_headers(), None, body);
        assert_eq!(text, r#"{"Events":[]}"#);
    }

    #[test]
    fn form_body_plus_means_space() {
        let body = b"payload=%7B%22saved_search%22%3A%7B%22Name%22%3A%22disk+alerts%22%7D%7D";
        let text = extract_payload_text(&form_headers(), None, body);
        assert_eq!(text, r#"{"saved_search":{"Name":"disk alerts"}}"#);
    }

    #[test]
    fn raw_json_body() {
        let text = extract_payload_text(&HeaderMap::new(), None, br#"{"Events":[]}"#);
        assert_eq!(text, r#"{"Events":[]}"#);
    }

    #[test]
    fn query_is_the_fallback() {
        let text = extract_payload_text(&HeaderMap::new(), Some("payload=%7B%7D"), b"");
        assert_eq!(text, "{}");

        let text = extract_payload_text(&HeaderMap::new(), Some("payload=%7B%7D"), b"[]");
        assert_eq!(text, "[]");
    }

    #[test]
    fn form_without_payload_field_is_empty() {
        let text = extract_payload_text(&form_headers(), None, b"other=1");
        assert!(text.is_empty());
        assert!(extract_payload_text(&HeaderMap::new(), None, b"").is_empty());
    }

    #[test]
    fn form_value_edge_cases() {
        assert_eq!(form_value("payload", "payload"), Some(String::new()));
        assert_eq!(form_value("&&payload=x", "payload"), Some("x".to_string()));
        assert_eq!(form_value("pay%6Coad=x", "payload"), Some("x".to_string()));
        assert_eq!(form_value("a=1", "payload"), None);
    }

    #[test]
    fn content_type_match_ignores_case_and_params() {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("Application/X-WWW-Form-Urlencoded"),
        );
        assert!(is_form(&headers));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        assert!(!is_form(&headers));
        assert!(!is_form(&HeaderMap::new()));
    }
}
