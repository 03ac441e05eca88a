//! Test fixtures for common types.

use std::sync::Arc;

use serde_json::json;
use trailgram::{AppState, Config, Event, MessageSender, Payload, SavedSearch};

/// Chat id used by [`test_config`].
pub const TEST_CHAT_ID: i64 = -100_123_456;

/// Template used by [`test_config`].
pub const TEST_TEMPLATE: &str = "{{.SavedSearch.Name}}: {{range .Events}}{{.Message}} {{end}}";

/// Config with a dummy token, no proxy and `template`.
#[must_use]
pub fn test_config_with_template(template: &str) -> Config {
    Config {
        bot_token: "123456:TEST-TOKEN".to_string(),
        template: template.to_string(),
        chat_id: TEST_CHAT_ID,
        socks5_proxy: None,
    }
}

/// Config using [`TEST_TEMPLATE`].
#[must_use]
pub fn test_config() -> Config {
    test_config_with_template(TEST_TEMPLATE)
}

/// Shared state wired to `sender`, compiling `template`.
///
/// # Panics
///
/// Panics if `template` does not compile.
#[must_use]
pub fn test_state(template: &str, sender: Arc<dyn MessageSender>) -> Arc<AppState> {
    match AppState::new(&test_config_with_template(template), sender) {
        Ok(state) => Arc::new(state),
        Err(e) => panic!("test template should compile: {e}"),
    }
}

/// The one-event "disk full" alert as raw JSON.
#[must_use]
pub fn disk_full_json() -> String {
    json!({
        "Events": [{"Hostname": "h1", "Message": "disk full"}],
        "saved_search": {"Name": "alerts"}
    })
    .to_string()
}

/// The decoded form of [`disk_full_json`].
#[must_use]
pub fn disk_full_payload() -> Payload {
    Payload {
        events: vec![Event {
            hostname: "h1".to_string(),
            message: "disk full".to_string(),
            ..Event::default()
        }],
        saved_search: SavedSearch {
            name: "alerts".to_string(),
            ..SavedSearch::default()
        },
    }
}

/// A payload shaped like a real Papertrail delivery, with `count` events.
#[must_use]
pub fn papertrail_json(count: usize) -> String {
    let events: Vec<_> = (0..count)
        .map(|i| {
            json!({
                "id": 7_433_154_usize.saturating_add(i),
                "received_at": "2011-05-18T20:30:02-07:00",
                "display_received_at": "May 18 20:30:02",
                "source_ip": "208.75.57.121",
                "source_name": "abc",
                "source_id": 2,
                "hostname": format!("web-{i}"),
                "program": "CROND",
                "severity": "Info",
                "facility": "Cron",
                "message": format!("job {i} finished")
            })
        })
        .collect();

    json!({
        "events": events,
        "saved_search": {
            "id": 42,
            "name": "cron jobs",
            "query": "cron",
            "html_edit_url": "https://papertrailapp.com/searches/42/edit",
            "html_search_url": "https://papertrailapp.com/searches/42"
        },
        "max_id": "7433155",
        "min_id": "7433154"
    })
    .to_string()
}

/// URL-encode `json` as the `payload` form field.
#[must_use]
pub fn form_body(json: &str) -> String {
    format!("payload={}", urlencoding::encode(json))
}
