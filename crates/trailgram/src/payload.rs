//! Papertrail webhook payload.
//!
//! Papertrail posts `payload=<json>` where the JSON carries the matched
//! events and the saved search that fired. Field names are the
//! template-facing ones (`Events`, `Hostname`, `HTMLEditURL`);
//! the lowercase names Papertrail actually sends are accepted as aliases.
//! Unknown fields are ignored; anything missing or `null` defaults to zero.

use serde::{Deserialize, Deserializer, Serialize};

use crate::template::Value;

/// One forwarded log line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Event {
    /// Papertrail event id.
    #[serde(rename = "ID", alias = "id", alias = "Id", deserialize_with = "null_as_default")]
    pub id: i64,
    /// Sending host.
    #[serde(rename = "Hostname", alias = "hostname", deserialize_with = "null_as_default")]
    pub hostname: String,
    /// Program name.
    #[serde(rename = "Program", alias = "program", deserialize_with = "null_as_default")]
    pub program: String,
    /// Log message.
    #[serde(rename = "Message", alias = "message", deserialize_with = "null_as_default")]
    pub message: String,
    /// Syslog severity.
    #[serde(rename = "Severity", alias = "severity", deserialize_with = "null_as_default")]
    pub severity: String,
    /// Syslog facility.
    #[serde(rename = "Facility", alias = "facility", deserialize_with = "null_as_default")]
    pub facility: String,
}

/// The saved search whose alert fired.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SavedSearch {
    /// Saved search id.
    #[serde(rename = "ID", alias = "id", alias = "Id", deserialize_with = "null_as_default")]
    pub id: i64,
    /// Display name.
    #[serde(rename = "Name", alias = "name", deserialize_with = "null_as_default")]
    pub name: String,
    /// Search query.
    #[serde(rename = "Query", alias = "query", deserialize_with = "null_as_default")]
    pub query: String,
    /// Link to edit the search.
    #[serde(rename = "HTMLEditURL", alias = "html_edit_url", deserialize_with = "null_as_default")]
    pub html_edit_url: String,
    /// Link to the search results.
    #[serde(
        rename = "HTMLSearchURL",
        alias = "html_search_url",
        deserialize_with = "null_as_default"
    )]
    pub html_search_url: String,
}

/// A decoded webhook body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Payload {
    /// Matched events.
    #[serde(rename = "Events", alias = "events", deserialize_with = "events_or_empty")]
    pub events: Vec<Event>,
    /// The saved search that matched.
    #[serde(
        rename = "saved_search",
        alias = "SavedSearch",
        deserialize_with = "null_as_default"
    )]
    pub saved_search: SavedSearch,
}

impl Payload {
    /// Decode a payload from JSON text.
    ///
    /// # Errors
    ///
    /// Returns the decoder error if `json` is neither a payload object nor
    /// `null`.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str::<Option<Self>>(json).map(Option::unwrap_or_default)
    }

    /// The payload as templates see it.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::from(self)
    }

    /// Human-readable dump with field names, as echoed back to the caller.
    #[must_use]
    pub fn describe(&self) -> String {
        self.to_value().to_verbose_string()
    }
}

/// `null` decodes like an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Event list where a `null` list or a `null` entry decodes as empty.
fn events_or_empty<'de, D>(deserializer: D) -> Result<Vec<Event>, D::Error>
where
    D: Deserializer<'de>,
{
    let events = Option::<Vec<Option<Event>>>::deserialize(deserializer)?;
    Ok(events
        .unwrap_or_default()
        .into_iter()
        .map(Option::unwrap_or_default)
        .collect())
}

impl From<&Event> for Value {
    fn from(event: &Event) -> Self {
        Value::record(
            "Event",
            [
                ("ID", Value::Int(event.id)),
                ("Hostname", Value::from(event.hostname.as_str())),
                ("Program", Value::from(event.program.as_str())),
                ("Message", Value::from(event.message.as_str())),
                ("Severity", Value::from(event.severity.as_str())),
                ("Facility", Value::from(event.facility.as_str())),
            ],
        )
    }
}

impl From<&SavedSearch> for Value {
    fn from(search: &SavedSearch) -> Self {
        Value::record(
            "SavedSearch",
            [
                ("ID", Value::Int(search.id)),
                ("Name", Value::from(search.name.as_str())),
                ("Query", Value::from(search.query.as_str())),
                ("HTMLEditURL", Value::from(search.html_edit_url.as_str())),
                ("HTMLSearchURL", Value::from(search.html_search_url.as_str())),
            ],
        )
    }
}

impl From<&Payload> for Value {
    fn from(payload: &Payload) -> Self {
        Value::record(
            "Payload",
            [
                ("Events", Value::List(payload.events.iter().map(Value::from).collect())),
                ("SavedSearch", Value::from(&payload.saved_search)),
            ],
        )
    }
}
