//! Remote ticketing system access.
//!
//! This module defines the narrow gateway contract the sync engine talks to,
//! together with the remote document types it reads: the ticket document,
//! its discussion notes, and JSON Patch operations sent back.

pub mod error;
pub mod http;

use std::fmt;
use std::future::Future;

use jiff::civil::DateTime;
use jiff::tz::TimeZone;
use serde::Serialize;
use serde_json::Value;

use crate::config::SyncConfig;
use crate::error::{BridgeError, Result};

pub use error::ApiError;
pub use http::{HttpGateway, parse_document};

/// Key under which a JSON array response body is wrapped.
pub const ARRAY_KEY: &str = "JSONArray";

/// HTTP methods used against the remote API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Patch => "PATCH",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Patch => reqwest::Method::PATCH,
        }
    }
}

/// Transport to the remote ticketing system.
///
/// Implementations return the parsed response document, `Ok(None)` when the
/// body is neither a JSON object nor a JSON array, and
/// [`BridgeError::Api`] carrying the HTTP status for non-2xx responses.
/// Array bodies are wrapped as `{"JSONArray": [...]}`.
///
/// Credentials come from the `config` passed with each call, never from
/// state held by the gateway.
pub trait RemoteGateway: Send + Sync {
    fn call(
        &self,
        config: &SyncConfig,
        url: &str,
        method: HttpMethod,
        body: Option<&Value>,
    ) -> impl Future<Output = Result<Option<Value>>> + Send;
}

/// A gateway bound to the configuration snapshot of one sync.
pub struct Session<'a, G> {
    gateway: &'a G,
    config: &'a SyncConfig,
}

impl<'a, G: RemoteGateway> Session<'a, G> {
    pub fn new(gateway: &'a G, config: &'a SyncConfig) -> Self {
        Self { gateway, config }
    }

    pub fn config(&self) -> &'a SyncConfig {
        self.config
    }

    pub async fn call(&self, url: &str, method: HttpMethod, body: Option<&Value>) -> Result<Option<Value>> {
        self.gateway.call(self.config, url, method, body).await
    }
}

/// Render a scalar JSON value as the string form used for comparisons.
///
/// `null` becomes the literal `"null"`; objects and arrays have no scalar form.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some("null".to_string()),
        Value::Object(_) | Value::Array(_) => None,
    }
}

/// A fetched remote ticket document and the URL it lives at
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteTicket {
    pub url: String,
    pub document: Value,
}

impl RemoteTicket {
    pub fn new(url: impl Into<String>, document: Value) -> Self {
        Self {
            url: url.into(),
            document,
        }
    }

    pub fn id(&self) -> Option<String> {
        self.document
            .get("id")
            .and_then(scalar_to_string)
            .filter(|id| id != "null")
    }

    /// Look up a slash-separated field path such as `priority/id`.
    ///
    /// Returns `None` when the path does not exist in the document.
    pub fn field(&self, path: &str) -> Option<String> {
        self.document
            .pointer(&format!("/{path}"))
            .and_then(scalar_to_string)
    }

    /// URL of the ticket's discussion notes
    pub fn notes_url(&self) -> String {
        format!("{}/notes", self.url)
    }
}

/// A discussion note attached to a remote ticket
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteNote {
    pub id: String,
    pub text: Option<String>,
    pub created_by: Option<String>,
    pub date_created: Option<String>,
    /// Parsed `date_created`, if it could be parsed
    pub created_at: Option<DateTime>,
    /// Set on notes that carry the ticket's detailed description
    pub is_description: bool,
}

impl RemoteNote {
    pub fn from_value(value: &Value) -> Result<Self> {
        let id = value
            .get("id")
            .and_then(scalar_to_string)
            .filter(|id| id != "null")
            .ok_or_else(|| BridgeError::UnexpectedResponse {
                url: String::new(),
                reason: "note without id".to_string(),
            })?;

        let string_field = |name: &str| value.get(name).and_then(Value::as_str).map(String::from);

        let date_created = string_field("dateCreated");
        let created_at = match date_created.as_deref() {
            Some(raw) => match parse_remote_timestamp(raw) {
                Ok(dt) => Some(dt),
                Err(e) => {
                    tracing::warn!("Note {id}: {e}");
                    None
                }
            },
            None => None,
        };

        Ok(Self {
            text: string_field("text"),
            created_by: string_field("createdBy"),
            is_description: value
                .get("detailDescriptionFlag")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            date_created,
            created_at,
            id,
        })
    }

    /// Text with the literal `"null"` treated as missing.
    pub fn meaningful_text(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| *t != "null")
    }
}

/// Extract the note list from a notes response document.
///
/// Notes that cannot be read (no id) are skipped.
pub fn parse_notes(url: &str, document: Option<Value>) -> Result<Vec<RemoteNote>> {
    let items = match document {
        Some(Value::Object(mut map)) => match map.remove(ARRAY_KEY) {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(BridgeError::UnexpectedResponse {
                    url: url.to_string(),
                    reason: "expected a JSON array of notes".to_string(),
                });
            }
        },
        _ => {
            return Err(BridgeError::UnexpectedResponse {
                url: url.to_string(),
                reason: "no notes document".to_string(),
            });
        }
    };

    Ok(items
        .iter()
        .filter_map(|item| match RemoteNote::from_value(item) {
            Ok(note) => Some(note),
            Err(e) => {
                tracing::warn!("Skipping unreadable note from {url}: {e}");
                None
            }
        })
        .collect())
}

/// Parse the remote timestamp format `yyyy-MM-dd'T'H:m:sX`.
///
/// The offset suffix is accepted but discarded: the wall-clock value is what
/// the remote system shows, and it is interpreted in the local time zone.
pub fn parse_remote_timestamp(raw: &str) -> Result<DateTime> {
    let invalid = || BridgeError::InvalidTimestamp(raw.to_string());

    let (date, time) = raw.trim().split_once(['T', 't']).ok_or_else(invalid)?;
    let time = strip_offset(time);

    let mut date_parts = date.split('-');
    let year: i16 = next_number(&mut date_parts).ok_or_else(invalid)?;
    let month: i8 = next_number(&mut date_parts).ok_or_else(invalid)?;
    let day: i8 = next_number(&mut date_parts).ok_or_else(invalid)?;
    if date_parts.next().is_some() {
        return Err(invalid());
    }

    let seconds_whole = time.split('.').next().unwrap_or(time);
    let mut time_parts = seconds_whole.split(':');
    let hour: i8 = next_number(&mut time_parts).ok_or_else(invalid)?;
    let minute: i8 = next_number(&mut time_parts).ok_or_else(invalid)?;
    let second: i8 = next_number(&mut time_parts).ok_or_else(invalid)?;
    if time_parts.next().is_some() {
        return Err(invalid());
    }

    DateTime::new(year, month, day, hour, minute, second, 0).map_err(|_| invalid())
}

fn strip_offset(time: &str) -> &str {
    if let Some(stripped) = time.strip_suffix(['Z', 'z']) {
        return stripped;
    }
    match time.rfind(['+', '-']) {
        Some(idx) => &time[..idx],
        None => time,
    }
}

fn next_number<'a, T: std::str::FromStr>(parts: &mut impl Iterator<Item = &'a str>) -> Option<T> {
    let part = parts.next()?;
    if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    part.parse().ok()
}

/// Epoch milliseconds of a civil datetime in the given time zone.
pub fn epoch_millis_in(datetime: DateTime, tz: TimeZone) -> Result<i64> {
    let zoned = datetime
        .to_zoned(tz)
        .map_err(|e| BridgeError::InvalidTimestamp(format!("{datetime}: {e}")))?;
    Ok(zoned.timestamp().as_millisecond())
}

/// Epoch milliseconds of a civil datetime in the process's time zone.
pub fn epoch_millis(datetime: DateTime) -> Result<i64> {
    epoch_millis_in(datetime, TimeZone::system())
}

/// JSON Patch operation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchKind {
    Add,
    Replace,
}

/// One JSON Patch operation against a remote document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatchOp {
    pub op: PatchKind,
    pub path: String,
    pub value: Value,
}

impl PatchOp {
    pub fn add(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            op: PatchKind::Add,
            path: path.into(),
            value: value.into(),
        }
    }

    pub fn replace(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            op: PatchKind::Replace,
            path: path.into(),
            value: value.into(),
        }
    }
}

/// Serialize a list of operations as a JSON Patch request body.
pub fn patch_body(ops: &[PatchOp]) -> Result<Value> {
    Ok(serde_json::to_value(ops)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_remote_ticket_fields() {
        let ticket = RemoteTicket::new(
            "https://connect.example.com/tickets/187562",
            json!({
                "id": 187562,
                "summary": "Projector offline",
                "priority": {"id": 91, "name": "Major"},
                "status": {"name": "New"},
                "owner": null
            }),
        );

        assert_eq!(ticket.id().as_deref(), Some("187562"));
        assert_eq!(ticket.field("summary").as_deref(), Some("Projector offline"));
        assert_eq!(ticket.field("priority/id").as_deref(), Some("91"));
        assert_eq!(ticket.field("status/name").as_deref(), Some("New"));
        assert_eq!(ticket.field("owner").as_deref(), Some("null"));
        assert_eq!(ticket.field("owner/identifier"), None);
        assert_eq!(ticket.field("priority"), None);
        assert_eq!(
            ticket.notes_url(),
            "https://connect.example.com/tickets/187562/notes"
        );
    }

    #[test]
    fn test_parse_remote_timestamp_single_digits() {
        let dt = parse_remote_timestamp("2019-12-03T9:5:7Z").unwrap();
        assert_eq!(dt, DateTime::new(2019, 12, 3, 9, 5, 7, 0).unwrap());
    }

    #[test]
    fn test_parse_remote_timestamp_offsets_are_ignored() {
        let expected = DateTime::new(2020, 1, 15, 22, 40, 0, 0).unwrap();
        assert_eq!(
            parse_remote_timestamp("2020-01-15T22:40:00+10:00").unwrap(),
            expected
        );
        assert_eq!(
            parse_remote_timestamp("2020-01-15T22:40:00-0500").unwrap(),
            expected
        );
        assert_eq!(parse_remote_timestamp("2020-01-15T22:40:00").unwrap(), expected);
    }

    #[test]
    fn test_parse_remote_timestamp_invalid() {
        assert!(parse_remote_timestamp("not a date").is_err());
        assert!(parse_remote_timestamp("2020-13-01T00:00:00Z").is_err());
        assert!(parse_remote_timestamp("2020-01-01T25:00:00Z").is_err());
        assert!(parse_remote_timestamp("2020-01T00:00:00Z").is_err());
        assert!(parse_remote_timestamp("2020-01-01T00:00Z").is_err());
    }

    #[test]
    fn test_epoch_millis_in_utc() {
        let dt = parse_remote_timestamp("1970-01-02T0:0:1Z").unwrap();
        assert_eq!(epoch_millis_in(dt, TimeZone::UTC).unwrap(), 86_401_000);
    }

    #[test]
    fn test_note_from_value() {
        let note = RemoteNote::from_value(&json!({
            "id": 262346,
            "text": "Creating mock ticket",
            "detailDescriptionFlag": true,
            "dateCreated": "2019-12-03T10:25:07Z",
            "createdBy": "LPisano"
        }))
        .unwrap();

        assert_eq!(note.id, "262346");
        assert!(note.is_description);
        assert_eq!(note.created_by.as_deref(), Some("LPisano"));
        assert_eq!(
            note.created_at,
            Some(DateTime::new(2019, 12, 3, 10, 25, 7, 0).unwrap())
        );
    }

    #[test]
    fn test_note_defaults_and_bad_date() {
        let note = RemoteNote::from_value(&json!({"id": "7", "text": "null", "dateCreated": "yesterday"}))
            .unwrap();
        assert!(!note.is_description);
        assert_eq!(note.created_at, None);
        assert_eq!(note.meaningful_text(), None);
        assert!(RemoteNote::from_value(&json!({"text": "orphan"})).is_err());
    }

    #[test]
    fn test_parse_notes_skips_unreadable() {
        let doc = json!({"JSONArray": [{"id": 1, "text": "a"}, {"text": "no id"}, {"id": 2}]});
        let notes = parse_notes("u", Some(doc)).unwrap();
        let ids: Vec<_> = notes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn test_parse_notes_requires_array() {
        assert!(parse_notes("u", None).is_err());
        assert!(parse_notes("u", Some(json!({"id": 1}))).is_err());
    }

    #[test]
    fn test_patch_body_shape() {
        let body = patch_body(&[
            PatchOp::add("summary", "Projector offline"),
            PatchOp::replace("priority/id", 8),
        ])
        .unwrap();
        assert_eq!(
            body,
            json!([
                {"op": "add", "path": "summary", "value": "Projector offline"},
                {"op": "replace", "path": "priority/id", "value": 8}
            ])
        );
    }
}
