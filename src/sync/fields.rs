//! Per-field three-way reconciliation.
//!
//! Each tracked field is compared between the local ticket and the remote
//! document. The local value wins when present; the remote value is pulled
//! only when the local side has nothing.

use serde_json::Value;

use crate::error::Result;
use crate::mapper::FieldMapper;
use crate::remote::{HttpMethod, PatchOp, RemoteGateway, RemoteTicket, Session, patch_body};
use crate::ticket::LocalTicket;

use super::resolver::PLACEHOLDER_SUBJECT;

/// How a value is encoded in the remote document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Text,
    Number,
    Boolean,
}

/// Outcome of comparing one field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldDecision {
    NoOp,
    /// The remote value should be written onto the local ticket
    Pull(String),
    Patch(PatchOp),
}

/// Fields kept in sync between the two systems
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackedField {
    Subject,
    Priority,
    Status,
    Assignee,
}

impl TrackedField {
    pub const ALL: [TrackedField; 4] = [
        TrackedField::Subject,
        TrackedField::Priority,
        TrackedField::Status,
        TrackedField::Assignee,
    ];

    /// Path of the field in the remote document
    pub fn path(self) -> &'static str {
        match self {
            TrackedField::Subject => "summary",
            TrackedField::Priority => "priority/id",
            TrackedField::Status => "status/name",
            TrackedField::Assignee => "owner/identifier",
        }
    }

    pub fn kind(self) -> ValueKind {
        match self {
            TrackedField::Priority => ValueKind::Number,
            _ => ValueKind::Text,
        }
    }

    /// Local value, translated into the remote vocabulary.
    fn local_value(self, ticket: &LocalTicket, mapper: &FieldMapper<'_>) -> Option<String> {
        match self {
            TrackedField::Subject => ticket.subject.clone(),
            TrackedField::Priority => ticket.priority.as_deref().map(|v| mapper.priority_to_remote(v)),
            TrackedField::Status => ticket.status.as_deref().map(|v| mapper.status_to_remote(v)),
            TrackedField::Assignee => ticket.assigned_to.as_deref().map(|v| mapper.user_to_remote(v)),
        }
    }

    /// Store a remote value on the ticket, translated into the local vocabulary.
    fn pull(self, ticket: &mut LocalTicket, remote_value: &str, mapper: &FieldMapper<'_>) {
        match self {
            TrackedField::Subject => ticket.subject = Some(remote_value.to_string()),
            TrackedField::Priority => ticket.priority = Some(mapper.priority_to_local(remote_value)),
            TrackedField::Status => ticket.status = Some(mapper.status_to_local(remote_value)),
            TrackedField::Assignee => ticket.assigned_to = Some(mapper.user_to_local(remote_value)),
        }
    }
}

fn is_absent(value: Option<&str>) -> bool {
    value.is_none_or(|v| v == "null")
}

/// Decide what to do with one field.
///
/// | local   | remote            | decision        |
/// |---------|-------------------|-----------------|
/// | absent  | absent / `"null"` | `NoOp`          |
/// | absent  | present           | `Pull`          |
/// | present | absent            | `Patch` (add)   |
/// | equal   | present           | `NoOp`          |
/// | differs | present           | `Patch` (replace) |
pub fn reconcile_field(
    local: Option<&str>,
    remote: Option<&str>,
    path: &str,
    kind: ValueKind,
) -> FieldDecision {
    match (local, remote) {
        (None, remote) if is_absent(remote) => FieldDecision::NoOp,
        (None, Some(remote)) => FieldDecision::Pull(remote.to_string()),
        (None, None) => FieldDecision::NoOp,
        (Some(local), None) => FieldDecision::Patch(PatchOp::add(path, encode_value(local, kind))),
        (Some(local), Some(remote)) if local == remote => FieldDecision::NoOp,
        (Some(local), Some(_)) => {
            FieldDecision::Patch(PatchOp::replace(path, encode_value(local, kind)))
        }
    }
}

/// Encode a value for the remote document.
///
/// Numbers and booleans go out unquoted; a value that does not parse as its
/// declared kind is sent as a string.
pub fn encode_value(value: &str, kind: ValueKind) -> Value {
    match kind {
        ValueKind::Text => Value::String(value.to_string()),
        ValueKind::Number => match serde_json::from_str::<serde_json::Number>(value.trim()) {
            Ok(n) => Value::Number(n),
            Err(_) => {
                tracing::warn!("'{value}' is not a number, sending it as a string");
                Value::String(value.to_string())
            }
        },
        ValueKind::Boolean => match value.trim().parse::<bool>() {
            Ok(b) => Value::Bool(b),
            Err(_) => {
                tracing::warn!("'{value}' is not a boolean, sending it as a string");
                Value::String(value.to_string())
            }
        },
    }
}

/// Compare every tracked field, applying pulls to the ticket and collecting
/// the patch operations to send.
pub fn reconcile_fields(
    mut ticket: LocalTicket,
    remote: &RemoteTicket,
    mapper: &FieldMapper<'_>,
) -> (LocalTicket, Vec<PatchOp>) {
    let mut ops = Vec::new();

    for field in TrackedField::ALL {
        let remote_value = remote.field(field.path());

        if field == TrackedField::Subject
            && ticket.subject.is_none()
            && is_absent(remote_value.as_deref())
        {
            let fallback = ticket
                .non_empty_description()
                .unwrap_or(PLACEHOLDER_SUBJECT)
                .to_string();
            tracing::info!(
                "'{}' has no subject on either side, using '{fallback}'",
                ticket.display_id()
            );
            ticket.subject = Some(fallback);
        }

        let local_value = field.local_value(&ticket, mapper);
        match reconcile_field(
            local_value.as_deref(),
            remote_value.as_deref(),
            field.path(),
            field.kind(),
        ) {
            FieldDecision::NoOp => {
                tracing::debug!("{} unchanged", field.path());
            }
            FieldDecision::Pull(value) => {
                tracing::info!("Pulling {} = '{value}' from remote", field.path());
                field.pull(&mut ticket, &value, mapper);
            }
            FieldDecision::Patch(op) => {
                tracing::info!("Patching {} ({:?})", op.path, op.op);
                ops.push(op);
            }
        }
    }

    (ticket, ops)
}

/// Send all field operations as one JSON Patch request.
///
/// Nothing is sent when `ops` is empty. Failures are returned to the caller.
pub async fn apply_field_patches<G: RemoteGateway>(
    remote: &RemoteTicket,
    ops: &[PatchOp],
    session: &Session<'_, G>,
) -> Result<()> {
    if ops.is_empty() {
        return Ok(());
    }
    let body = patch_body(ops)?;
    session.call(&remote.url, HttpMethod::Patch, Some(&body)).await?;
    Ok(())
}
