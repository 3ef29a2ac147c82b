//! Description synchronization.
//!
//! The remote system has no description field. Its description is the oldest
//! note flagged with `detailDescriptionFlag`, so the local description is
//! reconciled against that note instead.

use std::cmp::Ordering;

use serde_json::json;

use crate::remote::{
    HttpMethod, PatchOp, RemoteGateway, RemoteNote, RemoteTicket, Session, patch_body,
};
use crate::ticket::LocalTicket;

/// What happened to the description during a sync
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptionOutcome {
    Unchanged,
    /// Remote note text adopted as the local description
    Pulled,
    /// Remote note text replaced with the local description
    Patched,
    /// A new description note was posted
    Created,
    /// Neither description nor subject to send
    Unavailable,
    /// The remote call failed; the sync carried on
    Failed,
}

impl DescriptionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DescriptionOutcome::Unchanged => "unchanged",
            DescriptionOutcome::Pulled => "pulled",
            DescriptionOutcome::Patched => "patched",
            DescriptionOutcome::Created => "created",
            DescriptionOutcome::Unavailable => "unavailable",
            DescriptionOutcome::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DescriptionSync {
    pub ticket: LocalTicket,
    /// The remote description note, excluded from the comment merge
    pub note: Option<RemoteNote>,
    pub outcome: DescriptionOutcome,
}

/// Pick the description note: the earliest flagged note.
///
/// Ties keep the note seen first. Notes whose date could not be parsed sort
/// after every dated note.
pub fn select_description_note(notes: &[RemoteNote]) -> Option<&RemoteNote> {
    notes
        .iter()
        .filter(|note| note.is_description)
        .reduce(|best, note| match compare_created(note, best) {
            Ordering::Less => note,
            _ => best,
        })
}

fn compare_created(a: &RemoteNote, b: &RemoteNote) -> Ordering {
    match (a.created_at, b.created_at) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Description to send, falling back to the subject.
fn outgoing_description(ticket: &mut LocalTicket) -> Option<String> {
    if let Some(description) = ticket.non_empty_description() {
        return Some(description.to_string());
    }
    let subject = ticket.subject.clone().filter(|s| !s.trim().is_empty())?;
    ticket.description = Some(subject.clone());
    Some(subject)
}

/// Reconcile the local description with the remote description note.
///
/// Remote failures are logged and reported as [`DescriptionOutcome::Failed`];
/// they never abort the sync.
pub async fn sync_description<G: RemoteGateway>(
    mut ticket: LocalTicket,
    remote: &RemoteTicket,
    notes: &[RemoteNote],
    session: &Session<'_, G>,
) -> DescriptionSync {
    let note = select_description_note(notes).cloned();

    let outcome = match note.as_ref() {
        None => create_note(&mut ticket, remote, session).await,
        Some(note) => match (ticket.non_empty_description(), note.meaningful_text()) {
            (None, Some(text)) => {
                tracing::info!("Adopting remote description from note {}", note.id);
                ticket.description = Some(text.to_string());
                DescriptionOutcome::Pulled
            }
            (Some(local), Some(text)) if local == text => DescriptionOutcome::Unchanged,
            _ => match outgoing_description(&mut ticket) {
                Some(text) => patch_note(&text, note, remote, session).await,
                None => DescriptionOutcome::Unavailable,
            },
        },
    };

    DescriptionSync {
        ticket,
        note,
        outcome,
    }
}

async fn create_note<G: RemoteGateway>(
    ticket: &mut LocalTicket,
    remote: &RemoteTicket,
    session: &Session<'_, G>,
) -> DescriptionOutcome {
    let Some(text) = outgoing_description(ticket) else {
        tracing::warn!(
            "'{}' has neither description nor subject, skipping description",
            ticket.display_id()
        );
        return DescriptionOutcome::Unavailable;
    };

    let mut body = json!({
        "text": text,
        "detailDescriptionFlag": true,
    });
    if let Some(requester) = ticket.requester.as_deref() {
        body["member"] = json!({"identifier": requester});
    }

    let url = remote.notes_url();
    match session.call(&url, HttpMethod::Post, Some(&body)).await {
        Ok(_) => {
            tracing::info!("Posted description note for '{}'", ticket.display_id());
            DescriptionOutcome::Created
        }
        Err(e) => {
            tracing::warn!("Failed to post description note to {url}: {e}");
            DescriptionOutcome::Failed
        }
    }
}

async fn patch_note<G: RemoteGateway>(
    text: &str,
    note: &RemoteNote,
    remote: &RemoteTicket,
    session: &Session<'_, G>,
) -> DescriptionOutcome {
    let url = format!("{}/{}", remote.notes_url(), note.id);
    let body = match patch_body(&[PatchOp::replace("text", text)]) {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!("Cannot encode description patch: {e}");
            return DescriptionOutcome::Failed;
        }
    };
    match session.call(&url, HttpMethod::Patch, Some(&body)).await {
        Ok(_) => {
            tracing::info!("Patched description note {}", note.id);
            DescriptionOutcome::Patched
        }
        Err(e) => {
            tracing::warn!("Failed to patch description note {url}: {e}");
            DescriptionOutcome::Failed
        }
    }
}
