//! Three-way comment merge.
//!
//! Local comments and remote notes are paired by remote id only. Shared
//! comments whose text diverged are patched, local-only comments are posted,
//! and remote-only notes are pulled into the ticket. Creator and timestamp
//! differences are not treated as divergence.

use std::collections::HashSet;

use serde_json::{Value, json};

use crate::mapper::FieldMapper;
use crate::remote::{
    HttpMethod, PatchOp, RemoteGateway, RemoteNote, RemoteTicket, Session, epoch_millis,
    patch_body, scalar_to_string,
};
use crate::ticket::{Comment, LocalTicket};

/// Counts of what the merge did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentSyncReport {
    pub patched: usize,
    pub posted: usize,
    pub pulled: usize,
    pub failed: usize,
}

/// Planned work, as indexes into the local comment list plus notes to pull.
#[derive(Debug, Default, PartialEq)]
pub struct CommentPlan<'a> {
    /// Local comment index and the id of the note to patch
    pub patches: Vec<(usize, String)>,
    pub posts: Vec<usize>,
    pub pulls: Vec<&'a RemoteNote>,
}

/// Work out which comments to patch, post and pull.
///
/// `exclude` is the description note's id, which takes no part in the merge.
pub fn plan_comments<'a>(
    comments: &[Comment],
    notes: &'a [RemoteNote],
    exclude: Option<&str>,
) -> CommentPlan<'a> {
    let mut plan = CommentPlan::default();

    for (index, comment) in comments.iter().enumerate() {
        if exclude.is_some() && comment.remote_id.as_deref() == exclude {
            continue;
        }
        let matched = comment
            .remote_id
            .as_deref()
            .and_then(|id| notes.iter().find(|note| note.id == id));
        match matched {
            Some(note) if note.text.as_deref() == Some(comment.text.as_str()) => {}
            Some(note) => plan.patches.push((index, note.id.clone())),
            None => plan.posts.push(index),
        }
    }

    let known: HashSet<&str> = comments.iter().filter_map(|c| c.remote_id.as_deref()).collect();
    plan.pulls = notes
        .iter()
        .filter(|note| Some(note.id.as_str()) != exclude && !known.contains(note.id.as_str()))
        .collect();

    plan
}

fn pulled_comment(note: &RemoteNote, mapper: &FieldMapper<'_>) -> Comment {
    let last_modified = note.created_at.and_then(|dt| match epoch_millis(dt) {
        Ok(ms) => Some(ms),
        Err(e) => {
            tracing::warn!("Note {}: {e}", note.id);
            None
        }
    });
    Comment {
        local_id: None,
        remote_id: Some(note.id.clone()),
        creator: note.created_by.as_deref().map(|u| mapper.user_to_local(u)),
        text: note.text.clone().unwrap_or_default(),
        last_modified,
    }
}

fn patch_ops(comment: &Comment, mapper: &FieldMapper<'_>) -> Vec<PatchOp> {
    let mut ops = Vec::new();
    if let Some(creator) = comment.creator.as_deref() {
        ops.push(PatchOp::replace("member/identifier", mapper.user_to_remote(creator)));
    }
    ops.push(PatchOp::replace("text", comment.text.as_str()));
    ops
}

fn post_body(comment: &Comment, mapper: &FieldMapper<'_>) -> Value {
    let mut body = json!({
        "text": comment.text,
        "internalAnalysisFlag": true,
    });
    if let Some(creator) = comment.creator.as_deref() {
        body["member"] = json!({"identifier": mapper.user_to_remote(creator)});
    }
    body
}

/// Merge the ticket's comments with the remote notes.
///
/// Every PATCH is sent before any POST. A failure on one comment is logged and
/// counted; the rest still go through.
pub async fn sync_comments<G: RemoteGateway>(
    mut ticket: LocalTicket,
    remote: &RemoteTicket,
    notes: &[RemoteNote],
    description_note: Option<&RemoteNote>,
    mapper: &FieldMapper<'_>,
    session: &Session<'_, G>,
) -> (LocalTicket, CommentSyncReport) {
    let exclude = description_note.map(|note| note.id.as_str());
    let plan = plan_comments(&ticket.comments, notes, exclude);
    let mut report = CommentSyncReport::default();
    let notes_url = remote.notes_url();

    let pulled: Vec<Comment> = plan.pulls.iter().map(|note| pulled_comment(note, mapper)).collect();

    for (index, note_id) in &plan.patches {
        let url = format!("{notes_url}/{note_id}");
        let result = match patch_body(&patch_ops(&ticket.comments[*index], mapper)) {
            Ok(body) => session.call(&url, HttpMethod::Patch, Some(&body)).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(_) => report.patched += 1,
            Err(e) => {
                tracing::warn!("Failed to patch comment note {url}: {e}");
                report.failed += 1;
            }
        }
    }

    for index in &plan.posts {
        let body = post_body(&ticket.comments[*index], mapper);
        match session.call(&notes_url, HttpMethod::Post, Some(&body)).await {
            Ok(document) => {
                let id = document
                    .as_ref()
                    .and_then(|doc| doc.get("id"))
                    .and_then(scalar_to_string)
                    .filter(|id| id != "null");
                match id {
                    Some(id) => ticket.comments[*index].remote_id = Some(id),
                    None => tracing::warn!("POST {notes_url} returned no note id"),
                }
                report.posted += 1;
            }
            Err(e) => {
                tracing::warn!("Failed to post comment to {notes_url}: {e}");
                report.failed += 1;
            }
        }
    }

    report.pulled = pulled.len();
    ticket.comments.extend(pulled);

    (ticket, report)
}
