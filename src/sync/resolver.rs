//! Locating (or creating) the remote counterpart of a local ticket.
//!
//! Lookup goes by remote link first, then by remote id. When both fail the
//! `connectionFailed` guard decides between creating a replacement ticket and
//! giving up, so repeated failures never produce a second remote ticket.

use serde_json::json;
use url::Url;

use crate::config::SyncConfig;
use crate::error::{BridgeError, Result};
use crate::remote::{HttpMethod, RemoteGateway, RemoteTicket, Session, scalar_to_string};
use crate::ticket::LocalTicket;

/// Summary used when a ticket has neither subject nor description.
pub const PLACEHOLDER_SUBJECT: &str = "[ticketbridge] New ticket";

/// Appended to the subject when a previously linked remote ticket is gone.
pub const NOT_FOUND_SUFFIX: &str = " - ERROR: previous synced ticket not found";

/// How the remote ticket was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedBy {
    Link,
    Id,
    Created,
}

impl ResolvedBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolvedBy::Link => "link",
            ResolvedBy::Id => "id",
            ResolvedBy::Created => "created",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Resolution {
    pub ticket: LocalTicket,
    pub remote: RemoteTicket,
    pub resolved_by: ResolvedBy,
}

/// Find or create the remote ticket, then bring the stored id and link in line
/// with what was resolved.
///
/// Failures come back as [`BridgeError::Sync`] carrying the ticket with any
/// retry guard or subject annotation already applied, so the caller can keep
/// them for the next attempt.
pub async fn resolve<G: RemoteGateway>(
    mut ticket: LocalTicket,
    session: &Session<'_, G>,
) -> Result<Resolution> {
    match locate_or_create(&mut ticket, session).await {
        Ok((remote, resolved_by)) => {
            let ticket = reconcile_identifiers(ticket, &remote, resolved_by, session.config());
            Ok(Resolution {
                ticket,
                remote,
                resolved_by,
            })
        }
        Err(e) => Err(e.into_sync_failure(ticket)),
    }
}

async fn locate_or_create<G: RemoteGateway>(
    ticket: &mut LocalTicket,
    session: &Session<'_, G>,
) -> Result<(RemoteTicket, ResolvedBy)> {
    if ticket.has_remote_identity() {
        if let Some(found) = lookup(ticket, session).await? {
            ticket.set_connection_failed(false);
            return Ok(found);
        }

        if ticket.connection_failed() {
            return Err(BridgeError::Resolution(format!(
                "remote ticket for '{}' not found and a previous attempt already failed",
                ticket.display_id()
            )));
        }
        tracing::warn!(
            "Remote ticket for '{}' not found, creating a replacement",
            ticket.display_id()
        );
        ticket.set_connection_failed(true);
        let subject = ticket.subject.take().unwrap_or_else(|| PLACEHOLDER_SUBJECT.to_string());
        ticket.subject = Some(format!("{subject}{NOT_FOUND_SUFFIX}"));
    }

    let remote = create(ticket, session).await?;
    Ok((remote, ResolvedBy::Created))
}

/// Try the remote link, then the remote id.
///
/// Transport and parse failures only mean "not found here"; configuration
/// errors are returned immediately.
pub async fn lookup<G: RemoteGateway>(
    ticket: &LocalTicket,
    session: &Session<'_, G>,
) -> Result<Option<(RemoteTicket, ResolvedBy)>> {
    if let Some(link) = ticket.remote_link.as_deref()
        && let Some(remote) = fetch(link, session).await?
    {
        return Ok(Some((remote, ResolvedBy::Link)));
    }

    if let Some(id) = ticket.remote_id.as_deref() {
        match session.config().ticket_url(id) {
            Some(url) => {
                if let Some(remote) = fetch(&url, session).await? {
                    return Ok(Some((remote, ResolvedBy::Id)));
                }
            }
            None => tracing::warn!("Cannot look up remote ticket {id}: url or api_path not configured"),
        }
    }

    Ok(None)
}

async fn fetch<G: RemoteGateway>(url: &str, session: &Session<'_, G>) -> Result<Option<RemoteTicket>> {
    match session.call(url, HttpMethod::Get, None).await {
        Ok(Some(document)) => Ok(Some(RemoteTicket::new(url, document))),
        Ok(None) => {
            tracing::warn!("GET {url} returned no ticket document");
            Ok(None)
        }
        Err(e) if e.is_config() => Err(e),
        Err(e) => {
            tracing::warn!("Lookup of {url} failed: {e}");
            Ok(None)
        }
    }
}

/// POST a new remote ticket carrying the subject and routing attributes.
pub async fn create<G: RemoteGateway>(
    ticket: &LocalTicket,
    session: &Session<'_, G>,
) -> Result<RemoteTicket> {
    let config = session.config();
    let tickets_url = config.tickets_url()?;
    let summary = ticket
        .subject
        .as_deref()
        .or(ticket.non_empty_description())
        .unwrap_or(PLACEHOLDER_SUBJECT);
    let body = json!({
        "summary": summary,
        "board": {"id": config.ticket_source.board_id},
        "company": {"id": config.ticket_source.company_id},
    });

    let document = session
        .call(&tickets_url, HttpMethod::Post, Some(&body))
        .await?
        .ok_or_else(|| BridgeError::UnexpectedResponse {
            url: tickets_url.clone(),
            reason: "ticket creation returned no document".to_string(),
        })?;
    let id = document
        .get("id")
        .and_then(scalar_to_string)
        .filter(|id| id != "null")
        .ok_or_else(|| BridgeError::UnexpectedResponse {
            url: tickets_url.clone(),
            reason: "created ticket has no id".to_string(),
        })?;

    tracing::info!("Created remote ticket {id} for '{}'", ticket.display_id());
    Ok(RemoteTicket::new(format!("{tickets_url}/{id}"), document))
}

/// Make the stored remote id and link agree.
///
/// When the ticket was found through its link the link wins and the id is
/// re-derived from it; otherwise the id wins and the link is rebuilt.
pub fn reconcile_identifiers(
    mut ticket: LocalTicket,
    remote: &RemoteTicket,
    resolved_by: ResolvedBy,
    config: &SyncConfig,
) -> LocalTicket {
    match resolved_by {
        ResolvedBy::Link => {
            let id = id_from_link(&remote.url);
            if id.is_some() && ticket.remote_id != id {
                tracing::info!(
                    "Remote id of '{}' updated from link: {:?} -> {:?}",
                    ticket.display_id(),
                    ticket.remote_id,
                    id
                );
                ticket.remote_id = id;
            }
        }
        ResolvedBy::Id | ResolvedBy::Created => {
            let id = match resolved_by {
                ResolvedBy::Created => remote.id().or_else(|| id_from_link(&remote.url)),
                _ => ticket.remote_id.clone(),
            };
            ticket.remote_id = id.clone();
            if let Some(link) = id.as_deref().and_then(|id| config.ticket_url(id))
                && ticket.remote_link.as_deref() != Some(link.as_str())
            {
                tracing::info!(
                    "Remote link of '{}' updated from id: {link}",
                    ticket.display_id()
                );
                ticket.remote_link = Some(link);
            }
        }
    }
    ticket
}

/// Trailing non-empty path segment of a ticket link.
pub fn id_from_link(link: &str) -> Option<String> {
    let from_url = Url::parse(link).ok().and_then(|url| {
        url.path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
            .map(String::from)
    });
    from_url.or_else(|| {
        link.trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .map(String::from)
    })
}
