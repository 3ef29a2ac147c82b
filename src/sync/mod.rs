//! The sync engine.
//!
//! One call to [`SyncEngine::sync`] reconciles one local ticket with its
//! remote counterpart:
//!
//! 1. resolve (or create) the remote ticket
//! 2. reconcile tracked fields and send one batched PATCH
//! 3. reconcile the description note
//! 4. merge the remaining comments
//!
//! Remote calls run one after another. The configuration snapshot is taken
//! once at the start and shared by every remote call, so an update arriving
//! mid-sync applies to the next sync.

pub mod comments;
pub mod description;
pub mod fields;
pub mod resolver;

use uuid::Uuid;

use crate::config::{ConfigHandle, ConfigService};
use crate::error::Result;
use crate::mapper::FieldMapper;
use crate::remote::{HttpMethod, PatchOp, RemoteGateway, Session, parse_notes};
use crate::ticket::LocalTicket;

pub use comments::{CommentSyncReport, sync_comments};
pub use description::{DescriptionOutcome, DescriptionSync, select_description_note, sync_description};
pub use fields::{FieldDecision, TrackedField, ValueKind, reconcile_field, reconcile_fields};
pub use resolver::{Resolution, ResolvedBy, resolve};

/// Everything a sync did, alongside the updated ticket
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub ticket: LocalTicket,
    pub resolved_by: ResolvedBy,
    pub field_patches: Vec<PatchOp>,
    pub description: DescriptionOutcome,
    pub comments: CommentSyncReport,
}

pub struct SyncEngine<G> {
    gateway: G,
    config: ConfigHandle,
}

impl<G: RemoteGateway> SyncEngine<G> {
    pub fn new(gateway: G, config: ConfigHandle) -> Self {
        Self { gateway, config }
    }

    /// Build an engine whose configuration follows `service` for `account_id`.
    pub fn connect<S: ConfigService + ?Sized>(
        gateway: G,
        service: &S,
        account_id: Uuid,
    ) -> Result<Self> {
        let config = ConfigHandle::from_service(service, account_id)?;
        Ok(Self::new(gateway, config))
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn config(&self) -> &ConfigHandle {
        &self.config
    }

    /// Reconcile `ticket` with the remote system and return it updated.
    ///
    /// Any fatal failure is returned as a single [`BridgeError::Sync`]
    /// carrying the HTTP status when one is known.
    ///
    /// [`BridgeError::Sync`]: crate::error::BridgeError::Sync
    pub async fn sync(&self, ticket: LocalTicket) -> Result<LocalTicket> {
        Ok(self.sync_with_report(ticket).await?.ticket)
    }

    /// Like [`sync`](Self::sync), also reporting what was done.
    ///
    /// On failure the returned [`BridgeError::Sync`] carries the ticket as far
    /// as it got, including the retry guard and any newly assigned remote id.
    /// The caller should keep that ticket for the next attempt.
    ///
    /// [`BridgeError::Sync`]: crate::error::BridgeError::Sync
    pub async fn sync_with_report(&self, ticket: LocalTicket) -> Result<SyncReport> {
        let config = self.config.snapshot();
        let session = Session::new(&self.gateway, &config);
        let mapper = FieldMapper::new(&config);

        let Resolution {
            ticket,
            remote,
            resolved_by,
        } = resolve(ticket, &session).await?;
        tracing::info!(
            "'{}' resolved by {} to {}",
            ticket.display_id(),
            resolved_by.as_str(),
            remote.url
        );

        let (ticket, field_patches) = reconcile_fields(ticket, &remote, &mapper);
        if let Err(e) = fields::apply_field_patches(&remote, &field_patches, &session).await {
            return Err(e.into_sync_failure(ticket));
        }

        let notes_url = remote.notes_url();
        let notes = match session.call(&notes_url, HttpMethod::Get, None).await {
            Ok(document) => parse_notes(&notes_url, document),
            Err(e) => Err(e),
        };
        let notes = match notes {
            Ok(notes) => notes,
            Err(e) => return Err(e.into_sync_failure(ticket)),
        };

        let DescriptionSync {
            ticket,
            note,
            outcome,
        } = sync_description(ticket, &remote, &notes, &session).await;

        let (ticket, comments) = sync_comments(
            ticket,
            &remote,
            &notes,
            note.as_ref(),
            &mapper,
            &session,
        )
        .await;

        tracing::info!(
            "'{}' synced: {} field patches, description {}, comments {:?}",
            ticket.display_id(),
            field_patches.len(),
            outcome.as_str(),
            comments
        );

        Ok(SyncReport {
            ticket,
            resolved_by,
            field_patches,
            description: outcome,
            comments,
        })
    }
}
