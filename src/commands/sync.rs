//! `sync`: reconcile one local ticket, read from a JSON file, with the remote
//! ticketing system and write the updated ticket back.

use std::fs;
use std::path::{Path, PathBuf};

use owo_colors::OwoColorize;
use serde_json::json;
use uuid::Uuid;

use super::{CommandOutput, OutputOptions};
use crate::config::{ConfigHandle, ConfigService, FileConfigService};
use crate::error::{BridgeError, Result};
use crate::remote::HttpGateway;
use crate::sync::SyncEngine;
use crate::ticket::LocalTicket;

pub struct SyncOptions {
    /// JSON file holding the local ticket
    pub ticket_path: PathBuf,
    pub config_path: PathBuf,
    /// Where to write the updated ticket; defaults to `ticket_path`
    pub output_path: Option<PathBuf>,
    pub account_id: Option<Uuid>,
}

fn read_ticket(path: &Path) -> Result<LocalTicket> {
    let content = fs::read_to_string(path)
        .map_err(|e| BridgeError::Config(format!("cannot read ticket {}: {}", path.display(), e)))?;
    Ok(serde_json::from_str(&content)?)
}

fn write_ticket(path: &Path, ticket: &LocalTicket) -> Result<()> {
    let mut content = serde_json::to_string_pretty(ticket)?;
    content.push('\n');
    fs::write(path, content)?;
    Ok(())
}

/// Sync a ticket file
pub async fn cmd_sync(options: SyncOptions, output: OutputOptions) -> Result<()> {
    let ticket = read_ticket(&options.ticket_path)?;

    let service = FileConfigService::new(&options.config_path);
    let account_id = options.account_id.unwrap_or_else(Uuid::nil);
    let config = ConfigHandle::new(service.retrieve_config(account_id)?);
    let engine = SyncEngine::new(HttpGateway::new()?, config);

    let output_path = options.output_path.as_deref().unwrap_or(&options.ticket_path);
    let report = match engine.sync_with_report(ticket.clone()).await {
        Ok(report) => report,
        Err(e) => {
            // Keep the retry guard and any new remote id for the next run.
            if let Some(failed) = e.ticket()
                && *failed != ticket
            {
                write_ticket(output_path, failed)?;
                tracing::info!("Partial sync state written to {}", output_path.display());
            }
            return Err(e);
        }
    };
    write_ticket(output_path, &report.ticket)?;

    let ticket = &report.ticket;
    let json_output = json!({
        "ticket": ticket,
        "resolved_by": report.resolved_by.as_str(),
        "field_patches": report.field_patches,
        "description": report.description.as_str(),
        "comments": {
            "patched": report.comments.patched,
            "posted": report.comments.posted,
            "pulled": report.comments.pulled,
            "failed": report.comments.failed,
        },
        "output": output_path.to_string_lossy(),
    });

    let mut text = format!(
        "Synced {} -> {} ({})\n",
        ticket.display_id().cyan(),
        ticket.remote_link.as_deref().unwrap_or("?"),
        report.resolved_by.as_str()
    );
    text.push_str(&format!("  Fields patched: {}\n", report.field_patches.len()));
    text.push_str(&format!("  Description: {}\n", report.description.as_str()));
    text.push_str(&format!(
        "  Comments: {} patched, {} posted, {} pulled",
        report.comments.patched, report.comments.posted, report.comments.pulled
    ));
    if report.comments.failed > 0 {
        text.push_str(&format!(", {}", format!("{} failed", report.comments.failed).yellow()));
    }
    text.push('\n');
    text.push_str(&format!("{}", format!("Written to {}", output_path.display()).dimmed()));

    CommandOutput::new(json_output).with_text(text).print(output)
}
