use reqwest::StatusCode;
use thiserror::Error;

use crate::ticket::LocalTicket;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("remote ticket could not be resolved: {0}")]
    Resolution(String),

    #[error("API error{}: {message}", fmt_status(.status))]
    Api {
        status: Option<StatusCode>,
        message: String,
    },

    #[error("unexpected response from {url}: {reason}")]
    UnexpectedResponse { url: String, reason: String },

    #[error("invalid remote timestamp '{0}'")]
    InvalidTimestamp(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml_ng::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("file watch error: {0}")]
    Watch(#[from] notify::Error),

    /// Terminal failure surfaced by a sync call, wrapping the original cause.
    /// Carries the ticket as it stood when the sync failed, including the
    /// retry guard and any identifiers assigned before the failure.
    #[error("cannot sync ticket '{}': {source}", ticket_id(.ticket))]
    Sync {
        ticket: Box<LocalTicket>,
        status: Option<StatusCode>,
        #[source]
        source: Box<BridgeError>,
    },
}

impl BridgeError {
    pub fn api(message: impl Into<String>, status: Option<StatusCode>) -> Self {
        BridgeError::Api {
            status,
            message: message.into(),
        }
    }

    /// HTTP status behind this error, looking through wrapped causes.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            BridgeError::Api { status, .. } => *status,
            BridgeError::Http(e) => e.status(),
            BridgeError::Sync { status, source, .. } => status.or_else(|| source.status()),
            _ => None,
        }
    }

    pub fn is_config(&self) -> bool {
        matches!(self, BridgeError::Config(_))
    }

    /// Wrap this error as the single failure returned to the sync caller.
    ///
    /// An error that is already a sync failure keeps the ticket it carries.
    pub fn into_sync_failure(self, ticket: LocalTicket) -> Self {
        if let BridgeError::Sync { .. } = self {
            return self;
        }
        BridgeError::Sync {
            ticket: Box::new(ticket),
            status: self.status(),
            source: Box::new(self),
        }
    }

    /// Ticket state at the time of a sync failure.
    pub fn ticket(&self) -> Option<&LocalTicket> {
        match self {
            BridgeError::Sync { ticket, .. } => Some(&**ticket),
            _ => None,
        }
    }

    pub fn into_ticket(self) -> Option<LocalTicket> {
        match self {
            BridgeError::Sync { ticket, .. } => Some(*ticket),
            _ => None,
        }
    }
}

fn fmt_status(status: &Option<StatusCode>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

fn ticket_id(ticket: &LocalTicket) -> &str {
    ticket.display_id()
}

pub type Result<T> = std::result::Result<T, BridgeError>;
