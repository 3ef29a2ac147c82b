//! Local ticket model.
//!
//! A [`LocalTicket`] is owned by the central ticketing system and handed to
//! the sync engine on every update. It carries identifiers for both sides,
//! the tracked fields, comments and a free-form parameter map.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Extra parameter guarding against duplicate remote ticket creation.
pub const CONNECTION_FAILED_PARAM: &str = "connectionFailed";

/// A comment attached to a local ticket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_id: Option<String>,
    /// Id of the matching remote note, set once the comment has been posted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[serde(default)]
    pub text: String,
    /// Epoch milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<i64>,
}

impl Comment {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_remote_id(mut self, id: impl Into<String>) -> Self {
        self.remote_id = Some(id.into());
        self
    }

    pub fn with_creator(mut self, creator: impl Into<String>) -> Self {
        self.creator = Some(creator.into());
        self
    }
}

/// Attachment metadata. Carried through a sync untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalTicket {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requester: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub extra_params: BTreeMap<String, String>,
    /// Epoch milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<i64>,
}

impl LocalTicket {
    /// Identifier used in logs and failures.
    pub fn display_id(&self) -> &str {
        self.local_id
            .as_deref()
            .or(self.remote_id.as_deref())
            .unwrap_or("<unsaved>")
    }

    pub fn has_remote_identity(&self) -> bool {
        self.remote_id.is_some() || self.remote_link.is_some()
    }

    /// Whether a previous sync already failed to find the remote ticket.
    ///
    /// The host is responsible for persisting `extra_params` between syncs;
    /// this flag is only as durable as that storage.
    pub fn connection_failed(&self) -> bool {
        self.extra_params
            .get(CONNECTION_FAILED_PARAM)
            .is_some_and(|v| v == "true")
    }

    pub fn set_connection_failed(&mut self, failed: bool) {
        self.extra_params.insert(
            CONNECTION_FAILED_PARAM.to_string(),
            failed.to_string(),
        );
    }

    /// Description if present and not blank.
    pub fn non_empty_description(&self) -> Option<&str> {
        self.description.as_deref().filter(|d| !d.trim().is_empty())
    }
}
