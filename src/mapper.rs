//! Translation of enumerated values between the local and remote vocabularies.

use std::collections::BTreeMap;

use crate::config::{Mapping, SyncConfig};

/// Which direction a value is being translated in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ToRemote,
    ToLocal,
}

/// Which lookup table to use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vocabulary {
    Priority,
    Status,
    User,
}

impl Vocabulary {
    fn name(self) -> &'static str {
        match self {
            Vocabulary::Priority => "priority",
            Vocabulary::Status => "status",
            Vocabulary::User => "user",
        }
    }
}

/// Looks values up in the configured mapping tables.
///
/// Values without a mapping pass through unchanged, so a ticket using a
/// vocabulary the configuration does not cover still round-trips.
#[derive(Debug, Clone, Copy)]
pub struct FieldMapper<'a> {
    config: &'a SyncConfig,
}

impl<'a> FieldMapper<'a> {
    pub fn new(config: &'a SyncConfig) -> Self {
        Self { config }
    }

    pub fn translate(&self, vocabulary: Vocabulary, direction: Direction, value: &str) -> String {
        let table = self.table(vocabulary, direction);
        match table.get(value) {
            Some(mapped) => mapped.clone(),
            None => {
                tracing::debug!(
                    "No {} mapping for '{}' ({:?}), passing through",
                    vocabulary.name(),
                    value,
                    direction
                );
                value.to_string()
            }
        }
    }

    pub fn priority_to_remote(&self, value: &str) -> String {
        self.translate(Vocabulary::Priority, Direction::ToRemote, value)
    }

    pub fn priority_to_local(&self, value: &str) -> String {
        self.translate(Vocabulary::Priority, Direction::ToLocal, value)
    }

    pub fn status_to_remote(&self, value: &str) -> String {
        self.translate(Vocabulary::Status, Direction::ToRemote, value)
    }

    pub fn status_to_local(&self, value: &str) -> String {
        self.translate(Vocabulary::Status, Direction::ToLocal, value)
    }

    pub fn user_to_remote(&self, value: &str) -> String {
        self.translate(Vocabulary::User, Direction::ToRemote, value)
    }

    pub fn user_to_local(&self, value: &str) -> String {
        self.translate(Vocabulary::User, Direction::ToLocal, value)
    }

    fn table(&self, vocabulary: Vocabulary, direction: Direction) -> &'a BTreeMap<String, String> {
        let mapping: &'a Mapping = match vocabulary {
            Vocabulary::Priority => &self.config.priority,
            Vocabulary::Status => &self.config.status,
            Vocabulary::User => &self.config.user,
        };
        match direction {
            Direction::ToRemote => &mapping.to_remote,
            Direction::ToLocal => &mapping.to_local,
        }
    }
}
