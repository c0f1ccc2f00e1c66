//! # Simulation Error Types
//!
//! Errors that cross a component boundary. Logical no-ops (cancelling an
//! unknown timer, requesting the current state) are not errors and never
//! show up here.

use oroboros_shared::EntityId;
use thiserror::Error;

/// Errors that can occur in the simulation core.
#[derive(Error, Debug)]
pub enum SimError {
    /// Reading a config or data file failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be parsed or failed validation.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The nav volume header carried the wrong magic number.
    #[error("bad nav volume magic: expected {expected:#010x}, found {found:#010x}")]
    BadMagic {
        /// Magic the loader expects.
        expected: i32,
        /// Magic found in the file.
        found: i32,
    },

    /// The nav volume stream is truncated or inconsistent.
    #[error("malformed nav volume: {0}")]
    NavDecode(String),

    /// The nav volume failed to load; queries cannot be answered.
    #[error("nav volume unavailable")]
    NavUnavailable,

    /// An id did not resolve to a live entity in the owning region.
    #[error("unknown entity {0}")]
    UnknownEntity(EntityId),

    /// Spawn with an id that is already in use.
    #[error("entity {0} already exists")]
    DuplicateEntity(EntityId),

    /// A mailbox was dropped by its owner.
    #[error("mailbox closed")]
    MailboxClosed,

    /// No mailbox is registered for this owner.
    #[error("no mailbox registered for owner {0}")]
    MailboxMissing(u64),

    /// The owner's mailbox is at capacity.
    #[error("mailbox for owner {0} is full")]
    MailboxFull(u64),
}

/// Result type for simulation operations.
pub type SimResult<T> = Result<T, SimError>;

impl From<toml::de::Error> for SimError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}
