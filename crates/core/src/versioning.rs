//! Page version lifecycle.
//!
//! ```text
//! draft ──► scheduled ──► published ──► archived
//!   │  ▲        │
//!   │  └────────┘ (un-schedule)
//!   └──► discarded
//! draft ──────────────► published
//! ```
//!
//! `archived` and `discarded` are terminal. A version only becomes `archived`
//! when a sibling version of the same page is published.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::UnknownVariant;
use crate::types::Timestamp;

/// The first version number of every page.
pub const INITIAL_VERSION: i32 = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionStatus {
    #[default]
    Draft,
    Scheduled,
    Published,
    Archived,
    Discarded,
}

impl VersionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Scheduled => "scheduled",
            Self::Published => "published",
            Self::Archived => "archived",
            Self::Discarded => "discarded",
        }
    }

    /// Only plain drafts accept payload edits; a scheduled version has to be
    /// un-scheduled first.
    pub fn is_editable(&self) -> bool {
        matches!(self, Self::Draft)
    }

    /// Versions that may be published or discarded.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Draft | Self::Scheduled)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Archived | Self::Discarded)
    }

    /// Whether `self → next` is a legal transition.
    pub fn can_transition_to(&self, next: VersionStatus) -> bool {
        use VersionStatus::*;
        matches!(
            (self, next),
            (Draft, Scheduled)
                | (Draft, Published)
                | (Draft, Discarded)
                | (Scheduled, Published)
                | (Scheduled, Draft)
                | (Scheduled, Discarded)
                | (Published, Archived)
        )
    }
}

impl fmt::Display for VersionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VersionStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "scheduled" => Ok(Self::Scheduled),
            "published" => Ok(Self::Published),
            "archived" => Ok(Self::Archived),
            "discarded" => Ok(Self::Discarded),
            other => Err(UnknownVariant {
                kind: "version status",
                value: other.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for VersionStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// What `publish` should do with a pending version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishDecision {
    /// Park the version until the given time.
    Schedule(Timestamp),
    /// Publish right away.
    Now,
}

/// Decide between scheduling and publishing.
///
/// A requested time strictly after `now` schedules; anything else (no time,
/// or a time already reached) publishes immediately. A version that is
/// already scheduled and has no new time keeps its stored time.
pub fn publish_decision(
    status: VersionStatus,
    requested_at: Option<Timestamp>,
    stored_at: Option<Timestamp>,
    now: Timestamp,
) -> PublishDecision {
    let at = match (status, requested_at) {
        (_, Some(at)) => Some(at),
        (VersionStatus::Scheduled, None) => stored_at,
        (_, None) => None,
    };
    match at {
        Some(at) if at > now => PublishDecision::Schedule(at),
        _ => PublishDecision::Now,
    }
}

/// Whether a scheduled version's time has arrived.
pub fn is_due(scheduled_at: Option<Timestamp>, now: Timestamp) -> bool {
    scheduled_at.is_some_and(|at| at <= now)
}

/// Number for the next version given the current maximum (0 when none).
///
/// `None` once the numbering space is exhausted; numbers are never reused.
pub fn next_version_number(current_max: i32) -> Option<i32> {
    current_max.checked_add(1).map(|n| n.max(INITIAL_VERSION))
}

/// Opaque token for unauthenticated preview links.
pub fn new_preview_key() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
