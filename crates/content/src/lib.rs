//! Content services: the URL registry, the history ledger, and the page
//! store that drives the draft/publish lifecycle.
//!
//! Every mutating operation runs in one explicit transaction. Page
//! transitions lock the page row first; URL registry writes additionally
//! take a registry-wide advisory lock.

pub mod error;
pub mod history_ledger;
pub mod page_store;
pub mod url_registry;

pub use error::{ContentError, ContentResult};
pub use history_ledger::HistoryLedger;
pub use page_store::{DiscardOutcome, PageStore, PublishOutcome, Resolution};
pub use url_registry::{UrlRegistry, WildcardTarget};
