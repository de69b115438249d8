//! Domain logic for the Quire content store.
//!
//! Everything in this crate is pure: no database, no network, no global
//! state. The persistence-backed services in `quire-content` call into these
//! modules for the rules (slug syntax, version transitions, attribute
//! validation) and keep only the I/O for themselves.

pub mod access;
pub mod attribute;
pub mod clock;
pub mod error;
pub mod history;
pub mod page_type;
pub mod pagination;
pub mod slug;
pub mod types;
pub mod url;
pub mod versioning;
