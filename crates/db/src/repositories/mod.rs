//! Repository layer. Zero-sized structs whose async functions take any
//! Postgres executor, so the same query runs on a pool or inside a
//! caller-owned transaction (`&mut *tx`).

pub mod history_repo;
pub mod page_repo;
pub mod page_version_repo;
pub mod redirect_repo;
pub mod url_repo;

pub use history_repo::HistoryRepo;
pub use page_repo::PageRepo;
pub use page_version_repo::PageVersionRepo;
pub use redirect_repo::RedirectRepo;
pub use url_repo::UrlRepo;
