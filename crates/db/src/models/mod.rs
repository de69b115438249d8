pub mod history;
pub mod page;
pub mod page_version;
pub mod redirect;
pub mod url;
