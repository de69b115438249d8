//! Background jobs for the content store.

pub mod config;
pub mod delayed_publish;

pub use config::WorkerConfig;
pub use delayed_publish::{DelayedPublisher, SweepReport};
