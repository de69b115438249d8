use std::path::Path;

use quire_core::page_type::{PageTypeDefinition, PageTypeRegistry, RegistryError};

/// Worker configuration loaded from environment variables.
///
/// | Env Var                          | Default     |
/// |----------------------------------|-------------|
/// | `DATABASE_URL`                   | (required)  |
/// | `DATABASE_MAX_CONNECTIONS`       | `10`        |
/// | `DELAYED_PUBLISH_INTERVAL_SECS`  | `60`        |
/// | `DELAYED_PUBLISH_BATCH_SIZE`     | `100`       |
/// | `DELAYED_PUBLISH_RUN_ONCE`       | `false`     |
/// | `PAGE_TYPES_FILE`                | (built-ins) |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    pub database_url: String,
    pub max_connections: u32,
    /// Seconds between two sweeps.
    pub interval_secs: u64,
    /// Most versions a single sweep publishes.
    pub batch_size: i64,
    /// Sweep once and exit instead of looping.
    pub run_once: bool,
    /// JSON list of page type definitions. Built-in types when unset.
    pub page_types_file: Option<String>,
}

impl WorkerConfig {
    /// Load configuration from the process environment.
    ///
    /// Panics on a missing `DATABASE_URL` or an unparsable value, like the
    /// rest of start-up.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let database_url = var("DATABASE_URL").expect("DATABASE_URL must be set");

        let max_connections: u32 = var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|| "10".into())
            .parse()
            .expect("DATABASE_MAX_CONNECTIONS must be a valid u32");

        let interval_secs: u64 = var("DELAYED_PUBLISH_INTERVAL_SECS")
            .unwrap_or_else(|| "60".into())
            .parse()
            .expect("DELAYED_PUBLISH_INTERVAL_SECS must be a valid u64");

        let batch_size: i64 = var("DELAYED_PUBLISH_BATCH_SIZE")
            .unwrap_or_else(|| "100".into())
            .parse()
            .expect("DELAYED_PUBLISH_BATCH_SIZE must be a valid i64");

        let run_once = var("DELAYED_PUBLISH_RUN_ONCE")
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let page_types_file = var("PAGE_TYPES_FILE").filter(|v| !v.trim().is_empty());

        Self {
            database_url,
            max_connections: max_connections.max(1),
            interval_secs: interval_secs.max(1),
            batch_size: batch_size.max(1),
            run_once,
            page_types_file,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PageTypesError {
    #[error("could not read page types file: {0}")]
    Read(#[from] std::io::Error),

    #[error("page types file is not a valid JSON list of page types: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Build the page type registry: built-in types, or the definitions in
/// `path` on top of the built-in attribute types.
pub fn load_page_types(path: Option<&Path>) -> Result<PageTypeRegistry, PageTypesError> {
    let Some(path) = path else {
        return Ok(PageTypeRegistry::with_defaults());
    };
    let json = std::fs::read_to_string(path)?;
    let definitions = PageTypeDefinition::list_from_json(&json)?;
    let registry = PageTypeRegistry::builder()
        .with_builtin_attribute_types()
        .page_types(definitions)
        .build()?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply() {
        let config = WorkerConfig::from_vars(lookup(&[("DATABASE_URL", "postgres://db/quire")]));
        assert_eq!(config.database_url, "postgres://db/quire");
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.interval_secs, 60);
        assert_eq!(config.batch_size, 100);
        assert!(!config.run_once);
        assert!(config.page_types_file.is_none());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = WorkerConfig::from_vars(lookup(&[
            ("DATABASE_URL", "postgres://db/quire"),
            ("DATABASE_MAX_CONNECTIONS", "4"),
            ("DELAYED_PUBLISH_INTERVAL_SECS", "0"),
            ("DELAYED_PUBLISH_BATCH_SIZE", "25"),
            ("DELAYED_PUBLISH_RUN_ONCE", "True"),
            ("PAGE_TYPES_FILE", "/etc/quire/page-types.json"),
        ]));
        assert_eq!(config.max_connections, 4);
        assert_eq!(config.interval_secs, 1);
        assert_eq!(config.batch_size, 25);
        assert!(config.run_once);
        assert_eq!(
            config.page_types_file.as_deref(),
            Some("/etc/quire/page-types.json")
        );
    }

    #[test]
    #[should_panic(expected = "DATABASE_URL must be set")]
    fn database_url_is_required() {
        WorkerConfig::from_vars(lookup(&[]));
    }

    #[test]
    #[should_panic(expected = "DELAYED_PUBLISH_BATCH_SIZE")]
    fn bad_numbers_panic() {
        WorkerConfig::from_vars(lookup(&[
            ("DATABASE_URL", "postgres://db/quire"),
            ("DELAYED_PUBLISH_BATCH_SIZE", "many"),
        ]));
    }

    #[test]
    fn built_in_page_types_without_a_file() {
        let registry = load_page_types(None).unwrap();
        assert!(registry.page_type("page").is_ok());
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = load_page_types(Some(Path::new("/nonexistent/page-types.json"))).unwrap_err();
        assert!(matches!(err, PageTypesError::Read(_)));
    }
}
