//! Shared fixtures for the content integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use quire_content::PageStore;
use quire_core::access::{AccessPolicy, Capability};
use quire_core::clock::{Clock, ManualClock};
use quire_core::page_type::{Attributes, AttributeSpec, PageTypeDefinition, PageTypeRegistry};
use quire_core::types::{DbId, Timestamp};
use serde_json::{json, Value};
use sqlx::PgPool;

pub const EDITOR: DbId = 1;
pub const OTHER_EDITOR: DbId = 2;
pub const VIEWER: DbId = 99;

pub fn t0() -> Timestamp {
    Utc.with_ymd_and_hms(2026, 6, 1, 8, 0, 0).unwrap()
}

/// "article" (title required, body, featured, priority) and "leaf"
/// (no sub pages) on top of the built-in attribute types.
pub fn registry() -> Arc<PageTypeRegistry> {
    let article = PageTypeDefinition::new(
        "article",
        "Article",
        vec![
            AttributeSpec::new("title", "Title", "textline", true),
            AttributeSpec::new("body", "Body", "textarea", false),
            AttributeSpec::new("featured", "Featured", "boolean", false),
            AttributeSpec::new("priority", "Priority", "integer", false),
        ],
    );
    let mut leaf = PageTypeDefinition::new(
        "leaf",
        "Leaf",
        vec![AttributeSpec::new("title", "Title", "textline", true)],
    );
    leaf.allows_sub_pages = false;

    let registry = PageTypeRegistry::builder()
        .with_builtin_attribute_types()
        .page_types([article, leaf])
        .build()
        .expect("test registry builds");
    Arc::new(registry)
}

pub struct Fixture {
    pub store: PageStore,
    pub clock: Arc<ManualClock>,
}

pub fn fixture(pool: PgPool) -> Fixture {
    let clock = Arc::new(ManualClock::new(t0()));
    let store = PageStore::new(pool, registry(), clock.clone() as Arc<dyn Clock>);
    Fixture { store, clock }
}

/// Only `EDITOR` and `OTHER_EDITOR` may change anything.
pub struct EditorsOnly;

impl AccessPolicy for EditorsOnly {
    fn allows(&self, actor_id: DbId, _capability: Capability) -> bool {
        actor_id == EDITOR || actor_id == OTHER_EDITOR
    }
}

pub fn attrs(value: Value) -> Attributes {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

pub fn titled(title: &str) -> Attributes {
    attrs(json!({ "title": title }))
}

/// Create an article, save `title` into version 1 and publish it.
pub async fn published_article(store: &PageStore, title: &str, parent: Option<DbId>) -> DbId {
    let page = store.create("article", EDITOR, parent).await.unwrap();
    store
        .save_draft_version(page.id, 1, &titled(title), EDITOR)
        .await
        .unwrap();
    store.publish_version(page.id, 1, EDITOR, None).await.unwrap();
    page.id
}
