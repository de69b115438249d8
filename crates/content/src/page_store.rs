//! Page tree and version lifecycle.
//!
//! Every transition locks the page row (`SELECT ... FOR UPDATE`) before it
//! reads the version it acts on, so interactive and scheduled publishes of
//! the same page serialise. History records are appended on the same
//! transaction as the change they describe.

use std::collections::HashSet;
use std::sync::Arc;

use quire_core::access::{require, AccessPolicy, AllowAll, Capability};
use quire_core::clock::Clock;
use quire_core::error::CoreError;
use quire_core::history::{
    ACTION_CREATED, ACTION_DELAYED_PUBLISH_FAILED, ACTION_DISCARDED, ACTION_NEW_VERSION,
    ACTION_ORDER_CHANGED, ACTION_PUBLISHED, ACTION_PURGED, ACTION_RESTORED, ACTION_SAVED,
    ACTION_SCHEDULED, ACTION_TRASHED, ACTION_UNSCHEDULED, SUBJECT_PAGE,
};
use quire_core::page_type::{Attributes, PageTypeRegistry};
use quire_core::pagination::{Paginated, Pagination};
use quire_core::slug;
use quire_core::types::{DbId, Timestamp};
use quire_core::url::{RedirectKind, UrlKind};
use quire_core::versioning::{
    is_due, new_preview_key, next_version_number, publish_decision, PublishDecision,
    VersionStatus, INITIAL_VERSION,
};
use quire_db::models::history::HistoryRecord;
use quire_db::models::page::{CreatePage, Page, PageOrder};
use quire_db::models::page_version::{CreatePageVersion, PageVersion};
use quire_db::repositories::{PageRepo, PageVersionRepo, RedirectRepo, UrlRepo};
use serde::Serialize;
use serde_json::json;
use sqlx::{PgConnection, PgPool};

use crate::error::ContentResult;
use crate::history_ledger::HistoryLedger;
use crate::url_registry::UrlRegistry;

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Result of discarding a pending version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DiscardOutcome {
    pub page_id: DbId,
    pub parent_page_id: Option<DbId>,
    /// The discarded version was the page's first one; callers usually
    /// navigate to the parent instead of the page.
    pub was_initial: bool,
}

/// Result of a publish request.
#[derive(Debug, Clone)]
pub enum PublishOutcome {
    /// Parked until the given time.
    Scheduled(PageVersion),
    /// Live now.
    Published(PageVersion),
}

impl PublishOutcome {
    pub fn version(&self) -> &PageVersion {
        match self {
            PublishOutcome::Scheduled(version) | PublishOutcome::Published(version) => version,
        }
    }
}

/// What a request slug resolves to.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// A live page and its published version.
    Page { page: Page, version: PageVersion },
    /// A configured redirect.
    Redirect {
        destination: String,
        kind: RedirectKind,
    },
    /// The content moved; the request belongs at `slug`.
    Moved { slug: String },
}

// ---------------------------------------------------------------------------
// PageStore
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PageStore {
    pool: PgPool,
    registry: Arc<PageTypeRegistry>,
    clock: Arc<dyn Clock>,
    policy: Arc<dyn AccessPolicy>,
    urls: UrlRegistry,
    history: HistoryLedger,
}

impl PageStore {
    pub fn new(pool: PgPool, registry: Arc<PageTypeRegistry>, clock: Arc<dyn Clock>) -> Self {
        Self {
            urls: UrlRegistry::new(pool.clone(), Arc::clone(&clock)),
            history: HistoryLedger::new(pool.clone(), Arc::clone(&clock)),
            pool,
            registry,
            clock,
            policy: Arc::new(AllowAll),
        }
    }

    /// Consult `policy` before every mutating operation, here and in the
    /// URL registry.
    pub fn with_policy(mut self, policy: Arc<dyn AccessPolicy>) -> Self {
        self.urls = self.urls.with_policy(Arc::clone(&policy));
        self.policy = policy;
        self
    }

    pub fn urls(&self) -> &UrlRegistry {
        &self.urls
    }

    pub fn ledger(&self) -> &HistoryLedger {
        &self.history
    }

    pub fn page_types(&self) -> &PageTypeRegistry {
        &self.registry
    }

    fn require(&self, actor_id: DbId, capability: Capability) -> Result<(), CoreError> {
        require(self.policy.as_ref(), actor_id, capability)
    }

    // -----------------------------------------------------------------------
    // Pages
    // -----------------------------------------------------------------------

    /// Create a page with an empty draft as version 1.
    pub async fn create(
        &self,
        page_type: &str,
        actor_id: DbId,
        parent_page_id: Option<DbId>,
    ) -> ContentResult<Page> {
        self.require(actor_id, Capability::CreatePage)?;
        self.registry.page_type(page_type)?;

        let now = self.clock.now();
        let mut tx = self.pool.begin().await?;

        if let Some(parent_id) = parent_page_id {
            let parent = PageRepo::lock(&mut *tx, parent_id)
                .await?
                .ok_or(CoreError::PageNotFound(parent_id))?;
            let parent_type = self.registry.page_type(&parent.page_type)?;
            if !parent_type.allows_sub_pages() {
                return Err(CoreError::Conflict(format!(
                    "pages of type '{}' cannot have sub pages",
                    parent.page_type
                ))
                .into());
            }
        }

        let order_index = PageRepo::next_order_index(&mut *tx, parent_page_id).await?;
        let page = PageRepo::insert(
            &mut *tx,
            &CreatePage {
                page_type: page_type.to_string(),
                parent_page_id,
                order_index,
                created_by: actor_id,
            },
            now,
        )
        .await?;
        PageVersionRepo::insert(
            &mut *tx,
            &CreatePageVersion {
                page_id: page.id,
                version_number: INITIAL_VERSION,
                attributes: Attributes::new(),
                created_by: actor_id,
                preview_key: new_preview_key(),
            },
            now,
        )
        .await?;
        HistoryLedger::append(
            &mut tx,
            SUBJECT_PAGE,
            page.id,
            actor_id,
            ACTION_CREATED,
            &json!({ "page_type": page_type, "parent_page_id": parent_page_id }),
            now,
        )
        .await?;
        tx.commit().await?;

        tracing::info!(page_id = page.id, page_type, actor_id, "Created page");
        Ok(page)
    }

    /// A page by id, whether or not it is trashed.
    pub async fn find(&self, page_id: DbId) -> ContentResult<Page> {
        PageRepo::find_by_id(&self.pool, page_id)
            .await?
            .ok_or_else(|| CoreError::PageNotFound(page_id).into())
    }

    /// Non-trashed pages among `ids`.
    pub async fn find_by_ids(&self, ids: &[DbId]) -> ContentResult<Vec<Page>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(PageRepo::find_by_ids(&self.pool, ids).await?)
    }

    pub async fn top_level(&self, pagination: Pagination) -> ContentResult<Paginated<Page>> {
        self.children(None, pagination).await
    }

    pub async fn sub_pages(
        &self,
        parent_id: DbId,
        pagination: Pagination,
    ) -> ContentResult<Paginated<Page>> {
        self.children(Some(parent_id), pagination).await
    }

    async fn children(
        &self,
        parent_id: Option<DbId>,
        pagination: Pagination,
    ) -> ContentResult<Paginated<Page>> {
        let items = PageRepo::list_children(
            &self.pool,
            parent_id,
            pagination.limit(),
            pagination.offset(),
        )
        .await?;
        let total = PageRepo::count_children(&self.pool, parent_id).await?;
        Ok(Paginated::new(items, total, pagination))
    }

    /// Set `order_index` for many pages at once.
    pub async fn update_ordering(&self, ordering: &[PageOrder], actor_id: DbId) -> ContentResult<()> {
        self.require(actor_id, Capability::EditPage)?;

        let now = self.clock.now();
        let mut tx = self.pool.begin().await?;
        for entry in ordering {
            if !PageRepo::set_order_index(&mut *tx, entry.page_id, entry.order_index, now).await? {
                return Err(CoreError::PageNotFound(entry.page_id).into());
            }
            HistoryLedger::append(
                &mut tx,
                SUBJECT_PAGE,
                entry.page_id,
                actor_id,
                ACTION_ORDER_CHANGED,
                &json!({ "order_index": entry.order_index }),
                now,
            )
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// `false` if the page or any ancestor is trashed.
    pub async fn is_live(&self, page_id: DbId) -> ContentResult<bool> {
        PageRepo::is_live(&self.pool, page_id)
            .await?
            .ok_or_else(|| CoreError::PageNotFound(page_id).into())
    }

    // -----------------------------------------------------------------------
    // Versions
    // -----------------------------------------------------------------------

    /// Every version of a page, newest first.
    pub async fn versions(&self, page_id: DbId) -> ContentResult<Vec<PageVersion>> {
        self.find(page_id).await?;
        Ok(PageVersionRepo::list_by_page(&self.pool, page_id).await?)
    }

    /// The published version, if any.
    pub async fn current_version(&self, page_id: DbId) -> ContentResult<Option<PageVersion>> {
        Ok(PageVersionRepo::find_published(&self.pool, page_id).await?)
    }

    /// Open a new draft for `actor_id` and return its number.
    ///
    /// The payload starts as a copy of the published version, or of the
    /// highest version when nothing is published.
    pub async fn create_new_version(&self, page_id: DbId, actor_id: DbId) -> ContentResult<i32> {
        self.require(actor_id, Capability::EditPage)?;

        let now = self.clock.now();
        let mut tx = self.pool.begin().await?;
        self.lock_page(&mut tx, page_id).await?;

        let drafts = PageVersionRepo::list_drafts_for_user(&mut *tx, page_id, actor_id).await?;
        if let Some(draft) = drafts.first() {
            return Err(CoreError::DuplicateDraft {
                page_id,
                user_id: actor_id,
                version: draft.version_number,
            }
            .into());
        }

        let source = match PageVersionRepo::find_published(&mut *tx, page_id).await? {
            Some(published) => Some(published),
            None => PageVersionRepo::find_latest(&mut *tx, page_id).await?,
        };
        let current_max = PageVersionRepo::max_version_number(&mut *tx, page_id).await?;
        let version_number = next_version_number(current_max).ok_or_else(|| {
            CoreError::Internal(format!("page #{page_id} has run out of version numbers"))
        })?;

        PageVersionRepo::insert(
            &mut *tx,
            &CreatePageVersion {
                page_id,
                version_number,
                attributes: source
                    .as_ref()
                    .map(PageVersion::attribute_map)
                    .unwrap_or_default(),
                created_by: actor_id,
                preview_key: new_preview_key(),
            },
            now,
        )
        .await?;
        HistoryLedger::append(
            &mut tx,
            SUBJECT_PAGE,
            page_id,
            actor_id,
            ACTION_NEW_VERSION,
            &json!({
                "version": version_number,
                "copied_from": source.as_ref().map(|v| v.version_number),
            }),
            now,
        )
        .await?;
        tx.commit().await?;

        tracing::info!(page_id, version = version_number, actor_id, "Opened draft version");
        Ok(version_number)
    }

    /// Open drafts `actor_id` holds on a page.
    pub async fn drafts_for_user(
        &self,
        page_id: DbId,
        actor_id: DbId,
    ) -> ContentResult<Vec<PageVersion>> {
        Ok(PageVersionRepo::list_drafts_for_user(&self.pool, page_id, actor_id).await?)
    }

    /// An editable version. Scheduled versions are locked until un-scheduled.
    pub async fn get_draft_version(
        &self,
        page_id: DbId,
        version_number: i32,
    ) -> ContentResult<PageVersion> {
        self.find(page_id).await?;
        PageVersionRepo::find(&self.pool, page_id, version_number)
            .await?
            .filter(|v| v.status.is_editable())
            .ok_or_else(|| {
                CoreError::PageVersionNotFound {
                    page_id,
                    version: version_number,
                }
                .into()
            })
    }

    /// Validate and store a draft's payload.
    ///
    /// A rejected payload reports every offending field at once and leaves
    /// the stored payload untouched.
    pub async fn save_draft_version(
        &self,
        page_id: DbId,
        version_number: i32,
        attributes: &Attributes,
        actor_id: DbId,
    ) -> ContentResult<PageVersion> {
        self.require(actor_id, Capability::EditPage)?;

        let now = self.clock.now();
        let mut tx = self.pool.begin().await?;
        let page = self.lock_page(&mut tx, page_id).await?;
        let version = Self::version_in(&mut tx, page_id, version_number, VersionStatus::is_editable).await?;

        let page_type = self.registry.page_type(&page.page_type)?;
        let validated = self.registry.validate_attributes(page_type, attributes)?;

        let saved = PageVersionRepo::update_attributes(&mut *tx, version.id, &validated, now)
            .await?
            .ok_or(CoreError::PageVersionNotFound {
                page_id,
                version: version_number,
            })?;
        HistoryLedger::append(
            &mut tx,
            SUBJECT_PAGE,
            page_id,
            actor_id,
            ACTION_SAVED,
            &json!({ "version": version_number }),
            now,
        )
        .await?;
        tx.commit().await?;
        Ok(saved)
    }

    /// Discard a draft or scheduled version.
    pub async fn discard_draft_version(
        &self,
        page_id: DbId,
        version_number: i32,
        actor_id: DbId,
    ) -> ContentResult<DiscardOutcome> {
        self.require(actor_id, Capability::EditPage)?;

        let now = self.clock.now();
        let mut tx = self.pool.begin().await?;
        let page = self.lock_page(&mut tx, page_id).await?;
        let version = Self::version_in(&mut tx, page_id, version_number, VersionStatus::is_pending).await?;

        PageVersionRepo::transition(&mut *tx, version.id, version.status, VersionStatus::Discarded, now)
            .await?
            .ok_or(CoreError::PageVersionNotFound {
                page_id,
                version: version_number,
            })?;
        HistoryLedger::append(
            &mut tx,
            SUBJECT_PAGE,
            page_id,
            actor_id,
            ACTION_DISCARDED,
            &json!({ "version": version_number }),
            now,
        )
        .await?;
        tx.commit().await?;

        tracing::info!(page_id, version = version_number, actor_id, "Discarded version");
        Ok(DiscardOutcome {
            page_id,
            parent_page_id: page.parent_page_id,
            was_initial: version_number == INITIAL_VERSION,
        })
    }

    /// Publish a pending version now, or schedule it when `publish_at` lies
    /// in the future.
    pub async fn publish_version(
        &self,
        page_id: DbId,
        version_number: i32,
        actor_id: DbId,
        publish_at: Option<Timestamp>,
    ) -> ContentResult<PublishOutcome> {
        self.require(actor_id, Capability::PublishPage)?;

        let now = self.clock.now();
        let mut tx = self.pool.begin().await?;
        let page = self.lock_page(&mut tx, page_id).await?;
        let version = Self::version_in(&mut tx, page_id, version_number, VersionStatus::is_pending).await?;

        let outcome = match publish_decision(
            version.status,
            publish_at,
            version.scheduled_publish_at,
            now,
        ) {
            PublishDecision::Schedule(at) => {
                let scheduled = PageVersionRepo::schedule(&mut *tx, version.id, at, now)
                    .await?
                    .ok_or(CoreError::PageVersionNotFound {
                        page_id,
                        version: version_number,
                    })?;
                HistoryLedger::append(
                    &mut tx,
                    SUBJECT_PAGE,
                    page_id,
                    actor_id,
                    ACTION_SCHEDULED,
                    &json!({ "version": version_number, "publish_at": at.to_rfc3339() }),
                    now,
                )
                .await?;
                tracing::info!(page_id, version = version_number, publish_at = %at, "Scheduled version");
                PublishOutcome::Scheduled(scheduled)
            }
            PublishDecision::Now => {
                let published = self.publish_locked(&mut tx, &page, &version, actor_id, now).await?;
                PublishOutcome::Published(published)
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    /// Return a scheduled version to draft.
    pub async fn unschedule_version(
        &self,
        page_id: DbId,
        version_number: i32,
        actor_id: DbId,
    ) -> ContentResult<PageVersion> {
        self.require(actor_id, Capability::PublishPage)?;

        let now = self.clock.now();
        let mut tx = self.pool.begin().await?;
        self.lock_page(&mut tx, page_id).await?;
        let version = Self::version_in(&mut tx, page_id, version_number, |status| {
            *status == VersionStatus::Scheduled
        })
        .await?;

        let owner_drafts =
            PageVersionRepo::list_drafts_for_user(&mut *tx, page_id, version.created_by).await?;
        if let Some(draft) = owner_drafts.first() {
            return Err(CoreError::DuplicateDraft {
                page_id,
                user_id: version.created_by,
                version: draft.version_number,
            }
            .into());
        }

        let draft = PageVersionRepo::transition(
            &mut *tx,
            version.id,
            VersionStatus::Scheduled,
            VersionStatus::Draft,
            now,
        )
        .await?
        .ok_or(CoreError::PageVersionNotFound {
            page_id,
            version: version_number,
        })?;
        HistoryLedger::append(
            &mut tx,
            SUBJECT_PAGE,
            page_id,
            actor_id,
            ACTION_UNSCHEDULED,
            &json!({ "version": version_number }),
            now,
        )
        .await?;
        tx.commit().await?;
        Ok(draft)
    }

    /// Scheduled versions whose time has come, oldest schedule first.
    pub async fn due_versions(&self, limit: i64) -> ContentResult<Vec<PageVersion>> {
        Ok(PageVersionRepo::list_due(&self.pool, self.clock.now(), limit).await?)
    }

    /// Publish a scheduled version whose time has come.
    ///
    /// Returns `None` when, by the time the page lock is held, the version is
    /// no longer scheduled or no longer due.
    pub async fn publish_due(&self, version_id: DbId) -> ContentResult<Option<PageVersion>> {
        let candidate = PageVersionRepo::find_by_id(&self.pool, version_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "page_version",
                id: version_id,
            })?;

        let now = self.clock.now();
        let mut tx = self.pool.begin().await?;
        let page = self.lock_page(&mut tx, candidate.page_id).await?;
        let Some(version) = PageVersionRepo::find_by_id(&mut *tx, version_id).await? else {
            return Ok(None);
        };
        if version.status != VersionStatus::Scheduled || !is_due(version.scheduled_publish_at, now) {
            return Ok(None);
        }

        let published = self
            .publish_locked(&mut tx, &page, &version, version.created_by, now)
            .await?;
        tx.commit().await?;
        Ok(Some(published))
    }

    /// Record a failed delayed publish and take the version out of the
    /// schedule.
    ///
    /// The version returns to draft unless its author already holds another
    /// draft on the page; then it stays scheduled with no publish time until
    /// someone publishes, discards or un-schedules it.
    pub async fn record_publish_failure(&self, version_id: DbId, error: &str) -> ContentResult<()> {
        let Some(candidate) = PageVersionRepo::find_by_id(&self.pool, version_id).await? else {
            return Ok(());
        };

        let now = self.clock.now();
        let mut tx = self.pool.begin().await?;
        self.lock_page(&mut tx, candidate.page_id).await?;
        let Some(version) = PageVersionRepo::find_by_id(&mut *tx, version_id).await? else {
            return Ok(());
        };
        if version.status != VersionStatus::Scheduled {
            return Ok(());
        }

        let owner_drafts =
            PageVersionRepo::list_drafts_for_user(&mut *tx, version.page_id, version.created_by)
                .await?;
        if owner_drafts.is_empty() {
            PageVersionRepo::transition(
                &mut *tx,
                version.id,
                VersionStatus::Scheduled,
                VersionStatus::Draft,
                now,
            )
            .await?;
        } else {
            PageVersionRepo::clear_schedule(&mut *tx, version.id, now).await?;
        }
        HistoryLedger::append(
            &mut tx,
            SUBJECT_PAGE,
            version.page_id,
            version.created_by,
            ACTION_DELAYED_PUBLISH_FAILED,
            &json!({ "version": version.version_number, "error": error }),
            now,
        )
        .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Shared publish path. The caller holds the page lock.
    async fn publish_locked(
        &self,
        conn: &mut PgConnection,
        page: &Page,
        version: &PageVersion,
        actor_id: DbId,
        now: Timestamp,
    ) -> ContentResult<PageVersion> {
        let page_type = self.registry.page_type(&page.page_type)?;
        let validated = self
            .registry
            .validate_attributes(page_type, &version.attribute_map())?;

        let name = self
            .registry
            .page_name(page_type, &validated)
            .unwrap_or_default();
        let segment = slug::normalize(&name);
        if segment.is_empty() {
            return Err(CoreError::InvalidSlug(name).into());
        }

        let parent_slug = match page.parent_page_id {
            Some(parent_id) => {
                let entry = UrlRepo::find_for(&mut *conn, UrlKind::Page, parent_id)
                    .await?
                    .ok_or_else(|| {
                        CoreError::Conflict(format!(
                            "parent page #{parent_id} must be published before its sub pages"
                        ))
                    })?;
                Some(entry.slug)
            }
            None => None,
        };
        let canonical = slug::join(parent_slug.as_deref(), &segment);
        UrlRegistry::register_in(&mut *conn, &canonical, UrlKind::Page, page.id, now).await?;

        PageVersionRepo::archive_published(&mut *conn, page.id, now).await?;
        let published = PageVersionRepo::mark_published(&mut *conn, version.id, &validated, now)
            .await?
            .ok_or(CoreError::PageVersionNotFound {
                page_id: page.id,
                version: version.version_number,
            })?;
        PageRepo::set_name(&mut *conn, page.id, &name, now).await?;

        HistoryLedger::append(
            conn,
            SUBJECT_PAGE,
            page.id,
            actor_id,
            ACTION_PUBLISHED,
            &json!({ "version": version.version_number, "slug": canonical }),
            now,
        )
        .await?;

        tracing::info!(
            page_id = page.id,
            version = version.version_number,
            slug = %canonical,
            "Published version"
        );
        Ok(published)
    }

    pub async fn get_version_by_preview_key(
        &self,
        preview_key: &str,
    ) -> ContentResult<Option<PageVersion>> {
        Ok(PageVersionRepo::find_by_preview_key(&self.pool, preview_key).await?)
    }

    // -----------------------------------------------------------------------
    // Trash
    // -----------------------------------------------------------------------

    /// Move one page (and with it, its subtree) to the trash.
    pub async fn delete_page(&self, page_id: DbId, actor_id: DbId) -> ContentResult<()> {
        self.delete_pages(&[page_id], false, actor_id).await
    }

    /// Trash several pages, or purge pages that are already in the trash
    /// (flagged themselves or under a trashed ancestor).
    ///
    /// A purge removes the page's whole subtree with every version and URL
    /// entry. History survives.
    pub async fn delete_pages(
        &self,
        page_ids: &[DbId],
        permanent: bool,
        actor_id: DbId,
    ) -> ContentResult<()> {
        self.require(actor_id, Capability::RemovePage)?;

        let now = self.clock.now();
        let mut tx = self.pool.begin().await?;
        let mut purged: HashSet<DbId> = HashSet::new();

        for &page_id in page_ids {
            if purged.contains(&page_id) {
                continue;
            }
            let page = self.lock_page(&mut tx, page_id).await?;

            if !permanent {
                if PageRepo::trash(&mut *tx, page_id, now).await? {
                    HistoryLedger::append(
                        &mut tx,
                        SUBJECT_PAGE,
                        page_id,
                        actor_id,
                        ACTION_TRASHED,
                        &serde_json::Value::Null,
                        now,
                    )
                    .await?;
                    tracing::info!(page_id, actor_id, "Trashed page");
                }
                continue;
            }

            let in_trash = page.is_trashed
                || PageRepo::is_live(&mut *tx, page_id).await? == Some(false);
            if !in_trash {
                return Err(CoreError::Conflict(format!(
                    "page #{page_id} must be in the trash before it can be deleted permanently"
                ))
                .into());
            }

            let subtree = PageRepo::subtree_ids(&mut *tx, page_id).await?;
            UrlRepo::acquire_write_lock(&mut *tx).await?;
            let urls_removed = UrlRepo::delete_for_targets(&mut *tx, UrlKind::Page, &subtree).await?;
            PageRepo::delete_many(&mut *tx, &subtree).await?;
            HistoryLedger::append(
                &mut tx,
                SUBJECT_PAGE,
                page_id,
                actor_id,
                ACTION_PURGED,
                &json!({ "pages": subtree }),
                now,
            )
            .await?;
            tracing::info!(
                page_id,
                pages = subtree.len(),
                urls = urls_removed,
                actor_id,
                "Purged page subtree"
            );
            purged.extend(subtree);
        }

        tx.commit().await?;
        Ok(())
    }

    /// Pages carrying their own trash flag, most recently trashed first.
    pub async fn trashed(&self, pagination: Pagination) -> ContentResult<Paginated<Page>> {
        let items =
            PageRepo::list_trashed(&self.pool, pagination.limit(), pagination.offset()).await?;
        let total = PageRepo::count_trashed(&self.pool).await?;
        Ok(Paginated::new(items, total, pagination))
    }

    /// Trashed ancestors of a page, root first.
    pub async fn trashed_parents_for_page(&self, page_id: DbId) -> ContentResult<Vec<Page>> {
        self.find(page_id).await?;
        let ancestors = PageRepo::ancestors(&self.pool, page_id).await?;
        Ok(ancestors.into_iter().filter(|p| p.is_trashed).collect())
    }

    /// Take a page out of the trash, optionally with every trashed page
    /// below it. Ancestors are left as they are.
    pub async fn restore(
        &self,
        page_id: DbId,
        restore_sub_pages: bool,
        actor_id: DbId,
    ) -> ContentResult<Page> {
        self.require(actor_id, Capability::RemovePage)?;

        let now = self.clock.now();
        let mut tx = self.pool.begin().await?;
        let page = self.lock_page(&mut tx, page_id).await?;
        if !page.is_trashed || !PageRepo::untrash(&mut *tx, page_id, now).await? {
            return Err(CoreError::PageNotFound(page_id).into());
        }
        let descendants = if restore_sub_pages {
            PageRepo::untrash_descendants(&mut *tx, page_id, now).await?
        } else {
            0
        };
        HistoryLedger::append(
            &mut tx,
            SUBJECT_PAGE,
            page_id,
            actor_id,
            ACTION_RESTORED,
            &json!({ "sub_pages": restore_sub_pages, "restored_descendants": descendants }),
            now,
        )
        .await?;
        let restored = PageRepo::find_by_id(&mut *tx, page_id)
            .await?
            .ok_or(CoreError::PageNotFound(page_id))?;
        tx.commit().await?;

        tracing::info!(page_id, descendants, actor_id, "Restored page");
        Ok(restored)
    }

    // -----------------------------------------------------------------------
    // Resolution and history
    // -----------------------------------------------------------------------

    /// Resolve a request slug to live content, a redirect, or a move.
    pub async fn resolve(&self, requested: &str) -> ContentResult<Resolution> {
        let requested = slug::trim_slashes(requested);
        let not_found = || CoreError::UrlNotFound(requested.to_string());
        let entry = self.urls.find_by_slug(requested).await?;

        match entry.target_kind {
            UrlKind::Page => {
                if PageRepo::is_live(&self.pool, entry.target_id).await? != Some(true) {
                    return Err(not_found().into());
                }
                let page = PageRepo::find_by_id(&self.pool, entry.target_id)
                    .await?
                    .ok_or_else(not_found)?;
                let version = PageVersionRepo::find_published(&self.pool, page.id)
                    .await?
                    .ok_or_else(not_found)?;
                Ok(Resolution::Page { page, version })
            }
            UrlKind::RedirectUrl => {
                let redirect = RedirectRepo::find_by_id(&self.pool, entry.target_id)
                    .await?
                    .ok_or_else(not_found)?;
                Ok(Resolution::Redirect {
                    destination: redirect.destination,
                    kind: redirect.redirect_kind,
                })
            }
            UrlKind::Wildcard => {
                let target = self.urls.resolve_wildcard(&entry, requested).await?;
                Ok(Resolution::Moved { slug: target.slug })
            }
        }
    }

    /// History of a page, newest first.
    pub async fn history(&self, page_id: DbId, limit: Option<i64>) -> ContentResult<Vec<HistoryRecord>> {
        self.history.get(SUBJECT_PAGE, page_id, limit).await
    }

    /// Everyone who has touched a page.
    pub async fn contributors(&self, page_id: DbId) -> ContentResult<Vec<DbId>> {
        self.history.actors(SUBJECT_PAGE, page_id).await
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    async fn lock_page(&self, conn: &mut PgConnection, page_id: DbId) -> ContentResult<Page> {
        PageRepo::lock(&mut *conn, page_id)
            .await?
            .ok_or_else(|| CoreError::PageNotFound(page_id).into())
    }

    /// Load a version and check its status with `accept`.
    async fn version_in(
        conn: &mut PgConnection,
        page_id: DbId,
        version_number: i32,
        accept: impl Fn(&VersionStatus) -> bool,
    ) -> ContentResult<PageVersion> {
        PageVersionRepo::find(&mut *conn, page_id, version_number)
            .await?
            .filter(|v| accept(&v.status))
            .ok_or_else(|| {
                CoreError::PageVersionNotFound {
                    page_id,
                    version: version_number,
                }
                .into()
            })
    }
}
