//! Slug registry: uniqueness, wildcard forwarding, subtree rewrites, and
//! redirects.

use std::sync::Arc;

use quire_core::access::{require, AccessPolicy, AllowAll, Capability};
use quire_core::clock::Clock;
use quire_core::error::{CoreError, FieldErrors};
use quire_core::history::{ACTION_REDIRECT_ADDED, ACTION_REDIRECT_REMOVED, SUBJECT_URL};
use quire_core::pagination::{Paginated, Pagination};
use quire_core::slug;
use quire_core::types::{DbId, Timestamp};
use quire_core::url::{self as url_rules, RedirectKind, UrlKind, MAX_WILDCARD_HOPS};
use quire_db::models::redirect::RedirectRoute;
use quire_db::models::url::UrlEntry;
use quire_db::repositories::{RedirectRepo, UrlRepo};
use serde_json::json;
use sqlx::{PgConnection, PgPool};

use crate::error::ContentResult;
use crate::history_ledger::HistoryLedger;

/// Where a wildcard chain ends up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WildcardTarget {
    /// The live (non-wildcard) entry at the end of the chain.
    pub entry: UrlEntry,
    /// The slug the request should move to, including any unmatched remainder.
    pub slug: String,
}

#[derive(Clone)]
pub struct UrlRegistry {
    pool: PgPool,
    clock: Arc<dyn Clock>,
    policy: Arc<dyn AccessPolicy>,
}

impl UrlRegistry {
    pub fn new(pool: PgPool, clock: Arc<dyn Clock>) -> Self {
        Self {
            pool,
            clock,
            policy: Arc::new(AllowAll),
        }
    }

    pub fn with_policy(mut self, policy: Arc<dyn AccessPolicy>) -> Self {
        self.policy = policy;
        self
    }

    // -----------------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------------

    /// Exact match first, then the most specific wildcard prefix.
    pub async fn find_by_slug(&self, slug: &str) -> ContentResult<UrlEntry> {
        let slug = slug::trim_slashes(slug);
        if let Some(entry) = UrlRepo::find_by_slug(&self.pool, slug).await? {
            return Ok(entry);
        }
        let candidates = url_rules::wildcard_candidates(slug);
        if !candidates.is_empty() {
            if let Some(entry) = UrlRepo::find_longest_wildcard(&self.pool, &candidates).await? {
                return Ok(entry);
            }
        }
        Err(CoreError::UrlNotFound(slug.to_string()).into())
    }

    pub async fn find_for(&self, kind: UrlKind, target_id: DbId) -> ContentResult<Option<UrlEntry>> {
        Ok(UrlRepo::find_for(&self.pool, kind, target_id).await?)
    }

    pub async fn find_by_id(&self, id: DbId) -> ContentResult<UrlEntry> {
        UrlRepo::find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| CoreError::NotFound { entity: "url", id }.into())
    }

    /// Every entry, newest first.
    pub async fn list(&self, pagination: Pagination) -> ContentResult<Paginated<UrlEntry>> {
        self.list_filtered(None, pagination).await
    }

    pub async fn list_by_kind(
        &self,
        kind: UrlKind,
        pagination: Pagination,
    ) -> ContentResult<Paginated<UrlEntry>> {
        self.list_filtered(Some(kind), pagination).await
    }

    async fn list_filtered(
        &self,
        kind: Option<UrlKind>,
        pagination: Pagination,
    ) -> ContentResult<Paginated<UrlEntry>> {
        let items =
            UrlRepo::list(&self.pool, kind, pagination.limit(), pagination.offset()).await?;
        let total = UrlRepo::count(&self.pool, kind).await?;
        Ok(Paginated::new(items, total, pagination))
    }

    /// Follow a wildcard entry to the live entry it forwards to.
    ///
    /// `requested_slug` is the slug that matched `entry`; whatever lies below
    /// the wildcard's own slug is carried over to the destination.
    pub async fn resolve_wildcard(
        &self,
        entry: &UrlEntry,
        requested_slug: &str,
    ) -> ContentResult<WildcardTarget> {
        let requested_slug = slug::trim_slashes(requested_slug);
        let remainder = url_rules::remainder(requested_slug, &entry.slug).to_string();
        let mut current = entry.clone();
        let mut hops = 0;
        while current.is_wildcard() {
            if hops == MAX_WILDCARD_HOPS {
                tracing::warn!(slug = %entry.slug, hops, "Wildcard chain too long");
                return Err(CoreError::Internal(format!(
                    "wildcard chain starting at /{} exceeds {MAX_WILDCARD_HOPS} hops",
                    entry.slug
                ))
                .into());
            }
            current = UrlRepo::find_by_id(&self.pool, current.target_id)
                .await?
                .ok_or_else(|| CoreError::UrlNotFound(requested_slug.to_string()))?;
            hops += 1;
        }
        let slug = format!("{}{remainder}", current.slug);
        Ok(WildcardTarget {
            entry: current,
            slug,
        })
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Whether `slug` may be registered for the given target.
    ///
    /// Free slugs and wildcard reservations are usable; a slug already owned
    /// by the same target is usable when `target_id` is given.
    pub async fn can_use(
        &self,
        slug: &str,
        kind: UrlKind,
        target_id: Option<DbId>,
    ) -> ContentResult<bool> {
        let slug = slug::trim_slashes(slug);
        if !slug::validate(slug) {
            return Err(CoreError::InvalidSlug(slug.to_string()).into());
        }
        let usable = match UrlRepo::find_by_slug(&self.pool, slug).await? {
            None => true,
            Some(existing) if existing.is_wildcard() => true,
            Some(existing) => target_id.is_some_and(|id| existing.points_at(kind, id)),
        };
        Ok(usable)
    }

    /// Point `slug` at the given target in its own transaction.
    pub async fn register(
        &self,
        slug: &str,
        kind: UrlKind,
        target_id: DbId,
    ) -> ContentResult<UrlEntry> {
        let mut tx = self.pool.begin().await?;
        let entry = Self::register_in(&mut tx, slug, kind, target_id, self.clock.now()).await?;
        tx.commit().await?;
        Ok(entry)
    }

    /// Registration on a caller-owned connection.
    ///
    /// Takes the registry lock, so conflict checks, reclaims and the subtree
    /// rewrite see a stable registry until the caller's transaction ends.
    pub(crate) async fn register_in(
        conn: &mut PgConnection,
        slug: &str,
        kind: UrlKind,
        target_id: DbId,
        now: Timestamp,
    ) -> ContentResult<UrlEntry> {
        if !slug::validate(slug) {
            return Err(CoreError::InvalidSlug(slug.to_string()).into());
        }
        UrlRepo::acquire_write_lock(&mut *conn).await?;

        let existing = UrlRepo::find_by_slug(&mut *conn, slug).await?;
        if let Some(existing) = &existing {
            if existing.points_at(kind, target_id) {
                return Ok(existing.clone());
            }
            if !existing.is_wildcard() {
                return Err(CoreError::UrlAlreadyExists(slug.to_string()).into());
            }
        }

        let previous = if kind == UrlKind::Wildcard {
            None
        } else {
            UrlRepo::find_for(&mut *conn, kind, target_id).await?
        };

        // The previous entry steps aside first so the target never owns two
        // live slugs at once.
        if let Some(previous) = &previous {
            UrlRepo::retarget(&mut *conn, previous.id, UrlKind::Wildcard, previous.id, now).await?;
        }

        let entry = match existing {
            Some(reclaimed) => {
                tracing::debug!(slug, url_id = reclaimed.id, "Reclaiming wildcard slug");
                UrlRepo::retarget(&mut *conn, reclaimed.id, kind, target_id, now)
                    .await?
                    .ok_or(CoreError::NotFound {
                        entity: "url",
                        id: reclaimed.id,
                    })?
            }
            None => UrlRepo::insert(&mut *conn, slug, kind, target_id, now).await?,
        };

        if let Some(previous) = previous {
            UrlRepo::retarget(&mut *conn, previous.id, UrlKind::Wildcard, entry.id, now).await?;
            let moved =
                UrlRepo::rewrite_descendants(&mut *conn, &previous.slug, slug, entry.id, now)
                    .await?;
            tracing::info!(
                from = %previous.slug,
                to = slug,
                descendants = moved,
                "Moved URL subtree"
            );
        }

        Ok(entry)
    }

    /// Remove the entry owned by a target. Entries below its slug are left
    /// in place.
    pub async fn delete(&self, kind: UrlKind, target_id: DbId) -> ContentResult<bool> {
        let mut tx = self.pool.begin().await?;
        UrlRepo::acquire_write_lock(&mut *tx).await?;
        let deleted = match UrlRepo::find_for(&mut *tx, kind, target_id).await? {
            Some(entry) => UrlRepo::delete_by_id(&mut *tx, entry.id).await?,
            None => false,
        };
        tx.commit().await?;
        Ok(deleted)
    }

    // -----------------------------------------------------------------------
    // Redirects
    // -----------------------------------------------------------------------

    /// Create a redirect from `from` to `to` together with its URL entry.
    pub async fn add_redirect(
        &self,
        from: &str,
        to: &str,
        kind: RedirectKind,
        actor_id: DbId,
    ) -> ContentResult<RedirectRoute> {
        require(self.policy.as_ref(), actor_id, Capability::ManageUrls)?;

        let from = slug::trim_slashes(from.trim());
        let to = slug::trim_slashes(to.trim());
        if !slug::validate(from) {
            return Err(CoreError::InvalidSlug(from.to_string()).into());
        }
        if to.is_empty() {
            return Err(
                CoreError::Validation(FieldErrors::single("to", "Please specify a to url")).into(),
            );
        }

        let now = self.clock.now();
        let mut tx = self.pool.begin().await?;
        UrlRepo::acquire_write_lock(&mut *tx).await?;
        if let Some(existing) = UrlRepo::find_by_slug(&mut *tx, from).await? {
            if !existing.is_wildcard() {
                return Err(CoreError::UrlAlreadyExists(from.to_string()).into());
            }
        }

        let redirect = RedirectRepo::insert(&mut *tx, to, kind, now).await?;
        let entry = Self::register_in(&mut tx, from, UrlKind::RedirectUrl, redirect.id, now).await?;
        HistoryLedger::append(
            &mut tx,
            SUBJECT_URL,
            entry.id,
            actor_id,
            ACTION_REDIRECT_ADDED,
            &json!({ "from": from, "to": to, "kind": kind.as_str() }),
            now,
        )
        .await?;
        tx.commit().await?;

        tracing::info!(redirect_id = redirect.id, from, to, kind = %kind, "Added redirect");
        Ok(RedirectRoute {
            id: redirect.id,
            slug: Some(entry.slug),
            destination: redirect.destination,
            redirect_kind: redirect.redirect_kind,
            created_at: redirect.created_at,
        })
    }

    pub async fn get_redirect_url(&self, id: DbId) -> ContentResult<RedirectRoute> {
        RedirectRepo::find_route(&self.pool, id)
            .await?
            .ok_or_else(|| CoreError::NotFound { entity: "redirect", id }.into())
    }

    /// Redirects newest first, optionally restricted to one kind.
    pub async fn get_redirect_urls(
        &self,
        kind: Option<RedirectKind>,
        pagination: Pagination,
    ) -> ContentResult<Paginated<RedirectRoute>> {
        let items =
            RedirectRepo::list_routes(&self.pool, kind, pagination.limit(), pagination.offset())
                .await?;
        let total = RedirectRepo::count(&self.pool, kind).await?;
        Ok(Paginated::new(items, total, pagination))
    }

    /// Remove a redirect and the URL entry routing to it.
    pub async fn remove_redirect_url(&self, id: DbId, actor_id: DbId) -> ContentResult<()> {
        require(self.policy.as_ref(), actor_id, Capability::ManageUrls)?;

        let now = self.clock.now();
        let mut tx = self.pool.begin().await?;
        UrlRepo::acquire_write_lock(&mut *tx).await?;
        let redirect = RedirectRepo::find_by_id(&mut *tx, id)
            .await?
            .ok_or(CoreError::NotFound { entity: "redirect", id })?;
        let entry = UrlRepo::find_for(&mut *tx, UrlKind::RedirectUrl, redirect.id).await?;
        if let Some(entry) = &entry {
            UrlRepo::delete_by_id(&mut *tx, entry.id).await?;
        }
        RedirectRepo::delete(&mut *tx, redirect.id).await?;
        HistoryLedger::append(
            &mut tx,
            SUBJECT_URL,
            entry.as_ref().map_or(redirect.id, |e| e.id),
            actor_id,
            ACTION_REDIRECT_REMOVED,
            &json!({
                "from": entry.as_ref().map(|e| e.slug.as_str()),
                "to": redirect.destination,
            }),
            now,
        )
        .await?;
        tx.commit().await?;

        tracing::info!(redirect_id = id, "Removed redirect");
        Ok(())
    }
}
