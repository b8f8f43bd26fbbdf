//! Postgres access for the sync & notify pipelines.
//!
//! The pipelines talk to the store through the `SyncStore` and
//! `NotifyStore` traits so tests can substitute in-memory doubles;
//! `PgStore` is the production implementation.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ofd_core::{OfferDraft, Recipient};
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

pub const CRATE_NAME: &str = "ofd-store";

/// Final counters written when a sync run is closed.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub finished_at: DateTime<Utc>,
    pub offers_seen: i64,
    pub offers_inserted: i64,
    pub offers_deactivated: i64,
    pub notes: String,
}

/// Per-row signal of whether an upsert created the row or overwrote
/// an existing one, in the same order as the submitted chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Store operations the batch reconciler needs.
#[async_trait]
pub trait SyncStore: Send + Sync {
    async fn open_run(&self, started_at: DateTime<Utc>) -> Result<Uuid>;
    async fn close_run(&self, run_id: Uuid, outcome: &RunOutcome) -> Result<()>;
    /// Close any run still open whose start is older than the cutoff,
    /// marking it orphaned. Invoked once at process start.
    async fn close_orphaned_runs(&self, older_than: DateTime<Utc>) -> Result<u64>;
    /// Upsert one chunk atomically. All mutable fields are overwritten
    /// on conflict, `is_active` is forced true and `last_seen_at` is
    /// set to the caller's pass-start timestamp; `first_seen_at` is
    /// written only on first insert.
    async fn upsert_offers(
        &self,
        drafts: &[OfferDraft],
        last_seen_at: DateTime<Utc>,
    ) -> Result<Vec<UpsertOutcome>>;
    /// Soft-retire every active offer not re-observed in the current
    /// pass (strictly older `last_seen_at` than the pass-start cutoff).
    async fn deactivate_unseen(&self, cutoff: DateTime<Utc>) -> Result<u64>;
    /// Associate active offers with the users whose stored preferences
    /// they match, feeding the pending-offer notification queue.
    /// Existing pairs are left untouched, so re-running after an
    /// identical pass adds nothing.
    async fn associate_matching_offers(&self) -> Result<u64>;
}

/// How recipients qualify for a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Count of offers associated to the user and not yet notified.
    PendingOffers,
    /// Count of active offers matching the user's stored modality and
    /// district preferences (case-insensitive set match).
    Preferences,
}

/// Store operations the notification dispatcher needs.
#[async_trait]
pub trait NotifyStore: Send + Sync {
    /// Users that are active, notification-enabled and carry a
    /// non-empty delivery address, each with a positive match count.
    async fn eligible_recipients(&self, mode: MatchMode) -> Result<Vec<Recipient>>;
    /// Stamp the user's pending offers as notified. Must only be
    /// called for recipients whose send actually succeeded.
    async fn mark_offers_notified(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<()>;
    /// Clear a permanently invalid delivery address so future resolver
    /// passes skip the user. Clearing an already-null address is a
    /// no-op.
    async fn clear_delivery_address(&self, user_id: Uuid) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .context("connecting to postgres")?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("running store migrations")?;
        Ok(())
    }
}

#[async_trait]
impl SyncStore for PgStore {
    async fn open_run(&self, started_at: DateTime<Utc>) -> Result<Uuid> {
        let run_id = Uuid::new_v4();
        sqlx::query("INSERT INTO sync_runs (id, started_at) VALUES ($1, $2)")
            .bind(run_id)
            .bind(started_at)
            .execute(&self.pool)
            .await
            .context("opening sync run")?;
        Ok(run_id)
    }

    async fn close_run(&self, run_id: Uuid, outcome: &RunOutcome) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE sync_runs
               SET finished_at = $2,
                   offers_seen = $3,
                   offers_inserted = $4,
                   offers_deactivated = $5,
                   notes = $6
             WHERE id = $1
               AND finished_at IS NULL
            "#,
        )
        .bind(run_id)
        .bind(outcome.finished_at)
        .bind(outcome.offers_seen)
        .bind(outcome.offers_inserted)
        .bind(outcome.offers_deactivated)
        .bind(&outcome.notes)
        .execute(&self.pool)
        .await
        .context("closing sync run")?;
        Ok(())
    }

    async fn close_orphaned_runs(&self, older_than: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE sync_runs
               SET finished_at = NOW(),
                   notes = 'orphaned'
             WHERE finished_at IS NULL
               AND started_at < $1
            "#,
        )
        .bind(older_than)
        .execute(&self.pool)
        .await
        .context("closing orphaned sync runs")?;
        let closed = result.rows_affected();
        if closed > 0 {
            info!(closed, "closed orphaned sync runs");
        }
        Ok(closed)
    }

    async fn upsert_offers(
        &self,
        drafts: &[OfferDraft],
        last_seen_at: DateTime<Utc>,
    ) -> Result<Vec<UpsertOutcome>> {
        let mut tx = self.pool.begin().await.context("opening upsert transaction")?;
        let mut outcomes = Vec::with_capacity(drafts.len());

        for draft in drafts {
            let schedule = serde_json::to_value(&draft.weekly_schedule)
                .context("serializing weekly schedule")?;
            let row = sqlx::query(
                r#"
                INSERT INTO offers (
                    id, role, district, modality, school, section,
                    shift, employment_category, hours_or_modules,
                    valid_from, valid_to, weekly_schedule, address,
                    replaces_name, replacement_reason, closing_at,
                    raw_source, is_active, first_seen_at, last_seen_at,
                    updated_at
                ) VALUES (
                    $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                    $13, $14, $15, $16, $17, TRUE, NOW(), $18, NOW()
                )
                ON CONFLICT (id) DO UPDATE SET
                    role = EXCLUDED.role,
                    district = EXCLUDED.district,
                    modality = EXCLUDED.modality,
                    school = EXCLUDED.school,
                    section = EXCLUDED.section,
                    shift = EXCLUDED.shift,
                    employment_category = EXCLUDED.employment_category,
                    hours_or_modules = EXCLUDED.hours_or_modules,
                    valid_from = EXCLUDED.valid_from,
                    valid_to = EXCLUDED.valid_to,
                    weekly_schedule = EXCLUDED.weekly_schedule,
                    address = EXCLUDED.address,
                    replaces_name = EXCLUDED.replaces_name,
                    replacement_reason = EXCLUDED.replacement_reason,
                    closing_at = EXCLUDED.closing_at,
                    raw_source = EXCLUDED.raw_source,
                    is_active = TRUE,
                    last_seen_at = EXCLUDED.last_seen_at,
                    updated_at = NOW()
                RETURNING (xmax = 0) AS inserted
                "#,
            )
            .bind(&draft.id)
            .bind(&draft.role)
            .bind(&draft.district)
            .bind(&draft.modality)
            .bind(&draft.school)
            .bind(&draft.section)
            .bind(draft.shift.map(|s| s.as_code()))
            .bind(draft.employment_category.map(|c| c.as_code()))
            .bind(&draft.hours_or_modules)
            .bind(draft.valid_from)
            .bind(draft.valid_to)
            .bind(schedule)
            .bind(&draft.address)
            .bind(&draft.replaces_name)
            .bind(&draft.replacement_reason)
            .bind(draft.closing_at)
            .bind(&draft.raw_source)
            .bind(last_seen_at)
            .fetch_one(&mut *tx)
            .await
            .with_context(|| format!("upserting offer {}", draft.id))?;

            let inserted: bool = row.try_get("inserted").context("reading upsert signal")?;
            outcomes.push(if inserted {
                UpsertOutcome::Inserted
            } else {
                UpsertOutcome::Updated
            });
        }

        tx.commit().await.context("committing upsert chunk")?;
        Ok(outcomes)
    }

    async fn deactivate_unseen(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE offers
               SET is_active = FALSE,
                   updated_at = NOW()
             WHERE is_active
               AND last_seen_at < $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .context("deactivating unseen offers")?;
        Ok(result.rows_affected())
    }

    async fn associate_matching_offers(&self) -> Result<u64> {
        // Same preference semantics as the resolver: an empty dimension
        // is unconstrained, users with both dimensions empty are
        // skipped.
        let result = sqlx::query(
            r#"
            INSERT INTO user_offers (user_id, offer_id)
            SELECT u.id, o.id
              FROM users u
              JOIN user_preferences up ON up.user_id = u.id
              JOIN offers o
                ON o.is_active
               AND (COALESCE(array_length(up.modalities, 1), 0) = 0
                    OR LOWER(o.modality) = ANY (
                         ARRAY(SELECT LOWER(m) FROM unnest(up.modalities) AS m)))
               AND (COALESCE(array_length(up.districts, 1), 0) = 0
                    OR LOWER(o.district) = ANY (
                         ARRAY(SELECT LOWER(d) FROM unnest(up.districts) AS d)))
             WHERE u.is_active
               AND (COALESCE(array_length(up.modalities, 1), 0) > 0
                    OR COALESCE(array_length(up.districts, 1), 0) > 0)
            ON CONFLICT (user_id, offer_id) DO NOTHING
            "#,
        )
        .execute(&self.pool)
        .await
        .context("associating matching offers")?;
        let associated = result.rows_affected();
        if associated > 0 {
            info!(associated, "associated matching offers with users");
        }
        Ok(associated)
    }
}

#[async_trait]
impl NotifyStore for PgStore {
    async fn eligible_recipients(&self, mode: MatchMode) -> Result<Vec<Recipient>> {
        let rows = match mode {
            MatchMode::PendingOffers => {
                sqlx::query(
                    r#"
                    SELECT u.id AS user_id,
                           u.device_token,
                           COUNT(uo.offer_id) AS match_count
                      FROM users u
                      LEFT JOIN user_preferences up ON up.user_id = u.id
                      JOIN user_offers uo
                        ON uo.user_id = u.id
                       AND uo.notified_at IS NULL
                     WHERE u.is_active
                       AND u.device_token IS NOT NULL
                       AND u.device_token <> ''
                       AND (up.daily_notifications IS NULL OR up.daily_notifications)
                     GROUP BY u.id, u.device_token
                    HAVING COUNT(uo.offer_id) > 0
                    "#,
                )
                .fetch_all(&self.pool)
                .await
                .context("resolving recipients by pending offers")?
            }
            MatchMode::Preferences => {
                // A preference dimension left empty is unconstrained;
                // users with neither dimension configured are skipped.
                sqlx::query(
                    r#"
                    SELECT u.id AS user_id,
                           u.device_token,
                           COUNT(o.id) AS match_count
                      FROM users u
                      JOIN user_preferences up ON up.user_id = u.id
                      JOIN offers o
                        ON o.is_active
                       AND (COALESCE(array_length(up.modalities, 1), 0) = 0
                            OR LOWER(o.modality) = ANY (
                                 ARRAY(SELECT LOWER(m) FROM unnest(up.modalities) AS m)))
                       AND (COALESCE(array_length(up.districts, 1), 0) = 0
                            OR LOWER(o.district) = ANY (
                                 ARRAY(SELECT LOWER(d) FROM unnest(up.districts) AS d)))
                     WHERE u.is_active
                       AND u.device_token IS NOT NULL
                       AND u.device_token <> ''
                       AND (up.daily_notifications IS NULL OR up.daily_notifications)
                       AND (COALESCE(array_length(up.modalities, 1), 0) > 0
                            OR COALESCE(array_length(up.districts, 1), 0) > 0)
                     GROUP BY u.id, u.device_token
                    HAVING COUNT(o.id) > 0
                    "#,
                )
                .fetch_all(&self.pool)
                .await
                .context("resolving recipients by preferences")?
            }
        };

        let mut recipients = Vec::with_capacity(rows.len());
        for row in rows {
            let user_id: Uuid = row.try_get("user_id")?;
            let delivery_address: String = row.try_get("device_token")?;
            let match_count: i64 = row.try_get("match_count")?;
            recipients.push(Recipient::new(user_id, delivery_address, match_count));
        }
        Ok(recipients)
    }

    async fn mark_offers_notified(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE user_offers
               SET notified_at = $2
             WHERE user_id = $1
               AND notified_at IS NULL
            "#,
        )
        .bind(user_id)
        .bind(at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("marking offers notified for user {user_id}"))?;
        Ok(())
    }

    async fn clear_delivery_address(&self, user_id: Uuid) -> Result<()> {
        sqlx::query("UPDATE users SET device_token = NULL WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .with_context(|| format!("clearing delivery address for user {user_id}"))?;
        Ok(())
    }
}
