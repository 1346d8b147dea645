//! Repository for the `integrations` table.

use marketsync_core::types::{DbId, Platform};
use sqlx::PgPool;

use crate::models::integration::{Integration, NewIntegration, TokenGrant};
use crate::models::status::{ConnectionState, IntegrationHealth};

/// Column list for `integrations` queries.
const COLUMNS: &str = "\
    id, tenant_id, platform, shop_id, access_token, refresh_token, token_expires_at, \
    health_id, connection_state_id, failure_count, last_error, \
    catalog_import_offset, catalog_imported_items, last_synced_at, created_at, updated_at";

pub struct IntegrationRepo;

impl IntegrationRepo {
    /// Register (or reconnect) a shop for a tenant.
    ///
    /// Reconnecting resets health and the failure counter.
    pub async fn connect(pool: &PgPool, input: &NewIntegration) -> Result<Integration, sqlx::Error> {
        let query = format!(
            "INSERT INTO integrations \
                 (tenant_id, platform, shop_id, access_token, refresh_token, token_expires_at, \
                  health_id, connection_state_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (tenant_id, platform) DO UPDATE SET \
                 shop_id = EXCLUDED.shop_id, \
                 access_token = EXCLUDED.access_token, \
                 refresh_token = EXCLUDED.refresh_token, \
                 token_expires_at = EXCLUDED.token_expires_at, \
                 health_id = EXCLUDED.health_id, \
                 connection_state_id = EXCLUDED.connection_state_id, \
                 failure_count = 0, \
                 last_error = NULL, \
                 updated_at = NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Integration>(&query)
            .bind(input.tenant_id)
            .bind(input.platform.as_str())
            .bind(&input.shop_id)
            .bind(&input.access_token)
            .bind(&input.refresh_token)
            .bind(input.token_expires_at)
            .bind(IntegrationHealth::Healthy.id())
            .bind(ConnectionState::Active.id())
            .fetch_one(pool)
            .await
    }

    /// Resolve the active integration that owns a marketplace shop.
    pub async fn find_active_by_shop(
        pool: &PgPool,
        platform: Platform,
        shop_id: &str,
    ) -> Result<Option<Integration>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM integrations \
             WHERE platform = $1 AND shop_id = $2 AND connection_state_id = $3"
        );
        sqlx::query_as::<_, Integration>(&query)
            .bind(platform.as_str())
            .bind(shop_id)
            .bind(ConnectionState::Active.id())
            .fetch_optional(pool)
            .await
    }

    pub async fn find_for_tenant(
        pool: &PgPool,
        tenant_id: DbId,
        platform: Platform,
    ) -> Result<Option<Integration>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM integrations WHERE tenant_id = $1 AND platform = $2"
        );
        sqlx::query_as::<_, Integration>(&query)
            .bind(tenant_id)
            .bind(platform.as_str())
            .fetch_optional(pool)
            .await
    }

    /// Store refreshed tokens and mark the integration healthy.
    pub async fn update_tokens(
        pool: &PgPool,
        id: DbId,
        grant: &TokenGrant,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE integrations \
             SET access_token = $2, refresh_token = $3, token_expires_at = $4, \
                 health_id = $5, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(&grant.access_token)
        .bind(&grant.refresh_token)
        .bind(grant.expires_at)
        .bind(IntegrationHealth::Healthy.id())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Persist catalog import progress after a page. `finished` stamps
    /// `last_synced_at` for the final page.
    pub async fn record_import_progress(
        pool: &PgPool,
        id: DbId,
        next_offset: i64,
        imported: i64,
        finished: bool,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE integrations \
             SET catalog_import_offset = $2, \
                 catalog_imported_items = catalog_imported_items + $3, \
                 last_synced_at = CASE WHEN $5 THEN NOW() ELSE last_synced_at END, \
                 failure_count = 0, last_error = NULL, \
                 health_id = $4, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(next_offset)
        .bind(imported)
        .bind(IntegrationHealth::Healthy.id())
        .bind(finished)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Count a failure against the integration and mark it unhealthy.
    pub async fn record_failure(pool: &PgPool, id: DbId, error: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE integrations \
             SET failure_count = failure_count + 1, last_error = $2, health_id = $3, \
                 updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(error)
        .bind(IntegrationHealth::Unhealthy.id())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Stop routing webhooks to this integration.
    pub async fn disconnect(pool: &PgPool, id: DbId, reason: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE integrations \
             SET connection_state_id = $2, health_id = $3, last_error = $4, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(ConnectionState::Disconnected.id())
        .bind(IntegrationHealth::Disconnected.id())
        .bind(reason)
        .execute(pool)
        .await?;
        Ok(())
    }
}
