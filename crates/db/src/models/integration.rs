//! Per-tenant marketplace credentials, written by the OAuth flow and read
//! by the receiver (tenant resolution) and the catalog import worker.

use marketsync_core::types::{DbId, Platform, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

use super::status::{ConnectionState, IntegrationHealth, StatusId};

/// A row from the `integrations` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Integration {
    pub id: DbId,
    pub tenant_id: DbId,
    pub platform: String,
    pub shop_id: String,
    #[serde(skip_serializing)]
    pub access_token: String,
    #[serde(skip_serializing)]
    pub refresh_token: String,
    pub token_expires_at: Option<Timestamp>,
    pub health_id: StatusId,
    pub connection_state_id: StatusId,
    pub failure_count: i32,
    pub last_error: Option<String>,
    pub catalog_import_offset: i64,
    pub catalog_imported_items: i64,
    pub last_synced_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Integration {
    pub fn health(&self) -> Option<IntegrationHealth> {
        IntegrationHealth::from_id(self.health_id)
    }

    pub fn connection_state(&self) -> Option<ConnectionState> {
        ConnectionState::from_id(self.connection_state_id)
    }

    pub fn is_active(&self) -> bool {
        self.connection_state() == Some(ConnectionState::Active)
    }
}

/// DTO for registering a connected shop.
#[derive(Debug, Clone)]
pub struct NewIntegration {
    pub tenant_id: DbId,
    pub platform: Platform,
    pub shop_id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub token_expires_at: Option<Timestamp>,
}

/// Fresh token material from a refresh.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: Option<Timestamp>,
}
