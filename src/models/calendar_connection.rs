//! Calendar connection entity model
//!
//! SeaORM entity for the calendar_connections table, which stores a user's
//! authorization to a calendar vendor. Token columns are deliberately absent
//! from every serialized projection; only [`ConnectionInfo`] crosses the API
//! boundary.

use chrono::{DateTime, Utc};
use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Calendar connection entity. Never serialized directly: the model carries
/// access and refresh tokens in the clear.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "calendar_connections")]
pub struct Model {
    /// Unique identifier for the connection (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Owning user
    pub user_id: Uuid,

    /// Provider identifier ("google" or "microsoft")
    pub provider: String,

    /// Email of the vendor account (unique per user & provider)
    pub account_email: String,

    /// Display name of the vendor account (optional)
    pub account_name: Option<String>,

    /// OAuth access token
    pub access_token: String,

    /// OAuth refresh token, when the vendor issued one
    pub refresh_token: Option<String>,

    /// Access token expiry, when the vendor reported one
    pub token_expires_at: Option<DateTimeWithTimeZone>,

    /// Whether the connection is usable; cleared when a refresh is rejected
    pub is_active: bool,

    /// Timestamp when the connection was created
    pub created_at: DateTimeWithTimeZone,

    /// Timestamp when the connection was last updated
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// API projection of a connection. Holds everything a client may see and
/// nothing it may not: no token material.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// Connection identifier
    pub id: Uuid,
    /// Owning user
    pub user_id: Uuid,
    /// Provider identifier ("google" or "microsoft")
    pub provider: String,
    /// Email of the vendor account
    pub account_email: String,
    /// Display name of the vendor account
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_name: Option<String>,
    /// Whether the connection is usable
    pub is_active: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl From<Model> for ConnectionInfo {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            provider: model.provider,
            account_email: model.account_email,
            account_name: model.account_name,
            is_active: model.is_active,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}
