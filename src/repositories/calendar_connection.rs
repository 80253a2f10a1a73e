//! Calendar connection repository
//!
//! Encapsulates SeaORM operations for the calendar_connections table. All
//! read and delete paths are user-scoped; a connection belonging to another
//! user is indistinguishable from a missing one.

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::calendar_connection::{self, Entity as CalendarConnection};

/// Repository for calendar connection database operations
#[derive(Debug, Clone)]
pub struct CalendarConnectionRepository {
    /// Database connection pool
    pub db: Arc<DatabaseConnection>,
}

impl CalendarConnectionRepository {
    /// Creates a new CalendarConnectionRepository instance
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Lists all connections for a user ordered by creation time then ID
    pub async fn find_by_user(&self, user_id: &Uuid) -> Result<Vec<calendar_connection::Model>> {
        Ok(CalendarConnection::find()
            .filter(calendar_connection::Column::UserId.eq(*user_id))
            .order_by_asc(calendar_connection::Column::CreatedAt)
            .order_by_asc(calendar_connection::Column::Id)
            .all(&*self.db)
            .await?)
    }

    /// Retrieves a connection by its ID within a user scope
    pub async fn find_owned(
        &self,
        user_id: &Uuid,
        id: &Uuid,
    ) -> Result<Option<calendar_connection::Model>> {
        Ok(CalendarConnection::find_by_id(*id)
            .filter(calendar_connection::Column::UserId.eq(*user_id))
            .one(&*self.db)
            .await?)
    }

    /// Finds a connection by its unique `(user, provider, account_email)` tuple
    pub async fn find_by_natural_key(
        &self,
        user_id: &Uuid,
        provider: &str,
        account_email: &str,
    ) -> Result<Option<calendar_connection::Model>> {
        Ok(CalendarConnection::find()
            .filter(calendar_connection::Column::UserId.eq(*user_id))
            .filter(calendar_connection::Column::Provider.eq(provider))
            .filter(calendar_connection::Column::AccountEmail.eq(account_email))
            .one(&*self.db)
            .await?)
    }

    /// Creates a new connection record
    pub async fn create(
        &self,
        connection: calendar_connection::ActiveModel,
    ) -> Result<calendar_connection::Model> {
        let id = connection
            .id
            .clone()
            .take()
            .ok_or_else(|| anyhow!("connection id must be set"))?;

        connection.insert(&*self.db).await?;

        // For SQLite, query the record directly since we already know the ID
        let fetched = CalendarConnection::find_by_id(id).one(&*self.db).await?;
        fetched.ok_or_else(|| anyhow!("connection not persisted"))
    }

    /// Replaces the token triple on a connection and reactivates it.
    ///
    /// The caller decides the refresh token value; preserving a prior refresh
    /// token when the vendor omits one happens above this layer.
    pub async fn update_tokens(
        &self,
        id: &Uuid,
        access_token: String,
        refresh_token: Option<String>,
        token_expires_at: Option<DateTime<Utc>>,
    ) -> Result<calendar_connection::Model> {
        let existing = CalendarConnection::find_by_id(*id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| anyhow!("Connection '{}' not found", id))?;

        let mut model: calendar_connection::ActiveModel = existing.into();
        model.access_token = Set(access_token);
        model.refresh_token = Set(refresh_token);
        model.token_expires_at = Set(token_expires_at.map(DateTimeWithTimeZone::from));
        model.is_active = Set(true);
        model.updated_at = Set(Utc::now().into());

        Ok(model.update(&*self.db).await?)
    }

    /// Updates the account display name on a connection
    pub async fn update_account_name(
        &self,
        id: &Uuid,
        account_name: Option<String>,
    ) -> Result<calendar_connection::Model> {
        let existing = CalendarConnection::find_by_id(*id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| anyhow!("Connection '{}' not found", id))?;

        let mut model: calendar_connection::ActiveModel = existing.into();
        model.account_name = Set(account_name);
        model.updated_at = Set(Utc::now().into());

        Ok(model.update(&*self.db).await?)
    }

    /// Sets the active flag on a connection
    pub async fn set_active(
        &self,
        id: &Uuid,
        is_active: bool,
    ) -> Result<calendar_connection::Model> {
        let existing = CalendarConnection::find_by_id(*id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| anyhow!("Connection '{}' not found", id))?;

        let mut model: calendar_connection::ActiveModel = existing.into();
        model.is_active = Set(is_active);
        model.updated_at = Set(Utc::now().into());

        Ok(model.update(&*self.db).await?)
    }

    /// Deletes a connection within a user scope.
    ///
    /// Returns `false` when no row matched, so callers can surface not-found
    /// without leaking whether the ID exists under another user.
    pub async fn delete_owned(&self, user_id: &Uuid, id: &Uuid) -> Result<bool> {
        let result = CalendarConnection::delete_by_id(*id)
            .filter(calendar_connection::Column::UserId.eq(*user_id))
            .exec(&*self.db)
            .await?;

        Ok(result.rows_affected > 0)
    }
}
