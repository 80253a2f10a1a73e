//! # Data Models
//!
//! This module contains all the data models used throughout the Calendar API.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod calendar_connection;

pub use calendar_connection::Entity as CalendarConnection;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "calendar-api".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
