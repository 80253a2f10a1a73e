//! # Calendar API Library
//!
//! This library provides the core functionality for the Calendar API service:
//! OAuth account connection, token lifecycle, and read-only calendar access
//! across Google Calendar and Microsoft Outlook.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod oauth_state;
pub mod providers;
pub mod repositories;
pub mod server;
pub mod service;
pub mod telemetry;
pub use migration;
