//! # Repositories
//!
//! Data access layer encapsulating SeaORM operations per table.

pub mod calendar_connection;

pub use calendar_connection::CalendarConnectionRepository;
