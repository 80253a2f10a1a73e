//! # Calendar Providers
//!
//! Vendor adapters behind the [`CalendarProvider`] trait, plus the registry
//! that maps a provider kind to its adapter. Supported vendors are a closed
//! set: Google Calendar and Microsoft Outlook, with a deterministic mock
//! adapter for local development and tests.

pub mod google;
pub mod microsoft;
pub mod mock;
pub mod registry;
pub mod trait_;

pub use google::GoogleCalendarProvider;
pub use microsoft::MicrosoftCalendarProvider;
pub use mock::MockCalendarProvider;
pub use registry::ProviderRegistry;
pub use trait_::{
    AccessRole, AccountInfo, Attendee, CalendarEvent, CalendarInfo, CalendarProvider, EventStatus,
    ProviderError, ProviderKind, ResponseStatus, TokenSet,
};
