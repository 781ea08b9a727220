mod calendar;
mod google;
mod group;
mod log;
mod provider;
mod retry;

pub use calendar::{
    CalendarSync, CalendarSyncError, build_event, location_string, resolve_calendar_id,
};
pub use google::{
    DEFAULT_CALENDAR_API_BASE, DEFAULT_DIRECTORY_API_BASE, GoogleCalendarClient,
    GoogleDirectoryClient,
};
pub use group::{
    BatchAddReport, FailedMember, GroupPacing, GroupSync, GroupSyncError, resolve_group_email,
};
pub use log::{MAX_MESSAGE_CHARS, SyncLogger, truncate_message};
pub use provider::{
    CalendarEvent, CalendarProvider, EventAttendee, EventDateTime, ExtendedProperties,
    GroupDirectory, PrivateProperties, ProviderError,
};
pub use retry::{RetryPolicy, with_retry};
