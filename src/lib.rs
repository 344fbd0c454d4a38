pub mod access;
pub mod config;
pub mod db;
pub mod events;
pub mod i18n;
pub mod models;
pub mod report;
pub mod retention;
pub mod routing;
pub mod schema;
pub mod shifts;
pub mod shutdown;

pub use access::{
    add_subscriber, clear_filter, create_auth_request, decide, decide_auth_request, filter_of,
    find_auth_request, find_pending_auth_request_for_user, is_authorized,
    list_pending_auth_requests, list_subscribers, remove_subscriber, set_filter, should_deliver,
};
pub use events::store::{
    delete_events_older_than, find_events_by_date_range, find_events_by_employee,
    find_events_by_employee_and_period, find_full_employee_name, get_event_statistics,
    has_event_in_minute, insert_event, insert_event_unless_duplicate,
};

/// Case-insensitive substring test over full Unicode, so Cyrillic names fold
/// the same way Latin ones do.
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
