use crate::access::AuthStatus;
use crate::events::Direction;
use crate::schema::{auth_requests, authorized_users, events, user_filters};
use chrono::NaiveDateTime;
use diesel::prelude::*;

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = events)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Event {
    pub id: i32,
    pub employee_name: String,
    pub direction: String,
    pub event_timestamp: NaiveDateTime,
    pub raw_message: String,
    pub rendered_message: String,
    pub created_at: NaiveDateTime,
}

impl Event {
    pub fn direction(&self) -> Option<Direction> {
        Direction::parse(&self.direction)
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = events)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct NewEvent<'a> {
    pub employee_name: &'a str,
    pub direction: &'a str,
    pub event_timestamp: NaiveDateTime,
    pub raw_message: &'a str,
    pub rendered_message: &'a str,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = authorized_users)]
#[diesel(primary_key(user_id))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Subscriber {
    pub user_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub added_by: Option<i64>,
    pub added_at: NaiveDateTime,
}

impl Subscriber {
    pub fn display_name(&self) -> String {
        display_name(
            self.user_id,
            self.username.as_deref(),
            self.first_name.as_deref(),
            self.last_name.as_deref(),
        )
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = authorized_users)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct NewSubscriber<'a> {
    pub user_id: i64,
    pub username: Option<&'a str>,
    pub first_name: Option<&'a str>,
    pub last_name: Option<&'a str>,
    pub added_by: Option<i64>,
    pub added_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = auth_requests)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct AuthRequest {
    pub id: i32,
    pub user_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub status: String,
    pub created_at: NaiveDateTime,
    pub processed_by: Option<i64>,
    pub processed_at: Option<NaiveDateTime>,
}

impl AuthRequest {
    pub fn status(&self) -> Option<AuthStatus> {
        AuthStatus::parse(&self.status)
    }

    pub fn display_name(&self) -> String {
        display_name(
            self.user_id,
            self.username.as_deref(),
            self.first_name.as_deref(),
            self.last_name.as_deref(),
        )
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = auth_requests)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct NewAuthRequest<'a> {
    pub user_id: i64,
    pub username: Option<&'a str>,
    pub first_name: Option<&'a str>,
    pub last_name: Option<&'a str>,
    pub status: &'a str,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = user_filters)]
#[diesel(primary_key(user_id))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct UserFilter {
    pub user_id: i64,
    pub filter_text: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = user_filters)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct NewUserFilter<'a> {
    pub user_id: i64,
    pub filter_text: &'a str,
    pub created_at: NaiveDateTime,
}

fn display_name(
    user_id: i64,
    username: Option<&str>,
    first_name: Option<&str>,
    last_name: Option<&str>,
) -> String {
    let full_name = [first_name, last_name]
        .into_iter()
        .flatten()
        .filter(|s| !s.trim().is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    match (full_name.is_empty(), username) {
        (false, Some(u)) => format!("{} (@{})", full_name, u),
        (false, None) => full_name,
        (true, Some(u)) => format!("@{}", u),
        (true, None) => user_id.to_string(),
    }
}
