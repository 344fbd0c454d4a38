use chrono::NaiveDateTime;
use diesel::prelude::*;
use std::collections::HashMap;

use crate::contains_ignore_case;
use crate::db::{DbError, SqlitePool};
use crate::models::{AuthRequest, NewAuthRequest, NewSubscriber, NewUserFilter, Subscriber};
use crate::schema::{auth_requests, authorized_users, user_filters};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    Pending,
    Approved,
    Rejected,
}

impl AuthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthStatus::Pending => "pending",
            AuthStatus::Approved => "approved",
            AuthStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<AuthStatus> {
        match s.to_lowercase().as_str() {
            "pending" => Some(AuthStatus::Pending),
            "approved" => Some(AuthStatus::Approved),
            "rejected" => Some(AuthStatus::Rejected),
            _ => None,
        }
    }
}

/// Telegram profile snapshot stored with requests and subscribers.
#[derive(Debug, Clone, Copy)]
pub struct Profile<'a> {
    pub user_id: i64,
    pub username: Option<&'a str>,
    pub first_name: Option<&'a str>,
    pub last_name: Option<&'a str>,
}

impl<'a> Profile<'a> {
    pub fn bare(user_id: i64) -> Self {
        Self {
            user_id,
            username: None,
            first_name: None,
            last_name: None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum DecisionOutcome {
    Approved(AuthRequest),
    Rejected(AuthRequest),
    AlreadyProcessed(AuthRequest),
    NotFound,
}

impl DecisionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(
            self,
            DecisionOutcome::Approved(_) | DecisionOutcome::Rejected(_)
        )
    }
}

pub fn is_authorized(pool: &SqlitePool, user_id: i64) -> Result<bool, DbError> {
    let conn = &mut pool.get()?;

    Ok(diesel::select(diesel::dsl::exists(
        authorized_users::table.filter(authorized_users::user_id.eq(user_id)),
    ))
    .get_result::<bool>(conn)?)
}

pub fn create_auth_request(
    pool: &SqlitePool,
    profile: Profile<'_>,
    now: NaiveDateTime,
) -> Result<AuthRequest, DbError> {
    let conn = &mut pool.get()?;

    let new_request = NewAuthRequest {
        user_id: profile.user_id,
        username: profile.username,
        first_name: profile.first_name,
        last_name: profile.last_name,
        status: AuthStatus::Pending.as_str(),
        created_at: now,
    };

    Ok(diesel::insert_into(auth_requests::table)
        .values(&new_request)
        .get_result(conn)?)
}

pub fn find_auth_request(
    pool: &SqlitePool,
    request_id: i32,
) -> Result<Option<AuthRequest>, DbError> {
    let conn = &mut pool.get()?;

    Ok(auth_requests::table
        .find(request_id)
        .first::<AuthRequest>(conn)
        .optional()?)
}

pub fn find_pending_auth_request_for_user(
    pool: &SqlitePool,
    user_id: i64,
) -> Result<Option<AuthRequest>, DbError> {
    let conn = &mut pool.get()?;

    Ok(auth_requests::table
        .filter(auth_requests::user_id.eq(user_id))
        .filter(auth_requests::status.eq(AuthStatus::Pending.as_str()))
        .order(auth_requests::id.desc())
        .first::<AuthRequest>(conn)
        .optional()?)
}

pub fn list_pending_auth_requests(pool: &SqlitePool) -> Result<Vec<AuthRequest>, DbError> {
    let conn = &mut pool.get()?;

    Ok(auth_requests::table
        .filter(auth_requests::status.eq(AuthStatus::Pending.as_str()))
        .order(auth_requests::id.asc())
        .load::<AuthRequest>(conn)?)
}

/// Resolves a pending request. Reading the request, writing the decision and
/// creating the subscriber happen in one immediate transaction; only a
/// `pending` request can move.
pub fn decide_auth_request(
    pool: &SqlitePool,
    request_id: i32,
    approved: bool,
    decided_by: i64,
    now: NaiveDateTime,
) -> Result<DecisionOutcome, DbError> {
    let conn = &mut pool.get()?;

    let outcome = conn.immediate_transaction::<_, diesel::result::Error, _>(|conn| {
        let request = auth_requests::table
            .find(request_id)
            .first::<AuthRequest>(conn)
            .optional()?;

        let Some(request) = request else {
            return Ok(DecisionOutcome::NotFound);
        };

        if request.status() != Some(AuthStatus::Pending) {
            return Ok(DecisionOutcome::AlreadyProcessed(request));
        }

        let new_status = if approved {
            AuthStatus::Approved
        } else {
            AuthStatus::Rejected
        };

        let updated: AuthRequest = diesel::update(
            auth_requests::table
                .find(request_id)
                .filter(auth_requests::status.eq(AuthStatus::Pending.as_str())),
        )
        .set((
            auth_requests::status.eq(new_status.as_str()),
            auth_requests::processed_by.eq(Some(decided_by)),
            auth_requests::processed_at.eq(Some(now)),
        ))
        .get_result(conn)?;

        if !approved {
            return Ok(DecisionOutcome::Rejected(updated));
        }

        diesel::insert_or_ignore_into(authorized_users::table)
            .values(&NewSubscriber {
                user_id: updated.user_id,
                username: updated.username.as_deref(),
                first_name: updated.first_name.as_deref(),
                last_name: updated.last_name.as_deref(),
                added_by: Some(decided_by),
                added_at: now,
            })
            .execute(conn)?;

        Ok(DecisionOutcome::Approved(updated))
    })?;

    match &outcome {
        DecisionOutcome::Approved(r) | DecisionOutcome::Rejected(r) => tracing::info!(
            request_id,
            user_id = r.user_id,
            decided_by,
            status = %r.status,
            "Auth request decided"
        ),
        DecisionOutcome::AlreadyProcessed(r) => tracing::warn!(
            request_id,
            status = %r.status,
            "Auth request already processed"
        ),
        DecisionOutcome::NotFound => tracing::warn!(request_id, "Auth request not found"),
    }

    Ok(outcome)
}

/// `true` when the decision was applied, `false` for a no-op on a terminal
/// or unknown request.
pub fn decide(
    pool: &SqlitePool,
    request_id: i32,
    approved: bool,
    decided_by: i64,
    now: NaiveDateTime,
) -> Result<bool, DbError> {
    Ok(decide_auth_request(pool, request_id, approved, decided_by, now)?.is_applied())
}

/// Direct authorization by an administrator. `false` if already a subscriber.
pub fn add_subscriber(
    pool: &SqlitePool,
    profile: Profile<'_>,
    added_by: i64,
    now: NaiveDateTime,
) -> Result<bool, DbError> {
    let conn = &mut pool.get()?;

    let inserted = diesel::insert_or_ignore_into(authorized_users::table)
        .values(&NewSubscriber {
            user_id: profile.user_id,
            username: profile.username,
            first_name: profile.first_name,
            last_name: profile.last_name,
            added_by: Some(added_by),
            added_at: now,
        })
        .execute(conn)?;

    Ok(inserted > 0)
}

/// Removes the subscriber and their filter.
pub fn remove_subscriber(pool: &SqlitePool, user_id: i64) -> Result<bool, DbError> {
    let conn = &mut pool.get()?;

    let removed = conn.immediate_transaction::<_, diesel::result::Error, _>(|conn| {
        diesel::delete(user_filters::table.filter(user_filters::user_id.eq(user_id)))
            .execute(conn)?;
        diesel::delete(authorized_users::table.filter(authorized_users::user_id.eq(user_id)))
            .execute(conn)
    })?;

    Ok(removed > 0)
}

pub fn list_subscribers(pool: &SqlitePool) -> Result<Vec<Subscriber>, DbError> {
    let conn = &mut pool.get()?;

    Ok(authorized_users::table
        .order((authorized_users::added_at.asc(), authorized_users::user_id.asc()))
        .load::<Subscriber>(conn)?)
}

pub fn set_filter(
    pool: &SqlitePool,
    user_id: i64,
    filter_text: &str,
    now: NaiveDateTime,
) -> Result<(), DbError> {
    let conn = &mut pool.get()?;

    diesel::replace_into(user_filters::table)
        .values(&NewUserFilter {
            user_id,
            filter_text,
            created_at: now,
        })
        .execute(conn)?;

    Ok(())
}

/// `false` if no filter was set.
pub fn clear_filter(pool: &SqlitePool, user_id: i64) -> Result<bool, DbError> {
    let conn = &mut pool.get()?;

    let deleted = diesel::delete(user_filters::table.filter(user_filters::user_id.eq(user_id)))
        .execute(conn)?;

    Ok(deleted > 0)
}

pub fn filter_of(pool: &SqlitePool, user_id: i64) -> Result<Option<String>, DbError> {
    let conn = &mut pool.get()?;

    Ok(user_filters::table
        .filter(user_filters::user_id.eq(user_id))
        .select(user_filters::filter_text)
        .first::<String>(conn)
        .optional()?)
}

/// Every subscriber paired with their optional filter.
pub fn subscribers_with_filters(
    pool: &SqlitePool,
) -> Result<Vec<(i64, Option<String>)>, DbError> {
    let conn = &mut pool.get()?;

    let subscriber_ids = authorized_users::table
        .select(authorized_users::user_id)
        .order(authorized_users::user_id.asc())
        .load::<i64>(conn)?;

    let mut filters: HashMap<i64, String> = user_filters::table
        .select((user_filters::user_id, user_filters::filter_text))
        .load::<(i64, String)>(conn)?
        .into_iter()
        .collect();

    Ok(subscriber_ids
        .into_iter()
        .map(|id| (id, filters.remove(&id)))
        .collect())
}

pub fn filter_allows(filter: Option<&str>, text: &str) -> bool {
    match filter {
        Some(f) if !f.trim().is_empty() => contains_ignore_case(text, f.trim()),
        _ => true,
    }
}

pub fn should_deliver(pool: &SqlitePool, user_id: i64, text: &str) -> Result<bool, DbError> {
    if !is_authorized(pool, user_id)? {
        return Ok(false);
    }
    let filter = filter_of(pool, user_id)?;
    Ok(filter_allows(filter.as_deref(), text))
}
