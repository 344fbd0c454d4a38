use chrono::{Duration, NaiveDateTime, Timelike};
use diesel::dsl::{count_star, exists};
use diesel::prelude::*;

use crate::contains_ignore_case;
use crate::db::{DbError, SqlitePool};
use crate::models::{Event, NewEvent};
use crate::schema::events;

pub const DEFAULT_SEARCH_LIMIT: i64 = 50;
pub const DEFAULT_RANGE_LIMIT: i64 = 100;

#[derive(Debug, Clone)]
pub struct EventStatistics {
    pub total_events: i64,
    pub unique_employees: usize,
    pub per_direction: Vec<(String, i64)>,
    pub last_event: Option<Event>,
}

pub fn insert_event(pool: &SqlitePool, new_event: &NewEvent) -> Result<Event, DbError> {
    let conn = &mut pool.get()?;

    Ok(diesel::insert_into(events::table)
        .values(new_event)
        .get_result(conn)?)
}

/// Distinct stored employee names containing `pattern`, alphabetical.
fn matching_employee_names(
    conn: &mut SqliteConnection,
    pattern: &str,
) -> QueryResult<Vec<String>> {
    let names: Vec<String> = events::table
        .select(events::employee_name)
        .distinct()
        .order(events::employee_name.asc())
        .load(conn)?;

    Ok(names
        .into_iter()
        .filter(|name| contains_ignore_case(name, pattern))
        .collect())
}

/// Most recent first.
pub fn find_events_by_employee(
    pool: &SqlitePool,
    pattern: &str,
    limit: i64,
) -> Result<Vec<Event>, DbError> {
    let conn = &mut pool.get()?;

    let names = matching_employee_names(conn, pattern)?;
    if names.is_empty() {
        return Ok(Vec::new());
    }

    Ok(events::table
        .filter(events::employee_name.eq_any(names))
        .order((events::event_timestamp.desc(), events::id.desc()))
        .limit(limit)
        .load::<Event>(conn)?)
}

/// Oldest first, inclusive window `[now - days, now]`.
pub fn find_events_by_employee_and_period(
    pool: &SqlitePool,
    pattern: &str,
    days: i64,
    now: NaiveDateTime,
) -> Result<Vec<Event>, DbError> {
    let conn = &mut pool.get()?;

    let names = matching_employee_names(conn, pattern)?;
    if names.is_empty() {
        return Ok(Vec::new());
    }

    let since = now - Duration::days(days);

    Ok(events::table
        .filter(events::employee_name.eq_any(names))
        .filter(events::event_timestamp.ge(since))
        .filter(events::event_timestamp.le(now))
        .order((events::event_timestamp.asc(), events::id.asc()))
        .load::<Event>(conn)?)
}

pub fn find_events_by_date_range(
    pool: &SqlitePool,
    start: NaiveDateTime,
    end: NaiveDateTime,
    limit: i64,
) -> Result<Vec<Event>, DbError> {
    let conn = &mut pool.get()?;

    Ok(events::table
        .filter(events::event_timestamp.between(start, end))
        .order((events::event_timestamp.desc(), events::id.desc()))
        .limit(limit)
        .load::<Event>(conn)?)
}

pub fn delete_events_older_than(
    pool: &SqlitePool,
    retention_days: i64,
    now: NaiveDateTime,
) -> Result<usize, DbError> {
    let cutoff = Duration::try_days(retention_days)
        .and_then(|age| now.checked_sub_signed(age))
        .ok_or(DbError::OutOfRange(format!(
            "retention of {} days before {}",
            retention_days, now
        )))?;

    let conn = &mut pool.get()?;
    let deleted = diesel::delete(events::table.filter(events::event_timestamp.lt(cutoff)))
        .execute(conn)?;

    tracing::info!(
        deleted,
        retention_days,
        cutoff = %cutoff,
        "Deleted expired events"
    );

    Ok(deleted)
}

pub fn get_event_statistics(pool: &SqlitePool) -> Result<EventStatistics, DbError> {
    let conn = &mut pool.get()?;

    let total_events = events::table.select(count_star()).first::<i64>(conn)?;

    let unique_employees = events::table
        .select(events::employee_name)
        .distinct()
        .load::<String>(conn)?
        .len();

    let per_direction = events::table
        .group_by(events::direction)
        .select((events::direction, count_star()))
        .order(events::direction.asc())
        .load::<(String, i64)>(conn)?;

    let last_event = events::table
        .order((events::event_timestamp.desc(), events::id.desc()))
        .first::<Event>(conn)
        .optional()?;

    Ok(EventStatistics {
        total_events,
        unique_employees,
        per_direction,
        last_event,
    })
}

/// First stored name (alphabetically) containing `pattern`.
pub fn find_full_employee_name(
    pool: &SqlitePool,
    pattern: &str,
) -> Result<Option<String>, DbError> {
    let conn = &mut pool.get()?;
    Ok(matching_employee_names(conn, pattern)?.into_iter().next())
}

fn event_in_minute(
    conn: &mut SqliteConnection,
    employee: &str,
    direction: &str,
    timestamp: NaiveDateTime,
) -> QueryResult<bool> {
    let minute_start = timestamp
        .with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(timestamp);
    let minute_end = minute_start + Duration::minutes(1);

    diesel::select(exists(
        events::table
            .filter(events::employee_name.eq(employee))
            .filter(events::direction.eq(direction))
            .filter(events::event_timestamp.ge(minute_start))
            .filter(events::event_timestamp.lt(minute_end)),
    ))
    .get_result::<bool>(conn)
}

/// Whether the same employee already passed in the same direction during the
/// wall-clock minute of `timestamp`.
pub fn has_event_in_minute(
    pool: &SqlitePool,
    employee: &str,
    direction: &str,
    timestamp: NaiveDateTime,
) -> Result<bool, DbError> {
    let conn = &mut pool.get()?;
    Ok(event_in_minute(conn, employee, direction, timestamp)?)
}

/// Inserts the event unless its employee, direction and minute are already
/// stored. The check and the insert share one immediate transaction, so
/// concurrent writers cannot both store the same pass. `None` for a duplicate.
pub fn insert_event_unless_duplicate(
    pool: &SqlitePool,
    new_event: &NewEvent,
) -> Result<Option<Event>, DbError> {
    let conn = &mut pool.get()?;

    let inserted = conn.immediate_transaction::<_, diesel::result::Error, _>(|conn| {
        if event_in_minute(
            conn,
            new_event.employee_name,
            new_event.direction,
            new_event.event_timestamp,
        )? {
            return Ok(None);
        }

        diesel::insert_into(events::table)
            .values(new_event)
            .get_result::<Event>(conn)
            .map(Some)
    })?;

    Ok(inserted)
}


#[cfg(test)]
mod tests {
    use super::test_support::{at, store};
    use super::*;
    use crate::db::test_pool;

    #[test]
    fn test_insert_event_returns_row() {
        let pool = test_pool();
        let event = store(&pool, "Иванов И. И.", "Вход", at(2024, 9, 16, 5, 2, 49));

        assert!(event.id > 0);
        assert_eq!(event.employee_name, "Иванов И. И.");
        assert_eq!(event.event_timestamp, at(2024, 9, 16, 5, 2, 49));
    }

    #[test]
    fn test_find_by_employee_is_case_insensitive_and_newest_first() {
        let pool = test_pool();
        store(&pool, "Иванов И. И.", "Вход", at(2024, 9, 16, 8, 0, 0));
        store(&pool, "Иванов И. И.", "Выход", at(2024, 9, 16, 17, 0, 0));
        store(&pool, "Петров П. П.", "Вход", at(2024, 9, 16, 9, 0, 0));

        let found = find_events_by_employee(&pool, "иванов", DEFAULT_SEARCH_LIMIT).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].direction, "Выход");
        assert_eq!(found[1].direction, "Вход");

        let limited = find_events_by_employee(&pool, "ИВАНОВ", 1).unwrap();
        assert_eq!(limited.len(), 1);

        assert!(find_events_by_employee(&pool, "Сидоров", 10)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_find_by_employee_and_period_window_is_inclusive_and_ascending() {
        let pool = test_pool();
        let now = at(2024, 10, 31, 12, 0, 0);
        store(&pool, "Иванов", "Вход", at(2024, 10, 1, 12, 0, 0));
        store(&pool, "Иванов", "Выход", now);
        store(&pool, "Иванов", "Вход", at(2024, 9, 30, 11, 59, 59));
        store(&pool, "Иванов", "Вход", at(2024, 10, 15, 8, 0, 0));

        let found = find_events_by_employee_and_period(&pool, "Иванов", 30, now).unwrap();
        let timestamps: Vec<_> = found.iter().map(|e| e.event_timestamp).collect();

        assert_eq!(
            timestamps,
            vec![
                at(2024, 10, 1, 12, 0, 0),
                at(2024, 10, 15, 8, 0, 0),
                now
            ]
        );
    }

    #[test]
    fn test_find_by_date_range() {
        let pool = test_pool();
        store(&pool, "Иванов", "Вход", at(2024, 9, 1, 8, 0, 0));
        store(&pool, "Петров", "Вход", at(2024, 9, 2, 8, 0, 0));
        store(&pool, "Сидоров", "Вход", at(2024, 9, 3, 8, 0, 0));

        let found = find_events_by_date_range(
            &pool,
            at(2024, 9, 2, 0, 0, 0),
            at(2024, 9, 3, 23, 59, 59),
            DEFAULT_RANGE_LIMIT,
        )
        .unwrap();

        let names: Vec<_> = found.iter().map(|e| e.employee_name.as_str()).collect();
        assert_eq!(names, vec!["Сидоров", "Петров"]);
    }

    #[test]
    fn test_delete_events_older_than_respects_retention() {
        let pool = test_pool();
        let now = at(2025, 3, 1, 2, 0, 0);
        store(&pool, "Иванов", "Вход", now - Duration::days(200));
        let kept = store(&pool, "Иванов", "Выход", now - Duration::days(100));

        let deleted = delete_events_older_than(&pool, 180, now).unwrap();
        assert_eq!(deleted, 1);

        let remaining = find_events_by_employee(&pool, "Иванов", 10).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, kept.id);

        assert_eq!(delete_events_older_than(&pool, 180, now).unwrap(), 0);
    }

    #[test]
    fn test_statistics() {
        let pool = test_pool();
        store(&pool, "Иванов", "Вход", at(2024, 9, 16, 8, 0, 0));
        store(&pool, "Иванов", "Выход", at(2024, 9, 16, 17, 0, 0));
        let last = store(&pool, "Петров", "Вход", at(2024, 9, 16, 18, 0, 0));

        let stats = get_event_statistics(&pool).unwrap();
        assert_eq!(stats.total_events, 3);
        assert_eq!(stats.unique_employees, 2);
        assert!(stats.per_direction.contains(&("Вход".to_string(), 2)));
        assert!(stats.per_direction.contains(&("Выход".to_string(), 1)));
        assert_eq!(stats.last_event.map(|e| e.id), Some(last.id));
    }

    #[test]
    fn test_statistics_on_empty_store() {
        let pool = test_pool();
        let stats = get_event_statistics(&pool).unwrap();

        assert_eq!(stats.total_events, 0);
        assert_eq!(stats.unique_employees, 0);
        assert!(stats.per_direction.is_empty());
        assert!(stats.last_event.is_none());
    }

    #[test]
    fn test_find_full_employee_name_is_alphabetical() {
        let pool = test_pool();
        store(&pool, "Иванова А. А.", "Вход", at(2024, 9, 16, 8, 0, 0));
        store(&pool, "Иванов И. И.", "Вход", at(2024, 9, 16, 9, 0, 0));

        assert_eq!(
            find_full_employee_name(&pool, "иванов").unwrap().as_deref(),
            Some("Иванов И. И.")
        );
        assert_eq!(find_full_employee_name(&pool, "Петров").unwrap(), None);
    }

    #[test]
    fn test_has_event_in_minute() {
        let pool = test_pool();
        store(&pool, "Иванов", "Вход", at(2024, 9, 16, 8, 0, 10));

        assert!(has_event_in_minute(&pool, "Иванов", "Вход", at(2024, 9, 16, 8, 0, 59)).unwrap());
        assert!(!has_event_in_minute(&pool, "Иванов", "Вход", at(2024, 9, 16, 8, 1, 0)).unwrap());
        assert!(!has_event_in_minute(&pool, "Иванов", "Выход", at(2024, 9, 16, 8, 0, 30)).unwrap());
        assert!(!has_event_in_minute(&pool, "Петров", "Вход", at(2024, 9, 16, 8, 0, 30)).unwrap());
    }

    #[test]
    fn test_insert_unless_duplicate_skips_same_minute() {
        let pool = test_pool();
        let event = |ts| NewEvent {
            employee_name: "Иванов",
            direction: "Вход",
            event_timestamp: ts,
            raw_message: "raw",
            rendered_message: "rendered",
            created_at: ts,
        };

        assert!(insert_event_unless_duplicate(&pool, &event(at(2024, 9, 16, 8, 0, 10)))
            .unwrap()
            .is_some());
        assert!(insert_event_unless_duplicate(&pool, &event(at(2024, 9, 16, 8, 0, 50)))
            .unwrap()
            .is_none());
        assert!(insert_event_unless_duplicate(&pool, &event(at(2024, 9, 16, 8, 1, 0)))
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_concurrent_inserts_store_one_row() {
        let dir = tempfile::TempDir::new().unwrap();
        let url = dir.path().join("urv.db");
        let pool = crate::db::create_pool(url.to_str().unwrap()).unwrap();
        crate::db::run_migrations(&pool).unwrap();

        for round in 0..20 {
            let employee = format!("Иванов-{}-", round);
            let ts = at(2024, 9, 16, 8, 0, 10);
            let barrier = std::sync::Barrier::new(2);

            let stored = std::thread::scope(|scope| {
                let workers: Vec<_> = (0..2)
                    .map(|_| {
                        scope.spawn(|| {
                            barrier.wait();
                            insert_event_unless_duplicate(
                                &pool,
                                &NewEvent {
                                    employee_name: &employee,
                                    direction: "Вход",
                                    event_timestamp: ts,
                                    raw_message: "raw",
                                    rendered_message: "rendered",
                                    created_at: ts,
                                },
                            )
                            .unwrap()
                            .is_some()
                        })
                    })
                    .collect();
                workers
                    .into_iter()
                    .map(|w| w.join().unwrap())
                    .filter(|inserted| *inserted)
                    .count()
            });

            assert_eq!(stored, 1, "round {}", round);
            assert_eq!(find_events_by_employee(&pool, &employee, 10).unwrap().len(), 1);
        }
    }

    #[test]
    fn test_delete_with_unrepresentable_cutoff_is_an_error() {
        let pool = test_pool();
        store(&pool, "Иванов", "Вход", at(2024, 9, 16, 8, 0, 0));

        let result = delete_events_older_than(&pool, 100_000_000, at(2024, 9, 16, 9, 0, 0));

        assert!(matches!(result, Err(DbError::OutOfRange(_))));
        assert_eq!(find_events_by_employee(&pool, "Иванов", 10).unwrap().len(), 1);
    }
}
