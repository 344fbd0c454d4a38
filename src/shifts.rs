//! Work-session reconstruction from an employee's flat event history.
//!
//! Events are sorted by time and each entry is paired with the first exit that
//! follows it, wherever that exit falls. The resulting shifts are bucketed by
//! the entry's calendar day, so an overnight shift counts entirely towards the
//! day it started.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use std::collections::BTreeMap;

use crate::events::Direction;
use crate::models::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Punch {
    pub at: NaiveDateTime,
    pub direction: Direction,
}

impl Punch {
    /// `None` for rows whose direction text is not a known direction.
    pub fn from_event(event: &Event) -> Option<Punch> {
        Some(Punch {
            at: event.event_timestamp,
            direction: event.direction()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayMark {
    In(NaiveTime),
    /// `next_day` is set when the exit falls on a later date than its entry.
    Out { time: NaiveTime, next_day: bool },
    NoExit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShiftDay {
    pub date: NaiveDate,
    pub marks: Vec<DayMark>,
    pub worked: Duration,
    pub completed_pairs: usize,
}

impl ShiftDay {
    fn new(date: NaiveDate) -> Self {
        Self {
            date,
            marks: Vec::new(),
            worked: Duration::zero(),
            completed_pairs: 0,
        }
    }

    pub fn weekday(&self) -> Weekday {
        self.date.weekday()
    }

    pub fn has_missing_exit(&self) -> bool {
        self.marks.iter().any(|m| matches!(m, DayMark::NoExit))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShiftSummary {
    /// Ascending by date.
    pub days: Vec<ShiftDay>,
    pub total_entries: usize,
    pub total_exits: usize,
    pub work_days: usize,
    pub total_worked: Duration,
    pub average_worked: Duration,
}

impl ShiftSummary {
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
struct Shift {
    entry: NaiveDateTime,
    exit: Option<NaiveDateTime>,
}

fn pair_shifts(punches: &[Punch], yesterday: NaiveDate) -> Vec<Shift> {
    let mut sorted = punches.to_vec();
    sorted.sort_by_key(|p| p.at);

    let mut shifts = Vec::new();
    let mut i = 0;

    while i < sorted.len() {
        let punch = sorted[i];
        if punch.direction != Direction::Entry {
            i += 1;
            continue;
        }

        let exit_index = sorted[i + 1..]
            .iter()
            .position(|p| p.direction == Direction::Exit)
            .map(|offset| i + 1 + offset);

        match exit_index {
            Some(j) => {
                shifts.push(Shift {
                    entry: punch.at,
                    exit: Some(sorted[j].at),
                });
                i = j + 1;
            }
            None => {
                // Still in progress if it started today or yesterday.
                if punch.at.date() < yesterday {
                    shifts.push(Shift {
                        entry: punch.at,
                        exit: None,
                    });
                }
                i += 1;
            }
        }
    }

    shifts
}

/// Rebuilds per-day shifts. `today` is the reconstruction date; entries
/// without an exit from today or yesterday are left out as in progress.
pub fn reconstruct(punches: &[Punch], today: NaiveDate) -> ShiftSummary {
    let yesterday = today.pred_opt().unwrap_or(today);
    let shifts = pair_shifts(punches, yesterday);

    let mut days: BTreeMap<NaiveDate, ShiftDay> = BTreeMap::new();
    let mut total_exits = 0;

    for shift in &shifts {
        let entry_date = shift.entry.date();
        let day = days
            .entry(entry_date)
            .or_insert_with(|| ShiftDay::new(entry_date));

        day.marks.push(DayMark::In(shift.entry.time()));

        match shift.exit {
            Some(exit) => {
                day.marks.push(DayMark::Out {
                    time: exit.time(),
                    next_day: exit.date() != entry_date,
                });
                let delta = exit - shift.entry;
                if delta > Duration::zero() {
                    day.worked = day.worked + delta;
                }
                day.completed_pairs += 1;
                total_exits += 1;
            }
            None => day.marks.push(DayMark::NoExit),
        }
    }

    let days: Vec<ShiftDay> = days.into_values().collect();
    let work_days = days.iter().filter(|d| d.completed_pairs > 0).count();
    let total_worked = days
        .iter()
        .fold(Duration::zero(), |acc, d| acc + d.worked);
    let average_worked = if work_days > 0 {
        Duration::seconds(total_worked.num_seconds() / work_days as i64)
    } else {
        Duration::zero()
    };

    ShiftSummary {
        total_entries: shifts.len(),
        total_exits,
        work_days,
        total_worked,
        average_worked,
        days,
    }
}

pub fn reconstruct_events(events: &[Event], today: NaiveDate) -> ShiftSummary {
    let punches: Vec<Punch> = events.iter().filter_map(Punch::from_event).collect();
    reconstruct(&punches, today)
}
