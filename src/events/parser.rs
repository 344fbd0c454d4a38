//! Free-text access-controller messages.
//!
//! A typical body looks like
//! `16.09.2024 5:02:49 Доступ предоставлен ... режим:Вход ... Сотрудник:Иванов И. И.`
//! and is turned into a [`ParsedMessage`] plus the one-line text shown to
//! subscribers.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use lazy_static::lazy_static;
use regex::Regex;

use super::Direction;

const UNKNOWN_DIRECTION_ICON: &str = "🚪";

lazy_static! {
    static ref DATE_RE: Regex =
        Regex::new(r"\b(\d{2})\.(\d{2})\.(\d{4})\b").expect("static regex is valid");
    static ref TIME_RE: Regex =
        Regex::new(r"\b((\d{1,2}):(\d{2})):(\d{2})\b").expect("static regex is valid");
    static ref DIRECTION_RE: Regex = Regex::new(r"режим:(\S+)").expect("static regex is valid");
    static ref EMPLOYEE_RE: Regex = Regex::new(r"Сотрудник:(.+)").expect("static regex is valid");
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMessage {
    pub employee_name: String,
    pub direction: Direction,
    pub date: Option<NaiveDate>,
    pub time: NaiveTime,
    pub raw_message: String,
    pub rendered_message: String,
}

impl ParsedMessage {
    /// Absolute timestamp, if the message carried its own date.
    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        self.date.map(|d| d.and_time(self.time))
    }

    pub fn timestamp_or(&self, fallback_date: NaiveDate) -> NaiveDateTime {
        self.date.unwrap_or(fallback_date).and_time(self.time)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseFailure {
    IncompleteFields { missing: Vec<&'static str> },
    /// A `режим:` token outside the known pair. The line still renders.
    UnknownDirection { token: String, rendered: String },
}

impl ParseFailure {
    /// Text to forward to subscribers instead of a rendered event line.
    pub fn forward_text<'a>(&'a self, raw: &'a str) -> &'a str {
        match self {
            ParseFailure::IncompleteFields { .. } => raw.trim(),
            ParseFailure::UnknownDirection { rendered, .. } => rendered,
        }
    }
}

impl std::fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseFailure::IncompleteFields { missing } => {
                write!(f, "Incomplete message, missing: {}", missing.join(", "))
            }
            ParseFailure::UnknownDirection { token, .. } => {
                write!(f, "Unknown direction token: {}", token)
            }
        }
    }
}

impl std::error::Error for ParseFailure {}

pub fn render_message(time: &str, direction: &str, employee: &str) -> String {
    let icon = Direction::parse(direction)
        .map(|d| d.icon())
        .unwrap_or(UNKNOWN_DIRECTION_ICON);
    format!("🕒 {} | {} {} | 👤 {}", time, icon, direction, employee)
}

pub fn parse(raw: &str) -> Result<ParsedMessage, ParseFailure> {
    let mut missing = Vec::new();

    let time = TIME_RE.captures(raw).and_then(|caps| {
        let hours = caps[2].parse().ok()?;
        let minutes = caps[3].parse().ok()?;
        let seconds = caps[4].parse().ok()?;
        let time = NaiveTime::from_hms_opt(hours, minutes, seconds)?;
        Some((caps[1].to_string(), time))
    });
    if time.is_none() {
        missing.push("time");
    }

    let direction_token = DIRECTION_RE
        .captures(raw)
        .map(|caps| caps[1].to_string());
    if direction_token.is_none() {
        missing.push("direction");
    }

    let employee_name = EMPLOYEE_RE
        .captures(raw)
        .map(|caps| caps[1].trim().to_string())
        .filter(|name| !name.is_empty());
    if employee_name.is_none() {
        missing.push("employee");
    }

    let (Some((short_time, time)), Some(token), Some(employee_name)) =
        (time, direction_token, employee_name)
    else {
        return Err(ParseFailure::IncompleteFields { missing });
    };

    let rendered_message = render_message(&short_time, &token, &employee_name);

    let Some(direction) = Direction::parse(&token) else {
        return Err(ParseFailure::UnknownDirection {
            token,
            rendered: rendered_message,
        });
    };

    let date = DATE_RE.captures(raw).and_then(|caps| {
        NaiveDate::from_ymd_opt(
            caps[3].parse().ok()?,
            caps[2].parse().ok()?,
            caps[1].parse().ok()?,
        )
    });

    Ok(ParsedMessage {
        employee_name,
        direction,
        date,
        time,
        raw_message: raw.to_string(),
        rendered_message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENTRY_MESSAGE: &str = "16.09.2024 5:02:49 Доступ предоставлен Считыватель 2, Прибор 19 Дверь:УРВ Проходная режим:Вход Зона доступа: Сотрудник:Иванов И. И.";
    const EXIT_MESSAGE: &str = "16.09.2024 17:45:03 Доступ предоставлен Считыватель 1, Прибор 19 Дверь:УРВ Проходная режим:Выход Зона доступа:Внешний мир Сотрудник:Петров П. П.\r\n";

    #[test]
    fn test_parse_entry_message() {
        let parsed = parse(ENTRY_MESSAGE).unwrap();

        assert_eq!(parsed.employee_name, "Иванов И. И.");
        assert_eq!(parsed.direction, Direction::Entry);
        assert_eq!(
            parsed.timestamp(),
            Some(
                NaiveDate::from_ymd_opt(2024, 9, 16)
                    .unwrap()
                    .and_hms_opt(5, 2, 49)
                    .unwrap()
            )
        );
        assert_eq!(parsed.rendered_message, "🕒 5:02 | ⚙️ Вход | 👤 Иванов И. И.");
        assert_eq!(parsed.raw_message, ENTRY_MESSAGE);
    }

    #[test]
    fn test_parse_exit_message_trims_employee() {
        let parsed = parse(EXIT_MESSAGE).unwrap();

        assert_eq!(parsed.employee_name, "Петров П. П.");
        assert_eq!(parsed.direction, Direction::Exit);
        assert_eq!(parsed.rendered_message, "🕒 17:45 | 🏡 Выход | 👤 Петров П. П.");
    }

    #[test]
    fn test_parse_without_date_uses_fallback() {
        let parsed = parse("8:15:00 режим:Вход Сотрудник:Сидоров").unwrap();
        assert_eq!(parsed.timestamp(), None);

        let fallback = NaiveDate::from_ymd_opt(2024, 10, 1).unwrap();
        assert_eq!(
            parsed.timestamp_or(fallback),
            fallback.and_hms_opt(8, 15, 0).unwrap()
        );
    }

    #[test]
    fn test_parse_reports_every_missing_field() {
        let err = parse("Доступ предоставлен").unwrap_err();
        assert_eq!(
            err,
            ParseFailure::IncompleteFields {
                missing: vec!["time", "direction", "employee"]
            }
        );
    }

    #[test]
    fn test_parse_rejects_blank_employee() {
        let err = parse("16.09.2024 5:02:49 режим:Вход Сотрудник:   ").unwrap_err();
        assert_eq!(
            err,
            ParseFailure::IncompleteFields {
                missing: vec!["employee"]
            }
        );
    }

    #[test]
    fn test_parse_rejects_impossible_time() {
        let err = parse("16.09.2024 25:61:00 режим:Вход Сотрудник:Иванов").unwrap_err();
        assert!(matches!(err, ParseFailure::IncompleteFields { .. }));
    }

    #[test]
    fn test_unknown_direction_still_renders() {
        let err = parse("16.09.2024 9:00:00 режим:Проход Сотрудник:Иванов").unwrap_err();
        match &err {
            ParseFailure::UnknownDirection { token, rendered } => {
                assert_eq!(token, "Проход");
                assert_eq!(rendered, "🕒 9:00 | 🚪 Проход | 👤 Иванов");
            }
            other => panic!("unexpected failure: {:?}", other),
        }
        assert_eq!(err.forward_text("ignored"), "🕒 9:00 | 🚪 Проход | 👤 Иванов");
    }

    #[test]
    fn test_incomplete_message_forwards_raw_text() {
        let raw = "  Тревога: дверь открыта  ";
        let err = parse(raw).unwrap_err();
        assert_eq!(err.forward_text(raw), "Тревога: дверь открыта");
    }

    #[test]
    fn test_invalid_calendar_date_is_treated_as_absent() {
        let parsed = parse("31.02.2024 10:00:00 режим:Выход Сотрудник:Иванов").unwrap();
        assert_eq!(parsed.date, None);
    }
}
