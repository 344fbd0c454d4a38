//! Attendance report rendering: a standalone HTML page built from a
//! [`ShiftSummary`].

use chrono::{Duration, NaiveDate, NaiveDateTime, Weekday};
use html_escape::encode_text;
use std::fmt::Write;

use crate::shifts::{DayMark, ShiftDay, ShiftSummary};

const TEMPLATE: &str = include_str!("template.html");

/// Period choices offered to users, in days.
pub const PERIOD_CHOICES: [i64; 3] = [30, 90, 180];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportDocument {
    pub file_name: String,
    pub content: String,
}

pub fn period_label(days: i64) -> String {
    match days {
        30 => "1 месяц".to_string(),
        90 => "3 месяца".to_string(),
        180 => "6 месяцев".to_string(),
        other => format!("{} дней", other),
    }
}

pub fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Понедельник",
        Weekday::Tue => "Вторник",
        Weekday::Wed => "Среда",
        Weekday::Thu => "Четверг",
        Weekday::Fri => "Пятница",
        Weekday::Sat => "Суббота",
        Weekday::Sun => "Воскресенье",
    }
}

fn hours_minutes(duration: Duration) -> String {
    let minutes = duration.num_minutes().max(0);
    format!("{}ч {}м", minutes / 60, minutes % 60)
}

/// Worked time for one day, `-` when nothing was completed.
pub fn format_worked(duration: Duration) -> String {
    if duration <= Duration::zero() {
        "-".to_string()
    } else {
        hours_minutes(duration)
    }
}

pub fn report_file_name(end_date: NaiveDate, employee_label: &str, period_days: i64) -> String {
    format!(
        "{} {} отчет УРВ {}.html",
        end_date.format("%Y-%m-%d"),
        employee_label,
        period_label(period_days)
    )
}

fn render_day(day: &ShiftDay, out: &mut String) {
    let _ = write!(
        out,
        "<div class=\"day-block\"><div class=\"day-header-row\"><div class=\"day-header\">{} ({})</div><div class=\"day-time\">{}</div></div>",
        day.date.format("%d.%m.%Y"),
        weekday_name(day.weekday()),
        format_worked(day.worked)
    );
    out.push_str("<table class=\"day-table\"><tr><th>Время</th><th>Событие</th></tr>");

    for mark in &day.marks {
        match mark {
            DayMark::In(time) => {
                let _ = write!(
                    out,
                    "<tr><td class=\"time\">{}</td><td class=\"event-in\">Вход</td></tr>",
                    time.format("%H:%M")
                );
            }
            DayMark::Out { time, next_day } => {
                let marker = if *next_day {
                    "<span class=\"next-day\">+1</span>"
                } else {
                    ""
                };
                let _ = write!(
                    out,
                    "<tr><td class=\"time\">{}{}</td><td class=\"event-out\">Выход</td></tr>",
                    time.format("%H:%M"),
                    marker
                );
            }
            DayMark::NoExit => {
                out.push_str(
                    "<tr><td class=\"time\">-</td><td class=\"event-no-exit\">Нет выхода</td></tr>",
                );
            }
        }
    }

    out.push_str("</table></div>");
}

/// Replaces every `{{name}}` in `template` in a single pass. Substituted
/// values are copied verbatim, so placeholder-like text inside them stays as
/// is. Unknown names are left untouched.
fn fill_template(template: &str, values: &[(&str, String)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };
        let name = &after[..end];
        match values.iter().find(|(key, _)| *key == name) {
            Some((_, value)) => out.push_str(value),
            None => out.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);

    out
}

/// Renders the report, most recent day first. The file name carries the date
/// of the latest event, or the generation date when there is none.
pub fn render(
    summary: &ShiftSummary,
    employee_label: &str,
    period_days: i64,
    latest_event: Option<NaiveDate>,
    generated_at: NaiveDateTime,
) -> ReportDocument {
    let today = generated_at.date();
    let (period_start, period_end) = match (summary.days.first(), summary.days.last()) {
        (Some(first), Some(last)) => (first.date, last.date),
        _ => (today, today),
    };

    let mut details = String::new();
    if summary.days.is_empty() {
        details.push_str("<div class=\"empty\">Нет данных за выбранный период</div>");
    }
    for day in summary.days.iter().rev() {
        render_day(day, &mut details);
    }

    let content = fill_template(
        TEMPLATE,
        &[
            ("employee", encode_text(employee_label).into_owned()),
            ("period_label", period_label(period_days)),
            (
                "period",
                format!(
                    "{} — {}",
                    period_start.format("%d.%m.%Y"),
                    period_end.format("%d.%m.%Y")
                ),
            ),
            ("total_entries", summary.total_entries.to_string()),
            ("total_exits", summary.total_exits.to_string()),
            ("work_days", summary.work_days.to_string()),
            ("average_worked", hours_minutes(summary.average_worked)),
            (
                "generated_at",
                generated_at.format("%d.%m.%Y в %H:%M").to_string(),
            ),
            ("details", details),
        ],
    );

    ReportDocument {
        file_name: report_file_name(latest_event.unwrap_or(today), employee_label, period_days),
        content,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Direction;
    use crate::shifts::{reconstruct, Punch};

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn punch(at: NaiveDateTime, direction: Direction) -> Punch {
        Punch { at, direction }
    }

    #[test]
    fn test_period_labels() {
        assert_eq!(period_label(30), "1 месяц");
        assert_eq!(period_label(90), "3 месяца");
        assert_eq!(period_label(180), "6 месяцев");
        assert_eq!(period_label(7), "7 дней");
    }

    #[test]
    fn test_format_worked() {
        assert_eq!(format_worked(Duration::zero()), "-");
        assert_eq!(format_worked(Duration::minutes(8 * 60 + 30)), "8ч 30м");
        assert_eq!(format_worked(Duration::minutes(25 * 60 + 5)), "25ч 5м");
    }

    #[test]
    fn test_report_file_name() {
        let end = NaiveDate::from_ymd_opt(2024, 10, 31).unwrap();
        assert_eq!(
            report_file_name(end, "Иванов И. И.", 90),
            "2024-10-31 Иванов И. И. отчет УРВ 3 месяца.html"
        );
    }

    #[test]
    fn test_render_orders_days_descending_and_marks_overnight_exit() {
        let summary = reconstruct(
            &[
                punch(at(2024, 9, 16, 8, 0), Direction::Entry),
                punch(at(2024, 9, 16, 16, 30), Direction::Exit),
                punch(at(2024, 9, 18, 22, 0), Direction::Entry),
                punch(at(2024, 9, 19, 6, 0), Direction::Exit),
            ],
            NaiveDate::from_ymd_opt(2024, 10, 1).unwrap(),
        );

        let doc = render(
            &summary,
            "Иванов И. И.",
            30,
            NaiveDate::from_ymd_opt(2024, 9, 19),
            at(2024, 10, 1, 12, 5),
        );

        let later = doc.content.find("18.09.2024 (Среда)").unwrap();
        let earlier = doc.content.find("16.09.2024 (Понедельник)").unwrap();
        assert!(later < earlier);

        assert!(doc.content.contains("06:00<span class=\"next-day\">+1</span>"));
        assert!(doc.content.contains("8ч 30м"));
        assert!(doc.content.contains("16.09.2024 — 18.09.2024"));
        assert!(doc.content.contains("Сформировано 01.10.2024 в 12:05"));
        assert!(doc.content.contains("Отчет УРВ за 1 месяц"));
        assert_eq!(
            doc.file_name,
            "2024-09-19 Иванов И. И. отчет УРВ 1 месяц.html"
        );
    }

    #[test]
    fn test_render_no_exit_row() {
        let summary = reconstruct(
            &[punch(at(2024, 8, 1, 9, 0), Direction::Entry)],
            NaiveDate::from_ymd_opt(2024, 10, 1).unwrap(),
        );

        let doc = render(
            &summary,
            "Петров",
            90,
            NaiveDate::from_ymd_opt(2024, 8, 1),
            at(2024, 10, 1, 9, 0),
        );

        assert!(doc.content.contains("Нет выхода"));
        assert!(doc.content.contains("<div class=\"day-time\">-</div>"));
        assert!(doc.content.contains("0ч 0м"));
    }

    #[test]
    fn test_render_escapes_employee_label() {
        let summary = reconstruct(&[], NaiveDate::from_ymd_opt(2024, 10, 1).unwrap());
        let doc = render(&summary, "<b>Иванов</b>", 180, None, at(2024, 10, 1, 9, 0));

        assert!(doc.content.contains("&lt;b&gt;Иванов&lt;/b&gt;"));
        assert!(!doc.content.contains("<b>Иванов</b>"));
        assert!(doc.content.contains("01.10.2024 — 01.10.2024"));
        assert!(doc.content.contains("Нет данных за выбранный период"));
        assert_eq!(doc.file_name, "2024-10-01 <b>Иванов</b> отчет УРВ 6 месяцев.html");
    }

    #[test]
    fn test_placeholders_in_values_are_not_expanded() {
        let summary = reconstruct(
            &[punch(at(2024, 9, 16, 8, 0), Direction::Entry)],
            NaiveDate::from_ymd_opt(2024, 10, 1).unwrap(),
        );
        let label = "{{details}} {{period}}";

        let doc = render(&summary, label, 30, None, at(2024, 10, 1, 9, 0));

        assert_eq!(doc.content.matches("{{details}} {{period}}").count(), 2);
        assert_eq!(doc.content.matches("16.09.2024 (Понедельник)").count(), 1);
        assert_eq!(doc.content.matches("16.09.2024 — 16.09.2024").count(), 1);
    }

    #[test]
    fn test_fill_template_keeps_unknown_and_unclosed_markers() {
        let values = [("a", "1".to_string())];

        assert_eq!(fill_template("{{a}}-{{b}}-{{a", &values), "1-{{b}}-{{a");
    }
}
