use orion_relay::i18n::t;
use orion_relay::report::{period_label, PERIOD_CHOICES};
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::utils::text::truncate_bytes;

/// Telegram rejects callback payloads above this size.
const MAX_CALLBACK_DATA_BYTES: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    Approve(i32),
    Reject(i32),
    Report { days: i64, pattern: String },
}

pub fn auth_callback_data(approve: bool, request_id: i32) -> String {
    let action = if approve { "approve" } else { "reject" };
    format!("auth:{}:{}", action, request_id)
}

/// `report:<days>:<pattern>`, with the pattern shortened to fit the payload
/// limit.
pub fn report_callback_data(days: i64, pattern: &str) -> String {
    let prefix = format!("report:{}:", days);
    let room = MAX_CALLBACK_DATA_BYTES.saturating_sub(prefix.len());
    format!("{}{}", prefix, truncate_bytes(pattern, room))
}

pub fn parse_callback(data: &str) -> Option<CallbackAction> {
    if let Some(rest) = data.strip_prefix("auth:") {
        let (action, id) = rest.split_once(':')?;
        let id = id.parse::<i32>().ok()?;
        return match action {
            "approve" => Some(CallbackAction::Approve(id)),
            "reject" => Some(CallbackAction::Reject(id)),
            _ => None,
        };
    }

    if let Some(rest) = data.strip_prefix("report:") {
        let (days, pattern) = rest.split_once(':')?;
        let days = days.parse::<i64>().ok().filter(|d| *d > 0)?;
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return None;
        }
        return Some(CallbackAction::Report {
            days,
            pattern: pattern.to_string(),
        });
    }

    None
}

pub fn build_auth_keyboard(language: &str, request_id: i32) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback(
            t(language, "auth.approve_button"),
            auth_callback_data(true, request_id),
        ),
        InlineKeyboardButton::callback(
            t(language, "auth.reject_button"),
            auth_callback_data(false, request_id),
        ),
    ]])
}

pub fn build_report_keyboard(pattern: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![PERIOD_CHOICES
        .iter()
        .map(|days| {
            InlineKeyboardButton::callback(period_label(*days), report_callback_data(*days, pattern))
        })
        .collect::<Vec<_>>()])
}
