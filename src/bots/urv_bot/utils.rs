use chrono::NaiveDateTime;
use orion_relay::access::Profile;
use orion_relay::i18n::{language_for, t_with_args};
use orion_relay::models::AuthRequest;
use teloxide::prelude::*;
use teloxide::types::{BotCommand, BotCommandScope, Recipient, User};

pub fn language_of(user: Option<&User>) -> &'static str {
    language_for(user.and_then(|u| u.language_code.as_deref()))
}

pub fn profile_of(user: &User) -> Profile<'_> {
    Profile {
        user_id: user.id.0 as i64,
        username: user.username.as_deref(),
        first_name: Some(user.first_name.as_str()).filter(|s| !s.is_empty()),
        last_name: user.last_name.as_deref(),
    }
}

/// Trimmed command argument, `None` when empty.
pub fn non_empty(argument: &str) -> Option<&str> {
    Some(argument.trim()).filter(|arg| !arg.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserIdArgument {
    Missing,
    Invalid,
    Valid(i64),
}

pub fn parse_user_id_argument(argument: &str) -> UserIdArgument {
    match non_empty(argument) {
        None => UserIdArgument::Missing,
        Some(arg) => match arg.parse::<i64>() {
            Ok(id) => UserIdArgument::Valid(id),
            _ => UserIdArgument::Invalid,
        },
    }
}

pub fn format_auth_notice(language: &str, request: &AuthRequest, now: NaiveDateTime) -> String {
    let mut lines = vec![t_with_args(
        language,
        "auth.field_id",
        &[&request.user_id.to_string()],
    )];
    if let Some(username) = &request.username {
        lines.push(t_with_args(language, "auth.field_username", &[username.as_str()]));
    }
    if let Some(first_name) = &request.first_name {
        lines.push(t_with_args(language, "auth.field_first_name", &[first_name.as_str()]));
    }
    if let Some(last_name) = &request.last_name {
        lines.push(t_with_args(language, "auth.field_last_name", &[last_name.as_str()]));
    }

    t_with_args(
        language,
        "auth.admin_notice",
        &[
            &request.id.to_string(),
            &lines.join("\n"),
            &now.format("%Y-%m-%d %H:%M:%S").to_string(),
        ],
    )
}

fn user_commands() -> Vec<BotCommand> {
    vec![
        BotCommand::new("start", "Перезапуск бота"),
        BotCommand::new("filter", "Фильтр по фамилии сотрудника"),
        BotCommand::new("unfilter", "Отключить фильтр"),
        BotCommand::new("report", "Отчет УРВ по сотруднику"),
        BotCommand::new("help", "Справка"),
    ]
}

fn admin_commands() -> Vec<BotCommand> {
    let mut commands = user_commands();
    commands.extend([
        BotCommand::new("pending", "Заявки на рассмотрении"),
        BotCommand::new("approve", "Одобрить заявку"),
        BotCommand::new("reject", "Отклонить заявку"),
        BotCommand::new("listusers", "Список пользователей"),
        BotCommand::new("adduser", "Добавить пользователя"),
        BotCommand::new("removeuser", "Удалить пользователя"),
        BotCommand::new("stats", "Статистика"),
    ]);
    commands
}

/// Installs the command menus: the subscriber set for everyone and the full
/// set in each administrator's private chat.
pub async fn set_command_menus(bot: &Bot, admin_ids: &[i64]) {
    if let Err(e) = bot.set_my_commands(user_commands()).await {
        tracing::error!("Failed to set bot commands: {}", e);
    }

    for admin_id in admin_ids {
        if let Err(e) = bot
            .set_my_commands(admin_commands())
            .scope(BotCommandScope::Chat {
                chat_id: Recipient::Id(ChatId(*admin_id)),
            })
            .await
        {
            tracing::error!(admin_id, "Failed to set admin commands: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty("  Иванов И. И.  "), Some("Иванов И. И."));
        assert_eq!(non_empty(""), None);
        assert_eq!(non_empty("   "), None);
    }

    #[test]
    fn test_parse_user_id_argument() {
        assert_eq!(parse_user_id_argument(" 123 "), UserIdArgument::Valid(123));
        assert_eq!(parse_user_id_argument(""), UserIdArgument::Missing);
        assert_eq!(parse_user_id_argument("abc"), UserIdArgument::Invalid);
        assert_eq!(parse_user_id_argument("1 2"), UserIdArgument::Invalid);
    }

    #[test]
    fn test_format_auth_notice() {
        let now = NaiveDate::from_ymd_opt(2024, 9, 16)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        let request = AuthRequest {
            id: 5,
            user_id: 777,
            username: Some("ivanov".into()),
            first_name: Some("Иван".into()),
            last_name: None,
            status: "pending".into(),
            created_at: now,
            processed_by: None,
            processed_at: None,
        };

        let notice = format_auth_notice("ru", &request, now);

        assert!(notice.starts_with("👤 Запрос на авторизацию #5"));
        assert!(notice.contains("ID: 777\nUsername: @ivanov\nИмя: Иван\n"));
        assert!(!notice.contains("Фамилия"));
        assert!(notice.ends_with("Время: 2024-09-16 09:30:00"));
    }

    #[test]
    fn test_menus() {
        assert!(admin_commands().len() > user_commands().len());
        assert!(user_commands().iter().all(|c| c.command != "stats"));
    }
}
