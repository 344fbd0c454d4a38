const TELEGRAM_MAX_MESSAGE_BYTES: usize = 4096;
const TRUNCATION_SUFFIX: &str = "\n\n... (обрезано)";

/// Cuts plain text down to what a single Telegram message can carry, on a
/// character boundary.
pub fn truncate_message(message: &str) -> String {
    if message.len() <= TELEGRAM_MAX_MESSAGE_BYTES {
        return message.to_string();
    }

    let max_content_bytes = TELEGRAM_MAX_MESSAGE_BYTES - TRUNCATION_SUFFIX.len();

    let mut truncated = String::with_capacity(TELEGRAM_MAX_MESSAGE_BYTES);
    for ch in message.chars() {
        if truncated.len() + ch.len_utf8() > max_content_bytes {
            break;
        }
        truncated.push(ch);
    }

    truncated.push_str(TRUNCATION_SUFFIX);
    truncated
}

/// Longest prefix of `value` that fits in `max_bytes` without splitting a
/// character.
pub fn truncate_bytes(value: &str, max_bytes: usize) -> &str {
    if value.len() <= max_bytes {
        return value;
    }
    let mut end = max_bytes;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_message_untouched() {
        assert_eq!(truncate_message("🕒 5:02 | ⚙️ Вход"), "🕒 5:02 | ⚙️ Вход");
    }

    #[test]
    fn test_long_cyrillic_message_is_cut_on_char_boundary() {
        let message = "Ж".repeat(5000);
        let truncated = truncate_message(&message);

        assert!(truncated.len() <= TELEGRAM_MAX_MESSAGE_BYTES);
        assert!(truncated.ends_with(TRUNCATION_SUFFIX));
        assert!(truncated.starts_with("ЖЖЖ"));
    }

    #[test]
    fn test_truncate_bytes() {
        assert_eq!(truncate_bytes("Иванов", 64), "Иванов");
        // Each Cyrillic letter is two bytes.
        assert_eq!(truncate_bytes("Иванов", 5), "Ив");
        assert_eq!(truncate_bytes("Иванов", 4), "Ив");
        assert_eq!(truncate_bytes("", 0), "");
    }
}
