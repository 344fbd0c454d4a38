use serde_json::Value;
use std::collections::HashMap;
use std::sync::OnceLock;

pub const DEFAULT_LANGUAGE: &str = "ru";

static TRANSLATIONS: OnceLock<HashMap<String, Value>> = OnceLock::new();

fn load_translations() -> HashMap<String, Value> {
    let mut translations = HashMap::new();

    let ru_json = include_str!("ru.json");
    if let Ok(ru_value) = serde_json::from_str(ru_json) {
        translations.insert("ru".to_string(), ru_value);
    } else {
        tracing::error!("Failed to parse ru.json");
    }

    let en_json = include_str!("en.json");
    if let Ok(en_value) = serde_json::from_str(en_json) {
        translations.insert("en".to_string(), en_value);
    } else {
        tracing::error!("Failed to parse en.json");
    }

    translations
}

fn get_nested_value<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    let mut current = value;

    for part in key.split('.') {
        match current {
            Value::Object(map) => {
                current = map.get(part)?;
            }
            _ => return None,
        }
    }

    Some(current)
}

/// Maps a Telegram `language_code` to one of the bundled languages.
pub fn language_for(code: Option<&str>) -> &'static str {
    match code {
        Some(code) if code.to_lowercase().starts_with("en") => "en",
        _ => DEFAULT_LANGUAGE,
    }
}

pub fn t(language: &str, path: &str) -> String {
    let translations = TRANSLATIONS.get_or_init(load_translations);

    let lookup = |lang: &str| {
        translations
            .get(lang)
            .and_then(|value| get_nested_value(value, path))
            .and_then(|value| value.as_str())
    };

    match lookup(language).or_else(|| lookup(DEFAULT_LANGUAGE)) {
        Some(translation) => translation.to_string(),
        None => format!("Message not found: {}", path),
    }
}

/// Fills `{}` placeholders in order. Inserted arguments are never scanned for
/// placeholders themselves.
pub fn t_with_args(language: &str, path: &str, args: &[&str]) -> String {
    let template = t(language, path);
    let mut message = String::with_capacity(template.len());
    let mut rest = template.as_str();

    for arg in args {
        let Some(pos) = rest.find("{}") else {
            break;
        };
        message.push_str(&rest[..pos]);
        message.push_str(arg);
        rest = &rest[pos + 2..];
    }
    message.push_str(rest);

    message
}
