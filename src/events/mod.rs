pub mod parser;
pub mod store;

pub use parser::{parse, render_message, ParseFailure, ParsedMessage};

/// Pass direction reported by the controller's `режим:` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Entry,
    Exit,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Entry => "Вход",
            Direction::Exit => "Выход",
        }
    }

    pub fn parse(s: &str) -> Option<Direction> {
        match s.trim().to_lowercase().as_str() {
            "вход" => Some(Direction::Entry),
            "выход" => Some(Direction::Exit),
            _ => None,
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Direction::Entry => "⚙️",
            Direction::Exit => "🏡",
        }
    }
}
