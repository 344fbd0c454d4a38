pub mod telegram_admin;
pub mod text;
