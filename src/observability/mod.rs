pub mod alerts;
pub mod logging;
pub mod metrics;
pub mod telegram_errors;
