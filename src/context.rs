use orion_relay::config::AppConfig;
use orion_relay::db::DbPool;
use std::sync::Arc;
use teloxide::Bot;

use crate::observability::alerts::AlertManager;
use crate::observability::metrics::Metrics;

/// Everything a handler or background task needs, built once in `main` and
/// cloned into each consumer.
#[derive(Clone)]
pub struct AppContext {
    pub pool: DbPool,
    pub config: Arc<AppConfig>,
    pub bot: Bot,
    pub metrics: Arc<Metrics>,
    pub alerts: Arc<AlertManager>,
}

impl AppContext {
    pub fn new(pool: DbPool, config: AppConfig, bot: Bot) -> Self {
        let alerts = AlertManager::from_config(&config);
        Self {
            pool,
            config: Arc::new(config),
            bot,
            metrics: Arc::new(Metrics::new()),
            alerts: Arc::new(alerts),
        }
    }
}
