use anyhow::Context;
use dotenv::dotenv;
use orion_relay::config::AppConfig;
use orion_relay::db::{create_pool, run_migrations, IN_MEMORY};
use orion_relay::shutdown::wait_for_confirmed_interrupt;
use std::path::Path;
use std::sync::Arc;
use teloxide::Bot;

mod bots;
mod context;
mod observability;
mod services;
mod utils;
mod webhooks;

use crate::bots::urv_bot::build_dispatcher;
use crate::bots::urv_bot::utils::set_command_menus;
use crate::context::AppContext;
use crate::observability::logging::{init_subscriber, LogFormat};
use crate::services::retention_scheduler::{RetentionScheduler, DEFAULT_STOP_GRACE};
use crate::utils::telegram_admin::send_message_to_admin;
use crate::webhooks::orion::http_server::run_ingest_server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let format = LogFormat::parse(std::env::var("LOG_FORMAT").ok().as_deref());
    init_subscriber(format).context("failed to install tracing subscriber")?;

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            return Err(e.into());
        }
    };

    if config.database_url != IN_MEMORY {
        if let Some(dir) = Path::new(&config.database_url).parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir).with_context(|| {
                    format!("failed to create database directory {}", dir.display())
                })?;
            }
        }
    }

    let pool = create_pool(&config.database_url).context("failed to open database")?;
    run_migrations(&pool).map_err(|e| anyhow::anyhow!("failed to run migrations: {}", e))?;
    tracing::info!(database = %config.database_url, "Database ready");

    let bot = Bot::new(config.telegram_token.clone());
    let ctx = AppContext::new(Arc::new(pool), config, bot);

    set_command_menus(&ctx.bot, &ctx.config.admin_ids).await;

    let scheduler = RetentionScheduler::start(ctx.clone());

    let server = run_ingest_server(ctx.clone()).context("failed to start ingest server")?;
    let server_handle = server.handle();

    let mut dispatcher = build_dispatcher(ctx.clone());
    let dispatcher_token = dispatcher.shutdown_token();

    if let Err(e) = send_message_to_admin(&ctx, "Orion relay started".to_string(), 10).await {
        tracing::warn!("Failed to send startup notice: {}", e);
    }

    let exit_window = ctx.config.exit_confirm_window;
    let shutdown = async move {
        wait_for_confirmed_interrupt(exit_window).await;
        tracing::info!("Shutting down");

        server_handle.stop(true).await;

        match dispatcher_token.shutdown() {
            Ok(stopped) => stopped.await,
            Err(e) => tracing::warn!("Dispatcher was not running: {:?}", e),
        }

        if let Some(scheduler) = scheduler {
            scheduler.stop(DEFAULT_STOP_GRACE).await;
        }
    };

    let (server_result, (), ()) = tokio::join!(server, dispatcher.dispatch(), shutdown);
    server_result.context("ingest server failed")?;

    tracing::info!("Orion relay stopped");
    Ok(())
}
