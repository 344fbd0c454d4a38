use actix_web::dev::Server;
use actix_web::{get, post, web, App, HttpResponse, HttpServer, Responder};
use serde_json::json;

use crate::context::AppContext;
use crate::services::ingest::ingest_message;

/// Decoded plain-text body of one controller message.
#[post("/orion/events")]
pub async fn handle_orion_event(ctx: web::Data<AppContext>, body: web::Bytes) -> impl Responder {
    let message = String::from_utf8_lossy(&body);
    tracing::debug!(bytes = body.len(), "Controller message received");

    match ingest_message(&ctx, &message).await {
        Ok(outcome) => HttpResponse::Ok().json(json!({
            "status": outcome.status,
            "stored": outcome.stored,
            "delivered": outcome.delivered,
        })),
        Err(e) => HttpResponse::InternalServerError().json(json!({
            "status": "error",
            "error": e.to_string(),
        })),
    }
}

#[get("/health")]
pub async fn health() -> impl Responder {
    "ok"
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(health).service(handle_orion_event);
}

/// Binds the ingestion endpoint. The returned server runs once awaited and is
/// stopped through its handle.
pub fn run_ingest_server(ctx: AppContext) -> std::io::Result<Server> {
    let host = ctx.config.ingest_host.clone();
    let port = ctx.config.ingest_port;
    let data = web::Data::new(ctx);

    tracing::info!("Starting ingestion endpoint on {}:{}", host, port);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .configure(configure)
    })
    .disable_signals()
    .bind((host.as_str(), port))?
    .run();

    Ok(server)
}
