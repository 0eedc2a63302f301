//! HTTP server setup module for health and metrics endpoints.

use actix_web::{App, HttpResponse, HttpServer, Responder, dev::Server, web};
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::info;

use super::shutdown::ShutdownSignal;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

async fn health() -> impl Responder {
    HttpResponse::Ok().content_type("text/plain").body("OK")
}

async fn render_metrics(handle: web::Data<PrometheusHandle>) -> impl Responder {
    HttpResponse::Ok()
        .content_type(PROMETHEUS_CONTENT_TYPE)
        .body(handle.render())
}

/// Register `GET <path>` answering `OK`.
pub fn health_routes(cfg: &mut web::ServiceConfig, path: &str) {
    cfg.route(path, web::get().to(health));
}

/// Register `GET <path>` rendering the Prometheus text format.
pub fn metrics_routes(cfg: &mut web::ServiceConfig, path: &str, handle: PrometheusHandle) {
    cfg.app_data(web::Data::new(handle))
        .route(path, web::get().to(render_metrics));
}

/// Creates and binds the health check server.
pub fn health_server(address: &str, port: u16, path: &str) -> Result<Server, std::io::Error> {
    let path = path.to_string();
    let server = HttpServer::new(move || {
        let path = path.clone();
        App::new().configure(move |cfg| health_routes(cfg, &path))
    })
    .workers(1)
    .disable_signals()
    .bind((address, port))?
    .run();

    info!(address = %address, port = port, "health endpoint listening");
    Ok(server)
}

/// Creates and binds the Prometheus metrics server.
pub fn metrics_server(
    address: &str,
    port: u16,
    path: &str,
    handle: PrometheusHandle,
) -> Result<Server, std::io::Error> {
    let path = path.to_string();
    let server = HttpServer::new(move || {
        let path = path.clone();
        let handle = handle.clone();
        App::new().configure(move |cfg| metrics_routes(cfg, &path, handle))
    })
    .workers(1)
    .disable_signals()
    .bind((address, port))?
    .run();

    info!(address = %address, port = port, "metrics endpoint listening");
    Ok(server)
}

/// Drive `server` until it exits or `shutdown` fires, then stop it gracefully.
pub async fn serve_until_shutdown(server: Server, shutdown: ShutdownSignal) -> anyhow::Result<()> {
    let handle = server.handle();
    tokio::select! {
        result = server => result.map_err(anyhow::Error::from),
        _ = shutdown.wait() => {
            handle.stop(true).await;
            Ok(())
        }
    }
}
