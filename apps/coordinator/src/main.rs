use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use clap::Parser;
use coordination::{MemoryEnsemble, RemoteHost};
use coordinator::{routes, Args};
use service_support::middleware::RequestTelemetry;
use service_support::telemetry::init_tracing;
use tracing::info;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    init_tracing();
    let args = Args::parse();

    let host = Arc::new(RemoteHost::new(MemoryEnsemble::new(), args.session_timeout()));
    host.spawn_reaper(args.reap_interval());

    info!(
        host = %args.host,
        port = args.port,
        session_timeout_ms = args.session_timeout_ms,
        "starting coordinator"
    );
    let data = web::Data::from(host);

    HttpServer::new(move || {
        App::new()
            .wrap(RequestTelemetry::new("coordinator"))
            .app_data(data.clone())
            .configure(routes::configure)
    })
    .bind((args.host.as_str(), args.port))?
    .run()
    .await
}
