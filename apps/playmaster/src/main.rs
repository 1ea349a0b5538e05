use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use coordination::{ServiceDirectory, ServiceRecord, SessionCoordinator};
use playmaster::games::RuleBook;
use playmaster::services::{GamemasterUrl, HttpGamemasterClient, HttpUiNotifier};
use playmaster::{routes, AppState, GameHost, PlaymasterConfig, SessionRunner};
use service_support::middleware::RequestTelemetry;
use service_support::telemetry::init_tracing;
use tracing::{error, info};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    init_tracing();

    let config = match PlaymasterConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid playmaster configuration");
            std::process::exit(1);
        }
    };

    let coordinator =
        match coordination::connect(config.coordination_url.as_deref(), config.session_timeout)
            .await
        {
            Ok(coordinator) => coordinator,
            Err(e) => {
                error!(error = %e, "could not establish the coordination connection");
                std::process::exit(1);
            }
        };

    let gamemaster_url = GamemasterUrl::default();
    let gamemaster = match HttpGamemasterClient::new(gamemaster_url.clone(), config.gamemaster_timeout)
    {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!(error = %e, "could not build the gamemaster HTTP client");
            std::process::exit(1);
        }
    };
    let notifier = match HttpUiNotifier::new(config.ui_timeout) {
        Ok(notifier) => Arc::new(notifier),
        Err(e) => {
            error!(error = %e, "could not build the UI HTTP client");
            std::process::exit(1);
        }
    };

    let record = ServiceRecord::new(
        config.advertised_host.clone(),
        config.advertised_host.clone(),
        config.advertised_port,
        "playmaster",
    );
    let session = Arc::new(SessionCoordinator::new(
        coordinator.clone(),
        &config.instance_name,
    ));
    let host = Arc::new(GameHost::new(
        session.clone(),
        RuleBook::default(),
        gamemaster,
        notifier,
        record.url.clone(),
    ));

    SessionRunner::new(
        host.clone(),
        session,
        ServiceDirectory::new(coordinator.clone()),
        gamemaster_url,
        record,
        config.instance_name.clone(),
    )
    .spawn(coordinator);

    info!(
        host = %config.host,
        port = config.port,
        instance = %config.instance_name,
        "starting playmaster"
    );
    let data = web::Data::new(AppState::new(host));

    HttpServer::new(move || {
        App::new()
            .wrap(RequestTelemetry::new("playmaster"))
            .app_data(data.clone())
            .service(web::scope("/playmaster").configure(routes::configure))
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
