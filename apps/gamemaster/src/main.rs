use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use coordination::{spawn_supervised, ConnectionGate, ServiceDirectory, ServiceRecord};
use gamemaster::domain::SequentialIds;
use gamemaster::services::{Dispatcher, GameManager, HttpWorkerClient, LogHistory};
use gamemaster::{routes, AppState, GamemasterConfig};
use protocol::{GAMEMASTER_CATEGORY, GAMEMASTER_INSTANCE, PLAYMASTER_CATEGORY};
use service_support::middleware::RequestTelemetry;
use service_support::telemetry::init_tracing;
use tracing::{error, info};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    init_tracing();

    let config = match GamemasterConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid gamemaster configuration");
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

    let worker_client = match HttpWorkerClient::new(config.handoff_timeout) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!(error = %e, "could not build the worker HTTP client");
            std::process::exit(1);
        }
    };

    let gate = ConnectionGate::track(coordinator.as_ref());
    let manager = GameManager::new(
        Box::new(SequentialIds::seeded_from_clock()),
        Arc::new(LogHistory),
    )
    .with_hosted_game_types(config.hosted_game_types.iter().copied());
    let app_state = AppState::new(manager, gate.clone());

    let directory = ServiceDirectory::new(coordinator.clone());
    let record = ServiceRecord::new(
        config.advertised_host.clone(),
        config.advertised_host.clone(),
        config.advertised_port,
        "gamemaster",
    );

    {
        let directory = directory.clone();
        spawn_supervised(coordinator.clone(), "gamemaster-registration", move || {
            let directory = directory.clone();
            let record = record.clone();
            async move {
                directory
                    .maintain_singleton(GAMEMASTER_CATEGORY, GAMEMASTER_INSTANCE, &record)
                    .await
            }
        });
    }

    {
        let manager = app_state.manager();
        let wake = app_state.wake();
        spawn_supervised(coordinator.clone(), "playmaster-discovery", move || {
            let directory = directory.clone();
            let manager = manager.clone();
            let wake = wake.clone();
            async move {
                directory
                    .discover(PLAYMASTER_CATEGORY, move |urls| {
                        manager.lock().set_workers(urls);
                        wake.notify_one();
                    })
                    .await
            }
        });
    }

    Dispatcher::new(
        app_state.manager(),
        worker_client,
        gate,
        app_state.wake(),
        config.handoff_retry,
    )
    .spawn();

    info!(host = %config.host, port = config.port, "starting gamemaster");
    let data = web::Data::new(app_state);

    HttpServer::new(move || {
        App::new()
            .wrap(RequestTelemetry::new("gamemaster"))
            .app_data(data.clone())
            .service(web::scope("/gamemaster").configure(routes::configure))
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
