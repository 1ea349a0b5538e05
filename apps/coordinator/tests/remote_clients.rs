//! `RemoteCoordinator` clients against a running coordinator.

use std::sync::Arc;
use std::time::Duration;

use actix_web::dev::ServerHandle;
use actix_web::{web, App, HttpServer};
use coordination::{
    Coordinator, CreateMode, MemoryEnsemble, Registration, RemoteCoordinator, RemoteHost,
    ServiceDirectory, ServiceRecord, WatchKind,
};
use coordinator::routes;
use test_support::unique_name;

#[ctor::ctor]
fn init_logging() {
    test_support::logging::init();
}

fn serve(host: Arc<RemoteHost>) -> std::io::Result<(String, ServerHandle)> {
    let data = web::Data::from(host);
    let server = HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .configure(routes::configure)
    })
    .workers(1)
    .disable_signals()
    .bind(("127.0.0.1", 0))?;
    let addr = server.addrs()[0];
    let server = server.run();
    let handle = server.handle();
    actix_web::rt::spawn(server);
    Ok((format!("http://{addr}/"), handle))
}

#[actix_web::test]
async fn ephemeral_nodes_and_watches_span_clients() {
    let host = Arc::new(RemoteHost::new(MemoryEnsemble::new(), Duration::from_secs(5)));
    let (url, server) = serve(host.clone()).unwrap();

    let owner = RemoteCoordinator::connect(&url, Duration::from_secs(3)).await.unwrap();
    let observer = RemoteCoordinator::connect(&url, Duration::from_secs(3)).await.unwrap();
    assert_ne!(owner.session_id(), observer.session_id());
    assert_eq!(host.session_count(), 2);

    owner.ensure_path("/locks").await.unwrap();
    owner
        .create("/locks/session", b"taken".to_vec(), CreateMode::Ephemeral)
        .await
        .unwrap();
    let (data, stat, watch) = observer.get_watch("/locks/session").await.unwrap();
    assert_eq!(data, b"taken");
    assert_eq!(stat.ephemeral_owner, Some(owner.session_id()));

    drop(owner);
    let event = tokio::time::timeout(Duration::from_secs(5), watch.fired())
        .await
        .unwrap();
    assert_eq!(event.kind, WatchKind::Deleted);
    assert_eq!(observer.exists("/locks/session").await.unwrap(), None);

    server.stop(true).await;
}

#[actix_web::test]
async fn services_find_each_other_through_the_directory() {
    let host = Arc::new(RemoteHost::new(MemoryEnsemble::new(), Duration::from_secs(5)));
    let (url, server) = serve(host).unwrap();

    let gamemaster: Arc<dyn Coordinator> = Arc::new(
        RemoteCoordinator::connect(&url, Duration::from_secs(3))
            .await
            .unwrap(),
    );
    let worker: Arc<dyn Coordinator> = Arc::new(
        RemoteCoordinator::connect(&url, Duration::from_secs(3))
            .await
            .unwrap(),
    );

    let instance = unique_name("pm");
    let record = ServiceRecord::new(instance.clone(), "10.1.0.4", 8001, "playmaster");
    ServiceDirectory::new(worker.clone())
        .register_self("playmaster", &instance, &record, Registration::Sequential)
        .await
        .unwrap();

    let listed: Vec<String> = gamemaster
        .children("/playmaster")
        .await
        .unwrap()
        .into_iter()
        .filter(|child| child.starts_with(&format!("{instance}-")))
        .collect();
    assert_eq!(listed.len(), 1);
    let (data, _) = gamemaster.get(&format!("/playmaster/{}", listed[0])).await.unwrap();
    let found: ServiceRecord = serde_json::from_slice(&data).unwrap();
    assert_eq!(found.url, "http://10.1.0.4:8001/playmaster/");

    server.stop(true).await;
}
