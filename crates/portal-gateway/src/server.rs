use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use portal_buffer::{BufferSettings, FlushBuffer};
use portal_core::{DeleteRequest, Repository};
use portal_generator::RandomGenerator;
use portal_proto_schema::redirector::v1::redirector_service_server::RedirectorServiceServer;
use portal_proto_schema::shortener::v1::shortener_service_server::ShortenerServiceServer;
use portal_redirector::RedirectorService;
use portal_shortener::{DeleteSink, ShortenerService, ShortenerSettings};
use portal_storage::{FileRepository, InMemoryRepository, MySqlRepository};
use tokio::net::TcpListener;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tonic::transport::Server;
use tracing::{error, info};

use crate::app::App;
use crate::cli::{Cli, StorageBackendArg};
use crate::grpc::{RedirectorGrpcServer, ShortenerGrpcServer};
use crate::state::AppState;

/// Builds the configured backend and serves until Ctrl-C.
///
/// Shutdown order: both servers stop accepting, then the delete buffer does
/// its final flush, then the file backend writes its final snapshot.
pub async fn run(config: Cli) -> anyhow::Result<()> {
    info!(
        http_listen_addr = %config.http_listen_addr,
        grpc_listen_addr = %config.grpc_listen_addr,
        base_url = %config.base_url,
        storage_backend = %config.storage,
        "starting portal"
    );

    match config.storage {
        StorageBackendArg::InMemory => serve(&config, InMemoryRepository::new()).await,
        StorageBackendArg::File => {
            let path = config
                .file_path
                .clone()
                .context("file path is required when storage backend is file")?;
            let repository = FileRepository::open(path).await?;

            let (stop, stopped) = oneshot::channel::<()>();
            let persister = {
                let repository = repository.clone();
                let period = config.persist_interval();
                tokio::spawn(async move {
                    repository
                        .run_persistence(period, async move {
                            let _ = stopped.await;
                        })
                        .await
                })
            };

            let served = serve(&config, repository).await;
            let _ = stop.send(());
            persister.await.context("file persister panicked")?;
            served
        }
        StorageBackendArg::Mysql => {
            let dsn = config
                .mysql_dsn
                .as_deref()
                .context("mysql dsn is required when storage backend is mysql")?;
            let repository = MySqlRepository::connect(dsn).await?;
            repository.ensure_schema().await?;
            serve(&config, repository).await
        }
    }
}

async fn serve<R>(config: &Cli, repository: R) -> anyhow::Result<()>
where
    R: Repository + Clone,
{
    let (buffer, deletes) = FlushBuffer::<DeleteRequest, _>::new(
        BufferSettings::builder()
            .flush_interval(config.flush_interval())
            .flush_threshold(config.flush_threshold)
            .capacity_hint(config.flush_threshold)
            .build(),
        DeleteSink::new(repository.clone()),
    );
    let (stop_buffer, buffer_stopped) = oneshot::channel::<()>();
    let buffer = buffer.spawn(async move {
        let _ = buffer_stopped.await;
    });

    let generator = RandomGenerator::with_length(config.code_length)?;
    let settings = ShortenerSettings::builder()
        .base_url(config.base_url.clone())
        .allowed_schemes(config.schemes())
        .build();
    let shortener = Arc::new(ShortenerService::new(
        repository.clone(),
        generator,
        settings,
        deletes,
    ));
    let redirector = Arc::new(RedirectorService::new(repository.clone()));
    let state = AppState::new(shortener.clone(), redirector.clone(), Arc::new(repository));

    let (shutdown, _) = watch::channel(false);
    let http = spawn_http(config.http_listen_addr, state, signal(&shutdown)).await?;
    let grpc = spawn_grpc(
        config.grpc_listen_addr,
        ShortenerGrpcServer::new(shortener),
        RedirectorGrpcServer::new(redirector),
        signal(&shutdown),
    )
    .await;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("shutdown requested");
    let _ = shutdown.send(true);

    let (http, grpc) = tokio::join!(http, grpc);
    log_exit("http", http);
    log_exit("grpc", grpc);

    let _ = stop_buffer.send(());
    buffer.await.context("delete buffer panicked")?;
    info!("portal stopped");
    Ok(())
}

fn signal(shutdown: &watch::Sender<bool>) -> impl Future<Output = ()> + Send + 'static {
    let mut receiver = shutdown.subscribe();
    async move {
        let _ = receiver.wait_for(|stop| *stop).await;
    }
}

fn log_exit<E: std::fmt::Display>(
    name: &str,
    joined: Result<Result<(), E>, tokio::task::JoinError>,
) {
    match joined {
        Ok(Ok(())) => info!(server = name, "server stopped"),
        Ok(Err(e)) => error!(server = name, error = %e, "server failed"),
        Err(e) => error!(server = name, error = %e, "server task panicked"),
    }
}

async fn spawn_http(
    addr: SocketAddr,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<JoinHandle<std::io::Result<()>>> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind http listener on {addr}"))?;
    info!(listen_addr = %listener.local_addr()?, "serving http");

    let app = App::router(state);
    Ok(tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
    }))
}

async fn spawn_grpc(
    addr: SocketAddr,
    shortener: ShortenerGrpcServer,
    redirector: RedirectorGrpcServer,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> JoinHandle<Result<(), tonic::transport::Error>> {
    let (health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_serving::<ShortenerServiceServer<ShortenerGrpcServer>>()
        .await;
    health_reporter
        .set_serving::<RedirectorServiceServer<RedirectorGrpcServer>>()
        .await;
    info!(listen_addr = %addr, "serving grpc");

    tokio::spawn(async move {
        Server::builder()
            .add_service(health_service)
            .add_service(ShortenerServiceServer::new(shortener))
            .add_service(RedirectorServiceServer::new(redirector))
            .serve_with_shutdown(addr, shutdown)
            .await
    })
}
