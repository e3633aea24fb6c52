use job_master_core::plan::InMemoryPlanDefinitionRegistry;
use job_master_server::config::ServerConfig;
use job_master_server::Services;
use job_master_common::ConfigLoader;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tonic::transport::Server;
use tracing::info;

fn main() -> Result<(), std::io::Error> {
    let config: ServerConfig = ConfigLoader::new(Path::new("./config/job-master.toml"))
        .load()
        .expect("failed to load server configuration");

    config
        .tracing
        .init()
        .unwrap_or_else(|err| eprintln!("tracing already initialized: {err}"));

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(config))
}

/// Entry point body, split out of `main` so the tokio runtime only spans
/// what actually needs it.
async fn async_main(config: ServerConfig) -> Result<(), std::io::Error> {
    // Plan definitions are registered by embedding a binary that links this
    // crate and supplies its own registry; the stock binary ships with none.
    let definitions = Arc::new(InMemoryPlanDefinitionRegistry::new());
    let (services, _lost_worker_sweep) = Services::new(&config, definitions);

    services
        .job_master
        .fail_unfinished_on_startup("server restarted")
        .await;

    let addr: SocketAddr = format!("{}:{}", config.bind_host, config.grpc_port)
        .parse()
        .expect("bind_host/grpc_port must form a valid socket address");
    info!(%addr, "starting job master server");

    // No generated RPC service is wired in yet (wire serialization and
    // transport are out of scope); the health service alone lets an
    // orchestrator confirm the process is up.
    let (_health_reporter, health_service) = tonic_health::server::health_reporter();

    Server::builder()
        .add_service(health_service)
        .serve(addr)
        .await
        .map_err(std::io::Error::other)?;

    Ok(())
}
