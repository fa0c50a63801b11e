use hotreload_host::error::HostError;
use hotreload_host::logger::initialize as LoggerInitialize;
use hotreload_host::mirror::{self, WorkspaceMirror};
use hotreload_host::paths::{detect_config_dir, detect_host_address, load_dotenv};

use hotreload_core::config::HotReloadConfig;
use hotreload_core::hotreload::HotReloadServer;
use hotreload_core::listener::EventChannelListener;
use hotreload_core::transport::TcpTransport;

use common::ErrorLocation;

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use log::{error, info, warn};
use tokio::fs::create_dir_all;

const DEFAULT_MIRROR_DIR: &str = "hotreload-mirror";

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{e}");
        eprintln!("{e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), HostError> {
    // .env must be loaded before the config directory is resolved
    let dotenv = load_dotenv();
    let config_dir = detect_config_dir();

    create_dir_all(&config_dir.path).await.map_err(|e| HostError::Host {
        message: format!(
            "Failed to create config directory {}: {e}",
            config_dir.path.display()
        ),
        location: ErrorLocation::caller(),
    })?;

    LoggerInitialize(&config_dir.path)?;

    info!("Hot reload host starting");
    if let Some(path) = dotenv {
        info!("Environment loaded from {}", path.display());
    }
    info!(
        "Config directory: {} ({:?})",
        config_dir.path.display(),
        config_dir.source
    );

    let config = HotReloadConfig::load(&config_dir.path)?;
    let address = detect_host_address(&config);
    let mirror_root = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_MIRROR_DIR));

    info!(
        "Dialing development host at {} ({:?})",
        address.address, address.source
    );
    let transport = TcpTransport::connect(&address.address).await?;
    let peer = transport.peer_addr();

    let (listener, events) = EventChannelListener::new();
    let server = HotReloadServer::new(
        tokio::runtime::Handle::current(),
        Arc::new(listener),
        &config,
    );
    server.set_transport(Some(Arc::new(transport)));

    let mut mirror_task = tokio::spawn(mirror::run(WorkspaceMirror::new(mirror_root), events));

    if !server.start() {
        return Err(HostError::Host {
            message: format!("Connection did not start, state is {:?}", server.state()),
            location: ErrorLocation::caller(),
        });
    }
    server.start_net_client(&peer.ip().to_string(), peer.port());
    server.log(format!("hotreload-host {} attached", env!("CARGO_PKG_VERSION")));

    let summary = tokio::select! {
        finished = &mut mirror_task => finished,
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, shutting down");
            if let Some(exit) = server.shutdown().await {
                info!("Worker finished: {exit}");
            }
            mirror_task.await
        }
    };

    match summary {
        Ok(summary) => info!(
            "Session over: {} changes applied, {} failed, reason: {}",
            summary.applied,
            summary.failed,
            summary.disconnect_reason.as_deref().unwrap_or("none")
        ),
        Err(e) => warn!("Mirror task ended abnormally: {e}"),
    }

    Ok(())
}
