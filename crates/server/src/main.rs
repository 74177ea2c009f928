//! RoServer - map server binary
//!
//! Wires the validated layout registry, the opcode table, the handlers,
//! and the network layer together, and refuses to start when the
//! configured client version is not fully covered.

mod handlers;

use roserver_config::ServerConfig;
use roserver_core::PacketVer;
use roserver_network::{frame_channel, Broadcaster, EventLoop, MapServer, NetworkConfig, SessionRegistry};
use roserver_protocol::{standard_registry, Dispatcher, HandlerRegistry, OpcodeTable};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "conf/map_server.conf".into());

    // Config is loaded before the subscriber exists so its log level can
    // seed the filter; load problems are reported once logging is up.
    let (config, config_error) = match ServerConfig::load(&config_path) {
        Ok(config) => (config, None),
        Err(e) => (ServerConfig::default(), Some(e)),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();

    info!("roserver starting up");
    if let Some(e) = config_error {
        warn!(path = %config_path, error = %e, "config not loaded, using defaults");
    }
    config.display();

    let packet_ver = PacketVer::new(config.packet_ver);

    // Build the static protocol tables and gate startup on them: a
    // client version not covered by every packet's cascade must never
    // reach the accept loop.
    let layouts = Arc::new(standard_registry());
    if let Err(e) = layouts.validate(packet_ver) {
        error!(ver = %packet_ver, error = %e, "layout registry rejected the configured client version");
        anyhow::bail!("startup validation failed: {}", e);
    }
    let table = Arc::new(OpcodeTable::build(&layouts, packet_ver)?);
    info!(
        kinds = layouts.len(),
        inbound_opcodes = table.len(),
        ver = %packet_ver,
        "protocol tables ready"
    );

    let sessions = Arc::new(SessionRegistry::new());
    let broadcaster = Arc::new(Broadcaster::new(layouts.clone(), sessions.clone()));

    let mut handler_registry = HandlerRegistry::new();
    handlers::register_all(&mut handler_registry, broadcaster, Instant::now());

    let (frame_tx, frame_rx) = frame_channel();
    let event_loop = EventLoop::new(frame_rx, Dispatcher::new(table.clone(), handler_registry));
    let event_loop_handle = tokio::spawn(event_loop.run());

    let network_config = NetworkConfig {
        bind_address: config.bind_address()?,
        max_sessions: config.max_connections,
        packet_ver,
        session_timeout: Duration::from_secs(config.session_timeout_secs),
        ..Default::default()
    };
    let server = MapServer::bind(network_config, sessions, table, frame_tx).await?;

    info!("map server ready");
    server.run().await?;

    // Dropping the server drops the frame sender; the event loop drains
    // and exits.
    drop(server);
    event_loop_handle.await?;
    info!("roserver stopped");
    Ok(())
}
