//! Chatrelay 入口：加载配置与语料，启动 Hub 与观察者 WebSocket 服务器
//!
//! 运行方式：
//! ```bash
//! cargo run -- [config.toml]
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chatrelay::config::{load_config, AppConfig};
use chatrelay::core::ShutdownManager;
use chatrelay::gateway::{ServerConfig, TransportConfig, WsServer};
use chatrelay::model::{load_corpus, MockTextModel, TextModel};
use chatrelay::session::SimulatedConnector;
use chatrelay::{observability, ConversationEngine, EngineConfig, Hub, HubConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("CHATRELAY_CONFIG").ok())
        .map(PathBuf::from);
    let cfg = load_config(config_path).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });

    tracing::warn!("No generative backend configured, using Mock text model");
    let model: Arc<dyn TextModel> = Arc::new(MockTextModel::new());
    load_corpus(model.as_ref(), &cfg.model.corpus_path).await;

    tracing::warn!("No remote peer protocol configured, using simulated stranger");
    let connector = Arc::new(
        SimulatedConnector::from_config(
            cfg.session.script_path.as_deref(),
            cfg.session.pace(),
            cfg.session.max_lines,
        )
        .await,
    );

    let engine = Arc::new(ConversationEngine::new(
        model,
        connector,
        EngineConfig::from(&cfg.conversation),
    ));

    let shutdown = Arc::new(ShutdownManager::new());
    shutdown.install_signal_handlers();

    let hub = Hub::spawn(HubConfig::from(&cfg.hub), engine, shutdown.token());

    let server_config = ServerConfig::new(&cfg.server, TransportConfig::from(&cfg.transport));
    let server = WsServer::bind(server_config)
        .await
        .context("Failed to start observer server")?;

    tracing::info!("Press Ctrl+C to stop");
    server.serve(hub, shutdown.token()).await;

    if let Some(reason) = shutdown.reason() {
        tracing::info!("Stopped ({})", reason);
    }
    Ok(())
}
