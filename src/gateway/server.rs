//! WebSocket 监听：接受观察者连接并交给连接处理

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use super::connection::{handle_connection, TransportConfig};
use super::hub::HubHandle;
use crate::config::ServerSection;
use crate::core::TransportError;

/// 服务器配置
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// 只在该路径上升级为 WebSocket
    pub ws_path: String,
    pub transport: TransportConfig,
}

impl ServerConfig {
    pub fn new(server: &ServerSection, transport: TransportConfig) -> Self {
        Self {
            bind_addr: server.bind_addr.clone(),
            ws_path: server.ws_path.clone(),
            transport,
        }
    }
}

/// 已绑定的 WebSocket 服务器
pub struct WsServer {
    listener: TcpListener,
    config: ServerConfig,
}

impl WsServer {
    pub async fn bind(config: ServerConfig) -> Result<Self, TransportError> {
        let addr: SocketAddr = config
            .bind_addr
            .parse()
            .map_err(|e| TransportError::InvalidAddress(format!("{}: {}", config.bind_addr, e)))?;

        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| TransportError::Bind {
                addr: config.bind_addr.clone(),
                source,
            })?;

        Ok(Self { listener, config })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// 接受连接直到关闭令牌取消
    pub async fn serve(self, hub: HubHandle, shutdown: CancellationToken) {
        if let Ok(addr) = self.local_addr() {
            tracing::info!("Observers listening on ws://{}{}", addr, self.config.ws_path);
        }

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let hub = hub.clone();
                            let transport = self.config.transport.clone();
                            let ws_path = self.config.ws_path.clone();

                            tokio::spawn(async move {
                                let result =
                                    handle_connection(stream, addr, hub, transport, ws_path).await;
                                if let Err(e) = result {
                                    tracing::warn!("Connection error from {}: {}", addr, e);
                                }
                            });
                        }
                        Err(e) => {
                            tracing::error!("Accept error: {}", e);
                        }
                    }
                }
            }
        }

        tracing::info!("Observer listener stopped");
    }
}
