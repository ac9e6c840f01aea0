//! 观察者连接：WebSocket 与 Hub 之间的中间人
//!
//! 每个连接两条独立路径：读泵处理心跳与存活（容忍有限次连续读超时），
//! 写泵投递出站队列并定期 ping。任一路径失败只影响本连接，最终注销该观察者。

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tokio_util::sync::CancellationToken;

use super::hub::{ClientHandle, HubHandle};
use crate::config::{TransportSection, MIN_PERIOD};
use crate::core::TransportError;

/// 传输参数
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub write_wait: Duration,
    pub read_wait: Duration,
    /// 必须小于 read_wait
    pub ping_period: Duration,
    pub allowed_timeouts: u32,
    pub max_message_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::from(&TransportSection::default())
    }
}

impl From<&TransportSection> for TransportConfig {
    fn from(section: &TransportSection) -> Self {
        Self {
            write_wait: section.write_wait(),
            read_wait: section.read_wait(),
            ping_period: section.ping_period(),
            allowed_timeouts: section.allowed_timeouts,
            max_message_size: section.max_message_size,
        }
    }
}

/// 处理一个 TCP 连接：握手、注册、跑读写泵，结束时注销
pub(crate) async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    hub: HubHandle,
    config: TransportConfig,
    ws_path: String,
) -> Result<(), TransportError> {
    let mut ws_config = WebSocketConfig::default();
    ws_config.max_message_size = Some(config.max_message_size);
    ws_config.max_frame_size = Some(config.max_message_size);

    let check_path = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        if req.uri().path() == ws_path {
            Ok(resp)
        } else {
            let mut err = ErrorResponse::new(Some("Not found".to_string()));
            *err.status_mut() = StatusCode::NOT_FOUND;
            Err(err)
        }
    };

    let ws_stream =
        tokio_tungstenite::accept_hdr_async_with_config(stream, check_path, Some(ws_config))
            .await
            .map_err(TransportError::Handshake)?;

    let (ws_tx, ws_rx) = ws_stream.split();
    let client_id = format!("ws_{}_{}", addr, uuid::Uuid::new_v4());
    let (client, outbound) = ClientHandle::new(client_id.clone());

    tracing::info!("New WebSocket connection from {}", addr);
    hub.register(client)?;

    let cancel = CancellationToken::new();
    let writer = tokio::spawn(write_pump(ws_tx, outbound, config.clone(), cancel.clone()));

    read_pump(ws_rx, &config, &cancel).await;

    // 注销后 Hub 丢弃发送端，写泵发出 Close 帧后退出
    let _ = hub.unregister(&client_id);
    let _ = writer.await;

    tracing::info!("WebSocket connection closed: {}", addr);
    Ok(())
}

/// 读泵：客户端文本被忽略，只关心 pong 与连接存活
pub(crate) async fn read_pump<S>(
    mut ws_rx: S,
    config: &TransportConfig,
    cancel: &CancellationToken,
) where
    S: Stream<Item = Result<WsMessage, WsError>> + Unpin,
{
    let mut timeouts = 0u32;

    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break,
            next = tokio::time::timeout(config.read_wait, ws_rx.next()) => next,
        };

        match next {
            Err(_) => {
                timeouts += 1;
                tracing::warn!(
                    "Connection read timeout ({}/{})",
                    timeouts,
                    config.allowed_timeouts
                );
                if timeouts > config.allowed_timeouts {
                    break;
                }
            }
            Ok(None) => break,
            Ok(Some(Err(e))) => {
                tracing::warn!("WebSocket receive error: {}", e);
                break;
            }
            Ok(Some(Ok(msg))) => {
                timeouts = 0;
                match msg {
                    WsMessage::Close(_) => break,
                    WsMessage::Pong(_) => tracing::trace!("Pong received"),
                    _ => {}
                }
            }
        }
    }
}

/// 写泵：出站队列关闭时发 Close 帧退出；写失败或超时时取消令牌，让读泵结束
pub(crate) async fn write_pump<S>(
    mut ws_tx: S,
    mut outbound: mpsc::UnboundedReceiver<String>,
    config: TransportConfig,
    cancel: CancellationToken,
) where
    S: Sink<WsMessage, Error = WsError> + Unpin,
{
    let mut ticker = tokio::time::interval(config.ping_period.max(MIN_PERIOD));
    ticker.tick().await;

    loop {
        let frame = tokio::select! {
            msg = outbound.recv() => match msg {
                Some(text) => WsMessage::Text(text),
                None => {
                    tracing::debug!("Outbound queue closed");
                    let _ = write(&mut ws_tx, WsMessage::Close(None), config.write_wait).await;
                    break;
                }
            },
            _ = ticker.tick() => WsMessage::Ping(Vec::new()),
            _ = cancel.cancelled() => break,
        };

        if let Err(e) = write(&mut ws_tx, frame, config.write_wait).await {
            tracing::warn!("Write pump error: {}", e);
            break;
        }
    }

    cancel.cancel();
}

async fn write<S>(ws_tx: &mut S, frame: WsMessage, wait: Duration) -> Result<(), TransportError>
where
    S: Sink<WsMessage, Error = WsError> + Unpin,
{
    match tokio::time::timeout(wait, ws_tx.send(frame)).await {
        Ok(result) => result.map_err(TransportError::from),
        Err(_) => Err(TransportError::WriteTimeout),
    }
}
