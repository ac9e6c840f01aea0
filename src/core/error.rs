//! 错误类型
//!
//! 模型、会话、传输与 Hub 各有一个错误枚举；均不致命，由调用方记录日志后继续。

use thiserror::Error;

/// 文本模型错误：生成失败时跳过这次回复
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("not enough tokens to respond: wanted at least {wanted}, have {available}")]
    InsufficientTokens { wanted: usize, available: usize },

    #[error("invalid token bounds: min {min} > max {max}")]
    InvalidBounds { min: usize, max: usize },
}

/// 陌生人会话错误：connect 失败即结束本次对话
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("negotiation failed: {0}")]
    Negotiation(String),

    #[error("session is not connected")]
    NotConnected,
}

/// 观察者传输层错误：仅影响单个连接
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid bind address: {0}")]
    InvalidAddress(String),

    #[error("websocket handshake failed: {0}")]
    Handshake(#[source] tokio_tungstenite::tungstenite::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("write timed out")]
    WriteTimeout,

    #[error(transparent)]
    Hub(#[from] HubClosed),
}

/// Hub 控制循环已退出
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("hub control loop is gone")]
pub struct HubClosed;
