//! 陌生人会话抽象
//!
//! 远端聊天协议不在本 crate 实现；ChatSession 只约定事件流、发言与建议性断开。

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::core::{Event, SessionError};

/// 一次陌生人会话
#[async_trait]
pub trait ChatSession: Send + Sync {
    /// 连接远端并把事件实时写入 events；会话结束（任一方断开）后才返回。
    /// 返回时 events 随之被丢弃，接收端据此得知事件流已耗尽。
    async fn connect(&self, events: mpsc::Sender<Event>) -> Result<(), SessionError>;

    /// 向陌生人发送一条消息
    async fn say(&self, text: &str) -> Result<(), SessionError>;

    /// 建议性断开：真正结束以之后的断开事件为准
    async fn disconnect(&self);
}

/// 会话工厂：每次对话打开一个全新的 ChatSession
pub trait SessionConnector: Send + Sync {
    fn open(&self) -> Arc<dyn ChatSession>;
}
