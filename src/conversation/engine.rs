//! 对话引擎
//!
//! 每次对话打开一个新的 ChatSession：connect 与转发任务同时启动，connect 返回后
//! join 转发任务取回学习缓冲，再按原始顺序逐条训练模型。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use super::relay::{Relay, RelayOutcome};
use crate::config::ConversationSection;
use crate::core::Event;
use crate::model::TextModel;
use crate::session::{ChatSession, SessionConnector};

/// 引擎参数
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// 两条陌生人消息间隔不超过该值时不回复
    pub min_response_delta: Duration,
    pub reply_min_tokens: usize,
    pub reply_max_tokens: usize,
    /// 会话内部事件缓冲容量
    pub event_buffer: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from(&ConversationSection::default())
    }
}

impl From<&ConversationSection> for EngineConfig {
    fn from(section: &ConversationSection) -> Self {
        Self {
            min_response_delta: section.min_response_delta(),
            reply_min_tokens: section.reply_min_tokens,
            reply_max_tokens: section.reply_max_tokens,
            event_buffer: section.event_buffer.max(1),
        }
    }
}

/// 对话如何结束
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationOutcome {
    /// 会话正常结束（任一方断开）
    Ended,
    /// 连接或协商失败，对话立即结束
    ConnectFailed(String),
}

/// 一次对话的总结
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationReport {
    pub outcome: ConversationOutcome,
    /// 训练所用的陌生人消息数
    pub learned: usize,
    /// 是否因超过 max_recv 请求过断开
    pub disconnect_requested: bool,
}

/// 对话引擎：持有模型与会话工厂，为每次对话创建 Conversation
pub struct ConversationEngine {
    model: Arc<dyn TextModel>,
    connector: Arc<dyn SessionConnector>,
    config: EngineConfig,
}

impl ConversationEngine {
    pub fn new(
        model: Arc<dyn TextModel>,
        connector: Arc<dyn SessionConnector>,
        config: EngineConfig,
    ) -> Self {
        Self {
            model,
            connector,
            config,
        }
    }

    /// 打开新会话，得到一次尚未开始的对话
    pub fn start(&self) -> Conversation {
        Conversation::new(
            self.connector.open(),
            Arc::clone(&self.model),
            self.config.clone(),
        )
    }
}

/// 与单个 ChatSession 一一对应的对话
pub struct Conversation {
    session: Arc<dyn ChatSession>,
    model: Arc<dyn TextModel>,
    config: EngineConfig,
}

impl Conversation {
    pub fn new(
        session: Arc<dyn ChatSession>,
        model: Arc<dyn TextModel>,
        config: EngineConfig,
    ) -> Self {
        Self {
            session,
            model,
            config,
        }
    }

    /// 跑完整个会话：相关事件写入 output，收到超过 max_recv 条消息后请求断开。
    /// 会话结束且训练完成后才返回。
    pub async fn converse(
        &self,
        output: mpsc::Sender<Event>,
        max_recv: usize,
    ) -> ConversationReport {
        let (events_tx, events_rx) = mpsc::channel(self.config.event_buffer);

        let relay = Relay::new(
            Arc::clone(&self.session),
            Arc::clone(&self.model),
            self.config.clone(),
            output,
            max_recv,
        );
        let relay_task = tokio::spawn(relay.run(events_rx));

        let outcome = match self.session.connect(events_tx).await {
            Ok(()) => ConversationOutcome::Ended,
            Err(e) => {
                tracing::warn!("Session connect error: {}", e);
                ConversationOutcome::ConnectFailed(e.to_string())
            }
        };

        let relayed = match relay_task.await {
            Ok(r) => r,
            Err(e) => {
                tracing::error!("Relay task failed: {}", e);
                RelayOutcome::default()
            }
        };

        for msg in &relayed.learn_buffer {
            self.model.update(msg).await;
        }
        tracing::info!("Learned from {} messages", relayed.learn_buffer.len());

        ConversationReport {
            outcome,
            learned: relayed.learn_buffer.len(),
            disconnect_requested: relayed.disconnect_requested,
        }
    }

    /// 无种子随机说一句（看门狗催促用，不进入学习路径）
    pub async fn say(&self, min_len: usize, max_len: usize) {
        match self.model.respond("", min_len, max_len).await {
            Ok(text) => {
                if let Err(e) = self.session.say(&text).await {
                    tracing::warn!("Failed to send prompt: {}", e);
                }
            }
            Err(e) => tracing::warn!("Prompt generation failed: {}", e),
        }
    }

    /// 建议性停止：断开事件稍后会出现在正常的事件流里
    pub async fn request_stop(&self) {
        self.session.disconnect().await;
    }
}
