//! 转发任务：按到达顺序逐条消费会话事件
//!
//! 学习缓冲只由本任务写入；任务结束时通过 JoinHandle 把缓冲交还给对话，
//! 训练在 join 之后进行。

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::Instant;

use super::engine::EngineConfig;
use crate::core::{Event, EventKind};
use crate::model::TextModel;
use crate::session::ChatSession;

/// 转发任务结束时交还的数据
#[derive(Debug, Default)]
pub(crate) struct RelayOutcome {
    pub learn_buffer: Vec<String>,
    pub disconnect_requested: bool,
}

pub(crate) struct Relay {
    session: Arc<dyn ChatSession>,
    model: Arc<dyn TextModel>,
    config: EngineConfig,
    output: mpsc::Sender<Event>,
    max_recv: usize,
    learn_buffer: Vec<String>,
    last_response: Instant,
    disconnect_requested: bool,
    output_closed: bool,
}

impl Relay {
    pub fn new(
        session: Arc<dyn ChatSession>,
        model: Arc<dyn TextModel>,
        config: EngineConfig,
        output: mpsc::Sender<Event>,
        max_recv: usize,
    ) -> Self {
        Self {
            session,
            model,
            config,
            output,
            max_recv,
            learn_buffer: Vec::new(),
            last_response: Instant::now(),
            disconnect_requested: false,
            output_closed: false,
        }
    }

    /// 事件源耗尽（connect 返回并丢弃发送端）后结束
    pub async fn run(mut self, mut events: mpsc::Receiver<Event>) -> RelayOutcome {
        while let Some(event) = events.recv().await {
            self.handle(event).await;
        }
        RelayOutcome {
            learn_buffer: self.learn_buffer,
            disconnect_requested: self.disconnect_requested,
        }
    }

    async fn handle(&mut self, event: Event) {
        if !event.kind.is_relevant() {
            tracing::debug!("Dropping irrelevant session event: {}", event);
            return;
        }

        let received = (event.kind == EventKind::GotMessage).then(|| event.value.clone());
        self.forward(event).await;

        if let Some(text) = received {
            self.on_message(text).await;
        }
    }

    async fn forward(&mut self, event: Event) {
        if self.output_closed {
            return;
        }
        if self.output.send(event).await.is_err() {
            tracing::debug!("Relay output closed, continuing without observers");
            self.output_closed = true;
        }
    }

    async fn on_message(&mut self, text: String) {
        self.learn_buffer.push(text);

        if self.learn_buffer.len() > self.max_recv && !self.disconnect_requested {
            tracing::info!(
                "Received {} messages (max {}), requesting disconnect",
                self.learn_buffer.len(),
                self.max_recv
            );
            self.disconnect_requested = true;
            self.session.disconnect().await;
        }

        let recv_time = Instant::now();
        if recv_time.duration_since(self.last_response) > self.config.min_response_delta {
            self.reply().await;
        }
        self.last_response = recv_time;
    }

    async fn reply(&self) {
        let Some(seed) = self.learn_buffer.last() else {
            return;
        };
        let (min, max) = (self.config.reply_min_tokens, self.config.reply_max_tokens);
        match self.model.respond(seed, min, max).await {
            Ok(reply) => {
                if let Err(e) = self.session.say(&reply).await {
                    tracing::warn!("Failed to send reply: {}", e);
                }
            }
            Err(e) => tracing::warn!("Reply generation failed, skipping: {}", e),
        }
    }
}
