//! Hub（中枢）- 对话生命周期状态机
//!
//! Hub 是观察者集合与对话状态的唯一所有者：
//! - **注册/注销**：观察者加入时若空闲则开启对话，否则只给该观察者发提示
//! - **广播**：相关事件序列化一次，按到达顺序发给所有观察者
//! - **看门狗**：陌生人沉默先催促、再断开
//! - **重启**：对话结束时仍有观察者则立即开始下一次，否则回到空闲
//!
//! 所有状态变更都经由同一个控制循环串行处理，外部只能通过 [`HubHandle`] 发消息。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use super::message::{encode_event, JOINED_MID_CONVERSATION};
use super::watchdog::{Strike, Watchdog, WatchdogAction};
use crate::config::HubSection;
use crate::conversation::{Conversation, ConversationEngine, ConversationReport};
use crate::core::{Event, HubClosed};

/// 单次对话转发到 Hub 的事件缓冲
const RELAY_OUTPUT_BUFFER: usize = 128;

/// Hub 配置
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// 看门狗间隔
    pub stranger_timeout: Duration,
    /// 收到超过这么多条消息后请求断开
    pub max_recv: usize,
    /// 催促消息长度
    pub prompt_min_tokens: usize,
    pub prompt_max_tokens: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self::from(&HubSection::default())
    }
}

impl From<&HubSection> for HubConfig {
    fn from(section: &HubSection) -> Self {
        Self {
            stranger_timeout: section.stranger_timeout(),
            max_recv: section.max_recv,
            prompt_min_tokens: section.prompt_min_tokens,
            prompt_max_tokens: section.prompt_max_tokens,
        }
    }
}

/// 观察者标识
pub type ClientId = String;

/// 已注册观察者：出站队列的发送端，丢弃即关闭队列
#[derive(Debug)]
pub struct ClientHandle {
    id: ClientId,
    tx: mpsc::UnboundedSender<String>,
}

impl ClientHandle {
    /// 创建观察者及其出站队列接收端
    pub fn new(id: impl Into<ClientId>) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { id: id.into(), tx }, rx)
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Hub 状态快照（只读）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubSnapshot {
    pub clients: usize,
    /// 是否有进行中的对话
    pub active: bool,
    /// 下一次超时是否先催促
    pub armed_prompt: bool,
    pub watchdog_running: bool,
    pub conversations_started: u64,
}

enum HubCommand {
    Register(ClientHandle),
    Unregister(ClientId),
    Event(Event),
    ConversationOver(ConversationReport),
    Snapshot(oneshot::Sender<HubSnapshot>),
}

/// Hub 句柄：可克隆，只能发送注册/注销/查询请求
#[derive(Clone)]
pub struct HubHandle {
    tx: mpsc::UnboundedSender<HubCommand>,
}

impl HubHandle {
    pub fn register(&self, client: ClientHandle) -> Result<(), HubClosed> {
        self.tx.send(HubCommand::Register(client)).map_err(|_| HubClosed)
    }

    pub fn unregister(&self, id: &str) -> Result<(), HubClosed> {
        self.tx
            .send(HubCommand::Unregister(id.to_string()))
            .map_err(|_| HubClosed)
    }

    pub async fn snapshot(&self) -> Result<HubSnapshot, HubClosed> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(HubCommand::Snapshot(reply_tx))
            .map_err(|_| HubClosed)?;
        reply_rx.await.map_err(|_| HubClosed)
    }
}

/// Hub（中枢）- 控制循环
pub struct Hub {
    config: HubConfig,
    engine: Arc<ConversationEngine>,
    inbox_tx: mpsc::UnboundedSender<HubCommand>,
    inbox: mpsc::UnboundedReceiver<HubCommand>,
    connections: HashMap<ClientId, ClientHandle>,
    active: Option<Arc<Conversation>>,
    watchdog: Watchdog,
    conversations_started: u64,
    shutdown: CancellationToken,
}

impl Hub {
    pub fn new(
        config: HubConfig,
        engine: Arc<ConversationEngine>,
        shutdown: CancellationToken,
    ) -> (Self, HubHandle) {
        let (inbox_tx, inbox) = mpsc::unbounded_channel();
        let handle = HubHandle {
            tx: inbox_tx.clone(),
        };
        let watchdog = Watchdog::new(config.stranger_timeout);
        let hub = Self {
            config,
            engine,
            inbox_tx,
            inbox,
            connections: HashMap::new(),
            active: None,
            watchdog,
            conversations_started: 0,
            shutdown,
        };
        (hub, handle)
    }

    /// 创建并在后台运行控制循环
    pub fn spawn(
        config: HubConfig,
        engine: Arc<ConversationEngine>,
        shutdown: CancellationToken,
    ) -> HubHandle {
        let (hub, handle) = Self::new(config, engine, shutdown);
        tokio::spawn(hub.run());
        handle
    }

    /// 控制循环：唯一的状态写入者，直到关闭令牌取消
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Hub shutting down");
                    if let Some(conversation) = &self.active {
                        conversation.request_stop().await;
                    }
                    break;
                }
                Some(cmd) = self.inbox.recv() => self.handle_command(cmd),
                _ = self.watchdog.expired(), if self.watchdog.is_running() => self.on_timeout(),
            }
        }
    }

    fn handle_command(&mut self, cmd: HubCommand) {
        match cmd {
            HubCommand::Register(client) => self.on_register(client),
            HubCommand::Unregister(id) => {
                if self.connections.remove(&id).is_some() {
                    tracing::info!("Client {} left ({} remaining)", id, self.connections.len());
                }
            }
            HubCommand::Event(event) => self.on_event(event),
            HubCommand::ConversationOver(report) => self.on_conversation_over(report),
            HubCommand::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    fn on_register(&mut self, client: ClientHandle) {
        tracing::info!("Client {} joined", client.id);

        if self.active.is_none() {
            tracing::info!("Starting conversation for new client");
            self.connections.insert(client.id.clone(), client);
            self.start_conversation();
            return;
        }

        match encode_event(&Event::info(JOINED_MID_CONVERSATION)) {
            Ok(msg) => {
                let _ = client.tx.send(msg);
            }
            Err(e) => tracing::error!("Unable to serialize info event: {}", e),
        }
        self.connections.insert(client.id.clone(), client);
    }

    fn on_event(&mut self, event: Event) {
        tracing::debug!("Relevant event: {}", event);

        if event.kind.resets_watchdog() {
            self.watchdog.reset();
        }
        self.broadcast(&event);
    }

    fn on_conversation_over(&mut self, report: ConversationReport) {
        tracing::info!(
            "Conversation over ({:?}, learned {} messages)",
            report.outcome,
            report.learned
        );
        self.watchdog.stop();
        self.active = None;

        if self.connections.is_empty() {
            tracing::info!("No clients; not reconnecting");
        } else {
            tracing::info!("Have {} clients; reconnecting", self.connections.len());
            self.start_conversation();
        }
    }

    fn on_timeout(&mut self) {
        let Some(conversation) = self.active.clone() else {
            self.watchdog.stop();
            return;
        };

        match self.watchdog.fire() {
            WatchdogAction::Prompt => {
                tracing::info!("Stranger timeout 1: prompting");
                let (min, max) = (self.config.prompt_min_tokens, self.config.prompt_max_tokens);
                tokio::spawn(async move { conversation.say(min, max).await });
            }
            WatchdogAction::Stop => {
                tracing::info!("Stranger timeout 2: disconnecting");
                tokio::spawn(async move { conversation.request_stop().await });
            }
        }
    }

    /// 序列化一次，按注册表广播；出站队列已关闭的观察者顺带移除
    fn broadcast(&mut self, event: &Event) {
        let msg = match encode_event(event) {
            Ok(m) => m,
            Err(e) => {
                tracing::error!("Unable to serialize event {}: {}", event, e);
                return;
            }
        };

        let closed: Vec<ClientId> = self
            .connections
            .values()
            .filter(|c| c.tx.send(msg.clone()).is_err())
            .map(|c| c.id.clone())
            .collect();

        for id in closed {
            tracing::debug!("Dropping client {} with closed queue", id);
            self.connections.remove(&id);
        }
    }

    fn start_conversation(&mut self) {
        debug_assert!(self.active.is_none());

        let conversation = Arc::new(self.engine.start());
        self.watchdog.arm();
        self.conversations_started += 1;
        tracing::info!("Starting conversation #{}", self.conversations_started);

        let inbox = self.inbox_tx.clone();
        let max_recv = self.config.max_recv;
        let running = Arc::clone(&conversation);
        tokio::spawn(async move {
            let (output_tx, mut output_rx) = mpsc::channel(RELAY_OUTPUT_BUFFER);
            let forward = {
                let inbox = inbox.clone();
                tokio::spawn(async move {
                    while let Some(event) = output_rx.recv().await {
                        if inbox.send(HubCommand::Event(event)).is_err() {
                            break;
                        }
                    }
                })
            };

            let report = running.converse(output_tx, max_recv).await;
            let _ = forward.await;
            let _ = inbox.send(HubCommand::ConversationOver(report));
        });

        self.active = Some(conversation);
    }

    fn snapshot(&self) -> HubSnapshot {
        HubSnapshot {
            clients: self.connections.len(),
            active: self.active.is_some(),
            armed_prompt: self.watchdog.strike() == Strike::Armed,
            watchdog_running: self.watchdog.is_running(),
            conversations_started: self.conversations_started,
        }
    }
}
