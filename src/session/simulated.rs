//! 模拟陌生人（无需真实远端协议）
//!
//! 连接后先发 connected，再按固定节奏逐行发送脚本作为 gotMessage；
//! 机器人每次 say 都回显为 weMessage。脚本讲完发 strangerDisconnected，
//! 收到断开请求则发 weDisconnected。

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use crate::config::MIN_PERIOD;
use crate::core::{Event, SessionError};
use crate::session::{ChatSession, SessionConnector};

const DEFAULT_SCRIPT: &[&str] = &[
    "hi",
    "asl?",
    "where are you from",
    "what do you like to do",
    "lol",
    "ok bye",
];

#[derive(Debug)]
enum Control {
    Say(String),
    Disconnect,
}

/// 单次模拟会话
pub struct SimulatedSession {
    script: Arc<Vec<String>>,
    pace: Duration,
    control_tx: mpsc::UnboundedSender<Control>,
    control_rx: Mutex<Option<mpsc::UnboundedReceiver<Control>>>,
}

impl SimulatedSession {
    pub fn new(script: Arc<Vec<String>>, pace: Duration) -> Self {
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        Self {
            script,
            pace,
            control_tx,
            control_rx: Mutex::new(Some(control_rx)),
        }
    }
}

#[async_trait]
impl ChatSession for SimulatedSession {
    async fn connect(&self, events: mpsc::Sender<Event>) -> Result<(), SessionError> {
        let mut control = self
            .control_rx
            .lock()
            .await
            .take()
            .ok_or_else(|| SessionError::Negotiation("session already used".to_string()))?;

        if events.send(Event::connected()).await.is_err() {
            return Ok(());
        }

        let mut lines = self.script.iter();
        let mut pace = tokio::time::interval(self.pace.max(MIN_PERIOD));
        pace.tick().await;

        loop {
            let event = tokio::select! {
                ctrl = control.recv() => match ctrl {
                    Some(Control::Say(text)) => Event::we_message(text),
                    Some(Control::Disconnect) | None => {
                        let _ = events.send(Event::we_disconnected()).await;
                        return Ok(());
                    }
                },
                _ = pace.tick() => match lines.next() {
                    Some(line) => Event::got_message(line.clone()),
                    None => {
                        let _ = events.send(Event::stranger_disconnected()).await;
                        return Ok(());
                    }
                },
            };
            if events.send(event).await.is_err() {
                return Ok(());
            }
        }
    }

    async fn say(&self, text: &str) -> Result<(), SessionError> {
        self.control_tx
            .send(Control::Say(text.to_string()))
            .map_err(|_| SessionError::NotConnected)
    }

    async fn disconnect(&self) {
        let _ = self.control_tx.send(Control::Disconnect);
    }
}

/// 模拟会话工厂
#[derive(Debug, Clone)]
pub struct SimulatedConnector {
    script: Arc<Vec<String>>,
    pace: Duration,
}

impl SimulatedConnector {
    pub fn new(script: Vec<String>, pace: Duration) -> Self {
        Self {
            script: Arc::new(script),
            pace,
        }
    }

    /// 从脚本文件构建（每行一句，空行忽略）；未配置或读取失败时用内置脚本
    pub async fn from_config(script_path: Option<&Path>, pace: Duration, max_lines: usize) -> Self {
        let loaded = match script_path {
            Some(path) => match tokio::fs::read_to_string(path).await {
                Ok(text) => Some(text),
                Err(e) => {
                    tracing::warn!(
                        "Stranger script {} unavailable ({}), using built-in",
                        path.display(),
                        e
                    );
                    None
                }
            },
            None => None,
        };

        let script: Vec<String> = match loaded {
            Some(text) => text
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from)
                .take(max_lines)
                .collect(),
            None => DEFAULT_SCRIPT
                .iter()
                .map(|s| s.to_string())
                .take(max_lines)
                .collect(),
        };
        Self::new(script, pace)
    }
}

impl SessionConnector for SimulatedConnector {
    fn open(&self) -> Arc<dyn ChatSession> {
        Arc::new(SimulatedSession::new(Arc::clone(&self.script), self.pace))
    }
}
