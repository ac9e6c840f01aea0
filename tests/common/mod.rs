//! 测试替身：手动驱动的陌生人会话与记录调用的文本模型

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chatrelay::core::{Event, ModelError, SessionError};
use chatrelay::model::TextModel;
use chatrelay::session::{ChatSession, SessionConnector};
use tokio::sync::mpsc;

/// 由测试逐条喂事件的会话；喂料端关闭即会话结束
pub struct ManualSession {
    feed: tokio::sync::Mutex<Option<mpsc::UnboundedReceiver<Event>>>,
    said: Mutex<Vec<String>>,
    disconnects: AtomicUsize,
    fail_with: Option<String>,
    say_fails: bool,
}

#[async_trait]
impl ChatSession for ManualSession {
    async fn connect(&self, events: mpsc::Sender<Event>) -> Result<(), SessionError> {
        if let Some(reason) = &self.fail_with {
            return Err(SessionError::Connect(reason.clone()));
        }
        let mut feed = self
            .feed
            .lock()
            .await
            .take()
            .ok_or(SessionError::NotConnected)?;
        while let Some(event) = feed.recv().await {
            if events.send(event).await.is_err() {
                break;
            }
        }
        Ok(())
    }

    async fn say(&self, text: &str) -> Result<(), SessionError> {
        if self.say_fails {
            return Err(SessionError::NotConnected);
        }
        self.said.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}

/// 测试侧的会话遥控器
pub struct SessionControl {
    feed: Mutex<Option<mpsc::UnboundedSender<Event>>>,
    session: Arc<ManualSession>,
}

impl SessionControl {
    pub fn send(&self, event: Event) {
        let feed = self.feed.lock().unwrap();
        feed.as_ref().expect("session already ended").send(event).unwrap();
    }

    /// 结束会话（connect 返回）
    pub fn end(&self) {
        self.feed.lock().unwrap().take();
    }

    pub fn said(&self) -> Vec<String> {
        self.session.said.lock().unwrap().clone()
    }

    pub fn disconnects(&self) -> usize {
        self.session.disconnects.load(Ordering::SeqCst)
    }
}

/// 每次 open 都把新会话的遥控器交给测试
pub struct ManualConnector {
    opened: mpsc::UnboundedSender<SessionControl>,
    fail_next: Mutex<Option<String>>,
    say_fails: AtomicBool,
}

impl ManualConnector {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<SessionControl>) {
        let (opened, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                opened,
                fail_next: Mutex::new(None),
                say_fails: AtomicBool::new(false),
            }),
            rx,
        )
    }

    /// 下一次打开的会话 connect 失败
    pub fn fail_next(&self, reason: &str) {
        *self.fail_next.lock().unwrap() = Some(reason.to_string());
    }

    /// 之后打开的会话 say 一律返回 NotConnected
    pub fn fail_says(&self) {
        self.say_fails.store(true, Ordering::SeqCst);
    }
}

impl SessionConnector for ManualConnector {
    fn open(&self) -> Arc<dyn ChatSession> {
        let (feed_tx, feed_rx) = mpsc::unbounded_channel();
        let session = Arc::new(ManualSession {
            feed: tokio::sync::Mutex::new(Some(feed_rx)),
            said: Mutex::new(Vec::new()),
            disconnects: AtomicUsize::new(0),
            fail_with: self.fail_next.lock().unwrap().take(),
            say_fails: self.say_fails.load(Ordering::SeqCst),
        });
        let _ = self.opened.send(SessionControl {
            feed: Mutex::new(Some(feed_tx)),
            session: Arc::clone(&session),
        });
        session
    }
}

/// 记录 respond/update 调用的模型
#[derive(Default)]
pub struct RecordingModel {
    pub responds: Mutex<Vec<(String, usize, usize)>>,
    pub updates: Mutex<Vec<String>>,
    pub fail: AtomicBool,
    pub stall: AtomicBool,
}

impl RecordingModel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        let model = Self::default();
        model.fail.store(true, Ordering::SeqCst);
        Arc::new(model)
    }

    /// respond 永不返回
    pub fn stalled() -> Arc<Self> {
        let model = Self::default();
        model.stall.store(true, Ordering::SeqCst);
        Arc::new(model)
    }

    pub fn responds(&self) -> Vec<(String, usize, usize)> {
        self.responds.lock().unwrap().clone()
    }

    pub fn updates(&self) -> Vec<String> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextModel for RecordingModel {
    async fn respond(
        &self,
        seed: &str,
        min_tokens: usize,
        max_tokens: usize,
    ) -> Result<String, ModelError> {
        self.responds
            .lock()
            .unwrap()
            .push((seed.to_string(), min_tokens, max_tokens));
        if self.stall.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(ModelError::InsufficientTokens {
                wanted: min_tokens,
                available: 0,
            });
        }
        Ok(format!("reply to '{}'", seed))
    }

    async fn update(&self, text: &str) {
        self.updates.lock().unwrap().push(text.to_string());
    }
}

/// 轮询直到条件成立（暂停时钟下 sleep 会自动推进）
pub async fn eventually<F: FnMut() -> bool>(mut cond: F) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}
