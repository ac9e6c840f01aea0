//! 会话事件：陌生人会话产生的类型化事件流
//!
//! 线上格式为 `{"Kind": "...", "Value": "..."}`，原样广播给所有观察者。

use serde::Serialize;

/// 事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    /// 已连上陌生人
    Connected,
    /// 收到陌生人消息
    GotMessage,
    /// 机器人发出的消息
    WeMessage,
    /// 我方断开
    WeDisconnected,
    /// 陌生人断开
    StrangerDisconnected,
    /// Hub 给单个观察者的提示
    Info,
}

impl EventKind {
    /// 是否转发给观察者
    pub fn is_relevant(self) -> bool {
        !matches!(self, EventKind::Info)
    }

    /// 是否重置看门狗（仅 connected / gotMessage）
    pub fn resets_watchdog(self) -> bool {
        matches!(self, EventKind::Connected | EventKind::GotMessage)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Connected => "connected",
            EventKind::GotMessage => "gotMessage",
            EventKind::WeMessage => "weMessage",
            EventKind::WeDisconnected => "weDisconnected",
            EventKind::StrangerDisconnected => "strangerDisconnected",
            EventKind::Info => "info",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一条会话事件，产生后不可变
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    #[serde(rename = "Kind")]
    pub kind: EventKind,
    #[serde(rename = "Value")]
    pub value: String,
}

impl Event {
    pub fn new(kind: EventKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    pub fn connected() -> Self {
        Self::new(EventKind::Connected, "")
    }

    pub fn got_message(text: impl Into<String>) -> Self {
        Self::new(EventKind::GotMessage, text)
    }

    pub fn we_message(text: impl Into<String>) -> Self {
        Self::new(EventKind::WeMessage, text)
    }

    pub fn we_disconnected() -> Self {
        Self::new(EventKind::WeDisconnected, "")
    }

    pub fn stranger_disconnected() -> Self {
        Self::new(EventKind::StrangerDisconnected, "")
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self::new(EventKind::Info, text)
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.value.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.kind, self.value)
        }
    }
}
