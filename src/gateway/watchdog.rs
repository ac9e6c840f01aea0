//! 看门狗：陌生人沉默检测，两次超时逐级升级
//!
//! 第一次超时（Armed）催促一句并以相同间隔重启；第二次超时（Nudged）请求断开并停表。
//! 只有 connected / gotMessage 会把状态重置为 Armed。

use std::time::Duration;

use tokio::time::Instant;

/// 超时阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strike {
    /// 下次超时先催促
    Armed,
    /// 已催促过，下次超时断开
    Nudged,
}

/// 超时后应执行的动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogAction {
    Prompt,
    Stop,
}

#[derive(Debug)]
pub struct Watchdog {
    interval: Duration,
    deadline: Option<Instant>,
    strike: Strike,
}

impl Watchdog {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            deadline: None,
            strike: Strike::Armed,
        }
    }

    /// 新对话开始：回到 Armed，计时从第一次 connected 开始
    pub fn arm(&mut self) {
        self.strike = Strike::Armed;
        self.deadline = None;
    }

    /// 陌生人有动静：重新计时并回到 Armed
    pub fn reset(&mut self) {
        self.strike = Strike::Armed;
        self.deadline = Some(Instant::now() + self.interval);
    }

    pub fn stop(&mut self) {
        self.deadline = None;
    }

    pub fn is_running(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn strike(&self) -> Strike {
        self.strike
    }

    /// 到期后调用，返回动作并推进阶段
    pub fn fire(&mut self) -> WatchdogAction {
        match self.strike {
            Strike::Armed => {
                self.strike = Strike::Nudged;
                self.deadline = Some(Instant::now() + self.interval);
                WatchdogAction::Prompt
            }
            Strike::Nudged => {
                self.deadline = None;
                WatchdogAction::Stop
            }
        }
    }

    /// 等待到期；未计时时永不返回
    pub async fn expired(&self) {
        match self.deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    }
}
